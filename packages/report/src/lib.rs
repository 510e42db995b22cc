#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Presentation of finished incident reports: reading the markdown back,
//! exporting it to PDF and summarising it as a mindmap.

mod markdown;
pub mod mindmap;
pub mod pdf;

use std::path::Path;

use incident_responder_ai::AiError;
use thiserror::Error;

pub use mindmap::{Mindmap, MindmapNode, generate_mindmap, parse_outline};
pub use pdf::render_pdf;

/// Errors from report presentation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PDF generation failed.
    #[error("PDF error: {message}")]
    Pdf {
        /// Description of what went wrong.
        message: String,
    },

    /// The mindmap request failed.
    #[error(transparent)]
    Ai(#[from] AiError),
}

/// Reads a report file as UTF-8 text.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file is missing or not valid UTF-8.
pub async fn read_report(path: &Path) -> Result<String, ReportError> {
    Ok(tokio::fs::read_to_string(path).await?)
}

/// File name offered for the markdown download.
#[must_use]
pub fn markdown_file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || "incident_report.md".to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// File name offered for the PDF download: the report's stem plus `.pdf`.
#[must_use]
pub fn pdf_file_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map_or_else(|| "incident_report".into(), |s| s.to_string_lossy());
    format!("{stem}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_names_follow_report_path() {
        let path = Path::new("outputs/fire_incident_report.md");
        assert_eq!(markdown_file_name(path), "fire_incident_report.md");
        assert_eq!(pdf_file_name(path), "fire_incident_report.pdf");
    }

    #[tokio::test]
    async fn read_report_returns_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        std::fs::write(&path, "# Report\n").unwrap();
        assert_eq!(read_report(&path).await.unwrap(), "# Report\n");
    }

    #[tokio::test]
    async fn read_report_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_report(&dir.path().join("absent.md")).await;
        assert!(matches!(result, Err(ReportError::Io(_))));
    }
}
