//! Incident report rendering and persistence.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use incident_responder_crew::CrewOutput;
use incident_responder_incident_models::{ImageAttachment, IncidentContext};

use crate::DispatchError;

/// Subdirectory of the output directory holding uploaded images.
pub const IMAGES_DIR: &str = "images";

/// Path of an incident's report inside `output_dir`:
/// `<category>_incident_report_<incident id>.md`.
#[must_use]
pub fn report_path(output_dir: &Path, context: &IncidentContext) -> PathBuf {
    output_dir.join(format!(
        "{}_incident_report_{}.md",
        context.category, context.id
    ))
}

/// Path an uploaded image is saved to: `images/<incident id>.<ext>`.
#[must_use]
pub fn image_path(
    output_dir: &Path,
    context: &IncidentContext,
    image: &ImageAttachment,
) -> PathBuf {
    output_dir
        .join(IMAGES_DIR)
        .join(format!("{}.{}", context.id, image.extension()))
}

/// Saves the uploaded image as `images/<incident id>.<ext>` and returns its
/// path.
///
/// # Errors
///
/// Returns [`DispatchError::Io`] if the directory or file cannot be written.
pub async fn save_image(
    output_dir: &Path,
    context: &IncidentContext,
    image: &ImageAttachment,
) -> Result<PathBuf, DispatchError> {
    tokio::fs::create_dir_all(output_dir.join(IMAGES_DIR)).await?;

    let path = image_path(output_dir, context, image);
    tokio::fs::write(&path, &image.data).await?;

    log::info!("Saved incident image to {}", path.display());

    Ok(path)
}

/// Renders the markdown report.
///
/// `image_link` is written verbatim as the image target, so it should be
/// relative to the report file.
#[must_use]
pub fn render_report(
    context: &IncidentContext,
    crew: &CrewOutput,
    image_link: Option<&str>,
) -> String {
    let mut md = String::new();

    let _ = writeln!(
        md,
        "# {} Incident Report\n",
        capitalize(context.category.as_ref())
    );

    md.push_str("## Incident Details\n\n");
    md.push_str("| Field | Value |\n|---|---|\n");
    let reported_at = context.reported_at_string();
    for (field, value) in [
        ("Incident ID", context.id.as_str()),
        ("Reporter", context.username.as_str()),
        ("Location", context.location.as_str()),
        ("Category", context.category.as_ref()),
        ("Severity", context.severity.as_ref()),
        ("Reported At", reported_at.as_str()),
    ] {
        let _ = writeln!(md, "| {field} | {} |", escape_cell(value));
    }

    let _ = writeln!(md, "\n**Description:** {}\n", context.description);

    if let Some(link) = image_link {
        let _ = writeln!(md, "![Incident image]({link})\n");
    }

    for task in &crew.tasks {
        let _ = writeln!(md, "## {}\n", task.title);
        let _ = writeln!(md, "_{}_\n", task.agent_role);
        let _ = writeln!(md, "{}\n", task.output.trim());
    }

    md.push_str("---\n\n");
    let _ = writeln!(
        md,
        "_Generated by {} at {}_",
        crew.crew_name,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    md
}

/// Writes the report and returns its path.
///
/// # Errors
///
/// Returns [`DispatchError::Io`] if the file cannot be written.
pub async fn write_report(
    output_dir: &Path,
    context: &IncidentContext,
    markdown: &str,
) -> Result<PathBuf, DispatchError> {
    tokio::fs::create_dir_all(output_dir).await?;

    let path = report_path(output_dir, context);
    tokio::fs::write(&path, markdown).await?;

    log::info!("Wrote incident report to {}", path.display());

    Ok(path)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_responder_crew::TaskOutput;
    use incident_responder_incident_models::{IncidentCategory, IncidentSeverity};

    fn context() -> IncidentContext {
        IncidentContext {
            id: "abc".to_string(),
            username: "Jane".to_string(),
            description: "Smoke in stairwell".to_string(),
            location: "Building A | 3rd floor".to_string(),
            category: IncidentCategory::Medical,
            severity: IncidentSeverity::Low,
            reported_at: Utc::now(),
        }
    }

    fn crew() -> CrewOutput {
        CrewOutput {
            crew_name: "Medical response crew".to_string(),
            tasks: vec![TaskOutput {
                id: "guidance_collect_info".to_string(),
                title: "First Aid Guidance".to_string(),
                agent_role: "Advisor".to_string(),
                output: "1. Stay with the patient.\n".to_string(),
            }],
        }
    }

    #[test]
    fn report_contains_details_and_task_sections() {
        let md = render_report(&context(), &crew(), Some("images/abc.png"));
        assert!(md.starts_with("# Medical Incident Report"));
        assert!(md.contains("| Location | Building A \\| 3rd floor |"));
        assert!(md.contains("![Incident image](images/abc.png)"));
        assert!(md.contains("## First Aid Guidance"));
        assert!(md.contains("1. Stay with the patient."));
        assert!(md.contains("_Generated by Medical response crew at "));
    }

    #[test]
    fn report_without_image_has_no_image_link() {
        let md = render_report(&context(), &crew(), None);
        assert!(!md.contains("!["));
    }

    #[test]
    fn report_path_is_unique_per_incident() {
        let path = report_path(Path::new("outputs"), &context());
        assert_eq!(path, Path::new("outputs/medical_incident_report_abc.md"));

        let other = IncidentContext {
            id: "def".to_string(),
            ..context()
        };
        assert_ne!(report_path(Path::new("outputs"), &other), path);
    }

    #[tokio::test]
    async fn saves_image_with_mime_extension() {
        let dir = tempfile::tempdir().unwrap();
        let image = ImageAttachment {
            mime_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G'],
        };
        let path = save_image(dir.path(), &context(), &image).await.unwrap();
        assert_eq!(path, dir.path().join("images").join("abc.png"));
        assert_eq!(std::fs::read(&path).unwrap(), image.data);
    }
}
