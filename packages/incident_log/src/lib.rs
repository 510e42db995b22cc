#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Append-only CSV log of reported incidents.
//!
//! Rows are appended by the dispatch crew's `csv_logger` tool and can be
//! audited with the `incident_log` CLI:
//!
//! ```text
//! incident_log list [--limit 20]
//! incident_log show <id>
//! ```
//!
//! The file is created lazily, header included, on the first append. There is
//! no locking: concurrent writers may interleave rows.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the incident log inside the output directory.
pub const DEFAULT_LOG_FILE: &str = "fire_incidents_log.csv";

/// Default path of the incident log, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "outputs/fire_incidents_log.csv";

/// Column names, in file order.
pub const FIELDNAMES: [&str; 7] = [
    "id",
    "username",
    "location",
    "category_incident",
    "time",
    "severity",
    "issue_msg",
];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from incident log operations.
#[derive(Debug, Error)]
pub enum IncidentLogError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV file could not be written or parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// No row matched the requested id.
    #[error("Incident not found: {id}")]
    NotFound {
        /// The id or prefix that was looked up.
        id: String,
    },

    /// More than one row matched an id prefix.
    #[error("Ambiguous incident id prefix '{prefix}' matches {count} rows")]
    Ambiguous {
        /// The prefix that was looked up.
        prefix: String,
        /// Number of matching rows.
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// One row of the incident log. Every column is optional; missing values
/// are written as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Incident id.
    pub id: Option<String>,
    /// Reporter name.
    pub username: Option<String>,
    /// Coordinates or address.
    pub location: Option<String>,
    /// Incident category.
    pub category_incident: Option<String>,
    /// Submission time.
    pub time: Option<String>,
    /// Incident severity.
    pub severity: Option<String>,
    /// Free-text description.
    pub issue_msg: Option<String>,
}

impl LogEntry {
    fn columns(&self) -> [&str; 7] {
        [
            self.id.as_deref().unwrap_or(""),
            self.username.as_deref().unwrap_or(""),
            self.location.as_deref().unwrap_or(""),
            self.category_incident.as_deref().unwrap_or(""),
            self.time.as_deref().unwrap_or(""),
            self.severity.as_deref().unwrap_or(""),
            self.issue_msg.as_deref().unwrap_or(""),
        ]
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Appends rows to a CSV incident log.
#[derive(Debug, Clone)]
pub struct CsvLogger {
    path: PathBuf,
}

impl CsvLogger {
    /// Creates a logger writing to `path`. Nothing is touched on disk until
    /// the first [`CsvLogger::append`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a logger writing [`DEFAULT_LOG_FILE`] inside `output_dir`.
    #[must_use]
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(DEFAULT_LOG_FILE))
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, creating the parent directory and header row if the
    /// file does not exist yet.
    ///
    /// Returns the message `Incident logged to <path>`.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentLogError`] if the directory or file cannot be
    /// created or the row cannot be written.
    pub fn append(&self, entry: &LogEntry) -> Result<String, IncidentLogError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let is_new = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(FIELDNAMES)?;
        }
        writer.write_record(entry.columns())?;
        writer.flush()?;

        log::info!("Appended incident row to {}", self.path.display());

        Ok(format!("Incident logged to {}", self.path.display()))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads every row of the log, in append order.
///
/// A missing file is treated as an empty log.
///
/// # Errors
///
/// Returns [`IncidentLogError`] if the file exists but cannot be parsed.
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>, IncidentLogError> {
    if !path.exists() {
        return Ok(vec![]);
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut entries = Vec::new();
    for row in reader.deserialize() {
        entries.push(row?);
    }
    Ok(entries)
}

/// Returns the most recent `limit` rows, newest first.
///
/// # Errors
///
/// Returns [`IncidentLogError`] if the log cannot be read.
pub fn list_recent(path: &Path, limit: usize) -> Result<Vec<LogEntry>, IncidentLogError> {
    let mut entries = read_entries(path)?;
    entries.reverse();
    entries.truncate(limit);
    Ok(entries)
}

/// Finds a row by full id or unique id prefix.
///
/// # Errors
///
/// Returns [`IncidentLogError::NotFound`] if nothing matches and
/// [`IncidentLogError::Ambiguous`] if a prefix matches several rows.
pub fn find_entry(path: &Path, id: &str) -> Result<LogEntry, IncidentLogError> {
    let entries = read_entries(path)?;

    if let Some(exact) = entries.iter().find(|e| e.id.as_deref() == Some(id)) {
        return Ok(exact.clone());
    }

    let mut matches: Vec<LogEntry> = entries
        .into_iter()
        .filter(|e| e.id.as_deref().is_some_and(|v| v.starts_with(id)))
        .collect();

    match matches.len() {
        0 => Err(IncidentLogError::NotFound { id: id.to_string() }),
        1 => Ok(matches.remove(0)),
        count => Err(IncidentLogError::Ambiguous {
            prefix: id.to_string(),
            count,
        }),
    }
}

/// Formats a row as aligned `field: value` lines.
#[must_use]
pub fn format_entry(entry: &LogEntry) -> String {
    let mut out = String::new();
    for (name, value) in FIELDNAMES.iter().zip(entry.columns()) {
        let _ = writeln!(out, "{name:<18} {value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> LogEntry {
        LogEntry {
            id: Some(id.to_string()),
            username: Some("Jane".to_string()),
            ..LogEntry::default()
        }
    }

    #[test]
    fn two_partial_rows_share_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.csv");
        let logger = CsvLogger::new(&path);

        let message = logger.append(&entry("a1")).unwrap();
        assert_eq!(message, format!("Incident logged to {}", path.display()));

        logger
            .append(&LogEntry {
                severity: Some("high".to_string()),
                ..LogEntry::default()
            })
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "id,username,location,category_incident,time,severity,issue_msg",
                "a1,Jane,,,,,",
                ",,,,,high,",
            ]
        );
    }

    #[test]
    fn read_entries_maps_empty_fields_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CsvLogger::in_dir(dir.path());
        logger.append(&entry("a1")).unwrap();

        let entries = read_entries(logger.path()).unwrap();
        assert_eq!(entries, vec![entry("a1")]);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = read_entries(&dir.path().join("absent.csv")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn list_recent_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CsvLogger::in_dir(dir.path());
        for id in ["a", "b", "c"] {
            logger.append(&entry(id)).unwrap();
        }

        let ids: Vec<String> = list_recent(logger.path(), 2)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn find_entry_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CsvLogger::in_dir(dir.path());
        logger.append(&entry("abc-1")).unwrap();
        logger.append(&entry("abd-2")).unwrap();

        let found = find_entry(logger.path(), "abc").unwrap();
        assert_eq!(found.id.as_deref(), Some("abc-1"));

        assert!(matches!(
            find_entry(logger.path(), "ab"),
            Err(IncidentLogError::Ambiguous { count: 2, .. })
        ));
        assert!(matches!(
            find_entry(logger.path(), "zzz"),
            Err(IncidentLogError::NotFound { .. })
        ));
    }

    #[test]
    fn format_entry_lists_every_column() {
        let text = format_entry(&entry("a1"));
        assert_eq!(text.lines().count(), FIELDNAMES.len());
        assert!(text.starts_with("id"));
        assert!(text.contains("Jane"));
    }
}
