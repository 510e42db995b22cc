//! `csv_logger` tool: appends a row to the CSV incident log.

use std::path::Path;

use incident_responder_incident_log::{CsvLogger, LogEntry};

use super::CrewTool;
use crate::CrewError;

/// Tool name exposed to the LLM.
pub const TOOL_NAME: &str = "csv_logger";

/// Appends incident rows via [`CsvLogger`].
pub struct CsvLoggerTool {
    logger: CsvLogger,
}

impl CsvLoggerTool {
    /// Creates a tool writing to the given logger.
    #[must_use]
    pub const fn new(logger: CsvLogger) -> Self {
        Self { logger }
    }

    /// Creates a tool writing the default log file inside `output_dir`.
    #[must_use]
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(CsvLogger::in_dir(output_dir))
    }
}

/// Accepts strings, and renders numbers and booleans as strings, since
/// models do not always quote scalar fields.
fn parse_entry(input: &serde_json::Value) -> Result<LogEntry, CrewError> {
    let object = input.as_object().ok_or_else(|| CrewError::ToolInput {
        tool: TOOL_NAME.to_string(),
        message: "expected a JSON object".to_string(),
    })?;

    let field = |name: &str| -> Option<String> {
        match object.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    };

    Ok(LogEntry {
        id: field("id"),
        username: field("username"),
        location: field("location"),
        category_incident: field("category_incident"),
        time: field("time"),
        severity: field("severity"),
        issue_msg: field("issue_msg"),
    })
}

#[async_trait::async_trait]
impl CrewTool for CsvLoggerTool {
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Logs incident details to the CSV incident log."
    }

    fn parameters(&self) -> serde_json::Value {
        let field = |description: &str| {
            serde_json::json!({ "type": "string", "description": description })
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": field("Incident id"),
                "username": field("Reporter name"),
                "location": field("Incident location"),
                "category_incident": field("Incident category"),
                "time": field("Time the incident was reported"),
                "severity": field("Incident severity"),
                "issue_msg": field("Incident description"),
            },
        })
    }

    async fn execute(&self, input: &serde_json::Value) -> Result<String, CrewError> {
        let entry = parse_entry(input)?;
        let logger = self.logger.clone();

        let message = tokio::task::spawn_blocking(move || logger.append(&entry))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_row_with_missing_fields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CsvLoggerTool::in_dir(dir.path());

        let message = tool
            .execute(&serde_json::json!({ "id": "abc", "severity": "high" }))
            .await
            .unwrap();
        assert!(message.starts_with("Incident logged to "));

        let contents =
            std::fs::read_to_string(dir.path().join("fire_incidents_log.csv")).unwrap();
        assert_eq!(contents.lines().nth(1), Some("abc,,,,,high,"));
    }

    #[test]
    fn non_string_scalars_are_stringified() {
        let entry = parse_entry(&serde_json::json!({ "id": 42, "time": null })).unwrap();
        assert_eq!(entry.id.as_deref(), Some("42"));
        assert_eq!(entry.time, None);
    }

    #[test]
    fn rejects_non_object_input() {
        assert!(matches!(
            parse_entry(&serde_json::json!("hello")),
            Err(CrewError::ToolInput { .. })
        ));
    }
}
