//! `notify_authority` tool: records a drafted notification for the
//! responsible authority.
//!
//! Notifications are appended as JSON lines to `notifications.jsonl` in the
//! output directory. Delivery (mail, SMS, CAD integration) is left to
//! whatever consumes that file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt as _;

use super::CrewTool;
use crate::CrewError;

/// Tool name exposed to the LLM.
pub const TOOL_NAME: &str = "notify_authority";

/// File name of the notification outbox inside the output directory.
pub const NOTIFICATIONS_FILE: &str = "notifications.jsonl";

/// Input accepted from the model.
#[derive(Debug, Deserialize)]
struct NotifyInput {
    authority: String,
    subject: String,
    body: String,
    #[serde(default)]
    incident_id: Option<String>,
}

/// One line of the notification outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftedNotification {
    /// Incident the notification refers to, if the model supplied it.
    pub incident_id: Option<String>,
    /// Receiving authority (e.g. "Fire department").
    pub authority: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// When the notification was drafted (RFC 3339).
    pub drafted_at: String,
}

/// Appends drafted notifications to a JSON-lines outbox.
pub struct NotifyAuthorityTool {
    path: PathBuf,
}

impl NotifyAuthorityTool {
    /// Creates a tool appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a tool appending to [`NOTIFICATIONS_FILE`] inside
    /// `output_dir`.
    #[must_use]
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(NOTIFICATIONS_FILE))
    }
}

#[async_trait::async_trait]
impl CrewTool for NotifyAuthorityTool {
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Sends an incident notification to the responsible authority."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "authority": {
                    "type": "string",
                    "description": "Authority to notify, e.g. fire department"
                },
                "subject": { "type": "string", "description": "Subject line" },
                "body": { "type": "string", "description": "Full notification text" },
                "incident_id": { "type": "string", "description": "Incident id" },
            },
            "required": ["authority", "subject", "body"],
        })
    }

    async fn execute(&self, input: &serde_json::Value) -> Result<String, CrewError> {
        let input: NotifyInput =
            serde_json::from_value(input.clone()).map_err(|e| CrewError::ToolInput {
                tool: TOOL_NAME.to_string(),
                message: e.to_string(),
            })?;

        let notification = DraftedNotification {
            incident_id: input.incident_id,
            authority: input.authority,
            subject: input.subject,
            body: input.body,
            drafted_at: Utc::now().to_rfc3339(),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(&notification)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        log::info!(
            "Drafted notification to {}: {}",
            notification.authority,
            notification.subject
        );

        Ok(format!(
            "Notification sent to {}: {}",
            notification.authority, notification.subject
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_json_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let tool = NotifyAuthorityTool::in_dir(dir.path());
        let input = serde_json::json!({
            "authority": "Fire department",
            "subject": "Fire at Building A",
            "body": "Smoke reported on the 3rd floor.",
        });

        let message = tool.execute(&input).await.unwrap();
        assert_eq!(message, "Notification sent to Fire department: Fire at Building A");
        tool.execute(&input).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join(NOTIFICATIONS_FILE)).unwrap();
        let lines: Vec<DraftedNotification> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].subject, "Fire at Building A");
        assert_eq!(lines[0].incident_id, None);
    }

    #[tokio::test]
    async fn missing_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = NotifyAuthorityTool::in_dir(dir.path());
        let result = tool
            .execute(&serde_json::json!({ "authority": "Police", "subject": "x" }))
            .await;
        assert!(matches!(result, Err(CrewError::ToolInput { .. })));
    }
}
