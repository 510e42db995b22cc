#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Background dispatch of classified incidents.
//!
//! [`Dispatcher::spawn`] starts one detached tokio task per incident. The
//! task saves the uploaded image, runs the category's crew and writes the
//! markdown report. It never touches session state: everything it has to
//! say goes through the returned channel of [`DispatchUpdate`]s, which the
//! owner folds into a [`DispatchStatus`] with [`DispatchStatus::apply`].

pub mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use incident_responder_ai::AgentEvent;
use incident_responder_ai::providers::LlmProvider;
use incident_responder_crew::registry::crew_for;
use incident_responder_crew::{CrewError, CrewEvent, ToolRegistry, run_crew};
use incident_responder_incident_models::{ImageAttachment, IncidentContext};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that end a dispatch run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The crew run failed.
    #[error(transparent)]
    Crew(#[from] CrewError),

    /// The image or report could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Messages sent by the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DispatchUpdate {
    /// The crew has been selected and is starting.
    Started {
        /// Crew name.
        crew: String,
    },
    /// A crew task started.
    TaskStarted {
        /// Task heading.
        title: String,
        /// Role of the agent performing it.
        agent_role: String,
    },
    /// An agent invoked a tool.
    ToolCalled {
        /// Tool name.
        tool: String,
    },
    /// A crew task finished.
    TaskCompleted {
        /// Task id.
        task: String,
    },
    /// The report has been written.
    Completed {
        /// Path of the report file.
        report_path: PathBuf,
    },
    /// The run failed; no further updates follow.
    Failed {
        /// Error text.
        message: String,
    },
}

impl DispatchUpdate {
    /// One-line description for progress displays.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Started { crew } => format!("{crew} dispatched"),
            Self::TaskStarted { title, agent_role } => format!("{agent_role}: {title}"),
            Self::ToolCalled { tool } => format!("Calling {tool}"),
            Self::TaskCompleted { task } => format!("Finished {task}"),
            Self::Completed { report_path } => {
                format!("Report written to {}", report_path.display())
            }
            Self::Failed { message } => format!("error: {message}"),
        }
    }
}

/// Lifecycle of a session's dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DispatchStatus {
    /// Nothing has been submitted yet.
    #[default]
    Idle,
    /// A crew run is in progress.
    Running,
    /// The run finished and the report is available.
    Completed {
        /// Path of the report file.
        report_path: PathBuf,
    },
    /// The run failed.
    Error {
        /// Error text.
        message: String,
    },
}

impl DispatchStatus {
    /// Folds one update into the status. Progress updates leave the status
    /// unchanged.
    pub fn apply(&mut self, update: &DispatchUpdate) {
        match update {
            DispatchUpdate::Started { .. } => *self = Self::Running,
            DispatchUpdate::Completed { report_path } => {
                *self = Self::Completed {
                    report_path: report_path.clone(),
                };
            }
            DispatchUpdate::Failed { message } => {
                *self = Self::Error {
                    message: message.clone(),
                };
            }
            DispatchUpdate::TaskStarted { .. }
            | DispatchUpdate::ToolCalled { .. }
            | DispatchUpdate::TaskCompleted { .. } => {}
        }
    }

    /// Whether a run is still in progress.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Everything the worker needs for one incident.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    /// The classified incident.
    pub context: IncidentContext,
    /// Optional uploaded image.
    pub image: Option<ImageAttachment>,
}

/// Runs incident crews in the background.
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn LlmProvider>,
    output_dir: PathBuf,
    tools: ToolRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher writing into `output_dir` with the standard
    /// crew tools.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, output_dir: PathBuf) -> Self {
        let tools = ToolRegistry::standard(&output_dir);
        Self {
            provider,
            output_dir,
            tools,
        }
    }

    /// Directory reports, images and logs are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Spawns a detached worker for `job` and returns the receiving end of
    /// its update channel.
    ///
    /// The worker always finishes with exactly one `Completed` or `Failed`
    /// update. Dropping the receiver does not stop the worker.
    #[must_use]
    pub fn spawn(&self, job: DispatchJob) -> mpsc::UnboundedReceiver<DispatchUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = self.clone();

        tokio::spawn(async move {
            let incident_id = job.context.id.clone();
            let final_update = match dispatcher.run(job, &tx).await {
                Ok(report_path) => {
                    log::info!("Dispatch for incident {incident_id} completed");
                    DispatchUpdate::Completed { report_path }
                }
                Err(e) => {
                    log::error!("Dispatch for incident {incident_id} failed: {e}");
                    DispatchUpdate::Failed {
                        message: e.to_string(),
                    }
                }
            };
            let _ = tx.send(final_update);
        });

        rx
    }

    /// Runs the whole pipeline for one incident in the current task and
    /// returns the report path.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the crew run fails or the image/report
    /// cannot be written.
    pub async fn run(
        &self,
        job: DispatchJob,
        tx: &mpsc::UnboundedSender<DispatchUpdate>,
    ) -> Result<PathBuf, DispatchError> {
        let DispatchJob { context, image } = job;

        let crew = crew_for(context.category);
        let _ = tx.send(DispatchUpdate::Started {
            crew: crew.name.clone(),
        });

        let image_link = match &image {
            Some(image) => {
                let path = report::save_image(&self.output_dir, &context, image).await?;
                path.strip_prefix(&self.output_dir)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            }
            None => None,
        };

        let (crew_tx, mut crew_rx) = mpsc::unbounded_channel();

        let run = async move {
            run_crew(
                self.provider.as_ref(),
                crew,
                &context,
                &self.tools,
                &crew_tx,
            )
            .await
            .map(|output| (output, context))
        };
        let forward = async {
            while let Some(event) = crew_rx.recv().await {
                if let Some(update) = to_update(event) {
                    let _ = tx.send(update);
                }
            }
        };

        let (result, ()) = tokio::join!(run, forward);
        let (output, context) = result?;

        let markdown = report::render_report(&context, &output, image_link.as_deref());
        report::write_report(&self.output_dir, &context, &markdown).await
    }
}

fn to_update(event: CrewEvent) -> Option<DispatchUpdate> {
    match event {
        CrewEvent::TaskStarted {
            title, agent_role, ..
        } => Some(DispatchUpdate::TaskStarted { title, agent_role }),
        CrewEvent::TaskCompleted { task } => Some(DispatchUpdate::TaskCompleted { task }),
        CrewEvent::Agent {
            event: AgentEvent::ToolCall { tool, .. },
            ..
        } => Some(DispatchUpdate::ToolCalled { tool }),
        CrewEvent::Agent { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_responder_ai::AiError;
    use incident_responder_ai::providers::{
        ContentBlock, LlmResponse, Message, MessageContent, StopReason,
    };
    use incident_responder_incident_models::{IncidentCategory, IncidentSeverity};

    /// Calls the CSV logger when offered, otherwise answers directly.
    struct ScriptedCrewLlm;

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedCrewLlm {
        async fn chat(
            &self,
            _system_prompt: &str,
            messages: &[Message],
            tools: &[serde_json::Value],
        ) -> Result<LlmResponse, AiError> {
            let answered_tool = matches!(
                messages.last().map(|m| &m.content),
                Some(MessageContent::Blocks(blocks))
                    if matches!(blocks.first(), Some(ContentBlock::ToolResult { .. }))
            );
            let offers_csv = tools.iter().any(|t| t["name"] == "csv_logger");

            if offers_csv && !answered_tool {
                return Ok(LlmResponse {
                    content: vec![ContentBlock::ToolUse {
                        id: "csv_logger-1".to_string(),
                        name: "csv_logger".to_string(),
                        input: serde_json::json!({ "id": "abc", "category_incident": "fire" }),
                    }],
                    stop_reason: StopReason::ToolUse,
                });
            }

            Ok(LlmResponse {
                content: vec![ContentBlock::Text {
                    text: "Done.".to_string(),
                }],
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl LlmProvider for Failing {
        async fn chat(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _tools: &[serde_json::Value],
        ) -> Result<LlmResponse, AiError> {
            Err(AiError::Provider {
                message: "model overloaded".to_string(),
            })
        }
    }

    fn job(image: Option<ImageAttachment>) -> DispatchJob {
        reported_by("abc", "Jane", image)
    }

    fn reported_by(id: &str, username: &str, image: Option<ImageAttachment>) -> DispatchJob {
        DispatchJob {
            context: IncidentContext {
                id: id.to_string(),
                username: username.to_string(),
                description: "Smoke in stairwell".to_string(),
                location: "Building A".to_string(),
                category: IncidentCategory::Fire,
                severity: IncidentSeverity::High,
                reported_at: chrono::Utc::now(),
            },
            image,
        }
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<DispatchUpdate>) -> Vec<DispatchUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn completed_run_writes_csv_row_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(ScriptedCrewLlm), dir.path().to_path_buf());
        let image = ImageAttachment {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xff, 0xd8],
        };

        let updates = drain(dispatcher.spawn(job(Some(image)))).await;

        let Some(DispatchUpdate::Completed { report_path }) = updates.last() else {
            panic!("expected Completed, got {updates:?}");
        };
        assert_eq!(report_path, &dir.path().join("fire_incident_report_abc.md"));
        assert!(matches!(updates.first(), Some(DispatchUpdate::Started { .. })));
        assert!(
            updates
                .iter()
                .any(|u| matches!(u, DispatchUpdate::ToolCalled { tool } if tool == "csv_logger"))
        );

        let csv = std::fs::read_to_string(dir.path().join("fire_incidents_log.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);

        let report = std::fs::read_to_string(report_path).unwrap();
        assert!(report.contains("![Incident image](images/abc.jpg)"));
        assert!(dir.path().join("images").join("abc.jpg").exists());

        let mut status = DispatchStatus::default();
        for update in &updates {
            status.apply(update);
        }
        assert_eq!(
            status,
            DispatchStatus::Completed {
                report_path: report_path.clone()
            }
        );
    }

    #[tokio::test]
    async fn failing_llm_yields_failed_update_and_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(Failing), dir.path().to_path_buf());

        let updates = drain(dispatcher.spawn(job(None))).await;

        let mut status = DispatchStatus::Idle;
        for update in &updates {
            status.apply(update);
        }

        let DispatchStatus::Error { message } = status else {
            panic!("expected error status, got {status:?}");
        };
        assert!(message.contains("model overloaded"));
        assert!(!dir.path().join("fire_incident_report_abc.md").exists());
    }

    #[tokio::test]
    async fn same_category_incidents_keep_separate_reports() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(ScriptedCrewLlm), dir.path().to_path_buf());

        let alice = drain(dispatcher.spawn(reported_by("a1", "Alice", None))).await;
        let bob = drain(dispatcher.spawn(reported_by("b2", "Bob", None))).await;

        let (
            Some(DispatchUpdate::Completed { report_path: alice }),
            Some(DispatchUpdate::Completed { report_path: bob }),
        ) = (alice.last(), bob.last())
        else {
            panic!("expected both runs to complete: {alice:?} {bob:?}");
        };
        assert_ne!(alice, bob);

        let alice = std::fs::read_to_string(alice).unwrap();
        let bob = std::fs::read_to_string(bob).unwrap();
        assert!(alice.contains("| Reporter | Alice |"));
        assert!(!alice.contains("Bob"));
        assert!(bob.contains("| Reporter | Bob |"));
    }

    #[test]
    fn progress_updates_do_not_change_status() {
        let mut status = DispatchStatus::Running;
        status.apply(&DispatchUpdate::ToolCalled {
            tool: "csv_logger".to_string(),
        });
        assert!(status.is_running());
    }
}
