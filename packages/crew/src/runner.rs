//! Sequential crew runner.
//!
//! Tasks run strictly in declaration order. Each task is one agent loop
//! using the assigned agent's persona as system prompt and its declared
//! tools; the outputs of earlier tasks are appended to the prompt of every
//! later task. The first failing task aborts the run.

use std::fmt::Write as _;

use incident_responder_ai::AgentEvent;
use incident_responder_ai::agent::run_agent;
use incident_responder_ai::providers::LlmProvider;
use incident_responder_incident_models::IncidentContext;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::CrewError;
use crate::definition::{CrewDefinition, TaskDefinition, interpolate};
use crate::tools::ToolRegistry;

/// Progress reported while a crew runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CrewEvent {
    /// A task is about to start.
    TaskStarted {
        /// Task id.
        task: String,
        /// Task heading.
        title: String,
        /// Role of the agent performing it.
        agent_role: String,
    },
    /// The task's agent reported progress.
    Agent {
        /// Task id.
        task: String,
        /// The agent event.
        event: AgentEvent,
    },
    /// A task finished successfully.
    TaskCompleted {
        /// Task id.
        task: String,
    },
}

/// Result of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutput {
    /// Task id.
    pub id: String,
    /// Task heading.
    pub title: String,
    /// Role of the agent that performed it.
    pub agent_role: String,
    /// Final answer text.
    pub output: String,
}

/// Result of a full crew run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrewOutput {
    /// Name of the crew that ran.
    pub crew_name: String,
    /// Task results, in execution order.
    pub tasks: Vec<TaskOutput>,
}

fn task_prompt(task: &TaskDefinition, context: &IncidentContext, previous: &[TaskOutput]) -> String {
    let mut prompt = interpolate(task.description.trim(), context);

    let _ = write!(
        prompt,
        "\n\nExpected output: {}",
        interpolate(task.expected_output.trim(), context)
    );

    if !previous.is_empty() {
        prompt.push_str("\n\nContext from previous tasks:");
        for output in previous {
            let _ = write!(prompt, "\n\n### {}\n{}", output.title, output.output.trim());
        }
    }

    prompt
}

/// Runs every task of `crew` in order for the given incident.
///
/// Progress is sent through `tx`; a closed receiver is ignored.
///
/// # Errors
///
/// Returns [`CrewError::Definition`] if a task references an undeclared
/// agent, and [`CrewError::Task`] if a task's agent loop fails.
pub async fn run_crew(
    provider: &dyn LlmProvider,
    crew: &CrewDefinition,
    context: &IncidentContext,
    tools: &ToolRegistry,
    tx: &mpsc::UnboundedSender<CrewEvent>,
) -> Result<CrewOutput, CrewError> {
    log::info!(
        "Running {} for incident {} ({} tasks)",
        crew.name,
        context.id,
        crew.tasks.len()
    );

    let mut outputs: Vec<TaskOutput> = Vec::with_capacity(crew.tasks.len());

    for task in &crew.tasks {
        let agent = crew.agent(&task.agent).ok_or_else(|| CrewError::Definition {
            message: format!("task '{}' references unknown agent '{}'", task.id, task.agent),
        })?;

        log::info!("Starting task {} ({})", task.id, agent.role);

        let _ = tx.send(CrewEvent::TaskStarted {
            task: task.id.clone(),
            title: task.title.clone(),
            agent_role: agent.role.clone(),
        });

        let system_prompt = agent.system_prompt();
        let prompt = task_prompt(task, context, &outputs);
        let toolbox = tools.toolbox(&agent.tools);

        let (agent_tx, mut agent_rx) = mpsc::unbounded_channel();

        let run = async move {
            run_agent(provider, &system_prompt, &prompt, &toolbox, &agent_tx).await
            // agent_tx dropped here, ending the forwarding loop below
        };
        let forward = async {
            while let Some(event) = agent_rx.recv().await {
                let _ = tx.send(CrewEvent::Agent {
                    task: task.id.clone(),
                    event,
                });
            }
        };

        let (outcome, ()) = tokio::join!(run, forward);

        let output = outcome.result.map_err(|source| {
            log::error!("Task {} failed: {source}", task.id);
            CrewError::Task {
                task: task.id.clone(),
                source,
            }
        })?;

        let _ = tx.send(CrewEvent::TaskCompleted {
            task: task.id.clone(),
        });

        outputs.push(TaskOutput {
            id: task.id.clone(),
            title: task.title.clone(),
            agent_role: agent.role.clone(),
            output,
        });
    }

    Ok(CrewOutput {
        crew_name: crew.name.clone(),
        tasks: outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::crew_for;
    use incident_responder_ai::AiError;
    use incident_responder_ai::providers::{
        ContentBlock, LlmResponse, Message, MessageContent, StopReason,
    };
    use incident_responder_incident_models::{IncidentCategory, IncidentSeverity};
    use std::sync::Mutex;

    /// Calls the first offered tool once per task, then answers with the
    /// tool's result. Records every prompt it sees.
    struct ToolThenAnswer {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ToolThenAnswer {
        async fn chat(
            &self,
            _system_prompt: &str,
            messages: &[Message],
            tools: &[serde_json::Value],
        ) -> Result<LlmResponse, AiError> {
            if let MessageContent::Text(prompt) = &messages[0].content
                && messages.len() == 1
            {
                self.prompts.lock().unwrap().push(prompt.clone());
            }

            if let Some(MessageContent::Blocks(blocks)) = messages.last().map(|m| &m.content)
                && let Some(ContentBlock::ToolResult { content, .. }) = blocks.first()
            {
                return Ok(LlmResponse {
                    content: vec![ContentBlock::Text {
                        text: content.clone(),
                    }],
                    stop_reason: StopReason::EndTurn,
                });
            }

            let Some(tool) = tools.first() else {
                return Ok(LlmResponse {
                    content: vec![ContentBlock::Text {
                        text: "Stay calm and leave the building.".to_string(),
                    }],
                    stop_reason: StopReason::EndTurn,
                });
            };

            let name = tool["name"].as_str().unwrap_or_default().to_string();
            let input = if name == "csv_logger" {
                serde_json::json!({ "id": "abc", "severity": "high" })
            } else {
                serde_json::json!({
                    "authority": "Fire Department",
                    "subject": "High severity fire",
                    "body": "Smoke in stairwell",
                })
            };

            Ok(LlmResponse {
                content: vec![ContentBlock::ToolUse {
                    id: format!("{name}-1"),
                    name,
                    input,
                }],
                stop_reason: StopReason::ToolUse,
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
                message: "unavailable".to_string(),
            })
        }
    }

    fn context() -> IncidentContext {
        IncidentContext {
            id: "abc".to_string(),
            username: "Jane".to_string(),
            description: "Smoke in stairwell".to_string(),
            location: "Building A".to_string(),
            category: IncidentCategory::Fire,
            severity: IncidentSeverity::High,
            reported_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn runs_all_tasks_and_invokes_tools() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ToolThenAnswer {
            prompts: Mutex::new(Vec::new()),
        };
        let crew = crew_for(IncidentCategory::Fire);
        let tools = ToolRegistry::standard(dir.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let output = run_crew(&provider, crew, &context(), &tools, &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(output.tasks.len(), 3);
        assert_eq!(output.tasks[0].output, "Stay calm and leave the building.");
        assert!(output.tasks[1].output.starts_with("Incident logged to "));
        assert!(output.tasks[2].output.starts_with("Notification sent to "));

        let csv = std::fs::read_to_string(dir.path().join("fire_incidents_log.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(dir.path().join("notifications.jsonl").exists());

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Building A"));
        assert!(!prompts[0].contains("Context from previous tasks"));
        assert!(prompts[2].contains("### Incident Log"));

        let mut completed = 0;
        while let Some(event) = rx.recv().await {
            if matches!(event, CrewEvent::TaskCompleted { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 3);
    }

    #[tokio::test]
    async fn failing_provider_aborts_on_first_task() {
        let dir = tempfile::tempdir().unwrap();
        let crew = crew_for(IncidentCategory::Medical);
        let tools = ToolRegistry::standard(dir.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = run_crew(&Failing, crew, &context(), &tools, &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::Task { ref task, .. } if task == "guidance_collect_info"));
        assert!(!dir.path().join("fire_incidents_log.csv").exists());
    }
}
