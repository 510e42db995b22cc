//! Agent loop orchestration.
//!
//! Implements the agentic tool-use loop: task prompt -> LLM decides
//! tools -> execute tools -> feed results back -> repeat until final answer.
//! The tools themselves are supplied by the caller through [`ToolExecutor`].

use tokio::sync::mpsc;

use crate::providers::{
    ContentBlock, LlmProvider, Message, MessageContent, StopReason, extract_text,
};
use crate::{AgentEvent, AgentOutcome, AiError};

/// Maximum number of agent loop iterations to prevent infinite loops.
pub const MAX_ITERATIONS: u32 = 10;

/// Maximum size of a tool result string before truncation.
/// Prevents overwhelming the LLM context window.
const MAX_TOOL_RESULT_BYTES: usize = 8000;

/// A set of tools the agent may call.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    /// JSON tool definitions (`name`, `description`, `parameters`) offered to
    /// the model.
    fn definitions(&self) -> Vec<serde_json::Value>;

    /// Executes the named tool and returns its textual result.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the tool is unknown or fails. The error text is
    /// fed back to the model rather than aborting the loop.
    async fn execute(&self, name: &str, input: &serde_json::Value) -> Result<String, AiError>;
}

/// Runs the AI agent loop for a single prompt.
///
/// Sends [`AgentEvent`]s through the provided channel as the agent works.
/// The final event will be either `AgentEvent::Answer` or `AgentEvent::Error`.
/// The returned [`AgentOutcome`] always carries the message history, even
/// when the loop fails.
pub async fn run_agent(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    prompt: &str,
    tools: &dyn ToolExecutor,
    tx: &mpsc::UnboundedSender<AgentEvent>,
) -> AgentOutcome {
    let mut messages = vec![Message {
        role: "user".to_string(),
        content: MessageContent::Text(prompt.to_string()),
    }];

    let result = agent_loop(provider, system_prompt, tools, tx, &mut messages).await;

    match &result {
        Ok(text) => {
            let _ = tx.send(AgentEvent::Answer { text: text.clone() });
        }
        Err(e) => {
            let _ = tx.send(AgentEvent::Error {
                message: e.to_string(),
            });
        }
    }

    AgentOutcome { messages, result }
}

async fn agent_loop(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    tools: &dyn ToolExecutor,
    tx: &mpsc::UnboundedSender<AgentEvent>,
    messages: &mut Vec<Message>,
) -> Result<String, AiError> {
    let definitions = tools.definitions();

    for iteration in 0..MAX_ITERATIONS {
        log::debug!("Agent iteration {iteration}");

        let _ = tx.send(AgentEvent::Thinking {
            message: if iteration == 0 {
                "Working on the task...".to_string()
            } else {
                "Processing tool results...".to_string()
            },
        });

        let response = provider.chat(system_prompt, messages, &definitions).await?;

        let wants_tools = response.stop_reason == StopReason::ToolUse
            && response
                .content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

        if !wants_tools {
            let text = extract_text(&response.content);
            messages.push(Message {
                role: "assistant".to_string(),
                content: MessageContent::Blocks(response.content),
            });
            return Ok(text);
        }

        let mut tool_results = Vec::new();

        for block in &response.content {
            if let ContentBlock::ToolUse { id, name, input } = block {
                let _ = tx.send(AgentEvent::ToolCall {
                    tool: name.clone(),
                    params: input.clone(),
                });

                let (summary, content) = match tools.execute(name, input).await {
                    Ok(raw) => (summarize(&raw), truncate(raw)),
                    Err(e) => {
                        log::warn!("Tool {name} failed: {e}");
                        let msg = format!("Tool error: {e}");
                        (msg.clone(), msg)
                    }
                };

                let _ = tx.send(AgentEvent::ToolResult {
                    tool: name.clone(),
                    summary,
                });

                tool_results.push(ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    tool_name: name.clone(),
                    content,
                });
            }
        }

        messages.push(Message {
            role: "assistant".to_string(),
            content: MessageContent::Blocks(response.content),
        });

        // Add tool results as a user message
        messages.push(Message {
            role: "user".to_string(),
            content: MessageContent::Blocks(tool_results),
        });
    }

    Err(AiError::MaxIterations {
        max_iterations: MAX_ITERATIONS,
    })
}

/// Truncates large results to avoid overwhelming the LLM.
fn truncate(raw: String) -> String {
    if raw.len() <= MAX_TOOL_RESULT_BYTES {
        return raw;
    }

    let mut cut = MAX_TOOL_RESULT_BYTES;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated, {} bytes total)", &raw[..cut], raw.len())
}

/// First line of a tool result, used as a short progress summary.
fn summarize(raw: &str) -> String {
    let first = raw.lines().next().unwrap_or("").trim();
    if first.is_empty() {
        "Result received".to_string()
    } else if first.chars().count() > 120 {
        let short: String = first.chars().take(120).collect();
        format!("{short}...")
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LlmResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<LlmResponse>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _tools: &[serde_json::Value],
        ) -> Result<LlmResponse, AiError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AiError::Provider {
                    message: "script exhausted".to_string(),
                })
        }
    }

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolExecutor for EchoTool {
        fn definitions(&self) -> Vec<serde_json::Value> {
            vec![serde_json::json!({
                "name": "echo",
                "description": "Echoes its input",
                "parameters": { "type": "object", "properties": {} },
            })]
        }

        async fn execute(&self, name: &str, input: &serde_json::Value) -> Result<String, AiError> {
            match name {
                "echo" => Ok(format!("echo: {input}")),
                other => Err(AiError::ToolExecution {
                    message: format!("Unknown tool: {other}"),
                }),
            }
        }
    }

    fn tool_call(name: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::ToolUse {
                id: format!("{name}-1"),
                name: name.to_string(),
                input: serde_json::json!({ "x": 1 }),
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    fn answer(text: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
        }
    }

    #[tokio::test]
    async fn executes_tool_then_returns_answer() {
        let provider = ScriptedProvider::new(vec![tool_call("echo"), answer("done")]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = run_agent(&provider, "sys", "task", &EchoTool, &tx).await;
        drop(tx);

        assert_eq!(outcome.result.unwrap(), "done");
        // user, assistant(tool_use), user(tool_result), assistant(answer)
        assert_eq!(outcome.messages.len(), 4);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.iter().any(
            |e| matches!(e, AgentEvent::ToolResult { tool, summary } if tool == "echo" && summary.starts_with("echo:"))
        ));
        assert!(matches!(events.last(), Some(AgentEvent::Answer { text }) if text == "done"));
    }

    #[tokio::test]
    async fn unknown_tool_error_is_fed_back() {
        let provider = ScriptedProvider::new(vec![tool_call("missing"), answer("ok")]);
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = run_agent(&provider, "", "task", &EchoTool, &tx).await;

        assert!(outcome.result.is_ok());
        let MessageContent::Blocks(blocks) = &outcome.messages[2].content else {
            panic!("expected tool results");
        };
        assert!(matches!(
            &blocks[0],
            ContentBlock::ToolResult { content, .. } if content.starts_with("Tool error:")
        ));
    }

    #[tokio::test]
    async fn provider_error_keeps_history() {
        let provider = ScriptedProvider::new(vec![tool_call("echo")]);
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = run_agent(&provider, "", "task", &EchoTool, &tx).await;

        assert!(matches!(outcome.result, Err(AiError::Provider { .. })));
        assert_eq!(outcome.messages.len(), 3);
    }

    #[tokio::test]
    async fn stops_after_max_iterations() {
        let script = (0..MAX_ITERATIONS).map(|_| tool_call("echo")).collect();
        let provider = ScriptedProvider::new(script);
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = run_agent(&provider, "", "task", &EchoTool, &tx).await;

        assert!(matches!(
            outcome.result,
            Err(AiError::MaxIterations { max_iterations }) if max_iterations == MAX_ITERATIONS
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let raw = "é".repeat(MAX_TOOL_RESULT_BYTES);
        let truncated = truncate(raw);
        assert!(truncated.contains("(truncated"));
    }
}
