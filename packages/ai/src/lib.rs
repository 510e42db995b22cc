#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM provider abstraction, multimodal completion and tool-use agent loop.
//!
//! Supports Google Gemini (the default), `OpenAI` (and any
//! `OpenAI`-compatible server via `AI_BASE_URL`) and Anthropic Claude
//! behind the [`providers::LlmProvider`] trait. Two ways of talking to a
//! provider are exposed:
//!
//! - [`complete_text`] for single-shot prompts (classification, chat,
//!   mindmap generation), optionally with an attached image.
//! - [`agent::run_agent`] for the multi-step tool-calling loop used by the
//!   dispatch crews.

pub mod agent;
pub mod providers;

use incident_responder_incident_models::ImageAttachment;
use thiserror::Error;

use crate::providers::{ContentBlock, LlmProvider, Message, MessageContent, extract_text};

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A tool invoked by the agent failed.
    #[error("Tool execution error: {message}")]
    ToolExecution {
        /// Description of what went wrong.
        message: String,
    },

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Agent loop exceeded maximum iterations.
    #[error("Agent loop exceeded maximum of {max_iterations} iterations")]
    MaxIterations {
        /// The configured maximum.
        max_iterations: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// The result of an agent run, always containing the accumulated messages
/// regardless of whether the agent succeeded or failed.
pub struct AgentOutcome {
    /// The full message history, including tool calls and results
    /// accumulated before completion or failure.
    pub messages: Vec<Message>,

    /// The final answer text, or the error that caused the agent to stop.
    pub result: Result<String, AiError>,
}

/// Events emitted by the agent during execution.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    /// Agent is thinking / planning.
    Thinking {
        /// Brief description of what the agent is considering.
        message: String,
    },
    /// Agent is invoking a tool.
    ToolCall {
        /// Tool name.
        tool: String,
        /// Tool parameters (JSON).
        params: serde_json::Value,
    },
    /// Tool execution completed.
    ToolResult {
        /// Tool name.
        tool: String,
        /// Brief summary of the result.
        summary: String,
    },
    /// Agent has produced a final answer.
    Answer {
        /// The markdown-formatted answer.
        text: String,
    },
    /// An error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Sends a single prompt (plus an optional image) and returns the text of
/// the reply.
///
/// No tools are offered to the model, so the reply is always a final
/// answer.
///
/// # Errors
///
/// Returns [`AiError`] if the provider call fails.
pub async fn complete_text(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    prompt: &str,
    image: Option<&ImageAttachment>,
) -> Result<String, AiError> {
    let content = match image {
        Some(image) => MessageContent::Blocks(vec![
            ContentBlock::Text {
                text: prompt.to_string(),
            },
            ContentBlock::image(image),
        ]),
        None => MessageContent::Text(prompt.to_string()),
    };

    let messages = [Message {
        role: "user".to_string(),
        content,
    }];

    let response = provider.chat(system_prompt, &messages, &[]).await?;

    Ok(extract_text(&response.content))
}
