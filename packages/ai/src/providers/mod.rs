//! LLM provider abstraction and implementations.
//!
//! Supports Google Gemini, `OpenAI`, and Anthropic Claude via a common trait.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use base64::Engine as _;
use incident_responder_incident_models::ImageAttachment;
use serde::{Deserialize, Serialize};

use crate::AiError;

/// Model used when `AI_MODEL` is not set and Gemini is selected.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-001";

/// Environment variables checked, in order, for a Gemini API key.
pub const GEMINI_KEY_VARS: &[&str] = &["GEMINI_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "user" or "assistant".
    pub role: String,
    /// Message content.
    pub content: MessageContent,
}

/// Content of a message: either simple text or structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content.
    Text(String),
    /// Structured content blocks (images, tool results, etc.).
    Blocks(Vec<ContentBlock>),
}

/// A structured content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// An inline image.
    Image {
        /// MIME type of the image.
        mime_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
    /// A tool use request from the assistant.
    ToolUse {
        /// Unique ID for this tool use.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input parameters.
        input: serde_json::Value,
    },
    /// A tool result being sent back.
    ToolResult {
        /// The `tool_use` ID this result corresponds to.
        tool_use_id: String,
        /// Name of the tool that produced this result.
        tool_name: String,
        /// The result content.
        content: String,
    },
}

impl ContentBlock {
    /// Builds an [`ContentBlock::Image`] block from raw image bytes.
    #[must_use]
    pub fn image(image: &ImageAttachment) -> Self {
        Self::Image {
            mime_type: image.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&image.data),
        }
    }
}

/// Extracts text content from content blocks, joined by newlines.
#[must_use]
pub fn extract_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| {
            if let ContentBlock::Text { text } = b {
                Some(text.as_str())
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Response from the LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Content blocks in the response.
    pub content: Vec<ContentBlock>,
    /// Whether the model wants to use tools (vs. providing a final answer).
    pub stop_reason: StopReason,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Model finished its response naturally.
    EndTurn,
    /// Model wants to call one or more tools.
    ToolUse,
    /// Maximum tokens reached.
    MaxTokens,
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request with tool definitions.
    ///
    /// An empty `system_prompt` is not sent to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError>;
}

/// Creates an LLM provider based on environment variables.
///
/// If `AI_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `GEMINI_KEY` (or `GEMINI_API_KEY` / `GOOGLE_API_KEY`) set -> Gemini
/// 2. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 3. `OPENAI_API_KEY` set -> `OpenAI`
///
/// # Errors
///
/// Returns [`AiError::Config`] if no credentials are found or the
/// explicitly requested provider is not configured.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| detect_provider());
    let model = std::env::var("AI_MODEL").ok();

    match provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            let api_key = gemini_api_key().ok_or_else(|| AiError::Config {
                message: format!(
                    "None of {} environment variables are set",
                    GEMINI_KEY_VARS.join(", ")
                ),
            })?;
            let model = model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
            Ok(Box::new(gemini::GeminiProvider::new(api_key, model)))
        }
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = model.unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(api_key, model)))
        }
        "openai" | "gpt" => {
            let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| AiError::Config {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            })?;
            let model = model.unwrap_or_else(|| "gpt-4o".to_string());
            let mut provider = openai::OpenAiProvider::new(api_key, model);
            if let Ok(base_url) = std::env::var("AI_BASE_URL") {
                provider = provider.with_base_url(base_url);
            }
            Ok(Box::new(provider))
        }
        other => Err(AiError::Config {
            message: format!("Unknown AI provider: {other}. Use 'gemini', 'anthropic', or 'openai'."),
        }),
    }
}

fn gemini_api_key() -> Option<String> {
    GEMINI_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Auto-detects which provider to use based on available credentials.
///
/// Returns a provider name string that matches the arms in
/// [`create_provider_from_env`].
fn detect_provider() -> String {
    if gemini_api_key().is_some() {
        log::info!("Auto-detected AI provider: Gemini");
        return "gemini".to_string();
    }

    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
        return "anthropic".to_string();
    }

    if std::env::var("OPENAI_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI (OPENAI_API_KEY found)");
        return "openai".to_string();
    }

    log::warn!(
        "No AI credentials detected. Set one of: GEMINI_KEY, ANTHROPIC_API_KEY, \
         OPENAI_API_KEY. You can also set AI_PROVIDER explicitly."
    );

    // Fall back to gemini, which will produce a clear error about the missing key
    "gemini".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_block_is_base64_encoded() {
        let image = ImageAttachment {
            mime_type: "image/jpeg".to_string(),
            data: b"hello".to_vec(),
        };
        let ContentBlock::Image { mime_type, data } = ContentBlock::image(&image) else {
            panic!("expected image block");
        };
        assert_eq!(mime_type, "image/jpeg");
        assert_eq!(data, "aGVsbG8=");
    }

    #[test]
    fn extract_text_skips_non_text_blocks() {
        let blocks = vec![
            ContentBlock::Text {
                text: "a".to_string(),
            },
            ContentBlock::ToolUse {
                id: "1".to_string(),
                name: "csv_logger".to_string(),
                input: serde_json::json!({}),
            },
            ContentBlock::Text {
                text: "b".to_string(),
            },
        ];
        assert_eq!(extract_text(&blocks), "a\nb");
    }

    #[test]
    fn content_block_serializes_with_snake_case_tag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "x".to_string(),
            tool_name: "notify_authority".to_string(),
            content: "ok".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_name"], "notify_authority");
    }
}
