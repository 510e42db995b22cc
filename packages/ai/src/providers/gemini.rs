//! Google Gemini provider implementation (`generateContent` REST API).

use serde::{Deserialize, Serialize};

use super::{ContentBlock, LlmProvider, LlmResponse, Message, MessageContent, StopReason};
use crate::AiError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a new Gemini provider.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn text_part(text: &str) -> GeminiPart {
    GeminiPart {
        text: Some(text.to_string()),
        ..GeminiPart::default()
    }
}

fn block_to_part(block: &ContentBlock) -> GeminiPart {
    match block {
        ContentBlock::Text { text } => text_part(text),
        ContentBlock::Image { mime_type, data } => GeminiPart {
            inline_data: Some(InlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            ..GeminiPart::default()
        },
        ContentBlock::ToolUse { name, input, .. } => GeminiPart {
            function_call: Some(FunctionCall {
                name: name.clone(),
                args: input.clone(),
            }),
            ..GeminiPart::default()
        },
        ContentBlock::ToolResult {
            tool_name, content, ..
        } => GeminiPart {
            function_response: Some(FunctionResponse {
                name: tool_name.clone(),
                response: serde_json::json!({ "content": content }),
            }),
            ..GeminiPart::default()
        },
    }
}

/// Gemini only knows the roles `user` and `model`.
fn to_gemini_content(message: &Message) -> GeminiContent {
    let role = if message.role == "assistant" {
        "model"
    } else {
        "user"
    };

    let parts = match &message.content {
        MessageContent::Text(text) => vec![text_part(text)],
        MessageContent::Blocks(blocks) => blocks.iter().map(block_to_part).collect(),
    };

    GeminiContent {
        role: Some(role.to_string()),
        parts,
    }
}

/// Converts a candidate back into content blocks. Gemini does not assign
/// ids to function calls, so one is generated per call.
fn from_candidate(candidate: GeminiCandidate) -> LlmResponse {
    let mut content = Vec::new();

    for part in candidate.content.parts {
        if let Some(text) = part.text
            && !text.is_empty()
        {
            content.push(ContentBlock::Text { text });
        }
        if let Some(call) = part.function_call {
            content.push(ContentBlock::ToolUse {
                id: format!("{}-{}", call.name, uuid::Uuid::new_v4()),
                name: call.name,
                input: call.args,
            });
        }
    }

    let has_tool_calls = content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

    let stop_reason = if has_tool_calls {
        StopReason::ToolUse
    } else if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        StopReason::MaxTokens
    } else {
        StopReason::EndTurn
    };

    LlmResponse {
        content,
        stop_reason,
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError> {
        let system_instruction = (!system_prompt.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![text_part(system_prompt)],
        });

        let tools = if tools.is_empty() {
            vec![]
        } else {
            vec![GeminiTools {
                function_declarations: tools.to_vec(),
            }]
        };

        let request = GeminiRequest {
            system_instruction,
            contents: messages.iter().map(to_gemini_content).collect(),
            tools,
            generation_config: GenerationConfig {
                max_output_tokens: 4096,
            },
        };

        let resp = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: GeminiError = serde_json::from_str(&body).unwrap_or_else(|_| GeminiError {
                error: GeminiErrorDetail {
                    message: format!("HTTP {status}: {body}"),
                },
            });
            return Err(AiError::Provider {
                message: err.error.message,
            });
        }

        let response: GeminiResponse = serde_json::from_str(&body)?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Provider {
                message: "No candidates in Gemini response".to_string(),
            })?;

        Ok(from_candidate(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_role_maps_to_model() {
        let content = to_gemini_content(&Message {
            role: "assistant".to_string(),
            content: MessageContent::Text("hi".to_string()),
        });
        assert_eq!(content.role.as_deref(), Some("model"));
        assert_eq!(content.parts[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn image_becomes_inline_data() {
        let json = serde_json::to_value(block_to_part(&ContentBlock::Image {
            mime_type: "image/png".to_string(),
            data: "iVBO".to_string(),
        }))
        .unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["inlineData"]["data"], "iVBO");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn tool_result_becomes_function_response() {
        let json = serde_json::to_value(block_to_part(&ContentBlock::ToolResult {
            tool_use_id: "csv_logger-1".to_string(),
            tool_name: "csv_logger".to_string(),
            content: "Incident logged".to_string(),
        }))
        .unwrap();
        assert_eq!(json["functionResponse"]["name"], "csv_logger");
        assert_eq!(
            json["functionResponse"]["response"]["content"],
            "Incident logged"
        );
    }

    #[test]
    fn function_call_candidate_is_tool_use() {
        let candidate: GeminiCandidate = serde_json::from_value(serde_json::json!({
            "content": {
                "role": "model",
                "parts": [{ "functionCall": { "name": "csv_logger", "args": { "id": "1" } } }]
            },
            "finishReason": "STOP"
        }))
        .unwrap();
        let response = from_candidate(candidate);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        let ContentBlock::ToolUse { id, name, input } = &response.content[0] else {
            panic!("expected tool use");
        };
        assert!(id.starts_with("csv_logger-"));
        assert_eq!(name, "csv_logger");
        assert_eq!(input["id"], "1");
    }

    #[test]
    fn max_tokens_finish_reason() {
        let candidate: GeminiCandidate = serde_json::from_value(serde_json::json!({
            "content": { "parts": [{ "text": "partial" }] },
            "finishReason": "MAX_TOKENS"
        }))
        .unwrap();
        let response = from_candidate(candidate);
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
    }
}
