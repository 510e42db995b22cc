#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Assistant chat that runs alongside an incident dispatch.
//!
//! The chat log is append-only. Once an incident has been classified its
//! context is seeded as a single system entry at the head of the log and
//! included in every prompt sent to the model.

use std::fmt::Write as _;

use incident_responder_ai::complete_text;
use incident_responder_ai::providers::LlmProvider;
use incident_responder_incident_models::IncidentContext;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Instruction prepended to every chat prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are an emergency response assistant that reassures the user and provides concise, actionable guidance. Never tell the user to call emergency numbers; instead, state that authorities are already being contacted by the system and provide safety steps relevant to the incident.";

/// Reply recorded when the model returns no text.
pub const EMPTY_REPLY: &str = "Sorry, I couldn't generate a response.";

/// Who wrote a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    /// Incident context seeded by the application
    System,
    /// The reporter
    User,
    /// The model
    Assistant,
}

/// One chat log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    /// Author of the entry.
    pub role: ChatRole,
    /// Entry text (markdown).
    pub text: String,
}

/// Append-only chat log plus the incident context it refers to.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    entries: Vec<ChatEntry>,
    context: Option<IncidentContext>,
}

impl ChatSession {
    /// Creates an empty chat with no incident context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Sets the incident the chat is about.
    ///
    /// The first time a context is set, a system entry describing it is
    /// inserted at the head of the log. Later calls only change the context
    /// used in prompts.
    pub fn set_context(&mut self, context: IncidentContext) {
        if self.entries.first().is_none_or(|e| e.role != ChatRole::System) {
            self.entries.insert(
                0,
                ChatEntry {
                    role: ChatRole::System,
                    text: system_entry(&context),
                },
            );
        }
        self.context = Some(context);
    }

    /// Builds the prompt sent to the model for `message`.
    #[must_use]
    pub fn prompt(&self, message: &str) -> String {
        let mut prompt = SYSTEM_INSTRUCTION.to_string();

        if let Some(ctx) = &self.context {
            let _ = write!(
                prompt,
                "\n\nContext: category={}, severity={}, location={}, reporter={}\nDescription: {}\n",
                ctx.category, ctx.severity, ctx.location, ctx.username, ctx.description
            );
        }

        let _ = write!(prompt, "\n\nUser: {message}");
        prompt
    }

    /// Records `message`, asks the model for a reply and records that too.
    ///
    /// Never fails: provider errors are recorded as an `Error: ...`
    /// assistant entry. Returns the assistant entry's text.
    pub async fn send(&mut self, provider: &dyn LlmProvider, message: &str) -> String {
        self.entries.push(ChatEntry {
            role: ChatRole::User,
            text: message.to_string(),
        });

        let prompt = self.prompt(message);

        let reply = match complete_text(provider, "", &prompt, None).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                log::warn!("Chat request failed: {e}");
                format!("Error: {e}")
            }
        };

        self.entries.push(ChatEntry {
            role: ChatRole::Assistant,
            text: reply.clone(),
        });

        reply
    }
}

fn system_entry(ctx: &IncidentContext) -> String {
    format!(
        "Context: Incident category={}, severity={}, location={}, reporter={}\nDescription: {}",
        ctx.category, ctx.severity, ctx.location, ctx.username, ctx.description
    )
}
