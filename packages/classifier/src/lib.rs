#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Best-effort incident classification.
//!
//! The LLM is asked for a single word; the reply is lower-cased and scanned
//! for each known value in a fixed order, and the first substring hit wins.
//! Provider failures and unrecognised replies fall back to
//! [`IncidentCategory::DEFAULT`] and [`IncidentSeverity::DEFAULT`]. Neither
//! function ever returns an error.

use incident_responder_ai::complete_text;
use incident_responder_ai::providers::LlmProvider;
use incident_responder_incident_models::{ImageAttachment, IncidentCategory, IncidentSeverity};

const CATEGORY_PROMPT: &str = "Classify the incident into one of these categories strictly: \
    fire, medical, police, accident, other. Respond with only one word.";

const SEVERITY_PROMPT: &str = "You are a safety classifier. Classify fire incident severity \
    as one of: low, medium, high. Base your decision on the description (and image if \
    provided). Respond with only one word: low, medium, or high.";

fn build_prompt(instruction: &str, description: &str) -> String {
    format!("{instruction}\n\nDescription:\n{description}")
}

/// Returns the first candidate whose name occurs in `reply`.
fn first_match<T: AsRef<str> + Copy>(reply: &str, candidates: &[T]) -> Option<T> {
    let reply = reply.trim().to_lowercase();
    candidates.iter().copied().find(|c| {
        let name: &str = c.as_ref();
        reply.contains(name)
    })
}

/// Classifies the incident into one of the [`IncidentCategory`] values.
///
/// Returns [`IncidentCategory::DEFAULT`] if the provider fails or the reply
/// names no known category.
pub async fn classify_category(
    provider: &dyn LlmProvider,
    description: &str,
    image: Option<&ImageAttachment>,
) -> IncidentCategory {
    let prompt = build_prompt(CATEGORY_PROMPT, description);

    match complete_text(provider, "", &prompt, image).await {
        Ok(reply) => first_match(&reply, IncidentCategory::all()).unwrap_or_else(|| {
            log::warn!(
                "Unrecognised category reply {reply:?}, defaulting to {}",
                IncidentCategory::DEFAULT
            );
            IncidentCategory::DEFAULT
        }),
        Err(e) => {
            log::warn!(
                "Category classification failed, defaulting to {}: {e}",
                IncidentCategory::DEFAULT
            );
            IncidentCategory::DEFAULT
        }
    }
}

/// Classifies how urgent the incident is.
///
/// Returns [`IncidentSeverity::DEFAULT`] if the provider fails or the reply
/// names no known severity.
pub async fn classify_severity(
    provider: &dyn LlmProvider,
    description: &str,
    image: Option<&ImageAttachment>,
) -> IncidentSeverity {
    let prompt = build_prompt(SEVERITY_PROMPT, description);

    match complete_text(provider, "", &prompt, image).await {
        Ok(reply) => first_match(&reply, IncidentSeverity::match_order()).unwrap_or_else(|| {
            log::warn!(
                "Unrecognised severity reply {reply:?}, defaulting to {}",
                IncidentSeverity::DEFAULT
            );
            IncidentSeverity::DEFAULT
        }),
        Err(e) => {
            log::warn!(
                "Severity classification failed, defaulting to {}: {e}",
                IncidentSeverity::DEFAULT
            );
            IncidentSeverity::DEFAULT
        }
    }
}

/// Runs both classifications.
pub async fn classify(
    provider: &dyn LlmProvider,
    description: &str,
    image: Option<&ImageAttachment>,
) -> (IncidentCategory, IncidentSeverity) {
    let category = classify_category(provider, description, image).await;
    let severity = classify_severity(provider, description, image).await;
    log::info!("Classified incident as {category}/{severity}");
    (category, severity)
}
