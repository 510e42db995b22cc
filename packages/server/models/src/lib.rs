#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the incident responder server.
//!
//! These types are serialized to JSON for the REST API. They wrap the
//! domain types from the pipeline crates so the API contract can evolve
//! independently.

use incident_responder_chat::ChatEntry;
use incident_responder_dispatch::DispatchStatus;
use incident_responder_incident_models::{
    FieldError, IncidentCategory, IncidentContext, IncidentSeverity,
};
use incident_responder_report::{Mindmap, MindmapNode};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Generic error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
}

impl ApiError {
    /// Wraps a message in an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Response to `POST /api/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Identifier to use in every other session route.
    pub session_id: String,
}

/// An image uploaded with an incident, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiImage {
    /// MIME type reported by the browser.
    pub mime_type: String,
    /// Base64 (standard alphabet) image bytes.
    pub data: String,
}

/// Body of `POST /api/sessions/{id}/incidents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitIncidentRequest {
    /// Reporter name.
    pub name: String,
    /// Incident description.
    pub description: String,
    /// Coordinates or address.
    pub location: String,
    /// Optional photo of the scene.
    pub image: Option<ApiImage>,
}

/// Successful incident submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIncidentResponse {
    /// Generated incident id.
    pub incident_id: String,
    /// Predicted category.
    pub category: IncidentCategory,
    /// Predicted severity.
    pub severity: IncidentSeverity,
    /// Dispatch status right after submission.
    pub status: DispatchStatus,
}

/// Returned with `422 Unprocessable Entity` when required fields are blank.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorResponse {
    /// Summary message.
    pub error: String,
    /// One entry per blank field.
    pub fields: Vec<FieldError>,
}

/// Response to `GET /api/sessions/{id}/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Current dispatch status.
    pub status: DispatchStatus,
    /// Recent progress messages, oldest first.
    pub progress: Vec<String>,
    /// The incident being dispatched, if one was submitted.
    pub incident: Option<IncidentContext>,
}

/// Body of `POST /api/sessions/{id}/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Response to the chat routes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Assistant reply to the message just sent, if any.
    pub reply: Option<String>,
    /// Full chat log.
    pub entries: Vec<ChatEntry>,
}

/// Response to `GET /api/sessions/{id}/mindmap`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MindmapResponse {
    /// Markmap markdown, for client-side rendering.
    pub markdown: String,
    /// Parsed outline.
    pub nodes: Vec<MindmapNode>,
}

impl From<Mindmap> for MindmapResponse {
    fn from(mindmap: Mindmap) -> Self {
        Self {
            markdown: mindmap.markdown,
            nodes: mindmap.nodes,
        }
    }
}
