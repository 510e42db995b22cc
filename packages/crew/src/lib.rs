#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident response crews.
//!
//! A crew is a fixed list of role-based agents and a sequential list of
//! tasks, one crew per [`IncidentCategory`]. Crew definitions live in
//! `packages/crew/crews/*.toml` and are embedded at compile time (see
//! [`registry`]). [`runner::run_crew`] executes the tasks in order, each
//! through the tool-use agent loop, feeding every task's output into the
//! next one as context.
//!
//! [`IncidentCategory`]: incident_responder_incident_models::IncidentCategory

pub mod definition;
pub mod registry;
pub mod runner;
pub mod tools;

use incident_responder_ai::AiError;
use incident_responder_incident_log::IncidentLogError;
use thiserror::Error;

pub use definition::{AgentDefinition, CrewDefinition, TaskDefinition};
pub use runner::{CrewEvent, CrewOutput, TaskOutput, run_crew};
pub use tools::{CrewTool, ToolRegistry};

/// Errors from crew definition loading, tools and crew runs.
#[derive(Debug, Error)]
pub enum CrewError {
    /// A crew definition could not be parsed or is inconsistent.
    #[error("Invalid crew definition: {message}")]
    Definition {
        /// Description of what went wrong.
        message: String,
    },

    /// A task's agent loop failed.
    #[error("Task '{task}' failed: {source}")]
    Task {
        /// Id of the failing task.
        task: String,
        /// Underlying agent error.
        #[source]
        source: AiError,
    },

    /// Tool input did not match the tool's parameters.
    #[error("Invalid input for tool '{tool}': {message}")]
    ToolInput {
        /// Tool name.
        tool: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The CSV incident log could not be written.
    #[error(transparent)]
    IncidentLog(#[from] IncidentLogError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
