//! Tools that crew agents can invoke.
//!
//! Each tool implements [`CrewTool`]. A [`ToolRegistry`] holds every tool
//! available to a crew run and hands each agent a [`Toolbox`] restricted to
//! the tools that agent declares.

pub mod csv_logger;
pub mod notify;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use incident_responder_ai::AiError;
use incident_responder_ai::agent::ToolExecutor;

use crate::CrewError;

pub use csv_logger::CsvLoggerTool;
pub use notify::NotifyAuthorityTool;

/// Names of the tools provided by [`ToolRegistry::standard`].
pub const KNOWN_TOOLS: &[&str] = &[csv_logger::TOOL_NAME, notify::TOOL_NAME];

/// A side effect an agent can trigger through function calling.
#[async_trait::async_trait]
pub trait CrewTool: Send + Sync {
    /// Tool name exposed to the LLM.
    fn name(&self) -> &'static str;

    /// One-line description exposed to the LLM.
    fn description(&self) -> &'static str;

    /// JSON schema of the tool's input object.
    fn parameters(&self) -> serde_json::Value;

    /// Runs the tool and returns a short textual result for the LLM.
    ///
    /// # Errors
    ///
    /// Returns [`CrewError`] if the input is invalid or the side effect fails.
    async fn execute(&self, input: &serde_json::Value) -> Result<String, CrewError>;

    /// Tool definition in the provider-neutral format used by
    /// [`incident_responder_ai::providers::LlmProvider::chat`].
    fn definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters(),
        })
    }
}

/// Every tool available to a crew run, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn CrewTool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the CSV logger and authority notification tools,
    /// both writing under `output_dir`.
    #[must_use]
    pub fn standard(output_dir: &Path) -> Self {
        Self::new()
            .with(CsvLoggerTool::in_dir(output_dir))
            .with(NotifyAuthorityTool::in_dir(output_dir))
    }

    /// Adds (or replaces) a tool.
    #[must_use]
    pub fn with(mut self, tool: impl CrewTool + 'static) -> Self {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        self
    }

    /// Names of all registered tools.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// A toolbox exposing only the named tools. Names not in the registry
    /// are skipped with a warning.
    #[must_use]
    pub fn toolbox(&self, names: &[String]) -> Toolbox {
        let tools = names
            .iter()
            .filter_map(|name| {
                let tool = self.tools.get(name).cloned();
                if tool.is_none() {
                    log::warn!("Tool '{name}' is not registered, skipping");
                }
                tool
            })
            .collect();
        Toolbox { tools }
    }
}

/// The tools one agent may call.
pub struct Toolbox {
    tools: Vec<Arc<dyn CrewTool>>,
}

#[async_trait::async_trait]
impl ToolExecutor for Toolbox {
    fn definitions(&self) -> Vec<serde_json::Value> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn execute(&self, name: &str, input: &serde_json::Value) -> Result<String, AiError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| AiError::ToolExecution {
                message: format!("Unknown tool: {name}"),
            })?;

        log::info!("Executing tool {name}");

        tool.execute(input)
            .await
            .map_err(|e| AiError::ToolExecution {
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_known_tools() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::standard(dir.path());
        let mut names = registry.names();
        names.sort_unstable();
        let mut known = KNOWN_TOOLS.to_vec();
        known.sort_unstable();
        assert_eq!(names, known);
    }

    #[test]
    fn toolbox_only_exposes_requested_tools() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::standard(dir.path());
        let toolbox = registry.toolbox(&[csv_logger::TOOL_NAME.to_string(), "missing".to_string()]);
        let definitions = toolbox.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0]["name"], csv_logger::TOOL_NAME);
    }

    #[tokio::test]
    async fn toolbox_rejects_tools_it_does_not_hold() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::standard(dir.path());
        let toolbox = registry.toolbox(&[]);
        let result = toolbox
            .execute(notify::TOOL_NAME, &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(AiError::ToolExecution { .. })));
    }
}
