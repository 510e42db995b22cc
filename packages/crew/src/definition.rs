//! Crew definition types and TOML parsing.

use incident_responder_incident_models::{IncidentCategory, IncidentContext};
use serde::Deserialize;

use crate::CrewError;

/// A role-based agent within a crew.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    /// Identifier referenced by tasks (e.g. `guidance_agent`).
    pub id: String,
    /// Short role title.
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Background that shapes the agent's tone and judgement.
    pub backstory: String,
    /// Names of the tools this agent may call.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl AgentDefinition {
    /// System prompt describing this agent to the LLM.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {role}.\n\nGoal: {goal}\n\nBackstory: {backstory}\n\n\
             Complete the task you are given. Use the tools available to you \
             when the task requires it, then reply with your final answer only.",
            role = self.role.trim(),
            goal = self.goal.trim(),
            backstory = self.backstory.trim(),
        )
    }
}

/// One step of a crew run.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDefinition {
    /// Task identifier (e.g. `log_incident`).
    pub id: String,
    /// Heading used for this task's section in the report.
    pub title: String,
    /// Id of the agent that performs the task.
    pub agent: String,
    /// Instructions, with `{placeholder}` incident fields.
    pub description: String,
    /// Description of the expected result.
    pub expected_output: String,
}

/// A category-specific crew.
#[derive(Debug, Clone, Deserialize)]
pub struct CrewDefinition {
    /// Category this crew handles.
    pub category: IncidentCategory,
    /// Human-readable crew name.
    pub name: String,
    /// Agents available to the tasks.
    pub agents: Vec<AgentDefinition>,
    /// Tasks, run in order.
    pub tasks: Vec<TaskDefinition>,
}

impl CrewDefinition {
    /// Looks up an agent by id.
    #[must_use]
    pub fn agent(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Checks that every task references a declared agent and every agent
    /// tool is one of `known_tools`.
    ///
    /// # Errors
    ///
    /// Returns [`CrewError::Definition`] describing the first problem found.
    pub fn validate(&self, known_tools: &[&str]) -> Result<(), CrewError> {
        if self.tasks.is_empty() {
            return Err(CrewError::Definition {
                message: format!("{}: crew has no tasks", self.name),
            });
        }

        for agent in &self.agents {
            if let Some(tool) = agent.tools.iter().find(|t| !known_tools.contains(&t.as_str())) {
                return Err(CrewError::Definition {
                    message: format!("{}: agent '{}' uses unknown tool '{tool}'", self.name, agent.id),
                });
            }
        }

        for task in &self.tasks {
            if self.agent(&task.agent).is_none() {
                return Err(CrewError::Definition {
                    message: format!(
                        "{}: task '{}' references unknown agent '{}'",
                        self.name, task.id, task.agent
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Parses a crew definition from TOML.
///
/// # Errors
///
/// Returns [`CrewError::Definition`] if the TOML is malformed.
pub fn parse_crew_toml(toml_str: &str) -> Result<CrewDefinition, CrewError> {
    toml::de::from_str(toml_str).map_err(|e| CrewError::Definition {
        message: e.to_string(),
    })
}

fn placeholder<'a>(key: &str, context: &'a IncidentContext, time: &'a str) -> Option<&'a str> {
    Some(match key {
        "incident_id" => context.id.as_str(),
        "username" => context.username.as_str(),
        "description" => context.description.as_str(),
        "location" => context.location.as_str(),
        "category" => context.category.as_ref(),
        "severity" => context.severity.as_ref(),
        "time" => time,
        _ => return None,
    })
}

/// Replaces `{field}` placeholders with values from the incident context.
///
/// Supported placeholders: `{incident_id}`, `{username}`, `{description}`,
/// `{location}`, `{category}`, `{severity}` and `{time}`. Unknown
/// placeholders are left untouched. Substituted values are not scanned
/// again, so braces inside a reporter's description stay literal.
#[must_use]
pub fn interpolate(template: &str, context: &IncidentContext) -> String {
    let time = context.reported_at.to_rfc3339();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after
            .find('}')
            .and_then(|end| placeholder(&after[..end], context, &time).map(|v| (end, v)))
        {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}
