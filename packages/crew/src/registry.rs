//! Crew registry: loads the crew definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/crew/crews/` is baked into the binary at
//! compile time via [`include_str!`], one per incident category, and parsed
//! once on first use.

use std::sync::LazyLock;

use incident_responder_incident_models::IncidentCategory;

use crate::definition::{CrewDefinition, parse_crew_toml};

/// TOML configs embedded at compile time.
const CREW_TOMLS: &[(&str, &str)] = &[
    ("fire", include_str!("../crews/fire.toml")),
    ("medical", include_str!("../crews/medical.toml")),
    ("police", include_str!("../crews/police.toml")),
    ("accident", include_str!("../crews/accident.toml")),
    ("other", include_str!("../crews/other.toml")),
];

static CREWS: LazyLock<Vec<CrewDefinition>> = LazyLock::new(|| {
    CREW_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_crew_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
});

/// Returns all configured crew definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this is caught by the registry tests).
#[must_use]
pub fn all_crews() -> &'static [CrewDefinition] {
    &CREWS
}

/// Returns the crew that handles `category`.
///
/// # Panics
///
/// Panics if no embedded crew is declared for `category`, which the
/// registry tests rule out.
#[must_use]
pub fn crew_for(category: IncidentCategory) -> &'static CrewDefinition {
    all_crews()
        .iter()
        .find(|c| c.category == category)
        .unwrap_or_else(|| panic!("No crew configured for category {category}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::KNOWN_TOOLS;

    #[test]
    fn every_category_has_exactly_one_crew() {
        let crews = all_crews();
        assert_eq!(crews.len(), IncidentCategory::all().len());
        for category in IncidentCategory::all() {
            let count = crews.iter().filter(|c| c.category == *category).count();
            assert_eq!(count, 1, "{category}: expected exactly one crew");
        }
    }

    #[test]
    fn crews_are_consistent() {
        for crew in all_crews() {
            crew.validate(KNOWN_TOOLS)
                .unwrap_or_else(|e| panic!("{}: {e}", crew.name));
        }
    }

    #[test]
    fn crews_run_guidance_logging_and_notification_in_order() {
        for crew in all_crews() {
            let ids: Vec<&str> = crew.tasks.iter().map(|t| t.id.as_str()).collect();
            assert_eq!(
                ids,
                vec!["guidance_collect_info", "log_incident", "notify_authority"],
                "{}",
                crew.name
            );
        }
    }

    #[test]
    fn logging_and_notification_agents_hold_their_tools() {
        for crew in all_crews() {
            for (task_id, tool) in [
                ("log_incident", "csv_logger"),
                ("notify_authority", "notify_authority"),
            ] {
                let task = crew.tasks.iter().find(|t| t.id == task_id).unwrap();
                let agent = crew.agent(&task.agent).unwrap();
                assert!(
                    agent.tools.iter().any(|t| t == tool),
                    "{}: {task_id} agent lacks {tool}",
                    crew.name
                );
            }
        }
    }

    #[test]
    fn crew_for_returns_matching_category() {
        let crew = crew_for(IncidentCategory::Police);
        assert_eq!(crew.category, IncidentCategory::Police);
    }

    #[test]
    fn crews_are_parsed_once() {
        assert!(std::ptr::eq(
            crew_for(IncidentCategory::Fire),
            crew_for(IncidentCategory::Fire)
        ));
        assert!(std::ptr::eq(all_crews(), all_crews()));
    }
}
