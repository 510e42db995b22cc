#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for auditing the CSV incident log.
//!
//! ```text
//! incident_log list [--limit 20]
//! incident_log show <id>
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use incident_responder_incident_log::{DEFAULT_LOG_PATH, find_entry, format_entry, list_recent};

#[derive(Parser)]
#[command(name = "incident_log", about = "Browse and audit the incident log")]
struct Cli {
    /// Path to the CSV incident log
    #[arg(long, global = true, default_value = DEFAULT_LOG_PATH)]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent incidents, newest first
    List {
        /// Maximum number of incidents to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show every field of one incident
    Show {
        /// Incident ID (UUID or prefix)
        id: String,
    },
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let short: String = value.chars().take(max - 3).collect();
        format!("{short}...")
    } else {
        value.to_string()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::List { limit } => {
            let entries = list_recent(&cli.file, limit)?;

            if entries.is_empty() {
                println!("No incidents found in {}.", cli.file.display());
                return Ok(());
            }

            println!(
                "{:<38} {:<10} {:<8} {:<25} MESSAGE",
                "ID", "CATEGORY", "SEVERITY", "TIME"
            );
            println!("{}", "-".repeat(110));

            for entry in &entries {
                println!(
                    "{:<38} {:<10} {:<8} {:<25} {}",
                    entry.id.as_deref().unwrap_or("-"),
                    entry.category_incident.as_deref().unwrap_or("-"),
                    entry.severity.as_deref().unwrap_or("-"),
                    entry.time.as_deref().unwrap_or("-"),
                    truncate(entry.issue_msg.as_deref().unwrap_or(""), 40),
                );
            }

            println!("\n{} incident(s)", entries.len());
        }
        Commands::Show { id } => {
            let entry = find_entry(&cli.file, &id)?;
            print!("{}", format_entry(&entry));
        }
    }

    Ok(())
}
