//! Server configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default directory for reports, logs and uploaded images.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Default idle time after which a browser session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Settings for [`crate::run_server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to (`BIND_ADDR`).
    pub bind_addr: String,
    /// Port to listen on (`PORT`).
    pub port: u16,
    /// Output directory (`OUTPUT_DIR`).
    pub output_dir: PathBuf,
    /// Idle session lifetime (`SESSION_TTL_SECS`).
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Unset or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT").and_then(|p| match p.trim().parse() {
            Ok(port) => Some(port),
            Err(e) => {
                log::warn!("Ignoring invalid PORT '{p}': {e}");
                None
            }
        });

        let session_ttl = lookup("SESSION_TTL_SECS").and_then(|s| match s.trim().parse() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                log::warn!("Ignoring invalid SESSION_TTL_SECS '{s}': {e}");
                None
            }
        });

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: port.unwrap_or(defaults.port),
            output_dir: lookup("OUTPUT_DIR").map_or(defaults.output_dir, PathBuf::from),
            session_ttl: session_ttl.unwrap_or(defaults.session_ttl),
        }
    }
}
