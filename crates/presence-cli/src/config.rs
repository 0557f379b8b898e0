//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use presence_core::DEFAULT_ACTIVE_WINDOW_SECS;
use serde::{Deserialize, Serialize};

/// Open sessions without a heartbeat for this long are expired by `cleanup`.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 300;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Trailing window, in seconds, within which a heartbeat counts as active.
    pub active_window_secs: i64,
    /// Age, in seconds, of the last heartbeat after which an open session is stale.
    pub stale_after_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("presence.db"),
            active_window_secs: DEFAULT_ACTIVE_WINDOW_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (PRESENCE_*)
        figment = figment.merge(Env::prefixed("PRESENCE_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for presence.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("presence"))
}

/// Returns the platform-specific data directory for presence.
///
/// On Linux: `~/.local/share/presence`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("presence"))
}
