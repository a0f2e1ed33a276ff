//! Rostergate configuration file handling
//!
//! Provides default configuration generation and loading for the bot.
//! Configuration files are TOML and fixed for the lifetime of the process.
//!
//! Relative paths in the file are resolved against the directory that
//! contains the config file, not the working directory.

use rostergate::telegram::client::DEFAULT_API_URL;
use rostergate::telegram::supervisor::BackoffPolicy;
use rostergate::telegram::traits::GroupId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Rostergate bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RostergateConfig {
    /// Telegram connection settings
    pub telegram: TelegramConfig,

    /// Roster and attachment locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Restart backoff for the polling loop
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// Telegram-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from BotFather (prefer --token-file or ROSTERGATE_TOKEN)
    pub token: Option<String>,

    /// Chat id of the restricted group (NOT an invite link)
    pub group_id: i64,

    /// Bot API endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// CSV roster with NOM, PRENOM, joined columns
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,

    /// Directory for submitted card photos
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Persistent log file (console logging is always on)
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

/// Supervisor backoff configuration (humantime durations, e.g. "30s", "2m")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Wait after network errors
    #[serde(default = "default_network_backoff")]
    pub network_backoff: String,

    /// Wait after any other error
    #[serde(default = "default_error_backoff")]
    pub error_backoff: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_roster_path() -> PathBuf {
    PathBuf::from("students.csv")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("rostergate.log")
}

fn default_network_backoff() -> String {
    "30s".to_string()
}

fn default_error_backoff() -> String {
    "60s".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            roster_path: default_roster_path(),
            images_dir: default_images_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            network_backoff: default_network_backoff(),
            error_backoff: default_error_backoff(),
        }
    }
}

impl SupervisorConfig {
    /// Parse both tiers into a backoff policy
    pub fn backoff_policy(&self) -> Result<BackoffPolicy, Box<dyn std::error::Error>> {
        let parse = |field: &str, value: &str| {
            humantime::parse_duration(value)
                .map_err(|e| format!("Invalid supervisor.{} '{}': {}", field, value, e))
        };

        Ok(BackoffPolicy {
            network: parse("network_backoff", &self.network_backoff)?,
            error: parse("error_backoff", &self.error_backoff)?,
        })
    }
}

impl RostergateConfig {
    /// Create a new configuration for the given group
    #[allow(dead_code)]
    pub fn new(group_id: i64) -> Self {
        Self {
            telegram: TelegramConfig {
                token: None,
                group_id,
                api_url: default_api_url(),
            },
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }

    /// Load configuration from a TOML file, resolving relative paths
    /// against the file's directory
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let mut config: RostergateConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        Ok(config)
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.storage.roster_path,
            &mut self.storage.images_dir,
            &mut self.logging.file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn group(&self) -> GroupId {
        GroupId(self.telegram.group_id)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        r#"# Rostergate Bot Configuration
#
# Settings are read once at startup. Restart the bot to apply changes.
# Relative paths are resolved against the directory of this file.

[telegram]
# Bot token from BotFather. Prefer --token-file or the ROSTERGATE_TOKEN
# environment variable over storing the token here.
# token = "123456:ABC..."

# Chat id of the restricted group (NOT an invite link).
# Supergroup ids are negative, e.g. -1001234567890.
group_id = 0

# Bot API endpoint (change only for a self-hosted Bot API server)
api_url = "https://api.telegram.org"

[storage]
# Roster CSV with the columns NOM,PRENOM,joined
roster_path = "students.csv"

# Directory where card photos are stored, one file per user
images_dir = "images"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Persistent log file (console logging is always on)
file = "rostergate.log"

[supervisor]
# Wait before reconnecting after a network error
network_backoff = "30s"

# Wait before reconnecting after any other error
error_backoff = "60s"
"#
        .to_string()
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, Self::generate_default_toml()).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default config file path
///
/// - Linux: ~/.config/rostergate/config.toml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rostergate")
        .join("config.toml")
}
