// common/src/config.rs
use std::env;
use std::path::PathBuf;

use config::{Config as ConfigFile, Environment, File};
use secrecy::SecretBox;
use serde::Deserialize;

use crate::initdata::ValidateOptions;

/// Central configuration for both services
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the auth HTTP service.
    pub addr: String,
    /// Base URL clients (the session agent included) reach the service on.
    pub public_base_url: String,
}

/// Verification settings. The bot token stays wrapped in a `SecretBox`
/// so Debug-printing the config never leaks it.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub bot_token: SecretBox<String>,
    pub max_auth_age_seconds: u64,
    pub require_auth_date: bool,
    /// Telegram ids granted admin rights. Supplied by deployment, never
    /// hardcoded.
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Where the agent persists its session cache between runs.
    pub session_cache_path: String,
    pub reconcile: ReconcileConfig,
}

/// How the session agent polls the auth service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub interval_seconds: u64,
    pub request_timeout_seconds: u64,
    /// Delay between announcing a forced logout and asking the shell to
    /// navigate back to the entry screen.
    pub logout_grace_seconds: u64,
    pub skip_overlapping_runs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bot_token: SecretBox::new(Box::new(String::new())),
            max_auth_age_seconds: 86_400,
            require_auth_date: false,
            admin_ids: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/users.db".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            session_cache_path: "data/session.json".to_string(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            request_timeout_seconds: 10,
            logout_grace_seconds: 2,
            skip_overlapping_runs: true,
        }
    }
}

impl AuthConfig {
    /// Verification options as configured.
    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            max_age_seconds: self.max_auth_age_seconds,
            require_auth_date: self.require_auth_date,
        }
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        // Build configuration
        let config = ConfigFile::builder()
            // Start with defaults
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Build and deserialize
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, then let the well-known individual variables win.
    /// A deployment that sets nothing but TELEGRAM_BOT_TOKEN works without
    /// any config files.
    pub fn from_env() -> Self {
        let mut config = match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = env::var("SERVER_ADDR") {
            self.server.addr = addr;
        }
        if let Ok(base_url) = env::var("AUTH_BASE_URL") {
            self.server.public_base_url = base_url;
        }
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            self.auth.bot_token = SecretBox::new(Box::new(token));
        }
        if let Ok(ids) = env::var("ADMIN_IDS") {
            self.auth.admin_ids = ids
                .split(',')
                .filter_map(|part| part.trim().parse::<i64>().ok())
                .collect();
        }
        if let Ok(path) = env::var("DATABASE_PATH") {
            self.storage.database_path = path;
        }
        if let Ok(path) = env::var("SESSION_CACHE_PATH") {
            self.agent.session_cache_path = path;
        }
        if let Ok(secs) = env::var("RECONCILE_INTERVAL_SECONDS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.agent.reconcile.interval_seconds = secs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.auth.max_auth_age_seconds, 86_400);
        assert!(!config.auth.require_auth_date);
        assert!(config.auth.admin_ids.is_empty());
        assert_eq!(config.agent.reconcile.interval_seconds, 30);
        assert_eq!(config.agent.reconcile.logout_grace_seconds, 2);
        assert!(config.agent.reconcile.skip_overlapping_runs);
    }

    #[test]
    fn test_is_admin_checks_allow_list() {
        let mut auth = AuthConfig::default();
        auth.admin_ids = vec![42, 99];
        assert!(auth.is_admin(42));
        assert!(!auth.is_admin(7));
    }

    #[test]
    fn test_debug_redacts_bot_token() {
        let auth = AuthConfig {
            bot_token: SecretBox::new(Box::new("123456:very-secret".to_string())),
            ..AuthConfig::default()
        };
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("very-secret"));
    }
}
