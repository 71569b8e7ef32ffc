//! Client Configuration Settings
//!
//! Configuration types for the market data client, loaded from environment
//! variables.

use std::path::PathBuf;

use crate::domain::history::DEFAULT_HISTORY_CAPACITY;
use crate::infrastructure::fix::SessionIdentity;

/// FIX session identity settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// `SenderCompID` (service account id).
    pub sender_comp_id: String,
    /// `TargetCompID`.
    pub target_comp_id: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sender_comp_id: String::new(),
            target_comp_id: "COIN".to_string(),
        }
    }
}

/// History and audit storage settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Maximum records kept in memory across all instruments.
    pub history_capacity: usize,
    /// SQLite audit database (None = persistence disabled).
    pub db_path: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            db_path: Some(PathBuf::from("marketdata.db")),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Session identity.
    pub session: SessionSettings,
    /// Storage settings.
    pub store: StoreSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PRIME_SVC_ACCOUNT_ID` is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `PRIME_SVC_ACCOUNT_ID` is set but empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SessionSettings::default();
        let sender_comp_id = match lookup(SVC_ACCOUNT_ID) {
            Some(value) if value.is_empty() => {
                return Err(ConfigError::EmptyValue(SVC_ACCOUNT_ID.to_string()));
            }
            Some(value) => value,
            None => defaults.sender_comp_id,
        };
        let session = SessionSettings {
            sender_comp_id,
            target_comp_id: lookup("PRIME_TARGET_COMP_ID")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.target_comp_id),
        };

        let store = StoreSettings {
            history_capacity: parse_env_usize(
                &lookup,
                "FIX_MD_HISTORY_CAPACITY",
                StoreSettings::default().history_capacity,
            ),
            db_path: match lookup("FIX_MD_DB_PATH") {
                Some(path) if path.is_empty() => None,
                Some(path) => Some(PathBuf::from(path)),
                None => StoreSettings::default().db_path,
            },
        };

        let server = ServerSettings {
            metrics_port: parse_env_u16(
                &lookup,
                "FIX_MD_METRICS_PORT",
                ServerSettings::default().metrics_port,
            ),
        };

        Ok(Self {
            session,
            store,
            server,
        })
    }

    /// Identity stamped into outbound message headers.
    #[must_use]
    pub fn session_identity(&self) -> SessionIdentity {
        SessionIdentity {
            sender_comp_id: self.session.sender_comp_id.clone(),
            target_comp_id: self.session.target_comp_id.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

const SVC_ACCOUNT_ID: &str = "PRIME_SVC_ACCOUNT_ID";

fn parse_env_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
