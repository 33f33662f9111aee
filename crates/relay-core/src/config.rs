use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RelayError, Result};

/// Top-level configuration for the Relay server.
///
/// Loaded from `~/.relay/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RelayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// API server port.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Path to the API bearer-token file.
    pub token_path: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            token_path: "~/.relay/api_token".to_string(),
        }
    }
}

/// Approval-workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Seconds before a pending approval request expires.
    pub timeout_secs: u64,
    /// Interval between background expiration sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

/// Webhook routing and validation settings.
///
/// Secrets live here rather than in code. A webhook type with no secret
/// entry fails signature validation closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Action dispatched for webhook types with no registered route.
    pub default_action: String,
    /// Webhook type -> shared HMAC secret.
    pub secrets: HashMap<String, String>,
    /// Webhook type -> action name.
    pub routes: HashMap<String, String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            default_action: "webhook_ingest".to_string(),
            secrets: HashMap::new(),
            routes: HashMap::new(),
        }
    }
}
