use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::BanterConfig;

/// Loads the banter configuration from disk with env-var overrides.
pub struct ConfigLoader {
    config: BanterConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > BANTER_CONFIG env > ~/.banter/banter.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("BANTER_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".banter")
            .join("banter.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> banter_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<BanterConfig>(&raw).map_err(|e| {
                banter_core::BanterError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            BanterConfig::default()
        };

        // Apply environment variable overrides
        let config = Self::apply_env_overrides(config);

        // Validate config — log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(banter_core::BanterError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Get a snapshot of the current config.
    pub fn get(&self) -> BanterConfig {
        self.config.clone()
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (DISCORD_TOKEN, GEMINI_API_KEY, BANTER_*).
    fn apply_env_overrides(mut config: BanterConfig) -> BanterConfig {
        if let Ok(v) = std::env::var("DISCORD_TOKEN") {
            config.gateway.token = Some(v);
        }
        if let Ok(v) = std::env::var("GEMINI_API_KEY") {
            if config.credentials.gemini_api_key.is_none() {
                config.credentials.gemini_api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("BANTER_MODEL") {
            config.agent.model = v;
        }
        if let Ok(v) = std::env::var("BANTER_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }
}
