use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `banter.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BanterConfig {
    pub agent: AgentConfig,
    pub engagement: EngagementConfig,
    pub gateway: GatewayConfig,
    pub guilds: GuildStoreConfig,
    pub logging: LoggingConfig,
    pub credentials: CredentialsConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Generative model identifier, e.g. "gemini-2.0-flash-lite".
    pub model: String,
    /// The persona's display name, used as the acting user on proactive turns.
    pub display_name: String,
    /// Path to the XML persona document, read once at startup.
    pub persona_path: PathBuf,
    /// Maximum wall-clock seconds for one remote generation call.
    /// Expiry surfaces as a generation failure; the call is never retried.
    pub request_timeout_secs: u64,
    /// Maximum wall-clock seconds for one channel history fetch.
    pub history_fetch_timeout_secs: u64,
    /// How many recent messages to pull into the context window.
    pub history_limit: u8,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".into(),
            display_name: "Banter".into(),
            persona_path: PathBuf::from("data/persona.xml"),
            request_timeout_secs: 30,
            history_fetch_timeout_secs: 15,
            history_limit: 100,
        }
    }
}

// ── Engagement ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Enable the proactive join-the-conversation timer.
    pub proactive: bool,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self { proactive: true }
    }
}

// ── Gateway ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Discord bot token. `DISCORD_TOKEN` in the environment takes priority.
    pub token: Option<String>,
}

// ── Guild store ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildStoreConfig {
    /// Path to the per-guild engagement config file.
    pub db_path: PathBuf,
}

impl Default for GuildStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/guilds.toml"),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Credentials ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Gemini API key. `GEMINI_API_KEY` in the environment is the fallback.
    pub gemini_api_key: Option<String>,
}

impl BanterConfig {
    /// Validate the config. Returns warnings for suspicious-but-usable
    /// values, or an error string for values the runtime cannot start with.
    pub fn validate(&self) -> std::result::Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.agent.model.is_empty() {
            return Err("agent.model must not be empty".into());
        }
        if self.agent.history_limit == 0 {
            return Err("agent.history_limit must be at least 1".into());
        }
        if self.agent.history_limit > 100 {
            warnings.push(format!(
                "agent.history_limit is {} — Discord caps history fetches at 100 messages",
                self.agent.history_limit
            ));
        }
        if self.agent.request_timeout_secs == 0 {
            warnings.push(
                "agent.request_timeout_secs is 0 — generation calls will never time out".into(),
            );
        }
        if self.agent.history_fetch_timeout_secs == 0 {
            warnings.push(
                "agent.history_fetch_timeout_secs is 0 — history fetches will never time out"
                    .into(),
            );
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                warnings.push(format!(
                    "logging.format '{other}' is unknown — falling back to 'pretty'"
                ));
            }
        }

        Ok(warnings)
    }
}
