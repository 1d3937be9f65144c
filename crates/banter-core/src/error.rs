use thiserror::Error;

/// Unified error type for the banter workspace.
#[derive(Error, Debug)]
pub enum BanterError {
    // ── Persona errors ─────────────────────────────────────────
    #[error("persona document error: {0}")]
    Persona(String),

    // ── Gateway errors ─────────────────────────────────────────
    #[error("gateway error: {op}: {reason}")]
    Gateway { op: String, reason: String },

    #[error("gateway not connected")]
    GatewayNotConnected,

    #[error("{op} timed out after {secs}s")]
    Timeout { op: String, secs: u64 },

    // ── Generation errors ──────────────────────────────────────
    #[error("generation error: {0}")]
    Generation(String),

    #[error("generation returned no text")]
    EmptyGeneration,

    // ── Dispatch errors ────────────────────────────────────────
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("guild store error: {0}")]
    GuildStore(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl BanterError {
    /// Shorthand for a gateway error with a named operation.
    pub fn gateway(op: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Gateway {
            op: op.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BanterError>;
