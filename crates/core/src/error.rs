use thiserror::Error;

/// Configuration problems detected at startup, before any provider is built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("unknown {kind} provider: '{name}'")]
    UnknownProvider { kind: &'static str, name: String },
}
