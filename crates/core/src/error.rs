use thiserror::Error;

/// Top-level error for embedders that compose the SDK services.
#[derive(Error, Debug)]
pub enum HuddleError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for SDK operations.
pub type Result<T> = std::result::Result<T, HuddleError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Subscriber lagged: {0} events missed")]
    Lagged(u64),
}
