use thiserror::Error;

/// Top-level error type for the bridge.
///
/// Port-level failures (narration queries, input injection) have their own
/// error types in `vobridge-automation`; this type covers process setup,
/// configuration and the HTTP server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

/// A specialized `Result` type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
