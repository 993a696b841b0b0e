use thiserror::Error;

/// Errors shared by the tally crates outside the ledger core.
#[derive(Error, Debug)]
pub enum CommonError {
    /// Malformed account identity
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed decimal amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CommonError>;

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        CommonError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for CommonError {
    fn from(err: toml::ser::Error) -> Self {
        CommonError::Serialization(format!("TOML encoding error: {}", err))
    }
}

impl From<config::ConfigError> for CommonError {
    fn from(err: config::ConfigError) -> Self {
        CommonError::Config(format!("Configuration error: {}", err))
    }
}
