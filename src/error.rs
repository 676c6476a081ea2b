//! Error types for the trading gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {

    // =============================
    // Domain Errors
    // =============================

    #[error("Invalid ledger account id: {0}")]
    InvalidAccountId(String),

    #[error("Unknown stock ticker: {0}")]
    UnknownTicker(String),

    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("SMS gateway error: {0}")]
    SmsError(String),

    #[error("Token transfer error: {0}")]
    TransferError(String),

    #[error("Chat completion error: {0}")]
    LlmError(String),

    #[error("Transaction log error: {0}")]
    LogError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
