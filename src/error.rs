/// Centralized error types for the collector daemon
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    // Authentication Errors
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token missing: {0}")]
    TokenMissing(String),

    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    // Broker Errors
    #[error("Broker API error: {code} - {message}")]
    BrokerApiError { code: String, message: String },

    // Storage Errors
    #[error("Time-series store error: {0}")]
    StoreError(#[from] clickhouse::error::Error),

    #[error("Time-series store unavailable: {0}")]
    StoreUnavailable(String),

    // Data Errors
    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    // Generic Errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;

impl CollectorError {
    /// Check if error must abort process startup.
    ///
    /// Runtime task failures are never fatal; the scheduler logs and moves
    /// on. Only an unusable configuration or an unreachable store at startup
    /// stops the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CollectorError::ConfigError(_)
                | CollectorError::InvalidParameter(_)
                | CollectorError::StoreUnavailable(_)
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            CollectorError::AuthenticationFailed(_) => "AUTH_001",
            CollectorError::TokenExchangeFailed(_) => "AUTH_002",
            CollectorError::TokenMissing(_) => "AUTH_003",
            CollectorError::HttpError(_) => "NET_001",
            CollectorError::BrokerApiError { .. } => "BROKER_001",
            CollectorError::StoreError(_) => "STORE_001",
            CollectorError::StoreUnavailable(_) => "STORE_002",
            CollectorError::DeserializationError(_) => "DATA_001",
            CollectorError::ConfigError(_) => "CFG_001",
            CollectorError::InvalidParameter(_) => "CFG_002",
            CollectorError::FileError(_) => "FILE_001",
            CollectorError::InternalError(_) => "INT_001",
        }
    }
}
