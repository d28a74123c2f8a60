use crate::crypto::{CryptoError, DecryptionError};
use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("NETWORK: {0}")]
    Network(String),
    #[error("DECRYPTION: {0}")]
    Decryption(String),
    #[error("AUTH_REQUIRED: no signed-in owner")]
    AuthenticationRequired,
    #[error("SWEEP: {0}")]
    Sweep(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("VAULT_LOCKED: {0}")]
    VaultLocked(String),
    #[error("INVALID: {0}")]
    Invalid(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK",
            Self::Decryption(_) => "DECRYPTION",
            Self::AuthenticationRequired => "AUTH_REQUIRED",
            Self::Sweep(_) => "SWEEP",
            Self::NotFound(_) => "NOT_FOUND",
            Self::VaultLocked(_) => "VAULT_LOCKED",
            Self::Invalid(_) => "INVALID",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(value: GatewayError) -> Self {
        Self::Network(value.to_string())
    }
}

impl From<DecryptionError> for EngineError {
    fn from(value: DecryptionError) -> Self {
        Self::Decryption(value.to_string())
    }
}

impl From<CryptoError> for EngineError {
    fn from(value: CryptoError) -> Self {
        match value {
            CryptoError::WeakIterations { .. } => Self::Invalid(value.to_string()),
            _ => Self::Internal(value.to_string()),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
