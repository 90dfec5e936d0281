use thiserror::Error;

use super::Tier;

/// Errors raised by the storage tier abstraction and its backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The source object of a move or copy does not exist.
    #[error("{key} not found in {tier} tier")]
    NotFound { tier: Tier, key: String },

    /// A CDN reference that matches neither tier's base URL.
    #[error("unknown storage tier for reference {0}")]
    UnknownTier(String),

    /// Keys are relative bundle paths; anything else is refused.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}
