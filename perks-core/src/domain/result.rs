//! Result and error types for the core library

use thiserror::Error;

use crate::domain::tier::Tier;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Reason cannot be empty")]
    EmptyReason,

    #[error("Insufficient points: have {available}, need {requested}")]
    InsufficientPoints { available: i64, requested: i64 },

    /// Dedupe hit; absorbed by the reconciler, never shown to callers
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Redemption would drop the account below the {tier} floor of {floor} points")]
    TierDowngradeBlocked { tier: Tier, floor: i64 },

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(u64),

    /// An optimistic redemption whose external activation failed; the
    /// compensating transaction has already been appended.
    #[error("Activation failed for redemption {original}; points restored by transaction {compensation}")]
    CompensationRequired { original: u64, compensation: u64 },

    /// Recoverable: the reconciler retries with backoff
    #[error("Channel disconnected: {0}")]
    ChannelDisconnected(String),

    /// Stored snapshot could not be read; recovered by resetting to zero
    #[error("Stale snapshot: {0}")]
    StaleSnapshot(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
