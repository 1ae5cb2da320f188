//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod event;
pub mod result;
mod tier;
mod transaction;

pub use account::Account;
pub use event::{EventPayload, LoyaltyEvent};
pub use tier::{classify, Tier, TierSpec, TierStatus, TIER_TABLE};
pub use transaction::{
    event_fingerprint, next_transaction_id, PointTransaction, TransactionKind,
};
