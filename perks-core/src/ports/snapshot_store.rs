//! Snapshot store port - durable account state

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::{Account, PointTransaction, Tier};

/// Durable snapshot of one account: summary totals plus the bounded
/// transaction window. Totals are stored independently of the window and
/// are never derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub account_id: String,
    pub current_points: i64,
    pub current_tier: Tier,
    pub total_earned: i64,
    pub total_redeemed: i64,
    #[serde(default)]
    pub total_expired: i64,
    /// Most recent transactions, oldest first, capped by the ledger window
    pub transactions: Vec<PointTransaction>,
}

impl Snapshot {
    pub fn new(account: &Account, transactions: Vec<PointTransaction>) -> Self {
        Self {
            account_id: account.id.clone(),
            current_points: account.point_balance,
            current_tier: account.tier,
            total_earned: account.total_earned,
            total_redeemed: account.total_redeemed,
            total_expired: account.total_expired,
            transactions,
        }
    }

    /// Rebuild the account summary this snapshot was taken from
    pub fn account(&self) -> Account {
        Account {
            id: self.account_id.clone(),
            point_balance: self.current_points,
            tier: self.current_tier,
            total_earned: self.total_earned,
            total_redeemed: self.total_redeemed,
            total_expired: self.total_expired,
        }
    }
}

/// Durable storage abstraction for account snapshots.
///
/// Implementations must make `save` durable before returning; the ledger
/// acknowledges a mutation only after the snapshot is persisted.
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one for the account
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load the stored snapshot, if any. Unreadable data is surfaced as
    /// `Error::StaleSnapshot` so callers can reset instead of crash.
    fn load(&self, account_id: &str) -> Result<Option<Snapshot>>;
}
