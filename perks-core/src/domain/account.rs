//! Loyalty account domain model

use serde::{Deserialize, Serialize};

use crate::domain::tier::Tier;

/// A loyalty account: the derived summary over the point ledger.
///
/// The balance and totals are maintained together by the ledger so the
/// account-level invariant holds at all times:
/// `point_balance == total_earned - total_redeemed - total_expired`.
/// Expired points are a separate leg that debits the balance without
/// counting as redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub point_balance: i64,
    pub tier: Tier,
    pub total_earned: i64,
    pub total_redeemed: i64,
    #[serde(default)]
    pub total_expired: i64,
}

impl Account {
    /// Create a fresh account: zero balance, bronze tier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            point_balance: 0,
            tier: Tier::Bronze,
            total_earned: 0,
            total_redeemed: 0,
            total_expired: 0,
        }
    }

    /// Validate account data and the balance invariant
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.id.trim().is_empty() {
            return Err("account id cannot be empty");
        }
        if self.point_balance < 0 {
            return Err("point balance cannot be negative");
        }
        if self.point_balance != self.total_earned - self.total_redeemed - self.total_expired {
            return Err("balance does not match earned/redeemed/expired totals");
        }
        Ok(())
    }
}
