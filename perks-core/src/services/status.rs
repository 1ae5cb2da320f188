//! Status service - loyalty summaries for UI consumers

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{classify, PointTransaction, TIER_TABLE};
use crate::services::ledger::LedgerService;

/// Read-only view over one account's ledger
pub struct StatusService {
    ledger: Arc<LedgerService>,
}

impl StatusService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        Self { ledger }
    }

    /// Get the loyalty summary: balance, tier, progress, totals
    pub fn get_status(&self) -> Result<LoyaltySummary> {
        let account = self.ledger.account()?;
        let status = classify(account.point_balance);
        let spec = &TIER_TABLE[status.tier.rank()];
        let next_tier = TIER_TABLE
            .get(status.tier.rank() + 1)
            .map(|next| next.tier.name().to_string());

        Ok(LoyaltySummary {
            account_id: account.id,
            point_balance: account.point_balance,
            tier: status.tier.name().to_string(),
            progress_percent: status.progress_percent,
            points_to_next: status.points_to_next,
            next_tier,
            benefits: spec.benefits.iter().map(|b| b.to_string()).collect(),
            total_earned: account.total_earned,
            total_redeemed: account.total_redeemed,
            total_expired: account.total_expired,
            retained_transactions: self.ledger.history()?.len(),
        })
    }

    /// Most recent transactions, newest first, up to `limit`
    pub fn get_history(&self, limit: usize) -> Result<Vec<PointTransaction>> {
        let mut history = self.ledger.history()?;
        history.reverse();
        history.truncate(limit);
        Ok(history)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltySummary {
    pub account_id: String,
    pub point_balance: i64,
    pub tier: String,
    pub progress_percent: f64,
    pub points_to_next: i64,
    pub next_tier: Option<String>,
    pub benefits: Vec<String>,
    pub total_earned: i64,
    pub total_redeemed: i64,
    pub total_expired: i64,
    pub retained_transactions: usize,
}
