//! Redemption guard - validated debits and compensating transactions
//!
//! Redemptions apply to the ledger immediately (optimistic). When a reward
//! needs an external activation call, a failed activation is undone by a
//! compensating transaction, never by rolling back the original entry:
//! the ledger is append-only and the redemption is already visible.

use std::future::Future;
use std::sync::Arc;

use log::warn;

use crate::config::DowngradePolicy;
use crate::domain::result::{Error, Result};
use crate::domain::{PointTransaction, TransactionKind};
use crate::services::ledger::{AppendRequest, LedgerService};

/// Guard for debit transactions. Catalog-agnostic: callers supply the
/// point cost and a reason, never reward identities.
pub struct RedemptionService {
    ledger: Arc<LedgerService>,
    downgrade_policy: DowngradePolicy,
}

impl RedemptionService {
    pub fn new(ledger: Arc<LedgerService>, downgrade_policy: DowngradePolicy) -> Self {
        Self {
            ledger,
            downgrade_policy,
        }
    }

    /// Whether the account can currently afford `cost`
    pub fn can_redeem(&self, cost: i64) -> Result<bool> {
        Ok(cost > 0 && cost <= self.ledger.balance()?)
    }

    /// Debit `cost` points from the account.
    ///
    /// Under `DowngradePolicy::Block` a redemption that would drop the
    /// balance below the current tier's threshold is rejected; under
    /// `Allow` it goes through with a warning. The balance check itself is
    /// re-run inside the ledger lock, so concurrent redemptions cannot
    /// jointly overdraw.
    pub fn redeem(&self, cost: i64, reason: &str) -> Result<PointTransaction> {
        if cost <= 0 {
            return Err(Error::InvalidAmount(cost));
        }
        if reason.trim().is_empty() {
            return Err(Error::EmptyReason);
        }

        let account = self.ledger.account()?;
        if cost > account.point_balance {
            return Err(Error::InsufficientPoints {
                available: account.point_balance,
                requested: cost,
            });
        }

        let floor = account.tier.min_points();
        let mut req = AppendRequest::redeemed(cost, reason);
        if account.point_balance - cost < floor {
            match self.downgrade_policy {
                DowngradePolicy::Block => req = req.with_floor(floor),
                DowngradePolicy::Allow => warn!(
                    "redeeming {} points drops account {} below the {} floor of {}",
                    cost, account.id, account.tier, floor
                ),
            }
        }

        self.ledger.append(req)
    }

    /// Re-credit a failed redemption.
    ///
    /// Idempotent by original transaction id: if a compensating entry for
    /// `original_id` already exists, nothing is appended and `Ok(None)` is
    /// returned. The ledger enforces the same guard under its lock, so
    /// racing callers cannot double-credit.
    pub fn compensate(&self, original_id: u64) -> Result<Option<PointTransaction>> {
        if self.ledger.find_compensation(original_id)?.is_some() {
            return Ok(None);
        }

        let original = self
            .ledger
            .find_transaction(original_id)?
            .ok_or(Error::UnknownTransaction(original_id))?;
        if original.kind != TransactionKind::Redeemed {
            return Err(Error::UnknownTransaction(original_id));
        }

        let req = AppendRequest::adjusted(
            -original.points,
            format!("Reversal of failed redemption {}", original_id),
        )
        .compensating(original_id);

        match self.ledger.append(req) {
            Ok(tx) => Ok(Some(tx)),
            // another caller appended the reversal between our check and
            // the ledger's
            Err(Error::DuplicateTransaction(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Two-phase redemption: optimistic local apply plus an external
    /// activation. If the activation fails, the cost is re-credited and
    /// the caller gets `CompensationRequired` naming both transactions.
    pub async fn redeem_with_activation<F, Fut>(
        &self,
        cost: i64,
        reason: &str,
        activate: F,
    ) -> Result<PointTransaction>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let tx = self.redeem(cost, reason)?;

        match activate().await {
            Ok(()) => Ok(tx),
            Err(e) => {
                warn!("activation for redemption {} failed: {:#}", tx.id, e);
                let compensation = match self.compensate(tx.id)? {
                    Some(comp) => comp.id,
                    // a concurrent caller already issued the reversal
                    None => self
                        .ledger
                        .find_compensation(tx.id)?
                        .map(|comp| comp.id)
                        .ok_or(Error::UnknownTransaction(tx.id))?,
                };
                Err(Error::CompensationRequired {
                    original: tx.id,
                    compensation,
                })
            }
        }
    }
}
