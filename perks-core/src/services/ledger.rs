//! Ledger service - the append-only point ledger and derived account state
//!
//! Single source of truth for one account. Every mutation goes through
//! `append`, which runs its check-then-act sequence (read balance,
//! validate, write) under one mutex: two concurrent redemptions validated
//! against a stale balance could otherwise jointly overdraw the account.
//! The redemption guard and the reconciler share one `LedgerService`
//! instance and therefore one serialization domain.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::broadcast;

use crate::domain::result::{Error, Result};
use crate::domain::{
    classify, next_transaction_id, Account, PointTransaction, Tier, TransactionKind,
};
use crate::ports::{Snapshot, SnapshotStore};

/// Number of transactions retained in the snapshot window. Totals are
/// tracked independently and outlive the window.
pub const HISTORY_WINDOW: usize = 100;

/// Notification emitted whenever a mutation moves the account's tier
#[derive(Debug, Clone)]
pub struct TierChange {
    pub previous: Tier,
    pub current: Tier,
    pub balance: i64,
}

/// Everything `append` needs to know about one mutation
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub kind: TransactionKind,
    /// Signed point delta (negative for debits)
    pub points: i64,
    pub reason: String,
    pub order_id: Option<String>,
    /// Stable channel identity for dedupe; local mutations leave this unset
    pub external_id: Option<String>,
    /// Event time from the channel; defaults to now for local mutations
    pub timestamp: Option<DateTime<Utc>>,
    /// Id of the redemption this adjustment reverses
    pub compensates: Option<u64>,
    /// Reject the mutation if the resulting balance would fall below this
    pub floor: Option<i64>,
}

impl AppendRequest {
    fn new(kind: TransactionKind, points: i64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            points,
            reason: reason.into(),
            order_id: None,
            external_id: None,
            timestamp: None,
            compensates: None,
            floor: None,
        }
    }

    pub fn earned(points: i64, reason: impl Into<String>) -> Self {
        Self::new(TransactionKind::Earned, points, reason)
    }

    /// A redemption debit of `cost` points
    pub fn redeemed(cost: i64, reason: impl Into<String>) -> Self {
        Self::new(TransactionKind::Redeemed, -cost, reason)
    }

    pub fn adjusted(points: i64, reason: impl Into<String>) -> Self {
        Self::new(TransactionKind::Adjusted, points, reason)
    }

    /// An expiry debit of `cost` points
    pub fn expired(cost: i64, reason: impl Into<String>) -> Self {
        Self::new(TransactionKind::Expired, -cost, reason)
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn compensating(mut self, original: u64) -> Self {
        self.compensates = Some(original);
        self
    }

    pub fn with_floor(mut self, floor: i64) -> Self {
        self.floor = Some(floor);
        self
    }
}

struct LedgerState {
    account: Account,
    /// Bounded window, oldest first
    transactions: VecDeque<PointTransaction>,
    /// External identities present in the window, for dedupe lookups
    identities: HashSet<String>,
}

impl LedgerState {
    fn fresh(account_id: &str) -> Self {
        Self {
            account: Account::new(account_id),
            transactions: VecDeque::new(),
            identities: HashSet::new(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut account = snapshot.account();
        // The balance is authoritative; the stored tier only seeds
        // reconciler state and is recomputed here to heal old snapshots.
        account.tier = classify(account.point_balance).tier;

        let identities = snapshot
            .transactions
            .iter()
            .filter_map(|tx| tx.external_id.clone())
            .collect();

        Self {
            account,
            transactions: snapshot.transactions.into(),
            identities,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(&self.account, self.transactions.iter().cloned().collect())
    }
}

pub struct LedgerService {
    state: Mutex<LedgerState>,
    store: Arc<dyn SnapshotStore>,
    tier_changes: broadcast::Sender<TierChange>,
    applied: broadcast::Sender<PointTransaction>,
}

impl LedgerService {
    /// Open the ledger for one account, loading the stored snapshot.
    ///
    /// A snapshot that fails to parse, or whose totals no longer add up,
    /// resets the account to its zero state. The reset is logged for
    /// diagnosis, never fatal.
    pub fn open(account_id: &str, store: Arc<dyn SnapshotStore>) -> Result<Self> {
        let state = match store.load(account_id) {
            Ok(Some(snapshot)) => {
                let state = LedgerState::from_snapshot(snapshot);
                if let Err(reason) = state.account.validate() {
                    warn!(
                        "snapshot for {} is inconsistent ({}), resetting to zero",
                        account_id, reason
                    );
                    LedgerState::fresh(account_id)
                } else {
                    state
                }
            }
            Ok(None) => LedgerState::fresh(account_id),
            Err(Error::StaleSnapshot(detail)) => {
                warn!(
                    "snapshot for {} is unreadable ({}), resetting to zero",
                    account_id, detail
                );
                LedgerState::fresh(account_id)
            }
            Err(e) => return Err(e),
        };

        let (tier_changes, _) = broadcast::channel(32);
        let (applied, _) = broadcast::channel(32);

        Ok(Self {
            state: Mutex::new(state),
            store,
            tier_changes,
            applied,
        })
    }

    /// Tier transitions, emitted after the mutation that caused them
    pub fn subscribe_tier_changes(&self) -> broadcast::Receiver<TierChange> {
        self.tier_changes.subscribe()
    }

    /// Every successfully applied transaction, in ledger order
    pub fn subscribe_transactions(&self) -> broadcast::Receiver<PointTransaction> {
        self.applied.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|e| Error::Storage(format!("ledger lock poisoned: {}", e)))
    }

    pub fn account(&self) -> Result<Account> {
        Ok(self.lock()?.account.clone())
    }

    pub fn balance(&self) -> Result<i64> {
        Ok(self.lock()?.account.point_balance)
    }

    pub fn tier(&self) -> Result<Tier> {
        Ok(self.lock()?.account.tier)
    }

    /// Retained transactions, oldest first
    pub fn history(&self) -> Result<Vec<PointTransaction>> {
        Ok(self.lock()?.transactions.iter().cloned().collect())
    }

    /// Whether a channel identity is already present in the window
    pub fn contains_identity(&self, identity: &str) -> Result<bool> {
        Ok(self.lock()?.identities.contains(identity))
    }

    pub fn find_transaction(&self, id: u64) -> Result<Option<PointTransaction>> {
        Ok(self
            .lock()?
            .transactions
            .iter()
            .find(|tx| tx.id == id)
            .cloned())
    }

    /// The adjustment reversing `original`, if one was appended
    pub fn find_compensation(&self, original: u64) -> Result<Option<PointTransaction>> {
        Ok(self
            .lock()?
            .transactions
            .iter()
            .find(|tx| tx.compensates == Some(original))
            .cloned())
    }

    /// Append one transaction to the ledger.
    ///
    /// Validation failures return before anything is touched; the snapshot
    /// is persisted before the in-memory state commits, so a storage
    /// failure leaves the ledger unchanged.
    pub fn append(&self, req: AppendRequest) -> Result<PointTransaction> {
        if req.points == 0 {
            return Err(Error::InvalidAmount(0));
        }
        match req.kind {
            TransactionKind::Earned if req.points < 0 => {
                return Err(Error::InvalidAmount(req.points))
            }
            TransactionKind::Redeemed | TransactionKind::Expired if req.points > 0 => {
                return Err(Error::InvalidAmount(req.points))
            }
            _ => {}
        }
        if req.reason.trim().is_empty() {
            return Err(Error::EmptyReason);
        }

        let mut state = self.lock()?;

        if let Some(identity) = &req.external_id {
            if state.identities.contains(identity) {
                return Err(Error::DuplicateTransaction(identity.clone()));
            }
        }
        if let Some(original) = req.compensates {
            if state
                .transactions
                .iter()
                .any(|tx| tx.compensates == Some(original))
            {
                return Err(Error::DuplicateTransaction(format!(
                    "compensation for {}",
                    original
                )));
            }
        }

        let balance = state.account.point_balance;
        let resulting = balance + req.points;
        if resulting < 0 {
            return Err(Error::InsufficientPoints {
                available: balance,
                requested: -req.points,
            });
        }
        if let Some(floor) = req.floor {
            if resulting < floor {
                return Err(Error::TierDowngradeBlocked {
                    tier: state.account.tier,
                    floor,
                });
            }
        }

        let tx = PointTransaction {
            id: next_transaction_id(),
            kind: req.kind,
            points: req.points,
            reason: req.reason,
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
            order_id: req.order_id,
            resulting_balance: resulting,
            external_id: req.external_id,
            compensates: req.compensates,
        };

        // Build the post-append state, persist it, then commit. The window
        // is small (<= HISTORY_WINDOW) so the clone is cheap.
        let mut account = state.account.clone();
        account.point_balance = resulting;
        match tx.kind {
            TransactionKind::Earned => account.total_earned += tx.points,
            TransactionKind::Redeemed => account.total_redeemed += -tx.points,
            TransactionKind::Expired => account.total_expired += -tx.points,
            TransactionKind::Adjusted => {
                if tx.compensates.is_some() && tx.points > 0 {
                    // A reversal cancels the redemption leg it compensates,
                    // restoring both the balance and totalRedeemed exactly.
                    account.total_redeemed -= tx.points;
                } else {
                    account.total_earned += tx.points;
                }
            }
        }

        let previous_tier = account.tier;
        account.tier = classify(resulting).tier;

        let mut window = state.transactions.clone();
        window.push_back(tx.clone());
        let mut evicted_identities = Vec::new();
        while window.len() > HISTORY_WINDOW {
            if let Some(old) = window.pop_front() {
                if let Some(identity) = old.external_id {
                    evicted_identities.push(identity);
                }
            }
        }

        self.store
            .save(&Snapshot::new(&account, window.iter().cloned().collect()))?;

        let current_tier = account.tier;
        let account_id = account.id.clone();
        state.account = account;
        state.transactions = window;
        if let Some(identity) = &tx.external_id {
            state.identities.insert(identity.clone());
        }
        for identity in evicted_identities {
            state.identities.remove(&identity);
        }
        drop(state);

        let _ = self.applied.send(tx.clone());
        if current_tier != previous_tier {
            info!(
                "account {} moved from {} to {} at {} points",
                account_id, previous_tier, current_tier, resulting
            );
            let _ = self.tier_changes.send(TierChange {
                previous: previous_tier,
                current: current_tier,
                balance: resulting,
            });
        }

        Ok(tx)
    }
}
