//! Perks Core - Loyalty points ledger and tier engine
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, PointTransaction, Tier)
//! - **ports**: Trait definitions for external dependencies (SnapshotStore, EventChannel)
//! - **services**: Business logic orchestration (ledger, redemption, reconciler)
//! - **adapters**: Concrete implementations (JSON snapshots, demo feed)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::json_snapshot::JsonSnapshotStore;
use config::Config;
use ports::EventChannel;
use services::{LedgerService, Reconciler, RedemptionService, StatusService};

// Re-export commonly used types at crate root
pub use config::DowngradePolicy;
pub use domain::result::Error;
pub use domain::{Account, LoyaltyEvent, PointTransaction, Tier, TierStatus, TransactionKind};

/// Main context for Perks operations
///
/// The primary entry point for all business logic. Each instance owns one
/// account's state - there is no shared global store, so multiple accounts
/// and isolated tests coexist without interference.
pub struct PerksContext {
    pub config: Config,
    pub ledger: Arc<LedgerService>,
    pub redemption_service: RedemptionService,
    pub status_service: StatusService,
}

impl PerksContext {
    /// Create a new Perks context for one account
    pub fn new(perks_dir: &Path, account_id: &str) -> Result<Self> {
        let config = Config::load(perks_dir)?;

        // Demo mode keeps its data next to, but separate from, real data
        let data_dir = if config.demo_mode {
            perks_dir.join("demo")
        } else {
            perks_dir.join("accounts")
        };

        let store = Arc::new(JsonSnapshotStore::new(&data_dir)?);
        let ledger = Arc::new(LedgerService::open(account_id, store)?);

        let redemption_service =
            RedemptionService::new(Arc::clone(&ledger), config.downgrade_policy);
        let status_service = StatusService::new(Arc::clone(&ledger));

        Ok(Self {
            config,
            ledger,
            redemption_service,
            status_service,
        })
    }

    /// Build the reconciler for this account over the given channel
    pub fn reconciler(&self, channel: Arc<dyn EventChannel>) -> Result<Reconciler> {
        Ok(Reconciler::new(
            Arc::clone(&self.ledger),
            channel,
            self.config.backoff.clone(),
        )?)
    }
}
