//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod ledger;
mod reconciler;
mod redemption;
mod status;

pub use ledger::{AppendRequest, LedgerService, TierChange, HISTORY_WINDOW};
pub use reconciler::{ChannelStatus, Reconciler, TierUpgrade};
pub use redemption::RedemptionService;
pub use status::{LoyaltySummary, StatusService};
