//! Realtime event channel port

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::LoyaltyEvent;

/// Push channel abstraction.
///
/// Implementations wrap the realtime transport. Delivery is at-least-once
/// and possibly out of order; the reconciler owns dedupe and replay
/// safety, the channel only moves messages.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Open the connection and send the `subscribe:loyalty` handshake
    /// scoped to the given account.
    async fn connect(&self, user_id: &str) -> Result<()>;

    /// Receive the next event. `Ok(None)` means the channel closed
    /// cleanly; `Error::ChannelDisconnected` means the connection dropped
    /// and the caller should reconnect.
    async fn recv(&self) -> Result<Option<LoyaltyEvent>>;
}
