//! Realtime reconciler - applies externally pushed loyalty events
//!
//! Consumes the push channel for one account, dedupes under at-least-once
//! delivery, and applies credits and adjustments to the ledger. Tier
//! upgrades are detected by rank comparison and broadcast to consumers;
//! downgrades are a side effect of redemption and are never notified.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{broadcast, watch};

use crate::config::BackoffConfig;
use crate::domain::event::{EventPayload, LoyaltyEvent};
use crate::domain::result::{Error, Result};
use crate::domain::{classify, event_fingerprint, Tier, TransactionKind};
use crate::ports::EventChannel;
use crate::services::ledger::{AppendRequest, LedgerService};

/// Connectivity indicator surfaced to consumers. Local reads keep serving
/// the last known state regardless of the value here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Notification emitted when an external event raises the tier rank
#[derive(Debug, Clone)]
pub struct TierUpgrade {
    pub from: Tier,
    pub to: Tier,
}

enum PumpExit {
    Shutdown,
    Closed,
    Dropped(Error),
}

pub struct Reconciler {
    account_id: String,
    ledger: Arc<LedgerService>,
    channel: Arc<dyn EventChannel>,
    backoff: BackoffConfig,
    /// Highest tier rank acknowledged to the user; survives reconnects
    /// because it is seeded from the persisted snapshot at startup.
    previous_tier: Tier,
    upgrades: broadcast::Sender<TierUpgrade>,
    status: watch::Sender<ChannelStatus>,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<LedgerService>,
        channel: Arc<dyn EventChannel>,
        backoff: BackoffConfig,
    ) -> Result<Self> {
        let account = ledger.account()?;
        let (upgrades, _) = broadcast::channel(32);
        let (status, _) = watch::channel(ChannelStatus::Disconnected);

        Ok(Self {
            account_id: account.id,
            previous_tier: account.tier,
            ledger,
            channel,
            backoff,
            upgrades,
            status,
        })
    }

    /// Tier upgrade notifications (strict rank increases only)
    pub fn subscribe_upgrades(&self) -> broadcast::Receiver<TierUpgrade> {
        self.upgrades.subscribe()
    }

    /// Connectivity indicator; subscribe before calling `run`
    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    /// Consumer loop: connect, subscribe, apply events until the channel
    /// closes cleanly or `shutdown` flips to true.
    ///
    /// Disconnects are recovered with capped exponential backoff; events
    /// replayed by the broker after a reconnect are absorbed by the dedupe
    /// step. The loop observes `shutdown` inside both `recv` and the
    /// backoff sleep, so cancellation never leaks a retry loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = self.backoff.initial_delay();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let _ = self.status.send(ChannelStatus::Connecting);
            match self.channel.connect(&self.account_id).await {
                Ok(()) => {
                    info!("subscribed to loyalty events for {}", self.account_id);
                    let _ = self.status.send(ChannelStatus::Connected);
                    delay = self.backoff.initial_delay();

                    match self.pump(&mut shutdown).await {
                        PumpExit::Shutdown => break,
                        PumpExit::Closed => {
                            debug!("channel closed cleanly for {}", self.account_id);
                            break;
                        }
                        PumpExit::Dropped(e) => {
                            warn!("channel dropped for {}: {}", self.account_id, e);
                        }
                    }
                }
                Err(e) => warn!("connect failed for {}: {}", self.account_id, e),
            }

            let _ = self.status.send(ChannelStatus::Disconnected);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // a dropped sender means the owner is gone; stop too
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            delay = self.backoff.next_delay(delay);
        }

        let _ = self.status.send(ChannelStatus::Disconnected);
    }

    async fn pump(&mut self, shutdown: &mut watch::Receiver<bool>) -> PumpExit {
        loop {
            let channel = Arc::clone(&self.channel);
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return PumpExit::Shutdown;
                    }
                }
                received = channel.recv() => match received {
                    Ok(Some(event)) => {
                        if let Err(e) = self.handle_event(event) {
                            warn!("event dropped for {}: {}", self.account_id, e);
                        }
                    }
                    Ok(None) => return PumpExit::Closed,
                    Err(e) => return PumpExit::Dropped(e),
                },
            }
        }
    }

    /// Apply one inbound event: filter, validate, dedupe, apply, then
    /// detect tier movement. Safe to call with replayed messages.
    pub fn handle_event(&mut self, event: LoyaltyEvent) -> Result<()> {
        if event.payload().user_id != self.account_id {
            debug!(
                "ignoring {} for {} (listening for {})",
                event.kind_name(),
                event.payload().user_id,
                self.account_id
            );
            return Ok(());
        }

        match event {
            LoyaltyEvent::PointsEarned(data) => {
                let points = match data.points {
                    Some(p) if p > 0 => p,
                    _ => {
                        warn!(
                            "discarding points_earned with missing or non-positive points for {}",
                            self.account_id
                        );
                        return Ok(());
                    }
                };
                self.apply(TransactionKind::Earned, points, data)
            }
            LoyaltyEvent::PointsAdjusted(data) => {
                // adjustments may deliberately carry a negative value
                let points = match data.points {
                    Some(p) if p != 0 => p,
                    _ => {
                        warn!(
                            "discarding points_adjusted with missing or zero points for {}",
                            self.account_id
                        );
                        return Ok(());
                    }
                };
                self.apply(TransactionKind::Adjusted, points, data)
            }
            LoyaltyEvent::TierUpgraded(data) => self.apply_tier_push(&data),
        }
    }

    fn apply(&mut self, kind: TransactionKind, points: i64, data: EventPayload) -> Result<()> {
        let identity = data.transaction_id.clone().unwrap_or_else(|| {
            event_fingerprint(data.order_id.as_deref(), points, data.timestamp)
        });

        // at-least-once delivery: replays are absorbed, not errors
        if self.ledger.contains_identity(&identity)? {
            debug!("duplicate event {} absorbed", identity);
            return Ok(());
        }

        let reason = data.reason.unwrap_or_else(|| match kind {
            TransactionKind::Earned => "Points earned".to_string(),
            _ => "Points adjustment".to_string(),
        });

        let req = AppendRequest {
            kind,
            points,
            reason,
            order_id: data.order_id,
            external_id: Some(identity),
            timestamp: data.timestamp.or_else(|| Some(Utc::now())),
            compensates: None,
            floor: None,
        };

        let tx = match self.ledger.append(req) {
            Ok(tx) => tx,
            Err(Error::DuplicateTransaction(identity)) => {
                debug!("duplicate event {} absorbed at append", identity);
                return Ok(());
            }
            Err(Error::InsufficientPoints {
                available,
                requested,
            }) => {
                // a debit adjustment must not break the non-negative
                // invariant; drop it rather than partially apply
                warn!(
                    "adjustment of -{} for {} exceeds balance {}; dropped",
                    requested, self.account_id, available
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let current = classify(tx.resulting_balance).tier;
        if current.rank() > self.previous_tier.rank() {
            let upgrade = TierUpgrade {
                from: self.previous_tier,
                to: current,
            };
            info!(
                "account {} upgraded from {} to {}",
                self.account_id, upgrade.from, upgrade.to
            );
            self.previous_tier = current;
            let _ = self.upgrades.send(upgrade);
        }

        Ok(())
    }

    /// Direct tier pushes carry no points; they only move the tracked tier
    /// upward. The balance-derived tier stays authoritative.
    fn apply_tier_push(&mut self, data: &EventPayload) -> Result<()> {
        let Some(name) = data.new_tier.as_deref() else {
            return Ok(());
        };
        let Some(tier) = Tier::from_name(name) else {
            warn!("ignoring tier_upgraded with unknown tier '{}'", name);
            return Ok(());
        };

        if tier.rank() > self.previous_tier.rank() {
            let upgrade = TierUpgrade {
                from: self.previous_tier,
                to: tier,
            };
            info!(
                "account {} upgraded from {} to {} (pushed)",
                self.account_id, upgrade.from, upgrade.to
            );
            self.previous_tier = tier;
            let _ = self.upgrades.send(upgrade);
        } else {
            debug!(
                "ignoring tier_upgraded to {} at or below tracked {}",
                tier, self.previous_tier
            );
        }

        Ok(())
    }
}

