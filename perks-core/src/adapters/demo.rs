//! Demo event feed for demo mode and the `pk watch --demo` flow
//!
//! Plays back a deterministic script of loyalty events for one account,
//! including a duplicate delivery and a mid-stream disconnect, so the
//! reconciler's dedupe and reconnect paths are visible without a live
//! channel.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use log::debug;

use crate::domain::event::{subscribe_message, EventPayload, LoyaltyEvent};
use crate::domain::result::{Error, Result};
use crate::ports::EventChannel;

enum DemoStep {
    Event(LoyaltyEvent),
    /// Simulated connection drop; the reconciler is expected to back off
    /// and reconnect, after which the remaining script continues.
    Interrupt,
}

pub struct DemoEventFeed {
    user_id: String,
    steps: Mutex<VecDeque<DemoStep>>,
    /// Delay between events, shortened in tests
    pace: Duration,
}

impl DemoEventFeed {
    pub fn new(user_id: &str) -> Self {
        Self::with_pace(user_id, Duration::from_millis(400))
    }

    pub fn with_pace(user_id: &str, pace: Duration) -> Self {
        Self {
            user_id: user_id.to_string(),
            steps: Mutex::new(Self::script(user_id)),
            pace,
        }
    }

    fn script(user_id: &str) -> VecDeque<DemoStep> {
        let now = Utc::now();
        let earned = |points: i64, order: &str, minutes_ago: i64| {
            LoyaltyEvent::PointsEarned(EventPayload {
                user_id: user_id.to_string(),
                points: Some(points),
                reason: Some("Order delivered".to_string()),
                order_id: Some(order.to_string()),
                timestamp: Some(now - ChronoDuration::minutes(minutes_ago)),
                ..EventPayload::default()
            })
        };

        let replayed = earned(400, "demo-order-1002", 40);

        VecDeque::from(vec![
            DemoStep::Event(earned(250, "demo-order-1001", 55)),
            DemoStep::Event(earned(400, "demo-order-1002", 40)),
            // at-least-once delivery: same order pushed twice
            DemoStep::Event(replayed.clone()),
            DemoStep::Interrupt,
            // the broker replays the last event after reconnect
            DemoStep::Event(replayed),
            DemoStep::Event(LoyaltyEvent::PointsAdjusted(EventPayload {
                user_id: user_id.to_string(),
                points: Some(-100),
                reason: Some("Support correction for demo-order-1001".to_string()),
                transaction_id: Some("demo-adj-7001".to_string()),
                timestamp: Some(now - ChronoDuration::minutes(20)),
                ..EventPayload::default()
            })),
            DemoStep::Event(earned(600, "demo-order-1003", 5)),
            DemoStep::Event(LoyaltyEvent::TierUpgraded(EventPayload {
                user_id: user_id.to_string(),
                new_tier: Some("gold".to_string()),
                old_tier: Some("silver".to_string()),
                timestamp: Some(now),
                ..EventPayload::default()
            })),
        ])
    }
}

#[async_trait]
impl EventChannel for DemoEventFeed {
    async fn connect(&self, user_id: &str) -> Result<()> {
        if user_id != self.user_id {
            return Err(Error::ChannelDisconnected(format!(
                "demo feed is scripted for {}, not {}",
                self.user_id, user_id
            )));
        }
        debug!("demo handshake: {}", subscribe_message(user_id));
        Ok(())
    }

    async fn recv(&self) -> Result<Option<LoyaltyEvent>> {
        let step = {
            let mut steps = self
                .steps
                .lock()
                .map_err(|e| Error::Storage(format!("demo feed lock poisoned: {}", e)))?;
            steps.pop_front()
        };

        match step {
            Some(DemoStep::Event(event)) => {
                tokio::time::sleep(self.pace).await;
                Ok(Some(event))
            }
            Some(DemoStep::Interrupt) => {
                Err(Error::ChannelDisconnected("demo interruption".to_string()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_plays_script_then_closes() {
        let feed = DemoEventFeed::with_pace("cust-42", Duration::from_millis(1));
        feed.connect("cust-42").await.unwrap();

        let mut events = 0;
        let mut interrupts = 0;
        loop {
            match feed.recv().await {
                Ok(Some(_)) => events += 1,
                Ok(None) => break,
                Err(Error::ChannelDisconnected(_)) => interrupts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(events, 7);
        assert_eq!(interrupts, 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_other_accounts() {
        let feed = DemoEventFeed::with_pace("cust-42", Duration::from_millis(1));
        assert!(feed.connect("someone-else").await.is_err());
    }
}
