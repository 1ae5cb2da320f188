//! Realtime channel message schema
//!
//! Wire format is JSON with an outer `type` discriminator and the payload
//! under `data`:
//! ```json
//! { "type": "points_earned",
//!   "data": { "userId": "cust-42", "points": 250, "orderId": "order-1001" } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound event pushed by the external loyalty channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LoyaltyEvent {
    #[serde(rename = "points_earned")]
    PointsEarned(EventPayload),
    #[serde(rename = "points_adjusted")]
    PointsAdjusted(EventPayload),
    #[serde(rename = "tier_upgraded")]
    TierUpgraded(EventPayload),
}

impl LoyaltyEvent {
    pub fn payload(&self) -> &EventPayload {
        match self {
            LoyaltyEvent::PointsEarned(data)
            | LoyaltyEvent::PointsAdjusted(data)
            | LoyaltyEvent::TierUpgraded(data) => data,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LoyaltyEvent::PointsEarned(_) => "points_earned",
            LoyaltyEvent::PointsAdjusted(_) => "points_adjusted",
            LoyaltyEvent::TierUpgraded(_) => "tier_upgraded",
        }
    }
}

/// Shared payload for all event kinds; unused fields stay `None`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub user_id: String,
    /// Signed for `points_adjusted`, positive for `points_earned`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_total_points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Explicit transaction identity, when the channel assigns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Subscription handshake sent on every (re)connect, scoped to one account
pub fn subscribe_message(user_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "subscribe:loyalty",
        "data": {
            "userId": user_id,
            "events": ["points_earned", "points_adjusted", "tier_upgraded"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_earned_round_trip() {
        let json = r#"{
            "type": "points_earned",
            "data": { "userId": "cust-42", "points": 250, "orderId": "order-1001",
                      "reason": "Order delivered" }
        }"#;
        let event: LoyaltyEvent = serde_json::from_str(json).unwrap();
        match &event {
            LoyaltyEvent::PointsEarned(data) => {
                assert_eq!(data.user_id, "cust-42");
                assert_eq!(data.points, Some(250));
                assert_eq!(data.order_id.as_deref(), Some("order-1001"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], "points_earned");
        assert_eq!(encoded["data"]["userId"], "cust-42");
    }

    #[test]
    fn test_tier_upgraded_parses_without_points() {
        let json = r#"{
            "type": "tier_upgraded",
            "data": { "userId": "cust-42", "newTier": "gold", "oldTier": "silver" }
        }"#;
        let event: LoyaltyEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind_name(), "tier_upgraded");
        assert_eq!(event.payload().new_tier.as_deref(), Some("gold"));
        assert_eq!(event.payload().points, None);
    }

    #[test]
    fn test_subscribe_message_shape() {
        let msg = subscribe_message("cust-42");
        assert_eq!(msg["type"], "subscribe:loyalty");
        assert_eq!(msg["data"]["userId"], "cust-42");
        assert_eq!(msg["data"]["events"].as_array().unwrap().len(), 3);
    }
}
