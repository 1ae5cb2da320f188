//! Point transaction domain model

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a ledger entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earned,
    Redeemed,
    Expired,
    Adjusted,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Earned => "earned",
            TransactionKind::Redeemed => "redeemed",
            TransactionKind::Expired => "expired",
            TransactionKind::Adjusted => "adjusted",
        }
    }
}

/// A single entry in the point ledger, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: u64,
    pub kind: TransactionKind,
    /// Signed point delta (negative for debits)
    pub points: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Balance after this entry was applied
    pub resulting_balance: i64,
    /// Stable channel identity used for dedupe under at-least-once
    /// delivery. Locally originated entries leave this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Id of the redemption this adjustment reverses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensates: Option<u64>,
}

/// Counter for generating unique ids within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a monotonically ordered transaction id.
///
/// Lower 48 bits carry the millisecond timestamp, the low 16 bits a
/// wrapping counter (65536 unique ids per millisecond). Sorting by id
/// therefore matches append order within a process lifetime.
pub fn next_transaction_id() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;

    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

/// Stable identity for an inbound event that carries no explicit
/// transaction id: SHA-256 over order id, signed points, and the event
/// timestamp, truncated to 16 hex chars.
pub fn event_fingerprint(
    order_id: Option<&str>,
    points: i64,
    timestamp: Option<DateTime<Utc>>,
) -> String {
    let ts = timestamp
        .map(|t| t.timestamp_millis().to_string())
        .unwrap_or_else(|| "-".to_string());
    let input = format!("{}|{}|{}", order_id.unwrap_or(""), points, ts);

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8]) // 16 hex chars
}

// Need hex encoding for fingerprints
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ids_are_monotonic() {
        let mut last = next_transaction_id();
        for _ in 0..1000 {
            let id = next_transaction_id();
            assert!(id > last, "id {} did not advance past {}", id, last);
            last = id;
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let a = event_fingerprint(Some("order-1001"), 250, Some(ts));
        let b = event_fingerprint(Some("order-1001"), 250, Some(ts));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_fingerprint_differs_by_field() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let base = event_fingerprint(Some("order-1001"), 250, Some(ts));

        assert_ne!(base, event_fingerprint(Some("order-1002"), 250, Some(ts)));
        assert_ne!(base, event_fingerprint(Some("order-1001"), 251, Some(ts)));
        assert_ne!(
            base,
            event_fingerprint(
                Some("order-1001"),
                250,
                Some(ts + chrono::Duration::milliseconds(1))
            )
        );
        assert_ne!(base, event_fingerprint(None, 250, Some(ts)));
    }

    #[test]
    fn test_fingerprint_without_timestamp() {
        let a = event_fingerprint(Some("order-1001"), 250, None);
        let b = event_fingerprint(Some("order-1001"), 250, None);
        assert_eq!(a, b);
    }
}
