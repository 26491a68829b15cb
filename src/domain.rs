use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Bearer credential issued by the SSO token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Credential {
            access_token,
            refresh_token,
            expires_at: captured_at + Duration::seconds(expires_in),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Progress marker over the wallet journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWatermark {
    #[serde(rename = "last_journal_id")]
    pub last_seen_id: Option<i64>,
    #[serde(rename = "missions_completed")]
    pub cumulative_count: u64,
}

/// One wallet journal entry as returned by ESI, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub ref_type: String,
    #[serde(default)]
    pub amount: f64,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl RateSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        RateSample { timestamp, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_expiry_is_capture_time_plus_lifetime() {
        let captured_at = Utc::now();
        let credential = Credential::new(String::from("at"), None, 1199, captured_at);

        assert_eq!(credential.expires_at, captured_at + Duration::seconds(1199));
        assert!(!credential.is_expired_at(captured_at));
        assert!(credential.is_expired_at(credential.expires_at));
    }

    #[test]
    fn watermark_uses_persisted_field_names() {
        let watermark = ActivityWatermark {
            last_seen_id: Some(42),
            cumulative_count: 3,
        };
        let json = serde_json::to_value(&watermark).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "last_journal_id": 42, "missions_completed": 3 })
        );
    }

    #[test]
    fn journal_entry_without_amount_defaults_to_zero() {
        let entry: LedgerEntry = serde_json::from_str(
            r#"{"id": 7, "ref_type": "market_escrow", "date": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(entry.amount, 0.0);
        assert!(entry.description.is_none());
    }
}
