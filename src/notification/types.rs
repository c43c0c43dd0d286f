use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain events that trigger a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A rent or booking payment settled successfully
    PaymentSuccess,
    /// A rent or booking payment was declined or errored
    PaymentFailed,
    /// A property listing passed review and went live
    ListingApproved,
    /// A landlord update addressed to a tenant
    TenantUpdate,
}

impl EventType {
    /// All recognized event types, in catalog order
    pub const ALL: [EventType; 4] = [
        EventType::PaymentSuccess,
        EventType::PaymentFailed,
        EventType::ListingApproved,
        EventType::TenantUpdate,
    ];

    /// Wire representation (`snake_case`)
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PaymentSuccess => "payment_success",
            EventType::PaymentFailed => "payment_failed",
            EventType::ListingApproved => "listing_approved",
            EventType::TenantUpdate => "tenant_update",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_success" => Ok(EventType::PaymentSuccess),
            "payment_failed" => Ok(EventType::PaymentFailed),
            "listing_approved" => Ok(EventType::ListingApproved),
            "tenant_update" => Ok(EventType::TenantUpdate),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected value for [`EventType::from_str`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0:?}")]
pub struct UnknownEventType(pub String);

/// Delivery lifecycle state of a notification record
///
/// `PENDING` and `RETRYING` are live states; `SENT` and `FAILED` are
/// terminal and never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Created, no delivery attempt completed yet
    Pending,
    /// Last attempt failed transiently; eligible for the retry sweep
    Retrying,
    /// Delivered over every channel the recipient has
    Sent,
    /// Failed permanently or exhausted the attempt ceiling
    Failed,
}

impl NotificationStatus {
    /// Wire representation (`SCREAMING_SNAKE_CASE`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "PENDING",
            NotificationStatus::Retrying => "RETRYING",
            NotificationStatus::Sent => "SENT",
            NotificationStatus::Failed => "FAILED",
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification record
///
/// The record is created in `PENDING` state before any delivery work
/// happens; every completed attempt bumps `attempts` by exactly one and
/// stamps `sent_at`, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier, generated at creation
    pub id: Uuid,
    /// Recipient key, resolved through the directory client
    pub user_id: Uuid,
    /// Domain event that produced this notification
    pub event_type: EventType,
    /// Current lifecycle state
    pub status: NotificationStatus,
    /// Number of completed delivery attempts
    pub attempts: u32,
    /// Template substitution values supplied by the event producer
    pub context: serde_json::Value,
    /// When the most recent attempt completed (success or failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Create a fresh `PENDING` record with zero attempts
    pub fn new(user_id: Uuid, event_type: EventType, context: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_type,
            status: NotificationStatus::Pending,
            attempts: 0,
            context,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_round_trip() {
        for event in EventType::ALL {
            let parsed: EventType = event.as_str().parse().unwrap();
            assert_eq!(parsed, event);
        }
    }

    #[test]
    fn test_event_type_rejects_unknown() {
        let err = "listing_rejected".parse::<EventType>().unwrap_err();
        assert_eq!(err, UnknownEventType("listing_rejected".to_string()));
    }

    #[test]
    fn test_event_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&EventType::ListingApproved).unwrap();
        assert_eq!(json, "\"listing_approved\"");

        let parsed: EventType = serde_json::from_str("\"payment_failed\"").unwrap();
        assert_eq!(parsed, EventType::PaymentFailed);
    }

    #[test]
    fn test_status_serde_uses_upper_case() {
        let json = serde_json::to_string(&NotificationStatus::Retrying).unwrap();
        assert_eq!(json, "\"RETRYING\"");

        let parsed: NotificationStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(parsed, NotificationStatus::Pending);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!NotificationStatus::Pending.is_terminal());
        assert!(!NotificationStatus::Retrying.is_terminal());
        assert!(NotificationStatus::Sent.is_terminal());
        assert!(NotificationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_record_starts_pending() {
        let user = Uuid::new_v4();
        let record = Notification::new(
            user,
            EventType::PaymentSuccess,
            json!({"property_title": "Bole Apartment", "location": "Addis Ababa", "amount": 15000}),
        );

        assert_eq!(record.user_id, user);
        assert_eq!(record.status, NotificationStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert!(record.sent_at.is_none());
        assert_eq!(record.created_at, record.updated_at);
        assert!(!record.is_terminal());
    }
}
