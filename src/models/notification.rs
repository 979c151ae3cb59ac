//! In-app notification pushed when something happens to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventKind, EventPayload};

/// A notification record, as listed by the notifications panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// User who triggered the notification, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventPayload for Notification {
    const KIND: EventKind = EventKind::Notification;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_payload() {
        let n: Notification = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(n.id, 1);
        assert!(!n.is_read);
        assert!(n.title.is_none());
    }

    #[test]
    fn test_full_payload() {
        let n: Notification = serde_json::from_value(json!({
            "id": 42,
            "type": "like",
            "title": "New like",
            "message": "Asha liked your post",
            "link": "/posts/9",
            "sender_id": 3,
            "is_read": true,
            "created_at": "2024-03-01T10:15:00Z",
            "unrelated": "ignored"
        }))
        .unwrap();

        assert_eq!(n.notification_type.as_deref(), Some("like"));
        assert_eq!(n.sender_id, Some(3));
        assert!(n.is_read);
        assert_eq!(
            n.created_at.unwrap().to_rfc3339(),
            "2024-03-01T10:15:00+00:00"
        );
    }
}
