//! Event names listeners subscribe to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of events the service dispatches.
///
/// The last five are server message types; the first three are emitted by
/// the service itself around the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    Notification,
    PaymentStatus,
    ConsultationUpdate,
    CommentUpdate,
    FollowUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Error,
        EventKind::Notification,
        EventKind::PaymentStatus,
        EventKind::ConsultationUpdate,
        EventKind::CommentUpdate,
        EventKind::FollowUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Error => "error",
            EventKind::Notification => "notification",
            EventKind::PaymentStatus => "payment_status",
            EventKind::ConsultationUpdate => "consultation_update",
            EventKind::CommentUpdate => "comment_update",
            EventKind::FollowUpdate => "follow_update",
        }
    }

    /// Map an inbound message `type` to its event.
    ///
    /// Lifecycle names are never accepted from the wire.
    pub fn from_message_type(message_type: &str) -> Option<EventKind> {
        match message_type {
            "notification" => Some(EventKind::Notification),
            "payment_status" => Some(EventKind::PaymentStatus),
            "consultation_update" => Some(EventKind::ConsultationUpdate),
            "comment_update" => Some(EventKind::CommentUpdate),
            "follow_update" => Some(EventKind::FollowUpdate),
            _ => None,
        }
    }

    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            EventKind::Connected | EventKind::Disconnected | EventKind::Error
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
