//! Payment status changes for consultation bookings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventKind, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
    Refunded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub payment_id: i64,
    pub status: PaymentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentStatus {
    /// True once the payment can no longer change state.
    pub fn is_final(&self) -> bool {
        matches!(
            self.status,
            PaymentState::Completed | PaymentState::Failed | PaymentState::Refunded
        )
    }
}

impl EventPayload for PaymentStatus {
    const KIND: EventKind = EventKind::PaymentStatus;
}
