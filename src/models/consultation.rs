//! Expert consultation booking updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventKind, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationUpdate {
    pub consultation_id: i64,
    pub status: ConsultationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EventPayload for ConsultationUpdate {
    const KIND: EventKind = EventKind::ConsultationUpdate;
}
