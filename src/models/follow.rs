//! Follow / unfollow activity.

use serde::{Deserialize, Serialize};

use super::{EventKind, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Followed,
    Unfollowed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpdate {
    pub follower_id: i64,
    pub action: FollowAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
}

impl EventPayload for FollowUpdate {
    const KIND: EventKind = EventKind::FollowUpdate;
}
