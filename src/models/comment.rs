//! Comment activity on a post.

use serde::{Deserialize, Serialize};

use super::{EventKind, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentAction {
    Created,
    Updated,
    Deleted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentUpdate {
    pub post_id: i64,
    pub action: CommentAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Comment total on the post after this change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u64>,
}

impl EventPayload for CommentUpdate {
    const KIND: EventKind = EventKind::CommentUpdate;
}
