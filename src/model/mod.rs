use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum number of tags a conversation may carry.
pub const MAX_TAGS: usize = 5;
/// Maximum length of a normalized tag, in characters.
pub const MAX_TAG_LEN: usize = 20;

/// Current UTC time as a millisecond epoch, the timestamp unit used
/// throughout the conversation model.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    File,
    Url,
}

/// An ingested content source a conversation is anchored to. The engine
/// only ever inspects `kind`; the extracted content rides along for the
/// chat collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub kind: SourceType,
    pub name: String,
    pub content: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Set on the first edit and refreshed on every subsequent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<i64>,
    /// The content as it existed before the first edit. Set at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            edited_at: None,
            original_content: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    /// Normalized (lowercase, ≤20 chars) labels, at most [`MAX_TAGS`].
    /// Absent until the first tag is added; an empty vec after the last
    /// one is removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            sources: Vec::new(),
            tags: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Tags as a slice regardless of whether the field is present.
    pub fn tag_slice(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

/// Derived, per-tag view across the whole conversation collection.
/// Recomputed on demand by [`crate::tags::all_tags`], never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMetadata {
    pub name: String,
    pub count: usize,
    pub color: &'static str,
    pub created_at: i64,
    pub last_used: i64,
}
