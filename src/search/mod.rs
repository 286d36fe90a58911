use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::model::{now_ms, Conversation, SourceType};

pub mod debounce;

const DAY_MS: i64 = 86_400_000;

/// Date bucket applied to `created_at`, evaluated against "now".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
pub enum DateRange {
    #[default]
    #[strum(serialize = "all")]
    #[serde(rename = "all")]
    All,
    #[strum(serialize = "today")]
    #[serde(rename = "today")]
    Today,
    #[strum(serialize = "last-7-days")]
    #[serde(rename = "last-7-days")]
    Last7Days,
    #[strum(serialize = "last-30-days")]
    #[serde(rename = "last-30-days")]
    Last30Days,
    #[strum(serialize = "custom")]
    #[serde(rename = "custom")]
    Custom,
}

impl DateRange {
    /// Parse a user-supplied value, degrading unrecognized input to `All`
    /// rather than failing.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_else(|_| {
            tracing::debug!(value = raw, "unrecognized date range, treating as all");
            DateRange::All
        })
    }
}

/// Source-kind predicate. `Files` and `Urls` are not exclusive: a
/// conversation with both kinds passes either.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceTypeFilter {
    #[default]
    All,
    Files,
    Urls,
    None,
}

impl SourceTypeFilter {
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_else(|_| {
            tracing::debug!(value = raw, "unrecognized source filter, treating as all");
            SourceTypeFilter::All
        })
    }
}

/// Structured filter specification. The default value is fully permissive;
/// every predicate combines with the text query by logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationFilters {
    pub date_range: DateRange,
    pub custom_date_start: Option<i64>,
    pub custom_date_end: Option<i64>,
    pub source_type: SourceTypeFilter,
    pub min_messages: Option<usize>,
    pub max_messages: Option<usize>,
}

impl ConversationFilters {
    /// True when any field differs from the permissive default.
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }
}

/// Result of one search pass: the matching subsequence plus the display
/// state a caller needs.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub conversations: Vec<Conversation>,
    /// The query exactly as entered, preserved for display (never trimmed).
    pub query: String,
    pub has_results: bool,
    pub has_active_filters: bool,
}

/// Compute the visible subset of `conversations` for a free-text query and
/// an optional filter specification.
///
/// Matching is a case-insensitive substring test against the title or any
/// message content; an empty or whitespace-only query matches everything.
/// The result preserves the original relative order.
pub fn search_conversations(
    conversations: &[Conversation],
    query: &str,
    filters: Option<&ConversationFilters>,
) -> SearchOutcome {
    search_conversations_at(conversations, query, filters, now_ms())
}

pub fn search_conversations_at(
    conversations: &[Conversation],
    query: &str,
    filters: Option<&ConversationFilters>,
    now: i64,
) -> SearchOutcome {
    let needle = query.trim().to_lowercase();
    let matched: Vec<Conversation> = conversations
        .iter()
        .filter(|conversation| {
            matches_query(conversation, &needle)
                && filters
                    .map(|f| matches_filters(conversation, f, now))
                    .unwrap_or(true)
        })
        .cloned()
        .collect();

    SearchOutcome {
        has_results: !matched.is_empty(),
        has_active_filters: filters.map(ConversationFilters::is_active).unwrap_or(false),
        conversations: matched,
        query: query.to_string(),
    }
}

fn matches_query(conversation: &Conversation, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if conversation.title.to_lowercase().contains(needle) {
        return true;
    }
    conversation
        .messages
        .iter()
        .any(|message| message.content.to_lowercase().contains(needle))
}

fn matches_filters(conversation: &Conversation, filters: &ConversationFilters, now: i64) -> bool {
    matches_date_range(conversation.created_at, filters, now)
        && matches_source_type(conversation, filters.source_type)
        && matches_message_bounds(conversation, filters)
}

fn matches_date_range(created_at: i64, filters: &ConversationFilters, now: i64) -> bool {
    match filters.date_range {
        DateRange::All => true,
        DateRange::Today => same_utc_day(created_at, now),
        DateRange::Last7Days => created_at >= now - 7 * DAY_MS,
        DateRange::Last30Days => created_at >= now - 30 * DAY_MS,
        DateRange::Custom => match (filters.custom_date_start, filters.custom_date_end) {
            (Some(start), Some(end)) => created_at >= start && created_at <= end,
            // Incomplete custom range degrades to no date predicate so the
            // caller's view stays usable while the second bound is picked.
            _ => true,
        },
    }
}

fn same_utc_day(a_ms: i64, b_ms: i64) -> bool {
    let date = |ms: i64| {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
            .map(|dt| dt.date())
            .ok()
    };
    match (date(a_ms), date(b_ms)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn matches_source_type(conversation: &Conversation, filter: SourceTypeFilter) -> bool {
    match filter {
        SourceTypeFilter::All => true,
        SourceTypeFilter::Files => conversation
            .sources
            .iter()
            .any(|source| source.kind == SourceType::File),
        SourceTypeFilter::Urls => conversation
            .sources
            .iter()
            .any(|source| source.kind == SourceType::Url),
        SourceTypeFilter::None => conversation.sources.is_empty(),
    }
}

fn matches_message_bounds(conversation: &Conversation, filters: &ConversationFilters) -> bool {
    let count = conversation.messages.len();
    if let Some(min) = filters.min_messages {
        if count < min {
            return false;
        }
    }
    if let Some(max) = filters.max_messages {
        if count > max {
            return false;
        }
    }
    true
}
