use indexmap::IndexMap;

use crate::model::{now_ms, Conversation, TagMetadata, MAX_TAGS, MAX_TAG_LEN};

/// Fixed 12-entry palette. A tag's color is a pure function of its name so
/// the same tag renders identically across sessions and conversations.
pub const TAG_PALETTE: [&str; 12] = [
    "#ef4444", "#f97316", "#f59e0b", "#eab308", "#84cc16", "#22c55e", "#14b8a6", "#06b6d4",
    "#3b82f6", "#8b5cf6", "#d946ef", "#ec4899",
];

/// Trim, lowercase, and cap at [`MAX_TAG_LEN`] characters. `None` when
/// nothing is left after trimming.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase().chars().take(MAX_TAG_LEN).collect())
}

/// Deterministic palette color for a tag name.
///
/// Folds UTF-16 code units with the classic 31-multiplier hash under 32-bit
/// signed wraparound, then indexes the palette with `abs(hash) % 12`. The
/// wraparound semantics are load-bearing: stored color expectations depend
/// on this exact sequence.
pub fn tag_color(name: &str) -> &'static str {
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = (unit as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    TAG_PALETTE[hash.unsigned_abs() as usize % TAG_PALETTE.len()]
}

/// Add a tag to a conversation, returning a fresh copy.
///
/// The raw value is normalized first. An empty result, a case-insensitive
/// duplicate, or a conversation already holding [`MAX_TAGS`] tags all return
/// the conversation unchanged, without bumping `updated_at`.
pub fn add_tag(conversation: &Conversation, raw: &str) -> Conversation {
    add_tag_at(conversation, raw, now_ms())
}

pub fn add_tag_at(conversation: &Conversation, raw: &str, now: i64) -> Conversation {
    let Some(tag) = normalize_tag(raw) else {
        return conversation.clone();
    };
    let existing = conversation.tag_slice();
    if existing.len() >= MAX_TAGS || existing.iter().any(|t| t.to_lowercase() == tag) {
        return conversation.clone();
    }
    let mut tags = existing.to_vec();
    tags.push(tag);
    let mut next = conversation.clone();
    next.tags = Some(tags);
    next.updated_at = now;
    next
}

/// Remove exact matches of `tag`, returning a fresh copy.
///
/// A conversation without a tags field comes back untouched. Otherwise
/// `updated_at` is bumped even when no match was found; removing a tag that
/// isn't there still counts as a touch. Removing the last tag leaves an
/// empty vec rather than dropping the field.
pub fn remove_tag(conversation: &Conversation, tag: &str) -> Conversation {
    remove_tag_at(conversation, tag, now_ms())
}

pub fn remove_tag_at(conversation: &Conversation, tag: &str, now: i64) -> Conversation {
    let Some(tags) = conversation.tags.as_ref() else {
        return conversation.clone();
    };
    let remaining: Vec<String> = tags.iter().filter(|t| t.as_str() != tag).cloned().collect();
    let mut next = conversation.clone();
    next.tags = Some(remaining);
    next.updated_at = now;
    next
}

/// Aggregate every distinct tag across the collection.
///
/// Tags are case-sensitive keys here; conversations are expected to store
/// normalized values already. Sorted by count descending, ties broken by
/// name ascending.
pub fn all_tags(conversations: &[Conversation]) -> Vec<TagMetadata> {
    struct Entry {
        count: usize,
        last_used: i64,
    }

    let mut buckets: IndexMap<String, Entry> = IndexMap::new();
    for conversation in conversations {
        for tag in conversation.tag_slice() {
            let entry = buckets.entry(tag.clone()).or_insert(Entry {
                count: 0,
                last_used: i64::MIN,
            });
            entry.count += 1;
            entry.last_used = entry.last_used.max(conversation.updated_at);
        }
    }

    let created_at = now_ms();
    let mut metadata: Vec<TagMetadata> = buckets
        .into_iter()
        .map(|(name, entry)| TagMetadata {
            color: tag_color(&name),
            name,
            count: entry.count,
            created_at,
            last_used: entry.last_used,
        })
        .collect();
    metadata.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    metadata
}

/// Keep only conversations carrying every filter tag (AND semantics),
/// compared case-insensitively. An empty filter passes everything through.
pub fn filter_by_tags(conversations: &[Conversation], tags: &[String]) -> Vec<Conversation> {
    if tags.is_empty() {
        return conversations.to_vec();
    }
    let wanted: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    conversations
        .iter()
        .filter(|conversation| {
            let own: Vec<String> = conversation
                .tag_slice()
                .iter()
                .map(|t| t.to_lowercase())
                .collect();
            wanted.iter().all(|tag| own.contains(tag))
        })
        .cloned()
        .collect()
}
