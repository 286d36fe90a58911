//! Message edit state machine: in-place content edits that preserve the
//! pre-first-edit original, downstream truncation for regeneration, and the
//! policy deciding when a destructive truncation needs confirmation.

use crate::model::{now_ms, Message};

/// Discarding more than this many downstream messages requires confirmation.
const CONFIRM_DISCARD_THRESHOLD: usize = 2;

/// Replace the content of the message with `id`, returning a fresh copy of
/// the whole sequence.
///
/// `edited_at` is set on every edit; `original_content` is captured only on
/// the first one and never overwritten. An unknown id returns the sequence
/// unchanged.
pub fn edit_message(messages: &[Message], id: &str, new_content: &str) -> Vec<Message> {
    edit_message_at(messages, id, new_content, now_ms())
}

pub fn edit_message_at(messages: &[Message], id: &str, new_content: &str, now: i64) -> Vec<Message> {
    messages
        .iter()
        .map(|message| {
            if message.id != id {
                return message.clone();
            }
            let mut edited = message.clone();
            if edited.original_content.is_none() {
                edited.original_content = Some(message.content.clone());
            }
            edited.content = new_content.to_string();
            edited.edited_at = Some(now);
            edited
        })
        .collect()
}

/// Keep the prefix up to and including the message with `id`.
///
/// An unknown id yields an empty sequence. That fail-closed behavior is
/// deliberate and relied upon by callers; do not soften it to a passthrough.
pub fn truncate_messages_after(messages: &[Message], id: &str) -> Vec<Message> {
    match messages.iter().position(|message| message.id == id) {
        Some(index) => messages[..=index].to_vec(),
        None => Vec::new(),
    }
}

/// Whether truncating after `id` should be gated behind a confirmation:
/// true iff strictly more than two downstream messages would be discarded.
/// Unknown ids and the last message never prompt.
pub fn should_show_confirmation(messages: &[Message], id: &str) -> bool {
    match messages.iter().position(|message| message.id == id) {
        Some(index) => messages.len() - index - 1 > CONFIRM_DISCARD_THRESHOLD,
        None => false,
    }
}
