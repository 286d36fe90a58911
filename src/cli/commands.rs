use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::format_description::{self, well_known::Rfc3339};
use time::{Date, Duration, OffsetDateTime, Time};

use crate::config::AppConfig;
use crate::editor;
use crate::model::{now_ms, Conversation};
use crate::search::{
    search_conversations, ConversationFilters, DateRange, SearchOutcome, SourceTypeFilter,
};
use crate::tags;

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Free-text query, matched as a case-insensitive substring of the
    /// title or any message content
    #[arg()]
    pub query: Vec<String>,
    /// Date bucket: all, today, last-7-days, last-30-days, custom
    /// (unrecognized values fall back to all)
    #[arg(long)]
    pub date_range: Option<String>,
    /// Custom range start, YYYY-MM-DD (implies --date-range custom)
    #[arg(long)]
    pub from: Option<String>,
    /// Custom range end, YYYY-MM-DD, inclusive (implies --date-range custom)
    #[arg(long)]
    pub to: Option<String>,
    /// Source kind: all, files, urls, none
    #[arg(long)]
    pub source: Option<String>,
    /// Keep conversations with at least this many messages
    #[arg(long)]
    pub min_messages: Option<usize>,
    /// Keep conversations with at most this many messages
    #[arg(long)]
    pub max_messages: Option<usize>,
    /// Require this tag (repeatable; all given tags must be present)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Limit the number of results printed
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TagCommand {
    /// Attach a tag to a conversation
    Add(TagEditArgs),
    /// Remove a tag from a conversation
    Remove(TagEditArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TagEditArgs {
    /// Conversation identifier
    pub conversation_id: String,
    /// Tag name (normalized on add: trimmed, lowercased, capped at 20 chars)
    pub tag: String,
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommand,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Conversation identifier
    pub conversation_id: String,
    /// Message identifier within the conversation
    pub message_id: String,
    /// Replacement content
    #[arg(long)]
    pub content: String,
    /// Discard every message after the edited one (regeneration flow)
    #[arg(long)]
    pub truncate: bool,
    /// Skip the confirmation prompt for destructive truncations
    #[arg(long)]
    pub yes: bool,
}

pub fn search(library_path: &Path, config: &AppConfig, args: SearchArgs) -> Result<()> {
    let conversations = load_library(library_path)?;
    let output = run_search(&conversations, config, &args);
    print!("{output}");
    Ok(())
}

pub fn list_tags(library_path: &Path) -> Result<()> {
    let conversations = load_library(library_path)?;
    print!("{}", format_tag_listing(&tags::all_tags(&conversations)));
    Ok(())
}

pub fn handle_tag_command(library_path: &Path, args: TagArgs) -> Result<()> {
    let conversations = load_library(library_path)?;
    let (updated, message) = apply_tag_command(conversations, &args.command)?;
    write_library(library_path, &updated)?;
    println!("{message}");
    Ok(())
}

pub fn edit_message(library_path: &Path, args: EditArgs) -> Result<()> {
    let conversations = load_library(library_path)?;
    let (updated, message) = apply_edit(conversations, &args)?;
    write_library(library_path, &updated)?;
    println!("{message}");
    Ok(())
}

fn run_search(conversations: &[Conversation], config: &AppConfig, args: &SearchArgs) -> String {
    let query = args.query.join(" ");
    let filters = build_filters(args);

    let tagged = tags::filter_by_tags(conversations, &args.tags);
    let mut outcome = search_conversations(&tagged, &query, Some(&filters));
    let limit = args.limit.min(config.search.max_results);
    if outcome.conversations.len() > limit {
        outcome.conversations.truncate(limit);
    }
    format_search_results(&outcome)
}

fn build_filters(args: &SearchArgs) -> ConversationFilters {
    let mut date_range = args
        .date_range
        .as_deref()
        .map(DateRange::parse_lenient)
        .unwrap_or_default();

    let custom_date_start = args.from.as_deref().and_then(|raw| parse_day(raw).map(|(start, _)| start));
    let custom_date_end = args.to.as_deref().and_then(|raw| parse_day(raw).map(|(_, end)| end));
    if custom_date_start.is_some() || custom_date_end.is_some() {
        date_range = DateRange::Custom;
    }

    ConversationFilters {
        date_range,
        custom_date_start,
        custom_date_end,
        source_type: args
            .source
            .as_deref()
            .map(SourceTypeFilter::parse_lenient)
            .unwrap_or_default(),
        min_messages: args.min_messages,
        max_messages: args.max_messages,
    }
}

/// Millisecond bounds of one calendar day: midnight and the last
/// millisecond before the next midnight.
fn parse_day(input: &str) -> Option<(i64, i64)> {
    static FORMAT: once_cell::sync::Lazy<Vec<format_description::FormatItem<'static>>> =
        once_cell::sync::Lazy::new(|| {
            format_description::parse("[year]-[month]-[day]")
                .expect("valid date format description")
        });
    let date = match Date::parse(input, &*FORMAT) {
        Ok(date) => date,
        Err(err) => {
            tracing::warn!(?err, input, "ignoring unparsable custom date bound");
            return None;
        }
    };
    let start = date
        .with_time(Time::MIDNIGHT)
        .assume_utc()
        .unix_timestamp_nanos()
        / 1_000_000;
    let end = date
        .checked_add(Duration::days(1))?
        .with_time(Time::MIDNIGHT)
        .assume_utc()
        .unix_timestamp_nanos()
        / 1_000_000
        - 1;
    Some((start as i64, end as i64))
}

fn apply_tag_command(
    conversations: Vec<Conversation>,
    command: &TagCommand,
) -> Result<(Vec<Conversation>, String)> {
    let (id, raw_tag, adding) = match command {
        TagCommand::Add(args) => (&args.conversation_id, &args.tag, true),
        TagCommand::Remove(args) => (&args.conversation_id, &args.tag, false),
    };

    let mut updated = Vec::with_capacity(conversations.len());
    let mut message = None;
    for conversation in conversations {
        if conversation.id != *id {
            updated.push(conversation);
            continue;
        }
        let next = if adding {
            let next = tags::add_tag(&conversation, raw_tag);
            message = Some(if next.tag_slice().len() == conversation.tag_slice().len() {
                format!(
                    "Tag '{raw_tag}' not added to '{}' (empty, duplicate, or tag limit reached)",
                    conversation.title
                )
            } else {
                format!("Added tag '{raw_tag}' to '{}'", conversation.title)
            });
            next
        } else {
            message = Some(format!(
                "Removed tag '{raw_tag}' from '{}'",
                conversation.title
            ));
            tags::remove_tag(&conversation, raw_tag)
        };
        updated.push(next);
    }

    match message {
        Some(message) => Ok((updated, message)),
        None => bail!("conversation '{id}' not found"),
    }
}

fn apply_edit(
    conversations: Vec<Conversation>,
    args: &EditArgs,
) -> Result<(Vec<Conversation>, String)> {
    let mut updated = Vec::with_capacity(conversations.len());
    let mut message = None;
    for conversation in conversations {
        if conversation.id != args.conversation_id {
            updated.push(conversation);
            continue;
        }
        if !conversation
            .messages
            .iter()
            .any(|candidate| candidate.id == args.message_id)
        {
            bail!(
                "message '{}' not found in conversation '{}'",
                args.message_id,
                conversation.title
            );
        }

        let mut messages = editor::edit_message(&conversation.messages, &args.message_id, &args.content);
        let mut summary = format!("Edited message '{}'", args.message_id);
        if args.truncate {
            if editor::should_show_confirmation(&messages, &args.message_id) && !args.yes {
                bail!(
                    "truncating after '{}' discards more than 2 messages; re-run with --yes to confirm",
                    args.message_id
                );
            }
            let kept = editor::truncate_messages_after(&messages, &args.message_id);
            let discarded = messages.len() - kept.len();
            messages = kept;
            let _ = write!(summary, ", discarded {discarded} downstream message(s)");
        }

        let mut next = conversation;
        next.messages = messages;
        next.updated_at = now_ms();
        message = Some(summary);
        updated.push(next);
    }

    match message {
        Some(message) => Ok((updated, message)),
        None => bail!("conversation '{}' not found", args.conversation_id),
    }
}

fn format_search_results(outcome: &SearchOutcome) -> String {
    if !outcome.has_results {
        return "No matches found.\n".to_string();
    }
    let mut out = String::new();
    for conversation in &outcome.conversations {
        let _ = writeln!(&mut out, "{}  {}", conversation.id, conversation.title);
        let _ = writeln!(
            &mut out,
            "    created {}  messages {}",
            format_timestamp(conversation.created_at),
            conversation.messages.len()
        );
        let conversation_tags = conversation.tag_slice();
        if !conversation_tags.is_empty() {
            let _ = writeln!(&mut out, "    tags    {}", format_tags(conversation_tags));
        }
        out.push('\n');
    }
    out
}

fn format_tag_listing(metadata: &[crate::model::TagMetadata]) -> String {
    if metadata.is_empty() {
        return "No tags in use.\n".to_string();
    }
    let mut out = String::new();
    for tag in metadata {
        let _ = writeln!(
            &mut out,
            "#{:<20}  {:>3}  {}  last used {}",
            tag.name,
            tag.count,
            tag.color,
            format_timestamp(tag.last_used)
        );
    }
    out
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_timestamp(epoch_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(epoch_ms) * 1_000_000)
        .map(|dt| dt.format(&Rfc3339).unwrap_or_else(|_| epoch_ms.to_string()))
        .unwrap_or_else(|_| epoch_ms.to_string())
}

fn load_library(path: &Path) -> Result<Vec<Conversation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading conversation library {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing conversation library {}", path.display()))
}

fn write_library(path: &Path, conversations: &[Conversation]) -> Result<()> {
    let json =
        serde_json::to_string_pretty(conversations).context("serializing conversation library")?;
    fs::write(path, json)
        .with_context(|| format!("writing conversation library {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, Role};

    fn fixture() -> Vec<Conversation> {
        let mut rust = Conversation::new("Rust lifetimes");
        rust.id = "conv-rust".into();
        rust.messages = vec![
            Message::new(Role::User, "Why does this borrow fail?"),
            Message::new(Role::Ai, "The reference outlives the owner."),
        ];
        rust.tags = Some(vec!["rust".into(), "work".into()]);

        let mut cooking = Conversation::new("Sourdough starter");
        cooking.id = "conv-bread".into();
        cooking.messages = vec![Message::new(Role::User, "Feeding schedule?")];

        vec![rust, cooking]
    }

    #[test]
    fn run_search_combines_text_and_tag_filters() {
        let conversations = fixture();
        let config = AppConfig::default();
        let args = SearchArgs {
            query: vec!["borrow".into()],
            date_range: None,
            from: None,
            to: None,
            source: None,
            min_messages: None,
            max_messages: None,
            tags: vec!["work".into()],
            limit: 20,
        };
        let output = run_search(&conversations, &config, &args);
        assert!(output.contains("Rust lifetimes"));
        assert!(!output.contains("Sourdough"));
        assert!(output.contains("#rust #work"));
    }

    #[test]
    fn run_search_reports_empty_results() {
        let conversations = fixture();
        let config = AppConfig::default();
        let args = SearchArgs {
            query: vec!["quantum".into()],
            date_range: None,
            from: None,
            to: None,
            source: None,
            min_messages: None,
            max_messages: None,
            tags: Vec::new(),
            limit: 20,
        };
        assert_eq!(run_search(&conversations, &config, &args), "No matches found.\n");
    }

    #[test]
    fn build_filters_promotes_date_bounds_to_custom() {
        let args = SearchArgs {
            query: Vec::new(),
            date_range: None,
            from: Some("2024-03-01".into()),
            to: Some("2024-03-31".into()),
            source: Some("urls".into()),
            min_messages: Some(1),
            max_messages: None,
            tags: Vec::new(),
            limit: 20,
        };
        let filters = build_filters(&args);
        assert_eq!(filters.date_range, DateRange::Custom);
        assert_eq!(filters.source_type, SourceTypeFilter::Urls);
        assert!(filters.custom_date_start.is_some());
        assert!(filters.custom_date_end.is_some());
        assert!(filters.custom_date_start < filters.custom_date_end);
    }

    #[test]
    fn build_filters_degrades_bad_values_to_all() {
        let args = SearchArgs {
            query: Vec::new(),
            date_range: Some("fortnight".into()),
            from: Some("not-a-date".into()),
            to: None,
            source: Some("smoke-signal".into()),
            min_messages: None,
            max_messages: None,
            tags: Vec::new(),
            limit: 20,
        };
        let filters = build_filters(&args);
        assert_eq!(filters.date_range, DateRange::All);
        assert_eq!(filters.source_type, SourceTypeFilter::All);
        assert_eq!(filters.custom_date_start, None);
    }

    #[test]
    fn parse_day_spans_exactly_one_utc_day() {
        let (start, end) = parse_day("2024-03-01").expect("valid date");
        assert_eq!(end - start, 86_400_000 - 1);
        assert_eq!(start % 86_400_000, 0);
    }

    #[test]
    fn tag_add_updates_the_target_conversation_only() {
        let conversations = fixture();
        let command = TagCommand::Add(TagEditArgs {
            conversation_id: "conv-bread".into(),
            tag: " Baking ".into(),
        });
        let (updated, message) = apply_tag_command(conversations, &command).expect("apply");
        assert!(message.contains("Added tag"));
        let bread = updated.iter().find(|c| c.id == "conv-bread").unwrap();
        assert_eq!(bread.tag_slice(), ["baking"]);
        let rust = updated.iter().find(|c| c.id == "conv-rust").unwrap();
        assert_eq!(rust.tag_slice(), ["rust", "work"]);
    }

    #[test]
    fn tag_add_reports_rejected_duplicates() {
        let conversations = fixture();
        let command = TagCommand::Add(TagEditArgs {
            conversation_id: "conv-rust".into(),
            tag: "RUST".into(),
        });
        let (updated, message) = apply_tag_command(conversations, &command).expect("apply");
        assert!(message.contains("not added"));
        let rust = updated.iter().find(|c| c.id == "conv-rust").unwrap();
        assert_eq!(rust.tag_slice(), ["rust", "work"]);
    }

    #[test]
    fn tag_command_rejects_unknown_conversations() {
        let command = TagCommand::Remove(TagEditArgs {
            conversation_id: "missing".into(),
            tag: "work".into(),
        });
        let err = apply_tag_command(fixture(), &command).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn edit_without_truncate_rewrites_content_in_place() {
        let conversations = fixture();
        let message_id = conversations[0].messages[0].id.clone();
        let args = EditArgs {
            conversation_id: "conv-rust".into(),
            message_id: message_id.clone(),
            content: "Why does this move fail?".into(),
            truncate: false,
            yes: false,
        };
        let (updated, _) = apply_edit(conversations, &args).expect("apply");
        let rust = updated.iter().find(|c| c.id == "conv-rust").unwrap();
        assert_eq!(rust.messages.len(), 2);
        assert_eq!(rust.messages[0].content, "Why does this move fail?");
        assert_eq!(
            rust.messages[0].original_content.as_deref(),
            Some("Why does this borrow fail?")
        );
    }

    #[test]
    fn destructive_truncation_requires_confirmation() {
        let mut conversations = fixture();
        conversations[0].messages = (1..=5)
            .map(|n| {
                let mut message = Message::new(Role::User, format!("m{n}"));
                message.id = format!("m{n}");
                message
            })
            .collect();

        let args = EditArgs {
            conversation_id: "conv-rust".into(),
            message_id: "m1".into(),
            content: "edited".into(),
            truncate: true,
            yes: false,
        };
        let err = apply_edit(conversations.clone(), &args).unwrap_err();
        assert!(err.to_string().contains("--yes"));

        let confirmed = EditArgs { yes: true, ..args };
        let (updated, summary) = apply_edit(conversations, &confirmed).expect("apply");
        let rust = updated.iter().find(|c| c.id == "conv-rust").unwrap();
        assert_eq!(rust.messages.len(), 1);
        assert!(summary.contains("discarded 4"));
    }

    #[test]
    fn truncating_two_messages_needs_no_confirmation() {
        let mut conversations = fixture();
        conversations[0].messages = (1..=3)
            .map(|n| {
                let mut message = Message::new(Role::User, format!("m{n}"));
                message.id = format!("m{n}");
                message
            })
            .collect();

        let args = EditArgs {
            conversation_id: "conv-rust".into(),
            message_id: "m1".into(),
            content: "edited".into(),
            truncate: true,
            yes: false,
        };
        let (updated, _) = apply_edit(conversations, &args).expect("apply");
        let rust = updated.iter().find(|c| c.id == "conv-rust").unwrap();
        assert_eq!(rust.messages.len(), 1);
    }

    #[test]
    fn library_round_trips_through_json() -> Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("conversations.json");
        let conversations = fixture();
        write_library(&path, &conversations)?;
        let loaded = load_library(&path)?;
        assert_eq!(loaded, conversations);
        Ok(())
    }
}
