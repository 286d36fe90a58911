//! The persistence seam. The engine itself never performs I/O; callers load
//! the conversation collection through this interface, run the pure query
//! and mutation functions, and persist the returned copies.

use thiserror::Error;

use crate::model::Conversation;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation '{0}' not found")]
    NotFound(String),
    #[error("reading conversation library")]
    Io(#[from] std::io::Error),
    #[error("decoding conversation library")]
    Decode(#[from] serde_json::Error),
}

pub trait ConversationStore {
    fn load_conversations(&self) -> Result<Vec<Conversation>, StoreError>;
    /// Insert or replace by id.
    fn save_conversation(&mut self, conversation: &Conversation) -> Result<(), StoreError>;
    fn delete_conversation(&mut self, id: &str) -> Result<(), StoreError>;
}

/// Volatile store backing tests and the CLI session. Holds the collection
/// in insertion order, matching the stable ordering the search engine
/// preserves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: Vec<Conversation>,
}

impl MemoryStore {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self { conversations }
    }

    pub fn into_conversations(self) -> Vec<Conversation> {
        self.conversations
    }
}

impl ConversationStore for MemoryStore {
    fn load_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        Ok(self.conversations.clone())
    }

    fn save_conversation(&mut self, conversation: &Conversation) -> Result<(), StoreError> {
        match self
            .conversations
            .iter_mut()
            .find(|existing| existing.id == conversation.id)
        {
            Some(existing) => *existing = conversation.clone(),
            None => self.conversations.push(conversation.clone()),
        }
        Ok(())
    }

    fn delete_conversation(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.conversations.len();
        self.conversations.retain(|conversation| conversation.id != id);
        if self.conversations.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
