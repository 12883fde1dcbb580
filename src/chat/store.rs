//! Per-user conversation list with an active pointer
//!
//! The store owns the signed-in user's conversations in memory and rewrites
//! the whole list through [`AuthService`] after every mutation. Streamed
//! replies go through the embedded [`ReplyAssembler`]; fragments are applied
//! in memory only and the list is persisted when a reply starts and when it
//! finishes.

use crate::auth::AuthService;
use crate::chat::assembler::{build_history, finalize_dangling, ReplyAssembler, StreamTicket};
use crate::error::{Result, WestlineError};
use crate::gateway::{HistoryTurn, StreamEvent};
use crate::models::{Conversation, Feedback, Message};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Conversations of one signed-in user
pub struct ConversationStore {
    auth: Arc<AuthService>,
    email: String,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    assembler: ReplyAssembler,
}

impl ConversationStore {
    /// Load the stored list for `email`
    ///
    /// Conversations without messages are dropped and messages left
    /// unfinished by an interrupted reply are finalized. The most recent
    /// conversation becomes active.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read or the cleaned list cannot
    /// be written back
    pub fn load(auth: Arc<AuthService>, email: &str) -> Result<Self> {
        let stored = auth.conversations_for_user(email)?;
        let total = stored.len();

        let mut repaired = 0;
        let conversations: Vec<Conversation> = stored
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|mut c| {
                repaired += finalize_dangling(&mut c);
                c
            })
            .collect();

        let dropped = total - conversations.len();
        if dropped > 0 || repaired > 0 {
            tracing::debug!(
                "Cleaned history for {}: dropped {} empty conversation(s), finalized {} message(s)",
                email,
                dropped,
                repaired
            );
            auth.save_conversations_for_user(email, &conversations)?;
        }

        let mut store = Self {
            auth,
            email: email.to_string(),
            conversations,
            active_id: None,
            assembler: ReplyAssembler::new(),
        };
        store.active_id = store.most_recent(None).map(|c| c.id.clone());
        tracing::info!(
            "Loaded {} conversation(s) for {}",
            store.conversations.len(),
            email
        );
        Ok(store)
    }

    /// Email the list belongs to
    pub fn email(&self) -> &str {
        &self.email
    }

    /// All conversations in storage order
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Conversations in presentation order: pinned first, then newest
    pub fn sorted(&self) -> Vec<&Conversation> {
        let mut sorted: Vec<&Conversation> = self.conversations.iter().collect();
        sorted.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        sorted
    }

    /// Id of the active conversation
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// The active conversation
    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Look up a conversation
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| WestlineError::ConversationNotFound(id.to_string()).into())
    }

    /// Most recently active conversation with messages, optionally skipping one
    pub fn most_recent(&self, exclude: Option<&str>) -> Option<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| !c.is_empty() && Some(c.id.as_str()) != exclude)
            .max_by_key(|c| c.timestamp)
    }

    /// Rewrite the stored list
    pub fn persist(&self) -> Result<()> {
        self.auth
            .save_conversations_for_user(&self.email, &self.conversations)
    }

    /// Return the active conversation id, creating a conversation when
    /// none is active
    ///
    /// # Returns
    ///
    /// The id and whether a conversation was created
    pub fn ensure_active(&mut self, now: DateTime<Utc>) -> (String, bool) {
        if let Some(id) = self.active_id.clone() {
            if self.get(&id).is_some() {
                return (id, false);
            }
        }

        let conversation = Conversation::new(now);
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        tracing::debug!("Created conversation {}", id);
        (id, true)
    }

    /// Deselect the active conversation
    ///
    /// Nothing is created until the next message is sent.
    pub fn new_chat(&mut self) {
        self.active_id = None;
    }

    /// Make `id` the active conversation
    pub fn select(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            return Err(WestlineError::ConversationNotFound(id.to_string()).into());
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Delete a conversation
    ///
    /// A reply streaming into it is abandoned. Deleting the active
    /// conversation activates the most recent remaining one.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return Err(WestlineError::ConversationNotFound(id.to_string()).into());
        }

        self.assembler.cancel(id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.most_recent(None).map(|c| c.id.clone());
        }
        tracing::info!("Deleted conversation {}", id);
        self.persist()
    }

    /// Flip the pinned flag
    ///
    /// # Returns
    ///
    /// The new pinned state
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        let conversation = self.get_mut(id)?;
        conversation.is_pinned = !conversation.is_pinned;
        let pinned = conversation.is_pinned;
        self.persist()?;
        Ok(pinned)
    }

    /// Rename a conversation; blank titles are rejected
    pub fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WestlineError::Validation(crate::error::FieldError::new(
                "title",
                "Title cannot be empty.",
            ))
            .into());
        }
        self.get_mut(id)?.title = title.to_string();
        self.persist()
    }

    /// Store a generated title
    ///
    /// # Returns
    ///
    /// `false` when the conversation no longer exists or already has this
    /// title
    pub fn set_title(&mut self, id: &str, title: &str) -> Result<bool> {
        let Ok(conversation) = self.get_mut(id) else {
            tracing::debug!("Dropping title for deleted conversation {}", id);
            return Ok(false);
        };
        if conversation.title == title {
            return Ok(false);
        }
        conversation.title = title.to_string();
        self.persist()?;
        Ok(true)
    }

    /// Remove every conversation
    pub fn clear(&mut self) -> Result<()> {
        self.assembler.cancel_all();
        self.conversations.clear();
        self.active_id = None;
        tracing::info!("Cleared history for {}", self.email);
        self.persist()
    }

    /// Toggle feedback on a message; the same value twice clears it
    ///
    /// # Returns
    ///
    /// The feedback now stored on the message
    pub fn set_feedback(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        feedback: Feedback,
    ) -> Result<Option<Feedback>> {
        let message = self
            .get_mut(conversation_id)?
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| WestlineError::MessageNotFound(message_id.to_string()))?;

        message.feedback = if message.feedback == Some(feedback) {
            None
        } else {
            Some(feedback)
        };
        let current = message.feedback;
        self.persist()?;
        Ok(current)
    }

    /// Find the conversation holding `message_id`
    pub fn find_message(&self, message_id: &str) -> Option<(&Conversation, &Message)> {
        self.conversations.iter().find_map(|c| {
            c.messages
                .iter()
                .find(|m| m.id == message_id)
                .map(|m| (c, m))
        })
    }

    /// History to send with the next prompt in a conversation
    pub fn history(&self, conversation_id: &str) -> Vec<HistoryTurn> {
        self.get(conversation_id)
            .map(|c| build_history(&c.messages))
            .unwrap_or_default()
    }

    /// Append a user message (not persisted until the reply starts)
    pub fn append_user_message(
        &mut self,
        conversation_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let conversation = self.get_mut(conversation_id)?;
        let message = Message::user(text, now);
        let id = message.id.clone();
        conversation.messages.push(message);
        conversation.timestamp = now;
        Ok(id)
    }

    /// True if a reply is streaming into the conversation
    pub fn is_streaming(&self, conversation_id: &str) -> bool {
        self.assembler.is_streaming(conversation_id)
    }

    /// Start a reply by inserting a placeholder and persisting
    ///
    /// # Errors
    ///
    /// Returns `StreamInFlight` if a reply is already streaming into the
    /// conversation
    pub fn begin_reply(&mut self, conversation_id: &str, now: DateTime<Utc>) -> Result<StreamTicket> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)
            .ok_or_else(|| WestlineError::ConversationNotFound(conversation_id.to_string()))?;
        let previous_timestamp = self.conversations[index].timestamp;
        let ticket = self.assembler.begin(&mut self.conversations[index], now)?;
        if let Err(e) = self.persist() {
            // Undo the placeholder so the conversation can be retried
            self.assembler.cancel(conversation_id);
            let conversation = &mut self.conversations[index];
            conversation.messages.retain(|m| m.id != ticket.message_id);
            conversation.timestamp = previous_timestamp;
            return Err(e);
        }
        Ok(ticket)
    }

    /// Apply a stream event in memory
    pub fn apply_event(&mut self, ticket: &StreamTicket, event: StreamEvent) -> bool {
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == ticket.conversation_id)
        else {
            return false;
        };
        self.assembler.apply(ticket, conversation, event)
    }

    /// Finalize a reply and persist
    ///
    /// # Returns
    ///
    /// `false` when the ticket was stale
    pub fn finish_reply(
        &mut self,
        ticket: &StreamTicket,
        failed: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == ticket.conversation_id)
        else {
            self.assembler.cancel(&ticket.conversation_id);
            return Ok(false);
        };
        if !self.assembler.finish(ticket, conversation, failed, now) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// The message a ticket is filling in
    pub fn reply_message(&self, ticket: &StreamTicket) -> Option<&Message> {
        self.get(&ticket.conversation_id)?
            .messages
            .iter()
            .find(|m| m.id == ticket.message_id)
    }

    /// Abandon every reply in flight
    pub fn cancel_streams(&mut self) {
        self.assembler.cancel_all();
    }
}
