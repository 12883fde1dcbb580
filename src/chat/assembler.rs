//! Assembly of streamed bot replies
//!
//! A reply starts as an empty, non-final placeholder message. Stream events
//! grow it; finishing marks it final, replacing the text with a fixed
//! apology when the stream failed. Each conversation has at most one reply
//! in flight, identified by a [`StreamTicket`]; events and finishes carrying
//! a ticket that is no longer current are dropped.

use crate::error::{Result, WestlineError};
use crate::gateway::{HistoryRole, HistoryTurn, StreamEvent};
use crate::models::{Conversation, Message, Sender};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Text shown when a reply could not be produced
pub const FAILURE_TEXT: &str =
    "I'm having trouble connecting to my creative core right now. Please try again.";

/// Identifies one in-flight reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTicket {
    /// Conversation the reply belongs to
    pub conversation_id: String,
    /// Id of the placeholder message
    pub message_id: String,
    token: u64,
}

impl StreamTicket {
    /// Request token, unique for the lifetime of the assembler
    pub fn token(&self) -> u64 {
        self.token
    }
}

#[derive(Debug)]
struct InFlight {
    token: u64,
    message_id: String,
    attached: bool,
}

/// Drives in-flight replies for any number of conversations
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    next_token: u64,
    in_flight: HashMap<String, InFlight>,
}

impl ReplyAssembler {
    /// Create an assembler with nothing in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a reply in `conversation` by appending a placeholder
    ///
    /// # Errors
    ///
    /// Returns `StreamInFlight` if the conversation already has a reply in
    /// flight
    pub fn begin(
        &mut self,
        conversation: &mut Conversation,
        now: DateTime<Utc>,
    ) -> Result<StreamTicket> {
        if self.in_flight.contains_key(&conversation.id) {
            return Err(WestlineError::StreamInFlight(conversation.id.clone()).into());
        }

        self.next_token += 1;
        let placeholder = Message::bot_placeholder(now);
        let ticket = StreamTicket {
            conversation_id: conversation.id.clone(),
            message_id: placeholder.id.clone(),
            token: self.next_token,
        };
        conversation.messages.push(placeholder);
        conversation.timestamp = now;

        self.in_flight.insert(
            conversation.id.clone(),
            InFlight {
                token: ticket.token,
                message_id: ticket.message_id.clone(),
                attached: false,
            },
        );
        tracing::debug!(
            "Reply {} started in {} (token {})",
            ticket.message_id,
            ticket.conversation_id,
            ticket.token
        );
        Ok(ticket)
    }

    /// True if `ticket` is the conversation's current reply
    pub fn is_current(&self, ticket: &StreamTicket) -> bool {
        self.in_flight
            .get(&ticket.conversation_id)
            .is_some_and(|f| f.token == ticket.token)
    }

    /// True if the conversation has a reply in flight
    pub fn is_streaming(&self, conversation_id: &str) -> bool {
        self.in_flight.contains_key(conversation_id)
    }

    /// Apply one stream event to the placeholder
    ///
    /// # Returns
    ///
    /// `false` when the event was dropped (stale ticket, missing message or
    /// fragment after an attachment)
    pub fn apply(
        &mut self,
        ticket: &StreamTicket,
        conversation: &mut Conversation,
        event: StreamEvent,
    ) -> bool {
        let Some(state) = self.in_flight.get_mut(&ticket.conversation_id) else {
            return false;
        };
        if state.token != ticket.token {
            tracing::debug!("Dropping event for stale token {}", ticket.token);
            return false;
        }
        let Some(message) = conversation
            .messages
            .iter_mut()
            .find(|m| m.id == state.message_id)
        else {
            return false;
        };

        match event {
            StreamEvent::TextFragment(_) if state.attached => false,
            StreamEvent::TextFragment(text) => {
                message.text.push_str(&text);
                true
            }
            StreamEvent::AssetAttachment { caption, image } => {
                message.text = caption;
                message.image = Some(image);
                state.attached = true;
                true
            }
        }
    }

    /// Finalize the reply and release the conversation
    ///
    /// On failure the text is replaced by [`FAILURE_TEXT`].
    ///
    /// # Returns
    ///
    /// `false` when the ticket was stale and nothing changed
    pub fn finish(
        &mut self,
        ticket: &StreamTicket,
        conversation: &mut Conversation,
        failed: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!("Ignoring finish for stale token {}", ticket.token);
            return false;
        }
        self.in_flight.remove(&ticket.conversation_id);

        if let Some(message) = conversation
            .messages
            .iter_mut()
            .find(|m| m.id == ticket.message_id)
        {
            if failed {
                message.text = FAILURE_TEXT.to_string();
            }
            message.is_final = true;
        }
        conversation.timestamp = now;

        tracing::debug!(
            "Reply {} in {} finished{}",
            ticket.message_id,
            ticket.conversation_id,
            if failed { " with failure" } else { "" }
        );
        true
    }

    /// Forget the reply in flight for a conversation, making its ticket stale
    pub fn cancel(&mut self, conversation_id: &str) {
        if self.in_flight.remove(conversation_id).is_some() {
            tracing::debug!("Cancelled reply in flight for {}", conversation_id);
        }
    }

    /// Forget every reply in flight
    pub fn cancel_all(&mut self) {
        self.in_flight.clear();
    }
}

/// History to send with a new prompt
///
/// Messages with empty text (such as an unfinished placeholder) are left
/// out; bot messages become `model` turns.
pub fn build_history(messages: &[Message]) -> Vec<HistoryTurn> {
    messages
        .iter()
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| HistoryTurn {
            role: match m.sender {
                Sender::User => HistoryRole::User,
                Sender::Bot => HistoryRole::Model,
            },
            text: m.text.clone(),
        })
        .collect()
}

/// Finalize any message an interrupted stream left non-final
///
/// # Returns
///
/// Number of messages changed
pub fn finalize_dangling(conversation: &mut Conversation) -> usize {
    let mut fixed = 0;
    for message in conversation.messages.iter_mut().filter(|m| !m.is_final) {
        if message.text.trim().is_empty() && message.image.is_none() {
            message.text = FAILURE_TEXT.to_string();
        }
        message.is_final = true;
        fixed += 1;
    }
    fixed
}
