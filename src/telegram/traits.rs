//! Messaging Client Trait Abstractions
//!
//! These traits keep the verification flow independent of the transport, so
//! the whole flow runs against `MockMessagingClient` in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram user identifier (sender of an update)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat an update arrived in (replies go back here)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The restricted group that credentials grant access to
///
/// Supergroup ids are negative (e.g. `-1003095501562`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport handle for a downloadable attachment (Telegram `file_id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentRef(pub String);

/// A single-use, single-member invite link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub invite_link: String,
}

/// Inbound update, tagged by sender and chat
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub sender: UserId,
    pub chat: ChatId,
    pub kind: EventKind,
}

/// Inbound update content
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Slash command, name without the leading `/` or `@botname` suffix
    Command { name: String, args: Vec<String> },
    Text(String),
    Photo(AttachmentRef),
    /// Stickers, documents, voice notes and anything else
    Other,
}

impl EventKind {
    /// Classify a text message as a command or plain text.
    ///
    /// `/start@my_bot arg` becomes `Command { name: "start", args: ["arg"] }`.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let Some(body) = trimmed.strip_prefix('/') else {
            return EventKind::Text(text.to_string());
        };

        let mut parts = body.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        if name.is_empty() {
            return EventKind::Text(text.to_string());
        }

        EventKind::Command {
            name,
            args: parts.map(str::to_string).collect(),
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failures, timeouts, rate limiting and server-side 5xx
    #[error("Network error: {0}")]
    Network(String),

    /// Token rejected by the API
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// API answered with an error description
    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    /// Response could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Network-class failures are expected to clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// Messaging transport abstraction for testing
///
/// This trait lets `MockMessagingClient` replace the Telegram Bot API in
/// tests. Implementations are cheap to clone and shared between sessions
/// that are handled concurrently.
#[async_trait]
pub trait MessagingClient: Clone + Send + Sync + 'static {
    /// Wait for the next batch of inbound updates (long poll)
    async fn receive_events(&self) -> TransportResult<Vec<InboundEvent>>;

    /// Send a text reply to a chat
    async fn send_text(&self, chat: &ChatId, text: &str) -> TransportResult<()>;

    /// Download the bytes behind an attachment reference
    async fn download_attachment(&self, attachment: &AttachmentRef) -> TransportResult<Vec<u8>>;

    /// Create an invite link to `group` that only one member can redeem
    ///
    /// Not idempotent: a retried call may produce a second valid link.
    async fn create_single_use_invite(&self, group: &GroupId) -> TransportResult<Credential>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_plain() {
        assert_eq!(
            EventKind::from_text("Alice Smith"),
            EventKind::Text("Alice Smith".to_string())
        );
    }

    #[test]
    fn test_from_text_command_with_bot_suffix_and_args() {
        assert_eq!(
            EventKind::from_text("/Start@gate_bot now please"),
            EventKind::Command {
                name: "start".to_string(),
                args: vec!["now".to_string(), "please".to_string()],
            }
        );
    }

    #[test]
    fn test_from_text_lone_slash_is_text() {
        assert_eq!(EventKind::from_text("/"), EventKind::Text("/".to_string()));
    }

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Network("timeout".to_string()).is_transient());
        assert!(!TransportError::Unauthorized("bad token".to_string()).is_transient());
        assert!(!TransportError::Api {
            code: 400,
            description: "Bad Request".to_string()
        }
        .is_transient());
        assert!(!TransportError::Protocol("bad json".to_string()).is_transient());
    }
}
