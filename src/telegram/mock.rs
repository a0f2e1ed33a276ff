//! Mock Messaging Client for Testing
//!
//! Provides MockMessagingClient so the verification flow can be exercised
//! without the Telegram network.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock messaging client for testing
#[derive(Clone, Default)]
pub struct MockMessagingClient {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sent_messages: Vec<SentMessage>,
    incoming: VecDeque<TransportResult<Vec<InboundEvent>>>,
    attachments: HashMap<AttachmentRef, Vec<u8>>,
    invites: Vec<Credential>,
    invite_failures: VecDeque<TransportError>,
    invite_delay: Option<Duration>,
    failing_chats: Vec<ChatId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat: ChatId,
    pub content: String,
}

impl MockMessagingClient {
    /// Create new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch of inbound events for the next `receive_events` call
    pub fn add_incoming_batch(&self, events: Vec<InboundEvent>) {
        self.state.lock().unwrap().incoming.push_back(Ok(events));
    }

    /// Queue a transport failure for a future `receive_events` call
    pub fn add_receive_failure(&self, error: TransportError) {
        self.state.lock().unwrap().incoming.push_back(Err(error));
    }

    /// Register downloadable bytes for an attachment reference
    pub fn add_attachment(&self, attachment: AttachmentRef, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .attachments
            .insert(attachment, bytes);
    }

    /// Make the next invite creation fail with `error`
    pub fn fail_next_invite(&self, error: TransportError) {
        self.state.lock().unwrap().invite_failures.push_back(error);
    }

    /// Delay every invite creation, to widen race windows in tests
    pub fn set_invite_delay(&self, delay: Duration) {
        self.state.lock().unwrap().invite_delay = Some(delay);
    }

    /// Make every send to `chat` fail with a network error
    pub fn fail_sends_to(&self, chat: ChatId) {
        self.state.lock().unwrap().failing_chats.push(chat);
    }

    /// Get sent messages for assertions
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent_messages.clone()
    }

    /// Get the texts sent to a specific chat
    pub fn sent_to(&self, chat: &ChatId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .filter(|msg| msg.chat == *chat)
            .map(|msg| msg.content.clone())
            .collect()
    }

    /// Last text sent to a chat
    pub fn last_sent_to(&self, chat: &ChatId) -> Option<String> {
        self.sent_to(chat).pop()
    }

    /// Credentials issued so far
    pub fn issued_invites(&self) -> Vec<Credential> {
        self.state.lock().unwrap().invites.clone()
    }

    /// Clear all state
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        *state = MockState::default();
    }
}

#[async_trait]
impl MessagingClient for MockMessagingClient {
    async fn receive_events(&self) -> TransportResult<Vec<InboundEvent>> {
        let next = self.state.lock().unwrap().incoming.pop_front();
        match next {
            Some(batch) => batch,
            None => {
                // Stand-in for a long poll that timed out with no updates
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_text(&self, chat: &ChatId, text: &str) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_chats.contains(chat) {
            return Err(TransportError::Network(format!("send to {} failed", chat)));
        }
        state.sent_messages.push(SentMessage {
            chat: *chat,
            content: text.to_string(),
        });
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> TransportResult<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .attachments
            .get(attachment)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                code: 400,
                description: format!("Bad Request: file {} not found", attachment.0),
            })
    }

    async fn create_single_use_invite(&self, group: &GroupId) -> TransportResult<Credential> {
        let delay = self.state.lock().unwrap().invite_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.invite_failures.pop_front() {
            return Err(error);
        }

        let credential = Credential {
            invite_link: format!("https://t.me/+invite-{}-{}", group, state.invites.len()),
        };
        state.invites.push(credential.clone());
        Ok(credential)
    }
}
