//! Verification Session Management
//!
//! Each user walks through: photo of their card -> name -> invite link.
//! Session state is in-memory only, keyed by user id, and independent per
//! user. The roster is the only state shared between sessions.

use super::commands::Command;
use super::invite::{InviteIssuer, IssuanceError};
use super::traits::*;
use crate::attachments::{AttachmentError, AttachmentSink};
use crate::roster::{ClaimOutcome, NameKey, RosterError, RosterStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Where a user is in the verification flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a photo of the user's card
    AwaitingPhoto,

    /// Photo stored, waiting for "<first name> <last name>"
    AwaitingName,

    /// Flow finished (success, refusal, failure or cancel). Only /start leaves it.
    Terminal,
}

/// Per-user conversation progress
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: UserId,
    /// Chat of the most recent event; replies go here
    pub chat: ChatId,
    pub state: SessionState,
    pub attachment_path: Option<PathBuf>,
}

impl Session {
    pub fn new(user: UserId, chat: ChatId) -> Self {
        Self {
            user,
            chat,
            state: SessionState::AwaitingPhoto,
            attachment_path: None,
        }
    }

    fn restart(&mut self) {
        self.state = SessionState::AwaitingPhoto;
        self.attachment_path = None;
    }
}

/// In-memory session registry
///
/// Sessions live for the lifetime of the process. Their number is bounded
/// by the number of distinct users who ever wrote to the bot.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session for `user`, or a fresh one for an unseen user.
    pub fn checkout(&self, user: UserId, chat: ChatId) -> Session {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned()
            .unwrap_or_else(|| Session::new(user, chat))
    }

    /// Save a session after handling an event.
    pub fn store(&self, session: Session) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.user, session);
    }

    pub fn get(&self, user: &UserId) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
    }

    /// Get count of known sessions
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors escaping an event handler
///
/// User-facing failures (bad input, image not saved, name not found, invite
/// not created) are answered inline and do not surface here. What does
/// surface is handed to the bot's error hook.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// Transition logic for one session at a time
pub struct SessionStateMachine<C: MessagingClient> {
    client: C,
    roster: Arc<RosterStore>,
    attachments: AttachmentSink,
    issuer: InviteIssuer<C>,
}

impl<C: MessagingClient> SessionStateMachine<C> {
    pub fn new(
        client: C,
        roster: Arc<RosterStore>,
        attachments: AttachmentSink,
        group: GroupId,
    ) -> Self {
        let issuer = InviteIssuer::new(client.clone(), group);
        Self {
            client,
            roster,
            attachments,
            issuer,
        }
    }

    pub fn roster(&self) -> &Arc<RosterStore> {
        &self.roster
    }

    /// Apply one inbound event to `session`.
    pub async fn handle(&self, session: &mut Session, event: &InboundEvent) -> Result<(), GateError> {
        session.chat = event.chat;

        if let EventKind::Command { name, .. } = &event.kind {
            match Command::parse(name) {
                Command::Start => {
                    session.restart();
                    return self.reply(session, MSG_WELCOME).await;
                }
                Command::Cancel => {
                    session.state = SessionState::Terminal;
                    return self.reply(session, MSG_CANCELLED).await;
                }
                Command::Help => return self.reply(session, &msg_help()).await,
                Command::Unknown(_) => {}
            }
        }

        match session.state {
            SessionState::AwaitingPhoto => self.on_awaiting_photo(session, &event.kind).await,
            SessionState::AwaitingName => self.on_awaiting_name(session, &event.kind).await,
            SessionState::Terminal => self.reply(session, MSG_RESTART_HINT).await,
        }
    }

    async fn on_awaiting_photo(&self, session: &mut Session, kind: &EventKind) -> Result<(), GateError> {
        let EventKind::Photo(attachment) = kind else {
            return self.reply(session, MSG_SEND_PHOTO).await;
        };

        match self.save_photo(session.user, attachment).await {
            Ok(path) => {
                session.attachment_path = Some(path);
                session.state = SessionState::AwaitingName;
                self.reply(session, MSG_PHOTO_RECEIVED).await
            }
            Err(e) => {
                warn!("Could not save photo for user {}: {}", session.user, e);
                self.reply(session, MSG_PHOTO_SAVE_FAILED).await
            }
        }
    }

    async fn save_photo(&self, user: UserId, attachment: &AttachmentRef) -> Result<PathBuf, GateError> {
        let bytes = self.client.download_attachment(attachment).await?;
        Ok(self.attachments.store(&user, &bytes).await?)
    }

    async fn on_awaiting_name(&self, session: &mut Session, kind: &EventKind) -> Result<(), GateError> {
        let EventKind::Text(text) = kind else {
            return self.reply(session, MSG_NAME_AS_TEXT).await;
        };

        info!("User {} trying to verify: {}", session.user, text.trim());

        match NameKey::parse(text) {
            Some(key) => self.verify(session, &key).await,
            None => self.reply(session, MSG_NAME_FORMAT).await,
        }
    }

    /// Claim the roster entry, issue outside the roster lock, then commit.
    async fn verify(&self, session: &mut Session, key: &NameKey) -> Result<(), GateError> {
        let claim = match self.roster.claim(key) {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::NotFound => return self.reply(session, MSG_NOT_FOUND).await,
            ClaimOutcome::AlreadyJoined(entry) => {
                info!("User {} matched '{}' who already joined", session.user, entry.display_name());
                session.state = SessionState::Terminal;
                return self.reply(session, MSG_ALREADY_JOINED).await;
            }
            ClaimOutcome::InProgress(entry) => {
                warn!(
                    "User {} matched '{}' while another verification is in flight",
                    session.user,
                    entry.display_name()
                );
                session.state = SessionState::Terminal;
                return self.reply(session, MSG_IN_PROGRESS).await;
            }
        };

        let credential = match self.issuer.issue().await {
            Ok(credential) => credential,
            Err(e) => {
                // Claim dropped here: the entry stays unjoined for a later /start
                drop(claim);
                error!("Invite for user {} not issued: {}", session.user, e);
                session.state = SessionState::Terminal;
                return self.reply(session, MSG_INVITE_FAILED).await;
            }
        };

        session.state = SessionState::Terminal;
        match claim.commit() {
            Ok(entry) => {
                info!(
                    "User {} successfully verified as {}",
                    session.user,
                    entry.display_name()
                );
                self.reply(session, &msg_invite(&entry.display_name(), &credential.invite_link))
                    .await
            }
            Err(e) => {
                error!(
                    "Roster rejected join for user {} after issuing a link: {}",
                    session.user, e
                );
                self.reply(session, MSG_ALREADY_JOINED).await
            }
        }
    }

    async fn reply(&self, session: &Session, text: &str) -> Result<(), GateError> {
        self.client.send_text(&session.chat, text).await?;
        Ok(())
    }
}

// ============================================================================
// Message Templates
// ============================================================================

pub const MSG_WELCOME: &str = "👋 Welcome! Please send me a photo of your student card first.";

pub const MSG_SEND_PHOTO: &str = "📸 Please send a photo of your student card first.";

pub const MSG_PHOTO_RECEIVED: &str = "✅ Student card received! Now please send me your name and family name like this:\nJohn Doe";

pub const MSG_PHOTO_SAVE_FAILED: &str = "❌ Error saving the image. Please try again.";

pub const MSG_NAME_AS_TEXT: &str = "⚠️ Please send your name and family name as text.";

pub const MSG_NAME_FORMAT: &str = "⚠️ Please send both name and family name (e.g., John Doe).";

pub const MSG_NOT_FOUND: &str = "❌ Your name was not found in the list. Please try again with the correct name and family name.";

pub const MSG_ALREADY_JOINED: &str = "⚠️ You have already joined the group.";

pub const MSG_IN_PROGRESS: &str = "⏳ A verification for this name is already in progress.";

pub const MSG_INVITE_FAILED: &str = "❌ Error creating invite link. Please contact administrator.";

pub const MSG_CANCELLED: &str = "Operation cancelled. Send /start to begin again.";

pub const MSG_RESTART_HINT: &str = "Send /start to begin verification.";

pub const MSG_GENERIC_FAILURE: &str = "❌ An error occurred. Please try again or contact support.";

/// Successful verification: personal invite link
pub fn msg_invite(display_name: &str, invite_link: &str) -> String {
    format!(
        "✅ Welcome {}! Here is your personal invite link:\n{}",
        display_name, invite_link
    )
}

/// Help listing built from the command table
pub fn msg_help() -> String {
    let mut msg = String::from("📖 Available commands\n");
    for (syntax, description) in Command::all_commands() {
        msg.push_str(&format!("\n{} - {}", syntax, description));
    }
    msg
}
