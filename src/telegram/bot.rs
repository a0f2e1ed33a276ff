//! Rostergate Telegram Bot
//!
//! One transport session: receives batches of updates, routes every event by
//! user id to the session state machine, and installs the error hook that
//! keeps a failure in one session from reaching other sessions or the loop.
//!
//! Events from different users in one batch are handled concurrently; events
//! from the same user are handled in arrival order.

use super::session::{GateError, SessionRegistry, SessionStateMachine, MSG_GENERIC_FAILURE};
use super::traits::*;
use crate::attachments::AttachmentSink;
use crate::roster::RosterStore;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Gatekeeper bot bound to one transport connection
pub struct GatekeeperBot<C: MessagingClient> {
    client: C,
    machine: SessionStateMachine<C>,
    sessions: Arc<SessionRegistry>,
}

impl<C: MessagingClient> GatekeeperBot<C> {
    /// `roster` and `sessions` outlive the bot and are handed to the next
    /// one when the transport is rebuilt.
    pub fn new(
        client: C,
        roster: Arc<RosterStore>,
        attachments: AttachmentSink,
        sessions: Arc<SessionRegistry>,
        group: GroupId,
    ) -> Self {
        let machine = SessionStateMachine::new(client.clone(), roster, attachments, group);
        Self {
            client,
            machine,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Run bot event loop
    ///
    /// Only returns on a transport failure, which the supervisor answers by
    /// building a new transport session.
    pub async fn run(&self) -> TransportResult<()> {
        loop {
            let events = self.client.receive_events().await?;
            if !events.is_empty() {
                debug!("Received {} events", events.len());
                self.handle_batch(events).await;
            }
        }
    }

    /// Handle one batch of updates.
    pub async fn handle_batch(&self, events: Vec<InboundEvent>) {
        let mut order: Vec<UserId> = Vec::new();
        let mut by_user: HashMap<UserId, Vec<InboundEvent>> = HashMap::new();
        for event in events {
            let user = event.sender;
            by_user
                .entry(user)
                .or_insert_with(|| {
                    order.push(user);
                    Vec::new()
                })
                .push(event);
        }

        let per_user = order.into_iter().filter_map(|user| by_user.remove(&user)).map(
            |events| async move {
                for event in events {
                    self.dispatch(event).await;
                }
            },
        );
        join_all(per_user).await;
    }

    /// Handle one event; errors go to the error hook, never to the caller.
    pub async fn dispatch(&self, event: InboundEvent) {
        let mut session = self.sessions.checkout(event.sender, event.chat);
        let result = self.machine.handle(&mut session, &event).await;
        self.sessions.store(session);

        if let Err(e) = result {
            self.on_error(&event, e).await;
        }
    }

    /// Log the failure and tell the user something went wrong.
    async fn on_error(&self, event: &InboundEvent, err: GateError) {
        error!(
            "Exception while handling an update from user {}: {}",
            event.sender, err
        );
        if let Err(e) = self.client.send_text(&event.chat, MSG_GENERIC_FAILURE).await {
            error!("Could not send error message to user {}: {}", event.sender, e);
        }
    }
}
