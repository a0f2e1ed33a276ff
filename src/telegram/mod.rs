//! Telegram Integration Module
//!
//! Implements the gatekeeper bot on top of a messaging transport:
//! - Per-user verification sessions (photo -> name -> invite)
//! - Single-use invite issuance for the restricted group
//! - Supervised long-polling loop that survives transport failures
//!
//! Sessions are ephemeral (in-memory only); the roster file is the only
//! persistent state.

pub mod bot;
pub mod client;
pub mod commands;
pub mod invite;
pub mod mock;
pub mod session;
pub mod supervisor;
pub mod traits;

pub use bot::GatekeeperBot;
pub use client::TelegramClient;
pub use invite::{InviteIssuer, IssuanceError};
pub use mock::MockMessagingClient;
pub use session::{GateError, Session, SessionRegistry, SessionState, SessionStateMachine};
pub use supervisor::{supervise, BackoffPolicy};
pub use traits::{MessagingClient, TransportError, TransportResult};
