//! Rostergate - Roster-Verified Telegram Gatekeeper
//!
//! A Telegram bot that admits people into a restricted group only after they
//! prove who they are against a known roster, then hands out a single-use
//! invite link.
//!
//! Key principles:
//! - Each roster entry yields at most one invite link
//! - The roster file is the only persistent state
//! - Transport failures restart the connection, never the process

pub mod attachments;
pub mod logging;
pub mod roster;
pub mod telegram;
