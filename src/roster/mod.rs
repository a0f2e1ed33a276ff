//! Roster Module
//!
//! The roster is the authoritative list of people allowed into the group,
//! stored as a CSV file with one row per person and a `joined` flag that is
//! consumed exactly once.

pub mod entry;
pub mod store;

#[cfg(test)]
mod proptests;

pub use entry::{normalize, NameKey, RosterEntry};
pub use store::{ClaimOutcome, Roster, RosterClaim, RosterError, RosterStore};
