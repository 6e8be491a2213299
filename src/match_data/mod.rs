//! Recorded match data
//!
//! The match record is produced by an external demo parser and is read-only
//! to every pipeline stage.

mod loader;
mod types;

pub use loader::{load_match, match_from_value, parse_match};
pub use types::{MatchHeader, MatchRecord, PlayerInfo, RoundInfo, Side, TickRange, TickSample};
