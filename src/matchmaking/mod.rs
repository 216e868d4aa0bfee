//! Matchmaking: pairs two seekers into a room

pub mod queue;
pub mod service;

pub use service::{MatchOutcome, MatchmakingService};
