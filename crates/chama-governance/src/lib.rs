//! # Chama Governance
//!
//! Member-driven incident handling. A dispute is raised by one member, voted
//! on by the group's active members and tallied once its window closes.
//! What happens after a tally is decided by the engine's remedy policy.

pub mod dispute;

pub use dispute::{
    Ballot, Dispute, DisputeConfig, DisputeRegistry, DisputeStatus, DEFAULT_VOTING_WINDOW_SECS,
};
