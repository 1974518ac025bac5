//! # Chama Economics - Deposits & Late Penalties
//!
//! Money rules that sit underneath the round engine.
//!
//! ## Key Features
//!
//! - **Security deposits**: refundable stake posted on join, returned at completion
//! - **Late window**: contributions accepted after the deadline, flagged late
//! - **Late penalties**: basis-point charge on missed rounds, taken from the deposit
//! - **Penalty book**: per-member history used to spot repeat offenders
//!
//! ## Defaults
//!
//! | Setting | Value |
//! |---------|-------|
//! | Members per group | 2 - 50 |
//! | Start grace period | 1 day |
//! | Late window | 1 day |
//! | Late penalty | 10% (1,000 bps) |
//! | Dispute voting window | 3 days |

pub mod deposit;
pub mod penalty;

// Re-exports
pub use deposit::{required_deposit, DepositAccount, DepositError, DepositStatus};
pub use penalty::{LatePolicy, PenaltyBook, PenaltyRecord};

/// Engine-wide defaults
pub mod constants {
    use chama_core::amount::BasisPoints;
    use chama_core::types::Seconds;

    /// Seconds in a day
    pub const SECONDS_PER_DAY: Seconds = 24 * 3600;

    /// Smallest allowed member target
    pub const MIN_MEMBERS: u32 = 2;

    /// Largest allowed member target
    pub const MAX_MEMBERS: u32 = 50;

    /// Countdown between filling up and auto-starting
    pub const DEFAULT_START_GRACE_SECS: Seconds = SECONDS_PER_DAY;

    /// Contributions still accepted this long after a deadline
    pub const DEFAULT_LATE_WINDOW_SECS: Seconds = SECONDS_PER_DAY;

    /// Missed-round penalty: 10%
    pub const DEFAULT_LATE_PENALTY_BPS: BasisPoints = 1_000;

    /// Missed rounds before a member is flagged as a repeat offender
    pub const REPEAT_OFFENDER_THRESHOLD: u32 = 3;
}

pub use constants::*;
