//! # Late Penalties
//!
//! Members who have not contributed by the end of a round's late window are
//! charged a percentage of the contribution amount. The charge comes out of
//! their security deposit and is added to the round's penalty pool.
//!
//! ```text
//!  opened ─────────── deadline ──── late window ──── closes
//!     │   on time        │     late (accepted)   │  missed → penalty
//! ```
//!
//! | Setting | Default |
//! |---------|---------|
//! | Late window | 1 day |
//! | Penalty | 10% of contribution |
//! | Repeat offender | 3 missed rounds |

use crate::constants::REPEAT_OFFENDER_THRESHOLD;
use chama_core::amount::{apply_bps, Amount, BasisPoints, BPS_DENOMINATOR};
use chama_core::error::{ChamaError, Result};
use chama_core::types::{AccountId, Seconds, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Late handling parameters for one group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatePolicy {
    /// Grace after the deadline during which contributions are still taken
    pub late_window: Seconds,

    /// Penalty for missing a round, in basis points of the contribution
    pub penalty_bps: BasisPoints,
}

impl LatePolicy {
    /// Create a policy, rejecting penalties above 100%
    pub fn new(late_window: Seconds, penalty_bps: BasisPoints) -> Result<Self> {
        if penalty_bps > BPS_DENOMINATOR {
            return Err(ChamaError::InvalidParameter(format!(
                "late penalty of {} bps exceeds 100%",
                penalty_bps
            )));
        }
        Ok(Self {
            late_window,
            penalty_bps,
        })
    }

    /// When a round with this deadline stops accepting contributions
    pub fn window_closes_at(&self, deadline: Timestamp) -> Timestamp {
        deadline.saturating_add(self.late_window as i64)
    }

    /// A contribution made at `at` misses the deadline
    pub fn is_late(&self, deadline: Timestamp, at: Timestamp) -> bool {
        at > deadline
    }

    /// Penalty owed for missing a round
    pub fn penalty_for(&self, contribution_amount: Amount) -> Result<Amount> {
        apply_bps(contribution_amount, self.penalty_bps)
    }
}

/// One assessed penalty
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyRecord {
    /// Member charged
    pub member: AccountId,

    /// Round the member missed
    pub round: u32,

    /// Penalty owed under the policy
    pub assessed: Amount,

    /// Amount actually taken from the deposit (capped at the balance)
    pub collected: Amount,

    /// When the window closed
    pub timestamp: Timestamp,
}

/// Penalty history for a group
#[derive(Clone, Debug, Default)]
pub struct PenaltyBook {
    records: Vec<PenaltyRecord>,

    /// Missed rounds per member
    missed: HashMap<AccountId, u32>,
}

impl PenaltyBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an assessed penalty
    pub fn record(&mut self, record: PenaltyRecord) {
        let missed = self.missed.entry(record.member).or_insert(0);
        *missed += 1;
        if *missed == REPEAT_OFFENDER_THRESHOLD {
            tracing::warn!(
                "{} has now missed {} rounds (last: round {})",
                record.member,
                missed,
                record.round
            );
        }
        self.records.push(record);
    }

    /// All penalties in assessment order
    pub fn records(&self) -> &[PenaltyRecord] {
        &self.records
    }

    /// Rounds this member has missed
    pub fn missed_rounds(&self, member: &AccountId) -> u32 {
        self.missed.get(member).copied().unwrap_or(0)
    }

    /// Total collected from one member
    pub fn total_for(&self, member: &AccountId) -> Amount {
        self.records
            .iter()
            .filter(|r| r.member == *member)
            .map(|r| r.collected)
            .sum()
    }

    /// Total collected across the group
    pub fn total_collected(&self) -> Amount {
        self.records.iter().map(|r| r.collected).sum()
    }

    /// Member has missed enough rounds to warrant the creator's attention
    pub fn is_repeat_offender(&self, member: &AccountId) -> bool {
        self.missed_rounds(member) >= REPEAT_OFFENDER_THRESHOLD
    }
}
