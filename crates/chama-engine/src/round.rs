//! # Round Engine
//!
//! Rounds open back to back while a group is Active. Each closes in one of
//! two ways and pays its pot (plus any late penalties) to exactly one member.
//!
//! ```text
//!   opened ──── deadline ──── late_window_ends_at
//!     │ on time    │    late      │
//!     │                           └─ WindowExpired: penalize non-contributors, pay out
//!     └─ AllContributed: last member still owed a payout paid in, pay out immediately
//! ```
//!
//! Deadlines are never scheduled. [`settle_due_rounds`] runs at the start and
//! end of every operation and replays whatever has fallen due, in order,
//! until nothing is left to resolve.

use crate::group::{GroupRecord, Outflow};
use crate::transition::Transition;
use chama_core::amount::{checked_add, Amount};
use chama_core::error::{ChamaError, Result};
use chama_core::event::ChamaEvent;
use chama_core::types::{AccountId, GroupId, PayoutOrder, Seconds, Timestamp};
use chama_economics::penalty::{LatePolicy, PenaltyRecord};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A single member's payment into a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub amount: Amount,
    pub timestamp: Timestamp,
    /// Made after the deadline, inside the late window
    pub late: bool,
}

/// How a round closed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Every member still owed a payout contributed
    AllContributed,
    /// The late window closed with contributions missing
    WindowExpired,
}

/// A round that is due, as decided by [`resolve_if_due`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub kind: ResolutionKind,
    /// Effective resolution time
    pub at: Timestamp,
    /// Active members who never contributed
    pub missed: Vec<AccountId>,
}

/// One contribution cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based round number
    pub round_number: u32,

    /// When the round opened
    pub opened_at: Timestamp,

    /// On-time cutoff
    pub deadline: Timestamp,

    /// Contributions are refused from this instant on
    pub late_window_ends_at: Timestamp,

    /// Set once, on resolution
    pub winner: Option<AccountId>,

    /// Contributions in arrival order
    pub contributions: IndexMap<AccountId, Contribution>,

    /// Sum of contributions
    pub total_pot: Amount,

    /// Late penalties collected for this round
    pub penalty_pool: Amount,

    pub is_completed: bool,

    pub resolution: Option<ResolutionKind>,

    pub completed_at: Option<Timestamp>,
}

impl Round {
    pub fn open(
        round_number: u32,
        opened_at: Timestamp,
        deadline: Timestamp,
        policy: &LatePolicy,
    ) -> Self {
        Self {
            round_number,
            opened_at,
            deadline,
            late_window_ends_at: policy.window_closes_at(deadline),
            winner: None,
            contributions: IndexMap::new(),
            total_pot: 0,
            penalty_pool: 0,
            is_completed: false,
            resolution: None,
            completed_at: None,
        }
    }

    pub fn has_contributed(&self, member: &AccountId) -> bool {
        self.contributions.contains_key(member)
    }

    /// Record a contribution and grow the pot
    pub fn record(
        &mut self,
        member: AccountId,
        amount: Amount,
        timestamp: Timestamp,
        late: bool,
    ) -> Result<()> {
        if self.has_contributed(&member) {
            return Err(ChamaError::AlreadyContributedThisRound {
                round: self.round_number,
            });
        }
        self.total_pot = checked_add(self.total_pot, amount)?;
        self.contributions.insert(
            member,
            Contribution {
                amount,
                timestamp,
                late,
            },
        );
        Ok(())
    }

    /// What the winner receives
    pub fn payout(&self) -> Result<Amount> {
        checked_add(self.total_pot, self.penalty_pool)
    }

    /// Funds this round still holds in escrow
    pub fn escrowed(&self) -> Result<Amount> {
        if self.is_completed {
            Ok(0)
        } else {
            self.payout()
        }
    }

    pub fn info(&self) -> RoundInfo {
        RoundInfo {
            round_number: self.round_number,
            winner: self.winner,
            deadline: self.deadline,
            late_window_ends_at: self.late_window_ends_at,
            total_pot: self.total_pot,
            penalty_pool: self.penalty_pool,
            contributors: self.contributions.len() as u32,
            is_completed: self.is_completed,
        }
    }
}

/// Read model for a round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub round_number: u32,
    pub winner: Option<AccountId>,
    pub deadline: Timestamp,
    pub late_window_ends_at: Timestamp,
    pub total_pot: Amount,
    pub penalty_pool: Amount,
    pub contributors: u32,
    pub is_completed: bool,
}

/// Decide whether a round must close now.
///
/// A round is due when every eligible member (active, not yet paid out) has
/// contributed, vacuously so when none is left, or when its late window has
/// closed. Past winners who skip a round that closes early are not charged;
/// at window expiry every active non-contributor is.
pub fn resolve_if_due(
    now: Timestamp,
    round: &Round,
    active_members: &[AccountId],
    eligible_members: &[AccountId],
) -> Option<Resolution> {
    if round.is_completed {
        return None;
    }

    if eligible_members.iter().all(|m| round.has_contributed(m)) {
        return Some(Resolution {
            kind: ResolutionKind::AllContributed,
            at: now,
            missed: Vec::new(),
        });
    }

    let missed: Vec<AccountId> = active_members
        .iter()
        .filter(|m| !round.has_contributed(m))
        .copied()
        .collect();

    if now >= round.late_window_ends_at {
        return Some(Resolution {
            kind: ResolutionKind::WindowExpired,
            at: round.late_window_ends_at,
            missed,
        });
    }

    None
}

/// Pick the round's recipient from candidates given in join order
pub fn select_winner(
    group_id: GroupId,
    round_number: u32,
    candidates: &[AccountId],
    order: PayoutOrder,
) -> Option<AccountId> {
    if candidates.is_empty() {
        return None;
    }
    match order {
        PayoutOrder::JoinOrder => candidates.first().copied(),
        PayoutOrder::SeededDraw { seed } => {
            let mut hasher = blake3::Hasher::new();
            hasher.update(b"chama-draw");
            hasher.update(&group_id.0.to_le_bytes());
            hasher.update(&round_number.to_le_bytes());
            hasher.update(&seed.to_le_bytes());
            let hash = hasher.finalize();

            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&hash.as_bytes()[..8]);
            let index = u64::from_le_bytes(bytes) % candidates.len() as u64;
            candidates.get(index as usize).copied()
        }
    }
}

/// Deadline of round `round_number`: `started_at + n * duration`, pushed
/// back to a full duration after `opened_at` when that instant has passed.
pub fn next_deadline(
    started_at: Timestamp,
    round_number: u32,
    round_duration: Seconds,
    opened_at: Timestamp,
) -> Timestamp {
    let duration = i64::try_from(round_duration).unwrap_or(i64::MAX);
    let scheduled = started_at.saturating_add(i64::from(round_number).saturating_mul(duration));
    if scheduled > opened_at {
        scheduled
    } else {
        opened_at.saturating_add(duration)
    }
}

/// Apply every auto-start and round resolution that is due at `now`.
/// Returns whether anything changed.
pub fn settle_due_rounds(
    record: &mut GroupRecord,
    now: Timestamp,
    tx: &mut Transition,
) -> Result<bool> {
    let mut progressed = false;
    loop {
        if let Some(at) = record.auto_start_due(now) {
            info!("{} grace period elapsed, starting", record.group.id);
            record.start(at, tx)?;
            progressed = true;
            continue;
        }

        let active = record.roster.active_ids();
        let eligible = record.roster.eligible_ids();
        let due = record
            .open_round()
            .and_then(|round| resolve_if_due(now, round, &active, &eligible));
        match due {
            Some(resolution) => {
                apply_resolution(record, resolution, tx)?;
                progressed = true;
            }
            None => break,
        }
    }
    Ok(progressed)
}

fn apply_resolution(
    record: &mut GroupRecord,
    resolution: Resolution,
    tx: &mut Transition,
) -> Result<()> {
    let group_id = record.group.id;
    let index = record.rounds.len().checked_sub(1).ok_or_else(|| {
        ChamaError::AccountingInvariantViolation(format!("{} has no round to resolve", group_id))
    })?;
    let round_number = record.rounds[index].round_number;

    if resolution.kind == ResolutionKind::WindowExpired {
        assess_penalties(record, index, &resolution, tx)?;
    }

    let eligible = record.roster.eligible_ids();
    let round = &record.rounds[index];
    let contributed: Vec<AccountId> = eligible
        .iter()
        .filter(|m| round.has_contributed(m))
        .copied()
        .collect();
    let candidates = if contributed.is_empty() {
        eligible
    } else {
        contributed
    };
    let winner = select_winner(
        group_id,
        round_number,
        &candidates,
        record.group.payout_order,
    );
    let payout = round.payout()?;
    let (total_pot, penalty_pool) = (round.total_pot, round.penalty_pool);

    // Without a recipient the pot goes back to whoever put money in
    let returns: Vec<(AccountId, Amount)> = if winner.is_none() {
        round
            .contributions
            .iter()
            .map(|(member, c)| (*member, c.amount))
            .chain(
                record
                    .penalties
                    .records()
                    .iter()
                    .filter(|p| p.round == round_number && p.collected > 0)
                    .map(|p| (p.member, p.collected)),
            )
            .collect()
    } else {
        Vec::new()
    };

    {
        let round = &mut record.rounds[index];
        round.winner = winner;
        round.is_completed = true;
        round.resolution = Some(resolution.kind);
        round.completed_at = Some(resolution.at);
    }

    tx.emit(ChamaEvent::RoundCompleted {
        group_id,
        round: round_number,
        winner,
        total_pot,
        penalty_pool,
        auto_completed: resolution.kind == ResolutionKind::AllContributed,
    });

    match winner {
        Some(recipient) => {
            if let Some(member) = record.roster.get_mut(&recipient) {
                member.has_received_payout = true;
                member.payout_round = Some(round_number);
            }
            record.disburse(tx, recipient, payout, Outflow::Payout)?;
            tx.emit(ChamaEvent::PayoutDistributed {
                group_id,
                round: round_number,
                recipient,
                amount: payout,
            });
            info!(
                "{} round {} paid {} to {}",
                group_id, round_number, payout, recipient
            );
        }
        None => {
            warn!(
                "{} round {} has no eligible recipient, returning {}",
                group_id, round_number, payout
            );
            for (member, amount) in returns {
                record.disburse(tx, member, amount, Outflow::Refund)?;
                tx.emit(ChamaEvent::ContributionReturned {
                    group_id,
                    round: round_number,
                    member,
                    amount,
                });
            }
        }
    }

    if round_number >= record.group.member_target || record.roster.eligible_ids().is_empty() {
        record.complete(resolution.at, tx)
    } else {
        record.open_next_round(round_number + 1, resolution.at);
        Ok(())
    }
}

fn assess_penalties(
    record: &mut GroupRecord,
    index: usize,
    resolution: &Resolution,
    tx: &mut Transition,
) -> Result<()> {
    let group_id = record.group.id;
    let round_number = record.rounds[index].round_number;
    let assessed = record
        .group
        .late_policy
        .penalty_for(record.group.contribution_amount)?;

    for member in &resolution.missed {
        let collected = match record.roster.get_mut(member) {
            Some(membership) => membership.deposit.debit_penalty(assessed),
            None => 0,
        };
        let round = &mut record.rounds[index];
        round.penalty_pool = checked_add(round.penalty_pool, collected)?;

        record.penalties.record(PenaltyRecord {
            member: *member,
            round: round_number,
            assessed,
            collected,
            timestamp: resolution.at,
        });
        warn!(
            "{} missed round {} of {}, penalty {} (collected {})",
            member, round_number, group_id, assessed, collected
        );
        tx.emit(ChamaEvent::LatePenaltyAssessed {
            group_id,
            member: *member,
            round: round_number,
            amount: collected,
        });
    }
    Ok(())
}
