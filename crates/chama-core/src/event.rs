//! Engine events and the sinks that receive them
//!
//! Events are published only after a transition commits. Delivery is
//! fire-and-forget: a sink cannot fail or roll back an operation.

use crate::amount::Amount;
use crate::types::{
    AccountId, DisputeId, DisputeOutcome, GroupId, GroupPhase, LeaveReason, Timestamp,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Discrete, observable state change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChamaEvent {
    Created {
        group_id: GroupId,
        creator: AccountId,
        contribution_amount: Amount,
        security_deposit: Amount,
        member_target: u32,
    },
    Joined {
        group_id: GroupId,
        member: AccountId,
        deposit: Amount,
        member_count: u32,
    },
    Leave {
        group_id: GroupId,
        member: AccountId,
        reason: LeaveReason,
        refunded: Amount,
    },
    GroupStatusChanged {
        group_id: GroupId,
        is_active: bool,
    },
    PhaseChanged {
        group_id: GroupId,
        from: GroupPhase,
        to: GroupPhase,
    },
    GroupStarted {
        group_id: GroupId,
        started_at: Timestamp,
        first_deadline: Timestamp,
    },
    ContributionMade {
        group_id: GroupId,
        member: AccountId,
        round: u32,
        amount: Amount,
        late: bool,
    },
    LatePenaltyAssessed {
        group_id: GroupId,
        member: AccountId,
        round: u32,
        amount: Amount,
    },
    RoundCompleted {
        group_id: GroupId,
        round: u32,
        winner: Option<AccountId>,
        total_pot: Amount,
        penalty_pool: Amount,
        auto_completed: bool,
    },
    PayoutDistributed {
        group_id: GroupId,
        round: u32,
        recipient: AccountId,
        amount: Amount,
    },
    ContributionReturned {
        group_id: GroupId,
        round: u32,
        member: AccountId,
        amount: Amount,
    },
    DepositRefunded {
        group_id: GroupId,
        member: AccountId,
        amount: Amount,
    },
    GroupCompleted {
        group_id: GroupId,
        rounds_paid: u32,
    },
    GroupCancelled {
        group_id: GroupId,
    },
    CreatorTransferred {
        group_id: GroupId,
        from: AccountId,
        to: AccountId,
    },
    DisputeRaised {
        dispute_id: DisputeId,
        group_id: GroupId,
        reported_by: AccountId,
        voting_ends_at: Timestamp,
    },
    VoteCast {
        dispute_id: DisputeId,
        voter: AccountId,
        support: bool,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        group_id: GroupId,
        votes_support: u32,
        votes_dispute: u32,
        outcome: DisputeOutcome,
    },
}

impl ChamaEvent {
    /// Short name used in logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Joined { .. } => "joined",
            Self::Leave { .. } => "leave",
            Self::GroupStatusChanged { .. } => "group_status_changed",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::GroupStarted { .. } => "group_started",
            Self::ContributionMade { .. } => "contribution_made",
            Self::LatePenaltyAssessed { .. } => "late_penalty_assessed",
            Self::RoundCompleted { .. } => "round_completed",
            Self::PayoutDistributed { .. } => "payout_distributed",
            Self::ContributionReturned { .. } => "contribution_returned",
            Self::DepositRefunded { .. } => "deposit_refunded",
            Self::GroupCompleted { .. } => "group_completed",
            Self::GroupCancelled { .. } => "group_cancelled",
            Self::CreatorTransferred { .. } => "creator_transferred",
            Self::DisputeRaised { .. } => "dispute_raised",
            Self::VoteCast { .. } => "vote_cast",
            Self::DisputeResolved { .. } => "dispute_resolved",
        }
    }
}

/// Receiver of committed events (UI, indexers, notification fan-out)
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &ChamaEvent);
}

/// Discards every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: &ChamaEvent) {}
}

/// Keeps every event in memory, in publication order
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<ChamaEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything published so far
    pub fn events(&self) -> Vec<ChamaEvent> {
        self.events.lock().clone()
    }

    /// Take everything published so far, leaving the sink empty
    pub fn drain(&self) -> Vec<ChamaEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, event: &ChamaEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Logs each event at debug level
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &ChamaEvent) {
        tracing::debug!(event = event.name(), ?event, "chama event");
    }
}
