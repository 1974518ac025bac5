//! # Disputes
//!
//! Any active member can raise a dispute against their group. Active members
//! then vote for a fixed window. The dispute resolves lazily: the first call
//! that observes it after the window closes tallies the ballots.
//!
//! ```text
//!   raise ──► Active ──(now >= voting_ends_at)──► Resolved { Upheld | Rejected | Tied }
//!               │
//!               └── cast_vote (one per member, while now < voting_ends_at)
//! ```
//!
//! Membership checks live in the engine, which holds the group lock before
//! touching a dispute (lock order: group, then dispute).

use chama_core::error::{ChamaError, Result};
use chama_core::types::{AccountId, DisputeId, DisputeOutcome, GroupId, Seconds, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dispute configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeConfig {
    /// How long voting stays open after a dispute is raised
    #[serde(default = "default_voting_window")]
    pub voting_window_secs: Seconds,
}

/// Voting window used when none is configured: 3 days
pub const DEFAULT_VOTING_WINDOW_SECS: Seconds = 3 * 24 * 3600;

fn default_voting_window() -> Seconds {
    DEFAULT_VOTING_WINDOW_SECS
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            voting_window_secs: default_voting_window(),
        }
    }
}

/// Dispute status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Voting open or awaiting tally
    Active,
    /// Tallied, outcome recorded
    Resolved,
}

/// A single member's vote
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter: AccountId,
    pub support: bool,
    pub comment: Option<String>,
    pub timestamp: Timestamp,
}

/// Incident report raised by a group member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Dispute ID
    pub id: DisputeId,

    /// Group the dispute is about
    pub group_id: GroupId,

    /// Member who raised it
    pub reported_by: AccountId,

    /// Free-form description
    pub description: String,

    /// Opaque evidence reference (content hash, URL)
    pub evidence: Option<String>,

    /// Raised at
    pub opened_at: Timestamp,

    /// Ballots are refused from this instant on
    pub voting_ends_at: Timestamp,

    /// Votes in support
    pub votes_support: u32,

    /// Votes against
    pub votes_dispute: u32,

    /// Ballots in the order they were cast
    pub ballots: Vec<Ballot>,

    /// Current status
    pub status: DisputeStatus,

    /// Set once resolved
    pub outcome: Option<DisputeOutcome>,

    /// When the tally ran
    pub resolved_at: Option<Timestamp>,
}

impl Dispute {
    /// Ballots are accepted right now
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.status == DisputeStatus::Active && now < self.voting_ends_at
    }

    /// Voting has ended but the tally has not run yet
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == DisputeStatus::Active && now >= self.voting_ends_at
    }

    pub fn has_voted(&self, voter: &AccountId) -> bool {
        self.ballots.iter().any(|b| b.voter == *voter)
    }

    /// Record a ballot. Eligibility is checked by the caller.
    pub fn cast_vote(
        &mut self,
        voter: AccountId,
        support: bool,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<()> {
        if !self.is_open(now) {
            return Err(ChamaError::VotingClosed(self.id));
        }
        if self.has_voted(&voter) {
            return Err(ChamaError::AlreadyVoted(voter));
        }

        if support {
            self.votes_support = self.votes_support.saturating_add(1);
        } else {
            self.votes_dispute = self.votes_dispute.saturating_add(1);
        }
        self.ballots.push(Ballot {
            voter,
            support,
            comment,
            timestamp: now,
        });
        Ok(())
    }

    /// Outcome implied by the current tallies
    pub fn tally(&self) -> DisputeOutcome {
        use std::cmp::Ordering;
        match self.votes_support.cmp(&self.votes_dispute) {
            Ordering::Greater => DisputeOutcome::Upheld,
            Ordering::Less => DisputeOutcome::Rejected,
            Ordering::Equal => DisputeOutcome::Tied,
        }
    }

    /// Resolve when the window has closed. Returns the outcome only on the
    /// call that performed the resolution.
    pub fn settle_if_due(&mut self, now: Timestamp) -> Option<DisputeOutcome> {
        if !self.is_due(now) {
            return None;
        }
        let outcome = self.tally();
        self.status = DisputeStatus::Resolved;
        self.outcome = Some(outcome);
        self.resolved_at = Some(now);

        tracing::info!(
            "{} resolved as {:?} ({} support / {} dispute)",
            self.id,
            outcome,
            self.votes_support,
            self.votes_dispute
        );
        Some(outcome)
    }
}

/// Arena of disputes with a monotonic id allocator
pub struct DisputeRegistry {
    /// Configuration
    config: DisputeConfig,

    /// Disputes indexed by `id - 1`
    disputes: RwLock<Vec<Arc<Mutex<Dispute>>>>,
}

impl DisputeRegistry {
    /// Create registry with default config
    pub fn new() -> Self {
        Self::with_config(DisputeConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: DisputeConfig) -> Self {
        Self {
            config,
            disputes: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &DisputeConfig {
        &self.config
    }

    /// Open a dispute and return a snapshot of it
    pub fn open(
        &self,
        group_id: GroupId,
        reported_by: AccountId,
        description: String,
        evidence: Option<String>,
        now: Timestamp,
    ) -> Dispute {
        let mut disputes = self.disputes.write();
        let id = DisputeId(disputes.len() as u64 + 1);

        let dispute = Dispute {
            id,
            group_id,
            reported_by,
            description,
            evidence,
            opened_at: now,
            voting_ends_at: now
                .saturating_add(i64::try_from(self.config.voting_window_secs).unwrap_or(i64::MAX)),
            votes_support: 0,
            votes_dispute: 0,
            ballots: Vec::new(),
            status: DisputeStatus::Active,
            outcome: None,
            resolved_at: None,
        };
        disputes.push(Arc::new(Mutex::new(dispute.clone())));

        tracing::info!("{} raised against {} by {}", id, group_id, reported_by);
        dispute
    }

    /// Handle to a dispute. The arena lock is released before returning.
    pub fn get(&self, id: DisputeId) -> Result<Arc<Mutex<Dispute>>> {
        let index = id
            .0
            .checked_sub(1)
            .ok_or(ChamaError::DisputeNotFound(id))? as usize;
        self.disputes
            .read()
            .get(index)
            .cloned()
            .ok_or(ChamaError::DisputeNotFound(id))
    }

    /// Ids of every dispute raised against a group
    pub fn for_group(&self, group_id: GroupId) -> Vec<DisputeId> {
        self.disputes
            .read()
            .iter()
            .map(|d| d.lock())
            .filter(|d| d.group_id == group_id)
            .map(|d| d.id)
            .collect()
    }

    /// Number of disputes ever raised
    pub fn count(&self) -> usize {
        self.disputes.read().len()
    }
}

impl Default for DisputeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
