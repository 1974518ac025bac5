//! Error types for chama engine operations

use crate::amount::Amount;
use crate::types::{AccountId, DisputeId, GroupId, GroupPhase};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ChamaError>;

/// Every way an intent can be rejected
///
/// All errors are local to the attempted operation: nothing is committed when
/// one is returned, so the group is always left in its last consistent state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChamaError {
    // === Construction ===
    /// Malformed or out-of-range creation argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // === Authority ===
    /// Caller lacks the role the operation requires
    #[error("Account {0} is not authorized for this operation")]
    NotAuthorized(AccountId),

    /// Creator-only operation attempted by someone else
    #[error("Only the group creator may do this")]
    NotCreator,

    /// Creator tried to kick themselves
    #[error("The creator cannot kick themselves")]
    CannotKickSelf,

    // === Phase ===
    /// Operation is not valid in the current phase
    #[error("Operation `{operation}` is not valid while the group is {phase}")]
    InvalidPhaseForOperation {
        operation: &'static str,
        phase: GroupPhase,
    },

    // === Membership ===
    /// No group with this id
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    /// Member target already reached
    #[error("Group is full ({target} members)")]
    GroupFull { target: u32 },

    /// Participant already holds a paid membership
    #[error("Account {0} is already a member")]
    AlreadyMember(AccountId),

    /// Participant has no active membership
    #[error("Account {0} is not an active member")]
    NotAMember(AccountId),

    /// Group is past recruiting
    #[error("{0} is not recruiting")]
    GroupNotRecruiting(GroupId),

    /// Group is paused by its creator
    #[error("{0} is paused and not accepting members")]
    GroupNotJoinable(GroupId),

    // === Rounds ===
    /// Contribution attempted outside the active phase
    #[error("{0} is not active")]
    GroupNotActive(GroupId),

    /// Supplied funds differ from what the operation requires
    #[error("Wrong amount: expected {expected}, supplied {supplied}")]
    WrongAmount { expected: Amount, supplied: Amount },

    /// Member already paid into the current round
    #[error("Already contributed to round {round}")]
    AlreadyContributedThisRound { round: u32 },

    /// Round number out of range
    #[error("Round {round} not found in {group}")]
    RoundNotFound { group: GroupId, round: u32 },

    // === Disputes ===
    /// No dispute with this id
    #[error("Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    /// Voting window has ended or the dispute is resolved
    #[error("Voting is closed for {0}")]
    VotingClosed(DisputeId),

    /// Voter already cast a ballot on this dispute
    #[error("Account {0} has already voted")]
    AlreadyVoted(AccountId),

    // === Settlement ===
    /// Transfer in or out of escrow failed; operation aborted
    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    /// Conservation check failed. Indicates a logic defect, never user error.
    #[error("Accounting invariant violated: {0}")]
    AccountingInvariantViolation(String),
}

/// Error codes for API responses
impl ChamaError {
    /// Stable numeric code for the calling layer
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidParameter(_) => 1001,
            Self::NotAuthorized(_) => 1101,
            Self::NotCreator => 1102,
            Self::CannotKickSelf => 1103,
            Self::InvalidPhaseForOperation { .. } => 1201,
            Self::GroupNotFound(_) => 1301,
            Self::GroupFull { .. } => 1302,
            Self::AlreadyMember(_) => 1303,
            Self::NotAMember(_) => 1304,
            Self::GroupNotRecruiting(_) => 1305,
            Self::GroupNotJoinable(_) => 1306,
            Self::GroupNotActive(_) => 1401,
            Self::WrongAmount { .. } => 1402,
            Self::AlreadyContributedThisRound { .. } => 1403,
            Self::RoundNotFound { .. } => 1404,
            Self::DisputeNotFound(_) => 1501,
            Self::VotingClosed(_) => 1502,
            Self::AlreadyVoted(_) => 1503,
            Self::SettlementFailed(_) => 1601,
            Self::AccountingInvariantViolation(_) => 9001,
        }
    }

    /// True when the caller can fix the problem by changing the intent
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::SettlementFailed(_) | Self::AccountingInvariantViolation(_)
        )
    }

    /// Needs operator attention
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AccountingInvariantViolation(_))
    }
}
