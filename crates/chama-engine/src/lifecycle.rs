//! # Group Lifecycle Controller
//!
//! Pure policy: who may do what, in which phase. Every intent passes through
//! [`authorize`] before the engine touches a draft record.
//!
//! | Operation | Who | Phase |
//! |-----------|-----|-------|
//! | Join | anyone | Recruiting, not paused |
//! | Leave | member, not creator | Recruiting, Waiting |
//! | Kick | creator | Recruiting, Waiting, Active |
//! | SetStatus | creator | non-terminal |
//! | TransferCreator | creator | non-terminal |
//! | Cancel | creator | Recruiting, Waiting |
//! | ForceStart | creator or member | Waiting, not paused |
//! | Contribute | member | Active |
//! | RaiseDispute | member | any but Cancelled |
//! | Vote | member | any but Cancelled |

use crate::group::GroupRecord;
use chama_core::error::{ChamaError, Result};
use chama_core::types::{AccountId, GroupId, GroupPhase};

/// Intents a caller can submit against a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Join,
    Leave,
    Kick,
    SetStatus,
    TransferCreator,
    Cancel,
    ForceStart,
    Contribute,
    RaiseDispute,
    Vote,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Kick => "kick",
            Self::SetStatus => "set_status",
            Self::TransferCreator => "transfer_creator",
            Self::Cancel => "cancel",
            Self::ForceStart => "force_start",
            Self::Contribute => "contribute",
            Self::RaiseDispute => "raise_dispute",
            Self::Vote => "vote",
        }
    }
}

/// Caller's relationship to a group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Role {
    pub creator: bool,
    /// Holds an active (paid) membership
    pub member: bool,
}

impl Role {
    pub fn of(record: &GroupRecord, caller: &AccountId) -> Self {
        Self {
            creator: record.group.creator == *caller,
            member: record.roster.is_active(caller),
        }
    }
}

/// Everything [`authorize`] looks at
#[derive(Clone, Copy, Debug)]
pub struct AuthContext {
    pub group_id: GroupId,
    pub caller: AccountId,
    pub role: Role,
    pub phase: GroupPhase,
    /// Creator's pause flag (`false` = paused)
    pub is_active: bool,
}

impl AuthContext {
    pub fn new(record: &GroupRecord, caller: AccountId) -> Self {
        Self {
            group_id: record.group.id,
            caller,
            role: Role::of(record, &caller),
            phase: record.group.phase,
            is_active: record.group.is_active,
        }
    }
}

/// Check caller authority and phase for an operation
pub fn authorize(op: Operation, ctx: &AuthContext) -> Result<()> {
    use GroupPhase::*;

    let wrong_phase = || ChamaError::InvalidPhaseForOperation {
        operation: op.name(),
        phase: ctx.phase,
    };
    let require_creator = || {
        if ctx.role.creator {
            Ok(())
        } else {
            Err(ChamaError::NotCreator)
        }
    };
    let require_member = || {
        if ctx.role.member {
            Ok(())
        } else {
            Err(ChamaError::NotAuthorized(ctx.caller))
        }
    };

    match op {
        Operation::Join => match ctx.phase {
            Recruiting if !ctx.is_active => Err(ChamaError::GroupNotJoinable(ctx.group_id)),
            Recruiting => Ok(()),
            Waiting | Active | Completed | Cancelled => {
                Err(ChamaError::GroupNotRecruiting(ctx.group_id))
            }
        },
        Operation::Leave => {
            if ctx.role.creator {
                return Err(ChamaError::NotAuthorized(ctx.caller));
            }
            require_member()?;
            match ctx.phase {
                Recruiting | Waiting => Ok(()),
                Active | Completed | Cancelled => Err(wrong_phase()),
            }
        }
        Operation::Kick => {
            require_creator()?;
            match ctx.phase {
                Recruiting | Waiting | Active => Ok(()),
                Completed | Cancelled => Err(wrong_phase()),
            }
        }
        Operation::SetStatus | Operation::TransferCreator => {
            require_creator()?;
            if ctx.phase.is_terminal() {
                Err(wrong_phase())
            } else {
                Ok(())
            }
        }
        Operation::Cancel => {
            require_creator()?;
            match ctx.phase {
                Recruiting | Waiting => Ok(()),
                Active | Completed | Cancelled => Err(wrong_phase()),
            }
        }
        Operation::ForceStart => {
            if !ctx.role.creator {
                require_member()?;
            }
            match ctx.phase {
                Waiting if !ctx.is_active => Err(ChamaError::GroupNotActive(ctx.group_id)),
                Waiting => Ok(()),
                Recruiting | Active | Completed | Cancelled => Err(wrong_phase()),
            }
        }
        Operation::Contribute => {
            match ctx.phase {
                Active => {}
                Recruiting | Waiting | Completed | Cancelled => {
                    return Err(ChamaError::GroupNotActive(ctx.group_id))
                }
            }
            if ctx.role.member {
                Ok(())
            } else {
                Err(ChamaError::NotAMember(ctx.caller))
            }
        }
        Operation::RaiseDispute | Operation::Vote => {
            require_member()?;
            match ctx.phase {
                Cancelled => Err(wrong_phase()),
                Recruiting | Waiting | Active | Completed => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [GroupPhase; 5] = [
        GroupPhase::Recruiting,
        GroupPhase::Waiting,
        GroupPhase::Active,
        GroupPhase::Completed,
        GroupPhase::Cancelled,
    ];

    fn ctx(creator: bool, member: bool, phase: GroupPhase) -> AuthContext {
        AuthContext {
            group_id: GroupId(1),
            caller: AccountId::from_label("caller"),
            role: Role { creator, member },
            phase,
            is_active: true,
        }
    }

    #[test]
    fn test_join_only_while_recruiting() {
        for phase in ALL_PHASES {
            let result = authorize(Operation::Join, &ctx(false, false, phase));
            if phase == GroupPhase::Recruiting {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(ChamaError::GroupNotRecruiting(_))));
            }
        }

        let mut paused = ctx(false, false, GroupPhase::Recruiting);
        paused.is_active = false;
        assert!(matches!(
            authorize(Operation::Join, &paused),
            Err(ChamaError::GroupNotJoinable(_))
        ));
    }

    #[test]
    fn test_creator_only_operations() {
        for op in [
            Operation::Kick,
            Operation::SetStatus,
            Operation::TransferCreator,
            Operation::Cancel,
        ] {
            assert_eq!(
                authorize(op, &ctx(false, true, GroupPhase::Recruiting)),
                Err(ChamaError::NotCreator)
            );
            assert!(authorize(op, &ctx(true, true, GroupPhase::Recruiting)).is_ok());
            assert!(matches!(
                authorize(op, &ctx(true, true, GroupPhase::Completed)),
                Err(ChamaError::InvalidPhaseForOperation { .. })
            ));
        }

        assert!(authorize(Operation::Kick, &ctx(true, true, GroupPhase::Active)).is_ok());
        assert!(authorize(Operation::Cancel, &ctx(true, true, GroupPhase::Active)).is_err());
    }

    #[test]
    fn test_force_start() {
        assert!(authorize(Operation::ForceStart, &ctx(false, true, GroupPhase::Waiting)).is_ok());
        assert!(authorize(Operation::ForceStart, &ctx(true, false, GroupPhase::Waiting)).is_ok());
        assert!(matches!(
            authorize(Operation::ForceStart, &ctx(false, false, GroupPhase::Waiting)),
            Err(ChamaError::NotAuthorized(_))
        ));
        assert!(matches!(
            authorize(Operation::ForceStart, &ctx(true, true, GroupPhase::Recruiting)),
            Err(ChamaError::InvalidPhaseForOperation { .. })
        ));

        let mut paused = ctx(true, true, GroupPhase::Waiting);
        paused.is_active = false;
        assert!(authorize(Operation::ForceStart, &paused).is_err());
    }

    #[test]
    fn test_contribute_errors() {
        assert!(matches!(
            authorize(Operation::Contribute, &ctx(false, true, GroupPhase::Waiting)),
            Err(ChamaError::GroupNotActive(_))
        ));
        assert!(matches!(
            authorize(Operation::Contribute, &ctx(true, false, GroupPhase::Active)),
            Err(ChamaError::NotAMember(_))
        ));
        assert!(authorize(Operation::Contribute, &ctx(false, true, GroupPhase::Active)).is_ok());
    }

    #[test]
    fn test_leave_rules() {
        assert!(matches!(
            authorize(Operation::Leave, &ctx(true, true, GroupPhase::Recruiting)),
            Err(ChamaError::NotAuthorized(_))
        ));
        assert!(authorize(Operation::Leave, &ctx(false, true, GroupPhase::Waiting)).is_ok());
        assert!(authorize(Operation::Leave, &ctx(false, true, GroupPhase::Active)).is_err());
    }

    #[test]
    fn test_disputes_blocked_only_when_cancelled() {
        for phase in ALL_PHASES {
            for op in [Operation::RaiseDispute, Operation::Vote] {
                let result = authorize(op, &ctx(false, true, phase));
                assert_eq!(result.is_ok(), phase != GroupPhase::Cancelled);
            }
        }
        assert!(matches!(
            authorize(Operation::Vote, &ctx(false, false, GroupPhase::Active)),
            Err(ChamaError::NotAuthorized(_))
        ));
    }
}
