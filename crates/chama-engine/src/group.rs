//! # Groups
//!
//! A [`GroupRecord`] is everything the engine knows about one group: its
//! parameters and phase, the member roster, every round and the running
//! totals of money that entered and left escrow. Operations never mutate a
//! live record; they work on a clone and the engine swaps it in on success.
//!
//! ## Balance sheet
//!
//! | Line | Derived from |
//! |------|--------------|
//! | `deposits_held` | paid deposit balances on the roster |
//! | `pots_escrowed` | pot + penalty pool of rounds not yet completed |
//! | `paid_out` | ledger, payouts to round winners |
//! | `refunded` | ledger, deposit refunds and returned pots |

use crate::membership::MemberRoster;
use crate::round::{next_deadline, Round, RoundInfo};
use crate::transition::Transition;
use chama_core::amount::{checked_add, checked_sum, Amount, BalanceSheet};
use chama_core::error::{ChamaError, Result};
use chama_core::event::ChamaEvent;
use chama_core::types::{
    AccountId, DepositMode, GroupId, GroupPhase, LeaveReason, PayoutOrder, Seconds,
    SettlementAsset, Timestamp,
};
use chama_economics::deposit::required_deposit;
use chama_economics::penalty::{LatePolicy, PenaltyBook};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Creation parameters supplied by the creator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParams {
    /// Asset contributions and deposits settle in
    #[serde(default)]
    pub settlement_asset: SettlementAsset,

    /// Per-round contribution (> 0)
    pub contribution_amount: Amount,

    /// Refundable security deposit on top of the first contribution
    #[serde(default)]
    pub security_deposit: Amount,

    /// What a joiner must supply
    #[serde(default)]
    pub deposit_mode: DepositMode,

    /// Seconds per round (> 0)
    pub round_duration: Seconds,

    /// Members needed before the group can start
    pub member_target: u32,

    /// Recipient selection rule
    #[serde(default)]
    pub payout_order: PayoutOrder,
}

impl GroupParams {
    /// Reject malformed parameters
    pub fn validate(&self, min_members: u32, max_members: u32) -> Result<()> {
        if self.contribution_amount == 0 {
            return Err(ChamaError::InvalidParameter(
                "contribution amount must be positive".into(),
            ));
        }
        if self.round_duration == 0 {
            return Err(ChamaError::InvalidParameter(
                "round duration must be positive".into(),
            ));
        }
        if i64::try_from(self.round_duration).is_err() {
            return Err(ChamaError::InvalidParameter(format!(
                "round duration {} does not fit a timestamp offset",
                self.round_duration
            )));
        }
        if self.member_target < min_members || self.member_target > max_members {
            return Err(ChamaError::InvalidParameter(format!(
                "member target {} outside {}..={}",
                self.member_target, min_members, max_members
            )));
        }
        if self.deposit_mode == DepositMode::ContributionOnly && self.security_deposit != 0 {
            return Err(ChamaError::InvalidParameter(
                "contribution-only groups take no security deposit".into(),
            ));
        }
        required_deposit(
            self.deposit_mode,
            self.contribution_amount,
            self.security_deposit,
        )?;
        Ok(())
    }
}

/// Group state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub creator: AccountId,
    pub settlement_asset: SettlementAsset,
    pub contribution_amount: Amount,
    pub security_deposit: Amount,
    pub deposit_mode: DepositMode,
    pub round_duration: Seconds,
    pub member_target: u32,
    pub payout_order: PayoutOrder,

    /// Late window and penalty, fixed at creation
    pub late_policy: LatePolicy,

    /// Countdown from Waiting to auto-start, fixed at creation
    pub start_grace: Seconds,

    pub phase: GroupPhase,

    /// Number of the open (or last) round; 0 before start
    pub current_round: u32,

    /// Pause flag, independent of phase
    pub is_active: bool,

    pub created_at: Timestamp,
    pub waiting_since: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl Group {
    /// Exact amount a joiner must supply
    pub fn required_deposit(&self) -> Result<Amount> {
        Ok(required_deposit(
            self.deposit_mode,
            self.contribution_amount,
            self.security_deposit,
        )?)
    }
}

/// Cumulative money movements of one group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLedger {
    pub total_supplied: Amount,
    pub paid_out: Amount,
    pub refunded: Amount,
}

/// Kind of money leaving escrow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outflow {
    Payout,
    Refund,
}

/// Full state of one group
#[derive(Clone, Debug)]
pub struct GroupRecord {
    pub group: Group,
    pub roster: MemberRoster,
    pub rounds: Vec<Round>,
    pub ledger: GroupLedger,
    pub penalties: PenaltyBook,
}

impl GroupRecord {
    /// New group in Recruiting with the creator enrolled as Pending
    pub fn new(
        id: GroupId,
        creator: AccountId,
        params: GroupParams,
        late_policy: LatePolicy,
        start_grace: Seconds,
        now: Timestamp,
    ) -> Result<Self> {
        let group = Group {
            id,
            creator,
            settlement_asset: params.settlement_asset,
            contribution_amount: params.contribution_amount,
            security_deposit: params.security_deposit,
            deposit_mode: params.deposit_mode,
            round_duration: params.round_duration,
            member_target: params.member_target,
            payout_order: params.payout_order,
            late_policy,
            start_grace,
            phase: GroupPhase::Recruiting,
            current_round: 0,
            is_active: true,
            created_at: now,
            waiting_since: None,
            started_at: None,
            finished_at: None,
        };

        let mut roster = MemberRoster::new();
        roster.enroll(creator, group.required_deposit()?, now);

        Ok(Self {
            group,
            roster,
            rounds: Vec::new(),
            ledger: GroupLedger::default(),
            penalties: PenaltyBook::new(),
        })
    }

    pub fn id(&self) -> GroupId {
        self.group.id
    }

    /// Where the group's funds are right now
    pub fn balance_sheet(&self) -> Result<BalanceSheet> {
        let pots_escrowed = self
            .rounds
            .iter()
            .try_fold(0, |acc, round| checked_add(acc, round.escrowed()?))?;

        Ok(BalanceSheet {
            deposits_held: self.roster.deposits_held()?,
            pots_escrowed,
            paid_out: self.ledger.paid_out,
            refunded: self.ledger.refunded,
        })
    }

    /// The round currently accepting contributions
    pub fn open_round(&self) -> Option<&Round> {
        if self.group.phase != GroupPhase::Active {
            return None;
        }
        self.rounds.last().filter(|r| !r.is_completed)
    }

    pub fn open_round_mut(&mut self) -> Option<&mut Round> {
        if self.group.phase != GroupPhase::Active {
            return None;
        }
        self.rounds.last_mut().filter(|r| !r.is_completed)
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        let index = (round_number as usize).checked_sub(1)?;
        self.rounds.get(index)
    }

    pub fn round_info(&self, round_number: u32) -> Result<RoundInfo> {
        self.round(round_number)
            .map(Round::info)
            .ok_or(ChamaError::RoundNotFound {
                group: self.group.id,
                round: round_number,
            })
    }

    /// Seconds left in the start grace period while Waiting and unpaused
    pub fn time_until_start(&self, now: Timestamp) -> Option<Seconds> {
        // Paused groups do not count down
        if self.group.phase != GroupPhase::Waiting || !self.group.is_active {
            return None;
        }
        let starts_at = self
            .group
            .waiting_since?
            .saturating_add(self.group.start_grace as i64);
        Some(starts_at.saturating_sub(now).max(0) as Seconds)
    }

    /// When the grace period elapsed, if the group should auto-start by `now`
    pub fn auto_start_due(&self, now: Timestamp) -> Option<Timestamp> {
        if self.group.phase != GroupPhase::Waiting || !self.group.is_active {
            return None;
        }
        if self.roster.member_count() < self.group.member_target {
            return None;
        }
        let at = self
            .group
            .waiting_since?
            .saturating_add(self.group.start_grace as i64);
        (now >= at).then_some(at)
    }

    /// First eligible member in join order
    pub fn next_recipient(&self) -> Option<AccountId> {
        if self.group.phase.is_terminal() {
            return None;
        }
        self.roster.eligible_ids().first().copied()
    }

    pub fn set_phase(&mut self, to: GroupPhase, tx: &mut Transition) {
        let from = self.group.phase;
        if from == to {
            return;
        }
        self.group.phase = to;
        info!("{} {} -> {}", self.group.id, from, to);
        tx.emit(ChamaEvent::PhaseChanged {
            group_id: self.group.id,
            from,
            to,
        });
    }

    /// Take funds into escrow
    pub fn collect(&mut self, tx: &mut Transition, from: AccountId, amount: Amount) -> Result<()> {
        tx.receive(&self.group.settlement_asset, from, amount)?;
        self.ledger.total_supplied = checked_add(self.ledger.total_supplied, amount)?;
        Ok(())
    }

    /// Release funds from escrow
    pub fn disburse(
        &mut self,
        tx: &mut Transition,
        to: AccountId,
        amount: Amount,
        kind: Outflow,
    ) -> Result<()> {
        tx.send(&self.group.settlement_asset, to, amount)?;
        match kind {
            Outflow::Payout => self.ledger.paid_out = checked_add(self.ledger.paid_out, amount)?,
            Outflow::Refund => self.ledger.refunded = checked_add(self.ledger.refunded, amount)?,
        }
        Ok(())
    }

    /// Deactivate a member and refund their deposit
    pub fn remove_member(
        &mut self,
        member: AccountId,
        reason: LeaveReason,
        tx: &mut Transition,
    ) -> Result<Amount> {
        let refunded = self.roster.remove(&member, reason)?;
        self.disburse(tx, member, refunded, Outflow::Refund)?;

        tx.emit(ChamaEvent::Leave {
            group_id: self.group.id,
            member,
            reason,
            refunded,
        });
        if refunded > 0 {
            tx.emit(ChamaEvent::DepositRefunded {
                group_id: self.group.id,
                member,
                amount: refunded,
            });
        }
        Ok(refunded)
    }

    /// Drop back from Waiting to Recruiting after a member left
    pub fn reopen(&mut self, tx: &mut Transition) {
        if self.group.phase == GroupPhase::Waiting {
            self.group.waiting_since = None;
            self.set_phase(GroupPhase::Recruiting, tx);
        }
    }

    /// Refund every deposit still held
    pub fn refund_all_deposits(&mut self, tx: &mut Transition) -> Result<Amount> {
        let mut refunds = Vec::new();
        for member in self.roster.iter_mut() {
            if member.deposit.is_paid() {
                refunds.push((member.address, member.deposit.refund()?));
            } else {
                member.deposit.release();
            }
        }

        let total = checked_sum(refunds.iter().map(|(_, amount)| *amount))?;
        for (member, amount) in refunds {
            self.disburse(tx, member, amount, Outflow::Refund)?;
            tx.emit(ChamaEvent::DepositRefunded {
                group_id: self.group.id,
                member,
                amount,
            });
        }
        Ok(total)
    }

    /// Waiting -> Active, opening round 1
    pub fn start(&mut self, at: Timestamp, tx: &mut Transition) -> Result<()> {
        if self.roster.member_count() < self.group.member_target {
            return Err(ChamaError::InvalidPhaseForOperation {
                operation: "start",
                phase: self.group.phase,
            });
        }

        self.group.started_at = Some(at);
        self.set_phase(GroupPhase::Active, tx);
        self.open_next_round(1, at);
        let first_deadline = self.rounds.last().map_or(at, |r| r.deadline);

        tx.emit(ChamaEvent::GroupStarted {
            group_id: self.group.id,
            started_at: at,
            first_deadline,
        });
        Ok(())
    }

    /// Open round `round_number` at `opened_at`
    pub fn open_next_round(&mut self, round_number: u32, opened_at: Timestamp) {
        let started_at = self.group.started_at.unwrap_or(opened_at);
        let deadline = next_deadline(
            started_at,
            round_number,
            self.group.round_duration,
            opened_at,
        );
        self.rounds.push(Round::open(
            round_number,
            opened_at,
            deadline,
            &self.group.late_policy,
        ));
        self.group.current_round = round_number;
    }

    /// Active -> Completed, refunding every deposit
    pub fn complete(&mut self, at: Timestamp, tx: &mut Transition) -> Result<()> {
        self.refund_all_deposits(tx)?;
        self.group.finished_at = Some(at);
        self.set_phase(GroupPhase::Completed, tx);

        let rounds_paid = self.rounds.iter().filter(|r| r.winner.is_some()).count() as u32;
        tx.emit(ChamaEvent::GroupCompleted {
            group_id: self.group.id,
            rounds_paid,
        });
        info!("{} completed after {} payouts", self.group.id, rounds_paid);
        Ok(())
    }

    pub fn details(&self, now: Timestamp) -> Result<GroupDetails> {
        Ok(GroupDetails {
            group: self.group.clone(),
            member_count: self.roster.member_count(),
            members: self.roster.active_ids(),
            required_deposit: self.group.required_deposit()?,
            time_until_start: self.time_until_start(now),
            next_recipient: self.next_recipient(),
            balance: self.balance_sheet()?,
            total_penalties: self.penalties.total_collected(),
        })
    }
}

/// Read model returned by `get_group_details`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDetails {
    pub group: Group,
    pub member_count: u32,
    /// Active members in join order
    pub members: Vec<AccountId>,
    pub required_deposit: Amount,
    pub time_until_start: Option<Seconds>,
    pub next_recipient: Option<AccountId>,
    pub balance: BalanceSheet,
    pub total_penalties: Amount,
}
