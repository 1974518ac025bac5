//! # Chama Engine
//!
//! The façade every caller goes through. Each mutating intent runs the same
//! pipeline under the group's lock:
//!
//! ```text
//!   lock group ──► catch up (commit) ──► clone ──► authorize + apply ──► settle due rounds
//!                                                                           │
//!        publish events ◄── swap in ◄── settlement batch ◄── conservation check
//! ```
//!
//! Any error before the swap leaves the live record untouched. Catch-up
//! (auto-start, overdue rounds) is committed on its own first, so lazy
//! progress is never lost because the caller's intent was rejected.

use crate::config::EngineConfig;
use crate::group::{GroupDetails, GroupParams, GroupRecord};
use crate::lifecycle::{authorize, AuthContext, Operation};
use crate::membership::Membership;
use crate::metrics::EngineMetrics;
use crate::round::{settle_due_rounds, RoundInfo};
use crate::settlement::SettlementGateway;
use crate::store::GroupStore;
use crate::transition::Transition;
use chama_core::amount::{Amount, BalanceSheet, ConservationCheck};
use chama_core::clock::Clock;
use chama_core::error::{ChamaError, Result};
use chama_core::event::{ChamaEvent, EventSink};
use chama_core::types::{
    AccountId, DisputeId, GroupId, GroupPhase, LeaveReason, Seconds, Timestamp,
};
use chama_economics::penalty::PenaltyRecord;
use chama_governance::{Dispute, DisputeRegistry};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Action taken on a group after one of its disputes resolves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remedy {
    None,
    /// Remove a member with the creator's authority
    Kick(AccountId),
}

/// Decides what a resolved dispute leads to
pub trait RemedyPolicy: Send + Sync {
    fn remedy(&self, dispute: &Dispute) -> Remedy;
}

/// Never acts on a dispute
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRemedy;

impl RemedyPolicy for NoRemedy {
    fn remedy(&self, _dispute: &Dispute) -> Remedy {
        Remedy::None
    }
}

/// ROSCA group engine
pub struct ChamaEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    settlement: Arc<dyn SettlementGateway>,
    events: Arc<dyn EventSink>,
    store: GroupStore,
    disputes: DisputeRegistry,
    remedy: Box<dyn RemedyPolicy>,
    metrics: Option<EngineMetrics>,
}

impl ChamaEngine {
    /// Create an engine. Fails on an invalid configuration.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        settlement: Arc<dyn SettlementGateway>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let disputes = DisputeRegistry::with_config(config.disputes.clone());

        Ok(Self {
            config,
            clock,
            settlement,
            events,
            store: GroupStore::new(),
            disputes,
            remedy: Box::new(NoRemedy),
            metrics: None,
        })
    }

    /// Install a dispute remedy policy
    pub fn with_remedy_policy(mut self, policy: impl RemedyPolicy + 'static) -> Self {
        self.remedy = Box::new(policy);
        self
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // === Membership ===

    /// Create a group in Recruiting with the creator enrolled as Pending
    pub fn create_group(&self, creator: AccountId, params: GroupParams) -> Result<GroupId> {
        let outcome = self.try_create_group(creator, params);
        self.tracked(outcome)
    }

    fn try_create_group(&self, creator: AccountId, params: GroupParams) -> Result<GroupId> {
        params.validate(self.config.limits.min_members, self.config.limits.max_members)?;
        let late_policy = self.config.late_policy()?;
        let start_grace = self.config.rounds.start_grace_secs;
        let now = self.clock.now();

        let event_params = params.clone();
        let (group_id, _) = self.store.insert(|id| {
            GroupRecord::new(id, creator, params, late_policy, start_grace, now)
        })?;
        self.store.index_member(creator, group_id);

        info!(
            "{} created by {} (target {}, contribution {})",
            group_id, creator, event_params.member_target, event_params.contribution_amount
        );
        self.publish(vec![ChamaEvent::Created {
            group_id,
            creator,
            contribution_amount: event_params.contribution_amount,
            security_deposit: event_params.security_deposit,
            member_target: event_params.member_target,
        }]);
        Ok(group_id)
    }

    /// Pay the deposit and join. Filling the group moves it to Waiting.
    pub fn join_group(
        &self,
        group_id: GroupId,
        participant: AccountId,
        supplied: Amount,
    ) -> Result<()> {
        self.transact(group_id, |record, now, tx| {
            let ctx = AuthContext::new(record, participant);
            if ctx.phase.is_terminal() {
                return Err(ChamaError::GroupNotRecruiting(group_id));
            }
            if ctx.role.member {
                return Err(ChamaError::AlreadyMember(participant));
            }
            let target = record.group.member_target;
            if record.roster.member_count() >= target {
                return Err(ChamaError::GroupFull { target });
            }
            authorize(Operation::Join, &ctx)?;
            if record
                .roster
                .get(&participant)
                .map_or(false, Membership::was_kicked)
            {
                return Err(ChamaError::NotAuthorized(participant));
            }

            let required = record.group.required_deposit()?;
            if supplied != required {
                return Err(ChamaError::WrongAmount {
                    expected: required,
                    supplied,
                });
            }

            record.roster.admit(participant, required, supplied, now)?;
            record.collect(tx, participant, supplied)?;

            let member_count = record.roster.member_count();
            tx.emit(ChamaEvent::Joined {
                group_id,
                member: participant,
                deposit: supplied,
                member_count,
            });
            info!(
                "{} joined {} ({}/{})",
                participant, group_id, member_count, target
            );

            if member_count == target {
                for released in record.roster.release_pending() {
                    tx.emit(ChamaEvent::Leave {
                        group_id,
                        member: released,
                        reason: LeaveReason::Released,
                        refunded: 0,
                    });
                }
                record.group.waiting_since = Some(now);
                record.set_phase(GroupPhase::Waiting, tx);
            }
            Ok(())
        })?;

        self.store.index_member(participant, group_id);
        Ok(())
    }

    /// Leave before the group starts. Returns the refunded deposit.
    pub fn leave_group(&self, group_id: GroupId, participant: AccountId) -> Result<Amount> {
        self.transact(group_id, |record, _now, tx| {
            authorize(Operation::Leave, &AuthContext::new(record, participant))?;
            let refunded = record.remove_member(participant, LeaveReason::Left, tx)?;
            record.reopen(tx);
            info!("{} left {}, refunded {}", participant, group_id, refunded);
            Ok(refunded)
        })
    }

    /// Remove a member. Returns the refunded deposit.
    pub fn kick_member(
        &self,
        group_id: GroupId,
        caller: AccountId,
        target: AccountId,
    ) -> Result<Amount> {
        self.transact(group_id, |record, _now, tx| kick(record, caller, target, tx))
    }

    /// Pause or resume a group
    pub fn set_group_status(
        &self,
        group_id: GroupId,
        caller: AccountId,
        is_active: bool,
    ) -> Result<()> {
        self.transact(group_id, |record, now, tx| {
            authorize(Operation::SetStatus, &AuthContext::new(record, caller))?;
            if record.group.is_active == is_active {
                return Ok(());
            }

            record.group.is_active = is_active;
            if is_active && record.group.phase == GroupPhase::Waiting {
                // Resuming restarts the grace countdown
                record.group.waiting_since = Some(now);
            }
            tx.emit(ChamaEvent::GroupStatusChanged {
                group_id,
                is_active,
            });
            info!(
                "{} {}",
                group_id,
                if is_active { "resumed" } else { "paused" }
            );
            Ok(())
        })
    }

    /// Hand the creator role to another active member
    pub fn transfer_creator(
        &self,
        group_id: GroupId,
        caller: AccountId,
        new_creator: AccountId,
    ) -> Result<()> {
        self.transact(group_id, |record, _now, tx| {
            authorize(
                Operation::TransferCreator,
                &AuthContext::new(record, caller),
            )?;
            if new_creator == caller {
                return Err(ChamaError::InvalidParameter(
                    "account is already the creator".into(),
                ));
            }
            if !record.roster.is_active(&new_creator) {
                return Err(ChamaError::NotAMember(new_creator));
            }

            record.group.creator = new_creator;
            tx.emit(ChamaEvent::CreatorTransferred {
                group_id,
                from: caller,
                to: new_creator,
            });
            info!("{} creator is now {}", group_id, new_creator);
            Ok(())
        })
    }

    /// Cancel before the group starts, refunding every deposit
    pub fn cancel_group(&self, group_id: GroupId, caller: AccountId) -> Result<()> {
        self.transact(group_id, |record, now, tx| {
            authorize(Operation::Cancel, &AuthContext::new(record, caller))?;
            let refunded = record.refund_all_deposits(tx)?;
            record.group.finished_at = Some(now);
            record.set_phase(GroupPhase::Cancelled, tx);
            tx.emit(ChamaEvent::GroupCancelled { group_id });
            info!("{} cancelled, refunded {}", group_id, refunded);
            Ok(())
        })
    }

    // === Rounds ===

    /// Skip the remaining grace period and open round 1
    pub fn force_start(&self, group_id: GroupId, caller: AccountId) -> Result<()> {
        self.transact(group_id, |record, now, tx| {
            authorize(Operation::ForceStart, &AuthContext::new(record, caller))?;
            info!("{} force-started by {}", group_id, caller);
            record.start(now, tx)
        })
    }

    /// Pay into the open round. The last outstanding contribution resolves it.
    pub fn contribute(
        &self,
        group_id: GroupId,
        participant: AccountId,
        supplied: Amount,
    ) -> Result<()> {
        self.transact(group_id, |record, now, tx| {
            authorize(Operation::Contribute, &AuthContext::new(record, participant))?;

            let expected = record.group.contribution_amount;
            let policy = record.group.late_policy;
            let round = record
                .open_round_mut()
                .ok_or(ChamaError::GroupNotActive(group_id))?;
            let round_number = round.round_number;
            if round.has_contributed(&participant) {
                return Err(ChamaError::AlreadyContributedThisRound {
                    round: round_number,
                });
            }
            if supplied != expected {
                return Err(ChamaError::WrongAmount { expected, supplied });
            }

            let late = policy.is_late(round.deadline, now);
            round.record(participant, supplied, now, late)?;

            if let Some(member) = record.roster.get_mut(&participant) {
                if late {
                    member.late_count += 1;
                } else {
                    member.reliability += 1;
                }
            }
            record.collect(tx, participant, supplied)?;

            tx.emit(ChamaEvent::ContributionMade {
                group_id,
                member: participant,
                round: round_number,
                amount: supplied,
                late,
            });
            debug!(
                "{} contributed {} to {} round {}{}",
                participant,
                supplied,
                group_id,
                round_number,
                if late { " (late)" } else { "" }
            );
            Ok(())
        })
    }

    // === Disputes ===

    /// Open a dispute against a group
    pub fn raise_dispute(
        &self,
        group_id: GroupId,
        reporter: AccountId,
        description: String,
        evidence: Option<String>,
    ) -> Result<DisputeId> {
        let outcome = self.observe_group(group_id, |record, now| {
            authorize(Operation::RaiseDispute, &AuthContext::new(record, reporter))?;
            Ok(self
                .disputes
                .open(group_id, reporter, description, evidence, now))
        });
        let dispute = self.tracked(outcome)?;

        self.publish(vec![ChamaEvent::DisputeRaised {
            dispute_id: dispute.id,
            group_id,
            reported_by: reporter,
            voting_ends_at: dispute.voting_ends_at,
        }]);
        Ok(dispute.id)
    }

    /// Vote on an open dispute
    pub fn cast_vote(
        &self,
        dispute_id: DisputeId,
        voter: AccountId,
        support: bool,
        comment: Option<String>,
    ) -> Result<()> {
        let outcome = self.try_cast_vote(dispute_id, voter, support, comment);
        self.tracked(outcome)?;

        self.publish(vec![ChamaEvent::VoteCast {
            dispute_id,
            voter,
            support,
        }]);
        Ok(())
    }

    fn try_cast_vote(
        &self,
        dispute_id: DisputeId,
        voter: AccountId,
        support: bool,
        comment: Option<String>,
    ) -> Result<()> {
        // Tallies a dispute whose window has closed, so the vote below is refused
        let snapshot = self.settle_dispute(dispute_id)?;
        let handle = self.disputes.get(dispute_id)?;

        self.observe_group(snapshot.group_id, |record, now| {
            authorize(Operation::Vote, &AuthContext::new(record, voter))?;
            handle.lock().cast_vote(voter, support, comment, now)
        })
    }

    /// Tally a dispute whose voting window has closed
    pub fn resolve_dispute(&self, dispute_id: DisputeId) -> Result<Dispute> {
        let outcome = self.settle_dispute(dispute_id);
        self.tracked(outcome)
    }

    /// Dispute snapshot, resolved first when due
    pub fn get_dispute(&self, dispute_id: DisputeId) -> Result<Dispute> {
        self.settle_dispute(dispute_id)
    }

    fn settle_dispute(&self, dispute_id: DisputeId) -> Result<Dispute> {
        let handle = self.disputes.get(dispute_id)?;
        let now = self.clock.now();
        let (snapshot, outcome) = {
            let mut dispute = handle.lock();
            let outcome = dispute.settle_if_due(now);
            (dispute.clone(), outcome)
        };

        if let Some(outcome) = outcome {
            self.publish(vec![ChamaEvent::DisputeResolved {
                dispute_id,
                group_id: snapshot.group_id,
                votes_support: snapshot.votes_support,
                votes_dispute: snapshot.votes_dispute,
                outcome,
            }]);
            self.apply_remedy(&snapshot);
        }
        Ok(snapshot)
    }

    fn apply_remedy(&self, dispute: &Dispute) {
        match self.remedy.remedy(dispute) {
            Remedy::None => {}
            Remedy::Kick(member) => {
                let result = self.transact(dispute.group_id, |record, _now, tx| {
                    let creator = record.group.creator;
                    kick(record, creator, member, tx)
                });
                match result {
                    Ok(refunded) => info!(
                        "{} remedy removed {} (refunded {})",
                        dispute.id, member, refunded
                    ),
                    Err(err) => warn!("{} remedy not applied: {}", dispute.id, err),
                }
            }
        }
    }

    // === Queries ===

    pub fn get_group_details(&self, group_id: GroupId) -> Result<GroupDetails> {
        self.observe_group(group_id, |record, now| record.details(now))
    }

    pub fn get_round_info(&self, group_id: GroupId, round_number: u32) -> Result<RoundInfo> {
        self.observe_group(group_id, |record, _| record.round_info(round_number))
    }

    pub fn get_required_deposit(&self, group_id: GroupId) -> Result<Amount> {
        self.observe_group(group_id, |record, _| record.group.required_deposit())
    }

    /// Seconds until auto-start while Waiting, `None` otherwise
    pub fn get_time_until_start(&self, group_id: GroupId) -> Result<Option<Seconds>> {
        self.observe_group(group_id, |record, now| Ok(record.time_until_start(now)))
    }

    pub fn has_contributed(
        &self,
        group_id: GroupId,
        member: AccountId,
        round_number: u32,
    ) -> Result<bool> {
        self.observe_group(group_id, |record, _| {
            record
                .round(round_number)
                .map(|round| round.has_contributed(&member))
                .ok_or(ChamaError::RoundNotFound {
                    group: group_id,
                    round: round_number,
                })
        })
    }

    /// Who the join-order rule would pay next
    pub fn next_recipient(&self, group_id: GroupId) -> Result<Option<AccountId>> {
        self.observe_group(group_id, |record, _| Ok(record.next_recipient()))
    }

    pub fn get_membership(
        &self,
        group_id: GroupId,
        account: AccountId,
    ) -> Result<Option<Membership>> {
        self.observe_group(group_id, |record, _| {
            Ok(record.roster.get(&account).cloned())
        })
    }

    pub fn balance_sheet(&self, group_id: GroupId) -> Result<BalanceSheet> {
        self.observe_group(group_id, |record, _| record.balance_sheet())
    }

    pub fn penalty_records(&self, group_id: GroupId) -> Result<Vec<PenaltyRecord>> {
        self.observe_group(group_id, |record, _| {
            Ok(record.penalties.records().to_vec())
        })
    }

    /// Groups an account has held a membership in
    pub fn member_groups(&self, account: &AccountId) -> Vec<GroupId> {
        self.store.groups_of(account)
    }

    pub fn group_disputes(&self, group_id: GroupId) -> Vec<DisputeId> {
        self.disputes.for_group(group_id)
    }

    pub fn group_count(&self) -> usize {
        self.store.count()
    }

    pub fn dispute_count(&self) -> usize {
        self.disputes.count()
    }

    /// Catch up every group and dispute with the clock
    pub fn settle_all(&self) -> Result<()> {
        for id in 1..=self.store.count() as u64 {
            self.observe_group(GroupId(id), |_, _| Ok(()))?;
        }
        for id in 1..=self.disputes.count() as u64 {
            self.settle_dispute(DisputeId(id))?;
        }
        Ok(())
    }

    // === Pipeline ===

    fn transact<T, F>(&self, group_id: GroupId, apply: F) -> Result<T>
    where
        F: FnOnce(&mut GroupRecord, Timestamp, &mut Transition) -> Result<T>,
    {
        let outcome = self.run_transaction(group_id, apply);
        self.tracked(outcome)
    }

    fn run_transaction<T, F>(&self, group_id: GroupId, apply: F) -> Result<T>
    where
        F: FnOnce(&mut GroupRecord, Timestamp, &mut Transition) -> Result<T>,
    {
        let handle = self.store.get(group_id)?;
        let mut live = handle.lock();
        let now = self.clock.now();
        self.catch_up(&mut live, now)?;

        let mut draft = live.clone();
        let mut tx = Transition::new();
        let value = apply(&mut draft, now, &mut tx)?;
        settle_due_rounds(&mut draft, now, &mut tx)?;

        self.commit(&mut live, draft, tx)?;
        Ok(value)
    }

    /// Lock a group, commit any due progress, then read it
    fn observe_group<T, F>(&self, group_id: GroupId, read: F) -> Result<T>
    where
        F: FnOnce(&GroupRecord, Timestamp) -> Result<T>,
    {
        let handle = self.store.get(group_id)?;
        let mut live = handle.lock();
        let now = self.clock.now();
        self.catch_up(&mut live, now)?;
        read(&live, now)
    }

    fn catch_up(&self, live: &mut GroupRecord, now: Timestamp) -> Result<()> {
        let mut draft = live.clone();
        let mut tx = Transition::new();
        if settle_due_rounds(&mut draft, now, &mut tx)? {
            self.commit(live, draft, tx)?;
        }
        Ok(())
    }

    fn commit(&self, live: &mut GroupRecord, draft: GroupRecord, tx: Transition) -> Result<()> {
        let check = ConservationCheck {
            before: live.balance_sheet()?,
            after: draft.balance_sheet()?,
            supplied_before: live.ledger.total_supplied,
            supplied_after: draft.ledger.total_supplied,
            flow: tx.flow(),
        };
        if let Err(err) = check.verify() {
            error!("{} transition discarded: {}", live.id(), err);
            return Err(err);
        }

        if !tx.transfers().is_empty() {
            if let Err(err) = self.settlement.apply(tx.transfers()) {
                warn!("{} settlement rejected: {}", live.id(), err);
                return Err(err);
            }
        }

        *live = draft;
        self.publish(tx.into_events());
        Ok(())
    }

    fn publish(&self, events: Vec<ChamaEvent>) {
        for event in &events {
            if let Some(metrics) = &self.metrics {
                metrics.observe(event);
            }
            self.events.publish(event);
        }
    }

    fn tracked<T>(&self, outcome: Result<T>) -> Result<T> {
        if let Err(err) = &outcome {
            if let Some(metrics) = &self.metrics {
                metrics.record_error(err);
            }
            if err.is_user_error() {
                debug!("intent rejected: {}", err);
            }
        }
        outcome
    }
}

/// Creator-authorized removal, shared by `kick_member` and dispute remedies
fn kick(
    record: &mut GroupRecord,
    caller: AccountId,
    target: AccountId,
    tx: &mut Transition,
) -> Result<Amount> {
    authorize(Operation::Kick, &AuthContext::new(record, caller))?;
    if caller == target {
        return Err(ChamaError::CannotKickSelf);
    }
    if !record.roster.is_active(&target) {
        return Err(ChamaError::NotAMember(target));
    }

    let refunded = record.remove_member(target, LeaveReason::Kicked, tx)?;
    record.reopen(tx);
    warn!(
        "{} kicked from {} by {}, refunded {}",
        target,
        record.id(),
        caller,
        refunded
    );
    Ok(refunded)
}
