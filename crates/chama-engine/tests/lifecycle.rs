//! Integration tests for the chama group lifecycle
//!
//! These tests drive the public engine API end to end: recruiting, the
//! start grace period, round resolution, penalties, disputes and the money
//! that moves through the settlement gateway along the way.

use chama_core::clock::ManualClock;
use chama_core::error::ChamaError;
use chama_core::event::{ChamaEvent, MemoryEventSink};
use chama_core::types::{
    AccountId, DepositMode, DisputeOutcome, GroupId, GroupPhase, LeaveReason, PayoutOrder,
    SettlementAsset,
};
use chama_engine::metrics::{render, EngineMetrics};
use chama_engine::{ChamaEngine, EngineConfig, GroupParams, InMemorySettlement};
use chama_governance::DisputeStatus;
use prometheus::Registry;
use std::sync::Arc;

const FUNDS: u128 = 10_000;

struct TestBed {
    engine: ChamaEngine,
    clock: Arc<ManualClock>,
    ledger: Arc<InMemorySettlement>,
    events: Arc<MemoryEventSink>,
}

impl TestBed {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(1_000));
        let ledger = Arc::new(InMemorySettlement::new());
        let events = Arc::new(MemoryEventSink::new());

        let mut config = EngineConfig::default();
        config.rounds.start_grace_secs = 100;
        config.rounds.late_window_secs = 50;
        config.rounds.late_penalty_bps = 1_000;

        let engine =
            ChamaEngine::new(config, clock.clone(), ledger.clone(), events.clone()).unwrap();
        Self {
            engine,
            clock,
            ledger,
            events,
        }
    }

    fn account(&self, label: &str) -> AccountId {
        let id = AccountId::from_label(label);
        if self.balance(&id) == 0 {
            self.ledger.fund(&SettlementAsset::Native, id, FUNDS);
        }
        id
    }

    fn balance(&self, id: &AccountId) -> u128 {
        self.ledger.balance(&SettlementAsset::Native, id)
    }

    fn escrow(&self) -> u128 {
        self.ledger.escrow_balance(&SettlementAsset::Native)
    }

    /// Create a group and have every listed account pay in, creator first
    fn full_group(&self, members: &[AccountId], order: PayoutOrder) -> GroupId {
        let group = self
            .engine
            .create_group(members[0], params(members.len() as u32, order))
            .unwrap();
        for member in members {
            self.engine.join_group(group, *member, 150).unwrap();
        }
        group
    }

    fn payouts(&self) -> Vec<(u32, AccountId, u128)> {
        self.events
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ChamaEvent::PayoutDistributed {
                    round,
                    recipient,
                    amount,
                    ..
                } => Some((round, recipient, amount)),
                _ => None,
            })
            .collect()
    }
}

fn params(target: u32, payout_order: PayoutOrder) -> GroupParams {
    GroupParams {
        settlement_asset: SettlementAsset::Native,
        contribution_amount: 100,
        security_deposit: 50,
        deposit_mode: DepositMode::Secured,
        round_duration: 1_000,
        member_target: target,
        payout_order,
    }
}

mod rounds_tests {
    use super::*;

    #[test]
    fn test_three_member_circle_pays_everyone_once() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob"), bed.account("carol")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);
        bed.engine.force_start(group, members[0]).unwrap();

        for round in 1..=3 {
            for member in &members {
                bed.engine.contribute(group, *member, 100).unwrap();
            }
            let info = bed.engine.get_round_info(group, round).unwrap();
            assert!(info.is_completed);
            assert_eq!(info.total_pot, 300);
        }

        let winners: Vec<AccountId> = bed.payouts().iter().map(|(_, who, _)| *who).collect();
        assert_eq!(winners, members.to_vec());
        assert!(bed.payouts().iter().all(|(_, _, amount)| *amount == 300));

        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(details.balance.paid_out, 900);
        assert_eq!(details.balance.refunded, 450);
        assert_eq!(bed.escrow(), 0);
        for member in &members {
            assert_eq!(bed.balance(member), FUNDS);
        }
    }

    #[test]
    fn test_contribution_guards() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);

        assert!(matches!(
            bed.engine.contribute(group, members[0], 100),
            Err(ChamaError::GroupNotActive(_))
        ));
        bed.engine.force_start(group, members[1]).unwrap();

        assert!(matches!(
            bed.engine.contribute(group, bed.account("outsider"), 100),
            Err(ChamaError::NotAMember(_))
        ));
        assert!(matches!(
            bed.engine.contribute(group, members[0], 99),
            Err(ChamaError::WrongAmount { .. })
        ));
        bed.engine.contribute(group, members[0], 100).unwrap();
        assert_eq!(
            bed.engine.contribute(group, members[0], 100),
            Err(ChamaError::AlreadyContributedThisRound { round: 1 })
        );
        assert!(bed.engine.has_contributed(group, members[0], 1).unwrap());
        assert!(!bed.engine.has_contributed(group, members[1], 1).unwrap());
        assert!(bed.engine.has_contributed(group, members[0], 7).is_err());
    }

    #[test]
    fn test_late_window_and_penalties() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);
        bed.engine.force_start(group, members[0]).unwrap();

        // Round 1: deadline 2_000, late window closes at 2_050
        bed.engine.contribute(group, members[0], 100).unwrap();
        bed.clock.set(2_010);
        bed.engine.contribute(group, members[1], 100).unwrap();
        let bob = bed.engine.get_membership(group, members[1]).unwrap().unwrap();
        assert_eq!(bob.late_count, 1);
        assert_eq!(bob.reliability, 0);

        // Round 2: nobody pays, the window closes at 3_050
        bed.clock.set(3_100);
        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(details.total_penalties, 20);

        let penalties = bed.engine.penalty_records(group).unwrap();
        assert_eq!(penalties.len(), 2);
        assert!(penalties.iter().all(|p| p.round == 2 && p.collected == 10));

        let round = bed.engine.get_round_info(group, 2).unwrap();
        assert_eq!(round.winner, Some(members[1]));
        assert_eq!(round.penalty_pool, 20);

        assert_eq!(bed.balance(&members[0]), FUNDS + 90);
        assert_eq!(bed.balance(&members[1]), FUNDS - 90);
        assert_eq!(bed.escrow(), 0);
    }

    #[test]
    fn test_seeded_draw_is_reproducible() {
        let run = || {
            let bed = TestBed::new();
            let members = [bed.account("a"), bed.account("b"), bed.account("c")];
            let group = bed.full_group(&members, PayoutOrder::SeededDraw { seed: 42 });
            bed.engine.force_start(group, members[0]).unwrap();
            for round in 1..=3 {
                for member in &members {
                    // A round closes as soon as everyone still owed a payout is in
                    if !bed.engine.get_round_info(group, round).unwrap().is_completed {
                        bed.engine.contribute(group, *member, 100).unwrap();
                    }
                }
            }
            bed.payouts()
                .into_iter()
                .map(|(_, who, _)| who)
                .collect::<Vec<_>>()
        };

        let first = run();
        assert_eq!(first.len(), 3);
        assert_eq!(first, run());

        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_kick_of_last_debtor_resolves_round() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);
        bed.engine.force_start(group, members[0]).unwrap();

        bed.engine.contribute(group, members[0], 100).unwrap();
        assert_eq!(
            bed.engine.kick_member(group, members[0], members[1]).unwrap(),
            150
        );

        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(bed.balance(&members[0]), FUNDS);
        assert_eq!(bed.balance(&members[1]), FUNDS);
        assert_eq!(bed.escrow(), 0);
    }

    #[test]
    fn test_round_closes_once_remaining_recipients_pay() {
        let bed = TestBed::new();
        let [alice, bob, carol] = [bed.account("alice"), bed.account("bob"), bed.account("carol")];
        let group = bed.full_group(&[alice, bob, carol], PayoutOrder::JoinOrder);
        bed.engine.force_start(group, alice).unwrap();

        for member in [alice, bob, carol] {
            bed.engine.contribute(group, member, 100).unwrap();
        }
        assert_eq!(bed.engine.get_round_info(group, 1).unwrap().winner, Some(alice));

        // Alice already won; bob and carol are all round 2 waits for
        bed.engine.contribute(group, bob, 100).unwrap();
        assert!(!bed.engine.get_round_info(group, 2).unwrap().is_completed);
        bed.engine.contribute(group, carol, 100).unwrap();

        let round = bed.engine.get_round_info(group, 2).unwrap();
        assert!(round.is_completed);
        assert_eq!(round.total_pot, 200);
        assert_eq!(round.winner, Some(bob));
        assert!(bed.engine.penalty_records(group).unwrap().is_empty());

        // Alice's payment now lands in round 3
        bed.engine.contribute(group, alice, 100).unwrap();
        assert!(bed.engine.has_contributed(group, alice, 3).unwrap());
        bed.engine.contribute(group, carol, 100).unwrap();

        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(bed.engine.get_round_info(group, 3).unwrap().winner, Some(carol));
        assert_eq!(bed.balance(&alice), FUNDS + 100);
        assert_eq!(bed.balance(&bob), FUNDS);
        assert_eq!(bed.balance(&carol), FUNDS - 100);
        assert_eq!(bed.escrow(), 0);
    }

    #[test]
    fn test_contribution_only_group_full_cycle() {
        let bed = TestBed::new();
        let [alice, bob] = [bed.account("alice"), bed.account("bob")];
        let group = bed
            .engine
            .create_group(
                alice,
                GroupParams {
                    security_deposit: 0,
                    deposit_mode: DepositMode::ContributionOnly,
                    ..params(2, PayoutOrder::JoinOrder)
                },
            )
            .unwrap();

        assert_eq!(bed.engine.get_required_deposit(group).unwrap(), 100);
        assert!(matches!(
            bed.engine.join_group(group, alice, 150),
            Err(ChamaError::WrongAmount { .. })
        ));
        bed.engine.join_group(group, alice, 100).unwrap();
        bed.engine.join_group(group, bob, 100).unwrap();
        assert_eq!(bed.escrow(), 200);
        bed.engine.force_start(group, alice).unwrap();

        // Round 1: bob misses it; his penalty comes out of the held contribution
        bed.engine.contribute(group, alice, 100).unwrap();
        bed.clock.set(2_100);
        let round = bed.engine.get_round_info(group, 1).unwrap();
        assert!(round.is_completed);
        assert_eq!(round.winner, Some(alice));
        assert_eq!(round.penalty_pool, 10);

        let penalties = bed.engine.penalty_records(group).unwrap();
        assert_eq!(penalties.len(), 1);
        assert_eq!(penalties[0].member, bob);
        assert_eq!(penalties[0].collected, 10);
        let membership = bed.engine.get_membership(group, bob).unwrap().unwrap();
        assert_eq!(membership.deposit.balance, 90);

        // Round 2: bob is the only one left to pay
        bed.engine.contribute(group, bob, 100).unwrap();
        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(details.total_penalties, 10);
        assert_eq!(details.balance.paid_out, 210);
        assert_eq!(details.balance.refunded, 190);

        assert_eq!(bed.balance(&alice), FUNDS + 10);
        assert_eq!(bed.balance(&bob), FUNDS - 10);
        assert_eq!(bed.escrow(), 0);
    }

    #[test]
    fn test_token_group_settles_in_token() {
        let bed = TestBed::new();
        let token = SettlementAsset::Token("KES".into());
        let members = [AccountId::from_label("wanjiru"), AccountId::from_label("otieno")];
        for member in &members {
            bed.ledger.fund(&token, *member, FUNDS);
        }
        let group = bed
            .engine
            .create_group(
                members[0],
                GroupParams {
                    settlement_asset: token.clone(),
                    ..params(2, PayoutOrder::JoinOrder)
                },
            )
            .unwrap();
        for member in &members {
            bed.engine.join_group(group, *member, 150).unwrap();
        }
        assert_eq!(bed.ledger.escrow_balance(&token), 300);
        assert_eq!(bed.escrow(), 0);

        bed.engine.force_start(group, members[1]).unwrap();
        for _ in 0..2 {
            for member in &members {
                bed.engine.contribute(group, *member, 100).unwrap();
            }
        }

        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(details.group.settlement_asset, token);
        assert_eq!(details.balance.paid_out, 400);
        assert_eq!(bed.ledger.escrow_balance(&token), 0);
        for member in &members {
            assert_eq!(bed.ledger.balance(&token, member), FUNDS);
            assert_eq!(bed.balance(member), 0);
        }
    }
}

mod membership_tests {
    use super::*;

    #[test]
    fn test_invalid_group_parameters() {
        let bed = TestBed::new();
        let alice = bed.account("alice");

        let mut bad = params(3, PayoutOrder::JoinOrder);
        bad.contribution_amount = 0;
        assert!(matches!(
            bed.engine.create_group(alice, bad),
            Err(ChamaError::InvalidParameter(_))
        ));
        assert!(bed
            .engine
            .create_group(alice, params(1, PayoutOrder::JoinOrder))
            .is_err());
        assert!(bed
            .engine
            .create_group(alice, params(51, PayoutOrder::JoinOrder))
            .is_err());
        assert_eq!(bed.engine.group_count(), 0);
    }

    #[test]
    fn test_join_guards() {
        let bed = TestBed::new();
        let alice = bed.account("alice");
        let bob = bed.account("bob");
        let carol = bed.account("carol");
        let group = bed
            .engine
            .create_group(alice, params(2, PayoutOrder::JoinOrder))
            .unwrap();

        assert!(matches!(
            bed.engine.join_group(GroupId(99), bob, 150),
            Err(ChamaError::GroupNotFound(_))
        ));
        assert_eq!(bed.engine.get_required_deposit(group).unwrap(), 150);

        bed.engine.join_group(group, bob, 150).unwrap();
        assert!(matches!(
            bed.engine.join_group(group, bob, 150),
            Err(ChamaError::AlreadyMember(_))
        ));

        bed.engine.set_group_status(group, alice, false).unwrap();
        assert!(matches!(
            bed.engine.join_group(group, carol, 150),
            Err(ChamaError::GroupNotJoinable(_))
        ));
        bed.engine.set_group_status(group, alice, true).unwrap();

        bed.engine.join_group(group, carol, 150).unwrap();
        assert!(matches!(
            bed.engine.join_group(group, bed.account("dave"), 150),
            Err(ChamaError::GroupFull { target: 2 })
        ));
    }

    #[test]
    fn test_filling_group_releases_unpaid_creator() {
        let bed = TestBed::new();
        let alice = bed.account("alice");
        let bob = bed.account("bob");
        let carol = bed.account("carol");
        let group = bed
            .engine
            .create_group(alice, params(2, PayoutOrder::JoinOrder))
            .unwrap();

        bed.engine.join_group(group, bob, 150).unwrap();
        bed.engine.join_group(group, carol, 150).unwrap();

        let released = bed.events.events().into_iter().any(|event| {
            event
                == ChamaEvent::Leave {
                    group_id: group,
                    member: alice,
                    reason: LeaveReason::Released,
                    refunded: 0,
                }
        });
        assert!(released);
        assert!(!bed.engine.get_membership(group, alice).unwrap().unwrap().active);

        // The creator keeps authority without a paid membership
        bed.engine.force_start(group, alice).unwrap();
        assert_eq!(
            bed.engine.get_group_details(group).unwrap().group.phase,
            GroupPhase::Active
        );
    }

    #[test]
    fn test_leave_reopens_waiting_group() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);
        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), Some(100));

        assert!(matches!(
            bed.engine.leave_group(group, members[0]),
            Err(ChamaError::NotAuthorized(_))
        ));
        assert_eq!(bed.engine.leave_group(group, members[1]).unwrap(), 150);

        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Recruiting);
        assert_eq!(details.time_until_start, None);
        assert_eq!(bed.balance(&members[1]), FUNDS);

        // Leaving is not kicking: the account may come back
        bed.engine.join_group(group, members[1], 150).unwrap();
        assert_eq!(
            bed.engine.get_group_details(group).unwrap().group.phase,
            GroupPhase::Waiting
        );
    }

    #[test]
    fn test_grace_period_auto_start() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);

        bed.clock.advance(99);
        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), Some(1));
        bed.clock.advance(1);

        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), None);
        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Active);
        assert_eq!(details.group.current_round, 1);
        assert_eq!(details.next_recipient, Some(members[0]));
    }

    #[test]
    fn test_paused_waiting_group_stops_counting_down() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);
        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), Some(100));

        bed.engine.set_group_status(group, members[0], false).unwrap();
        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), None);
        bed.clock.advance(500);
        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), None);
        let details = bed.engine.get_group_details(group).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Waiting);
        assert_eq!(details.time_until_start, None);

        // Resuming restarts the full countdown
        bed.engine.set_group_status(group, members[0], true).unwrap();
        assert_eq!(bed.engine.get_time_until_start(group).unwrap(), Some(100));
    }

    #[test]
    fn test_oversized_round_duration_is_rejected() {
        let bed = TestBed::new();
        let alice = bed.account("alice");
        let result = bed.engine.create_group(
            alice,
            GroupParams {
                round_duration: u64::MAX,
                ..params(2, PayoutOrder::JoinOrder)
            },
        );
        assert!(matches!(result, Err(ChamaError::InvalidParameter(_))));
        assert_eq!(bed.engine.group_count(), 0);
    }

    #[test]
    fn test_cancel_waiting_group() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob"), bed.account("carol")];
        let group = bed.full_group(&members, PayoutOrder::JoinOrder);

        bed.engine.cancel_group(group, members[0]).unwrap();
        assert_eq!(bed.escrow(), 0);
        for member in &members {
            assert_eq!(bed.balance(member), FUNDS);
        }
        assert!(matches!(
            bed.engine.force_start(group, members[0]),
            Err(ChamaError::InvalidPhaseForOperation { .. })
        ));
        assert!(matches!(
            bed.engine.cancel_group(group, members[0]),
            Err(ChamaError::InvalidPhaseForOperation { .. })
        ));
    }

    #[test]
    fn test_member_groups_index() {
        let bed = TestBed::new();
        let alice = bed.account("alice");
        let bob = bed.account("bob");
        let first = bed
            .engine
            .create_group(alice, params(3, PayoutOrder::JoinOrder))
            .unwrap();
        let second = bed
            .engine
            .create_group(bob, params(3, PayoutOrder::JoinOrder))
            .unwrap();
        bed.engine.join_group(second, alice, 150).unwrap();

        assert_eq!(bed.engine.member_groups(&alice), vec![first, second]);
        assert_eq!(bed.engine.member_groups(&bob), vec![second]);
    }
}

mod dispute_tests {
    use super::*;

    #[test]
    fn test_dispute_vote_and_resolution() {
        let bed = TestBed::new();
        let members = [bed.account("alice"), bed.account("bob"), bed.account("carol")];
        let group = bed
            .engine
            .create_group(members[0], params(4, PayoutOrder::JoinOrder))
            .unwrap();
        for member in &members {
            bed.engine.join_group(group, *member, 150).unwrap();
        }

        assert!(matches!(
            bed.engine
                .raise_dispute(group, bed.account("outsider"), "late".into(), None),
            Err(ChamaError::NotAuthorized(_))
        ));
        let dispute = bed
            .engine
            .raise_dispute(group, members[1], "carol is late".into(), Some("ledger".into()))
            .unwrap();
        assert_eq!(bed.engine.group_disputes(group), vec![dispute]);

        bed.engine
            .cast_vote(dispute, members[0], true, Some("agreed".into()))
            .unwrap();
        bed.engine.cast_vote(dispute, members[1], true, None).unwrap();
        bed.engine.cast_vote(dispute, members[2], false, None).unwrap();
        assert!(matches!(
            bed.engine.cast_vote(dispute, members[0], false, None),
            Err(ChamaError::AlreadyVoted(_))
        ));

        let window = bed.engine.config().disputes.voting_window_secs;
        bed.clock.advance(window);

        assert!(matches!(
            bed.engine.cast_vote(dispute, members[2], true, None),
            Err(ChamaError::VotingClosed(_))
        ));
        let resolved = bed.engine.get_dispute(dispute).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(resolved.outcome, Some(DisputeOutcome::Upheld));
        assert_eq!((resolved.votes_support, resolved.votes_dispute), (2, 1));

        let resolutions = bed
            .events
            .events()
            .into_iter()
            .filter(|event| matches!(event, ChamaEvent::DisputeResolved { .. }))
            .count();
        assert_eq!(resolutions, 1);
    }

    #[test]
    fn test_unknown_dispute() {
        let bed = TestBed::new();
        assert!(matches!(
            bed.engine.resolve_dispute(chama_core::types::DisputeId(3)),
            Err(ChamaError::DisputeNotFound(_))
        ));
    }
}

mod metrics_tests {
    use super::*;

    #[test]
    fn test_metrics_follow_committed_events() {
        let registry = Registry::new();
        let clock = Arc::new(ManualClock::new(0));
        let ledger = Arc::new(InMemorySettlement::new());
        let engine = ChamaEngine::new(
            EngineConfig::default(),
            clock,
            ledger.clone(),
            Arc::new(MemoryEventSink::new()),
        )
        .unwrap()
        .with_metrics(EngineMetrics::new(&registry).unwrap());

        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        for id in [alice, bob] {
            ledger.fund(&SettlementAsset::Native, id, FUNDS);
        }
        let group = engine
            .create_group(alice, params(2, PayoutOrder::JoinOrder))
            .unwrap();
        engine.join_group(group, alice, 150).unwrap();
        engine.join_group(group, bob, 150).unwrap();
        assert!(engine.join_group(group, bob, 150).is_err());
        engine.force_start(group, alice).unwrap();
        for _ in 0..2 {
            engine.contribute(group, alice, 100).unwrap();
            engine.contribute(group, bob, 100).unwrap();
        }

        let text = render(&registry).unwrap();
        assert!(text.contains("chama_payouts_total 2"));
        assert!(text.contains("chama_members_joined_total 2"));
        assert!(text.contains("chama_active_groups 0"));
        assert!(text.contains("code=\"1303\""));
    }
}
