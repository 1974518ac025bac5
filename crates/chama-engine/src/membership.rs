//! # Membership Ledger
//!
//! One [`Membership`] per (group, participant). Memberships are never
//! removed, only deactivated, so join history and penalty records stay
//! attached to the account that produced them.
//!
//! | State | `active` | Deposit | Counts toward target |
//! |-------|----------|---------|----------------------|
//! | Enrolled (creator) | no | Pending | no |
//! | Joined | yes | Paid | yes |
//! | Left / kicked | no | Refunded | no |
//! | Released | no | None | no |

use chama_core::amount::{checked_sum, Amount};
use chama_core::error::Result;
use chama_core::types::{AccountId, LeaveReason, Timestamp};
use chama_economics::deposit::{DepositAccount, DepositError, DepositStatus};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A participant's standing in one group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Participant account
    pub address: AccountId,

    /// When the membership record was created
    pub enrolled_at: Timestamp,

    /// When the deposit was last paid
    pub joined_at: Option<Timestamp>,

    /// Position in payment order; lower joined earlier
    pub join_seq: u64,

    /// Security deposit held for this membership
    pub deposit: DepositAccount,

    /// On-time contributions
    pub reliability: u32,

    /// Contributions made inside the late window
    pub late_count: u32,

    /// Paid and not removed
    pub active: bool,

    /// Already won a round
    pub has_received_payout: bool,

    /// Round this member won
    pub payout_round: Option<u32>,

    /// Why the membership stopped being active
    pub exit: Option<LeaveReason>,
}

impl Membership {
    fn enrolled(address: AccountId, required: Amount, now: Timestamp) -> Self {
        Self {
            address,
            enrolled_at: now,
            joined_at: None,
            join_seq: 0,
            deposit: DepositAccount::pending(required),
            reliability: 0,
            late_count: 0,
            active: false,
            has_received_payout: false,
            payout_round: None,
            exit: None,
        }
    }

    pub fn deposit_status(&self) -> DepositStatus {
        self.deposit.status
    }

    pub fn deposit_balance(&self) -> Amount {
        self.deposit.balance
    }

    pub fn penalties_paid(&self) -> Amount {
        self.deposit.penalties_paid
    }

    pub fn was_kicked(&self) -> bool {
        self.exit == Some(LeaveReason::Kicked)
    }

    /// Active and still waiting for a payout
    pub fn is_eligible_for_payout(&self) -> bool {
        self.active && !self.has_received_payout
    }
}

/// All memberships of one group, in enrollment order
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemberRoster {
    members: IndexMap<AccountId, Membership>,
    next_seq: u64,
}

impl MemberRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &AccountId) -> Option<&Membership> {
        self.members.get(address)
    }

    pub fn get_mut(&mut self, address: &AccountId) -> Option<&mut Membership> {
        self.members.get_mut(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Membership> {
        self.members.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Membership> {
        self.members.values_mut()
    }

    pub fn is_active(&self, address: &AccountId) -> bool {
        self.members.get(address).map_or(false, |m| m.active)
    }

    /// Paid, active members
    pub fn member_count(&self) -> u32 {
        self.members.values().filter(|m| m.active).count() as u32
    }

    /// Record an unpaid enrollment (the creator at group creation)
    pub fn enroll(&mut self, address: AccountId, required: Amount, now: Timestamp) {
        self.members
            .entry(address)
            .or_insert_with(|| Membership::enrolled(address, required, now));
    }

    /// Pay the deposit and activate the membership. Previous exits other
    /// than a kick are cleared; the caller rejects kicked accounts first.
    pub fn admit(
        &mut self,
        address: AccountId,
        required: Amount,
        supplied: Amount,
        now: Timestamp,
    ) -> std::result::Result<&Membership, DepositError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let member = self
            .members
            .entry(address)
            .or_insert_with(|| Membership::enrolled(address, required, now));

        if member.deposit.status != DepositStatus::Pending || member.deposit.required != required {
            member.deposit = DepositAccount::pending(required);
        }
        member.deposit.pay(supplied, now)?;
        member.active = true;
        member.joined_at = Some(now);
        member.join_seq = seq;
        member.exit = None;
        Ok(member)
    }

    /// Deactivate a member and return the refundable deposit balance
    pub fn remove(&mut self, address: &AccountId, reason: LeaveReason) -> Result<Amount> {
        let Some(member) = self.members.get_mut(address) else {
            return Ok(0);
        };
        let refunded = if member.deposit.is_paid() {
            member.deposit.refund()?
        } else {
            member.deposit.release();
            0
        };
        member.active = false;
        member.exit = Some(reason);
        Ok(refunded)
    }

    /// Drop every unpaid enrollment. Returns the released accounts.
    pub fn release_pending(&mut self) -> Vec<AccountId> {
        let mut released = Vec::new();
        for member in self.members.values_mut() {
            if member.deposit.status == DepositStatus::Pending {
                member.deposit.release();
                member.exit = Some(LeaveReason::Released);
                released.push(member.address);
            }
        }
        released
    }

    /// Active members in join order
    pub fn active_ids(&self) -> Vec<AccountId> {
        self.sorted_ids(|m| m.active)
    }

    /// Active members without a payout, in join order
    pub fn eligible_ids(&self) -> Vec<AccountId> {
        self.sorted_ids(Membership::is_eligible_for_payout)
    }

    fn sorted_ids(&self, keep: impl Fn(&Membership) -> bool) -> Vec<AccountId> {
        let mut members: Vec<&Membership> = self.members.values().filter(|m| keep(*m)).collect();
        members.sort_by_key(|m| m.join_seq);
        members.into_iter().map(|m| m.address).collect()
    }

    /// Deposits currently in escrow
    pub fn deposits_held(&self) -> Result<Amount> {
        checked_sum(self.members.values().map(|m| m.deposit.held()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    #[test]
    fn test_creator_enrolls_pending_then_pays() {
        let mut roster = MemberRoster::new();
        let creator = account("creator");

        roster.enroll(creator, 150, 0);
        assert_eq!(roster.member_count(), 0);
        assert_eq!(
            roster.get(&creator).unwrap().deposit_status(),
            DepositStatus::Pending
        );

        roster.admit(creator, 150, 150, 5).unwrap();
        assert_eq!(roster.member_count(), 1);
        assert_eq!(roster.deposits_held().unwrap(), 150);
    }

    #[test]
    fn test_join_order_follows_payment_order() {
        let mut roster = MemberRoster::new();
        let creator = account("creator");
        let bob = account("bob");

        roster.enroll(creator, 100, 0);
        roster.admit(bob, 100, 100, 1).unwrap();
        roster.admit(creator, 100, 100, 2).unwrap();

        assert_eq!(roster.active_ids(), vec![bob, creator]);
    }

    #[test]
    fn test_release_pending() {
        let mut roster = MemberRoster::new();
        let creator = account("creator");
        let bob = account("bob");

        roster.enroll(creator, 100, 0);
        roster.admit(bob, 100, 100, 1).unwrap();

        assert_eq!(roster.release_pending(), vec![creator]);
        let released = roster.get(&creator).unwrap();
        assert_eq!(released.deposit_status(), DepositStatus::None);
        assert_eq!(released.exit, Some(LeaveReason::Released));
        assert!(roster.release_pending().is_empty());
    }

    #[test]
    fn test_remove_refunds_and_allows_rejoin() {
        let mut roster = MemberRoster::new();
        let bob = account("bob");

        roster.admit(bob, 100, 100, 1).unwrap();
        assert_eq!(roster.remove(&bob, LeaveReason::Left).unwrap(), 100);
        assert!(!roster.is_active(&bob));
        assert_eq!(roster.deposits_held().unwrap(), 0);

        roster.admit(bob, 100, 100, 9).unwrap();
        let member = roster.get(&bob).unwrap();
        assert!(member.active);
        assert_eq!(member.exit, None);
        assert_eq!(member.join_seq, 1);
    }

    #[test]
    fn test_eligible_excludes_winners() {
        let mut roster = MemberRoster::new();
        let alice = account("alice");
        let bob = account("bob");

        roster.admit(alice, 10, 10, 0).unwrap();
        roster.admit(bob, 10, 10, 0).unwrap();
        roster.get_mut(&alice).unwrap().has_received_payout = true;

        assert_eq!(roster.eligible_ids(), vec![bob]);
    }
}
