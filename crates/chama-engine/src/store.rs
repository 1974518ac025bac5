//! Group arena and member index
//!
//! Groups live in an append-only arena; a group's id is its position plus
//! one. The arena lock is held only long enough to clone an `Arc`, so work
//! on different groups never contends.

use crate::group::GroupRecord;
use chama_core::error::{ChamaError, Result};
use chama_core::types::{AccountId, GroupId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Shared handle to one group's record
pub type GroupHandle = Arc<Mutex<GroupRecord>>;

pub struct GroupStore {
    groups: RwLock<Vec<GroupHandle>>,
    member_index: RwLock<HashMap<AccountId, BTreeSet<GroupId>>>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(Vec::new()),
            member_index: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate the next id and insert the record `build` produces for it
    pub fn insert<F>(&self, build: F) -> Result<(GroupId, GroupHandle)>
    where
        F: FnOnce(GroupId) -> Result<GroupRecord>,
    {
        let mut groups = self.groups.write();
        let id = GroupId(groups.len() as u64 + 1);
        let handle = Arc::new(Mutex::new(build(id)?));
        groups.push(handle.clone());
        Ok((id, handle))
    }

    pub fn get(&self, id: GroupId) -> Result<GroupHandle> {
        let index = id.0.checked_sub(1).ok_or(ChamaError::GroupNotFound(id))? as usize;
        self.groups
            .read()
            .get(index)
            .cloned()
            .ok_or(ChamaError::GroupNotFound(id))
    }

    pub fn count(&self) -> usize {
        self.groups.read().len()
    }

    /// Remember that an account has a membership in a group
    pub fn index_member(&self, account: AccountId, group: GroupId) {
        self.member_index
            .write()
            .entry(account)
            .or_default()
            .insert(group);
    }

    /// Groups an account has ever held a membership in, ascending by id
    pub fn groups_of(&self, account: &AccountId) -> Vec<GroupId> {
        self.member_index
            .read()
            .get(account)
            .map(|groups| groups.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for GroupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupParams;
    use chama_core::types::{DepositMode, PayoutOrder, SettlementAsset};
    use chama_economics::penalty::LatePolicy;

    fn build(id: GroupId) -> Result<GroupRecord> {
        GroupRecord::new(
            id,
            AccountId::from_label("creator"),
            GroupParams {
                settlement_asset: SettlementAsset::Native,
                contribution_amount: 10,
                security_deposit: 0,
                deposit_mode: DepositMode::Secured,
                round_duration: 60,
                member_target: 2,
                payout_order: PayoutOrder::JoinOrder,
            },
            LatePolicy::new(0, 0)?,
            0,
            0,
        )
    }

    #[test]
    fn test_ids_are_sequential() {
        let store = GroupStore::new();
        let (first, _) = store.insert(build).unwrap();
        let (second, handle) = store.insert(build).unwrap();

        assert_eq!(first, GroupId(1));
        assert_eq!(second, GroupId(2));
        assert_eq!(handle.lock().id(), GroupId(2));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_failed_build_allocates_nothing() {
        let store = GroupStore::new();
        let result = store.insert(|_| Err(ChamaError::InvalidParameter("x".into())));
        assert!(result.is_err());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_lookup_and_index() {
        let store = GroupStore::new();
        let (id, _) = store.insert(build).unwrap();
        assert!(store.get(id).is_ok());
        assert!(matches!(
            store.get(GroupId(0)),
            Err(ChamaError::GroupNotFound(_))
        ));
        assert!(store.get(GroupId(9)).is_err());

        let alice = AccountId::from_label("alice");
        store.index_member(alice, GroupId(3));
        store.index_member(alice, id);
        store.index_member(alice, id);
        assert_eq!(store.groups_of(&alice), vec![id, GroupId(3)]);
        assert!(store.groups_of(&AccountId::from_label("bob")).is_empty());
    }
}
