//! # Settlement
//!
//! The engine never holds money itself. Each committed transition hands a
//! batch of transfers to a [`SettlementGateway`], which must apply the whole
//! batch or none of it. A rejected batch aborts the operation before any
//! state is swapped in.
//!
//! ```text
//!   member ──In──►  escrow (per asset)  ──Out──► member
//! ```

use chama_core::amount::{checked_add, checked_sub, Amount};
use chama_core::error::{ChamaError, Result};
use chama_core::types::{AccountId, SettlementAsset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Direction of a transfer relative to escrow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// From the account into escrow
    In,
    /// From escrow to the account
    Out,
}

/// One leg of a settlement batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub asset: SettlementAsset,
    pub account: AccountId,
    pub amount: Amount,
    pub direction: TransferDirection,
}

impl Transfer {
    pub fn incoming(asset: SettlementAsset, from: AccountId, amount: Amount) -> Self {
        Self {
            asset,
            account: from,
            amount,
            direction: TransferDirection::In,
        }
    }

    pub fn outgoing(asset: SettlementAsset, to: AccountId, amount: Amount) -> Self {
        Self {
            asset,
            account: to,
            amount,
            direction: TransferDirection::Out,
        }
    }
}

/// Applies transfer batches atomically
pub trait SettlementGateway: Send + Sync {
    /// Apply every transfer or none. Errors map to `SettlementFailed`.
    fn apply(&self, batch: &[Transfer]) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
struct Balances {
    accounts: HashMap<(SettlementAsset, AccountId), Amount>,
    escrow: HashMap<SettlementAsset, Amount>,
}

/// In-memory ledger used by tests and scenario replay
#[derive(Default)]
pub struct InMemorySettlement {
    balances: Mutex<Balances>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the system
    pub fn fund(&self, asset: &SettlementAsset, account: AccountId, amount: Amount) {
        let mut balances = self.balances.lock();
        let entry = balances
            .accounts
            .entry((asset.clone(), account))
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Spendable balance of an account
    pub fn balance(&self, asset: &SettlementAsset, account: &AccountId) -> Amount {
        self.balances
            .lock()
            .accounts
            .get(&(asset.clone(), *account))
            .copied()
            .unwrap_or(0)
    }

    /// Funds currently held in escrow for an asset
    pub fn escrow_balance(&self, asset: &SettlementAsset) -> Amount {
        self.balances
            .lock()
            .escrow
            .get(asset)
            .copied()
            .unwrap_or(0)
    }
}

impl SettlementGateway for InMemorySettlement {
    fn apply(&self, batch: &[Transfer]) -> Result<()> {
        let mut balances = self.balances.lock();
        let mut draft = balances.clone();

        for transfer in batch {
            let key = (transfer.asset.clone(), transfer.account);
            let account = draft.accounts.entry(key).or_insert(0);
            let escrow = draft.escrow.entry(transfer.asset.clone()).or_insert(0);

            match transfer.direction {
                TransferDirection::In => {
                    *account = checked_sub(*account, transfer.amount).map_err(|_| {
                        ChamaError::SettlementFailed(format!(
                            "{} cannot supply {} of {}",
                            transfer.account, transfer.amount, transfer.asset
                        ))
                    })?;
                    *escrow = checked_add(*escrow, transfer.amount)?;
                }
                TransferDirection::Out => {
                    *escrow = checked_sub(*escrow, transfer.amount).map_err(|_| {
                        ChamaError::SettlementFailed(format!(
                            "escrow cannot release {} of {}",
                            transfer.amount, transfer.asset
                        ))
                    })?;
                    *account = checked_add(*account, transfer.amount)?;
                }
            }
        }

        *balances = draft;
        Ok(())
    }
}
