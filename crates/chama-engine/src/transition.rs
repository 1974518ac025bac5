//! Side effects accumulated while an operation runs against a draft record.
//!
//! Nothing in a [`Transition`] reaches the outside world until the engine
//! has verified conservation and the settlement batch went through.

use crate::settlement::Transfer;
use chama_core::amount::{checked_add, Amount, FundsFlow};
use chama_core::error::Result;
use chama_core::event::ChamaEvent;
use chama_core::types::{AccountId, SettlementAsset};

#[derive(Debug, Default)]
pub struct Transition {
    events: Vec<ChamaEvent>,
    transfers: Vec<Transfer>,
    flow: FundsFlow,
}

impl Transition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for publication after commit
    pub fn emit(&mut self, event: ChamaEvent) {
        self.events.push(event);
    }

    /// Queue funds entering escrow
    pub fn receive(
        &mut self,
        asset: &SettlementAsset,
        from: AccountId,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.flow.supplied_in = checked_add(self.flow.supplied_in, amount)?;
        self.transfers
            .push(Transfer::incoming(asset.clone(), from, amount));
        Ok(())
    }

    /// Queue funds leaving escrow
    pub fn send(&mut self, asset: &SettlementAsset, to: AccountId, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.flow.transferred_out = checked_add(self.flow.transferred_out, amount)?;
        self.transfers.push(Transfer::outgoing(asset.clone(), to, amount));
        Ok(())
    }

    /// Nothing to commit
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.transfers.is_empty()
    }

    pub fn events(&self) -> &[ChamaEvent] {
        &self.events
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn flow(&self) -> FundsFlow {
        self.flow
    }

    pub fn into_events(self) -> Vec<ChamaEvent> {
        self.events
    }
}
