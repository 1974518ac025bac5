//! # Accounting Primitives
//!
//! Monetary values are unsigned integers in the smallest settlement unit.
//! Rates are basis points. There is no floating point anywhere in the
//! accounting path.
//!
//! ## Conservation
//!
//! Every group keeps a [`BalanceSheet`] derived from its state:
//!
//! ```text
//!   deposits_held + pots_escrowed + paid_out + refunded == total_supplied
//!   └──── holdings (still in escrow) ────┘   └─ left escrow ─┘
//! ```
//!
//! and every operation is checked against the funds it moved:
//!
//! ```text
//!   holdings_after + transferred_out == holdings_before + supplied_in
//! ```

use crate::error::{ChamaError, Result};
use serde::{Deserialize, Serialize};

/// Amount in the smallest settlement unit
pub type Amount = u128;

/// Rate in basis points (10_000 = 100%)
pub type BasisPoints = u32;

/// 100% in basis points
pub const BPS_DENOMINATOR: BasisPoints = 10_000;

/// `amount * bps / 10_000`, rounded down
pub fn apply_bps(amount: Amount, bps: BasisPoints) -> Result<Amount> {
    amount
        .checked_mul(bps as Amount)
        .map(|v| v / BPS_DENOMINATOR as Amount)
        .ok_or_else(|| overflow("basis point product"))
}

/// Checked addition, overflow is an accounting defect
pub fn checked_add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b).ok_or_else(|| overflow("addition"))
}

/// Checked subtraction, underflow is an accounting defect
pub fn checked_sub(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_sub(b).ok_or_else(|| {
        ChamaError::AccountingInvariantViolation(format!("underflow: {} - {}", a, b))
    })
}

/// Checked sum over an iterator
pub fn checked_sum<I: IntoIterator<Item = Amount>>(values: I) -> Result<Amount> {
    values.into_iter().try_fold(0, checked_add)
}

fn overflow(what: &str) -> ChamaError {
    ChamaError::AccountingInvariantViolation(format!("overflow in {}", what))
}

/// Snapshot of where a group's funds currently are
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    /// Refundable deposits still held for members
    pub deposits_held: Amount,
    /// Contributions and penalties in open rounds
    pub pots_escrowed: Amount,
    /// Cumulative payouts to round winners
    pub paid_out: Amount,
    /// Cumulative refunds (deposits, returned contributions)
    pub refunded: Amount,
}

impl BalanceSheet {
    /// Funds still in escrow
    pub fn holdings(&self) -> Result<Amount> {
        checked_add(self.deposits_held, self.pots_escrowed)
    }

    /// Funds ever supplied, as accounted for by this sheet
    pub fn total(&self) -> Result<Amount> {
        checked_sum([
            self.deposits_held,
            self.pots_escrowed,
            self.paid_out,
            self.refunded,
        ])
    }
}

/// Funds that crossed the escrow boundary during one operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsFlow {
    pub supplied_in: Amount,
    pub transferred_out: Amount,
}

/// Conservation check for a single state transition
#[derive(Clone, Copy, Debug)]
pub struct ConservationCheck {
    /// Sheet derived from the state before the operation
    pub before: BalanceSheet,
    /// Sheet derived from the state after the operation
    pub after: BalanceSheet,
    /// Running total of supplied funds before the operation
    pub supplied_before: Amount,
    /// Running total of supplied funds after the operation
    pub supplied_after: Amount,
    /// Funds moved by the operation's settlement batch
    pub flow: FundsFlow,
}

impl ConservationCheck {
    /// Verify that no value was created or destroyed
    pub fn verify(&self) -> Result<()> {
        let before_total = self.before.total()?;
        if before_total != self.supplied_before {
            return Err(ChamaError::AccountingInvariantViolation(format!(
                "prior sheet accounts for {} but {} was supplied",
                before_total, self.supplied_before
            )));
        }

        let expected_supplied = checked_add(self.supplied_before, self.flow.supplied_in)?;
        if self.supplied_after != expected_supplied {
            return Err(ChamaError::AccountingInvariantViolation(format!(
                "supplied total moved to {} but inflow implies {}",
                self.supplied_after, expected_supplied
            )));
        }

        let after_total = self.after.total()?;
        if after_total != self.supplied_after {
            return Err(ChamaError::AccountingInvariantViolation(format!(
                "sheet accounts for {} but {} was supplied",
                after_total, self.supplied_after
            )));
        }

        let lhs = checked_add(self.after.holdings()?, self.flow.transferred_out)?;
        let rhs = checked_add(self.before.holdings()?, self.flow.supplied_in)?;
        if lhs != rhs {
            return Err(ChamaError::AccountingInvariantViolation(format!(
                "escrow holdings moved by {} in / {} out but changed from {} to {}",
                self.flow.supplied_in,
                self.flow.transferred_out,
                self.before.holdings()?,
                self.after.holdings()?
            )));
        }

        Ok(())
    }
}
