//! # Security Deposits
//!
//! Every membership carries a deposit account. It is funded on join,
//! debited by late penalties, and refunded when the member leaves, is
//! kicked, or the group completes.
//!
//! | Mode | Required on join |
//! |------|------------------|
//! | Secured | contribution amount + security deposit |
//! | ContributionOnly | contribution amount |
//!
//! ```text
//!   None ──enroll──► Pending ──pay──► Paid ──refund──► Refunded
//!                       │
//!                       └──release──► None
//! ```

use chama_core::amount::{checked_add, Amount};
use chama_core::error::ChamaError;
use chama_core::types::{DepositMode, Timestamp};
use serde::{Deserialize, Serialize};

/// Deposit state of a membership
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Nothing owed and nothing held
    #[default]
    None,
    /// Enrolled but not yet paid
    Pending,
    /// Held in escrow
    Paid,
    /// Returned to the member
    Refunded,
}

/// Amount a participant must supply to join a group
pub fn required_deposit(
    mode: DepositMode,
    contribution_amount: Amount,
    security_deposit: Amount,
) -> Result<Amount, DepositError> {
    match mode {
        DepositMode::Secured => checked_add(contribution_amount, security_deposit)
            .map_err(|_| DepositError::Overflow),
        DepositMode::ContributionOnly => Ok(contribution_amount),
    }
}

/// Deposit held for one membership
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAccount {
    /// Current status
    pub status: DepositStatus,

    /// Amount required to move from Pending to Paid
    pub required: Amount,

    /// Amount currently held (after penalties)
    pub balance: Amount,

    /// When the deposit was paid
    pub paid_at: Option<Timestamp>,

    /// Total debited by late penalties
    pub penalties_paid: Amount,

    /// Total returned to the member
    pub refunded: Amount,
}

impl DepositAccount {
    /// Enroll with a deposit still owed
    pub fn pending(required: Amount) -> Self {
        Self {
            status: DepositStatus::Pending,
            required,
            ..Default::default()
        }
    }

    /// Held in escrow right now
    pub fn is_paid(&self) -> bool {
        self.status == DepositStatus::Paid
    }

    /// Balance counted toward escrow holdings
    pub fn held(&self) -> Amount {
        if self.is_paid() {
            self.balance
        } else {
            0
        }
    }

    /// Fund the deposit with exactly the required amount
    pub fn pay(&mut self, supplied: Amount, timestamp: Timestamp) -> Result<(), DepositError> {
        match self.status {
            DepositStatus::Paid => return Err(DepositError::AlreadyPaid),
            DepositStatus::None | DepositStatus::Pending | DepositStatus::Refunded => {}
        }

        if supplied != self.required {
            return Err(DepositError::WrongAmount {
                expected: self.required,
                supplied,
            });
        }

        self.status = DepositStatus::Paid;
        self.balance = supplied;
        self.paid_at = Some(timestamp);
        Ok(())
    }

    /// Debit a penalty, capped at the held balance. Returns the amount taken.
    pub fn debit_penalty(&mut self, penalty: Amount) -> Amount {
        if !self.is_paid() {
            return 0;
        }
        let taken = penalty.min(self.balance);
        self.balance -= taken;
        self.penalties_paid += taken;
        taken
    }

    /// Return the remaining balance. Returns the refunded amount.
    pub fn refund(&mut self) -> Result<Amount, DepositError> {
        if !self.is_paid() {
            return Err(DepositError::NotPaid);
        }
        let amount = self.balance;
        self.balance = 0;
        self.refunded += amount;
        self.status = DepositStatus::Refunded;
        Ok(amount)
    }

    /// Drop an unpaid enrollment
    pub fn release(&mut self) {
        if self.status == DepositStatus::Pending {
            self.status = DepositStatus::None;
        }
    }
}

/// Deposit errors
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DepositError {
    #[error("Wrong deposit amount: expected {expected}, supplied {supplied}")]
    WrongAmount { expected: Amount, supplied: Amount },

    #[error("Deposit already paid")]
    AlreadyPaid,

    #[error("Deposit not paid")]
    NotPaid,

    #[error("Deposit amount overflows")]
    Overflow,
}

impl From<DepositError> for ChamaError {
    fn from(err: DepositError) -> Self {
        match err {
            DepositError::WrongAmount { expected, supplied } => {
                ChamaError::WrongAmount { expected, supplied }
            }
            DepositError::Overflow => ChamaError::InvalidParameter(err.to_string()),
            DepositError::AlreadyPaid | DepositError::NotPaid => {
                ChamaError::AccountingInvariantViolation(err.to_string())
            }
        }
    }
}
