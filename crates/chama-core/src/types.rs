//! Core type definitions for the chama engine
//!
//! Identifiers, settlement asset references and the small enums that every
//! layer of the engine shares (group phase, deposit mode, payout order).

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Seconds since the Unix epoch
pub type Timestamp = i64;

/// A span of time in seconds
pub type Seconds = u64;

/// AccountId - participant identity resolved by the wallet layer
///
/// The engine never authenticates callers itself; it trusts the
/// `(AccountId, supplied_funds)` pair handed over by the identity provider.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId {
    id: [u8; 32],
}

impl AccountId {
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive a stable account id from a human label (BLAKE3 of the label)
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            id: *hash.as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&bytes);
        Ok(Self { id })
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccountId::from_hex(&s).map_err(de::Error::custom)
    }
}

/// GroupId - allocated by the group store, starting at 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// DisputeId - allocated by the dispute registry, starting at 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisputeId(pub u64);

impl fmt::Display for DisputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispute#{}", self.0)
    }
}

/// Asset in which a group settles contributions, deposits and payouts
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementAsset {
    /// The execution environment's native currency
    #[default]
    Native,
    /// A fungible token, referenced by its ledger identifier
    Token(String),
}

impl fmt::Display for SettlementAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(id) => write!(f, "token:{}", id),
        }
    }
}

/// How much a participant must supply to join
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositMode {
    /// contribution amount + security deposit
    #[default]
    Secured,
    /// contribution amount only; security deposit must be zero
    ContributionOnly,
}

/// Rule used to pick each round's recipient
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutOrder {
    /// Earliest eligible joiner first
    #[default]
    JoinOrder,
    /// BLAKE3 draw over (group id, round number, seed)
    SeededDraw { seed: u64 },
}

/// Group-level lifecycle phase
///
/// ```text
///  Recruiting ──full──► Waiting ──grace / force──► Active ──last payout──► Completed
///      ▲                  │
///      └───kick / leave───┘          (Recruiting | Waiting) ──cancel──► Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPhase {
    Recruiting,
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl GroupPhase {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Recruiting => "recruiting",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for GroupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a closed dispute vote
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// More support votes than dispute votes
    Upheld,
    /// More dispute votes than support votes
    Rejected,
    /// Equal tallies (including no votes at all)
    Tied,
}

/// Why a membership stopped being active
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// Member left voluntarily before the group locked
    Left,
    /// Creator removed the member
    Kicked,
    /// Pending membership dropped when the group filled
    Released,
}
