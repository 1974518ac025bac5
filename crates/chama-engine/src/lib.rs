//! # Chama Engine
//!
//! Rotating savings group (ROSCA) engine. A fixed set of members each pay a
//! contribution every round, and one member takes the whole pot per round
//! until everyone has been paid once.
//!
//! ```text
//!   Recruiting ──(roster full)──► Waiting ──(grace / force start)──► Active
//!       ▲  │                        │  │                                │
//!       │  └──(cancel)──┐  (leave / kick)  (cancel)                     │
//!       │               ▼         │  │                          (last round)
//!       └─────────────────────────┘  └──────► Cancelled                 ▼
//!                                                                  Completed
//! ```
//!
//! Every money movement goes through a [`SettlementGateway`] in one
//! all-or-nothing batch per operation, after a conservation check proves
//! that escrow, payouts and refunds still add up to what members supplied.

pub mod config;
pub mod engine;
pub mod group;
pub mod lifecycle;
pub mod membership;
pub mod metrics;
pub mod round;
pub mod settlement;
pub mod store;
pub mod transition;

pub use config::{ConfigError, EngineConfig};
pub use engine::{ChamaEngine, NoRemedy, Remedy, RemedyPolicy};
pub use group::{Group, GroupDetails, GroupParams, GroupRecord};
pub use membership::Membership;
pub use metrics::EngineMetrics;
pub use round::{Round, RoundInfo};
pub use settlement::{InMemorySettlement, SettlementGateway, Transfer, TransferDirection};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{ChamaEngine, Remedy, RemedyPolicy};
    pub use crate::group::{GroupDetails, GroupParams};
    pub use crate::settlement::{InMemorySettlement, SettlementGateway};
    pub use chama_core::prelude::*;
}
