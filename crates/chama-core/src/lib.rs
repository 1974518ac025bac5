//! # Chama Core
//!
//! Shared building blocks for the chama (ROSCA) engine:
//! - `types` - account/group/dispute identifiers and lifecycle enums
//! - `amount` - integer money, basis points and conservation checks
//! - `clock` - injectable time sources for lazy deadline evaluation
//! - `event` - committed events and the sinks that observe them
//! - `error` - the single error enum every operation returns
//!
//! ## Architecture
//!
//! ```text
//!   chama-cli ──► chama-engine ──┬──► chama-economics ──┐
//!                                ├──► chama-governance ─┼──► chama-core
//!                                └──────────────────────┘
//! ```

pub mod amount;
pub mod clock;
pub mod error;
pub mod event;
pub mod types;

pub use amount::*;
pub use clock::*;
pub use error::*;
pub use event::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::amount::{Amount, BasisPoints, BalanceSheet};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{ChamaError, Result};
    pub use crate::event::{ChamaEvent, EventSink};
    pub use crate::types::*;
}
