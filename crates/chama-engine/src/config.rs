//! Engine configuration types
//!
//! Loaded from an optional TOML file, then overridden by `CHAMA__`-prefixed
//! environment variables (`CHAMA__ROUNDS__LATE_PENALTY_BPS=500`). Every field
//! has a default, so an empty file is a valid configuration.

use chama_core::amount::{BasisPoints, BPS_DENOMINATOR};
use chama_core::error::ChamaError;
use chama_core::types::Seconds;
use chama_economics::constants::{
    DEFAULT_LATE_PENALTY_BPS, DEFAULT_LATE_WINDOW_SECS, DEFAULT_START_GRACE_SECS, MAX_MEMBERS,
    MIN_MEMBERS,
};
use chama_economics::penalty::LatePolicy;
use chama_governance::DisputeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete engine configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Group size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Round timing and late penalties
    #[serde(default)]
    pub rounds: RoundsConfig,

    /// Dispute voting
    #[serde(default)]
    pub disputes: DisputeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] ChamaError),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

impl EngineConfig {
    /// Load from `path` (if given and present) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("CHAMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: EngineConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject limits the engine cannot honor
    pub fn validate(&self) -> Result<(), ChamaError> {
        if self.limits.min_members < 2 {
            return Err(ChamaError::InvalidParameter(format!(
                "min_members must be at least 2, got {}",
                self.limits.min_members
            )));
        }
        if self.limits.min_members > self.limits.max_members {
            return Err(ChamaError::InvalidParameter(format!(
                "min_members {} exceeds max_members {}",
                self.limits.min_members, self.limits.max_members
            )));
        }
        for (name, secs) in [
            ("start_grace_secs", self.rounds.start_grace_secs),
            ("late_window_secs", self.rounds.late_window_secs),
            ("voting_window_secs", self.disputes.voting_window_secs),
        ] {
            if i64::try_from(secs).is_err() {
                return Err(ChamaError::InvalidParameter(format!(
                    "{} {} does not fit a timestamp offset",
                    name, secs
                )));
            }
        }
        if self.rounds.late_penalty_bps > BPS_DENOMINATOR {
            return Err(ChamaError::InvalidParameter(format!(
                "late_penalty_bps {} exceeds {}",
                self.rounds.late_penalty_bps, BPS_DENOMINATOR
            )));
        }
        Ok(())
    }

    /// Late policy applied to newly created groups
    pub fn late_policy(&self) -> Result<LatePolicy, ChamaError> {
        LatePolicy::new(self.rounds.late_window_secs, self.rounds.late_penalty_bps)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Group size limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Smallest member target a group may declare
    #[serde(default = "default_min_members")]
    pub min_members: u32,

    /// Largest member target a group may declare
    #[serde(default = "default_max_members")]
    pub max_members: u32,
}

fn default_min_members() -> u32 {
    MIN_MEMBERS
}

fn default_max_members() -> u32 {
    MAX_MEMBERS
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_members: default_min_members(),
            max_members: default_max_members(),
        }
    }
}

/// Round timing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundsConfig {
    /// Countdown from a full roster to auto-start
    #[serde(default = "default_start_grace")]
    pub start_grace_secs: Seconds,

    /// Contributions still accepted this long after a deadline
    #[serde(default = "default_late_window")]
    pub late_window_secs: Seconds,

    /// Charge for a missed round, in basis points of the contribution
    #[serde(default = "default_late_penalty_bps")]
    pub late_penalty_bps: BasisPoints,
}

fn default_start_grace() -> Seconds {
    DEFAULT_START_GRACE_SECS
}

fn default_late_window() -> Seconds {
    DEFAULT_LATE_WINDOW_SECS
}

fn default_late_penalty_bps() -> BasisPoints {
    DEFAULT_LATE_PENALTY_BPS
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            start_grace_secs: default_start_grace(),
            late_window_secs: default_late_window(),
            late_penalty_bps: default_late_penalty_bps(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("text" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
