//! Prometheus metrics
//!
//! Counters are driven by committed events, so a rejected operation never
//! moves them. Rejections are counted separately by error code.

use chama_core::error::ChamaError;
use chama_core::event::ChamaEvent;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Engine metrics registered on a caller-supplied registry
#[derive(Clone)]
pub struct EngineMetrics {
    groups_created: IntCounter,
    members_joined: IntCounter,
    contributions: IntCounter,
    late_contributions: IntCounter,
    payouts: IntCounter,
    penalties: IntCounter,
    disputes_raised: IntCounter,
    votes_cast: IntCounter,
    accounting_violations: IntCounter,
    rejected_operations: IntCounterVec,
    active_groups: IntGauge,
}

impl EngineMetrics {
    /// Create and register every metric
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self {
            groups_created: IntCounter::new("chama_groups_created_total", "Groups created")?,
            members_joined: IntCounter::new("chama_members_joined_total", "Paid joins")?,
            contributions: IntCounter::new(
                "chama_contributions_total",
                "Contributions recorded",
            )?,
            late_contributions: IntCounter::new(
                "chama_late_contributions_total",
                "Contributions made inside the late window",
            )?,
            payouts: IntCounter::new("chama_payouts_total", "Round payouts distributed")?,
            penalties: IntCounter::new("chama_late_penalties_total", "Late penalties assessed")?,
            disputes_raised: IntCounter::new("chama_disputes_raised_total", "Disputes raised")?,
            votes_cast: IntCounter::new("chama_votes_cast_total", "Dispute votes cast")?,
            accounting_violations: IntCounter::new(
                "chama_accounting_violations_total",
                "Transitions discarded by the conservation check",
            )?,
            rejected_operations: IntCounterVec::new(
                Opts::new("chama_rejected_operations_total", "Rejected intents by error code"),
                &["code"],
            )?,
            active_groups: IntGauge::new("chama_active_groups", "Groups currently in rounds")?,
        };

        registry.register(Box::new(metrics.groups_created.clone()))?;
        registry.register(Box::new(metrics.members_joined.clone()))?;
        registry.register(Box::new(metrics.contributions.clone()))?;
        registry.register(Box::new(metrics.late_contributions.clone()))?;
        registry.register(Box::new(metrics.payouts.clone()))?;
        registry.register(Box::new(metrics.penalties.clone()))?;
        registry.register(Box::new(metrics.disputes_raised.clone()))?;
        registry.register(Box::new(metrics.votes_cast.clone()))?;
        registry.register(Box::new(metrics.accounting_violations.clone()))?;
        registry.register(Box::new(metrics.rejected_operations.clone()))?;
        registry.register(Box::new(metrics.active_groups.clone()))?;

        Ok(metrics)
    }

    /// Update counters from a committed event
    pub fn observe(&self, event: &ChamaEvent) {
        match event {
            ChamaEvent::Created { .. } => self.groups_created.inc(),
            ChamaEvent::Joined { .. } => self.members_joined.inc(),
            ChamaEvent::ContributionMade { late, .. } => {
                self.contributions.inc();
                if *late {
                    self.late_contributions.inc();
                }
            }
            ChamaEvent::PayoutDistributed { .. } => self.payouts.inc(),
            ChamaEvent::LatePenaltyAssessed { .. } => self.penalties.inc(),
            ChamaEvent::DisputeRaised { .. } => self.disputes_raised.inc(),
            ChamaEvent::VoteCast { .. } => self.votes_cast.inc(),
            ChamaEvent::GroupStarted { .. } => self.active_groups.inc(),
            ChamaEvent::GroupCompleted { .. } => self.active_groups.dec(),
            _ => {}
        }
    }

    /// Count a rejected intent
    pub fn record_error(&self, err: &ChamaError) {
        if err.is_fatal() {
            self.accounting_violations.inc();
        }
        self.rejected_operations
            .with_label_values(&[&err.code().to_string()])
            .inc();
    }

    pub fn active_groups(&self) -> i64 {
        self.active_groups.get()
    }
}

/// Render a registry in the Prometheus text format
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_core::types::{AccountId, GroupId};

    #[test]
    fn test_events_drive_counters() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new(&registry).unwrap();

        metrics.observe(&ChamaEvent::GroupStarted {
            group_id: GroupId(1),
            started_at: 0,
            first_deadline: 10,
        });
        metrics.observe(&ChamaEvent::ContributionMade {
            group_id: GroupId(1),
            member: AccountId::from_label("alice"),
            round: 1,
            amount: 10,
            late: true,
        });

        assert_eq!(metrics.active_groups(), 1);
        let text = render(&registry).unwrap();
        assert!(text.contains("chama_contributions_total 1"));
        assert!(text.contains("chama_late_contributions_total 1"));
    }

    #[test]
    fn test_errors_counted_by_code() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new(&registry).unwrap();

        metrics.record_error(&ChamaError::NotCreator);
        metrics.record_error(&ChamaError::AccountingInvariantViolation("pot".into()));

        let text = render(&registry).unwrap();
        assert!(text.contains("chama_accounting_violations_total 1"));
        assert!(text.contains("code=\"1102\""));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        EngineMetrics::new(&registry).unwrap();
        assert!(EngineMetrics::new(&registry).is_err());
    }
}
