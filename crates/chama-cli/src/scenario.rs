//! Scenario replay
//!
//! A scenario is a list of intents run in order against a manual clock and
//! in-memory settlement. Accounts are named by label; the label's BLAKE3
//! hash is the account id the engine sees.

use anyhow::{anyhow, Context};
use chama_core::clock::ManualClock;
use chama_core::event::{ChamaEvent, MemoryEventSink};
use chama_core::types::{AccountId, DepositMode, DisputeId, GroupId, PayoutOrder, SettlementAsset};
use chama_engine::{ChamaEngine, EngineConfig, EngineMetrics, GroupParams, InMemorySettlement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Scenario file contents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Clock value before the first step (Unix seconds)
    #[serde(default)]
    pub start_time: i64,

    /// Engine configuration; the loaded configuration is used when absent
    #[serde(default)]
    pub engine: Option<EngineConfig>,

    /// Wallets funded before replay
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,

    /// Intents, in order
    pub steps: Vec<Step>,
}

/// Funded wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSpec {
    pub label: String,
    pub funds: u64,
}

/// Group creation arguments as written in a scenario
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupSpec {
    pub contribution: u64,
    #[serde(default)]
    pub security_deposit: u64,
    #[serde(default)]
    pub deposit_mode: DepositMode,
    pub round_duration: u64,
    pub members: u32,
    /// Seeded draw instead of join order
    #[serde(default)]
    pub seed: Option<u64>,
    /// Token id; native currency when absent
    #[serde(default)]
    pub token: Option<String>,
}

impl GroupSpec {
    fn params(&self) -> GroupParams {
        GroupParams {
            settlement_asset: self
                .token
                .clone()
                .map_or(SettlementAsset::Native, SettlementAsset::Token),
            contribution_amount: u128::from(self.contribution),
            security_deposit: u128::from(self.security_deposit),
            deposit_mode: self.deposit_mode,
            round_duration: self.round_duration,
            member_target: self.members,
            payout_order: self
                .seed
                .map_or(PayoutOrder::JoinOrder, |seed| PayoutOrder::SeededDraw { seed }),
        }
    }
}

/// One scenario intent
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    CreateGroup { creator: String, params: GroupSpec },
    Join { group: u64, member: String, amount: u64 },
    Leave { group: u64, member: String },
    Kick { group: u64, by: String, member: String },
    SetStatus { group: u64, by: String, active: bool },
    TransferCreator { group: u64, by: String, to: String },
    Cancel { group: u64, by: String },
    ForceStart { group: u64, by: String },
    Contribute { group: u64, member: String, amount: u64 },
    RaiseDispute {
        group: u64,
        by: String,
        description: String,
        #[serde(default)]
        evidence: Option<String>,
    },
    Vote {
        dispute: u64,
        by: String,
        support: bool,
        #[serde(default)]
        comment: Option<String>,
    },
    ResolveDispute { dispute: u64 },
    Advance { secs: u64 },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGroup { .. } => "create_group",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Kick { .. } => "kick",
            Self::SetStatus { .. } => "set_status",
            Self::TransferCreator { .. } => "transfer_creator",
            Self::Cancel { .. } => "cancel",
            Self::ForceStart { .. } => "force_start",
            Self::Contribute { .. } => "contribute",
            Self::RaiseDispute { .. } => "raise_dispute",
            Self::Vote { .. } => "vote",
            Self::ResolveDispute { .. } => "resolve_dispute",
            Self::Advance { .. } => "advance",
        }
    }
}

impl Scenario {
    /// Parse a `.json` or `.toml` scenario file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }
}

/// Every asset a scenario's groups settle in
fn scenario_assets(scenario: &Scenario) -> Vec<SettlementAsset> {
    let mut assets = vec![SettlementAsset::Native];
    for step in &scenario.steps {
        if let Step::CreateGroup { params, .. } = step {
            let asset = params.params().settlement_asset;
            if !assets.contains(&asset) {
                assets.push(asset);
            }
        }
    }
    assets
}

/// Outcome of a replay
pub struct Report {
    pub applied: usize,
    pub rejected: Vec<(usize, String)>,
    pub events: Vec<ChamaEvent>,
}

/// Engine plus the test doubles a replay runs against
pub struct Runner {
    engine: ChamaEngine,
    clock: Arc<ManualClock>,
    ledger: Arc<InMemorySettlement>,
    events: Arc<MemoryEventSink>,
    labels: BTreeMap<String, AccountId>,
}

impl Runner {
    pub fn new(
        scenario: &Scenario,
        config: EngineConfig,
        metrics: Option<EngineMetrics>,
    ) -> anyhow::Result<Self> {
        let clock = Arc::new(ManualClock::new(scenario.start_time));
        let ledger = Arc::new(InMemorySettlement::new());
        let events = Arc::new(MemoryEventSink::new());

        let mut engine = ChamaEngine::new(config, clock.clone(), ledger.clone(), events.clone())?;
        if let Some(metrics) = metrics {
            engine = engine.with_metrics(metrics);
        }

        let mut runner = Self {
            engine,
            clock,
            ledger,
            events,
            labels: BTreeMap::new(),
        };
        let assets = scenario_assets(scenario);
        for account in &scenario.accounts {
            let id = runner.account(&account.label);
            for asset in &assets {
                runner.ledger.fund(asset, id, u128::from(account.funds));
            }
        }
        Ok(runner)
    }

    fn account(&mut self, label: &str) -> AccountId {
        *self
            .labels
            .entry(label.to_string())
            .or_insert_with(|| AccountId::from_label(label))
    }

    /// Replay every step. Rejected intents are reported, not fatal, unless
    /// `strict` is set.
    pub fn run(
        &mut self,
        scenario: &Scenario,
        strict: bool,
        mut on_event: impl FnMut(&ChamaEvent),
    ) -> anyhow::Result<Report> {
        let mut report = Report {
            applied: 0,
            rejected: Vec::new(),
            events: Vec::new(),
        };

        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = self.apply(step);
            for event in self.events.drain() {
                on_event(&event);
                report.events.push(event);
            }

            match outcome {
                Ok(()) => report.applied += 1,
                Err(err) if strict => {
                    return Err(anyhow!("step {} ({}) rejected: {}", index + 1, step.name(), err))
                }
                Err(err) => {
                    tracing::warn!("step {} ({}) rejected: {}", index + 1, step.name(), err);
                    report.rejected.push((index + 1, err.to_string()));
                }
            }
        }

        // Deadlines that lapsed after the last intent
        self.engine.settle_all()?;
        for event in self.events.drain() {
            on_event(&event);
            report.events.push(event);
        }
        Ok(report)
    }

    fn apply(&mut self, step: &Step) -> chama_core::error::Result<()> {
        match step {
            Step::CreateGroup { creator, params } => {
                let creator = self.account(creator);
                let id = self.engine.create_group(creator, params.params())?;
                tracing::info!("created {}", id);
            }
            Step::Join {
                group,
                member,
                amount,
            } => {
                let member = self.account(member);
                self.engine
                    .join_group(GroupId(*group), member, u128::from(*amount))?;
            }
            Step::Leave { group, member } => {
                let member = self.account(member);
                self.engine.leave_group(GroupId(*group), member)?;
            }
            Step::Kick { group, by, member } => {
                let (by, member) = (self.account(by), self.account(member));
                self.engine.kick_member(GroupId(*group), by, member)?;
            }
            Step::SetStatus { group, by, active } => {
                let by = self.account(by);
                self.engine.set_group_status(GroupId(*group), by, *active)?;
            }
            Step::TransferCreator { group, by, to } => {
                let (by, to) = (self.account(by), self.account(to));
                self.engine.transfer_creator(GroupId(*group), by, to)?;
            }
            Step::Cancel { group, by } => {
                let by = self.account(by);
                self.engine.cancel_group(GroupId(*group), by)?;
            }
            Step::ForceStart { group, by } => {
                let by = self.account(by);
                self.engine.force_start(GroupId(*group), by)?;
            }
            Step::Contribute {
                group,
                member,
                amount,
            } => {
                let member = self.account(member);
                self.engine
                    .contribute(GroupId(*group), member, u128::from(*amount))?;
            }
            Step::RaiseDispute {
                group,
                by,
                description,
                evidence,
            } => {
                let by = self.account(by);
                let id = self.engine.raise_dispute(
                    GroupId(*group),
                    by,
                    description.clone(),
                    evidence.clone(),
                )?;
                tracing::info!("raised {}", id);
            }
            Step::Vote {
                dispute,
                by,
                support,
                comment,
            } => {
                let by = self.account(by);
                self.engine
                    .cast_vote(DisputeId(*dispute), by, *support, comment.clone())?;
            }
            Step::ResolveDispute { dispute } => {
                self.engine.resolve_dispute(DisputeId(*dispute))?;
            }
            Step::Advance { secs } => {
                let now = self.clock.advance(*secs);
                tracing::debug!("clock advanced to {}", now);
            }
        }
        Ok(())
    }

    pub fn engine(&self) -> &ChamaEngine {
        &self.engine
    }

    /// Native-currency wallet balance per label
    pub fn balances(&self) -> Vec<(String, u128)> {
        self.labels
            .iter()
            .map(|(label, id)| {
                (
                    label.clone(),
                    self.ledger.balance(&SettlementAsset::Native, id),
                )
            })
            .collect()
    }

    pub fn escrow(&self) -> u128 {
        self.ledger.escrow_balance(&SettlementAsset::Native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_core::types::GroupPhase;

    const DEMO: &str = include_str!("../../../demos/three-member-circle.toml");

    #[test]
    fn test_demo_scenario_completes() {
        let scenario: Scenario = toml::from_str(DEMO).unwrap();
        let config = scenario.engine.clone().unwrap_or_default();
        let mut runner = Runner::new(&scenario, config, None).unwrap();

        let report = runner.run(&scenario, true, |_| {}).unwrap();
        assert_eq!(report.applied, scenario.steps.len());

        let details = runner.engine().get_group_details(GroupId(1)).unwrap();
        assert_eq!(details.group.phase, GroupPhase::Completed);
        assert_eq!(runner.escrow(), 0);
        let payouts = report
            .events
            .iter()
            .filter(|e| matches!(e, ChamaEvent::PayoutDistributed { .. }))
            .count();
        assert_eq!(payouts, 3);
    }

    #[test]
    fn test_json_steps() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "accounts": [{ "label": "a", "funds": 500 }],
                "steps": [
                    { "action": "create_group", "creator": "a",
                      "params": { "contribution": 10, "round_duration": 60, "members": 2 } },
                    { "action": "join", "group": 1, "member": "a", "amount": 9 }
                ]
            }"#,
        )
        .unwrap();

        let mut runner = Runner::new(&scenario, EngineConfig::default(), None).unwrap();
        let report = runner.run(&scenario, false, |_| {}).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(runner.run(&scenario, true, |_| {}).is_err());
    }
}
