//! JSON scenarios replayed against an in-memory engine.
//!
//! Accounts are named by labels and mapped through [`AccountId::derive`], so a
//! scenario file never spells out raw account bytes.

use crate::collaborators::{MemoryTokenService, MemoryUsageFeed, StaticAuthority};
use crate::engine::{CurationEngine, EngineConfig, EngineStats};
use crate::error::EngineError;
use crate::metrics::Metrics;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use curia_arbitration::ArbitrationVerdict;
use curia_review::{AuditRule, DetectionRule, ItemSpec, TaskSpec};
use curia_types::{
    AccountId, Amount, BoxId, CaseId, Currency, DayBucket, ErrorKind, HasErrorKind, ItemId,
    PlatformId, Strategy, TaskId, Timestamp, Verdict,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Labels allowed to resolve arbitration cases.
    #[serde(default)]
    pub authorities: Vec<String>,
    /// Opening token balances.
    #[serde(default)]
    pub funding: Vec<Funding>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funding {
    pub account: String,
    pub currency: Currency,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    DepositStake {
        account: String,
        amount: u64,
        at: Timestamp,
    },
    WithdrawStake {
        account: String,
        amount: u64,
    },
    OpenTask {
        requester: String,
        platform: u64,
        box_id: u64,
        strategy: Strategy,
        reward: u64,
        currency: Currency,
        #[serde(default)]
        audit_rule: AuditRule,
        #[serde(default)]
        detection_rule: DetectionRule,
        deadline: Timestamp,
        at: Timestamp,
    },
    SubmitItem {
        task: u64,
        submitter: String,
        fingerprint: u64,
        at: Timestamp,
    },
    Vote {
        item: u64,
        voter: String,
        verdict: Verdict,
        at: Timestamp,
    },
    SetUsage {
        box_id: u64,
        counter: u64,
    },
    Settle {
        task: u64,
        at: Timestamp,
    },
    ReleaseMortgage {
        task: u64,
        at: Timestamp,
    },
    Claim {
        account: String,
        currency: Currency,
        #[serde(default)]
        buckets: Vec<u64>,
        at: Timestamp,
    },
    Report {
        item: u64,
        reporter: String,
        evidence: String,
        at: Timestamp,
    },
    Resolve {
        case: u64,
        caller: String,
        verdict: ArbitrationVerdict,
        evidence: String,
        at: Timestamp,
    },
    CloseExpiredTask {
        task: u64,
        at: Timestamp,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DepositStake { .. } => "deposit_stake",
            Self::WithdrawStake { .. } => "withdraw_stake",
            Self::OpenTask { .. } => "open_task",
            Self::SubmitItem { .. } => "submit_item",
            Self::Vote { .. } => "vote",
            Self::SetUsage { .. } => "set_usage",
            Self::Settle { .. } => "settle",
            Self::ReleaseMortgage { .. } => "release_mortgage",
            Self::Claim { .. } => "claim",
            Self::Report { .. } => "report",
            Self::Resolve { .. } => "resolve",
            Self::CloseExpiredTask { .. } => "close_expired_task",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub op: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub scenario: String,
    /// Wall-clock time of the replay; step timestamps are scenario time.
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub failed_steps: usize,
    pub stats: EngineStats,
}

/// Engine plus the in-memory collaborators it runs against.
pub struct Sandbox {
    pub engine: CurationEngine,
    pub tokens: MemoryTokenService,
    pub usage: MemoryUsageFeed,
}

impl Sandbox {
    pub fn new(config: EngineConfig, authorities: &[String], metrics: Option<Metrics>) -> Self {
        let tokens = MemoryTokenService::new();
        let usage = MemoryUsageFeed::new();
        let authority = StaticAuthority::new(authorities.iter().map(|a| account(a)));
        let mut engine = CurationEngine::new(
            config,
            Arc::new(tokens.clone()),
            Arc::new(usage.clone()),
            Arc::new(authority),
        );
        if let Some(metrics) = metrics {
            engine = engine.with_metrics(metrics);
        }
        Self {
            engine,
            tokens,
            usage,
        }
    }
}

pub fn account(label: &str) -> AccountId {
    AccountId::derive(label)
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Runs every step in order. A failing step is reported and the replay continues.
    pub async fn run(&self, config: EngineConfig, metrics: Option<Metrics>) -> Result<ReplayReport> {
        let sandbox = Sandbox::new(config, &self.authorities, metrics);
        for funding in &self.funding {
            sandbox
                .tokens
                .fund(
                    account(&funding.account),
                    &funding.currency,
                    Amount::from_base_units(funding.amount),
                )
                .await;
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let report = match execute(&sandbox, step).await {
                Ok(output) => StepReport {
                    index,
                    op: step.name().to_string(),
                    ok: true,
                    output: Some(output),
                    error_kind: None,
                    error: None,
                },
                Err(e) => StepReport {
                    index,
                    op: step.name().to_string(),
                    ok: false,
                    output: None,
                    error_kind: Some(e.kind()),
                    error: Some(e.to_string()),
                },
            };
            steps.push(report);
        }

        let failed_steps = steps.iter().filter(|s| !s.ok).count();
        info!(
            scenario = %self.name,
            steps = steps.len(),
            failed = failed_steps,
            "🎯 Scenario replayed"
        );
        Ok(ReplayReport {
            scenario: self.name.clone(),
            generated_at: Utc::now(),
            steps,
            failed_steps,
            stats: sandbox.engine.stats().await,
        })
    }
}

fn to_value<T: Serialize>(value: &T) -> std::result::Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Collaborator(format!("encoding output: {}", e)))
}

async fn execute(sandbox: &Sandbox, step: &Step) -> std::result::Result<Value, EngineError> {
    let engine = &sandbox.engine;
    match step {
        Step::DepositStake {
            account: who,
            amount,
            at,
        } => {
            let staked = engine
                .deposit_stake(account(who), Amount::from_base_units(*amount), *at)
                .await?;
            Ok(json!({ "staked": staked }))
        }
        Step::WithdrawStake { account: who, amount } => {
            let staked = engine
                .withdraw_stake(account(who), Amount::from_base_units(*amount))
                .await?;
            Ok(json!({ "staked": staked }))
        }
        Step::OpenTask {
            requester,
            platform,
            box_id,
            strategy,
            reward,
            currency,
            audit_rule,
            detection_rule,
            deadline,
            at,
        } => {
            let task = engine
                .on_task_opened(
                    TaskSpec {
                        requester: account(requester),
                        platform: PlatformId(*platform),
                        box_id: BoxId(*box_id),
                        strategy: *strategy,
                        reward_amount: Amount::from_base_units(*reward),
                        currency: currency.clone(),
                        audit_rule: *audit_rule,
                        detection_rule: *detection_rule,
                        deadline: *deadline,
                    },
                    *at,
                )
                .await?;
            Ok(json!({ "task": task }))
        }
        Step::SubmitItem {
            task,
            submitter,
            fingerprint,
            at,
        } => {
            let item = engine
                .on_item_submitted(
                    ItemSpec {
                        task_id: TaskId(*task),
                        submitter: account(submitter),
                        fingerprint: *fingerprint,
                    },
                    *at,
                )
                .await?;
            Ok(json!({ "item": item }))
        }
        Step::Vote {
            item,
            voter,
            verdict,
            at,
        } => {
            let outcome = engine
                .cast_vote(ItemId(*item), account(voter), *verdict, *at)
                .await?;
            to_value(&outcome)
        }
        Step::SetUsage { box_id, counter } => {
            sandbox.usage.set(BoxId(*box_id), *counter).await;
            Ok(json!({ "box_id": box_id, "counter": counter }))
        }
        Step::Settle { task, at } => to_value(&engine.settle(TaskId(*task), *at).await?),
        Step::ReleaseMortgage { task, at } => {
            to_value(&engine.release_mortgage(TaskId(*task), *at).await?)
        }
        Step::Claim {
            account: who,
            currency,
            buckets,
            at,
        } => {
            let buckets: Vec<DayBucket> = buckets.iter().copied().map(DayBucket).collect();
            to_value(&engine.claim(account(who), currency, &buckets, *at).await?)
        }
        Step::Report {
            item,
            reporter,
            evidence,
            at,
        } => {
            let case = engine
                .report(ItemId(*item), account(reporter), evidence, *at)
                .await?;
            Ok(json!({ "case": case }))
        }
        Step::Resolve {
            case,
            caller,
            verdict,
            evidence,
            at,
        } => to_value(
            &engine
                .resolve(CaseId(*case), account(caller), *verdict, evidence, *at)
                .await?,
        ),
        Step::CloseExpiredTask { task, at } => {
            let rejected = engine.close_expired_task(TaskId(*task), *at).await?;
            Ok(json!({ "rejected": rejected }))
        }
    }
}
