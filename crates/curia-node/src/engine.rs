use crate::collaborators::{ArbitrationAuthority, TokenService, UsageFeed};
use crate::error::{EngineError, Result};
use crate::metrics::Metrics;
use curia_arbitration::{
    ArbitrationCase, ArbitrationConfig, ArbitrationContext, ArbitrationEngine, ArbitrationStats,
    ArbitrationVerdict, Resolution,
};
use curia_ledger::{AccountLedger, ClaimReceipt, LedgerConfig, RewardLedger};
use curia_review::{
    Item, ItemSpec, ReviewConfig, ReviewEngine, ReviewStats, StakeChange, Task, TaskSpec,
    VoteOutcome,
};
use curia_settlement::{SettlementConfig, SettlementEngine, SettlementOutcome, SettlementStats};
use curia_types::{
    AccountId, Amount, CaseId, Currency, DayBucket, Disposition, HasErrorKind, ItemId, PlatformId,
    Strategy, TaskId, Timestamp, Verdict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Configuration of every protocol component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub review: ReviewConfig,
    pub settlement: SettlementConfig,
    pub ledger: LedgerConfig,
    pub arbitration: ArbitrationConfig,
}

/// All protocol state. Cloned to stage an operation, swapped in on commit.
#[derive(Debug, Clone)]
pub struct ProtocolState {
    pub accounts: AccountLedger,
    pub rewards: RewardLedger,
    pub review: ReviewEngine,
    pub settlement: SettlementEngine,
    pub arbitration: ArbitrationEngine,
}

impl ProtocolState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            accounts: AccountLedger::new(config.ledger.clone()),
            rewards: RewardLedger::new(&config.ledger),
            review: ReviewEngine::new(config.review.clone()),
            settlement: SettlementEngine::new(config.settlement.clone()),
            arbitration: ArbitrationEngine::new(config.arbitration.clone()),
        }
    }
}

/// Token movement requested by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenEffect {
    Transfer {
        currency: Currency,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Mint {
        account: AccountId,
        platform: PlatformId,
        amount: Amount,
    },
}

impl TokenEffect {
    fn transfer(currency: &Currency, from: AccountId, to: AccountId, amount: Amount) -> Self {
        Self::Transfer {
            currency: currency.clone(),
            from,
            to,
            amount,
        }
    }

    fn amount(&self) -> Amount {
        match self {
            Self::Transfer { amount, .. } | Self::Mint { amount, .. } => *amount,
        }
    }

    fn inverse(&self) -> Option<Self> {
        match self {
            Self::Transfer {
                currency,
                from,
                to,
                amount,
            } => Some(Self::transfer(currency, *to, *from, *amount)),
            Self::Mint { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub accounts: usize,
    pub penalty_pool: Amount,
    pub review: ReviewStats,
    pub settlement: SettlementStats,
    pub arbitration: ArbitrationStats,
}

/// Serialized entry point to the protocol.
///
/// Every operation holds the state lock for its whole duration, runs against a
/// staged copy, performs its token effects, and commits the copy only when all
/// effects succeed. Transfers already made are compensated in reverse order when
/// a later effect fails.
pub struct CurationEngine {
    state: Mutex<ProtocolState>,
    tokens: Arc<dyn TokenService>,
    usage: Arc<dyn UsageFeed>,
    authority: Arc<dyn ArbitrationAuthority>,
    metrics: Option<Metrics>,
}

impl CurationEngine {
    pub fn new(
        config: EngineConfig,
        tokens: Arc<dyn TokenService>,
        usage: Arc<dyn UsageFeed>,
        authority: Arc<dyn ArbitrationAuthority>,
    ) -> Self {
        info!(
            maturity_window_secs = config.ledger.maturity_window_secs,
            reviewer_share_bps = config.settlement.reviewer_share_bps,
            platform_fee_bps = config.settlement.platform_fee_bps,
            "✨ Curation engine initialized"
        );
        Self {
            state: Mutex::new(ProtocolState::new(&config)),
            tokens,
            usage,
            authority,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    fn record(&self, f: impl FnOnce(&Metrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    // ---------------------------------------------------------------------
    // Stake
    // ---------------------------------------------------------------------

    pub async fn deposit_stake(&self, account: AccountId, amount: Amount, now: Timestamp) -> Result<Amount> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let staked = staged.accounts.deposit_stake(account, amount, now)?;
        let currency = staged.accounts.config().stake_currency.clone();

        let effects = vec![TokenEffect::transfer(&currency, account, AccountId::custody(), amount)];
        self.commit(&mut state, staged, effects).await?;
        Ok(staked)
    }

    pub async fn withdraw_stake(&self, account: AccountId, amount: Amount) -> Result<Amount> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let staked = staged.accounts.withdraw_stake(account, amount)?;
        let currency = staged.accounts.config().stake_currency.clone();

        let effects = vec![TokenEffect::transfer(&currency, AccountId::custody(), account, amount)];
        self.commit(&mut state, staged, effects).await?;
        Ok(staked)
    }

    // ---------------------------------------------------------------------
    // Tasks, items, votes
    // ---------------------------------------------------------------------

    /// Opens a task. Fungible budgets move into custody up front.
    pub async fn on_task_opened(&self, spec: TaskSpec, now: Timestamp) -> Result<TaskId> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        let effects = match (&spec.currency, spec.strategy) {
            (Currency::Token(_), Strategy::OneTime | Strategy::OneTimeWithMortgage) => {
                vec![TokenEffect::transfer(
                    &spec.currency,
                    spec.requester,
                    AccountId::custody(),
                    spec.reward_amount,
                )]
            }
            _ => Vec::new(),
        };
        let task = staged.review.open_task(spec, now)?;

        self.commit(&mut state, staged, effects).await?;
        self.record(|m| m.tasks_opened.inc());
        Ok(task)
    }

    pub async fn on_item_submitted(&self, spec: ItemSpec, now: Timestamp) -> Result<ItemId> {
        let mut state = self.state.lock().await;
        let ProtocolState { review, accounts, .. } = &mut *state;
        let item = review.submit_item(spec, accounts, now)?;
        self.record(|m| m.items_submitted.inc());
        Ok(item)
    }

    pub async fn cast_vote(
        &self,
        item: ItemId,
        voter: AccountId,
        verdict: Verdict,
        now: Timestamp,
    ) -> Result<VoteOutcome> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let outcome = staged
            .review
            .cast_vote(item, voter, verdict, &mut staged.accounts, now)?;

        let currency = staged.accounts.config().stake_currency.clone();
        let effects = match &outcome {
            VoteOutcome::Finalized { record, .. } => slash_effects(&currency, &record.slashed),
            VoteOutcome::Recorded { .. } => Vec::new(),
        };
        self.commit(&mut state, staged, effects).await?;

        self.record(|m| {
            m.votes_cast.inc();
            if let VoteOutcome::Finalized { record, .. } = &outcome {
                match record.disposition {
                    Disposition::Adopted => m.items_adopted.inc(),
                    Disposition::Deleted => m.items_deleted.inc(),
                }
            }
        });
        Ok(outcome)
    }

    /// Closes an expired task and refunds the unspent fungible budget to the requester.
    pub async fn close_expired_task(&self, task_id: TaskId, now: Timestamp) -> Result<Vec<ItemId>> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let rejected = staged.review.close_expired_task(task_id, now)?;

        let task = staged.review.task(task_id)?;
        let mut effects = Vec::new();
        if matches!(task.currency, Currency::Token(_)) && task.strategy.settles_on_adoption() {
            let refund = staged.settlement.remaining_budget(task);
            if !refund.is_zero() {
                effects.push(TokenEffect::transfer(
                    &task.currency,
                    AccountId::custody(),
                    task.requester,
                    refund,
                ));
            }
        }

        self.commit(&mut state, staged, effects).await?;
        Ok(rejected)
    }

    // ---------------------------------------------------------------------
    // Settlement and claims
    // ---------------------------------------------------------------------

    pub async fn settle(&self, task_id: TaskId, now: Timestamp) -> Result<SettlementOutcome> {
        let mut state = self.state.lock().await;
        let task = state.review.task(task_id)?;
        let usage_counter = match task.strategy {
            Strategy::Divide => Some(
                self.usage
                    .usage_counter(task.box_id)
                    .await
                    .map_err(|e| self.collaborator_failure("usage_counter", e))?,
            ),
            _ => None,
        };

        let mut staged = state.clone();
        let ProtocolState {
            review,
            settlement,
            rewards,
            ..
        } = &mut staged;
        let outcome = settlement.settle(task_id, review, usage_counter, rewards, now)?;
        self.commit(&mut state, staged, Vec::new()).await?;
        if matches!(outcome, SettlementOutcome::Settled(_)) {
            self.record(|m| m.settlements_total.inc());
        }
        Ok(outcome)
    }

    pub async fn release_mortgage(&self, task_id: TaskId, now: Timestamp) -> Result<SettlementOutcome> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let ProtocolState {
            settlement,
            rewards,
            ..
        } = &mut staged;
        let outcome = settlement.release_mortgage(task_id, rewards, now)?;
        self.commit(&mut state, staged, Vec::new()).await?;
        if matches!(outcome, SettlementOutcome::Settled(_)) {
            self.record(|m| m.settlements_total.inc());
        }
        Ok(outcome)
    }

    /// Claims mature rewards. An empty bucket list claims every bucket held.
    pub async fn claim(
        &self,
        account: AccountId,
        currency: &Currency,
        buckets: &[DayBucket],
        now: Timestamp,
    ) -> Result<ClaimReceipt> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let receipt = if buckets.is_empty() {
            staged.rewards.claim_all(account, currency, now)
        } else {
            staged.rewards.claim(account, currency, buckets, now)
        };

        let effects = if receipt.total.is_zero() {
            Vec::new()
        } else {
            match currency {
                Currency::Token(_) => vec![TokenEffect::transfer(
                    currency,
                    AccountId::custody(),
                    account,
                    receipt.total,
                )],
                Currency::Platform(platform) => vec![TokenEffect::Mint {
                    account,
                    platform: *platform,
                    amount: receipt.total,
                }],
            }
        };
        self.commit(&mut state, staged, effects).await?;

        if !receipt.total.is_zero() {
            self.record(|m| {
                m.claims_total.inc();
                m.claimed_amount.inc_by(receipt.total.to_base_units());
            });
        }
        Ok(receipt)
    }

    // ---------------------------------------------------------------------
    // Arbitration
    // ---------------------------------------------------------------------

    pub async fn report(
        &self,
        item: ItemId,
        reporter: AccountId,
        evidence_ref: &str,
        now: Timestamp,
    ) -> Result<CaseId> {
        let mut state = self.state.lock().await;
        let ProtocolState {
            review,
            settlement,
            arbitration,
            ..
        } = &mut *state;
        let case = arbitration.report(item, reporter, evidence_ref, review, settlement, now)?;
        self.record(|m| {
            m.cases_opened.inc();
            m.open_cases.inc();
        });
        Ok(case)
    }

    pub async fn resolve(
        &self,
        case_id: CaseId,
        caller: AccountId,
        verdict: ArbitrationVerdict,
        evidence_ref: &str,
        now: Timestamp,
    ) -> Result<Resolution> {
        let mut state = self.state.lock().await;
        let is_authority = self.authority.is_arbitration_authority(&caller).await;

        let mut staged = state.clone();
        let ProtocolState {
            accounts,
            rewards,
            review,
            settlement,
            arbitration,
        } = &mut staged;
        let resolution = arbitration.resolve(
            case_id,
            caller,
            is_authority,
            verdict,
            evidence_ref,
            ArbitrationContext {
                review,
                settlement,
                accounts,
                rewards,
            },
            now,
        )?;

        let currency = staged.accounts.config().stake_currency.clone();
        let mut effects = Vec::new();
        if let Some(reversal) = &resolution.reversal {
            // Reclaimed reporter reward refills the pool ahead of the restores
            let recovered = reversal
                .prior_reporter
                .as_ref()
                .map_or(Amount::ZERO, |p| p.recovered());
            if !recovered.is_zero() {
                effects.push(TokenEffect::transfer(
                    &currency,
                    AccountId::custody(),
                    AccountId::penalty_pool(),
                    recovered,
                ));
            }
            for restored in reversal.stake_restored.iter().filter(|s| !s.amount.is_zero()) {
                effects.push(TokenEffect::transfer(
                    &currency,
                    AccountId::penalty_pool(),
                    AccountId::custody(),
                    restored.amount,
                ));
            }
            effects.extend(slash_effects(&currency, &reversal.stake_slashed));
            if !reversal.reporter_reward.is_zero() {
                effects.push(TokenEffect::transfer(
                    &currency,
                    AccountId::penalty_pool(),
                    AccountId::custody(),
                    reversal.reporter_reward,
                ));
            }
        }
        self.commit(&mut state, staged, effects).await?;

        self.record(|m| {
            m.cases_resolved.inc();
            m.open_cases.dec();
            if let Some(reversal) = &resolution.reversal {
                m.cases_overturned.inc();
                if !reversal.clawback.clawed.is_empty() || !reversal.clawback.unrecoverable.is_empty() {
                    m.clawbacks_total.inc();
                    m.clawed_amount
                        .inc_by(reversal.clawback.clawed_total().to_base_units());
                }
            }
        });
        Ok(resolution)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub async fn credit(&self, account: &AccountId) -> i64 {
        self.state.lock().await.accounts.credit(account)
    }

    pub async fn stake(&self, account: &AccountId) -> Amount {
        self.state.lock().await.accounts.stake(account)
    }

    pub async fn locked(&self, account: &AccountId, currency: &Currency, bucket: DayBucket) -> Amount {
        self.state.lock().await.rewards.locked(account, currency, bucket)
    }

    pub async fn total_locked(&self, account: &AccountId, currency: &Currency) -> Amount {
        self.state.lock().await.rewards.total_locked(account, currency)
    }

    pub async fn buckets(&self, account: &AccountId, currency: &Currency) -> Vec<DayBucket> {
        self.state.lock().await.rewards.buckets(account, currency)
    }

    pub async fn task(&self, id: TaskId) -> Option<Task> {
        self.state.lock().await.review.task(id).ok().cloned()
    }

    pub async fn item(&self, id: ItemId) -> Option<Item> {
        self.state.lock().await.review.item(id).ok().cloned()
    }

    pub async fn case(&self, id: CaseId) -> Option<ArbitrationCase> {
        self.state.lock().await.arbitration.case(id).ok().cloned()
    }

    /// Copy of the full protocol state.
    pub async fn snapshot(&self) -> ProtocolState {
        self.state.lock().await.clone()
    }

    pub async fn stats(&self) -> EngineStats {
        let state = self.state.lock().await;
        EngineStats {
            accounts: state.accounts.account_count(),
            penalty_pool: state.accounts.penalty_pool(),
            review: state.review.stats(),
            settlement: state.settlement.stats(),
            arbitration: state.arbitration.stats(),
        }
    }

    // ---------------------------------------------------------------------
    // Effects
    // ---------------------------------------------------------------------

    /// Runs `effects` and installs `staged` if they all succeed.
    async fn commit(
        &self,
        state: &mut MutexGuard<'_, ProtocolState>,
        staged: ProtocolState,
        effects: Vec<TokenEffect>,
    ) -> Result<()> {
        self.apply_effects(effects).await?;
        **state = staged;
        Ok(())
    }

    async fn apply_effects(&self, effects: Vec<TokenEffect>) -> Result<()> {
        // Mints cannot be compensated, so they go last.
        let (transfers, mints): (Vec<_>, Vec<_>) = effects
            .into_iter()
            .filter(|e| !e.amount().is_zero())
            .partition(|e| matches!(e, TokenEffect::Transfer { .. }));

        let mut applied: Vec<TokenEffect> = Vec::new();
        for effect in transfers.into_iter().chain(mints) {
            match self.apply_effect(&effect).await {
                Ok(()) => applied.push(effect),
                Err(e) => {
                    warn!(
                        effect = ?effect,
                        applied = applied.len(),
                        error = %e,
                        "❌ Token effect failed, rolling back"
                    );
                    for done in applied.iter().rev() {
                        let Some(undo) = done.inverse() else {
                            continue;
                        };
                        if let Err(undo_err) = self.apply_effect(&undo).await {
                            error!(effect = ?undo, error = %undo_err, "Compensation failed");
                        }
                    }
                    return Err(self.collaborator_failure("token_service", e));
                }
            }
        }
        Ok(())
    }

    async fn apply_effect(&self, effect: &TokenEffect) -> anyhow::Result<()> {
        match effect {
            TokenEffect::Transfer {
                currency,
                from,
                to,
                amount,
            } => self.tokens.transfer(currency, *from, *to, *amount).await,
            TokenEffect::Mint {
                account,
                platform,
                amount,
            } => self.tokens.mint_receipt(*account, *platform, *amount).await,
        }
    }

    fn collaborator_failure(&self, collaborator: &str, e: anyhow::Error) -> EngineError {
        self.record(|m| m.collaborator_failures.inc());
        let err = EngineError::Collaborator(format!("{}: {}", collaborator, e));
        warn!(collaborator, kind = %err.kind(), error = %e, "⚠️ Collaborator failure");
        err
    }
}

fn slash_effects(currency: &Currency, slashed: &[StakeChange]) -> Vec<TokenEffect> {
    slashed
        .iter()
        .filter(|s| !s.amount.is_zero())
        .map(|s| {
            TokenEffect::transfer(
                currency,
                AccountId::custody(),
                AccountId::penalty_pool(),
                s.amount,
            )
        })
        .collect()
}
