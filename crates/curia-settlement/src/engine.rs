use crate::error::{Result, SettlementError};
use crate::strategy::{compute_shares, Share, ShareContext};
use curia_ledger::RewardLedger;
use curia_review::{ReviewEngine, Task};
use curia_types::{
    AccountId, Amount, Currency, DayBucket, ItemId, ItemState, Role, Strategy, TaskId, Timestamp,
    BPS_DENOMINATOR, SECONDS_PER_DAY,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub platform_fee_bps: u32,      // vault fee, 0 by default
    pub reviewer_share_bps: u32,    // 1% split among agreeing reviewers
    pub mortgage_bps: u32,          // 20% of the submitter share
    pub mortgage_hold_secs: u64,    // arbitration window
    pub usage_rate_denominator: u64, // divide: reward_amount per this many usage units
    pub fee_receiver: AccountId,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: 0,
            reviewer_share_bps: 100,
            mortgage_bps: 2_000,
            mortgage_hold_secs: 3 * SECONDS_PER_DAY,
            usage_rate_denominator: 10_000,
            fee_receiver: AccountId::fee_receiver(),
        }
    }
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<()> {
        let bps_total = self.platform_fee_bps as u64 + self.reviewer_share_bps as u64;
        if bps_total > BPS_DENOMINATOR {
            return Err(SettlementError::InvalidConfiguration(format!(
                "platform_fee_bps + reviewer_share_bps = {} exceeds {}",
                bps_total, BPS_DENOMINATOR
            )));
        }
        if self.mortgage_bps as u64 > BPS_DENOMINATOR {
            return Err(SettlementError::InvalidConfiguration(format!(
                "mortgage_bps {} exceeds {}",
                self.mortgage_bps, BPS_DENOMINATOR
            )));
        }
        if self.usage_rate_denominator == 0 {
            return Err(SettlementError::InvalidConfiguration(
                "usage_rate_denominator must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Settlement,
    EscrowRelease,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: u64,
    pub kind: RecordKind,
    pub task: TaskId,
    pub item: ItemId,
    pub strategy: Strategy,
    pub currency: Currency,
    pub gross: Amount,
    pub shares: Vec<Share>,
    pub escrowed: Amount,
    /// Divide only: usage counter range paid for.
    pub usage_range: Option<(u64, u64)>,
    pub computed_at: Timestamp,
    pub reversed: bool,
}

impl SettlementRecord {
    pub fn distributed(&self) -> Amount {
        self.shares.iter().map(|s| s.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled(SettlementRecord),
    NothingToSettle,
    Frozen,
}

/// Mortgage withheld from a submitter until the arbitration window passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    pub task: TaskId,
    pub item: ItemId,
    pub beneficiary: AccountId,
    pub currency: Currency,
    pub amount: Amount,
    pub releasable_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClawedShare {
    pub account: AccountId,
    pub role: Role,
    pub currency: Currency,
    pub bucket: DayBucket,
    pub amount: Amount,
}

/// What a reversal took back, and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClawBack {
    pub clawed: Vec<ClawedShare>,
    /// Already claimed; written off.
    pub unrecoverable: Vec<ClawedShare>,
    pub escrow_forfeited: Amount,
}

impl ClawBack {
    pub fn clawed_total(&self) -> Amount {
        self.clawed.iter().map(|c| c.amount).sum()
    }

    pub fn unrecoverable_total(&self) -> Amount {
        self.unrecoverable.iter().map(|c| c.amount).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStats {
    pub records: usize,
    pub reversed_records: usize,
    pub frozen_tasks: usize,
    pub escrows: usize,
    pub escrowed_total: Amount,
    pub committed_total: Amount,
}

#[derive(Debug, Clone)]
pub struct SettlementEngine {
    config: SettlementConfig,
    watermarks: BTreeMap<TaskId, u64>,
    records: BTreeMap<ItemId, Vec<SettlementRecord>>,
    escrows: BTreeMap<TaskId, Escrow>,
    /// Lump-sum budget already promised per task: live settlements plus written-off claims.
    committed: BTreeMap<TaskId, Amount>,
    frozen: BTreeSet<TaskId>,
    last_record: u64,
}

impl SettlementEngine {
    pub fn new(config: SettlementConfig) -> Self {
        Self {
            config,
            watermarks: BTreeMap::new(),
            records: BTreeMap::new(),
            escrows: BTreeMap::new(),
            committed: BTreeMap::new(),
            frozen: BTreeSet::new(),
            last_record: 0,
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn watermark(&self, task: TaskId) -> u64 {
        self.watermarks.get(&task).copied().unwrap_or(0)
    }

    pub fn records_for_item(&self, item: ItemId) -> &[SettlementRecord] {
        self.records.get(&item).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn committed(&self, task: TaskId) -> Amount {
        self.committed.get(&task).copied().unwrap_or(Amount::ZERO)
    }

    /// Part of a lump-sum budget not yet promised to anyone.
    pub fn remaining_budget(&self, task: &Task) -> Amount {
        task.reward_amount.saturating_sub(self.committed(task.id))
    }

    pub fn escrow(&self, task: TaskId) -> Option<&Escrow> {
        self.escrows.get(&task)
    }

    pub fn is_frozen(&self, task: TaskId) -> bool {
        self.frozen.contains(&task)
    }

    pub fn freeze(&mut self, task: TaskId) {
        if self.frozen.insert(task) {
            info!(task = %task, "❄️ Settlement frozen");
        }
    }

    pub fn unfreeze(&mut self, task: TaskId) {
        if self.frozen.remove(&task) {
            info!(task = %task, "🔥 Settlement unfrozen");
        }
    }

    fn has_live_settlement(&self, item: ItemId) -> bool {
        self.records_for_item(item)
            .iter()
            .any(|r| r.kind == RecordKind::Settlement && !r.reversed)
    }

    fn next_record_id(&mut self) -> u64 {
        self.last_record += 1;
        self.last_record
    }

    /// Permissionless settlement trigger for a task.
    ///
    /// `usage_counter` is the current reading of the task's box and is required for
    /// `Divide` tasks only.
    pub fn settle(
        &mut self,
        task_id: TaskId,
        review: &ReviewEngine,
        usage_counter: Option<u64>,
        rewards: &mut RewardLedger,
        now: Timestamp,
    ) -> Result<SettlementOutcome> {
        let task = review.task(task_id)?;
        if self.is_frozen(task_id) {
            debug!(task = %task_id, "Settlement skipped: frozen");
            return Ok(SettlementOutcome::Frozen);
        }
        let Some(item_id) = task.adopted_item else {
            debug!(task = %task_id, "Settlement skipped: no adopted item");
            return Ok(SettlementOutcome::NothingToSettle);
        };
        let item = review.item(item_id)?;
        if item.state != ItemState::Adopted {
            return Ok(SettlementOutcome::NothingToSettle);
        }

        let (gross, usage_range) = match task.strategy {
            Strategy::OneTime | Strategy::OneTimeWithMortgage => {
                if self.has_live_settlement(item_id) {
                    debug!(task = %task_id, item = %item_id, "Settlement skipped: already settled");
                    return Ok(SettlementOutcome::NothingToSettle);
                }
                let remaining = self.remaining_budget(task);
                if remaining.is_zero() {
                    warn!(
                        task = %task_id,
                        item = %item_id,
                        committed = self.committed(task_id).to_base_units(),
                        "⚠️ Task budget exhausted"
                    );
                    return Ok(SettlementOutcome::NothingToSettle);
                }
                (remaining, None)
            }
            Strategy::Divide => {
                let counter =
                    usage_counter.ok_or(SettlementError::UsageCounterRequired(task_id))?;
                let watermark = self.watermark(task_id);
                if counter < watermark {
                    warn!(
                        task = %task_id,
                        counter,
                        watermark,
                        "⚠️ Usage counter behind watermark"
                    );
                    return Ok(SettlementOutcome::NothingToSettle);
                }
                let marginal = counter - watermark;
                let gross = task
                    .reward_amount
                    .mul_div(marginal, self.config.usage_rate_denominator)
                    .ok_or(SettlementError::Overflow(task_id))?;
                if gross.is_zero() {
                    debug!(task = %task_id, marginal, "Settlement skipped: no new usage value");
                    return Ok(SettlementOutcome::NothingToSettle);
                }
                (gross, Some((watermark, counter)))
            }
        };

        let reviewers = review.agreeing_reviewers(item_id);
        let bucket = rewards.bucket_for(now);
        let split = compute_shares(
            task.strategy,
            &ShareContext {
                gross,
                submitter: item.submitter,
                reviewers: &reviewers,
                fee_receiver: self.config.fee_receiver,
                platform_fee_bps: self.config.platform_fee_bps,
                reviewer_share_bps: self.config.reviewer_share_bps,
                mortgage_bps: self.config.mortgage_bps,
                bucket,
            },
        );

        for share in &split.shares {
            rewards.lock(share.account, &task.currency, share.bucket, share.amount)?;
        }
        if let Some((_, counter)) = usage_range {
            self.watermarks.insert(task_id, counter);
        }
        if task.strategy.settles_on_adoption() {
            let committed = self.committed.entry(task_id).or_default();
            *committed = committed.saturating_add(gross);
        }
        if !split.escrowed.is_zero() {
            let adopted_at = task.adopted_at.unwrap_or(now);
            let releasable_at =
                adopted_at.saturating_add(self.config.mortgage_hold_secs.min(i64::MAX as u64) as i64);
            self.escrows.insert(
                task_id,
                Escrow {
                    task: task_id,
                    item: item_id,
                    beneficiary: item.submitter,
                    currency: task.currency.clone(),
                    amount: split.escrowed,
                    releasable_at,
                },
            );
        }

        let record = SettlementRecord {
            id: self.next_record_id(),
            kind: RecordKind::Settlement,
            task: task_id,
            item: item_id,
            strategy: task.strategy,
            currency: task.currency.clone(),
            gross,
            shares: split.shares,
            escrowed: split.escrowed,
            usage_range,
            computed_at: now,
            reversed: false,
        };
        info!(
            task = %task_id,
            item = %item_id,
            strategy = %task.strategy,
            gross = gross.to_base_units(),
            distributed = record.distributed().to_base_units(),
            escrowed = record.escrowed.to_base_units(),
            shares = record.shares.len(),
            "💸 Settlement locked"
        );
        self.records.entry(item_id).or_default().push(record.clone());
        Ok(SettlementOutcome::Settled(record))
    }

    /// Locks the escrowed mortgage to the submitter once the hold period has passed.
    pub fn release_mortgage(
        &mut self,
        task_id: TaskId,
        rewards: &mut RewardLedger,
        now: Timestamp,
    ) -> Result<SettlementOutcome> {
        if self.is_frozen(task_id) {
            return Ok(SettlementOutcome::Frozen);
        }
        let escrow = self
            .escrows
            .get(&task_id)
            .ok_or(SettlementError::EscrowNotFound(task_id))?;
        if now < escrow.releasable_at {
            return Err(SettlementError::EscrowNotReleasable {
                task: task_id,
                releasable_at: escrow.releasable_at,
                now,
            });
        }

        let bucket = rewards.bucket_for(now);
        rewards.lock(escrow.beneficiary, &escrow.currency, bucket, escrow.amount)?;
        let Some(escrow) = self.escrows.remove(&task_id) else {
            return Err(SettlementError::EscrowNotFound(task_id));
        };

        let record = SettlementRecord {
            id: self.next_record_id(),
            kind: RecordKind::EscrowRelease,
            task: task_id,
            item: escrow.item,
            strategy: Strategy::OneTimeWithMortgage,
            currency: escrow.currency.clone(),
            gross: escrow.amount,
            shares: vec![Share {
                account: escrow.beneficiary,
                role: Role::Submitter,
                amount: escrow.amount,
                bucket,
            }],
            escrowed: Amount::ZERO,
            usage_range: None,
            computed_at: now,
            reversed: false,
        };
        info!(
            task = %task_id,
            item = %escrow.item,
            beneficiary = %escrow.beneficiary,
            amount = escrow.amount.to_base_units(),
            "🔓 Mortgage released"
        );
        self.records.entry(escrow.item).or_default().push(record.clone());
        Ok(SettlementOutcome::Settled(record))
    }

    /// Reverses every live record of `item`: claws back locked shares and forfeits escrow.
    pub fn claw_back_item(&mut self, item: ItemId, task: TaskId, rewards: &mut RewardLedger) -> ClawBack {
        let mut result = ClawBack::default();
        let (mut released, mut written_off) = (Amount::ZERO, Amount::ZERO);

        if let Some(records) = self.records.get_mut(&item) {
            for record in records.iter_mut().filter(|r| !r.reversed) {
                let budgeted = record.strategy.settles_on_adoption();
                if budgeted && record.kind == RecordKind::Settlement {
                    released = released.saturating_add(record.gross);
                }
                for share in &record.shares {
                    let clawed =
                        rewards.claw_back(share.account, &record.currency, share.bucket, share.amount);
                    if !clawed.is_zero() {
                        result.clawed.push(ClawedShare {
                            account: share.account,
                            role: share.role,
                            currency: record.currency.clone(),
                            bucket: share.bucket,
                            amount: clawed,
                        });
                    }
                    let missing = share.amount.saturating_sub(clawed);
                    if budgeted {
                        written_off = written_off.saturating_add(missing);
                    }
                    if !missing.is_zero() {
                        result.unrecoverable.push(ClawedShare {
                            account: share.account,
                            role: share.role,
                            currency: record.currency.clone(),
                            bucket: share.bucket,
                            amount: missing,
                        });
                    }
                }
                record.reversed = true;
            }
        }
        if !released.is_zero() || !written_off.is_zero() {
            let committed = self.committed.entry(task).or_default();
            *committed = committed.saturating_sub(released).saturating_add(written_off);
        }

        if self.escrows.get(&task).is_some_and(|e| e.item == item) {
            if let Some(escrow) = self.escrows.remove(&task) {
                result.escrow_forfeited = escrow.amount;
            }
        }

        info!(
            item = %item,
            task = %task,
            clawed = result.clawed_total().to_base_units(),
            unrecoverable = result.unrecoverable_total().to_base_units(),
            escrow_forfeited = result.escrow_forfeited.to_base_units(),
            "↩️ Settlement reversed"
        );
        if !result.unrecoverable.is_empty() {
            warn!(
                item = %item,
                shares = result.unrecoverable.len(),
                amount = result.unrecoverable_total().to_base_units(),
                "⚠️ Claimed rewards could not be recovered"
            );
        }
        result
    }

    pub fn stats(&self) -> SettlementStats {
        let all = self.records.values().flatten();
        let (mut records, mut reversed_records) = (0, 0);
        for r in all {
            records += 1;
            if r.reversed {
                reversed_records += 1;
            }
        }
        SettlementStats {
            records,
            reversed_records,
            frozen_tasks: self.frozen.len(),
            escrows: self.escrows.len(),
            escrowed_total: self.escrows.values().map(|e| e.amount).sum(),
            committed_total: self.committed.values().copied().sum(),
        }
    }
}
