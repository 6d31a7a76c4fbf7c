use crate::case::{ArbitrationCase, ArbitrationVerdict, CaseState, ReporterReversal, ReversalReport};
use crate::error::{ArbitrationError, Result};
use curia_ledger::{AccountLedger, CreditEvent, RewardLedger};
use curia_review::{CreditChange, ReviewEngine};
use curia_settlement::{SettlementEngine, SettlementOutcome};
use curia_types::{AccountId, Amount, CaseId, Disposition, ItemId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    pub reporter_bonus: i64,      // credit for a vindicated reporter
    pub reporter_reward_bps: u32, // 12.5% of stake newly slashed by the overturn
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            reporter_bonus: 15,
            reporter_reward_bps: 1_250,
        }
    }
}

/// Mutable protocol state an overturn touches.
pub struct ArbitrationContext<'a> {
    pub review: &'a mut ReviewEngine,
    pub settlement: &'a mut SettlementEngine,
    pub accounts: &'a mut AccountLedger,
    pub rewards: &'a mut RewardLedger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub case: CaseId,
    pub verdict: ArbitrationVerdict,
    pub reversal: Option<ReversalReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationStats {
    pub total_cases: u64,
    pub open: u64,
    pub upheld: u64,
    pub overturned: u64,
}

#[derive(Debug, Clone)]
pub struct ArbitrationEngine {
    config: ArbitrationConfig,
    cases: BTreeMap<CaseId, ArbitrationCase>,
    open_by_item: BTreeMap<ItemId, CaseId>,
    last_case: CaseId,
}

impl ArbitrationEngine {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self {
            config,
            cases: BTreeMap::new(),
            open_by_item: BTreeMap::new(),
            last_case: CaseId::default(),
        }
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    pub fn case(&self, id: CaseId) -> Result<&ArbitrationCase> {
        self.cases.get(&id).ok_or(ArbitrationError::CaseNotFound(id))
    }

    pub fn open_case_for(&self, item: ItemId) -> Option<CaseId> {
        self.open_by_item.get(&item).copied()
    }

    pub fn cases_for_item(&self, item: ItemId) -> Vec<&ArbitrationCase> {
        self.cases.values().filter(|c| c.item == item).collect()
    }

    pub fn report(
        &mut self,
        item_id: ItemId,
        reporter: AccountId,
        evidence_ref: &str,
        review: &ReviewEngine,
        settlement: &mut SettlementEngine,
        now: Timestamp,
    ) -> Result<CaseId> {
        let item = review.item(item_id)?;
        let Some(contested) = item.state.disposition() else {
            return Err(ArbitrationError::ItemNotFinalized {
                item: item_id,
                state: item.state,
            });
        };
        if let Some(case) = self.open_case_for(item_id) {
            return Err(ArbitrationError::AlreadyReported {
                item: item_id,
                case,
            });
        }
        if evidence_ref.trim().is_empty() {
            return Err(ArbitrationError::MissingEvidence);
        }
        let task = review.task(item.task_id)?;
        if contested == Disposition::Deleted {
            if let Some(adopted) = task.adopted_item.filter(|a| *a != item_id) {
                return Err(ArbitrationError::ConflictingAdoption {
                    item: item_id,
                    adopted,
                });
            }
            if !task.is_open() {
                return Err(ArbitrationError::TaskClosed {
                    item: item_id,
                    task: task.id,
                });
            }
        }

        let id = self.last_case.next();
        self.last_case = id;
        self.cases.insert(
            id,
            ArbitrationCase {
                id,
                item: item_id,
                task: task.id,
                reporter,
                evidence_ref: evidence_ref.to_string(),
                contested,
                state: CaseState::Reported,
                verdict: None,
                resolved_by: None,
                resolution_evidence_ref: None,
                reversal: None,
                opened_at: now,
                resolved_at: None,
            },
        );
        self.open_by_item.insert(item_id, id);
        settlement.freeze(task.id);

        info!(
            case = %id,
            item = %item_id,
            task = %task.id,
            reporter = %reporter,
            contested = ?contested,
            "🚩 Arbitration case opened"
        );
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &mut self,
        case_id: CaseId,
        caller: AccountId,
        caller_is_authority: bool,
        verdict: ArbitrationVerdict,
        evidence_ref: &str,
        ctx: ArbitrationContext<'_>,
        now: Timestamp,
    ) -> Result<Resolution> {
        let case = self.case(case_id)?;
        if !caller_is_authority {
            return Err(ArbitrationError::Unauthorized(caller));
        }
        if case.state.is_terminal() {
            return Err(ArbitrationError::CaseAlreadyResolved(case_id));
        }
        let (item, task, reporter, contested) = (case.item, case.task, case.reporter, case.contested);

        let reversal = match verdict {
            ArbitrationVerdict::Upheld => {
                ctx.settlement.unfreeze(task);
                None
            }
            ArbitrationVerdict::Overturned => {
                Some(self.overturn(case_id, item, contested, reporter, ctx, now)?)
            }
        };

        let Some(case) = self.cases.get_mut(&case_id) else {
            return Err(ArbitrationError::CaseNotFound(case_id));
        };
        case.state = CaseState::Resolved;
        case.verdict = Some(verdict);
        case.resolved_by = Some(caller);
        case.resolution_evidence_ref = Some(evidence_ref.to_string());
        case.reversal = reversal.clone();
        case.resolved_at = Some(now);
        self.open_by_item.remove(&item);

        info!(
            case = %case_id,
            item = %item,
            verdict = ?verdict,
            authority = %caller,
            "⚖️ Arbitration decision processed"
        );
        Ok(Resolution {
            case: case_id,
            verdict,
            reversal,
        })
    }

    fn overturn(
        &self,
        case_id: CaseId,
        item: ItemId,
        contested: Disposition,
        reporter: AccountId,
        mut ctx: ArbitrationContext<'_>,
        now: Timestamp,
    ) -> Result<ReversalReport> {
        let corrected = contested.flipped();
        let task_id = ctx.review.item(item)?.task_id;

        if corrected == Disposition::Adopted {
            let task = ctx.review.task(task_id)?;
            if let Some(adopted) = task.adopted_item.filter(|a| *a != item) {
                return Err(ArbitrationError::ConflictingAdoption { item, adopted });
            }
            if !task.is_open() {
                return Err(ArbitrationError::TaskClosed { item, task: task_id });
            }
        }

        // Refill the pool before the override restores stake out of it
        let mut reporter_credit_reverted = Vec::new();
        let prior_reporter = match self.last_overturn_into(item, contested) {
            Some((prior_case, prior)) => {
                let (undone, credit) =
                    Self::undo_reporter_reward(prior_case.reporter, prior, &mut ctx, now);
                reporter_credit_reverted.extend(credit);
                Some(undone)
            }
            None => None,
        };

        let outcome = ctx
            .review
            .override_disposition(item, corrected, ctx.accounts, now)?;

        let clawback = match corrected {
            Disposition::Deleted => ctx.settlement.claw_back_item(item, task_id, ctx.rewards),
            Disposition::Adopted => Default::default(),
        };
        ctx.settlement.unfreeze(task_id);

        let strategy = ctx.review.task(task_id)?.strategy;
        let resettled = if corrected == Disposition::Adopted && strategy.settles_on_adoption() {
            match ctx
                .settlement
                .settle(task_id, ctx.review, None, ctx.rewards, now)?
            {
                SettlementOutcome::Settled(record) => Some(record),
                other => {
                    debug!(task = %task_id, outcome = ?other, "No settlement after overturn");
                    None
                }
            }
        } else {
            None
        };

        let mut applied_credit = outcome.applied.credit.clone();
        let bonus = ctx.accounts.apply_credit(
            reporter,
            CreditEvent::ReporterVindicated,
            self.config.reporter_bonus,
            now,
        );
        applied_credit.push(CreditChange {
            account: reporter,
            event: CreditEvent::ReporterVindicated,
            applied: bonus,
        });

        let newly_slashed: Amount = outcome.applied.total_slashed();
        let wanted = newly_slashed.bps(self.config.reporter_reward_bps);
        let reporter_reward = ctx.accounts.take_from_pool(wanted);
        let stake_currency = ctx.accounts.config().stake_currency.clone();
        let bucket = ctx.rewards.bucket_for(now);
        ctx.rewards
            .lock(reporter, &stake_currency, bucket, reporter_reward)?;

        info!(
            case = %case_id,
            item = %item,
            from = ?contested,
            to = ?corrected,
            clawed = clawback.clawed_total().to_base_units(),
            unrecoverable = clawback.unrecoverable_total().to_base_units(),
            reporter_reward = reporter_reward.to_base_units(),
            "🔄 Disposition overturned"
        );

        Ok(ReversalReport {
            case: case_id,
            item,
            task: task_id,
            from: contested,
            to: corrected,
            reverted_credit: outcome
                .reverted_credit
                .into_iter()
                .chain(reporter_credit_reverted)
                .collect(),
            applied_credit,
            stake_restored: outcome.restored_stake,
            stake_slashed: outcome.applied.slashed,
            clawback,
            reporter_reward,
            reporter_reward_currency: stake_currency,
            reporter_reward_bucket: bucket,
            prior_reporter,
            resettled,
            task_reopened: outcome.task_reopened,
        })
    }

    /// Latest overturn that produced the item's current `disposition`.
    fn last_overturn_into(
        &self,
        item: ItemId,
        disposition: Disposition,
    ) -> Option<(&ArbitrationCase, &ReversalReport)> {
        self.cases_for_item(item)
            .into_iter()
            .rev()
            .filter_map(|c| c.reversal.as_ref().map(|r| (c, r)))
            .find(|(_, r)| r.to == disposition)
    }

    /// Takes back the bonus and reward paid for an overturn that is itself being reversed.
    /// A reward already claimed is charged to the reporter's stake instead.
    fn undo_reporter_reward(
        account: AccountId,
        prior: &ReversalReport,
        ctx: &mut ArbitrationContext<'_>,
        now: Timestamp,
    ) -> (ReporterReversal, Option<CreditChange>) {
        let bonus: i64 = prior
            .applied_credit
            .iter()
            .filter(|c| c.account == account && c.event == CreditEvent::ReporterVindicated)
            .map(|c| c.applied)
            .sum();
        let credit = (bonus != 0).then(|| CreditChange {
            account,
            event: CreditEvent::Reversal,
            applied: ctx.accounts.apply_credit(account, CreditEvent::Reversal, -bonus, now),
        });

        let reward_clawed = ctx.rewards.claw_back(
            account,
            &prior.reporter_reward_currency,
            prior.reporter_reward_bucket,
            prior.reporter_reward,
        );
        ctx.accounts.return_to_pool(reward_clawed);
        let shortfall = prior.reporter_reward.saturating_sub(reward_clawed);
        let stake_forfeited = ctx.accounts.forfeit_stake(account, shortfall, now);

        let undone = ReporterReversal {
            case: prior.case,
            account,
            credit_reverted: credit.as_ref().map_or(0, |c| c.applied),
            reward_clawed,
            stake_forfeited,
        };
        info!(
            case = %prior.case,
            reporter = %account,
            reward_clawed = reward_clawed.to_base_units(),
            stake_forfeited = stake_forfeited.to_base_units(),
            "↩️ Reporter reward reversed"
        );
        (undone, credit)
    }

    pub fn stats(&self) -> ArbitrationStats {
        let mut stats = ArbitrationStats::default();
        for case in self.cases.values() {
            stats.total_cases += 1;
            match case.verdict {
                None => stats.open += 1,
                Some(ArbitrationVerdict::Upheld) => stats.upheld += 1,
                Some(ArbitrationVerdict::Overturned) => stats.overturned += 1,
            }
        }
        stats
    }
}
