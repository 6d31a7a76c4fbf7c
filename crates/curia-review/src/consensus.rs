use crate::audit::Tally;
use crate::error::{Result, ReviewError};
use crate::registry::{Item, ItemRegistry, ItemSpec, Task, TaskSpec};
use curia_ledger::{AccountLedger, CreditEvent};
use curia_types::{
    AccountId, Amount, Disposition, ItemId, ItemState, Strategy, TaskId, TaskState, Timestamp,
    Verdict,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub submitter_adopted: i64,          // +15
    pub submitter_deleted: i64,          // -150
    pub reviewer_correct: i64,           // +10
    pub reviewer_wrong: i64,             // -100
    pub wrong_review_stake_bps: u32,     // 4%
    pub malicious_submit_stake_bps: u32, // 10%
    pub min_reviewer_stake: Amount,      // any stake
    pub min_reviewer_credit: i64,
    pub min_submitter_credit: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            submitter_adopted: 15,
            submitter_deleted: -150,
            reviewer_correct: 10,
            reviewer_wrong: -100,
            wrong_review_stake_bps: 400,
            malicious_submit_stake_bps: 1_000,
            min_reviewer_stake: Amount::from_base_units(1),
            min_reviewer_credit: 1,
            min_submitter_credit: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: AccountId,
    pub verdict: Verdict,
    pub cast_at: Timestamp,
}

/// Every vote cast on one item, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub votes: Vec<Vote>,
}

impl Ballot {
    pub fn has_voted(&self, voter: &AccountId) -> bool {
        self.votes.iter().any(|v| &v.voter == voter)
    }

    pub fn voters(&self, verdict: Verdict) -> impl Iterator<Item = AccountId> + '_ {
        self.votes
            .iter()
            .filter(move |v| v.verdict == verdict)
            .map(|v| v.voter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditChange {
    pub account: AccountId,
    pub event: CreditEvent,
    /// Delta actually applied after clamping.
    pub applied: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeChange {
    pub account: AccountId,
    pub amount: Amount,
}

/// Consequences applied when an item received its disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationRecord {
    pub item: ItemId,
    pub task: TaskId,
    pub disposition: Disposition,
    pub credit: Vec<CreditChange>,
    pub slashed: Vec<StakeChange>,
    pub finalized_at: Timestamp,
}

impl FinalizationRecord {
    pub fn total_slashed(&self) -> Amount {
        self.slashed.iter().map(|s| s.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteOutcome {
    Recorded {
        item: ItemId,
        tally: Tally,
        quorum: u32,
    },
    Finalized {
        record: FinalizationRecord,
        rejected_siblings: Vec<ItemId>,
    },
}

/// Result of an arbitration override: what was undone and what replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub item: ItemId,
    pub task: TaskId,
    pub from: Disposition,
    pub to: Disposition,
    pub reverted_credit: Vec<CreditChange>,
    pub restored_stake: Vec<StakeChange>,
    pub applied: FinalizationRecord,
    pub task_reopened: bool,
    pub rejected_siblings: Vec<ItemId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub tasks: usize,
    pub open_tasks: usize,
    pub items: usize,
    pub pending: usize,
    pub adopted: usize,
    pub deleted: usize,
    pub rejected: usize,
    pub votes: usize,
}

/// Review consensus over the item registry.
#[derive(Debug, Clone)]
pub struct ReviewEngine {
    config: ReviewConfig,
    registry: ItemRegistry,
    ballots: BTreeMap<ItemId, Ballot>,
    finalizations: BTreeMap<ItemId, FinalizationRecord>,
}

impl ReviewEngine {
    pub fn new(config: ReviewConfig) -> Self {
        Self {
            config,
            registry: ItemRegistry::new(),
            ballots: BTreeMap::new(),
            finalizations: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.registry.task(id)
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.registry.item(id)
    }

    pub fn ballot(&self, item: ItemId) -> Option<&Ballot> {
        self.ballots.get(&item)
    }

    pub fn finalization(&self, item: ItemId) -> Option<&FinalizationRecord> {
        self.finalizations.get(&item)
    }

    /// Reviewers whose vote agreed with the item's current disposition.
    pub fn agreeing_reviewers(&self, item: ItemId) -> Vec<AccountId> {
        let Ok(item) = self.registry.item(item) else {
            return Vec::new();
        };
        let Some(disposition) = item.state.disposition() else {
            return Vec::new();
        };
        let verdict = match disposition {
            Disposition::Adopted => Verdict::Support,
            Disposition::Deleted => Verdict::Reject,
        };
        self.ballots
            .get(&item.id)
            .map(|b| b.voters(verdict).collect())
            .unwrap_or_default()
    }

    pub fn open_task(&mut self, spec: TaskSpec, now: Timestamp) -> Result<TaskId> {
        spec.audit_rule.validate()?;
        if spec.reward_amount.is_zero() {
            return Err(ReviewError::InvalidTask("reward_amount must be positive".to_string()));
        }
        if spec.deadline <= now {
            return Err(ReviewError::InvalidTask(format!(
                "deadline {} is not after {}",
                spec.deadline, now
            )));
        }
        if spec.strategy == Strategy::Divide && !spec.currency.is_platform() {
            return Err(ReviewError::InvalidTask(
                "divide tasks pay in platform receipt tokens".to_string(),
            ));
        }

        let requester = spec.requester;
        let strategy = spec.strategy;
        let reward = spec.reward_amount;
        let id = self.registry.insert_task(spec, now);

        info!(
            task = %id,
            requester = %requester,
            strategy = %strategy,
            reward = reward.to_base_units(),
            "📋 Task opened"
        );
        Ok(id)
    }

    pub fn submit_item(
        &mut self,
        spec: ItemSpec,
        accounts: &AccountLedger,
        now: Timestamp,
    ) -> Result<ItemId> {
        let task = self.registry.task(spec.task_id)?;
        if !task.is_open() {
            return Err(ReviewError::TaskClosed(task.id));
        }
        if now > task.deadline {
            return Err(ReviewError::TaskExpired {
                task: task.id,
                deadline: task.deadline,
                now,
            });
        }

        let credit = accounts.credit(&spec.submitter);
        if credit < self.config.min_submitter_credit {
            return Err(ReviewError::CreditTooLow {
                account: spec.submitter,
                required: self.config.min_submitter_credit,
                actual: credit,
            });
        }

        let existing = self
            .registry
            .items_of(task.id)
            .filter(|i| i.state != ItemState::Deleted)
            .map(|i| (i.id, i.fingerprint));
        if let Some((similar_to, distance)) =
            task.detection_rule.find_duplicate(spec.fingerprint, existing)
        {
            warn!(
                task = %task.id,
                submitter = %spec.submitter,
                similar_to = %similar_to,
                distance,
                "⚠️ Duplicate submission refused"
            );
            return Err(ReviewError::DuplicateItem {
                task: task.id,
                similar_to,
                distance,
            });
        }

        let submitter = spec.submitter;
        let task_id = spec.task_id;
        let id = self.registry.insert_item(spec, now);
        info!(item = %id, task = %task_id, submitter = %submitter, "📥 Item submitted");
        Ok(id)
    }

    pub fn cast_vote(
        &mut self,
        item_id: ItemId,
        voter: AccountId,
        verdict: Verdict,
        accounts: &mut AccountLedger,
        now: Timestamp,
    ) -> Result<VoteOutcome> {
        let item = self.registry.item(item_id)?;

        let stake = accounts.stake(&voter);
        if stake.is_zero() || stake < self.config.min_reviewer_stake {
            return Err(ReviewError::NotStaked(voter));
        }
        let credit = accounts.credit(&voter);
        if credit < self.config.min_reviewer_credit {
            return Err(ReviewError::CreditTooLow {
                account: voter,
                required: self.config.min_reviewer_credit,
                actual: credit,
            });
        }
        if item.submitter == voter {
            return Err(ReviewError::SelfReview {
                item: item_id,
                account: voter,
            });
        }
        if self
            .ballots
            .get(&item_id)
            .is_some_and(|b| b.has_voted(&voter))
        {
            return Err(ReviewError::AlreadyVoted {
                item: item_id,
                voter,
            });
        }
        if item.state != ItemState::Pending {
            return Err(ReviewError::ItemNotPending {
                item: item_id,
                state: item.state,
            });
        }

        let task_id = item.task_id;
        let rule = self.registry.task(task_id)?.audit_rule;

        self.ballots.entry(item_id).or_default().votes.push(Vote {
            voter,
            verdict,
            cast_at: now,
        });
        let item = self.registry.item_mut(item_id)?;
        match verdict {
            Verdict::Support => item.positive_votes += 1,
            Verdict::Reject => item.negative_votes += 1,
        }
        let tally = item.tally();

        info!(
            item = %item_id,
            voter = %voter,
            verdict = ?verdict,
            support = tally.support,
            reject = tally.reject,
            quorum = rule.quorum(),
            "🗳️ Vote cast"
        );

        match rule.resolve(&tally) {
            None => Ok(VoteOutcome::Recorded {
                item: item_id,
                tally,
                quorum: rule.quorum(),
            }),
            Some(disposition) => {
                let (record, rejected_siblings) =
                    self.finalize(item_id, disposition, accounts, now)?;
                Ok(VoteOutcome::Finalized {
                    record,
                    rejected_siblings,
                })
            }
        }
    }

    fn finalize(
        &mut self,
        item_id: ItemId,
        disposition: Disposition,
        accounts: &mut AccountLedger,
        now: Timestamp,
    ) -> Result<(FinalizationRecord, Vec<ItemId>)> {
        self.registry
            .transition(item_id, disposition.item_state(), now)?;
        let task_id = self.registry.item(item_id)?.task_id;

        let rejected_siblings = match disposition {
            Disposition::Adopted => self.registry.close_on_adoption(task_id, item_id, now)?,
            Disposition::Deleted => Vec::new(),
        };

        let record = self.apply_consequences(item_id, disposition, accounts, now)?;
        match disposition {
            Disposition::Adopted => info!(
                item = %item_id,
                task = %task_id,
                rejected_siblings = rejected_siblings.len(),
                slashed = record.total_slashed().to_base_units(),
                "✅ Item adopted"
            ),
            Disposition::Deleted => info!(
                item = %item_id,
                task = %task_id,
                slashed = record.total_slashed().to_base_units(),
                "🗑️ Item deleted"
            ),
        }
        self.finalizations.insert(item_id, record.clone());
        Ok((record, rejected_siblings))
    }

    /// Credit and stake consequences of `disposition` for the submitter and every voter.
    fn apply_consequences(
        &self,
        item_id: ItemId,
        disposition: Disposition,
        accounts: &mut AccountLedger,
        now: Timestamp,
    ) -> Result<FinalizationRecord> {
        let item = self.registry.item(item_id)?;
        let cfg = &self.config;
        let mut credit = Vec::new();
        let mut slashed = Vec::new();

        let (event, delta) = match disposition {
            Disposition::Adopted => (CreditEvent::SubmissionAdopted, cfg.submitter_adopted),
            Disposition::Deleted => (CreditEvent::SubmissionDeleted, cfg.submitter_deleted),
        };
        credit.push(CreditChange {
            account: item.submitter,
            event,
            applied: accounts.apply_credit(item.submitter, event, delta, now),
        });
        if disposition == Disposition::Deleted {
            let amount = accounts.slash(item.submitter, cfg.malicious_submit_stake_bps, now);
            if !amount.is_zero() {
                slashed.push(StakeChange {
                    account: item.submitter,
                    amount,
                });
            }
        }

        for vote in self.ballots.get(&item_id).map(|b| b.votes.as_slice()).unwrap_or_default() {
            if vote.verdict.agrees_with(disposition) {
                let event = CreditEvent::ReviewCorrect;
                credit.push(CreditChange {
                    account: vote.voter,
                    event,
                    applied: accounts.apply_credit(vote.voter, event, cfg.reviewer_correct, now),
                });
            } else {
                let event = CreditEvent::ReviewWrong;
                credit.push(CreditChange {
                    account: vote.voter,
                    event,
                    applied: accounts.apply_credit(vote.voter, event, cfg.reviewer_wrong, now),
                });
                let amount = accounts.slash(vote.voter, cfg.wrong_review_stake_bps, now);
                if !amount.is_zero() {
                    slashed.push(StakeChange {
                        account: vote.voter,
                        amount,
                    });
                }
            }
        }

        Ok(FinalizationRecord {
            item: item_id,
            task: item.task_id,
            disposition,
            credit,
            slashed,
            finalized_at: now,
        })
    }

    /// Replaces a finalized disposition with its opposite, reversing recorded consequences first.
    pub fn override_disposition(
        &mut self,
        item_id: ItemId,
        to: Disposition,
        accounts: &mut AccountLedger,
        now: Timestamp,
    ) -> Result<Override> {
        let item = self.registry.item(item_id)?;
        let from = item.state.disposition().ok_or(ReviewError::InvalidTransition {
            item: item_id,
            from: item.state,
            to: to.item_state(),
        })?;
        if from == to {
            return Err(ReviewError::InvalidTransition {
                item: item_id,
                from: item.state,
                to: to.item_state(),
            });
        }
        let task_id = item.task_id;
        let task = self.registry.task(task_id)?;
        if to == Disposition::Adopted {
            if let Some(adopted) = task.adopted_item.filter(|a| *a != item_id) {
                return Err(ReviewError::TaskAlreadyAdopted {
                    task: task_id,
                    adopted,
                });
            }
            // Expired tasks have refunded their budget
            if !task.is_open() {
                return Err(ReviewError::TaskClosed(task_id));
            }
        }

        let mut reverted_credit = Vec::new();
        let mut restored_stake = Vec::new();
        if let Some(previous) = self.finalizations.remove(&item_id) {
            for change in &previous.credit {
                let applied =
                    accounts.apply_credit(change.account, CreditEvent::Reversal, -change.applied, now);
                reverted_credit.push(CreditChange {
                    account: change.account,
                    event: CreditEvent::Reversal,
                    applied,
                });
            }
            for slash in &previous.slashed {
                let amount = accounts.restore_slashed(slash.account, slash.amount, now);
                if amount < slash.amount {
                    warn!(
                        account = %slash.account,
                        expected = slash.amount.to_base_units(),
                        restored = amount.to_base_units(),
                        "⚠️ Penalty pool short while restoring stake"
                    );
                }
                restored_stake.push(StakeChange {
                    account: slash.account,
                    amount,
                });
            }
        } else {
            debug!(item = %item_id, "No finalization record to revert");
        }

        self.registry.transition(item_id, to.item_state(), now)?;
        let (task_reopened, rejected_siblings) = match to {
            Disposition::Deleted => {
                let reopen = self.registry.task(task_id)?.adopted_item == Some(item_id);
                if reopen {
                    self.registry.reopen(task_id)?;
                }
                (reopen, Vec::new())
            }
            Disposition::Adopted => (
                false,
                self.registry.close_on_adoption(task_id, item_id, now)?,
            ),
        };

        let applied = self.apply_consequences(item_id, to, accounts, now)?;
        self.finalizations.insert(item_id, applied.clone());

        info!(
            item = %item_id,
            task = %task_id,
            from = ?from,
            to = ?to,
            reverted = reverted_credit.len(),
            task_reopened,
            "⚖️ Disposition overridden"
        );

        Ok(Override {
            item: item_id,
            task: task_id,
            from,
            to,
            reverted_credit,
            restored_stake,
            applied,
            task_reopened,
            rejected_siblings,
        })
    }

    /// Closes an open task whose deadline has passed, rejecting its pending items.
    pub fn close_expired_task(&mut self, task_id: TaskId, now: Timestamp) -> Result<Vec<ItemId>> {
        let task = self.registry.task(task_id)?;
        if !task.is_open() {
            return Err(ReviewError::TaskClosed(task_id));
        }
        if now <= task.deadline {
            return Err(ReviewError::TaskNotExpired {
                task: task_id,
                deadline: task.deadline,
                now,
            });
        }
        let rejected = self.registry.close_without_adoption(task_id, now)?;
        info!(task = %task_id, rejected = rejected.len(), "⌛ Task expired");
        Ok(rejected)
    }

    pub fn stats(&self) -> ReviewStats {
        let mut stats = ReviewStats::default();
        for task in self.registry.tasks() {
            stats.tasks += 1;
            if task.state == TaskState::Open {
                stats.open_tasks += 1;
            }
        }
        for item in self.registry.items() {
            stats.items += 1;
            match item.state {
                ItemState::Pending => stats.pending += 1,
                ItemState::Adopted => stats.adopted += 1,
                ItemState::Deleted => stats.deleted += 1,
                ItemState::Rejected => stats.rejected += 1,
            }
        }
        stats.votes = self.ballots.values().map(|b| b.votes.len()).sum();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditRule;
    use crate::detection::DetectionRule;
    use curia_ledger::LedgerConfig;
    use curia_types::{BoxId, Currency, PlatformId};

    struct Fixture {
        engine: ReviewEngine,
        accounts: AccountLedger,
    }

    fn account(name: &str) -> AccountId {
        AccountId::derive(name)
    }

    fn fixture() -> Fixture {
        let mut accounts = AccountLedger::new(LedgerConfig::default());
        for name in ["r1", "r2", "r3", "r4", "submitter"] {
            accounts
                .deposit_stake(account(name), Amount::from_base_units(1_000), 0)
                .unwrap();
        }
        Fixture {
            engine: ReviewEngine::new(ReviewConfig::default()),
            accounts,
        }
    }

    fn task_spec(rule: AuditRule) -> TaskSpec {
        TaskSpec {
            requester: account("requester"),
            platform: PlatformId(1),
            box_id: BoxId(1),
            strategy: Strategy::OneTime,
            reward_amount: Amount::from_base_units(100),
            currency: Currency::token("CUR"),
            audit_rule: rule,
            detection_rule: DetectionRule::default(),
            deadline: 10_000,
        }
    }

    fn submit(f: &mut Fixture, task: TaskId, fingerprint: u64) -> ItemId {
        f.engine
            .submit_item(
                ItemSpec {
                    task_id: task,
                    submitter: account("submitter"),
                    fingerprint,
                },
                &f.accounts,
                1,
            )
            .unwrap()
    }

    #[test]
    fn test_majority_three_adopts_after_two_supports() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::Majority { quorum: 3 }), 0).unwrap();
        let item = submit(&mut f, task, 0);

        let out = f.engine.cast_vote(item, account("r1"), Verdict::Reject, &mut f.accounts, 2).unwrap();
        assert!(matches!(out, VoteOutcome::Recorded { .. }));
        f.engine.cast_vote(item, account("r2"), Verdict::Support, &mut f.accounts, 3).unwrap();
        let out = f.engine.cast_vote(item, account("r3"), Verdict::Support, &mut f.accounts, 4).unwrap();

        let VoteOutcome::Finalized { record, .. } = out else {
            panic!("expected finalization");
        };
        assert_eq!(record.disposition, Disposition::Adopted);
        assert_eq!(f.engine.item(item).unwrap().state, ItemState::Adopted);
        assert_eq!(f.engine.task(task).unwrap().adopted_item, Some(item));

        assert_eq!(f.accounts.credit(&account("submitter")), 1_015);
        assert_eq!(f.accounts.credit(&account("r2")), 1_010);
        assert_eq!(f.accounts.credit(&account("r3")), 1_010);
        assert_eq!(f.accounts.credit(&account("r1")), 900);
        assert_eq!(f.accounts.stake(&account("r1")), Amount::from_base_units(960));
        assert_eq!(record.total_slashed(), Amount::from_base_units(40));

        let mut reviewers = f.engine.agreeing_reviewers(item);
        reviewers.sort();
        let mut expected = vec![account("r2"), account("r3")];
        expected.sort();
        assert_eq!(reviewers, expected);
    }

    #[test]
    fn test_vote_rejections() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::Majority { quorum: 1 }), 0).unwrap();
        let item = submit(&mut f, task, 0);

        let err = f
            .engine
            .cast_vote(item, account("unstaked"), Verdict::Support, &mut f.accounts, 2)
            .unwrap_err();
        assert_eq!(err, ReviewError::NotStaked(account("unstaked")));

        let err = f
            .engine
            .cast_vote(item, account("submitter"), Verdict::Support, &mut f.accounts, 2)
            .unwrap_err();
        assert!(matches!(err, ReviewError::SelfReview { .. }));

        f.engine.cast_vote(item, account("r1"), Verdict::Support, &mut f.accounts, 2).unwrap();
        let err = f
            .engine
            .cast_vote(item, account("r1"), Verdict::Support, &mut f.accounts, 3)
            .unwrap_err();
        assert!(matches!(err, ReviewError::AlreadyVoted { .. }));

        let err = f
            .engine
            .cast_vote(item, account("r2"), Verdict::Reject, &mut f.accounts, 3)
            .unwrap_err();
        assert!(matches!(err, ReviewError::ItemNotPending { .. }));
        assert_eq!(f.engine.item(item).unwrap().tally().total(), 1);
    }

    #[test]
    fn test_even_quorum_tie_deletes_and_slashes_submitter() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::Majority { quorum: 4 }), 0).unwrap();
        let item = submit(&mut f, task, 0);

        for (voter, verdict) in [
            ("r1", Verdict::Support),
            ("r2", Verdict::Reject),
            ("r3", Verdict::Support),
            ("r4", Verdict::Reject),
        ] {
            f.engine.cast_vote(item, account(voter), verdict, &mut f.accounts, 2).unwrap();
        }

        assert_eq!(f.engine.item(item).unwrap().state, ItemState::Deleted);
        assert_eq!(f.accounts.credit(&account("submitter")), 850);
        assert_eq!(f.accounts.stake(&account("submitter")), Amount::from_base_units(900));
        assert_eq!(f.accounts.credit(&account("r2")), 1_010);
        assert_eq!(f.accounts.credit(&account("r1")), 900);
        assert!(f.engine.task(task).unwrap().is_open());
    }

    #[test]
    fn test_duplicate_submission_refused() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::default()), 0).unwrap();
        let first = submit(&mut f, task, 0b1010);

        let err = f
            .engine
            .submit_item(
                ItemSpec {
                    task_id: task,
                    submitter: account("copycat"),
                    fingerprint: 0b1011,
                },
                &f.accounts,
                2,
            )
            .unwrap_err();
        assert_eq!(
            err,
            ReviewError::DuplicateItem {
                task,
                similar_to: first,
                distance: 1
            }
        );
    }

    #[test]
    fn test_submission_gates() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::default()), 0).unwrap();

        let late = ItemSpec {
            task_id: task,
            submitter: account("late"),
            fingerprint: u64::MAX,
        };
        assert!(matches!(
            f.engine.submit_item(late, &f.accounts, 10_001),
            Err(ReviewError::TaskExpired { .. })
        ));

        f.accounts
            .apply_credit(account("broke"), CreditEvent::SubmissionDeleted, -5_000, 0);
        let broke = ItemSpec {
            task_id: task,
            submitter: account("broke"),
            fingerprint: u64::MAX,
        };
        assert!(matches!(
            f.engine.submit_item(broke, &f.accounts, 5),
            Err(ReviewError::CreditTooLow { .. })
        ));

        let mut bad = task_spec(AuditRule::default());
        bad.strategy = Strategy::Divide;
        assert!(matches!(f.engine.open_task(bad, 0), Err(ReviewError::InvalidTask(_))));
    }

    #[test]
    fn test_override_restores_prior_consequences() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::Majority { quorum: 3 }), 0).unwrap();
        let item = submit(&mut f, task, 0);
        f.engine.cast_vote(item, account("r1"), Verdict::Reject, &mut f.accounts, 2).unwrap();
        f.engine.cast_vote(item, account("r2"), Verdict::Support, &mut f.accounts, 2).unwrap();
        f.engine.cast_vote(item, account("r3"), Verdict::Support, &mut f.accounts, 2).unwrap();

        let out = f
            .engine
            .override_disposition(item, Disposition::Deleted, &mut f.accounts, 5)
            .unwrap();
        assert!(out.task_reopened);
        assert_eq!(out.restored_stake.len(), 1);
        assert_eq!(f.engine.item(item).unwrap().state, ItemState::Deleted);
        assert!(f.engine.task(task).unwrap().is_open());

        // Same as if the item had been deleted from the start
        assert_eq!(f.accounts.credit(&account("submitter")), 850);
        assert_eq!(f.accounts.credit(&account("r1")), 1_010);
        assert_eq!(f.accounts.stake(&account("r1")), Amount::from_base_units(1_000));
        assert_eq!(f.accounts.credit(&account("r2")), 900);
        assert_eq!(f.accounts.stake(&account("r2")), Amount::from_base_units(960));

        let err = f
            .engine
            .override_disposition(item, Disposition::Deleted, &mut f.accounts, 6)
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    }

    #[test]
    fn test_close_expired_task() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::default()), 0).unwrap();
        let item = submit(&mut f, task, 0);

        assert!(matches!(
            f.engine.close_expired_task(task, 100),
            Err(ReviewError::TaskNotExpired { .. })
        ));
        assert_eq!(f.engine.close_expired_task(task, 10_001).unwrap(), vec![item]);
        assert_eq!(f.engine.item(item).unwrap().state, ItemState::Rejected);
        assert!(matches!(
            f.engine.close_expired_task(task, 10_002),
            Err(ReviewError::TaskClosed(_))
        ));

        let stats = f.engine.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.open_tasks, 0);
    }

    #[test]
    fn test_expired_task_cannot_adopt_by_override() {
        let mut f = fixture();
        let task = f.engine.open_task(task_spec(AuditRule::default()), 0).unwrap();
        let item = submit(&mut f, task, 0);
        f.engine.cast_vote(item, account("r1"), Verdict::Reject, &mut f.accounts, 2).unwrap();
        f.engine.cast_vote(item, account("r2"), Verdict::Reject, &mut f.accounts, 3).unwrap();
        f.engine.close_expired_task(task, 10_001).unwrap();

        let err = f
            .engine
            .override_disposition(item, Disposition::Adopted, &mut f.accounts, 10_002)
            .unwrap_err();
        assert!(matches!(err, ReviewError::TaskClosed(t) if t == task));
        assert_eq!(f.engine.item(item).unwrap().state, ItemState::Deleted);
        assert_eq!(f.accounts.credit(&account("submitter")), 850);
    }

    #[test]
    fn test_overflowing_threshold_refused_at_open() {
        let mut f = fixture();
        let rule = AuditRule::Threshold {
            adopt_at: u32::MAX,
            delete_at: u32::MAX,
        };
        assert!(matches!(
            f.engine.open_task(task_spec(rule), 0),
            Err(ReviewError::InvalidAuditRule(_))
        ));
        assert_eq!(f.engine.stats().tasks, 0);
    }
}
