use curia_review::{CreditChange, StakeChange};
use curia_settlement::{ClawBack, SettlementRecord};
use curia_types::{
    AccountId, Amount, CaseId, Currency, DayBucket, Disposition, ItemId, TaskId, Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Reported,
    Resolved,
}

impl CaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!((self, next), (Self::Reported, Self::Resolved))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationVerdict {
    /// Original disposition stands.
    Upheld,
    /// Disposition flips.
    Overturned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationCase {
    pub id: CaseId,
    pub item: ItemId,
    pub task: TaskId,
    pub reporter: AccountId,
    pub evidence_ref: String,
    /// Disposition the report contests.
    pub contested: Disposition,
    pub state: CaseState,
    pub verdict: Option<ArbitrationVerdict>,
    pub resolved_by: Option<AccountId>,
    pub resolution_evidence_ref: Option<String>,
    pub reversal: Option<ReversalReport>,
    pub opened_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

impl ArbitrationCase {
    pub fn is_open(&self) -> bool {
        self.state == CaseState::Reported
    }
}

/// Everything an overturn changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalReport {
    pub case: CaseId,
    pub item: ItemId,
    pub task: TaskId,
    pub from: Disposition,
    pub to: Disposition,
    /// Undo of the previous disposition's credit deltas.
    pub reverted_credit: Vec<CreditChange>,
    /// Credit deltas of the corrected disposition, plus the reporter bonus.
    pub applied_credit: Vec<CreditChange>,
    /// Stake returned from the penalty pool.
    pub stake_restored: Vec<StakeChange>,
    /// Stake newly slashed into the penalty pool.
    pub stake_slashed: Vec<StakeChange>,
    pub clawback: ClawBack,
    pub reporter_reward: Amount,
    pub reporter_reward_currency: Currency,
    pub reporter_reward_bucket: DayBucket,
    /// Reward taken back from the reporter whose overturn this one undoes.
    pub prior_reporter: Option<ReporterReversal>,
    /// Settlement computed for a newly adopted item.
    pub resettled: Option<SettlementRecord>,
    pub task_reopened: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterReversal {
    pub case: CaseId,
    pub account: AccountId,
    pub credit_reverted: i64,
    /// Taken from the locked reward.
    pub reward_clawed: Amount,
    /// Charged to stake when the reward was already claimed.
    pub stake_forfeited: Amount,
}

impl ReporterReversal {
    /// Tokens returned to the penalty pool.
    pub fn recovered(&self) -> Amount {
        self.reward_clawed.saturating_add(self.stake_forfeited)
    }
}

impl ReversalReport {
    /// Net credit change per account across reversal and re-application.
    pub fn net_credit(&self, account: &AccountId) -> i64 {
        self.reverted_credit
            .iter()
            .chain(self.applied_credit.iter())
            .filter(|c| &c.account == account)
            .map(|c| c.applied)
            .sum()
    }
}
