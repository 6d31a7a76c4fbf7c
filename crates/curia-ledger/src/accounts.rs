use crate::error::{LedgerError, Result};
use curia_types::{AccountId, Amount, Currency, Timestamp, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub baseline_credit: i64,       // score every account starts with
    pub min_credit: i64,            // lower clamp
    pub max_credit: i64,            // upper clamp
    pub bucket_secs: u64,           // 1 day
    pub maturity_window_secs: u64,  // 1 day
    pub stake_currency: Currency,   // stakes, penalties and reporter rewards
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            baseline_credit: 1_000,
            min_credit: 0,
            max_credit: 10_000,
            bucket_secs: SECONDS_PER_DAY,
            maturity_window_secs: SECONDS_PER_DAY,
            stake_currency: Currency::token("CUR"),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_credit > self.max_credit {
            return Err(LedgerError::InvalidConfiguration(format!(
                "min_credit {} exceeds max_credit {}",
                self.min_credit, self.max_credit
            )));
        }
        if !(self.min_credit..=self.max_credit).contains(&self.baseline_credit) {
            return Err(LedgerError::InvalidConfiguration(format!(
                "baseline_credit {} outside [{}, {}]",
                self.baseline_credit, self.min_credit, self.max_credit
            )));
        }
        if self.bucket_secs == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "bucket_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The only reasons a credit score may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditEvent {
    SubmissionAdopted,
    SubmissionDeleted,
    ReviewCorrect,
    ReviewWrong,
    ReporterVindicated,
    /// Undo of a previously applied event after an arbitration override.
    Reversal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub credit_score: i64,
    pub staked: Amount,
    pub slashed_total: Amount,
    pub opened_at: Timestamp,
}

/// Credit scores, stakes and the penalty pool.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    config: LedgerConfig,
    accounts: BTreeMap<AccountId, Account>,
    penalty_pool: Amount,
}

impl AccountLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            accounts: BTreeMap::new(),
            penalty_pool: Amount::ZERO,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Credit score, or the baseline for an account that has never been seen.
    pub fn credit(&self, id: &AccountId) -> i64 {
        self.accounts
            .get(id)
            .map(|a| a.credit_score)
            .unwrap_or(self.config.baseline_credit)
    }

    pub fn stake(&self, id: &AccountId) -> Amount {
        self.accounts.get(id).map(|a| a.staked).unwrap_or(Amount::ZERO)
    }

    pub fn penalty_pool(&self) -> Amount {
        self.penalty_pool
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn entry(&mut self, id: AccountId, now: Timestamp) -> &mut Account {
        let baseline = self.config.baseline_credit;
        self.accounts.entry(id).or_insert_with(|| {
            debug!(account = %id, "✨ Account opened");
            Account {
                id,
                credit_score: baseline,
                staked: Amount::ZERO,
                slashed_total: Amount::ZERO,
                opened_at: now,
            }
        })
    }

    pub fn deposit_stake(&mut self, id: AccountId, amount: Amount, now: Timestamp) -> Result<Amount> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let account = self.entry(id, now);
        let before = account.staked;
        account.staked = before.checked_add(amount).ok_or(LedgerError::Overflow(id))?;

        info!(
            account = %id,
            amount = amount.to_base_units(),
            stake_before = before.to_base_units(),
            stake_after = account.staked.to_base_units(),
            "🔒 Stake deposited"
        );
        Ok(account.staked)
    }

    pub fn withdraw_stake(&mut self, id: AccountId, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        let before = account.staked;
        account.staked = before
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientStake {
                account: id,
                staked: before,
                requested: amount,
            })?;

        info!(
            account = %id,
            amount = amount.to_base_units(),
            stake_before = before.to_base_units(),
            stake_after = account.staked.to_base_units(),
            "🔓 Stake withdrawn"
        );
        Ok(account.staked)
    }

    /// Applies a credit delta clamped to the configured range and returns the delta actually applied.
    pub fn apply_credit(
        &mut self,
        id: AccountId,
        event: CreditEvent,
        delta: i64,
        now: Timestamp,
    ) -> i64 {
        let (min, max) = (self.config.min_credit, self.config.max_credit);
        let account = self.entry(id, now);
        let before = account.credit_score;
        let after = before.saturating_add(delta).clamp(min, max);
        account.credit_score = after;

        let applied = after - before;
        info!(
            account = %id,
            event = ?event,
            requested = delta,
            applied,
            credit_before = before,
            credit_after = after,
            "📊 Credit adjusted"
        );
        applied
    }

    /// Moves `bps` of the account's stake into the penalty pool. Returns the amount slashed.
    pub fn slash(&mut self, id: AccountId, bps: u32, now: Timestamp) -> Amount {
        let account = self.entry(id, now);
        let slashed = account.staked.bps(bps);
        if slashed.is_zero() {
            debug!(account = %id, bps, "Nothing to slash");
            return Amount::ZERO;
        }
        account.staked = account.staked.saturating_sub(slashed);
        account.slashed_total = account.slashed_total.saturating_add(slashed);
        let remaining = account.staked;
        self.penalty_pool = self.penalty_pool.saturating_add(slashed);

        info!(
            account = %id,
            bps,
            slashed = slashed.to_base_units(),
            stake_after = remaining.to_base_units(),
            penalty_pool = self.penalty_pool.to_base_units(),
            "⚔️ Stake slashed"
        );
        slashed
    }

    /// Returns previously slashed stake from the penalty pool. Capped by what the pool holds.
    pub fn restore_slashed(&mut self, id: AccountId, amount: Amount, now: Timestamp) -> Amount {
        let restored = amount.min(self.penalty_pool);
        if restored.is_zero() {
            return Amount::ZERO;
        }
        self.penalty_pool = self.penalty_pool.saturating_sub(restored);
        let account = self.entry(id, now);
        account.staked = account.staked.saturating_add(restored);
        account.slashed_total = account.slashed_total.saturating_sub(restored);

        info!(
            account = %id,
            restored = restored.to_base_units(),
            stake_after = account.staked.to_base_units(),
            "♻️ Slashed stake restored"
        );
        restored
    }

    /// Withdraws from the penalty pool (reporter rewards). Capped by the pool balance.
    pub fn take_from_pool(&mut self, amount: Amount) -> Amount {
        let taken = amount.min(self.penalty_pool);
        self.penalty_pool = self.penalty_pool.saturating_sub(taken);
        if !taken.is_zero() {
            debug!(
                taken = taken.to_base_units(),
                penalty_pool = self.penalty_pool.to_base_units(),
                "Penalty pool drawn"
            );
        }
        taken
    }

    /// Puts previously drawn tokens back into the penalty pool.
    pub fn return_to_pool(&mut self, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        self.penalty_pool = self.penalty_pool.saturating_add(amount);
        debug!(
            returned = amount.to_base_units(),
            penalty_pool = self.penalty_pool.to_base_units(),
            "Penalty pool refilled"
        );
    }

    /// Moves a fixed amount of stake into the penalty pool. Capped by the current stake.
    pub fn forfeit_stake(&mut self, id: AccountId, amount: Amount, now: Timestamp) -> Amount {
        let account = self.entry(id, now);
        let forfeited = amount.min(account.staked);
        if forfeited.is_zero() {
            return Amount::ZERO;
        }
        account.staked = account.staked.saturating_sub(forfeited);
        account.slashed_total = account.slashed_total.saturating_add(forfeited);
        let remaining = account.staked;
        self.penalty_pool = self.penalty_pool.saturating_add(forfeited);

        warn!(
            account = %id,
            forfeited = forfeited.to_base_units(),
            stake_after = remaining.to_base_units(),
            "⚠️ Stake forfeited"
        );
        forfeited
    }
}
