use crate::accounts::LedgerConfig;
use crate::error::{LedgerError, Result};
use curia_types::{AccountId, Amount, Currency, DayBucket, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

type RewardKey = (AccountId, Currency, DayBucket);

/// Result of a claim. Immature buckets are reported, not treated as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub account: AccountId,
    pub currency: Currency,
    pub claimed: Vec<(DayBucket, Amount)>,
    pub skipped_immature: Vec<DayBucket>,
    pub total: Amount,
}

/// Locked rewards keyed by `(account, currency, day bucket)`.
#[derive(Debug, Clone)]
pub struct RewardLedger {
    bucket_secs: u64,
    maturity_window_secs: u64,
    entries: BTreeMap<RewardKey, Amount>,
}

impl RewardLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            bucket_secs: config.bucket_secs,
            maturity_window_secs: config.maturity_window_secs,
            entries: BTreeMap::new(),
        }
    }

    pub fn bucket_for(&self, now: Timestamp) -> DayBucket {
        DayBucket::from_timestamp(now, self.bucket_secs)
    }

    pub fn is_mature(&self, bucket: DayBucket, now: Timestamp) -> bool {
        bucket.is_mature(now, self.bucket_secs, self.maturity_window_secs)
    }

    /// Adds to the bucket and returns its new total. Locking zero is a no-op.
    pub fn lock(
        &mut self,
        account: AccountId,
        currency: &Currency,
        bucket: DayBucket,
        amount: Amount,
    ) -> Result<Amount> {
        let key = (account, currency.clone(), bucket);
        if amount.is_zero() {
            return Ok(self.entries.get(&key).copied().unwrap_or(Amount::ZERO));
        }
        let slot = self.entries.entry(key).or_insert(Amount::ZERO);
        *slot = slot.checked_add(amount).ok_or(LedgerError::Overflow(account))?;

        info!(
            account = %account,
            currency = %currency,
            bucket = %bucket,
            amount = amount.to_base_units(),
            locked = slot.to_base_units(),
            "🔒 Reward locked"
        );
        Ok(*slot)
    }

    /// Zeroes every mature bucket in `buckets` and returns what was released.
    pub fn claim(
        &mut self,
        account: AccountId,
        currency: &Currency,
        buckets: &[DayBucket],
        now: Timestamp,
    ) -> ClaimReceipt {
        let mut receipt = ClaimReceipt {
            account,
            currency: currency.clone(),
            claimed: Vec::new(),
            skipped_immature: Vec::new(),
            total: Amount::ZERO,
        };

        for &bucket in buckets {
            let key = (account, currency.clone(), bucket);
            let Some(&amount) = self.entries.get(&key) else {
                continue;
            };
            if !self.is_mature(bucket, now) {
                if !receipt.skipped_immature.contains(&bucket) {
                    receipt.skipped_immature.push(bucket);
                }
                continue;
            }
            self.entries.remove(&key);
            receipt.claimed.push((bucket, amount));
            receipt.total = receipt.total.saturating_add(amount);
        }

        if receipt.total.is_zero() {
            debug!(
                account = %account,
                currency = %currency,
                skipped = receipt.skipped_immature.len(),
                "Nothing claimable"
            );
        } else {
            info!(
                account = %account,
                currency = %currency,
                buckets = receipt.claimed.len(),
                total = receipt.total.to_base_units(),
                skipped = receipt.skipped_immature.len(),
                "🔓 Rewards claimed"
            );
        }
        receipt
    }

    /// Claims every bucket the account holds in this currency.
    pub fn claim_all(&mut self, account: AccountId, currency: &Currency, now: Timestamp) -> ClaimReceipt {
        let buckets = self.buckets(&account, currency);
        self.claim(account, currency, &buckets, now)
    }

    /// Removes up to `amount` from the bucket. Returns what was actually clawed back.
    pub fn claw_back(
        &mut self,
        account: AccountId,
        currency: &Currency,
        bucket: DayBucket,
        amount: Amount,
    ) -> Amount {
        let key = (account, currency.clone(), bucket);
        let Some(slot) = self.entries.get_mut(&key) else {
            if !amount.is_zero() {
                warn!(
                    account = %account,
                    currency = %currency,
                    bucket = %bucket,
                    requested = amount.to_base_units(),
                    "⚠️ Claw-back found nothing locked"
                );
            }
            return Amount::ZERO;
        };

        let clawed = amount.min(*slot);
        *slot = slot.saturating_sub(clawed);
        let remaining = *slot;
        if remaining.is_zero() {
            self.entries.remove(&key);
        }

        info!(
            account = %account,
            currency = %currency,
            bucket = %bucket,
            requested = amount.to_base_units(),
            clawed = clawed.to_base_units(),
            remaining = remaining.to_base_units(),
            "↩️ Reward clawed back"
        );
        clawed
    }

    pub fn locked(&self, account: &AccountId, currency: &Currency, bucket: DayBucket) -> Amount {
        self.entries
            .get(&(*account, currency.clone(), bucket))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn total_locked(&self, account: &AccountId, currency: &Currency) -> Amount {
        self.entries
            .iter()
            .filter(|((a, c, _), _)| a == account && c == currency)
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn buckets(&self, account: &AccountId, currency: &Currency) -> Vec<DayBucket> {
        self.entries
            .keys()
            .filter(|(a, c, _)| a == account && c == currency)
            .map(|(_, _, b)| *b)
            .collect()
    }

    /// Every `(currency, bucket, amount)` the account has locked.
    pub fn entries_for(&self, account: &AccountId) -> Vec<(Currency, DayBucket, Amount)> {
        self.entries
            .iter()
            .filter(|((a, _, _), _)| a == account)
            .map(|((_, c, b), amount)| (c.clone(), *b, *amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;

    fn ledger() -> RewardLedger {
        RewardLedger::new(&LedgerConfig::default())
    }

    fn cur() -> Currency {
        Currency::token("CUR")
    }

    #[test]
    fn test_lock_accumulates() {
        let mut l = ledger();
        let alice = AccountId::derive("alice");
        let bucket = l.bucket_for(DAY + 5);
        assert_eq!(bucket, DayBucket(1));

        l.lock(alice, &cur(), bucket, Amount::from_base_units(30)).unwrap();
        l.lock(alice, &cur(), bucket, Amount::from_base_units(12)).unwrap();
        l.lock(alice, &cur(), bucket, Amount::ZERO).unwrap();
        assert_eq!(l.locked(&alice, &cur(), bucket), Amount::from_base_units(42));
        assert_eq!(l.buckets(&alice, &cur()), vec![DayBucket(1)]);
    }

    #[test]
    fn test_claim_skips_immature_and_is_idempotent() {
        let mut l = ledger();
        let alice = AccountId::derive("alice");
        l.lock(alice, &cur(), DayBucket(1), Amount::from_base_units(80)).unwrap();
        l.lock(alice, &cur(), DayBucket(2), Amount::from_base_units(20)).unwrap();

        // day 2 starts at 2*DAY; bucket 1 is mature, bucket 2 is not
        let receipt = l.claim_all(alice, &cur(), 2 * DAY + 10);
        assert_eq!(receipt.total, Amount::from_base_units(80));
        assert_eq!(receipt.claimed, vec![(DayBucket(1), Amount::from_base_units(80))]);
        assert_eq!(receipt.skipped_immature, vec![DayBucket(2)]);

        let again = l.claim(alice, &cur(), &[DayBucket(1)], 2 * DAY + 10);
        assert_eq!(again.total, Amount::ZERO);
        assert!(again.claimed.is_empty());

        let later = l.claim_all(alice, &cur(), 3 * DAY);
        assert_eq!(later.total, Amount::from_base_units(20));
        assert_eq!(l.total_locked(&alice, &cur()), Amount::ZERO);
    }

    #[test]
    fn test_duplicate_buckets_in_request_pay_once() {
        let mut l = ledger();
        let alice = AccountId::derive("alice");
        l.lock(alice, &cur(), DayBucket(0), Amount::from_base_units(5)).unwrap();

        let receipt = l.claim(alice, &cur(), &[DayBucket(0), DayBucket(0)], DAY);
        assert_eq!(receipt.total, Amount::from_base_units(5));
        assert_eq!(receipt.claimed.len(), 1);
    }

    #[test]
    fn test_currencies_are_isolated() {
        let mut l = ledger();
        let alice = AccountId::derive("alice");
        let receipt_token = Currency::Platform(curia_types::PlatformId(3));
        l.lock(alice, &cur(), DayBucket(0), Amount::from_base_units(5)).unwrap();
        l.lock(alice, &receipt_token, DayBucket(0), Amount::from_base_units(7)).unwrap();

        let receipt = l.claim_all(alice, &receipt_token, DAY);
        assert_eq!(receipt.total, Amount::from_base_units(7));
        assert_eq!(l.total_locked(&alice, &cur()), Amount::from_base_units(5));
        assert_eq!(l.entries_for(&alice).len(), 1);
    }

    #[test]
    fn test_claw_back_never_goes_negative() {
        let mut l = ledger();
        let bob = AccountId::derive("bob");
        l.lock(bob, &cur(), DayBucket(4), Amount::from_base_units(10)).unwrap();

        assert_eq!(
            l.claw_back(bob, &cur(), DayBucket(4), Amount::from_base_units(4)),
            Amount::from_base_units(4)
        );
        assert_eq!(
            l.claw_back(bob, &cur(), DayBucket(4), Amount::from_base_units(100)),
            Amount::from_base_units(6)
        );
        assert_eq!(l.locked(&bob, &cur(), DayBucket(4)), Amount::ZERO);
        assert_eq!(
            l.claw_back(bob, &cur(), DayBucket(4), Amount::from_base_units(1)),
            Amount::ZERO
        );
    }
}
