use anyhow::{bail, Result};
use async_trait::async_trait;
use curia_types::{AccountId, Amount, BoxId, Currency, PlatformId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Fund custody primitives. The engine never holds balances itself.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn transfer(
        &self,
        currency: &Currency,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Issues platform receipt tokens. Cannot be undone, so the engine mints last.
    async fn mint_receipt(&self, account: AccountId, platform: PlatformId, amount: Amount) -> Result<()>;
}

/// Usage counters maintained by the platform catalogue.
#[async_trait]
pub trait UsageFeed: Send + Sync {
    async fn usage_counter(&self, box_id: BoxId) -> Result<u64>;
}

#[async_trait]
pub trait ArbitrationAuthority: Send + Sync {
    async fn is_arbitration_authority(&self, account: &AccountId) -> bool;
}

type BalanceMap = HashMap<(AccountId, Currency), Amount>;

/// In-memory token balances with optional failure injection.
#[derive(Clone, Default)]
pub struct MemoryTokenService {
    balances: Arc<RwLock<BalanceMap>>,
    receipts: Arc<RwLock<HashMap<(AccountId, PlatformId), Amount>>>,
    blocked: Arc<RwLock<HashSet<AccountId>>>,
}

impl MemoryTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits an account out of thin air (test and scenario funding).
    pub async fn fund(&self, account: AccountId, currency: &Currency, amount: Amount) {
        let mut balances = self.balances.write().await;
        let slot = balances.entry((account, currency.clone())).or_insert(Amount::ZERO);
        *slot = slot.saturating_add(amount);
    }

    pub async fn balance(&self, account: AccountId, currency: &Currency) -> Amount {
        self.balances
            .read()
            .await
            .get(&(account, currency.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub async fn receipts(&self, account: AccountId, platform: PlatformId) -> Amount {
        self.receipts
            .read()
            .await
            .get(&(account, platform))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Every transfer or mint touching `account` fails until unblocked.
    pub async fn block(&self, account: AccountId) {
        self.blocked.write().await.insert(account);
    }

    pub async fn unblock(&self, account: AccountId) {
        self.blocked.write().await.remove(&account);
    }
}

#[async_trait]
impl TokenService for MemoryTokenService {
    async fn transfer(
        &self,
        currency: &Currency,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        {
            let blocked = self.blocked.read().await;
            if blocked.contains(&from) || blocked.contains(&to) {
                bail!("transfer {} -> {} rejected by token service", from, to);
            }
        }

        let mut balances = self.balances.write().await;
        let from_key = (from, currency.clone());
        let available = balances.get(&from_key).copied().unwrap_or(Amount::ZERO);
        let Some(remaining) = available.checked_sub(amount) else {
            bail!(
                "insufficient {} balance for {}: has {}, needs {}",
                currency,
                from,
                available,
                amount
            );
        };
        balances.insert(from_key, remaining);
        let slot = balances.entry((to, currency.clone())).or_insert(Amount::ZERO);
        *slot = slot.saturating_add(amount);

        debug!(
            currency = %currency,
            from = %from,
            to = %to,
            amount = amount.to_base_units(),
            "Token transfer"
        );
        Ok(())
    }

    async fn mint_receipt(&self, account: AccountId, platform: PlatformId, amount: Amount) -> Result<()> {
        if self.blocked.read().await.contains(&account) {
            bail!("mint to {} rejected by token service", account);
        }
        let mut receipts = self.receipts.write().await;
        let slot = receipts.entry((account, platform)).or_insert(Amount::ZERO);
        *slot = slot.saturating_add(amount);

        info!(
            account = %account,
            platform = %platform,
            amount = amount.to_base_units(),
            "🪙 Receipt tokens minted"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryUsageFeed {
    counters: Arc<RwLock<HashMap<BoxId, u64>>>,
}

impl MemoryUsageFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, box_id: BoxId, counter: u64) {
        self.counters.write().await.insert(box_id, counter);
    }
}

#[async_trait]
impl UsageFeed for MemoryUsageFeed {
    async fn usage_counter(&self, box_id: BoxId) -> Result<u64> {
        Ok(self.counters.read().await.get(&box_id).copied().unwrap_or(0))
    }
}

/// Fixed set of arbitration authorities.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthority {
    members: HashSet<AccountId>,
}

impl StaticAuthority {
    pub fn new(members: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ArbitrationAuthority for StaticAuthority {
    async fn is_arbitration_authority(&self, account: &AccountId) -> bool {
        self.members.contains(account)
    }
}
