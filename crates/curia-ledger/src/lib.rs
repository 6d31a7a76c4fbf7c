/*!
# Curia Ledger

Account-level bookkeeping for the curation protocol.

- **accounts**: credit score and staked deposit per account, plus the penalty
  pool that slashed stake flows into
- **rewards**: locked rewards keyed by `(account, currency, day bucket)`,
  claimable once the bucket matures

Neither ledger moves funds. They record entitlements; the engine facade turns
the recorded changes into token-service effects.
*/

pub mod accounts;
pub mod error;
pub mod rewards;

pub use accounts::{Account, AccountLedger, CreditEvent, LedgerConfig};
pub use error::{LedgerError, Result};
pub use rewards::{ClaimReceipt, RewardLedger};
