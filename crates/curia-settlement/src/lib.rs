/*!
# Curia Settlement

Turns adopted items into locked rewards.

Each task carries one closed strategy:

- **OneTime**: the reward is split once, at adoption
- **Divide**: each trigger pays for the usage accrued since the task's watermark
- **OneTimeWithMortgage**: like OneTime, with part of the submitter share
  escrowed until the arbitration window passes

Settlement never moves funds. It appends to the reward ledger and keeps a
record of every share so arbitration can claw them back.
*/

pub mod engine;
pub mod error;
pub mod strategy;

pub use engine::{
    ClawBack, ClawedShare, Escrow, RecordKind, SettlementConfig, SettlementEngine,
    SettlementOutcome, SettlementRecord, SettlementStats,
};
pub use error::{Result, SettlementError};
pub use strategy::{compute_shares, Share, ShareContext, Split};
