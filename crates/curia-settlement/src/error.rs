use curia_ledger::LedgerError;
use curia_review::ReviewError;
use curia_types::{ErrorKind, HasErrorKind, TaskId, Timestamp};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SettlementError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Usage counter required to settle divide task {0}")]
    UsageCounterRequired(TaskId),

    #[error("No escrow held for task {0}")]
    EscrowNotFound(TaskId),

    #[error("Escrow for task {task} releasable at {releasable_at}, current {now}")]
    EscrowNotReleasable {
        task: TaskId,
        releasable_at: Timestamp,
        now: Timestamp,
    },

    #[error("Reward overflow on task {0}")]
    Overflow(TaskId),

    #[error("Invalid settlement configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl HasErrorKind for SettlementError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::EscrowNotFound(_) => ErrorKind::NotFound,
            Self::EscrowNotReleasable { .. } => ErrorKind::NotMature,
            Self::Review(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::UsageCounterRequired(_) | Self::Overflow(_) | Self::InvalidConfiguration(_) => {
                ErrorKind::InvalidState
            }
        }
    }
}
