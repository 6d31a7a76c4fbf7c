use curia_ledger::LedgerError;
use curia_review::ReviewError;
use curia_settlement::SettlementError;
use curia_types::{AccountId, CaseId, ErrorKind, HasErrorKind, ItemId, ItemState, TaskId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArbitrationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbitrationError {
    #[error("Case not found: {0}")]
    CaseNotFound(CaseId),

    #[error("{item} has no finalized disposition (state: {state})")]
    ItemNotFinalized { item: ItemId, state: ItemState },

    #[error("{item} already has open {case}")]
    AlreadyReported { item: ItemId, case: CaseId },

    #[error("{item} cannot be adopted: task already adopted {adopted}")]
    ConflictingAdoption { item: ItemId, adopted: ItemId },

    #[error("{item} cannot be adopted: {task} closed without adoption")]
    TaskClosed { item: ItemId, task: TaskId },

    #[error("{0} is not an arbitration authority")]
    Unauthorized(AccountId),

    #[error("{0} already resolved")]
    CaseAlreadyResolved(CaseId),

    #[error("Evidence reference must not be empty")]
    MissingEvidence,

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl HasErrorKind for ArbitrationError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::CaseNotFound(_) => ErrorKind::NotFound,
            Self::ItemNotFinalized { .. }
            | Self::ConflictingAdoption { .. }
            | Self::TaskClosed { .. }
            | Self::MissingEvidence => ErrorKind::InvalidState,
            Self::AlreadyReported { .. } | Self::CaseAlreadyResolved(_) => ErrorKind::AlreadyDone,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Review(e) => e.kind(),
            Self::Settlement(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
        }
    }
}
