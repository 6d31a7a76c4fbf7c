use curia_arbitration::ArbitrationError;
use curia_ledger::LedgerError;
use curia_review::ReviewError;
use curia_settlement::SettlementError;
use curia_types::{ErrorKind, HasErrorKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),
}

impl HasErrorKind for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(e) => e.kind(),
            Self::Review(e) => e.kind(),
            Self::Settlement(e) => e.kind(),
            Self::Arbitration(e) => e.kind(),
            Self::Collaborator(_) => ErrorKind::Collaborator,
        }
    }
}
