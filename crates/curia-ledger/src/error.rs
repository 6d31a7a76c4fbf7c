use curia_types::{AccountId, Amount, ErrorKind, HasErrorKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Insufficient stake for {account}: staked {staked}, requested {requested}")]
    InsufficientStake {
        account: AccountId,
        staked: Amount,
        requested: Amount,
    },

    #[error("Amount overflow for {0}")]
    Overflow(AccountId),

    #[error("Invalid ledger configuration: {0}")]
    InvalidConfiguration(String),
}

impl HasErrorKind for LedgerError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_) => ErrorKind::NotFound,
            Self::ZeroAmount
            | Self::InsufficientStake { .. }
            | Self::Overflow(_)
            | Self::InvalidConfiguration(_) => ErrorKind::InvalidState,
        }
    }
}
