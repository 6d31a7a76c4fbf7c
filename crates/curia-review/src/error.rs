use curia_ledger::LedgerError;
use curia_types::{AccountId, ErrorKind, HasErrorKind, ItemId, ItemState, TaskId, Timestamp};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReviewError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid audit rule: {0}")]
    InvalidAuditRule(String),

    #[error("Task {0} is closed")]
    TaskClosed(TaskId),

    #[error("Task {task} expired: deadline {deadline}, current {now}")]
    TaskExpired {
        task: TaskId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("Task {task} has not expired: deadline {deadline}, current {now}")]
    TaskNotExpired {
        task: TaskId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("Duplicate of {similar_to} on {task} (hamming distance {distance})")]
    DuplicateItem {
        task: TaskId,
        similar_to: ItemId,
        distance: u32,
    },

    #[error("Account {0} has no stake")]
    NotStaked(AccountId),

    #[error("Credit too low for {account}: required {required}, actual {actual}")]
    CreditTooLow {
        account: AccountId,
        required: i64,
        actual: i64,
    },

    #[error("{account} cannot review their own {item}")]
    SelfReview { item: ItemId, account: AccountId },

    #[error("{voter} already voted on {item}")]
    AlreadyVoted { item: ItemId, voter: AccountId },

    #[error("{item} is not pending (state: {state})")]
    ItemNotPending { item: ItemId, state: ItemState },

    #[error("Invalid transition for {item}: {from} -> {to}")]
    InvalidTransition {
        item: ItemId,
        from: ItemState,
        to: ItemState,
    },

    #[error("Task {task} already adopted {adopted}")]
    TaskAlreadyAdopted { task: TaskId, adopted: ItemId },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl HasErrorKind for ReviewError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound(_) | Self::ItemNotFound(_) => ErrorKind::NotFound,
            Self::NotStaked(_) | Self::CreditTooLow { .. } | Self::SelfReview { .. } => {
                ErrorKind::Unauthorized
            }
            Self::AlreadyVoted { .. } => ErrorKind::AlreadyDone,
            Self::Ledger(e) => e.kind(),
            Self::InvalidTask(_)
            | Self::InvalidAuditRule(_)
            | Self::TaskClosed(_)
            | Self::TaskExpired { .. }
            | Self::TaskNotExpired { .. }
            | Self::DuplicateItem { .. }
            | Self::ItemNotPending { .. }
            | Self::InvalidTransition { .. }
            | Self::TaskAlreadyAdopted { .. } => ErrorKind::InvalidState,
        }
    }
}
