use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error taxonomy shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidState,
    Unauthorized,
    AlreadyDone,
    NotFound,
    NotMature,
    Frozen,
    Collaborator,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidState => "invalid_state",
            Self::Unauthorized => "unauthorized",
            Self::AlreadyDone => "already_done",
            Self::NotFound => "not_found",
            Self::NotMature => "not_mature",
            Self::Frozen => "frozen",
            Self::Collaborator => "collaborator",
        };
        write!(f, "{}", s)
    }
}

/// Classifies a component error into the shared taxonomy.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid account id length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}
