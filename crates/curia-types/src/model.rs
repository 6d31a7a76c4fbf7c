use serde::{Deserialize, Serialize};
use std::fmt;

/// A reviewer's vote on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Support,
    Reject,
}

impl Verdict {
    /// The vote that agrees with a disposition.
    pub fn agrees_with(&self, disposition: Disposition) -> bool {
        matches!(
            (self, disposition),
            (Verdict::Support, Disposition::Adopted) | (Verdict::Reject, Disposition::Deleted)
        )
    }
}

/// Outcome of review consensus (or of an arbitration override).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Adopted,
    Deleted,
}

impl Disposition {
    pub fn flipped(&self) -> Self {
        match self {
            Self::Adopted => Self::Deleted,
            Self::Deleted => Self::Adopted,
        }
    }

    pub fn item_state(&self) -> ItemState {
        match self {
            Self::Adopted => ItemState::Adopted,
            Self::Deleted => ItemState::Deleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Adopted,
    /// Superseded by another item's adoption or by task expiry; no credit consequences.
    Rejected,
    /// Judged malicious.
    Deleted,
}

impl ItemState {
    pub fn disposition(&self) -> Option<Disposition> {
        match self {
            Self::Adopted => Some(Disposition::Adopted),
            Self::Deleted => Some(Disposition::Deleted),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: &Self) -> bool {
        use ItemState::*;
        match (self, next) {
            (Pending, Adopted) | (Pending, Deleted) | (Pending, Rejected) => true,
            // Arbitration overrides only
            (Adopted, Deleted) | (Deleted, Adopted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Adopted => "adopted",
            Self::Rejected => "rejected",
            Self::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Open,
    Closed,
}

/// Settlement strategy chosen when the task is opened. Immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Single lump-sum split at adoption.
    OneTime,
    /// Recurring payout proportional to the box usage counter.
    Divide,
    /// Like `OneTime`, with part of the submitter share escrowed for the arbitration window.
    OneTimeWithMortgage,
}

impl Strategy {
    /// Strategies that settle once, at adoption time.
    pub fn settles_on_adoption(&self) -> bool {
        matches!(self, Self::OneTime | Self::OneTimeWithMortgage)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OneTime => "one_time",
            Self::Divide => "divide",
            Self::OneTimeWithMortgage => "one_time_with_mortgage",
        };
        write!(f, "{}", s)
    }
}

/// Stakeholder role of a settlement share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Submitter,
    Reviewer,
    Platform,
    Reporter,
}
