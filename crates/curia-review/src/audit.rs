use crate::error::{Result, ReviewError};
use curia_types::{Disposition, Verdict};
use serde::{Deserialize, Serialize};

/// Running vote count on one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub support: u32,
    pub reject: u32,
}

impl Tally {
    pub fn new(support: u32, reject: u32) -> Self {
        Self { support, reject }
    }

    pub fn total(&self) -> u32 {
        self.support + self.reject
    }

    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Support => self.support += 1,
            Verdict::Reject => self.reject += 1,
        }
    }
}

/// How a tally becomes a disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRule {
    /// Strict majority of `quorum`. A full quorum without a majority deletes the item.
    Majority { quorum: u32 },
    /// First side to reach its own count wins.
    Threshold { adopt_at: u32, delete_at: u32 },
}

impl Default for AuditRule {
    fn default() -> Self {
        Self::Majority { quorum: 3 }
    }
}

impl AuditRule {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Majority { quorum } if quorum == 0 => Err(ReviewError::InvalidAuditRule(
                "majority quorum must be at least 1".to_string(),
            )),
            Self::Threshold { adopt_at, delete_at } if adopt_at == 0 || delete_at == 0 => {
                Err(ReviewError::InvalidAuditRule(format!(
                    "threshold counts must be at least 1 (adopt_at {}, delete_at {})",
                    adopt_at, delete_at
                )))
            }
            Self::Threshold { adopt_at, delete_at } if adopt_at.checked_add(delete_at).is_none() => {
                Err(ReviewError::InvalidAuditRule(format!(
                    "threshold counts overflow (adopt_at {}, delete_at {})",
                    adopt_at, delete_at
                )))
            }
            _ => Ok(()),
        }
    }

    /// Maximum number of votes an item can receive.
    pub fn quorum(&self) -> u32 {
        match *self {
            Self::Majority { quorum } => quorum,
            Self::Threshold { adopt_at, delete_at } => {
                adopt_at.saturating_add(delete_at).saturating_sub(1)
            }
        }
    }

    pub fn resolve(&self, tally: &Tally) -> Option<Disposition> {
        match *self {
            Self::Majority { quorum } => {
                let needed = quorum / 2 + 1;
                if tally.support >= needed {
                    Some(Disposition::Adopted)
                } else if tally.reject >= needed || tally.total() >= quorum {
                    Some(Disposition::Deleted)
                } else {
                    None
                }
            }
            Self::Threshold { adopt_at, delete_at } => {
                if tally.support >= adopt_at {
                    Some(Disposition::Adopted)
                } else if tally.reject >= delete_at {
                    Some(Disposition::Deleted)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_majority_of_three() {
        let rule = AuditRule::Majority { quorum: 3 };
        assert_eq!(rule.resolve(&Tally::new(1, 1)), None);
        assert_eq!(rule.resolve(&Tally::new(2, 1)), Some(Disposition::Adopted));
        assert_eq!(rule.resolve(&Tally::new(2, 0)), Some(Disposition::Adopted));
        assert_eq!(rule.resolve(&Tally::new(0, 2)), Some(Disposition::Deleted));
    }

    #[test]
    fn test_even_quorum_tie_deletes() {
        let rule = AuditRule::Majority { quorum: 4 };
        assert_eq!(rule.resolve(&Tally::new(2, 1)), None);
        assert_eq!(rule.resolve(&Tally::new(2, 2)), Some(Disposition::Deleted));
        assert_eq!(rule.resolve(&Tally::new(3, 0)), Some(Disposition::Adopted));
    }

    #[test]
    fn test_threshold_rule() {
        let rule = AuditRule::Threshold { adopt_at: 3, delete_at: 2 };
        assert_eq!(rule.quorum(), 4);
        assert_eq!(rule.resolve(&Tally::new(2, 1)), None);
        assert_eq!(rule.resolve(&Tally::new(2, 2)), Some(Disposition::Deleted));
        assert_eq!(rule.resolve(&Tally::new(3, 1)), Some(Disposition::Adopted));
    }

    #[test]
    fn test_validation() {
        assert!(AuditRule::Majority { quorum: 0 }.validate().is_err());
        assert!(AuditRule::Threshold { adopt_at: 0, delete_at: 1 }.validate().is_err());
        assert!(AuditRule::Majority { quorum: 1 }.validate().is_ok());
        assert!(AuditRule::default().validate().is_ok());
    }

    #[test]
    fn test_huge_threshold_counts_are_rejected() {
        let rule = AuditRule::Threshold {
            adopt_at: u32::MAX,
            delete_at: u32::MAX,
        };
        assert!(matches!(rule.validate(), Err(ReviewError::InvalidAuditRule(_))));
        assert_eq!(rule.quorum(), u32::MAX);

        let edge = AuditRule::Threshold {
            adopt_at: u32::MAX - 1,
            delete_at: 1,
        };
        assert!(edge.validate().is_ok());
        assert_eq!(edge.quorum(), u32::MAX - 1);
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_string(&AuditRule::Majority { quorum: 5 }).unwrap();
        assert_eq!(json, r#"{"kind":"majority","quorum":5}"#);
    }

    fn arb_rule() -> impl Strategy<Value = AuditRule> {
        prop_oneof![
            (1u32..12).prop_map(|quorum| AuditRule::Majority { quorum }),
            (1u32..8, 1u32..8).prop_map(|(adopt_at, delete_at)| AuditRule::Threshold { adopt_at, delete_at }),
        ]
    }

    proptest! {
        // Every vote sequence resolves no later than the quorum-th vote
        #[test]
        fn prop_resolves_by_quorum(rule in arb_rule(), votes in prop::collection::vec(any::<bool>(), 0..30)) {
            let mut tally = Tally::default();
            let mut resolved = None;
            for support in votes.iter().take(rule.quorum() as usize) {
                tally.record(if *support { Verdict::Support } else { Verdict::Reject });
                resolved = rule.resolve(&tally);
                if resolved.is_some() {
                    break;
                }
            }
            prop_assert!(tally.total() <= rule.quorum());
            if tally.total() == rule.quorum() {
                prop_assert!(resolved.is_some());
            }
        }
    }
}
