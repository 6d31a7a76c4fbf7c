/*!
# Curia Review

Review consensus for submitted work items.

Staked reviewers vote `Support` or `Reject` on pending items. The task's audit
rule decides when a tally is conclusive; finalization moves the item to
`Adopted` or `Deleted` and applies credit-score and stake consequences to the
submitter and every voter. The consequences actually applied are recorded so an
arbitration override can reverse them exactly.

## Module Structure

- **audit**: Quorum rules (`Majority`, `Threshold`)
- **detection**: Near-duplicate detection over 64-bit content fingerprints
- **registry**: Tasks and items, with their state transitions
- **consensus**: `ReviewEngine`, votes, finalization and overrides
- **error**: Review-specific errors
*/

pub mod audit;
pub mod consensus;
pub mod detection;
pub mod error;
pub mod registry;

pub use audit::{AuditRule, Tally};
pub use consensus::{
    Ballot, CreditChange, FinalizationRecord, Override, ReviewConfig, ReviewEngine, ReviewStats,
    StakeChange, Vote, VoteOutcome,
};
pub use detection::DetectionRule;
pub use error::{Result, ReviewError};
pub use registry::{Item, ItemRegistry, ItemSpec, Task, TaskSpec};
