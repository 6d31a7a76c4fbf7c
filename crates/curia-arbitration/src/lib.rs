/*!
# Curia Arbitration

Disputes over finalized review outcomes.

A report against an `Adopted` or `Deleted` item opens a case and freezes
settlement on the item's task. The arbitration authority resolves the case:

- **Upheld**: the case closes and settlement resumes
- **Overturned**: the disposition flips, prior credit and stake consequences are
  reversed and replaced, locked rewards are clawed back (or, for a newly adopted
  item, computed), and the reporter is rewarded

Resolution is terminal. A new report may be filed against the same item after
its case resolves.
*/

pub mod case;
pub mod engine;
pub mod error;

pub use case::{ArbitrationCase, ArbitrationVerdict, CaseState, ReporterReversal, ReversalReport};
pub use engine::{
    ArbitrationConfig, ArbitrationContext, ArbitrationEngine, ArbitrationStats, Resolution,
};
pub use error::{ArbitrationError, Result};
