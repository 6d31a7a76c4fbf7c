/*!
# Curia Types

Shared vocabulary of the Curia curation protocol: identifiers, amounts,
currencies, day buckets, review verdicts, settlement strategies and the
error taxonomy every component maps its failures onto.

## Module Structure

- **ids**: Monotonic arena ids (`TaskId`, `ItemId`, `CaseId`, ...) and `AccountId`
- **amount**: `Amount` newtype with checked and basis-point arithmetic
- **currency**: Fungible tokens and platform-issued receipt tokens
- **time**: `Timestamp` and `DayBucket`
- **model**: Verdicts, dispositions, item/task states, strategies, share roles
- **error**: `ErrorKind` taxonomy
*/

pub mod amount;
pub mod currency;
pub mod error;
pub mod ids;
pub mod model;
pub mod time;

pub use amount::{Amount, BPS_DENOMINATOR};
pub use currency::Currency;
pub use error::{ErrorKind, HasErrorKind, ParseIdError};
pub use ids::{AccountId, BoxId, CaseId, ItemId, PlatformId, TaskId};
pub use model::{Disposition, ItemState, Role, Strategy, TaskState, Verdict};
pub use time::{DayBucket, Timestamp, SECONDS_PER_DAY};
