use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix seconds, supplied by the caller of every time-dependent operation.
pub type Timestamp = i64;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Day index (`timestamp / bucket length`) that locked rewards are grouped by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DayBucket(pub u64);

impl DayBucket {
    pub fn from_timestamp(now: Timestamp, bucket_secs: u64) -> Self {
        let secs = now.max(0) as u64;
        Self(secs / bucket_secs.max(1))
    }

    /// First second covered by this bucket.
    pub fn start(&self, bucket_secs: u64) -> Timestamp {
        self.0.saturating_mul(bucket_secs.max(1)).min(i64::MAX as u64) as Timestamp
    }

    /// Mature once `window_secs` have elapsed since the bucket opened.
    pub fn is_mature(&self, now: Timestamp, bucket_secs: u64, window_secs: u64) -> bool {
        now.saturating_sub(self.start(bucket_secs)) >= window_secs.min(i64::MAX as u64) as i64
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day#{}", self.0)
    }
}
