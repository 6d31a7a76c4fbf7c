use curia_types::ItemId;
use serde::{Deserialize, Serialize};

/// Near-duplicate check run once, at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionRule {
    Disabled,
    /// Fingerprints within `max_distance` differing bits count as the same content.
    Hamming { max_distance: u32 },
}

impl Default for DetectionRule {
    fn default() -> Self {
        Self::Hamming { max_distance: 5 }
    }
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

impl DetectionRule {
    /// Closest existing item within the threshold, if any.
    pub fn find_duplicate<I>(&self, fingerprint: u64, existing: I) -> Option<(ItemId, u32)>
    where
        I: IntoIterator<Item = (ItemId, u64)>,
    {
        let Self::Hamming { max_distance } = *self else {
            return None;
        };
        existing
            .into_iter()
            .map(|(id, other)| (id, hamming_distance(fingerprint, other)))
            .filter(|(_, distance)| *distance <= max_distance)
            .min_by_key(|(id, distance)| (*distance, *id))
    }
}
