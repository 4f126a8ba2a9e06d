//! Key usage classification.
//!
//! Given the store's per-key version counts, report how many versions are
//! protected by the active key, by other configured keys, and by keys that
//! are no longer configured at all.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::key_set::EncryptionKeySet;

/// Counts of stored versions per key health class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyUsageReport {
    #[serde(rename = "active_key")]
    pub active_key_count: i64,
    #[serde(rename = "inactive_keys")]
    pub inactive_key_count: i64,
    #[serde(rename = "unknown_keys")]
    pub unknown_key_count: i64,
}

/// Classifies per-key counts against one key configuration.
pub struct KeyUsageClassifier<'a> {
    active_key_id: Uuid,
    known_key_ids: &'a HashSet<Uuid>,
}

impl<'a> KeyUsageClassifier<'a> {
    pub fn new(active_key_id: Uuid, known_key_ids: &'a HashSet<Uuid>) -> Self {
        Self {
            active_key_id,
            known_key_ids,
        }
    }

    /// Classify `counts`.
    ///
    /// `inactive` is derived as `total - (active + unknown)` rather than
    /// counted; it relies on the active key being one of the known keys.
    pub fn classify(&self, counts: &HashMap<Uuid, i64>) -> KeyUsageReport {
        let total: i64 = counts.values().sum();
        let active = counts.get(&self.active_key_id).copied().unwrap_or(0);
        let known: i64 = counts
            .iter()
            .filter(|(id, _)| self.known_key_ids.contains(*id))
            .map(|(_, count)| *count)
            .sum();
        let unknown = total - known;
        let inactive = total - (active + unknown);

        KeyUsageReport {
            active_key_count: active,
            inactive_key_count: inactive,
            unknown_key_count: unknown,
        }
    }
}

/// Classify `counts` against a key set.
pub fn classify(key_set: &EncryptionKeySet, counts: &HashMap<Uuid, i64>) -> KeyUsageReport {
    let known = key_set.known_ids();
    KeyUsageClassifier::new(key_set.active_id(), &known).classify(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn active_legacy_and_orphan() {
        let active = Uuid::new_v4();
        let legacy = Uuid::new_v4();
        let orphan = Uuid::new_v4();
        let known: HashSet<Uuid> = [active, legacy].into_iter().collect();
        let counts: HashMap<Uuid, i64> = [(active, 10), (legacy, 2), (orphan, 1)]
            .into_iter()
            .collect();

        let report = KeyUsageClassifier::new(active, &known).classify(&counts);
        assert_eq!(report.active_key_count, 10);
        assert_eq!(report.inactive_key_count, 2);
        assert_eq!(report.unknown_key_count, 1);
    }

    #[test]
    fn unused_active_key_counts_zero() {
        let active = Uuid::new_v4();
        let legacy = Uuid::new_v4();
        let known: HashSet<Uuid> = [active, legacy].into_iter().collect();
        let counts: HashMap<Uuid, i64> = [(legacy, 7)].into_iter().collect();

        let report = KeyUsageClassifier::new(active, &known).classify(&counts);
        assert_eq!(report.active_key_count, 0);
        assert_eq!(report.inactive_key_count, 7);
        assert_eq!(report.unknown_key_count, 0);
    }

    #[test]
    fn empty_counts() {
        let active = Uuid::new_v4();
        let known: HashSet<Uuid> = [active].into_iter().collect();
        let report = KeyUsageClassifier::new(active, &known).classify(&HashMap::new());
        assert_eq!(
            report,
            KeyUsageReport {
                active_key_count: 0,
                inactive_key_count: 0,
                unknown_key_count: 0,
            }
        );
    }

    #[test]
    fn serializes_with_wire_names() {
        let report = KeyUsageReport {
            active_key_count: 3,
            inactive_key_count: 2,
            unknown_key_count: 1,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"active_key": 3, "inactive_keys": 2, "unknown_keys": 1})
        );
    }

    proptest! {
        #[test]
        fn classes_sum_to_total(
            active_count in 0i64..1_000,
            legacy_counts in proptest::collection::vec(0i64..1_000, 0..4),
            orphan_counts in proptest::collection::vec(0i64..1_000, 0..4),
            active_present in any::<bool>(),
        ) {
            let active = Uuid::new_v4();
            let mut known: HashSet<Uuid> = HashSet::new();
            known.insert(active);
            let mut counts = HashMap::new();
            if active_present {
                counts.insert(active, active_count);
            }
            let mut legacy_total = 0i64;
            for c in &legacy_counts {
                let id = Uuid::new_v4();
                known.insert(id);
                counts.insert(id, *c);
                legacy_total += *c;
            }
            let mut orphan_total = 0i64;
            for c in &orphan_counts {
                counts.insert(Uuid::new_v4(), *c);
                orphan_total += *c;
            }

            let report = KeyUsageClassifier::new(active, &known).classify(&counts);
            let total: i64 = counts.values().sum();
            prop_assert_eq!(
                report.active_key_count + report.inactive_key_count + report.unknown_key_count,
                total
            );
            prop_assert_eq!(report.unknown_key_count, orphan_total);
            prop_assert_eq!(report.inactive_key_count, legacy_total);
            prop_assert_eq!(
                report.active_key_count,
                if active_present { active_count } else { 0 }
            );
        }
    }
}
