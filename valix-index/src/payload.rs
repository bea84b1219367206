//! Per-key validation metadata.

use rustc_hash::FxHashSet;

use valix_types::{CompositeKey, RowOffset};

/// Metadata tracked for one distinct LHS key.
///
/// A record exists while it has something to say: a non-empty `rhs_set`
/// (validator traffic) or a positive row `count` (bulk load / dynamic key
/// tracking). It is created the first time an (LHS, RHS) pair arrives for a
/// previously absent LHS and destroyed when its `rhs_set` drains.
///
/// `flag_contribution` and `local_contribution` record exactly what this
/// record last added to the global violation counter, so the delta
/// accountant can subtract the old and add the new without reading the rest
/// of the tree.
#[derive(Debug, Default, Clone)]
pub struct PayloadRecord {
    /// Cursor into the index's flattened sorted row-offset array where this
    /// key's group starts (bulk load only).
    pub start_index: RowOffset,

    /// Row multiplicity of this LHS. Populated by the bulk loader and the
    /// count-tracked dynamic key surface; not load-bearing for FD/OD
    /// correctness.
    pub count: u32,

    /// Distinct RHS keys observed for this LHS.
    rhs_set: FxHashSet<CompositeKey>,

    /// Extrema of `rhs_set`, maintained for OD boundary checks only.
    min_rhs: Option<CompositeKey>,
    max_rhs: Option<CompositeKey>,

    /// OD boundary indicator: 1 iff this record's `max_rhs` exceeds the next
    /// key's `min_rhs`. Always 0 for FD and for the rightmost key.
    pub boundary_flag: i64,

    /// The boundary-flag value last applied to the global counter.
    pub flag_contribution: i64,

    /// The local-violation value last applied to the global counter.
    pub local_contribution: i64,
}

impl PayloadRecord {
    /// Record emitted by the bulk loader for a group of equal keys.
    pub fn new_for_load(start_index: RowOffset, count: u32) -> Self {
        Self {
            start_index,
            count,
            ..Self::default()
        }
    }

    /// Record created by dynamic traffic (`insert_key` or the validator).
    pub fn new_dynamic(count: u32) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Idempotently add an RHS key. Returns whether the set grew.
    pub fn insert_rhs(&mut self, rhs: CompositeKey) -> bool {
        self.rhs_set.insert(rhs)
    }

    /// Remove an RHS key. Returns whether it was present.
    pub fn remove_rhs(&mut self, rhs: &CompositeKey) -> bool {
        self.rhs_set.remove(rhs)
    }

    pub fn contains_rhs(&self, rhs: &CompositeKey) -> bool {
        self.rhs_set.contains(rhs)
    }

    pub fn rhs_is_empty(&self) -> bool {
        self.rhs_set.is_empty()
    }

    pub fn distinct_rhs_count(&self) -> usize {
        self.rhs_set.len()
    }

    pub fn min_rhs(&self) -> Option<&CompositeKey> {
        self.min_rhs.as_ref()
    }

    pub fn max_rhs(&self) -> Option<&CompositeKey> {
        self.max_rhs.as_ref()
    }

    /// Widen the extrema to cover a freshly inserted RHS key.
    pub fn observe_extremum(&mut self, rhs: &CompositeKey) {
        if self.min_rhs.as_ref().is_none_or(|min| rhs < min) {
            self.min_rhs = Some(rhs.clone());
        }
        if self.max_rhs.as_ref().is_none_or(|max| rhs > max) {
            self.max_rhs = Some(rhs.clone());
        }
    }

    /// Whether `rhs` currently sits at either end of the extrema.
    ///
    /// Deletion only needs a full extrema rescan when this is true.
    pub fn is_extremum(&self, rhs: &CompositeKey) -> bool {
        self.min_rhs.as_ref() == Some(rhs) || self.max_rhs.as_ref() == Some(rhs)
    }

    /// Rescan `rhs_set` for min/max. Invoked on the delete path after an
    /// extremum was removed.
    pub fn recompute_extrema(&mut self) {
        self.min_rhs = self.rhs_set.iter().min().cloned();
        self.max_rhs = self.rhs_set.iter().max().cloned();
    }

    /// Local violations from ambiguity within this LHS:
    /// `max(0, |rhs_set| − 1)`. This is the load-bearing notion for both FD
    /// (same LHS, different RHS) and OD (ambiguous ordering).
    pub fn distinct_rhs_violations(&self) -> i64 {
        (self.rhs_set.len() as i64 - 1).max(0)
    }

    /// Legacy count-based view, `max(0, count − 1)`, kept for
    /// backward-compatible queries over bulk-loaded indexes. Not used by
    /// delta accounting.
    pub fn multiplicity_violations(&self) -> i64 {
        (i64::from(self.count) - 1).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valix_types::Value;

    fn key(v: i32) -> CompositeKey {
        CompositeKey::single(Value::Int32(v)).unwrap()
    }

    #[test]
    fn rhs_set_is_idempotent() {
        let mut record = PayloadRecord::new_dynamic(0);
        assert!(record.insert_rhs(key(10)));
        assert!(!record.insert_rhs(key(10)));
        assert_eq!(record.distinct_rhs_count(), 1);
        assert_eq!(record.distinct_rhs_violations(), 0);
    }

    #[test]
    fn violations_grow_with_distinct_rhs() {
        let mut record = PayloadRecord::new_dynamic(0);
        record.insert_rhs(key(1));
        record.insert_rhs(key(2));
        record.insert_rhs(key(3));
        assert_eq!(record.distinct_rhs_violations(), 2);
    }

    #[test]
    fn extrema_track_inserts_and_survive_recompute() {
        let mut record = PayloadRecord::new_dynamic(0);
        for v in [5, 1, 9, 3] {
            let k = key(v);
            record.insert_rhs(k.clone());
            record.observe_extremum(&k);
        }
        assert_eq!(record.min_rhs(), Some(&key(1)));
        assert_eq!(record.max_rhs(), Some(&key(9)));

        assert!(record.is_extremum(&key(9)));
        assert!(!record.is_extremum(&key(3)));

        record.remove_rhs(&key(9));
        record.recompute_extrema();
        assert_eq!(record.max_rhs(), Some(&key(5)));
        assert_eq!(record.min_rhs(), Some(&key(1)));
    }

    #[test]
    fn empty_record_has_no_extrema_and_no_violations() {
        let mut record = PayloadRecord::new_dynamic(0);
        assert_eq!(record.distinct_rhs_violations(), 0);
        record.recompute_extrema();
        assert!(record.min_rhs().is_none());
        assert!(record.max_rhs().is_none());
    }

    #[test]
    fn multiplicity_view_is_count_based() {
        let record = PayloadRecord::new_for_load(0, 4);
        assert_eq!(record.multiplicity_violations(), 3);
        assert_eq!(record.distinct_rhs_violations(), 0);
    }
}
