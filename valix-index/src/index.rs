//! The dependency index facade: bulk construction over column segments and
//! the delta-accounting FD/OD validator.

use std::cmp::Ordering;
use std::sync::Arc;

use valix_column::ColumnSegment;
use valix_result::{Error, Result};
use valix_types::{CompositeKey, RowOffset, Value};

use crate::node::{Node, NodeId};
use crate::payload::PayloadRecord;
use crate::tree::{BTree, DEFAULT_MIN_DEGREE, TreeIter};

/// The kind of dependency being validated.
///
/// - `Fd`: functional dependency `A → B` — equal LHS implies equal RHS.
/// - `Od`: order dependency `A ↝ B` — sorting by LHS yields non-decreasing
///   RHS across adjacent groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Fd,
    Od,
}

/// How one validation call moved the global violation counter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Deltas {
    /// Change attributed to boundary flags between adjacent keys.
    pub flag_delta: i64,
    /// Change attributed to local (same-LHS) violations.
    pub local_delta: i64,
}

impl Deltas {
    pub const ZERO: Deltas = Deltas {
        flag_delta: 0,
        local_delta: 0,
    };

    pub fn total(&self) -> i64 {
        self.flag_delta + self.local_delta
    }
}

/// The OD boundary law for two records adjacent in LHS order: `p` violates
/// iff its `max_rhs` exceeds the next key's `min_rhs`. Unset extrema on
/// either side mean no violation.
fn boundary_flag_between(p: &PayloadRecord, q: &PayloadRecord) -> i64 {
    match (p.max_rhs(), q.min_rhs()) {
        (Some(max), Some(min)) if max > min => 1,
        _ => 0,
    }
}

/// Sorted in-memory index over one or more key columns with incremental
/// FD/OD validation metadata.
///
/// The single `violation_count` equals, at every instant, the sum of every
/// record's `flag_contribution` and `local_contribution`; validation calls
/// maintain it by delta accounting. Violations are never signalled through
/// failure: callers poll [`DependencyIndex::holds`].
///
/// One logical writer at a time may mutate the index; read-only queries are
/// safe to run concurrently only under host-provided synchronization.
#[derive(Debug)]
pub struct DependencyIndex {
    tree: BTree,
    /// Indexed row offsets, sorted by key, grouped per distinct key.
    row_offsets: Vec<RowOffset>,
    /// Rows excluded from the index because a key column was null.
    null_offsets: Vec<RowOffset>,
    violation_count: i64,
}

impl DependencyIndex {
    /// An index with no bulk-loaded rows, ready for online traffic.
    pub fn empty() -> Self {
        Self {
            tree: BTree::new(),
            row_offsets: Vec::new(),
            null_offsets: Vec::new(),
            violation_count: 0,
        }
    }

    /// Bulk-build the index from one or more equally sized column segments.
    ///
    /// Row offsets are sorted by composite key (stable), rows containing a
    /// null are segregated into [`DependencyIndex::null_offsets`], and one
    /// record per distinct key is inserted carrying its group's
    /// `start_index` and `count`. `rhs_set`s start empty; validator traffic
    /// populates them afterwards.
    pub fn new(segments: &[Arc<dyn ColumnSegment>]) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidArgumentError(
                "dependency index requires at least one segment".into(),
            ));
        }
        let row_count = segments[0].len();
        for segment in &segments[1..] {
            if segment.len() != row_count {
                return Err(Error::InvalidArgumentError(format!(
                    "segment length mismatch: {} vs {}",
                    segment.len(),
                    row_count
                )));
            }
        }

        let mut keys: Vec<Option<CompositeKey>> = Vec::with_capacity(row_count);
        for offset in 0..row_count {
            let values: Vec<Value> = segments.iter().map(|s| s.value_at(offset)).collect();
            keys.push(CompositeKey::from_values(values));
        }

        let mut order: Vec<RowOffset> = (0..row_count as RowOffset).collect();
        order.sort_by(|a, b| match (&keys[*a as usize], &keys[*b as usize]) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let mut index = Self::empty();
        index.row_offsets.reserve(row_count);

        let mut group: Option<(CompositeKey, RowOffset, u32)> = None;
        for &offset in &order {
            let Some(key) = keys[offset as usize].take() else {
                index.null_offsets.push(offset);
                continue;
            };
            match &mut group {
                Some((current, _, count)) if *current == key => *count += 1,
                slot => {
                    if let Some((current, start, count)) = slot.take() {
                        index
                            .tree
                            .insert(current, PayloadRecord::new_for_load(start, count));
                    }
                    *slot = Some((key, index.row_offsets.len() as RowOffset, 1));
                }
            }
            index.row_offsets.push(offset);
        }
        if let Some((current, start, count)) = group.take() {
            index
                .tree
                .insert(current, PayloadRecord::new_for_load(start, count));
        }

        tracing::debug!(
            rows = row_count,
            distinct = index.tree.len(),
            nulls = index.null_offsets.len(),
            "built dependency index"
        );
        Ok(index)
    }

    // ------------------------------------------------------------- validation

    /// Whether the dependency currently holds over the pairs fed so far.
    pub fn holds(&self) -> bool {
        self.violation_count == 0
    }

    /// The exact violation count, `Σ flag_contribution + Σ local_contribution`.
    pub fn violation_count(&self) -> i64 {
        self.violation_count
    }

    /// Feed one (LHS, RHS) pair into the validator.
    ///
    /// Creates the LHS record if absent, grows its `rhs_set`, and refreshes
    /// local and boundary contributions by delta accounting. A LHS or RHS
    /// containing a null cannot form a key and the call is a no-op.
    pub fn insert_entry(&mut self, lhs: &[Value], rhs: &[Value], kind: DependencyKind) -> Deltas {
        let (Some(lhs_key), Some(rhs_key)) =
            (CompositeKey::from_slice(lhs), CompositeKey::from_slice(rhs))
        else {
            return Deltas::ZERO;
        };

        let (leaf, pos, found) = self.tree.find_leaf(&lhs_key);
        let (leaf, pos) = if found {
            if kind == DependencyKind::Od {
                self.tree.payload_at_mut(leaf, pos).count += 1;
            }
            (leaf, pos)
        } else {
            let initial_count = match kind {
                DependencyKind::Od => 1,
                DependencyKind::Fd => 0,
            };
            self.tree
                .insert(lhs_key.clone(), PayloadRecord::new_dynamic(initial_count))
        };

        let mut deltas = Deltas::ZERO;
        let old_local = self.tree.payload_at(leaf, pos).local_contribution;

        {
            let record = self.tree.payload_at_mut(leaf, pos);
            record.insert_rhs(rhs_key.clone());
            if kind == DependencyKind::Od {
                record.observe_extremum(&rhs_key);
            }
            let new_local = record.distinct_rhs_violations();
            record.local_contribution = new_local;
            deltas.local_delta += new_local - old_local;
        }

        match kind {
            // FD cares only about same-key ambiguity; boundary flags stay 0.
            DependencyKind::Fd => deltas.flag_delta += self.apply_flag(leaf, pos, 0),
            DependencyKind::Od => {
                // This record's max_rhs may have grown, its predecessor's
                // view of this record's min_rhs may have changed.
                deltas.flag_delta += self.refresh_flag(leaf, pos);
                if let Some((pl, pp)) = self.tree.predecessor_of(leaf, pos) {
                    deltas.flag_delta += self.refresh_flag(pl, pp);
                }
            }
        }

        self.violation_count += deltas.total();
        tracing::trace!(
            lhs = %lhs_key,
            rhs = %rhs_key,
            ?kind,
            flag_delta = deltas.flag_delta,
            local_delta = deltas.local_delta,
            "insert_entry"
        );
        deltas
    }

    /// Retract one (LHS, RHS) pair.
    ///
    /// Unknown pairs — absent LHS, or an RHS the record never saw — are
    /// strict no-ops returning zero deltas. When the last RHS drains, the
    /// record's contributions are subtracted, the predecessor's flag is
    /// re-aimed at the record's old successor, and the entry leaves the
    /// tree.
    pub fn delete_entry(&mut self, lhs: &[Value], rhs: &[Value], kind: DependencyKind) -> Deltas {
        let (Some(lhs_key), Some(rhs_key)) =
            (CompositeKey::from_slice(lhs), CompositeKey::from_slice(rhs))
        else {
            return Deltas::ZERO;
        };

        let (leaf, pos, found) = self.tree.find_leaf(&lhs_key);
        if !found {
            return Deltas::ZERO;
        }

        let (old_flag, old_local, was_extremum) = {
            let record = self.tree.payload_at(leaf, pos);
            (
                record.flag_contribution,
                record.local_contribution,
                record.is_extremum(&rhs_key),
            )
        };

        if !self.tree.payload_at_mut(leaf, pos).remove_rhs(&rhs_key) {
            return Deltas::ZERO;
        }

        let mut deltas = Deltas::ZERO;

        if self.tree.payload_at(leaf, pos).rhs_is_empty() {
            deltas.flag_delta -= old_flag;
            deltas.local_delta -= old_local;

            if kind == DependencyKind::Od {
                if let Some((pl, pp)) = self.tree.predecessor_of(leaf, pos) {
                    let new_flag = match self.tree.successor_of(leaf, pos) {
                        Some((sl, sp)) => boundary_flag_between(
                            self.tree.payload_at(pl, pp),
                            self.tree.payload_at(sl, sp),
                        ),
                        None => 0,
                    };
                    deltas.flag_delta += self.apply_flag(pl, pp, new_flag);
                }
            }
            self.tree.remove_at(leaf, pos);
        } else {
            {
                let record = self.tree.payload_at_mut(leaf, pos);
                if kind == DependencyKind::Od && was_extremum {
                    record.recompute_extrema();
                }
                let new_local = record.distinct_rhs_violations();
                record.local_contribution = new_local;
                deltas.local_delta += new_local - old_local;
            }
            match kind {
                DependencyKind::Fd => deltas.flag_delta += self.apply_flag(leaf, pos, 0),
                DependencyKind::Od => {
                    // max_rhs may have dropped, min_rhs may have risen.
                    deltas.flag_delta += self.refresh_flag(leaf, pos);
                    if let Some((pl, pp)) = self.tree.predecessor_of(leaf, pos) {
                        deltas.flag_delta += self.refresh_flag(pl, pp);
                    }
                }
            }
        }

        self.violation_count += deltas.total();
        tracing::trace!(
            lhs = %lhs_key,
            rhs = %rhs_key,
            ?kind,
            flag_delta = deltas.flag_delta,
            local_delta = deltas.local_delta,
            "delete_entry"
        );
        deltas
    }

    /// Replace a pair's RHS: delete of the old followed by insert of the
    /// new; returned deltas are the sum. `old_rhs == new_rhs` nets to zero.
    pub fn update_entry(
        &mut self,
        lhs: &[Value],
        old_rhs: &[Value],
        new_rhs: &[Value],
        kind: DependencyKind,
    ) -> Deltas {
        let deleted = self.delete_entry(lhs, old_rhs, kind);
        let inserted = self.insert_entry(lhs, new_rhs, kind);
        Deltas {
            flag_delta: deleted.flag_delta + inserted.flag_delta,
            local_delta: deleted.local_delta + inserted.local_delta,
        }
    }

    /// Recompute the boundary flag of the record at `(leaf, pos)` against
    /// its in-order successor and apply the change. Rightmost records and
    /// unset extrema flag 0.
    fn refresh_flag(&mut self, leaf: NodeId, pos: usize) -> i64 {
        let new_flag = match self.tree.successor_of(leaf, pos) {
            Some((sl, sp)) => {
                boundary_flag_between(self.tree.payload_at(leaf, pos), self.tree.payload_at(sl, sp))
            }
            None => 0,
        };
        self.apply_flag(leaf, pos, new_flag)
    }

    /// Overwrite a record's boundary flag, returning the contribution delta.
    fn apply_flag(&mut self, leaf: NodeId, pos: usize, new_flag: i64) -> i64 {
        let record = self.tree.payload_at_mut(leaf, pos);
        let delta = new_flag - record.flag_contribution;
        record.boundary_flag = new_flag;
        record.flag_contribution = new_flag;
        delta
    }

    // ----------------------------------------------------- dynamic key surface

    /// Count-tracked dynamic insert: increments an existing key's `count`,
    /// or creates a fresh entry with `count = 1`. Returns whether a new
    /// entry was created.
    ///
    /// This surface never touches the violation counter; do not mix it with
    /// validator traffic on the same key.
    pub fn insert_key(&mut self, key_values: &[Value]) -> bool {
        let Some(key) = CompositeKey::from_slice(key_values) else {
            return false;
        };
        let (leaf, pos, found) = self.tree.find_leaf(&key);
        if found {
            self.tree.payload_at_mut(leaf, pos).count += 1;
            false
        } else {
            self.tree.insert(key, PayloadRecord::new_dynamic(1));
            true
        }
    }

    /// Count-tracked dynamic remove: decrements `count`, dropping the entry
    /// entirely at `count <= 1`. Returns whether the entry was removed.
    pub fn remove_key(&mut self, key_values: &[Value]) -> bool {
        let Some(key) = CompositeKey::from_slice(key_values) else {
            return false;
        };
        let (leaf, pos, found) = self.tree.find_leaf(&key);
        if !found {
            return false;
        }
        let record = self.tree.payload_at_mut(leaf, pos);
        if record.count > 1 {
            record.count -= 1;
            return false;
        }
        self.tree.remove_at(leaf, pos);
        true
    }

    pub fn contains_key(&self, key_values: &[Value]) -> bool {
        CompositeKey::from_slice(key_values).is_some_and(|key| self.tree.contains(&key))
    }

    /// Number of distinct keys in the index.
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    // --------------------------------------------------------------- queries

    pub fn get_payload(&self, key_values: &[Value]) -> Option<&PayloadRecord> {
        let key = CompositeKey::from_slice(key_values)?;
        self.tree.get(&key)
    }

    /// Sorted row offsets from the first key `>=` the argument to the end.
    /// Meaningful for bulk-loaded indexes, whose records carry real
    /// `start_index` cursors.
    pub fn lower_bound(&self, key_values: &[Value]) -> &[RowOffset] {
        self.bound_slice(key_values, BTree::lower_bound)
    }

    /// Sorted row offsets from the first key `>` the argument to the end.
    pub fn upper_bound(&self, key_values: &[Value]) -> &[RowOffset] {
        self.bound_slice(key_values, BTree::upper_bound)
    }

    fn bound_slice(
        &self,
        key_values: &[Value],
        bound: impl Fn(&BTree, &CompositeKey) -> Option<(NodeId, usize)>,
    ) -> &[RowOffset] {
        let Some(key) = CompositeKey::from_slice(key_values) else {
            return &[];
        };
        match bound(&self.tree, &key) {
            Some((leaf, pos)) => {
                let start =
                    (self.tree.payload_at(leaf, pos).start_index as usize).min(self.row_offsets.len());
                &self.row_offsets[start..]
            }
            None => &[],
        }
    }

    /// The largest key strictly before the argument, crossing leaf
    /// boundaries via the neighbor chain.
    pub fn left_neighbor_max_key(&self, key_values: &[Value]) -> Option<CompositeKey> {
        let key = CompositeKey::from_slice(key_values)?;
        let (leaf, pos, _) = self.tree.find_leaf(&key);
        let (pl, pp) = self.tree.predecessor_of(leaf, pos)?;
        Some(self.tree.key_at(pl, pp).clone())
    }

    /// All indexed row offsets in key order.
    pub fn row_offsets(&self) -> &[RowOffset] {
        &self.row_offsets
    }

    /// Rows excluded from indexing because a key column was null.
    pub fn null_offsets(&self) -> &[RowOffset] {
        &self.null_offsets
    }

    /// Records in ascending key order via the leaf chain.
    pub fn entries(&self) -> TreeIter<'_> {
        self.tree.iter()
    }

    /// The underlying tree, for structural inspection.
    pub fn tree(&self) -> &BTree {
        &self.tree
    }

    // ------------------------------------------------- low-level metadata hooks

    /// Force a record's boundary flag, keeping the global counter in step.
    pub fn set_boundary_flag(&mut self, key_values: &[Value], flag: i64) {
        let Some(key) = CompositeKey::from_slice(key_values) else {
            return;
        };
        let (leaf, pos, found) = self.tree.find_leaf(&key);
        if !found {
            return;
        }
        let delta = self.apply_flag(leaf, pos, flag);
        self.violation_count += delta;
    }

    /// A record's current boundary flag; 0 for absent keys.
    pub fn boundary_flag(&self, key_values: &[Value]) -> i64 {
        self.get_payload(key_values)
            .map_or(0, |record| record.boundary_flag)
    }

    /// Re-derive a record's local contribution from its `rhs_set`, keeping
    /// the global counter in step.
    pub fn recompute_local_contribution(&mut self, key_values: &[Value]) {
        let Some(key) = CompositeKey::from_slice(key_values) else {
            return;
        };
        let (leaf, pos, found) = self.tree.find_leaf(&key);
        if !found {
            return;
        }
        let record = self.tree.payload_at_mut(leaf, pos);
        let new_local = record.distinct_rhs_violations();
        let delta = new_local - record.local_contribution;
        record.local_contribution = new_local;
        self.violation_count += delta;
    }

    /// Predicted memory consumption in bytes of an index over `row_count`
    /// rows with `distinct_count` distinct keys of `value_bytes` each.
    pub fn estimate_memory_consumption(
        row_count: usize,
        distinct_count: usize,
        value_bytes: usize,
    ) -> usize {
        let entry_size = value_bytes + size_of::<PayloadRecord>();
        let entries_per_node = 2 * DEFAULT_MIN_DEGREE - 1;
        let node_count = distinct_count.div_ceil(entries_per_node);
        node_count * (size_of::<Node>() + entries_per_node * entry_size)
            + row_count * size_of::<RowOffset>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use valix_column::ArrowSegment;

    fn segment(values: Vec<Option<i32>>) -> Arc<dyn ColumnSegment> {
        Arc::new(ArrowSegment::new(Arc::new(Int32Array::from(values))).unwrap())
    }

    fn vals(vs: &[i32]) -> Vec<Value> {
        vs.iter().map(|&v| Value::Int32(v)).collect()
    }

    #[test]
    fn bulk_load_groups_equal_keys() {
        let index =
            DependencyIndex::new(&[segment(vec![Some(1), Some(1), Some(1), Some(2), Some(3)])])
                .unwrap();

        assert_eq!(index.key_count(), 3);
        let record = index.get_payload(&vals(&[1])).unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(record.start_index, 0);
        assert_eq!(record.multiplicity_violations(), 2);

        let record = index.get_payload(&vals(&[3])).unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.start_index, 4);
    }

    #[test]
    fn bulk_load_sorts_offsets_and_segregates_nulls() {
        let index =
            DependencyIndex::new(&[segment(vec![Some(5), None, Some(2), Some(5), None])]).unwrap();

        assert_eq!(index.row_offsets(), &[2, 0, 3]);
        assert_eq!(index.null_offsets(), &[1, 4]);
        assert_eq!(index.key_count(), 2);
    }

    #[test]
    fn bulk_load_over_composite_segments() {
        let a = segment(vec![Some(1), Some(1), Some(2)]);
        let b = segment(vec![Some(7), Some(6), Some(5)]);
        let index = DependencyIndex::new(&[a, b]).unwrap();

        assert_eq!(index.key_count(), 3);
        assert!(index.contains_key(&vals(&[1, 6])));
        assert!(!index.contains_key(&vals(&[1, 5])));
        // (1,6) sorts before (1,7).
        assert_eq!(index.row_offsets(), &[1, 0, 2]);
    }

    #[test]
    fn mismatched_segment_lengths_are_rejected() {
        let a = segment(vec![Some(1)]);
        let b = segment(vec![Some(1), Some(2)]);
        assert!(DependencyIndex::new(&[a, b]).is_err());
        assert!(DependencyIndex::new(&[]).is_err());
    }

    #[test]
    fn dynamic_keys_track_counts() {
        let mut index = DependencyIndex::empty();
        assert!(index.insert_key(&vals(&[7])));
        assert!(!index.insert_key(&vals(&[7])));
        assert_eq!(index.get_payload(&vals(&[7])).unwrap().count, 2);

        assert!(!index.remove_key(&vals(&[7])));
        assert!(index.remove_key(&vals(&[7])));
        assert!(!index.contains_key(&vals(&[7])));
        assert!(!index.remove_key(&vals(&[7])));
    }

    #[test]
    fn null_keys_are_noops_everywhere() {
        let mut index = DependencyIndex::empty();
        let nullish = vec![Value::Int32(1), Value::Null];
        assert!(!index.insert_key(&nullish));
        assert_eq!(
            index.insert_entry(&nullish, &vals(&[1]), DependencyKind::Fd),
            Deltas::ZERO
        );
        assert_eq!(
            index.insert_entry(&vals(&[1]), &nullish, DependencyKind::Od),
            Deltas::ZERO
        );
        assert_eq!(index.key_count(), 0);
        assert!(index.holds());
    }

    #[test]
    fn bounds_return_row_offset_suffixes() {
        let index =
            DependencyIndex::new(&[segment(vec![Some(30), Some(10), Some(20), Some(20)])]).unwrap();

        // Sorted offsets: 10 → row 1, 20 → rows 2,3, 30 → row 0.
        assert_eq!(index.row_offsets(), &[1, 2, 3, 0]);
        assert_eq!(index.lower_bound(&vals(&[20])), &[2, 3, 0]);
        assert_eq!(index.upper_bound(&vals(&[20])), &[0]);
        assert_eq!(index.lower_bound(&vals(&[15])), &[2, 3, 0]);
        assert!(index.lower_bound(&vals(&[31])).is_empty());
    }

    #[test]
    fn left_neighbor_max_key_crosses_positions() {
        let index = DependencyIndex::new(&[segment(
            (1..=9).map(Some).collect::<Vec<_>>(),
        )])
        .unwrap();

        assert_eq!(index.left_neighbor_max_key(&vals(&[1])), None);
        assert_eq!(
            index.left_neighbor_max_key(&vals(&[5])),
            CompositeKey::from_slice(&vals(&[4]))
        );
        // Absent key: the largest key strictly before it.
        assert_eq!(
            index.left_neighbor_max_key(&vals(&[100])),
            CompositeKey::from_slice(&vals(&[9]))
        );
    }

    #[test]
    fn metadata_hooks_keep_counter_in_step() {
        let mut index = DependencyIndex::empty();
        index.insert_key(&vals(&[1]));

        index.set_boundary_flag(&vals(&[1]), 1);
        assert_eq!(index.violation_count(), 1);
        assert_eq!(index.boundary_flag(&vals(&[1])), 1);

        index.set_boundary_flag(&vals(&[1]), 0);
        assert_eq!(index.violation_count(), 0);

        // Recompute on an rhs-free record settles local contribution at 0.
        index.recompute_local_contribution(&vals(&[1]));
        assert_eq!(index.violation_count(), 0);
    }

    #[test]
    fn memory_estimate_scales_with_inputs() {
        let small = DependencyIndex::estimate_memory_consumption(100, 10, 8);
        let large = DependencyIndex::estimate_memory_consumption(10_000, 1_000, 8);
        assert!(small > 0);
        assert!(large > small);
    }
}
