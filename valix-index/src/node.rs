//! B-tree nodes: entries, routing separators, leaf neighbor links, and the
//! head-fingerprint hint array.

use valix_types::CompositeKey;

use crate::payload::PayloadRecord;

/// Number of sampled entry heads per node.
pub const HINT_SLOTS: usize = 16;

/// Handle to a node inside the tree's slab arena.
///
/// Handles are non-owning; the arena owns every node, so horizontal leaf
/// links cannot form retain cycles.
pub type NodeId = u32;

/// A key together with its validation payload. Entries live in leaves only.
#[derive(Debug)]
pub struct Entry {
    pub key: CompositeKey,
    pub payload: PayloadRecord,
}

#[derive(Debug)]
pub enum NodeKind {
    /// Routing node: `children[i]` holds keys `< keys[i]`; keys `>= keys[i]`
    /// route right of it.
    Internal {
        keys: Vec<CompositeKey>,
        children: Vec<NodeId>,
    },
    /// Payload-carrying node, doubly linked with its in-order neighbors.
    Leaf {
        entries: Vec<Entry>,
        prev: Option<NodeId>,
        next: Option<NodeId>,
    },
}

#[derive(Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    /// Entry heads sampled at evenly spaced positions, rebuilt on every
    /// structural change. All zero while the node is too small for a
    /// non-zero stride.
    pub(crate) hints: [u32; HINT_SLOTS],
}

impl Node {
    pub(crate) fn new_leaf(entries: Vec<Entry>, prev: Option<NodeId>, next: Option<NodeId>) -> Self {
        let mut node = Self {
            kind: NodeKind::Leaf {
                entries,
                prev,
                next,
            },
            hints: [0; HINT_SLOTS],
        };
        node.rebuild_hints();
        node
    }

    pub(crate) fn new_internal(keys: Vec<CompositeKey>, children: Vec<NodeId>) -> Self {
        let mut node = Self {
            kind: NodeKind::Internal { keys, children },
            hints: [0; HINT_SLOTS],
        };
        node.rebuild_hints();
        node
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    #[inline]
    pub(crate) fn entry_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { entries, .. } => entries.len(),
            NodeKind::Internal { keys, .. } => keys.len(),
        }
    }

    /// Resample the hint array from the current keys.
    pub(crate) fn rebuild_hints(&mut self) {
        let count = self.entry_count();
        let stride = count / (HINT_SLOTS + 1);
        self.hints = [0; HINT_SLOTS];
        if stride == 0 {
            return;
        }
        for slot in 0..HINT_SLOTS {
            let position = (slot + 1) * stride;
            self.hints[slot] = match &self.kind {
                NodeKind::Leaf { entries, .. } => entries[position].key.head(),
                NodeKind::Internal { keys, .. } => keys[position].head(),
            };
        }
    }

    /// Candidate range for an equality search on `head`, or `None` when the
    /// node is too small for hints to narrow anything.
    ///
    /// The head hash is not order-preserving, so the window is a heuristic:
    /// a miss inside it does not prove absence, and callers fall back to the
    /// full range.
    pub(crate) fn hint_window(&self, head: u32) -> Option<(usize, usize)> {
        let count = self.entry_count();
        let stride = count / (HINT_SLOTS + 1);
        if stride == 0 {
            return None;
        }
        let first = self
            .hints
            .iter()
            .position(|&hint| hint >= head)
            .unwrap_or(HINT_SLOTS);
        let mut last = first;
        while last < HINT_SLOTS && self.hints[last] == head {
            last += 1;
        }
        let lo = first * stride;
        let hi = if last >= HINT_SLOTS {
            count
        } else {
            ((last + 1) * stride).min(count)
        };
        Some((lo, hi))
    }

    /// Equality search within a leaf: `(position, found)`; the position is
    /// the insertion index when the key is absent.
    ///
    /// Tries the hint-narrowed window first and falls back to a full binary
    /// search, so hint collisions only cost time, never correctness.
    pub(crate) fn search(&self, key: &CompositeKey) -> (usize, bool) {
        let NodeKind::Leaf { entries, .. } = &self.kind else {
            unreachable!("equality search targets leaves");
        };
        if let Some((lo, hi)) = self.hint_window(key.head()) {
            if let Ok(pos) = entries[lo..hi].binary_search_by(|e| e.key.cmp(key)) {
                return (lo + pos, true);
            }
        }
        match entries.binary_search_by(|e| e.key.cmp(key)) {
            Ok(pos) => (pos, true),
            Err(pos) => (pos, false),
        }
    }

    /// Index of the first leaf entry whose key is `>=` the argument.
    pub(crate) fn lower_bound_pos(&self, key: &CompositeKey) -> usize {
        let NodeKind::Leaf { entries, .. } = &self.kind else {
            unreachable!("bound search targets leaves");
        };
        entries.partition_point(|e| e.key < *key)
    }

    /// Index of the first leaf entry whose key is `>` the argument.
    pub(crate) fn upper_bound_pos(&self, key: &CompositeKey) -> usize {
        let NodeKind::Leaf { entries, .. } = &self.kind else {
            unreachable!("bound search targets leaves");
        };
        entries.partition_point(|e| e.key <= *key)
    }

    /// Routing step: which child covers `key`.
    pub(crate) fn child_index(&self, key: &CompositeKey) -> usize {
        let NodeKind::Internal { keys, .. } = &self.kind else {
            unreachable!("routing targets internal nodes");
        };
        keys.partition_point(|k| k <= key)
    }
}
