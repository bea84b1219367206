//! Sorted in-memory index with online validation of functional dependencies
//! (FD) and order dependencies (OD).
//!
//! The index maintains, per distinct LHS key, the set of distinct RHS values
//! observed plus boundary metadata between adjacent keys, and keeps a single
//! violation counter exact by delta accounting. Whether `A → B` (FD) or
//! `A ↝ B` (OD) currently holds over the fed pairs is answered in O(1) by
//! [`DependencyIndex::holds`]; inserts, deletes and updates perturb the
//! counter by a small delta instead of forcing a rescan.

pub mod index;
pub mod node;
pub mod payload;
pub mod tree;

pub use index::{DependencyIndex, DependencyKind, Deltas};
pub use payload::PayloadRecord;
pub use tree::{BTree, DEFAULT_MIN_DEGREE};
