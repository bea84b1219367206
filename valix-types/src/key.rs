//! Composite comparable keys and their 32-bit head fingerprint.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::value::Value;

/// Seed mixed into the head hash so fingerprints are stable but distinct
/// from other FxHash uses of the same bytes.
const HEAD_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// An ordered sequence of typed values drawn from one or more key columns.
///
/// Keys compare lexicographically column by column. Each key carries a
/// `head`: a 32-bit non-order-preserving fingerprint of its first component,
/// sampled into node hint arrays to narrow binary searches. Equal keys have
/// equal heads; unequal keys may collide, so the head only accelerates and
/// never replaces a full comparison.
#[derive(Debug, Clone)]
pub struct CompositeKey {
    values: Vec<Value>,
    head: u32,
}

impl CompositeKey {
    /// Build a key from owned values.
    ///
    /// Returns `None` when the slice is empty or any component is null: such
    /// a key cannot participate in validation (null rows are segregated, not
    /// validated).
    pub fn from_values(values: Vec<Value>) -> Option<Self> {
        if values.is_empty() || values.iter().any(Value::is_null) {
            return None;
        }
        let head = compute_head(&values);
        Some(Self { values, head })
    }

    /// Convenience constructor cloning from a borrowed slice.
    pub fn from_slice(values: &[Value]) -> Option<Self> {
        Self::from_values(values.to_vec())
    }

    /// Single-column key.
    pub fn single(value: impl Into<Value>) -> Option<Self> {
        Self::from_values(vec![value.into()])
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The 32-bit fingerprint of the first component.
    #[inline]
    pub fn head(&self) -> u32 {
        self.head
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.values.len()
    }
}

/// Fingerprint of a key's first component; `0` for an empty key.
///
/// FxHash is not cryptographic and not order-preserving; collisions are
/// benign because every hint hit is confirmed by a full key comparison.
pub fn compute_head(values: &[Value]) -> u32 {
    let Some(first) = values.first() else {
        return 0;
    };
    let mut hasher = FxHasher::default();
    hasher.write_u64(HEAD_SEED);
    first.hash(&mut hasher);
    hasher.finish() as u32
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for CompositeKey {}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values.cmp(&other.values)
    }
}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(values: Vec<Value>) -> CompositeKey {
        CompositeKey::from_values(values).expect("valid key")
    }

    #[test]
    fn lexicographic_ordering() {
        let a = key(vec![Value::Int32(1), Value::Int32(9)]);
        let b = key(vec![Value::Int32(2), Value::Int32(0)]);
        let c = key(vec![Value::Int32(2), Value::Int32(1)]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn equal_keys_have_equal_heads() {
        let a = key(vec![Value::Int32(42), Value::Str("x".into())]);
        let b = key(vec![Value::Int32(42), Value::Str("y".into())]);
        // Heads depend only on the first component.
        assert_eq!(a.head(), b.head());
        let c = key(vec![Value::Int32(42)]);
        assert_eq!(a.head(), c.head());
    }

    #[test]
    fn empty_key_head_is_zero() {
        assert_eq!(compute_head(&[]), 0);
    }

    #[test]
    fn null_components_are_rejected() {
        assert!(CompositeKey::from_values(vec![Value::Null]).is_none());
        assert!(CompositeKey::from_values(vec![Value::Int32(1), Value::Null]).is_none());
        assert!(CompositeKey::from_values(vec![]).is_none());
    }

    #[test]
    fn head_is_deterministic() {
        let a = CompositeKey::single(123i64).unwrap();
        let b = CompositeKey::single(123i64).unwrap();
        assert_eq!(a.head(), b.head());
    }
}
