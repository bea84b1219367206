//! Read-only column segments consumed by the index bulk loader.
//!
//! The index never owns table storage; it observes columns through the
//! [`ColumnSegment`] trait. The concrete implementation wraps an Arrow
//! array, the columnar memory format the rest of the stack speaks.

pub mod segment;

pub use segment::{ArrowSegment, ColumnSegment};
