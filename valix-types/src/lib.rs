//! Common data types for the valix index.
//!
//! This crate hosts the scalar value sum and the composite comparable key,
//! decoupled from the tree machinery (`valix-index`) and the columnar
//! boundary (`valix-column`).

pub mod key;
pub mod value;

pub use key::CompositeKey;
pub use value::Value;

/// Offset of a row inside an indexed chunk of segments.
pub type RowOffset = u32;
