use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use arrow::datatypes::DataType;

use valix_result::{Error, Result};
use valix_types::Value;

/// A read-only, totally ordered column of typed values.
///
/// `value_at` surfaces null slots as [`Value::Null`]; the loader segregates
/// any row containing a null instead of indexing it.
pub trait ColumnSegment: Send + Sync {
    /// Number of rows in the segment.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value stored at `offset`. Panics if `offset >= len()`.
    fn value_at(&self, offset: usize) -> Value;
}

/// [`ColumnSegment`] over an Arrow array.
///
/// Supported types: `Int32`, `Int64`, `Float32`, `Float64`, `Utf8`,
/// `LargeUtf8`.
#[derive(Clone)]
pub struct ArrowSegment {
    array: ArrayRef,
}

impl ArrowSegment {
    pub fn new(array: ArrayRef) -> Result<Self> {
        match array.data_type() {
            DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
            | DataType::Utf8
            | DataType::LargeUtf8 => Ok(Self { array }),
            other => Err(Error::InvalidArgumentError(format!(
                "unsupported segment type {other:?}"
            ))),
        }
    }

    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }
}

impl ColumnSegment for ArrowSegment {
    fn len(&self) -> usize {
        self.array.len()
    }

    fn value_at(&self, offset: usize) -> Value {
        assert!(offset < self.array.len(), "segment offset out of range");
        if self.array.is_null(offset) {
            return Value::Null;
        }
        match self.array.data_type() {
            DataType::Int32 => {
                let array = self.array.as_any().downcast_ref::<Int32Array>().unwrap();
                Value::Int32(array.value(offset))
            }
            DataType::Int64 => {
                let array = self.array.as_any().downcast_ref::<Int64Array>().unwrap();
                Value::Int64(array.value(offset))
            }
            DataType::Float32 => {
                let array = self.array.as_any().downcast_ref::<Float32Array>().unwrap();
                Value::Float32(array.value(offset))
            }
            DataType::Float64 => {
                let array = self.array.as_any().downcast_ref::<Float64Array>().unwrap();
                Value::Float64(array.value(offset))
            }
            DataType::Utf8 => {
                let array = self.array.as_any().downcast_ref::<StringArray>().unwrap();
                Value::Str(array.value(offset).to_string())
            }
            DataType::LargeUtf8 => {
                let array = self
                    .array
                    .as_any()
                    .downcast_ref::<LargeStringArray>()
                    .unwrap();
                Value::Str(array.value(offset).to_string())
            }
            // Rejected in `new`.
            other => unreachable!("unsupported segment type {other:?}"),
        }
    }
}
