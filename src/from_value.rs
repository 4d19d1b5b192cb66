use crate::{Row, Value};

/// A conversion trait from a decoded [`Value`] into a Rust type.
///
/// Needed for reading a field with [`Row::get`]. The following Rust types
/// are implemented for the server types:
///
/// |Rust type|Server type|
/// |--------|--------|
/// |`i64`|`Int8`..`Int64`|
/// |`i32`|`Int8`..`Int32`, or a wider value in range|
/// |`u64`|`UInt8`..`UInt64`|
/// |`u32`|`UInt8`..`UInt32`, or a wider value in range|
/// |`f64`|`Float32`/`Float64`|
/// |`String`|any non-null value, rendered as text|
/// |[`Date`](crate::temporal::Date)|`Date`|
/// |[`PrimitiveDateTime`](crate::temporal::PrimitiveDateTime)|`DateTime`/`Timestamp`|
/// |[`Value`]|anything|
///
/// Reading a `NULL` requires `Option<T>`.
pub trait FromValue: Sized {
    /// Converts the value, failing on a variant mismatch or a `NULL`.
    fn from_value(value: &Value) -> crate::Result<Self>;
}

/// A conversion trait from a whole [`Row`], implemented for tuples of up to
/// eight [`FromValue`] types.
pub trait FromRow: Sized {
    /// Converts the row, failing if the arity or any field does not match.
    fn from_row(row: &Row) -> crate::Result<Self>;
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> crate::Result<Self> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> crate::Result<Self> {
        Ok(value.clone())
    }
}

fn out_of_range<T>(v: &Value, ty: &str) -> crate::Result<T> {
    Err(crate::Error::Conversion(
        format!("{} is out of range for {}", v, ty).into(),
    ))
}

from_value!(
    i64: Value::Int64(v) => Ok(*v);
    u64: Value::UInt64(v) => Ok(*v);
    f64: Value::Float64(v) => Ok(*v);
    i32: v @ Value::Int64(n) => i32::try_from(*n).or_else(|_| out_of_range(v, "i32"));
    u32: v @ Value::UInt64(n) => u32::try_from(*n).or_else(|_| out_of_range(v, "u32"));
    String:
        Value::String(s) => Ok(s.clone()),
        v @ (Value::Int64(_)
        | Value::UInt64(_)
        | Value::Float64(_)
        | Value::Date(_)
        | Value::DateTime(_)) => Ok(v.to_string())
);

from_row_tuple!(
    (A: 0);
    (A: 0, B: 1);
    (A: 0, B: 1, C: 2);
    (A: 0, B: 1, C: 2, D: 3);
    (A: 0, B: 1, C: 2, D: 3, E: 4);
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
);
