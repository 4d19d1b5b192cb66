use std::{borrow::Cow, fmt};

use super::DataType;
use crate::{
    Error,
    temporal::{self, Date, PrimitiveDateTime},
};

/// A single decoded field.
///
/// The variant is fixed by the server-declared column type: all signed
/// integer widths decode into `Int64`, all unsigned widths into `UInt64` and
/// both float widths into `Float64`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL `NULL`. Never produced for a non-nullable column.
    Null,
    /// A signed integer.
    Int64(i64),
    /// An unsigned integer.
    UInt64(u64),
    /// A floating point number.
    Float64(f64),
    /// A string, passed through verbatim.
    String(String),
    /// A calendar date.
    Date(Date),
    /// A timestamp without time zone.
    DateTime(PrimitiveDateTime),
}

impl Value {
    /// Decodes one field of a result page.
    ///
    /// `raw` is `None` when the server sent a JSON `null`, which is accepted
    /// only for nullable columns.
    pub fn decode(ty: &DataType, raw: Option<&str>, column_index: usize) -> crate::Result<Self> {
        let mismatch = |raw: &str| Error::Decode {
            column_index,
            raw_value: raw.to_string(),
            expected_type: Cow::Owned(ty.to_string()),
        };

        let raw = match raw {
            None if ty.is_nullable() => return Ok(Value::Null),
            None => return Err(mismatch("null")),
            Some(raw) => raw,
        };

        let value = match ty.inner() {
            DataType::Null | DataType::Nullable(_) => Value::Null,
            int @ (DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64) => {
                let n: i64 = raw.parse().map_err(|_| mismatch(raw))?;
                match int.signed_range() {
                    Some((min, max)) if (min..=max).contains(&n) => Value::Int64(n),
                    _ => return Err(mismatch(raw)),
                }
            }
            uint @ (DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64) => {
                let n: u64 = raw.parse().map_err(|_| mismatch(raw))?;
                match uint.unsigned_max() {
                    Some(max) if n <= max => Value::UInt64(n),
                    _ => return Err(mismatch(raw)),
                }
            }
            DataType::Float32 | DataType::Float64 => {
                Value::Float64(raw.parse().map_err(|_| mismatch(raw))?)
            }
            DataType::String => Value::String(raw.to_string()),
            DataType::Date => Value::Date(temporal::parse_date(raw).ok_or_else(|| mismatch(raw))?),
            DataType::DateTime => {
                Value::DateTime(temporal::parse_datetime(raw).ok_or_else(|| mismatch(raw))?)
            }
        };

        Ok(value)
    }

    /// True for `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value as a bulk load input field.
    ///
    /// Timestamps are written RFC 3339 style (`2011-03-06T06:20:00Z`) and
    /// `NULL` as `\N`, the default null marker of the CSV load format.
    pub fn to_load_field(&self) -> crate::Result<String> {
        let field = match self {
            Value::Null => "\\N".to_string(),
            Value::Date(d) => temporal::render_date(d)?,
            Value::DateTime(dt) => temporal::render_datetime_input(dt)?,
            v => v.to_string(),
        };

        Ok(field)
    }
}

/// Renders the value the way the server does in query results, e.g.
/// `2011-03-06 06:20:00` for a timestamp.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int64(n) => write!(f, "{}", n),
            Value::UInt64(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => f.write_str(&temporal::render_date(d).map_err(|_| fmt::Error)?),
            Value::DateTime(dt) => {
                f.write_str(&temporal::render_datetime(dt).map_err(|_| fmt::Error)?)
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(v: PrimitiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn decode(ty: &str, raw: Option<&str>) -> crate::Result<Value> {
        Value::decode(&ty.parse().unwrap(), raw, 3)
    }

    #[test]
    fn decode_numbers() {
        assert_eq!(Value::Int64(-1), decode("Int64", Some("-1")).unwrap());
        assert_eq!(Value::UInt64(1), decode("UInt64", Some("1")).unwrap());
        assert_eq!(Value::Float64(1.0), decode("Float64", Some("1.0")).unwrap());
        assert_eq!(Value::Int64(-128), decode("Int8", Some("-128")).unwrap());
    }

    #[test]
    fn unsigned_rejects_negative() {
        let err = decode("UInt64", Some("-1")).unwrap_err();
        assert_eq!(
            Error::Decode {
                column_index: 3,
                raw_value: "-1".into(),
                expected_type: "UInt64".into(),
            },
            err
        );
    }

    #[test]
    fn width_is_checked() {
        assert!(decode("Int8", Some("300")).is_err());
        assert!(decode("UInt16", Some("70000")).is_err());
        assert!(decode("Int64", Some("1.5")).is_err());
    }

    #[test]
    fn strings_pass_through() {
        assert_eq!(Value::String("".into()), decode("String", Some("")).unwrap());
        assert_eq!(
            Value::String("a 'quoted', \"value\"\\n".into()),
            decode("String", Some("a 'quoted', \"value\"\\n")).unwrap()
        );
    }

    #[test]
    fn decode_temporal() {
        assert_eq!(
            Value::Date(date!(2011 - 03 - 06)),
            decode("Date", Some("2011-03-06")).unwrap()
        );
        assert_eq!(
            Value::DateTime(datetime!(2011-03-06 06:20:00)),
            decode("Timestamp", Some("2011-03-06 06:20:00.000000")).unwrap()
        );
        assert!(decode("DateTime", Some("2011-03-06T06:20:00Z")).is_err());
    }

    #[test]
    fn null_handling() {
        assert_eq!(Value::Null, decode("Nullable(Int64)", None).unwrap());
        assert_eq!(Value::Int64(5), decode("Nullable(Int64)", Some("5")).unwrap());
        assert_eq!(Value::Null, decode("Null", Some("NULL")).unwrap());

        let err = decode("Int64", None).unwrap_err();
        assert!(matches!(err, Error::Decode { column_index: 3, .. }));
    }

    #[test]
    fn null_is_not_zero() {
        assert_ne!(Value::Null, Value::Int64(0));
        assert_ne!(Value::Null, Value::String(String::new()));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn output_and_load_renderings_differ() {
        let v = Value::DateTime(datetime!(2012-05-31 11:20:00));
        assert_eq!("2012-05-31 11:20:00", v.to_string());
        assert_eq!("2012-05-31T11:20:00Z", v.to_load_field().unwrap());

        assert_eq!("\\N", Value::Null.to_load_field().unwrap());
        assert_eq!(
            "2012-05-31",
            Value::from(date!(2012 - 05 - 31)).to_load_field().unwrap()
        );
    }

    #[test]
    fn from_option() {
        assert_eq!(Value::Null, Value::from(None::<i64>));
        assert_eq!(Value::Int64(4), Value::from(Some(4i64)));
    }
}
