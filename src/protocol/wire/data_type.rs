use std::{fmt, str::FromStr};

use crate::Error;

/// Describes a column's type as declared by the server in the result schema.
///
/// The server sends type tags as text, e.g. `Int64` or `Nullable(UInt64)`.
/// SQL aliases such as `BIGINT UNSIGNED`, `DOUBLE` or `VARCHAR` are accepted
/// as well, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// The type of a bare `NULL` literal.
    Null,
    /// 8-bit integer, signed.
    Int8,
    /// 16-bit integer, signed.
    Int16,
    /// 32-bit integer, signed.
    Int32,
    /// 64-bit integer, signed.
    Int64,
    /// 8-bit integer, unsigned.
    UInt8,
    /// 16-bit integer, unsigned.
    UInt16,
    /// 32-bit integer, unsigned.
    UInt32,
    /// 64-bit integer, unsigned.
    UInt64,
    /// 32-bit floating point number.
    Float32,
    /// 64-bit floating point number.
    Float64,
    /// A string value.
    String,
    /// A calendar date.
    Date,
    /// A timestamp without time zone (`DateTime` or `Timestamp`).
    DateTime,
    /// Any of the above, allowing `NULL`.
    Nullable(Box<DataType>),
}

impl DataType {
    /// True, if the column may hold `NULL`.
    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Null | DataType::Nullable(_))
    }

    /// The type with any `Nullable` wrapper removed.
    pub fn inner(&self) -> &DataType {
        match self {
            DataType::Nullable(inner) => inner.inner(),
            ty => ty,
        }
    }

    /// The inclusive range of a signed integer type.
    pub(crate) fn signed_range(&self) -> Option<(i64, i64)> {
        match self {
            DataType::Int8 => Some((i8::MIN.into(), i8::MAX.into())),
            DataType::Int16 => Some((i16::MIN.into(), i16::MAX.into())),
            DataType::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
            DataType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// The upper bound of an unsigned integer type.
    pub(crate) fn unsigned_max(&self) -> Option<u64> {
        match self {
            DataType::UInt8 => Some(u8::MAX.into()),
            DataType::UInt16 => Some(u16::MAX.into()),
            DataType::UInt32 => Some(u32::MAX.into()),
            DataType::UInt64 => Some(u64::MAX),
            _ => None,
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(inner) = strip_wrapper(s, "nullable") {
            let inner: DataType = inner.parse()?;
            return Ok(match inner {
                DataType::Nullable(_) | DataType::Null => inner,
                ty => DataType::Nullable(Box::new(ty)),
            });
        }

        let ty = match s.to_ascii_lowercase().as_str() {
            "null" => DataType::Null,
            "int8" | "tinyint" => DataType::Int8,
            "int16" | "smallint" => DataType::Int16,
            "int32" | "int" | "integer" => DataType::Int32,
            "int64" | "bigint" => DataType::Int64,
            "uint8" | "tinyint unsigned" => DataType::UInt8,
            "uint16" | "smallint unsigned" => DataType::UInt16,
            "uint32" | "int unsigned" | "integer unsigned" => DataType::UInt32,
            "uint64" | "bigint unsigned" => DataType::UInt64,
            "float32" | "float" => DataType::Float32,
            "float64" | "double" => DataType::Float64,
            "string" | "varchar" | "text" => DataType::String,
            "date" => DataType::Date,
            "datetime" | "timestamp" => DataType::DateTime,
            _ => {
                return Err(Error::protocol(format!("unsupported column type `{}`", s)));
            }
        };

        Ok(ty)
    }
}

fn strip_wrapper<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let open = s.find('(')?;
    if !s[..open].trim().eq_ignore_ascii_case(name) || !s.ends_with(')') {
        return None;
    }

    Some(&s[open + 1..s.len() - 1])
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => f.write_str("Null"),
            DataType::Int8 => f.write_str("Int8"),
            DataType::Int16 => f.write_str("Int16"),
            DataType::Int32 => f.write_str("Int32"),
            DataType::Int64 => f.write_str("Int64"),
            DataType::UInt8 => f.write_str("UInt8"),
            DataType::UInt16 => f.write_str("UInt16"),
            DataType::UInt32 => f.write_str("UInt32"),
            DataType::UInt64 => f.write_str("UInt64"),
            DataType::Float32 => f.write_str("Float32"),
            DataType::Float64 => f.write_str("Float64"),
            DataType::String => f.write_str("String"),
            DataType::Date => f.write_str("Date"),
            DataType::DateTime => f.write_str("DateTime"),
            DataType::Nullable(inner) => write!(f, "Nullable({})", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_tags() {
        assert_eq!(DataType::UInt64, "UInt64".parse().unwrap());
        assert_eq!(DataType::DateTime, "Timestamp".parse().unwrap());
        assert_eq!(DataType::Int64, "BIGINT".parse().unwrap());
        assert_eq!(DataType::UInt64, "bigint unsigned".parse().unwrap());
        assert_eq!(DataType::Float64, "Double".parse().unwrap());
    }

    #[test]
    fn parse_nullable() {
        let ty: DataType = "Nullable(Int64)".parse().unwrap();
        assert_eq!(DataType::Nullable(Box::new(DataType::Int64)), ty);
        assert!(ty.is_nullable());
        assert_eq!(&DataType::Int64, ty.inner());
        assert_eq!("Nullable(Int64)", ty.to_string());

        let ty: DataType = "Nullable(Nullable(String))".parse().unwrap();
        assert_eq!("Nullable(String)", ty.to_string());

        let ty: DataType = "Nullable(Null)".parse().unwrap();
        assert_eq!(DataType::Null, ty);
    }

    #[test]
    fn unsupported_tag_is_protocol_error() {
        let err = "Array(Int32)".parse::<DataType>().unwrap_err();
        assert!(err.is_transport());
        assert!(format!("{}", err).contains("Array(Int32)"));
    }

    #[test]
    fn integer_bounds() {
        assert_eq!(Some((-128, 127)), DataType::Int8.signed_range());
        assert_eq!(Some(65535), DataType::UInt16.unsigned_max());
        assert_eq!(None, DataType::String.signed_range());
    }
}
