//! Mappings between the wire text forms and the `time` crate types.

pub use time::{Date, PrimitiveDateTime};
use time::{
    OffsetDateTime, UtcOffset, error::Format, format_description::BorrowedFormatItem,
    format_description::well_known::Rfc3339, macros::format_description,
};

use crate::Value;

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const DATETIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
);

const DATETIME_T: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

const DATETIME_OUT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DATETIME_T_OUT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

const FRACTION: &[BorrowedFormatItem<'static>] = format_description!("[subsecond digits:9]");

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, DATE).ok()
}

/// Parses a timestamp as the server renders it in query results,
/// `YYYY-MM-DD HH:MM:SS` with an optional fractional part.
pub fn parse_datetime(s: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(s, DATETIME).ok()
}

/// Parses a timestamp written for bulk load input.
///
/// Accepts RFC 3339 (`2011-03-06T06:20:00Z`, `2011-03-06T08:20:00+02:00`),
/// normalized to UTC, and the offset-less `T` separated form.
pub fn parse_datetime_input(s: &str) -> Option<PrimitiveDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        let dt = dt.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(dt.date(), dt.time()));
    }

    PrimitiveDateTime::parse(s, DATETIME_T).ok()
}

/// Renders a date as `YYYY-MM-DD`.
pub fn render_date(date: &Date) -> Result<String, Format> {
    date.format(DATE)
}

/// Renders a timestamp the way query results show it: `YYYY-MM-DD HH:MM:SS`,
/// with a fraction only when the sub-second part is non-zero.
pub fn render_datetime(dt: &PrimitiveDateTime) -> Result<String, Format> {
    let mut s = dt.format(DATETIME_OUT)?;
    push_fraction(&mut s, dt)?;
    Ok(s)
}

/// Renders a timestamp for bulk load input: `YYYY-MM-DDTHH:MM:SSZ`.
pub fn render_datetime_input(dt: &PrimitiveDateTime) -> Result<String, Format> {
    let mut s = dt.format(DATETIME_T_OUT)?;
    push_fraction(&mut s, dt)?;
    s.push('Z');
    Ok(s)
}

fn push_fraction(s: &mut String, dt: &PrimitiveDateTime) -> Result<(), Format> {
    if dt.nanosecond() != 0 {
        let frac = dt.format(FRACTION)?;
        s.push('.');
        s.push_str(frac.trim_end_matches('0'));
    }

    Ok(())
}

from_value!(
    Date: Value::Date(d) => Ok(*d);
    PrimitiveDateTime: Value::DateTime(dt) => Ok(*dt)
);
