//! Date and time handling.
//!
//! The two directions of the wire are not mirror images. Query results carry
//! timestamps as `YYYY-MM-DD HH:MM:SS` (optionally with a fraction), while
//! bulk load input is written RFC 3339 style, `YYYY-MM-DDTHH:MM:SSZ`. The
//! functions here are named after the direction they serve.

mod time;

pub use self::time::*;
