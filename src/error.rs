//! Error module
use std::{borrow::Cow, fmt, io};
use thiserror::Error;

/// The category of a transport level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The server could not be reached: refused connection, DNS failure or a
    /// broken socket.
    ConnectFailed,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The server answered with something that is not a valid response
    /// envelope.
    ProtocolViolation,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectFailed => "connect failed",
            Self::Timeout => "timeout",
            Self::ProtocolViolation => "protocol violation",
        };
        f.write_str(s)
    }
}

/// A unified error enum that contains every error that might occur during
/// the lifecycle of this driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed DSN: {}", _0)]
    /// The connection string could not be parsed or holds conflicting
    /// options.
    MalformedDsn(Cow<'static, str>),
    #[error("Transport error ({}): {}", kind, message)]
    /// A network or infrastructure failure. The statement may not have
    /// reached the server.
    Transport {
        /// What went wrong on the wire.
        kind: TransportErrorKind,
        /// The error description.
        message: String,
    },
    #[error("Server error {}: {}", code, message)]
    /// The server rejected the statement.
    Remote {
        /// The server error code, or the HTTP status when the server gave none.
        code: u32,
        /// The message as reported by the server.
        message: String,
    },
    #[error(
        "Cannot decode column {} value {:?} as {}",
        column_index,
        raw_value,
        expected_type
    )]
    /// A field payload did not match its declared column type.
    Decode {
        /// Zero-based position of the column in the row.
        column_index: usize,
        /// The field as it arrived from the server.
        raw_value: String,
        /// The declared column type.
        expected_type: Cow<'static, str>,
    },
    #[error(
        "Bulk load row {} has {} fields, expected {}",
        row_index,
        found,
        expected
    )]
    /// A bulk load row does not have the shape of the target.
    SchemaMismatch {
        /// Zero-based position of the offending row.
        row_index: usize,
        /// Field count of the target.
        expected: usize,
        /// Field count of the row.
        found: usize,
    },
    #[error("Invalid argument: {}", _0)]
    /// An argument cannot be sent to the server as given, e.g. a statement
    /// with control characters in a request header, or a load file without
    /// a known format.
    InvalidArgument(Cow<'static, str>),
    #[error("Query returned no rows")]
    /// `query_row` found no row to return.
    EmptyResult,
    #[error("Conversion error: {}", _0)]
    /// Conversion failure from a decoded value into a Rust type.
    Conversion(Cow<'static, str>),
}

impl Error {
    pub(crate) fn transport(kind: TransportErrorKind, message: impl ToString) -> Self {
        Self::Transport {
            kind,
            message: message.to_string(),
        }
    }

    pub(crate) fn protocol(message: impl ToString) -> Self {
        Self::transport(TransportErrorKind::ProtocolViolation, message)
    }

    /// Returns the error code, if the error originates from the server.
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True, if the error happened on the transport level.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// True, if repeating the same operation might succeed. Only connection
    /// failures and timeouts qualify; the driver never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport {
                kind: TransportErrorKind::ConnectFailed | TransportErrorKind::Timeout,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_decode() || err.is_body() {
            TransportErrorKind::ProtocolViolation
        } else {
            TransportErrorKind::ConnectFailed
        };

        Self::transport(kind, err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                TransportErrorKind::ProtocolViolation
            }
            _ => TransportErrorKind::ConnectFailed,
        };

        Self::transport(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::protocol(format!("invalid response envelope: {}", err))
    }
}

impl From<time::error::Format> for Error {
    fn from(err: time::error::Format) -> Error {
        Error::Conversion(Cow::Owned(format!("cannot render temporal value: {}", err)))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Error {
        Error::Conversion(Cow::Owned(format!("cannot serialize load row: {}", err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::MalformedDsn(Cow::Owned(format!("{}", err)))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Error {
        Error::MalformedDsn(Cow::Owned(format!("invalid integer option: {}", err)))
    }
}
