use serde::Deserialize;

use super::SessionState;

/// An error reported by the server inside a response envelope.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub code: u32,
    pub message: String,
}

impl From<QueryError> for crate::Error {
    fn from(err: QueryError) -> Self {
        crate::Error::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

/// The body of a non-success HTTP response, when the server sends one.
#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub error: QueryError,
}

/// One column of the result schema: its name and type tag.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Rows and bytes processed by some stage of a query.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub bytes: u64,
}

/// Progress counters reported with every page.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryStats {
    #[serde(default)]
    pub running_time_ms: f64,
    #[serde(default)]
    pub scan_progress: Progress,
    #[serde(default)]
    pub write_progress: Progress,
    #[serde(default)]
    pub result_progress: Progress,
}

/// One page of a query response. The first page is returned by
/// `POST /v1/query`, the following ones by `GET {next_uri}`.
///
/// A missing `next_uri` marks the final page.
#[derive(Deserialize, Debug, Default)]
pub struct QueryResponse {
    pub id: String,
    #[serde(default)]
    pub session: Option<SessionState>,
    #[serde(default)]
    pub schema: Vec<SchemaField>,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub error: Option<QueryError>,
    #[serde(default)]
    pub stats: QueryStats,
    #[serde(default)]
    pub next_uri: Option<String>,
    #[serde(default)]
    pub final_uri: Option<String>,
    #[serde(default)]
    pub kill_uri: Option<String>,
}

/// The body answering `PUT /v1/streaming_load`.
#[derive(Deserialize, Debug, Default)]
pub struct LoadResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub stats: Progress,
    #[serde(default)]
    pub error: Option<QueryError>,
}
