pub mod pipeline;
pub mod temporal;
pub mod wire;

/// Uniquely identifies a request, generated per request.
pub(crate) const HEADER_QUERY_ID: &str = "X-DATABEND-QUERY-ID";
/// The tenant a request is routed to.
pub(crate) const HEADER_TENANT: &str = "X-DATABEND-TENANT";
/// The warehouse that executes the statement.
pub(crate) const HEADER_WAREHOUSE: &str = "X-DATABEND-WAREHOUSE";
/// The statement a streaming load feeds its upload into.
pub(crate) const HEADER_INSERT_SQL: &str = "insert_sql";

/// Path of the query endpoint.
pub(crate) const QUERY_PATH: &str = "/v1/query";
/// Path of the streaming load endpoint.
pub(crate) const LOAD_PATH: &str = "/v1/streaming_load";
