mod auth;
mod config;
mod session;

pub use auth::*;
pub use config::*;
pub(crate) use session::Session;

use std::{collections::BTreeMap, path::Path, sync::Arc};

use futures_util::stream::TryStreamExt;
use tracing::{Level, event};

use crate::{
    BulkLoad, Error, ExecuteResult, LoadProgress, ProgressStream, Row, RowStream,
    protocol::wire::load_file,
};

/// The entry point: a parsed DSN that hands out [`Connection`]s.
///
/// The DSN is validated when the client is created, so a malformed one fails
/// before any network I/O. See [`Config`] for the accepted format.
///
/// # Example
///
/// ```no_run
/// use sluice::Client;
///
/// # #[tokio::main]
/// # async fn main() -> sluice::Result<()> {
/// let client = Client::new("databend://root:@localhost:8000/default?sslmode=disable")?;
/// let mut conn = client.get_conn().await?;
///
/// conn.exec("CREATE TABLE IF NOT EXISTS t (a INT)").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    config: Arc<Config>,
    name: Option<String>,
}

impl Client {
    /// Parses the DSN into a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDsn`] if the DSN cannot be parsed.
    pub fn new(dsn: &str) -> crate::Result<Self> {
        Ok(Self::from_config(Config::from_dsn(dsn)?))
    }

    /// A client for an already built configuration.
    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            name: None,
        }
    }

    /// Sets the user agent the connections identify themselves with.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The parsed connection parameters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a new connection.
    ///
    /// Only the HTTP transport is set up here; nothing is sent before the
    /// first statement, so an unreachable server surfaces as a transport
    /// error from that statement.
    pub async fn get_conn(&self) -> crate::Result<Connection> {
        let user_agent = self.name.clone().unwrap_or_else(crate::user_agent);
        let session = Session::new(&self.config, &user_agent)?;

        event!(Level::DEBUG, "New connection to {}", self.config);

        Ok(Connection {
            session,
            config: self.config.clone(),
        })
    }
}

/// What a connection is connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// The protocol handler, always `RestAPI`.
    pub handler: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// The current database, following `USE` statements.
    pub database: Option<String>,
    /// The current warehouse, following session changes.
    pub warehouse: Option<String>,
}

/// One logical session with the query service.
///
/// Statements run one at a time: the methods take `&mut self`, and a
/// [`RowStream`] borrows the connection until it is dropped. Independent
/// connections share nothing and can be used in parallel.
#[derive(Debug)]
pub struct Connection {
    session: Session,
    config: Arc<Config>,
}

impl Connection {
    /// Executes a statement, reading all of its pages and discarding any
    /// rows.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() -> sluice::Result<()> {
    /// # let client = sluice::Client::new("databend://root:@localhost:8000/?sslmode=disable")?;
    /// # let mut conn = client.get_conn().await?;
    /// let result = conn.exec("INSERT INTO t VALUES (1), (2)").await?;
    /// assert_eq!(2, result.rows_affected());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// A [`Remote`](Error::Remote) error if the server rejects the
    /// statement, a [`Transport`](Error::Transport) error if it cannot be
    /// reached.
    pub async fn exec(&mut self, sql: &str) -> crate::Result<ExecuteResult> {
        let mut page = self.session.start_query(sql).await?;

        while let Some(next_uri) = page.next_uri.take() {
            page = self.session.query_page(&next_uri).await?;
        }

        Ok(ExecuteResult::new(&page.stats))
    }

    /// Runs a query, returning a stream of its rows.
    ///
    /// The statement is sent right away, so a rejected query fails here.
    /// Rows are fetched page by page as the stream is read.
    pub async fn query_iter(&mut self, sql: &str) -> crate::Result<RowStream<'_>> {
        let first = self.session.start_query(sql).await?;
        RowStream::new(&self.session, first)
    }

    /// Like [`query_iter`](Self::query_iter), but the stream also reports
    /// the progress of the query as each page arrives.
    pub async fn query_iter_with_progress(&mut self, sql: &str) -> crate::Result<ProgressStream<'_>> {
        Ok(self.query_iter(sql).await?.with_progress())
    }

    /// Runs a query and returns its first row, cancelling the rest.
    ///
    /// # Errors
    ///
    /// [`EmptyResult`](Error::EmptyResult) if the query returned no rows.
    pub async fn query_row(&mut self, sql: &str) -> crate::Result<Row> {
        let mut rows = self.query_iter(sql).await?;
        let row = rows.try_next().await?;

        if let Err(e) = rows.close().await {
            event!(Level::WARN, "Failed to cancel the remaining rows: {}", e);
        }

        row.ok_or(Error::EmptyResult)
    }

    /// Starts a bulk load into the statement `sql`, e.g. `INSERT INTO t
    /// VALUES`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() -> sluice::Result<()> {
    /// # let client = sluice::Client::new("databend://root:@localhost:8000/?sslmode=disable")?;
    /// # let mut conn = client.get_conn().await?;
    /// let mut load = conn.bulk_load("INSERT INTO users VALUES");
    ///
    /// for (id, name) in [("1", "Alice"), ("2", "Bob")] {
    ///     load.send([id, name])?;
    /// }
    ///
    /// let progress = load.finalize().await?;
    /// assert_eq!(2, progress.write_rows);
    /// # Ok(())
    /// # }
    /// ```
    pub fn bulk_load(&mut self, sql: &str) -> BulkLoad<'_> {
        BulkLoad::new(&self.session, sql)
    }

    /// Loads rows of raw field values through one streaming upload.
    ///
    /// All rows must have the same number of fields, otherwise the load fails
    /// with [`SchemaMismatch`](Error::SchemaMismatch) before anything is
    /// uploaded.
    pub async fn stream_load<I, R, S>(&mut self, sql: &str, rows: I) -> crate::Result<LoadProgress>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut load = self.bulk_load(sql);

        for row in rows {
            load.send(row)?;
        }

        load.finalize().await
    }

    /// Uploads a local file into the statement `sql`, e.g. `INSERT INTO t
    /// VALUES`.
    ///
    /// The options are sent as format headers (`field_delimiter`,
    /// `skip_header`, ...). Without a `format_type` option the format is
    /// the upper-cased file extension, so `books.csv` loads as `CSV` and
    /// `books.parquet` as `PARQUET`.
    ///
    /// # Errors
    ///
    /// [`InvalidArgument`](Error::InvalidArgument) if the file cannot be
    /// read or its format cannot be told.
    pub async fn load_file(
        &mut self,
        sql: &str,
        path: impl AsRef<Path>,
        options: &BTreeMap<&str, &str>,
    ) -> crate::Result<LoadProgress> {
        load_file(&self.session, sql, path.as_ref(), options).await
    }

    /// The connection parameters in effect.
    pub async fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            handler: "RestAPI".to_string(),
            host: self.config.get_host().to_string(),
            port: self.config.get_port(),
            user: self.config.get_auth().user().to_string(),
            database: self.session.current_database().await,
            warehouse: self.session.current_warehouse().await,
        }
    }

    /// The version string of the server.
    pub async fn version(&mut self) -> crate::Result<String> {
        self.query_row("SELECT version()").await?.get(0)
    }

    /// Closes the connection. Nothing is held open between statements, so
    /// this only drops the transport.
    pub async fn close(self) -> crate::Result<()> {
        event!(Level::DEBUG, "Closing connection to {}", self.config);
        Ok(())
    }
}
