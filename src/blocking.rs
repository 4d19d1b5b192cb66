//! Blocking equivalents of [`Client`] and [`Connection`].
//!
//! Every [`BlockingConnection`] owns a single-threaded tokio runtime and
//! drives the asynchronous connection on it, so no runtime is needed by the
//! caller. These types must not be used from within an asynchronous context.

use std::{collections::BTreeMap, path::Path};

use futures_util::stream::TryStreamExt;
use tokio::runtime::{Builder, Runtime};
use tracing::{Level, event};

use crate::{
    Client, Column, Config, Connection, ConnectionInfo, ExecuteResult, LoadProgress, QueryStats,
    Row, RowStream,
};

/// A blocking client.
///
/// # Example
///
/// ```no_run
/// use sluice::blocking::BlockingClient;
///
/// let client = BlockingClient::new("databend://root:@localhost:8000/?sslmode=disable")?;
/// let mut conn = client.get_conn()?;
///
/// for row in conn.query_iter("SELECT number FROM numbers(5)")? {
///     let n: u64 = row?.get(0)?;
///     println!("{n}");
/// }
/// # Ok::<(), sluice::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct BlockingClient {
    client: Client,
}

impl BlockingClient {
    /// Parses the DSN into a client.
    pub fn new(dsn: &str) -> crate::Result<Self> {
        Ok(Self {
            client: Client::new(dsn)?,
        })
    }

    /// Sets the user agent the connections identify themselves with.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            client: self.client.with_name(name),
        }
    }

    /// The parsed connection parameters.
    pub fn config(&self) -> &Config {
        self.client.config()
    }

    /// Opens a new connection with its own runtime.
    pub fn get_conn(&self) -> crate::Result<BlockingConnection> {
        let rt = Builder::new_current_thread().enable_all().build()?;
        let conn = rt.block_on(self.client.get_conn())?;

        Ok(BlockingConnection { rt, conn })
    }
}

/// A blocking [`Connection`].
#[derive(Debug)]
pub struct BlockingConnection {
    rt: Runtime,
    conn: Connection,
}

impl BlockingConnection {
    /// See [`Connection::exec`].
    pub fn exec(&mut self, sql: &str) -> crate::Result<ExecuteResult> {
        self.rt.block_on(self.conn.exec(sql))
    }

    /// See [`Connection::query_row`].
    pub fn query_row(&mut self, sql: &str) -> crate::Result<Row> {
        self.rt.block_on(self.conn.query_row(sql))
    }

    /// See [`Connection::query_iter`]. The rows are fetched lazily while
    /// iterating.
    pub fn query_iter(&mut self, sql: &str) -> crate::Result<BlockingRows<'_>> {
        let stream = self.rt.block_on(self.conn.query_iter(sql))?;

        Ok(BlockingRows {
            rt: &self.rt,
            stream: Some(stream),
        })
    }

    /// See [`Connection::stream_load`].
    pub fn stream_load<I, R, S>(&mut self, sql: &str, rows: I) -> crate::Result<LoadProgress>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rt.block_on(self.conn.stream_load(sql, rows))
    }

    /// See [`Connection::load_file`].
    pub fn load_file(
        &mut self,
        sql: &str,
        path: impl AsRef<Path>,
        options: &BTreeMap<&str, &str>,
    ) -> crate::Result<LoadProgress> {
        self.rt.block_on(self.conn.load_file(sql, path, options))
    }

    /// See [`Connection::info`].
    pub fn info(&self) -> ConnectionInfo {
        self.rt.block_on(self.conn.info())
    }

    /// See [`Connection::version`].
    pub fn version(&mut self) -> crate::Result<String> {
        self.rt.block_on(self.conn.version())
    }

    /// Closes the connection and shuts its runtime down.
    pub fn close(self) -> crate::Result<()> {
        let Self { rt, conn } = self;
        rt.block_on(conn.close())
    }
}

/// An [`Iterator`] over the rows of a query.
///
/// Dropping it before the end cancels the query on the server and waits for
/// the cancellation to be sent.
#[derive(Debug)]
pub struct BlockingRows<'a> {
    rt: &'a Runtime,
    stream: Option<RowStream<'a>>,
}

impl BlockingRows<'_> {
    /// See [`RowStream::schema`].
    pub fn schema(&self) -> &[Column] {
        self.stream.as_ref().map(|s| s.schema()).unwrap_or_default()
    }

    /// See [`RowStream::stats`].
    pub fn stats(&self) -> Option<&QueryStats> {
        self.stream.as_ref().map(|s| s.stats())
    }

    /// See [`RowStream::close`].
    pub fn close(mut self) -> crate::Result<()> {
        match self.stream.take() {
            Some(stream) => self.rt.block_on(stream.close()),
            None => Ok(()),
        }
    }
}

impl Iterator for BlockingRows<'_> {
    type Item = crate::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream.as_mut()?;
        self.rt.block_on(stream.try_next()).transpose()
    }
}

impl Drop for BlockingRows<'_> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = self.rt.block_on(stream.close()) {
                event!(Level::WARN, "Failed to cancel the remaining rows: {}", e);
            }
        }
    }
}
