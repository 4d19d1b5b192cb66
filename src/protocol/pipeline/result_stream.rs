use std::{
    collections::VecDeque,
    fmt::Debug,
    pin::Pin,
    sync::Arc,
    task::{self, Poll},
};

use futures_util::{
    future::BoxFuture,
    ready,
    stream::{FusedStream, Stream},
};
use tracing::{Level, event};

use crate::{
    Column, Error, Row,
    protocol::wire::{QueryResponse, QueryStats, Value},
};

/// Fetches the pages of a running query and cancels it.
///
/// The HTTP session implements this; the stream itself never touches the
/// network directly.
pub(crate) trait PageSource: Send + Sync {
    /// Requests the page behind `next_uri`.
    fn next_page(&self, next_uri: String) -> BoxFuture<'_, crate::Result<QueryResponse>>;

    /// Asks the server to stop the query and release its resources.
    fn kill(&self, kill_uri: String) -> BoxFuture<'_, crate::Result<()>>;

    /// Like [`kill`](Self::kill), but without waiting for the outcome. Used
    /// when a stream is dropped before it was read to the end.
    fn kill_detached(&self, kill_uri: String);
}

/// The observable state of a [`RowStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The buffered page is used up and the next one has not been requested
    /// yet.
    Idle,
    /// A page request is in flight.
    Fetching,
    /// At least one row is buffered and can be returned without I/O.
    HasRows,
    /// The server sent the final page and every row was returned.
    Exhausted,
    /// A page request or a row failed to decode. No further rows follow.
    Failed,
    /// The consumer stopped reading before the end.
    Closed,
}

/// An item of a [`ProgressStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowWithStats {
    Row(Row),
    /// The progress counters of a page that just arrived, ahead of its rows.
    Stats(QueryStats),
}

enum State<'a> {
    Idle,
    Fetching(BoxFuture<'a, crate::Result<QueryResponse>>),
    HasRows,
    Exhausted,
    Failed,
    Closed,
}

impl State<'_> {
    fn observe(&self) -> StreamState {
        match self {
            State::Idle => StreamState::Idle,
            State::Fetching(_) => StreamState::Fetching,
            State::HasRows => StreamState::HasRows,
            State::Exhausted => StreamState::Exhausted,
            State::Failed => StreamState::Failed,
            State::Closed => StreamState::Closed,
        }
    }
}

/// A lazy, single-pass stream of rows of one query.
///
/// Only the current page is held in memory. When it runs out, advancing the
/// stream requests the next page from the server; rows are decoded one at a
/// time as they are handed out, in the order the server sent them.
///
/// The stream borrows its [`Connection`] exclusively, so no other statement
/// can run on it while rows are still being read. A failed page request or a
/// row that does not decode ends the stream: the error is returned once and
/// the stream yields nothing afterwards.
///
/// Dropping the stream before it is exhausted asks the server to cancel the
/// query in the background, if a tokio runtime is available. Use
/// [`close`](Self::close) to wait for the cancellation instead.
///
/// # Example
///
/// ```no_run
/// # use futures_util::TryStreamExt;
/// # #[tokio::main]
/// # async fn main() -> sluice::Result<()> {
/// # let client = sluice::Client::new("databend://root:@localhost:8000/?sslmode=disable")?;
/// # let mut conn = client.get_conn().await?;
/// let mut rows = conn.query_iter("SELECT number FROM numbers(5)").await?;
/// assert_eq!("number", rows.schema()[0].name());
///
/// while let Some(row) = rows.try_next().await? {
///     let n: u64 = row.get(0)?;
///     println!("{n}");
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`Connection`]: crate::Connection
pub struct RowStream<'a> {
    source: &'a dyn PageSource,
    state: State<'a>,
    query_id: String,
    columns: Arc<Vec<Column>>,
    buffer: VecDeque<Vec<Option<String>>>,
    next_uri: Option<String>,
    kill_uri: Option<String>,
    stats: QueryStats,
    delivered: usize,
}

impl Debug for RowStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("query_id", &self.query_id)
            .field("state", &self.state.observe())
            .field("columns", &self.columns)
            .field("buffered", &self.buffer.len())
            .field("next_uri", &self.next_uri)
            .finish()
    }
}

impl<'a> RowStream<'a> {
    /// Builds the stream from the response that started the query.
    pub(crate) fn new(source: &'a dyn PageSource, first: QueryResponse) -> crate::Result<Self> {
        let mut stream = Self {
            source,
            state: State::Idle,
            query_id: first.id.clone(),
            columns: Arc::new(Vec::new()),
            buffer: VecDeque::new(),
            next_uri: None,
            kill_uri: None,
            stats: QueryStats::default(),
            delivered: 0,
        };

        stream.absorb(first)?;
        Ok(stream)
    }

    /// The server-side id of the query.
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// The columns of the result. Empty until the server has sent the schema,
    /// which may take a few pages for slow queries.
    pub fn schema(&self) -> &[Column] {
        &self.columns
    }

    /// The progress counters of the latest page.
    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// Where the stream currently is in its lifecycle.
    pub fn state(&self) -> StreamState {
        self.state.observe()
    }

    /// Stops reading, cancelling the query on the server if it still has
    /// pages to deliver.
    pub async fn close(mut self) -> crate::Result<()> {
        let pending = self.pending_kill();
        self.state = State::Closed;
        self.buffer.clear();

        if let Some(kill_uri) = pending {
            event!(Level::DEBUG, "Closing query {} early", self.query_id);
            self.source.kill(kill_uri).await?;
        }

        Ok(())
    }

    /// The kill uri, if the server still holds resources for the query.
    fn pending_kill(&self) -> Option<String> {
        let running = match self.state {
            State::Exhausted | State::Closed => false,
            State::Fetching(_) => true,
            _ => self.next_uri.is_some(),
        };

        running.then(|| self.kill_uri.clone()).flatten()
    }

    /// Takes over a page: checks for errors, picks up the schema and the
    /// paging links, and buffers the raw rows.
    fn absorb(&mut self, page: QueryResponse) -> crate::Result<()> {
        if let Some(err) = page.error {
            self.next_uri = None;
            return Err(err.into());
        }

        if self.columns.is_empty() && !page.schema.is_empty() {
            let columns = page
                .schema
                .into_iter()
                .map(Column::from_field)
                .collect::<crate::Result<Vec<_>>>()?;

            self.columns = Arc::new(columns);
        }

        event!(
            Level::TRACE,
            "Query {} page: {} rows, more: {}",
            page.id,
            page.data.len(),
            page.next_uri.is_some(),
        );

        self.stats = page.stats;
        self.next_uri = page.next_uri;
        if page.kill_uri.is_some() {
            self.kill_uri = page.kill_uri;
        }

        self.buffer.extend(page.data);
        self.settle();

        Ok(())
    }

    /// Picks the state that follows from the buffer and the paging links.
    fn settle(&mut self) {
        self.state = if !self.buffer.is_empty() {
            State::HasRows
        } else if self.next_uri.is_some() {
            State::Idle
        } else {
            State::Exhausted
        };
    }

    /// Turns the stream into one that also reports the progress of every
    /// fetched page.
    pub fn with_progress(self) -> ProgressStream<'a> {
        ProgressStream { rows: self }
    }

    fn decode(&self, raw: Vec<Option<String>>) -> crate::Result<Row> {
        if raw.len() != self.columns.len() {
            return Err(Error::protocol(format!(
                "row {} has {} fields, the schema has {} columns",
                self.delivered,
                raw.len(),
                self.columns.len()
            )));
        }

        let values = self
            .columns
            .iter()
            .zip(raw)
            .enumerate()
            .map(|(i, (column, field))| Value::decode(column.data_type(), field.as_deref(), i))
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Row::new(self.columns.clone(), values))
    }
}

impl RowStream<'_> {
    /// Advances the stream. A page fetched from the server is announced with
    /// its stats before the first of its rows.
    fn poll_item(&mut self, cx: &mut task::Context<'_>) -> Poll<Option<crate::Result<RowWithStats>>> {
        loop {
            match &mut self.state {
                State::HasRows => {
                    let Some(raw) = self.buffer.pop_front() else {
                        self.settle();
                        continue;
                    };

                    return match self.decode(raw) {
                        Ok(row) => {
                            self.delivered += 1;
                            if self.buffer.is_empty() {
                                self.settle();
                            }
                            Poll::Ready(Some(Ok(RowWithStats::Row(row))))
                        }
                        Err(e) => {
                            self.state = State::Failed;
                            Poll::Ready(Some(Err(e)))
                        }
                    };
                }
                State::Idle => match self.next_uri.take() {
                    Some(next_uri) => {
                        event!(Level::DEBUG, "Fetching {}", next_uri);
                        let source = self.source;
                        self.state = State::Fetching(source.next_page(next_uri));
                    }
                    None => self.state = State::Exhausted,
                },
                State::Fetching(fut) => {
                    let page = ready!(fut.as_mut().poll(cx));

                    return match page.and_then(|page| self.absorb(page)) {
                        Ok(()) => Poll::Ready(Some(Ok(RowWithStats::Stats(self.stats)))),
                        Err(e) => {
                            self.state = State::Failed;
                            Poll::Ready(Some(Err(e)))
                        }
                    };
                }
                State::Exhausted | State::Failed | State::Closed => return Poll::Ready(None),
            }
        }
    }
}

impl Stream for RowStream<'_> {
    type Item = crate::Result<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            return match ready!(this.poll_item(cx)) {
                Some(Ok(RowWithStats::Row(row))) => Poll::Ready(Some(Ok(row))),
                Some(Ok(RowWithStats::Stats(_))) => continue,
                Some(Err(e)) => Poll::Ready(Some(Err(e))),
                None => Poll::Ready(None),
            };
        }
    }
}

impl FusedStream for RowStream<'_> {
    fn is_terminated(&self) -> bool {
        matches!(
            self.state,
            State::Exhausted | State::Failed | State::Closed
        )
    }
}

impl Drop for RowStream<'_> {
    fn drop(&mut self) {
        if let Some(kill_uri) = self.pending_kill() {
            event!(
                Level::DEBUG,
                "Query {} dropped before the final page, cancelling",
                self.query_id
            );
            self.source.kill_detached(kill_uri);
        }
    }
}

/// A [`RowStream`] that interleaves the progress of the query with its
/// rows.
///
/// Every page fetched after the first yields a
/// [`Stats`](RowWithStats::Stats) item before its rows. Closing and dropping
/// behave as for the underlying [`RowStream`].
///
/// # Example
///
/// ```no_run
/// # use futures_util::TryStreamExt;
/// # use sluice::RowWithStats;
/// # #[tokio::main]
/// # async fn main() -> sluice::Result<()> {
/// # let client = sluice::Client::new("databend://root:@localhost:8000/?sslmode=disable")?;
/// # let mut conn = client.get_conn().await?;
/// let mut items = conn.query_iter_with_progress("SELECT number FROM numbers(100000)").await?;
///
/// while let Some(item) = items.try_next().await? {
///     match item {
///         RowWithStats::Row(row) => println!("{}", row.get::<u64, _>(0)?),
///         RowWithStats::Stats(stats) => println!("{} rows read", stats.scan_progress.rows),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProgressStream<'a> {
    rows: RowStream<'a>,
}

impl ProgressStream<'_> {
    pub fn query_id(&self) -> &str {
        self.rows.query_id()
    }

    pub fn schema(&self) -> &[Column] {
        self.rows.schema()
    }

    pub fn stats(&self) -> &QueryStats {
        self.rows.stats()
    }

    pub fn state(&self) -> StreamState {
        self.rows.state()
    }

    /// Stops reading, cancelling the query on the server if it still has
    /// pages to deliver.
    pub async fn close(self) -> crate::Result<()> {
        self.rows.close().await
    }
}

impl Stream for ProgressStream<'_> {
    type Item = crate::Result<RowWithStats>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rows.poll_item(cx)
    }
}

impl FusedStream for ProgressStream<'_> {
    fn is_terminated(&self) -> bool {
        self.rows.is_terminated()
    }
}
