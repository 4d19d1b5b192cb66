use std::{sync::Arc, time::Duration};

use futures_util::future::BoxFuture;
use reqwest::{
    Body, RequestBuilder, Response,
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{Level, event};
use url::Url;

use super::{BasicAuth, Config};
use crate::{
    Error,
    protocol::{
        HEADER_INSERT_SQL, HEADER_QUERY_ID, HEADER_TENANT, HEADER_WAREHOUSE, LOAD_PATH, QUERY_PATH,
        pipeline::PageSource,
        wire::{ErrorBody, LoadResponse, PaginationConfig, QueryRequest, QueryResponse, SessionState},
    },
};

/// The HTTP side of a connection.
///
/// Holds the transport and the session state the server hands back with
/// every response. Cloning is cheap and clones share that state, which lets
/// a cancellation outlive the stream that requested it.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    http: reqwest::Client,
    endpoint: Url,
    auth: BasicAuth,
    tenant: Option<String>,
    pagination: PaginationConfig,
    timeout: Duration,
    load_timeout: Duration,
    state: Arc<Mutex<SessionState>>,
    warehouse: Arc<Mutex<Option<String>>>,
}

impl Session {
    /// Builds the transport. No request is sent.
    pub(crate) fn new(config: &Config, user_agent: &str) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(config.get_connect_timeout())
            .pool_idle_timeout(Duration::from_secs(1))
            .build()?;

        let state = SessionState::default()
            .with_database(config.database.clone())
            .with_settings(config.settings.clone());

        Ok(Self {
            http,
            endpoint: config.endpoint()?,
            auth: config.auth.clone(),
            tenant: config.tenant.clone(),
            pagination: config.pagination.clone(),
            timeout: config.get_page_request_timeout(),
            load_timeout: config.get_load_timeout(),
            state: Arc::new(Mutex::new(state)),
            warehouse: Arc::new(Mutex::new(config.warehouse.clone())),
        })
    }

    pub(crate) async fn current_database(&self) -> Option<String> {
        self.state.lock().await.database.clone()
    }

    pub(crate) async fn current_warehouse(&self) -> Option<String> {
        self.warehouse.lock().await.clone()
    }

    /// Sends a statement, returning the first page of its result.
    pub(crate) async fn start_query(&self, sql: &str) -> crate::Result<QueryResponse> {
        event!(Level::INFO, "Starting query: {}", sql);

        let session = self.state.lock().await.clone();
        let req = QueryRequest::new(sql)
            .with_session(session)
            .with_pagination(&self.pagination);

        let builder = self
            .request(reqwest::Method::POST, QUERY_PATH)
            .await?
            .timeout(self.timeout)
            .json(&req);

        self.query_response(builder).await
    }

    /// Fetches the page behind a `next_uri`.
    pub(crate) async fn query_page(&self, next_uri: &str) -> crate::Result<QueryResponse> {
        event!(Level::DEBUG, "Query page: {}", next_uri);

        let builder = self
            .request(reqwest::Method::GET, next_uri)
            .await?
            .timeout(self.timeout);

        self.query_response(builder).await
    }

    /// Asks the server to cancel a running query.
    pub(crate) async fn kill_query(&self, kill_uri: &str) -> crate::Result<()> {
        event!(Level::DEBUG, "Killing query: {}", kill_uri);

        let resp = self
            .request(reqwest::Method::POST, kill_uri)
            .await?
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(remote_error(resp).await);
        }

        Ok(())
    }

    /// Uploads a body into the table of `sql`, with the format options as
    /// request headers.
    pub(crate) async fn streaming_load(
        &self,
        sql: &str,
        format: Vec<(String, String)>,
        body: Body,
        size: u64,
        file_name: &str,
    ) -> crate::Result<LoadResponse> {
        event!(Level::INFO, "Streaming load: {} ({} bytes)", sql, size);

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, HEADER_INSERT_SQL, &sql.replace(['\r', '\n'], " "))?;
        for (name, value) in &format {
            insert_header(&mut headers, name, value)?;
        }

        let part = Part::stream_with_length(body, size).file_name(file_name.to_string());
        let form = Form::new().part("upload", part);

        let resp = self
            .request(reqwest::Method::PUT, LOAD_PATH)
            .await?
            .timeout(self.load_timeout)
            .headers(headers)
            .multipart(form)
            .send()
            .await?;

        let load: LoadResponse = read_json(resp).await?;
        event!(
            Level::DEBUG,
            "Streaming load {} finished: {} rows, {} bytes",
            load.id,
            load.stats.rows,
            load.stats.bytes
        );

        Ok(load)
    }

    /// A request against the service with credentials and routing headers.
    async fn request(&self, method: reqwest::Method, path: &str) -> crate::Result<RequestBuilder> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|e| Error::protocol(format!("invalid uri `{}`: {}", path, e)))?;

        let builder = self
            .http
            .request(method, url)
            .basic_auth(self.auth.user(), self.auth.password())
            .headers(self.headers().await?);

        Ok(builder)
    }

    async fn headers(&self) -> crate::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, HEADER_QUERY_ID, &uuid::Uuid::new_v4().to_string())?;

        if let Some(tenant) = &self.tenant {
            insert_header(&mut headers, HEADER_TENANT, tenant)?;
        }

        if let Some(warehouse) = self.current_warehouse().await {
            insert_header(&mut headers, HEADER_WAREHOUSE, &warehouse)?;
        }

        Ok(headers)
    }

    async fn query_response(&self, builder: RequestBuilder) -> crate::Result<QueryResponse> {
        let page: QueryResponse = read_json(builder.send().await?).await?;
        self.handle_session(page.session.as_ref()).await;

        if let Some(err) = page.error {
            return Err(err.into());
        }

        Ok(page)
    }

    /// Keeps the session state the server returned, e.g. after `USE db`.
    async fn handle_session(&self, session: Option<&SessionState>) {
        let Some(session) = session else {
            return;
        };

        *self.state.lock().await = session.clone();

        let warehouse = session.settings.as_ref().and_then(|s| s.get("warehouse"));
        if let Some(warehouse) = warehouse {
            *self.warehouse.lock().await = Some(warehouse.clone());
        }
    }
}

impl PageSource for Session {
    fn next_page(&self, next_uri: String) -> BoxFuture<'_, crate::Result<QueryResponse>> {
        Box::pin(async move { self.query_page(&next_uri).await })
    }

    fn kill(&self, kill_uri: String) -> BoxFuture<'_, crate::Result<()>> {
        Box::pin(async move { self.kill_query(&kill_uri).await })
    }

    fn kill_detached(&self, kill_uri: String) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = self.clone();
                handle.spawn(async move {
                    if let Err(e) = session.kill_query(&kill_uri).await {
                        event!(Level::WARN, "Failed to cancel query {}: {}", kill_uri, e);
                    }
                });
            }
            Err(_) => {
                event!(
                    Level::WARN,
                    "No runtime to cancel query {}, leaving it to the server timeout",
                    kill_uri
                );
            }
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> crate::Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::InvalidArgument(format!("invalid header name {}", name).into()))?;

    // UTF-8 travels as opaque bytes, control characters cannot.
    let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| {
        Error::InvalidArgument(format!("value for header {} contains control characters", name).into())
    })?;

    headers.insert(name, value);
    Ok(())
}

/// Reads a JSON body, turning a non-success status into a remote error.
async fn read_json<T: DeserializeOwned>(resp: Response) -> crate::Result<T> {
    if !resp.status().is_success() {
        return Err(remote_error(resp).await);
    }

    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// The error for a non-success response. The code comes from the body when
/// the server sent one, otherwise it is the HTTP status.
async fn remote_error(resp: Response) -> Error {
    let status = resp.status();

    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(e) => return e.into(),
    };

    if let Ok(ErrorBody { error }) = serde_json::from_slice::<ErrorBody>(&body) {
        return error.into();
    }

    let text = String::from_utf8_lossy(&body);
    let message = match text.trim() {
        "" => status.canonical_reason().unwrap_or("request failed").to_string(),
        text => text.to_string(),
    };

    Error::Remote {
        code: u32::from(status.as_u16()),
        message,
    }
}
