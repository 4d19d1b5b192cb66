use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Session state carried between requests. The server returns an updated
/// copy with every response, e.g. after `USE db`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<BTreeMap<String, String>>,
}

impl SessionState {
    pub fn with_database(mut self, database: Option<String>) -> Self {
        self.database = database;
        self
    }

    pub fn with_settings(mut self, settings: BTreeMap<String, String>) -> Self {
        self.settings = (!settings.is_empty()).then_some(settings);
        self
    }
}

/// Server-side paging knobs.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows_in_buffer: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows_per_page: Option<u64>,
}

impl PaginationConfig {
    pub fn is_empty(&self) -> bool {
        self.wait_time_secs.is_none()
            && self.max_rows_in_buffer.is_none()
            && self.max_rows_per_page.is_none()
    }
}

/// The body of `POST /v1/query`.
#[derive(Serialize, Debug)]
pub struct QueryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionState>,
    sql: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<PaginationConfig>,
}

impl<'a> QueryRequest<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self {
            session: None,
            sql,
            pagination: None,
        }
    }

    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_pagination(mut self, pagination: &PaginationConfig) -> Self {
        self.pagination = (!pagination.is_empty()).then(|| pagination.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request() {
        let mut settings = BTreeMap::new();
        settings.insert("timezone".to_string(), "UTC".to_string());

        let req = QueryRequest::new("select 1")
            .with_session(
                SessionState::default()
                    .with_database(Some("default".into()))
                    .with_settings(settings),
            )
            .with_pagination(&PaginationConfig {
                wait_time_secs: Some(1),
                max_rows_in_buffer: None,
                max_rows_per_page: Some(2),
            });

        assert_eq!(
            r#"{"session":{"database":"default","settings":{"timezone":"UTC"}},"sql":"select 1","pagination":{"wait_time_secs":1,"max_rows_per_page":2}}"#,
            serde_json::to_string(&req).unwrap()
        );
    }

    #[test]
    fn empty_pagination_is_omitted() {
        let req = QueryRequest::new("select 1").with_pagination(&PaginationConfig::default());
        assert_eq!(r#"{"sql":"select 1"}"#, serde_json::to_string(&req).unwrap());
    }
}
