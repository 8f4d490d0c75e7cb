//! Grouped (field-collapsing) search against a Solr core.
//!
//! Each [`GroupQuery`] fragment becomes one `group.query` parameter; Solr
//! returns one doclist per fragment, which is normalised into a
//! [`GroupedResult`]. Documents whose type is not in the backend's
//! [`DocumentTypeRegistry`] are dropped and no longer counted as hits.

mod request;
mod response;

use std::fmt;

use serde_json::Value as JsonValue;

pub use request::build_params;
pub use response::{FacetCounts, GroupedResponse, GroupedResult, SearchHit};

use crate::{
    config::SolrSettings,
    errors::{GroupQueryError, Result, SearchError},
    group::GroupQuery,
    registry::DocumentTypeRegistry,
};

const SELECT_HANDLER: &str = "select";
const NO_GROUP_QUERIES: &str = "You must specify at least one group query.";

/// Lifecycle of one search invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Unexecuted,
    Sent,
    Succeeded,
    Failed,
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SearchState::Unexecuted => "unexecuted",
            SearchState::Sent => "sent",
            SearchState::Succeeded => "succeeded",
            SearchState::Failed => "failed",
        };
        f.write_str(label)
    }
}

struct SearchRun {
    state: SearchState,
}

impl SearchRun {
    fn new() -> Self {
        Self {
            state: SearchState::Unexecuted,
        }
    }

    fn advance(&mut self, next: SearchState) {
        log::debug!("grouped search {} -> {}", self.state, next);
        self.state = next;
    }
}

/// HTTP client for one Solr core, plus the document types it accepts.
#[derive(Debug, Clone)]
pub struct SolrGroupBackend {
    client: reqwest::Client,
    select_url: String,
    settings: SolrSettings,
    registry: DocumentTypeRegistry,
}

impl SolrGroupBackend {
    pub fn new(settings: SolrSettings, registry: DocumentTypeRegistry) -> Result<Self> {
        let base_url = settings.resolved_url()?;
        let client = reqwest::Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            select_url: format!("{base_url}/{SELECT_HANDLER}"),
            settings,
            registry,
        })
    }

    pub fn settings(&self) -> &SolrSettings {
        &self.settings
    }

    pub fn registry(&self) -> &DocumentTypeRegistry {
        &self.registry
    }

    pub fn select_url(&self) -> &str {
        &self.select_url
    }

    /// The form parameters `search` would send for `query`.
    pub fn request_params(&self, query: &GroupQuery) -> Vec<(String, String)> {
        build_params(query, &self.settings, &self.registry)
    }

    /// Run a grouped search.
    ///
    /// A query without group fragments is rejected before anything else; an
    /// empty query string yields an empty response. Neither touches the
    /// network. With `silently_fail` set (it is off by default), transport and protocol failures are
    /// logged and replaced by a single empty group.
    pub async fn search(&self, query: &GroupQuery) -> Result<GroupedResponse> {
        if query.group_queries().is_empty() {
            return Err(GroupQueryError::new(NO_GROUP_QUERIES).into());
        }
        if query.query_string.is_empty() {
            return Ok(GroupedResponse::empty());
        }

        let mut run = SearchRun::new();
        match self.execute(query, &mut run).await {
            Ok(response) => {
                run.advance(SearchState::Succeeded);
                Ok(response)
            }
            Err(err) => {
                run.advance(SearchState::Failed);
                if self.settings.silently_fail && err.is_backend_failure() {
                    log::error!("Failed to query Solr using '{}': {}", query.query_string, err);
                    Ok(GroupedResponse::from_groups(vec![GroupedResult::empty()]))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn execute(&self, query: &GroupQuery, run: &mut SearchRun) -> Result<GroupedResponse> {
        let params = self.request_params(query);
        log::debug!(
            "querying {} with q='{}' and {} group queries",
            self.select_url,
            query.query_string,
            query.group_queries().len()
        );

        run.advance(SearchState::Sent);
        let response = self.client.post(&self.select_url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = solr_error_message(&body).unwrap_or_else(|| format!("Solr returned {status}"));
            return Err(SearchError::protocol(Some(status.as_u16()), message));
        }

        let payload: JsonValue = serde_json::from_str(&body).map_err(|err| {
            SearchError::protocol(Some(status.as_u16()), format!("failed to decode Solr response: {err}"))
        })?;

        response::normalise(&payload, &self.settings, &self.registry)
    }
}

fn solr_error_message(body: &str) -> Option<String> {
    let payload: JsonValue = serde_json::from_str(body).ok()?;
    payload
        .get("error")?
        .get("msg")?
        .as_str()
        .map(str::to_string)
}
