//! External web-search adapter.
//!
//! Failures never propagate: a transport error, a non-2xx status or an
//! unreadable body all come back as an empty hit list, which callers treat
//! exactly like "no results". No retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Appended to every query to bias results toward job postings.
pub const JOB_QUERY_SUFFIX: &str = " job opening apply";
/// Result count requested per search.
pub const RESULT_COUNT: usize = 10;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Vec<SearchHit>;
}

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

/// Google Programmable Search (Custom Search JSON API) client.
#[derive(Clone)]
pub struct GoogleSearchClient {
    http: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchClient {
    pub fn new(
        api_key: String,
        engine_id: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            endpoint: GOOGLE_SEARCH_URL.to_string(),
            api_key,
            engine_id,
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchHit>, reqwest::Error> {
        let full_query = format!("{query}{JOB_QUERY_SUFFIX}");
        let num = RESULT_COUNT.to_string();
        let response: CustomSearchResponse = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", full_query.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.items)
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, query: &str) -> Vec<SearchHit> {
        info!("Web search for: {query}");
        match self.fetch(query).await {
            Ok(mut hits) => {
                hits.truncate(RESULT_COUNT);
                debug!("Web search returned {} results", hits.len());
                hits
            }
            Err(e) => {
                warn!("Web search failed, treating as no results: {e}");
                Vec::new()
            }
        }
    }
}
