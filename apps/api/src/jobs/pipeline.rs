//! Job search orchestration.
//!
//! Flow: credit gate → cache probe → web search → extraction → URL
//! validation → fan-out persistence → response. When upstream credentials
//! are missing and no cache hit is possible, the request is refused before
//! the gate charges anything.
//!
//! Gate, search and extraction failures are fatal for the request. The three
//! persistence writes are independent and best-effort: a failing sink is
//! logged and the caller still gets the freshly computed jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::jobs::cache;
use crate::jobs::credits::consume_search_credit;
use crate::jobs::extraction::{extract_jobs, search_phrase};
use crate::jobs::history::record_history;
use crate::jobs::index::upsert_jobs;
use crate::jobs::keys::normalize_cache_key;
use crate::jobs::models::JobRecord;
use crate::jobs::validation::validate_and_fix;
use crate::state::AppState;

pub const DEFAULT_QUERY: &str = "Software Engineer";
pub const DEFAULT_JOB_COUNT: i64 = 10;
pub const MIN_JOB_COUNT: i64 = 5;
pub const MAX_JOB_COUNT: i64 = 20;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    pub location: Option<String>,
    pub job_count: Option<i64>,
    pub bypass_cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub jobs: Vec<JobRecord>,
    pub cached: bool,
}

/// Who is searching. Only metered searches are charged and recorded in
/// history; open searches also index in a detached task.
#[derive(Debug, Clone)]
pub enum SearchMode {
    Metered { user_id: String },
    Open,
}

/// A request with defaults applied and `jobCount` clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSearch {
    pub query: String,
    pub location: String,
    pub job_count: usize,
    pub bypass_cache: bool,
}

impl SearchRequest {
    pub fn resolve(self) -> ResolvedSearch {
        let query = self
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| DEFAULT_QUERY.to_string());
        let location = self
            .location
            .map(|l| l.trim().to_string())
            .unwrap_or_default();
        let job_count = self
            .job_count
            .unwrap_or(DEFAULT_JOB_COUNT)
            .clamp(MIN_JOB_COUNT, MAX_JOB_COUNT) as usize;

        ResolvedSearch {
            query,
            location,
            job_count,
            bypass_cache: self.bypass_cache.unwrap_or(false),
        }
    }
}

/// `run_job_search` bounded by the configured request timeout.
pub async fn search_jobs(
    state: &AppState,
    mode: &SearchMode,
    request: SearchRequest,
) -> Result<SearchResponse, AppError> {
    tokio::time::timeout(
        state.config.request_timeout,
        run_job_search(state, mode, request),
    )
    .await
    .map_err(|_| AppError::DeadlineExceeded)?
}

pub async fn run_job_search(
    state: &AppState,
    mode: &SearchMode,
    request: SearchRequest,
) -> Result<SearchResponse, AppError> {
    let search = request.resolve();
    let key = normalize_cache_key(&search.query, &search.location);

    // 0. Without upstream credentials only a cache hit is servable; refuse
    // anything else before charging.
    if let Some(missing) = state.upstreams().err() {
        if !servable_from_cache(state, &search, &key).await {
            return Err(missing);
        }
    }

    // 1. Gate before any paid call.
    if let SearchMode::Metered { user_id } = mode {
        consume_search_credit(
            state.store.as_ref(),
            user_id,
            state.config.default_search_limit,
        )
        .await?;
    }

    // 2. Cache probe.
    if !search.bypass_cache {
        match cache::lookup(state.store.as_ref(), &key, Utc::now()).await {
            Ok(Some(entry)) => {
                info!("Cache hit for {key}");
                cache::spawn_touch(state.store.clone(), key.clone());
                let mut jobs = entry.jobs;
                jobs.truncate(search.job_count);
                return Ok(SearchResponse { jobs, cached: true });
            }
            Ok(None) => debug!("Cache miss for {key}"),
            Err(e) => warn!("Cache lookup for {key} failed, treating as a miss: {e}"),
        }
    }

    // 3. Miss path.
    let (search_provider, model) = state.upstreams()?;

    let hits = search_provider
        .search(&search_phrase(&search.query, &search.location))
        .await;
    if hits.is_empty() {
        info!("No search results for {key}");
        return Ok(SearchResponse {
            jobs: Vec::new(),
            cached: false,
        });
    }

    let extracted = extract_jobs(model, &search.query, &search.location, &hits).await?;
    let jobs = validate_and_fix(state.prober.as_ref(), extracted).await;

    // 4. Fan-out persistence.
    if !jobs.is_empty() {
        persist_results(state, mode, &search, &key, &jobs, Utc::now()).await;
    }

    let mut jobs = jobs;
    jobs.truncate(search.job_count);
    info!("Returning {} fresh jobs for {key}", jobs.len());
    Ok(SearchResponse {
        jobs,
        cached: false,
    })
}

async fn servable_from_cache(state: &AppState, search: &ResolvedSearch, key: &str) -> bool {
    !search.bypass_cache
        && matches!(
            cache::lookup(state.store.as_ref(), key, Utc::now()).await,
            Ok(Some(_))
        )
}

async fn persist_results(
    state: &AppState,
    mode: &SearchMode,
    search: &ResolvedSearch,
    key: &str,
    jobs: &[JobRecord],
    now: DateTime<Utc>,
) {
    let store = state.store.as_ref();

    let cache_write = async {
        if let Err(e) = cache::write_entry(
            store,
            key,
            &search.query,
            &search.location,
            jobs,
            now,
            state.config.cache_ttl_days,
        )
        .await
        {
            warn!("Failed to write cache entry {key}: {e}");
        }
    };

    match mode {
        SearchMode::Metered { user_id } => {
            let index_write = async {
                if let Err(e) = upsert_jobs(store, jobs, key, now).await {
                    warn!("Failed to index {} jobs from {key}: {e}", jobs.len());
                }
            };
            let history_write = async {
                let surfaced = &jobs[..jobs.len().min(search.job_count)];
                if let Err(e) = record_history(store, user_id, surfaced, &search.query, now).await
                {
                    warn!("Failed to record job history for user {user_id}: {e}");
                }
            };
            tokio::join!(cache_write, index_write, history_write);
        }
        SearchMode::Open => {
            let store = state.store.clone();
            let jobs = jobs.to_vec();
            let key_owned = key.to_string();
            tokio::spawn(async move {
                if let Err(e) = upsert_jobs(store.as_ref(), &jobs, &key_owned, now).await {
                    warn!("Failed to index {} jobs from {key_owned}: {e}", jobs.len());
                }
            });
            cache_write.await;
        }
    }
}
