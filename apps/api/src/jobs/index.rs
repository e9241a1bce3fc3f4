//! Smart index: one denormalized `IndexedJob` per job id.
//!
//! The store has no full-text search, so each record carries precomputed
//! lowercase company/location fields for prefix ranges and a title keyword
//! array for membership queries. Writes are merge-upserts keyed by the
//! deterministic job id, so rediscovering a posting never duplicates it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::jobs::keys::title_keywords;
use crate::jobs::models::{IndexedJob, JobRecord};
use crate::store::{DocumentStore, Filter, StoreError, WriteOp};

pub const INDEX_COLLECTION: &str = "job_index";

pub fn to_indexed(job: &JobRecord, source_query: &str, now: DateTime<Utc>) -> IndexedJob {
    IndexedJob {
        company_lower: job.company.trim().to_lowercase(),
        location_lower: job.location.trim().to_lowercase(),
        title_keywords: title_keywords(&job.title),
        source_query: source_query.to_string(),
        created_at: now,
        last_accessed_at: now,
        job: job.clone(),
    }
}

/// Merge-upserts every job in one batch. Per field, the last write wins.
pub async fn upsert_jobs(
    store: &dyn DocumentStore,
    jobs: &[JobRecord],
    source_query: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let writes = jobs
        .iter()
        .map(|job| {
            Ok(WriteOp {
                collection: INDEX_COLLECTION.to_string(),
                id: job.id.clone(),
                doc: serde_json::to_value(to_indexed(job, source_query, now))?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    store.batch_merge(writes).await
}

pub async fn by_company_prefix(
    store: &dyn DocumentStore,
    prefix: &str,
    limit: usize,
) -> Result<Vec<IndexedJob>, StoreError> {
    run(store, &Filter::prefix("company_lower", prefix), limit).await
}

pub async fn by_title_keyword(
    store: &dyn DocumentStore,
    keyword: &str,
    limit: usize,
) -> Result<Vec<IndexedJob>, StoreError> {
    run(store, &Filter::array_contains("title_keywords", keyword), limit).await
}

pub async fn by_location_prefix(
    store: &dyn DocumentStore,
    prefix: &str,
    limit: usize,
) -> Result<Vec<IndexedJob>, StoreError> {
    run(store, &Filter::prefix("location_lower", prefix), limit).await
}

async fn run(
    store: &dyn DocumentStore,
    filter: &Filter,
    limit: usize,
) -> Result<Vec<IndexedJob>, StoreError> {
    let rows = store.query(INDEX_COLLECTION, filter, limit).await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, doc)| match serde_json::from_value(doc) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!("Skipping unreadable index record {id}: {e}");
                None
            }
        })
        .collect())
}

/// Refreshes `lastAccessedAt` on the given records in a detached task.
pub fn spawn_touch(store: Arc<dyn DocumentStore>, ids: Vec<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if ids.is_empty() {
            return;
        }
        let now = Utc::now();
        let writes = ids
            .into_iter()
            .map(|id| WriteOp {
                collection: INDEX_COLLECTION.to_string(),
                id,
                doc: json!({ "lastAccessedAt": now }),
            })
            .collect();
        if let Err(e) = store.batch_merge(writes).await {
            warn!("Failed to refresh lastAccessedAt on index records: {e}");
        }
    })
}
