//! Per-user history of jobs surfaced by fresh searches.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::jobs::models::{HistoryEntry, JobRecord, SOURCE_EXTERNAL};
use crate::store::{DocumentStore, StoreError, WriteOp};

/// Upper bound on entries returned by `list_history`.
pub const HISTORY_LIST_LIMIT: usize = 100;

pub fn history_collection(user_id: &str) -> String {
    format!("users/{user_id}/job_history")
}

/// Merge-upserts `jobs` into the user's history, tagged as external.
pub async fn record_history(
    store: &dyn DocumentStore,
    user_id: &str,
    jobs: &[JobRecord],
    search_query: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let collection = history_collection(user_id);
    let writes = jobs
        .iter()
        .map(|job| {
            let entry = HistoryEntry {
                job: JobRecord {
                    source: Some(SOURCE_EXTERNAL.to_string()),
                    ..job.clone()
                },
                search_query: search_query.to_string(),
                saved_at: now,
            };
            Ok(WriteOp {
                collection: collection.clone(),
                id: job.id.clone(),
                doc: serde_json::to_value(entry)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    store.batch_merge(writes).await
}

pub async fn list_history(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<Vec<HistoryEntry>, StoreError> {
    let rows = store
        .list(&history_collection(user_id), HISTORY_LIST_LIMIT)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, doc)| match serde_json::from_value(doc) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable history entry {id} for user {user_id}: {e}");
                None
            }
        })
        .collect())
}

/// Removes one entry. Returns whether it existed.
pub async fn delete_history(
    store: &dyn DocumentStore,
    user_id: &str,
    job_id: &str,
) -> Result<bool, StoreError> {
    store.delete(&history_collection(user_id), job_id).await
}
