//! Query cache: one `CacheEntry` per normalized (query, location) key.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::jobs::models::{CacheEntry, JobRecord};
use crate::store::{DocumentStore, StoreError};

pub const CACHE_COLLECTION: &str = "job_search_cache";

/// Returns the live entry for `key`, if any.
///
/// Entries past `expires_at` and entries that no longer deserialize are
/// reported as misses; the next miss overwrites them.
pub async fn lookup(
    store: &dyn DocumentStore,
    key: &str,
    now: DateTime<Utc>,
) -> Result<Option<CacheEntry>, StoreError> {
    let Some(doc) = store.get(CACHE_COLLECTION, key).await? else {
        return Ok(None);
    };
    let entry: CacheEntry = match serde_json::from_value(doc) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Ignoring unreadable cache entry {key}: {e}");
            return Ok(None);
        }
    };
    if entry.expires_at <= now {
        debug!("Cache entry {key} expired at {}", entry.expires_at);
        return Ok(None);
    }
    Ok(Some(entry))
}

/// Refreshes `lastAccessedAt` in a detached task. Failures are only logged.
pub fn spawn_touch(store: Arc<dyn DocumentStore>, key: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let fields = json!({ "lastAccessedAt": Utc::now() });
        if let Err(e) = store.update(CACHE_COLLECTION, &key, fields).await {
            warn!("Failed to refresh lastAccessedAt for cache entry {key}: {e}");
        }
    })
}

/// Writes a fresh entry for `key`, replacing any previous one.
/// `expiresAt` is `now + ttl_days` and is never extended afterwards.
pub async fn write_entry(
    store: &dyn DocumentStore,
    key: &str,
    query: &str,
    location: &str,
    jobs: &[JobRecord],
    now: DateTime<Utc>,
    ttl_days: i64,
) -> Result<CacheEntry, StoreError> {
    let entry = CacheEntry {
        query: query.to_string(),
        location: location.to_string(),
        jobs: jobs.to_vec(),
        created_at: now,
        last_accessed_at: now,
        expires_at: now + Duration::days(ttl_days),
    };
    store
        .set(CACHE_COLLECTION, key, serde_json::to_value(&entry)?)
        .await?;
    Ok(entry)
}
