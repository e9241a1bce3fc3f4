use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{DocumentStore, Filter, StoreError, TxFn, WriteOp};

/// PostgreSQL-backed document store. One row per document in `documents`,
/// body kept as JSONB; merges use the JSONB `||` operator, which is a shallow
/// top-level merge with the right-hand side winning.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const UPSERT_REPLACE: &str = r#"
    INSERT INTO documents (collection, id, data)
    VALUES ($1, $2, $3)
    ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
"#;

const UPSERT_MERGE: &str = r#"
    INSERT INTO documents (collection, id, data)
    VALUES ($1, $2, $3)
    ON CONFLICT (collection, id)
    DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()
"#;

/// Advisory-lock name for one document. Two documents sharing a hash only
/// serialize each other.
fn lock_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// Batches touch rows in `(collection, id)` order so overlapping batches
/// cannot deadlock.
fn in_lock_order(mut writes: Vec<WriteOp>) -> Vec<WriteOp> {
    writes.sort_by(|a, b| (&a.collection, &a.id).cmp(&(&b.collection, &b.id)));
    writes
}

fn ensure_object(doc: &Value) -> Result<(), StoreError> {
    if doc.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        ensure_object(&doc)?;
        sqlx::query(UPSERT_REPLACE)
            .bind(collection)
            .bind(id)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        ensure_object(&doc)?;
        sqlx::query(UPSERT_MERGE)
            .bind(collection)
            .bind(id)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        ensure_object(&fields)?;
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = now() \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(fields)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let limit = limit as i64;
        let rows = match filter {
            Filter::Eq { field, value } => {
                sqlx::query_as::<_, (String, Value)>(
                    r#"SELECT id, data FROM documents
                       WHERE collection = $1 AND data -> $2 = $3
                       ORDER BY id COLLATE "C" LIMIT $4"#,
                )
                .bind(collection)
                .bind(field)
                .bind(value)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            Filter::Range { field, start, end } => {
                sqlx::query_as::<_, (String, Value)>(
                    r#"SELECT id, data FROM documents
                       WHERE collection = $1
                         AND (data ->> $2) COLLATE "C" >= $3
                         AND (data ->> $2) COLLATE "C" <= $4
                       ORDER BY id COLLATE "C" LIMIT $5"#,
                )
                .bind(collection)
                .bind(field)
                .bind(start)
                .bind(end)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            Filter::ArrayContains { field, value } => {
                sqlx::query_as::<_, (String, Value)>(
                    r#"SELECT id, data FROM documents
                       WHERE collection = $1 AND data -> $2 @> jsonb_build_array($3::jsonb)
                       ORDER BY id COLLATE "C" LIMIT $4"#,
                )
                .bind(collection)
                .bind(field)
                .bind(value)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn list(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(sqlx::query_as::<_, (String, Value)>(
            r#"SELECT id, data FROM documents WHERE collection = $1
               ORDER BY id COLLATE "C" LIMIT $2"#,
        )
        .bind(collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn batch_merge(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        if writes.iter().any(|w| !w.doc.is_object()) {
            return Err(StoreError::NotAnObject);
        }
        let mut tx = self.pool.begin().await?;
        for write in in_lock_order(writes) {
            sqlx::query(UPSERT_MERGE)
                .bind(&write.collection)
                .bind(&write.id)
                .bind(write.doc)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        f: TxFn<'_>,
    ) -> Result<Value, StoreError> {
        let mut tx = self.pool.begin().await?;
        // Serializes writers of this document for the rest of the transaction,
        // including when the row does not exist yet. Runs at READ COMMITTED, so
        // the read below sees whatever the previous holder committed.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(lock_key(collection, id))
            .execute(&mut *tx)
            .await?;

        let current: Option<Value> = sqlx::query_scalar(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let next = match f(current) {
            Ok(next) => next,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        ensure_object(&next)?;

        sqlx::query(UPSERT_REPLACE)
            .bind(collection)
            .bind(id)
            .bind(&next)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use futures::future::join_all;
    use serde_json::json;

    use super::*;
    use crate::db::{create_pool, ensure_schema};
    use crate::jobs::credits::{consume_search_credit, USERS_COLLECTION};

    fn write(collection: &str, id: &str) -> WriteOp {
        WriteOp {
            collection: collection.to_string(),
            id: id.to_string(),
            doc: json!({ "id": id }),
        }
    }

    /// Store against `DATABASE_URL`, or `None` when no database is configured.
    async fn live_store() -> Option<Arc<PgDocumentStore>> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        Some(Arc::new(PgDocumentStore::new(pool)))
    }

    fn unique(name: &str) -> String {
        format!(
            "{name}-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        )
    }

    #[test]
    fn test_batch_lock_order_is_collection_then_id() {
        let ordered = in_lock_order(vec![
            write("job_index", "b"),
            write("job_cache", "z"),
            write("job_index", "a"),
        ]);
        let keys: Vec<(&str, &str)> = ordered
            .iter()
            .map(|w| (w.collection.as_str(), w.id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("job_cache", "z"), ("job_index", "a"), ("job_index", "b")]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_charges_for_one_user_all_succeed() {
        let Some(store) = live_store().await else {
            return;
        };
        let user = unique("pg-credit");
        store
            .set(
                USERS_COLLECTION,
                &user,
                json!({"role": "user", "jobSearchesUsed": 0, "jobSearchLimit": 100}),
            )
            .await
            .unwrap();

        let results = join_all((0..8).map(|_| {
            let store = store.clone();
            let user = user.clone();
            tokio::spawn(async move { consume_search_credit(store.as_ref(), &user, 10).await })
        }))
        .await;

        for result in results {
            assert!(result.unwrap().is_ok());
        }
        let profile = store.get(USERS_COLLECTION, &user).await.unwrap().unwrap();
        assert_eq!(profile["jobSearchesUsed"], 8);
        store.delete(USERS_COLLECTION, &user).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_charges_never_exceed_the_limit() {
        let Some(store) = live_store().await else {
            return;
        };
        // No profile yet: the first charge creates it under the lock.
        let user = unique("pg-limit");

        let results = join_all((0..8).map(|_| {
            let store = store.clone();
            let user = user.clone();
            tokio::spawn(async move { consume_search_credit(store.as_ref(), &user, 3).await })
        }))
        .await;

        let mut granted = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => granted += 1,
                Err(e) => assert_eq!(e.code(), "RESOURCE_EXHAUSTED"),
            }
        }
        assert_eq!(granted, 3);
        let profile = store.get(USERS_COLLECTION, &user).await.unwrap().unwrap();
        assert_eq!(profile["jobSearchesUsed"], 3);
        store.delete(USERS_COLLECTION, &user).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_batches_in_opposite_order_both_land() {
        let Some(store) = live_store().await else {
            return;
        };
        let collection = unique("pg-batch");
        let ids: Vec<String> = (0..20).map(|i| format!("job-{i:02}")).collect();
        let forward: Vec<WriteOp> = ids.iter().map(|id| write(&collection, id)).collect();
        let backward: Vec<WriteOp> = ids.iter().rev().map(|id| write(&collection, id)).collect();

        let (a, b) = tokio::join!(store.batch_merge(forward), store.batch_merge(backward));
        a.unwrap();
        b.unwrap();

        assert_eq!(store.list(&collection, 100).await.unwrap().len(), 20);
        for id in &ids {
            store.delete(&collection, id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_merge_and_prefix_query_round_trip() {
        let Some(store) = live_store().await else {
            return;
        };
        let collection = unique("pg-query");
        store
            .merge(&collection, "a", json!({"company_lower": "acme", "n": 1}))
            .await
            .unwrap();
        store.merge(&collection, "a", json!({"n": 2})).await.unwrap();
        store
            .merge(&collection, "b", json!({"company_lower": "globex"}))
            .await
            .unwrap();

        let doc = store.get(&collection, "a").await.unwrap().unwrap();
        assert_eq!(doc, json!({"company_lower": "acme", "n": 2}));

        let hits = store
            .query(&collection, &Filter::prefix("company_lower", "ac"), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a");

        store.delete(&collection, "a").await.unwrap();
        store.delete(&collection, "b").await.unwrap();
    }
}
