use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{merge_objects, DocumentStore, Filter, StoreError, TxFn, WriteOp};

type Collection = BTreeMap<String, Value>;

/// In-process document store. A single mutex serializes every operation,
/// which also makes `transact` trivially atomic.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn merge_into(collection: &mut Collection, id: &str, doc: Value) -> Result<(), StoreError> {
    if !doc.is_object() {
        return Err(StoreError::NotAnObject);
    }
    match collection.get_mut(id) {
        Some(existing) => merge_objects(existing, doc),
        None => {
            collection.insert(id.to_string(), doc);
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.lock().await;
        Ok(guard.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        if !doc.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let mut guard = self.collections.lock().await;
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().await;
        merge_into(guard.entry(collection.to_string()).or_default(), id, doc)
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().await;
        let existing = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_objects(existing, fields)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.collections.lock().await;
        Ok(guard
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let guard = self.collections.lock().await;
        Ok(guard
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, doc)| filter.matches(doc))
                    .take(limit)
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let guard = self.collections.lock().await;
        Ok(guard
            .get(collection)
            .map(|c| {
                c.iter()
                    .take(limit)
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn batch_merge(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        if writes.iter().any(|w| !w.doc.is_object()) {
            return Err(StoreError::NotAnObject);
        }
        let mut guard = self.collections.lock().await;
        for write in writes {
            merge_into(
                guard.entry(write.collection).or_default(),
                &write.id,
                write.doc,
            )?;
        }
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        f: TxFn<'_>,
    ) -> Result<Value, StoreError> {
        let mut guard = self.collections.lock().await;
        let current = guard.get(collection).and_then(|c| c.get(id)).cloned();
        let next = f(current)?;
        if !next.is_object() {
            return Err(StoreError::NotAnObject);
        }
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), next.clone());
        Ok(next)
    }
}
