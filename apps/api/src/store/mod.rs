//! Document store seam.
//!
//! Everything the job pipeline persists goes through `DocumentStore`: a flat
//! collection/id keyed JSON store with exact, range and array-membership
//! queries, shallow merge writes and a single-document transaction.
//!
//! Backends: `PgDocumentStore` (JSONB rows) and `MemoryDocumentStore`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Document is not a JSON object")]
    NotAnObject,

    /// Raised from inside a transaction closure to roll back without writing.
    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

/// Query predicate over a single top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    /// Inclusive string range, used to emulate prefix matches.
    Range {
        field: String,
        start: String,
        end: String,
    },
    ArrayContains { field: String, value: Value },
}

/// Upper bound appended to a prefix to build an inclusive range.
const PREFIX_UPPER_BOUND: char = '\u{f8ff}';

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn prefix(field: &str, prefix: &str) -> Self {
        Filter::Range {
            field: field.to_string(),
            start: prefix.to_string(),
            end: format!("{prefix}{PREFIX_UPPER_BOUND}"),
        }
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Filter::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Evaluates the filter against an in-memory document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq { field, value } => doc.get(field) == Some(value),
            Filter::Range { field, start, end } => doc
                .get(field)
                .and_then(Value::as_str)
                .map(|s| s >= start.as_str() && s <= end.as_str())
                .unwrap_or(false),
            Filter::ArrayContains { field, value } => doc
                .get(field)
                .and_then(Value::as_array)
                .map(|arr| arr.contains(value))
                .unwrap_or(false),
        }
    }
}

/// One merge-upsert inside a batch.
#[derive(Debug, Clone)]
pub struct WriteOp {
    pub collection: String,
    pub id: String,
    pub doc: Value,
}

/// Read-modify-write callback. Receives the current document (if any) and
/// returns the document to store, or `StoreError::Aborted` to roll back.
pub type TxFn<'a> = Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send + 'a>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Destructive write: replaces the whole document.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Merge-upsert: creates the document or overwrites only the given
    /// top-level fields (last write wins per field).
    async fn merge(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Like `merge`, but fails with `NotFound` when the document is absent.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Documents matching `filter`, ordered by id, at most `limit`.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    /// All documents in a collection, ordered by id, at most `limit`.
    async fn list(&self, collection: &str, limit: usize)
        -> Result<Vec<(String, Value)>, StoreError>;

    /// Applies all merges atomically.
    async fn batch_merge(&self, writes: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Runs `f` against the current document under the store's transaction
    /// primitive and writes back its result. Returns the written document.
    async fn transact(&self, collection: &str, id: &str, f: TxFn<'_>)
        -> Result<Value, StoreError>;
}

/// Shallow merge of `patch` into `base`, both JSON objects.
pub(crate) fn merge_objects(base: &mut Value, patch: Value) -> Result<(), StoreError> {
    let Value::Object(patch) = patch else {
        return Err(StoreError::NotAnObject);
    };
    let base = base.as_object_mut().ok_or(StoreError::NotAnObject)?;
    for (key, value) in patch {
        base.insert(key, value);
    }
    Ok(())
}
