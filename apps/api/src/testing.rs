//! In-memory fakes for the collaborator traits, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::jobs::validation::LinkProber;
use crate::llm_client::{CompletionModel, LlmError};
use crate::search::{SearchHit, SearchProvider};
use crate::state::AppState;
use crate::store::{DocumentStore, Filter, MemoryDocumentStore, StoreError, TxFn, WriteOp};

pub struct FakeSearch {
    pub hits: Vec<SearchHit>,
    pub calls: AtomicUsize,
}

impl FakeSearch {
    pub fn with_hits(count: usize) -> Arc<Self> {
        let hits = (0..count)
            .map(|i| SearchHit {
                title: format!("Role {i}"),
                link: format!("https://company{i}.example.com/jobs/{i}"),
                snippet: format!("Company {i} is hiring"),
            })
            .collect();
        Arc::new(Self {
            hits,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, _query: &str) -> Vec<SearchHit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hits.clone()
    }
}

pub struct FakeModel {
    pub completion: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeModel {
    /// Answers with `count` well-formed postings.
    pub fn with_jobs(count: usize) -> Arc<Self> {
        Arc::new(Self {
            completion: Some(completion_with(count)),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Fails every call with an API error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            completion: None,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            completion: Some(completion_with(1)),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for FakeModel {
    async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completion.clone().ok_or(LlmError::Api {
            status: 529,
            message: "overloaded".into(),
        })
    }
}

pub fn completion_with(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "Title: Backend Engineer {i}\nCompany: Company {i}\nLocation: Austin, TX\n\
                 Description: Build APIs.\nURL: https://company{i}.example.com/jobs/{i}\n---\n"
            )
        })
        .collect()
}

/// Treats every URL as live.
#[derive(Default)]
pub struct LiveProber {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LinkProber for LiveProber {
    async fn probe(&self, _url: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Memory store whose plain writes always fail; reads and transactions work.
#[derive(Default)]
pub struct FailingWritesStore {
    pub inner: MemoryDocumentStore,
}

fn write_failure() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl DocumentStore for FailingWritesStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, _collection: &str, _id: &str, _doc: Value) -> Result<(), StoreError> {
        Err(write_failure())
    }

    async fn merge(&self, _collection: &str, _id: &str, _doc: Value) -> Result<(), StoreError> {
        Err(write_failure())
    }

    async fn update(&self, _collection: &str, _id: &str, _fields: Value) -> Result<(), StoreError> {
        Err(write_failure())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<bool, StoreError> {
        Err(write_failure())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.query(collection, filter, limit).await
    }

    async fn list(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.list(collection, limit).await
    }

    async fn batch_merge(&self, _writes: Vec<WriteOp>) -> Result<(), StoreError> {
        Err(write_failure())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        f: TxFn<'_>,
    ) -> Result<Value, StoreError> {
        self.inner.transact(collection, id, f).await
    }
}

pub fn test_state(
    store: Arc<dyn DocumentStore>,
    search: Option<Arc<FakeSearch>>,
    llm: Option<Arc<FakeModel>>,
) -> AppState {
    AppState {
        store,
        search: search.map(|s| s as Arc<dyn SearchProvider>),
        llm: llm.map(|m| m as Arc<dyn CompletionModel>),
        prober: Arc::new(LiveProber::default()),
        config: Config::default(),
    }
}
