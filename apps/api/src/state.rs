use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppError;
use crate::jobs::validation::LinkProber;
use crate::llm_client::CompletionModel;
use crate::search::SearchProvider;
use crate::store::DocumentStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every collaborator is a trait object built once at startup, so tests can
/// substitute in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// `None` when the search credentials are not configured.
    pub search: Option<Arc<dyn SearchProvider>>,
    /// `None` when the model credential is not configured.
    pub llm: Option<Arc<dyn CompletionModel>>,
    pub prober: Arc<dyn LinkProber>,
    pub config: Config,
}

impl AppState {
    /// The paid upstream services, or `FailedPrecondition` naming what is
    /// missing.
    pub fn upstreams(&self) -> Result<(&dyn SearchProvider, &dyn CompletionModel), AppError> {
        match (&self.search, &self.llm) {
            (Some(search), Some(llm)) => Ok((search.as_ref(), llm.as_ref())),
            _ => {
                let missing = self.config.missing_credentials();
                let detail = if missing.is_empty() {
                    "upstream clients are not initialized".to_string()
                } else {
                    missing.join(", ")
                };
                Err(AppError::FailedPrecondition(format!(
                    "Job search is not configured: missing {detail}"
                )))
            }
        }
    }
}
