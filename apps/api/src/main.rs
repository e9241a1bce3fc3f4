mod auth;
mod config;
mod db;
mod errors;
mod jobs;
mod llm_client;
mod routes;
mod search;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::jobs::validation::{HttpLinkProber, LinkProber};
use crate::llm_client::{CompletionModel, LlmClient};
use crate::routes::build_router;
use crate::search::{GoogleSearchClient, SearchProvider};
use crate::state::AppState;
use crate::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Job Search API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    let llm: Option<Arc<dyn CompletionModel>> = match &config.anthropic_api_key {
        Some(key) => {
            let client = LlmClient::new(key.clone(), config.request_timeout)?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(client))
        }
        None => None,
    };

    let search: Option<Arc<dyn SearchProvider>> =
        match (&config.search_api_key, &config.search_engine_id) {
            (Some(key), Some(engine)) => {
                let client =
                    GoogleSearchClient::new(key.clone(), engine.clone(), config.request_timeout)?;
                info!("Web search client initialized");
                Some(Arc::new(client))
            }
            _ => None,
        };

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        warn!(
            "Missing {}; job searches that reach upstream will fail",
            missing.join(", ")
        );
    }

    let prober: Arc<dyn LinkProber> = Arc::new(HttpLinkProber::new(config.probe_timeout)?);

    let state = AppState {
        store,
        search,
        llm,
        prober,
        config: config.clone(),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise a process-local store.
async fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Ok(Arc::new(PgDocumentStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}
