// Job search: cached web search + model extraction + smart index.
// All model calls go through llm_client; all persistence through store.

pub mod cache;
pub mod credits;
pub mod extraction;
pub mod handlers;
pub mod history;
pub mod index;
pub mod keys;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod smart_search;
pub mod urls;
pub mod validation;
