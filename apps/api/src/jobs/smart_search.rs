//! Smart search over the job index (not the query cache). Not metered.
//!
//! A term is matched against company-name prefixes and exact title keywords;
//! the two hit lists are unioned by id, first hit wins. A location narrows
//! that set by prefix and then by substring when a term is present, or forms
//! the whole result when searched alone.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::jobs::index::{by_company_prefix, by_location_prefix, by_title_keyword, spawn_touch};
use crate::jobs::models::{IndexedJob, JobRecord};
use crate::store::DocumentStore;

/// Per-lookup result cap.
pub const LOOKUP_CAP: usize = 30;
pub const SMART_SEARCH_SOURCE: &str = "smart_search";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSearchRequest {
    pub search_term: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmartSearchResponse {
    pub jobs: Vec<JobRecord>,
    pub source: &'static str,
}

fn normalized(input: Option<String>) -> Option<String> {
    input
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

pub async fn smart_search(
    store: &Arc<dyn DocumentStore>,
    request: SmartSearchRequest,
) -> Result<SmartSearchResponse, AppError> {
    let term = normalized(request.search_term);
    let location = normalized(request.location);

    if term.is_none() && location.is_none() {
        return Ok(SmartSearchResponse {
            jobs: Vec::new(),
            source: SMART_SEARCH_SOURCE,
        });
    }

    let db = store.as_ref();
    let term_lookups = async {
        match term.as_deref() {
            Some(t) => {
                let (companies, keywords) = tokio::try_join!(
                    by_company_prefix(db, t, LOOKUP_CAP),
                    by_title_keyword(db, t, LOOKUP_CAP)
                )?;
                Ok::<_, AppError>(Some((companies, keywords)))
            }
            None => Ok(None),
        }
    };
    let location_lookup = async {
        match location.as_deref() {
            Some(l) => Ok::<_, AppError>(Some(by_location_prefix(db, l, LOOKUP_CAP).await?)),
            None => Ok(None),
        }
    };
    let (term_hits, location_hits) = tokio::try_join!(term_lookups, location_lookup)?;

    let mut working: Vec<IndexedJob> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    if let Some((companies, keywords)) = term_hits {
        for job in companies.into_iter().chain(keywords) {
            if seen.insert(job.job.id.clone()) {
                working.push(job);
            }
        }
    }

    if let Some(location_hits) = location_hits {
        if term.is_some() {
            let in_location: HashSet<String> =
                location_hits.into_iter().map(|j| j.job.id).collect();
            working.retain(|j| in_location.contains(&j.job.id));
        } else {
            for job in location_hits {
                if seen.insert(job.job.id.clone()) {
                    working.push(job);
                }
            }
        }
    }

    if let (Some(_), Some(location)) = (&term, &location) {
        working.retain(|j| j.job.location.to_lowercase().contains(location.as_str()));
    }

    info!(
        "Smart search term={:?} location={:?} matched {} jobs",
        term,
        location,
        working.len()
    );

    let jobs: Vec<JobRecord> = working.into_iter().map(|j| j.job).collect();
    spawn_touch(store.clone(), jobs.iter().map(|j| j.id.clone()).collect());

    Ok(SmartSearchResponse {
        jobs,
        source: SMART_SEARCH_SOURCE,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::jobs::index::upsert_jobs;
    use crate::jobs::keys::derive_job_id;
    use crate::store::MemoryDocumentStore;

    fn job(title: &str, company: &str, location: &str) -> JobRecord {
        JobRecord {
            id: derive_job_id(title, company),
            title: title.into(),
            company: company.into(),
            location: location.into(),
            description: "d".into(),
            url: "https://example.com/jobs/1".into(),
            salary: None,
            posted: None,
            source: None,
        }
    }

    async fn seeded() -> Arc<dyn DocumentStore> {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let jobs = vec![
            job("Rust Engineer", "Acme", "Austin, TX"),
            job("Data Analyst", "Acme", "Boston, MA"),
            job("Senior Rust Developer", "Globex", "Austin, TX"),
            job("Nurse", "Mercy Hospital", "Austin, TX"),
            job("Rust Engineer", "Initech", "Denver, CO"),
        ];
        upsert_jobs(store.as_ref(), &jobs, "seed", Utc::now())
            .await
            .unwrap();
        store
    }

    fn ids(response: &SmartSearchResponse) -> Vec<&str> {
        response.jobs.iter().map(|j| j.id.as_str()).collect()
    }

    fn request(term: Option<&str>, location: Option<&str>) -> SmartSearchRequest {
        SmartSearchRequest {
            search_term: term.map(String::from),
            location: location.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_no_inputs_is_an_empty_result() {
        let store = seeded().await;
        let response = smart_search(&store, request(None, Some("   "))).await.unwrap();
        assert!(response.jobs.is_empty());
        assert_eq!(response.source, SMART_SEARCH_SOURCE);
    }

    #[tokio::test]
    async fn test_term_unions_company_and_keyword_hits() {
        let store = seeded().await;

        let by_company = smart_search(&store, request(Some("ACME"), None)).await.unwrap();
        assert_eq!(ids(&by_company), vec!["data-analyst-acme", "rust-engineer-acme"]);

        let by_keyword = smart_search(&store, request(Some("rust"), None)).await.unwrap();
        assert_eq!(by_keyword.jobs.len(), 3);
    }

    #[tokio::test]
    async fn test_location_only_returns_every_prefixed_location() {
        let store = seeded().await;
        let response = smart_search(&store, request(None, Some("austin"))).await.unwrap();
        let mut found = ids(&response);
        found.sort();
        assert_eq!(
            found,
            vec![
                "nurse-mercy-hospital",
                "rust-engineer-acme",
                "senior-rust-developer-globex"
            ]
        );
    }

    #[tokio::test]
    async fn test_term_and_location_require_both() {
        let store = seeded().await;
        let response = smart_search(&store, request(Some("rust"), Some("Austin")))
            .await
            .unwrap();
        let mut found = ids(&response);
        found.sort();
        // Denver's Rust role matches only the term, the nurse only the location.
        assert_eq!(
            found,
            vec!["rust-engineer-acme", "senior-rust-developer-globex"]
        );
    }

    #[tokio::test]
    async fn test_zero_matches_is_not_an_error() {
        let store = seeded().await;
        let response = smart_search(&store, request(Some("zookeeper"), Some("paris")))
            .await
            .unwrap();
        assert!(response.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_hits_keep_first_seen() {
        let store = seeded().await;
        // Matches "globex" both as company prefix and as title keyword.
        upsert_jobs(
            store.as_ref(),
            &[job("Globex Liaison", "Globex", "Austin, TX")],
            "seed",
            Utc::now(),
        )
        .await
        .unwrap();
        let response = smart_search(&store, request(Some("globex"), None)).await.unwrap();
        let found = ids(&response);
        let unique: HashSet<_> = found.iter().collect();
        assert_eq!(found.len(), unique.len());
        assert_eq!(found.len(), 2);
    }
}
