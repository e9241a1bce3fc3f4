use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized job posting as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Persisted result set for one normalized (query, location) key.
///
/// `expires_at` is fixed at creation; hits only refresh `last_accessed_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub query: String,
    pub location: String,
    pub jobs: Vec<JobRecord>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Denormalized per-job record backing smart search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub company_lower: String,
    pub location_lower: String,
    pub title_keywords: Vec<String>,
    #[serde(rename = "sourceQuery")]
    pub source_query: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastAccessedAt")]
    pub last_accessed_at: DateTime<Utc>,
}

/// A job surfaced to one user, stored under that user's scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub job: JobRecord,
    pub search_query: String,
    pub saved_at: DateTime<Utc>,
}

/// Tag on records produced by the extraction pipeline.
pub const SOURCE_WEB_SEARCH: &str = "web_search";
/// Tag on history entries written by this pipeline (non-partner origin).
pub const SOURCE_EXTERNAL: &str = "external";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job() -> JobRecord {
        JobRecord {
            id: "dev-acme".into(),
            title: "Dev".into(),
            company: "Acme".into(),
            location: "Austin".into(),
            description: "Build things".into(),
            url: "https://acme.dev/jobs/1".into(),
            salary: None,
            posted: None,
            source: Some(SOURCE_WEB_SEARCH.into()),
        }
    }

    #[test]
    fn test_indexed_job_flattens_record_fields() {
        let now = Utc::now();
        let indexed = IndexedJob {
            job: job(),
            company_lower: "acme".into(),
            location_lower: "austin".into(),
            title_keywords: vec!["dev".into()],
            source_query: "dev-austin".into(),
            created_at: now,
            last_accessed_at: now,
        };
        let value = serde_json::to_value(&indexed).unwrap();
        assert_eq!(value["title"], "Dev");
        assert_eq!(value["company_lower"], "acme");
        assert_eq!(value["sourceQuery"], "dev-austin");
        assert!(value.get("salary").is_none());
        assert!(value.get("createdAt").is_some());

        let back: IndexedJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, indexed);
    }

    #[test]
    fn test_job_record_accepts_missing_optionals() {
        let value = json!({
            "id": "x", "title": "T", "company": "C", "location": "L",
            "description": "D", "url": "https://c.example/jobs"
        });
        let record: JobRecord = serde_json::from_value(value).unwrap();
        assert!(record.salary.is_none());
        assert!(record.source.is_none());
    }
}
