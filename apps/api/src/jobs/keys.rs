//! Identity derivation: cache keys, job ids and title keywords.
//!
//! These rules decide which queries share a cache bucket and which postings
//! collapse into one index record, so they must stay byte-for-byte stable.

use sha2::{Digest, Sha256};

/// Key used when a query normalizes to nothing.
pub const DEFAULT_CACHE_KEY: &str = "default-search";
/// Storage key-length ceiling for job ids.
pub const MAX_JOB_ID_LEN: usize = 100;
/// Hex digits of the digest used for ids with no ASCII alphanumerics.
const HASHED_ID_HEX_LEN: usize = 16;
/// Title tokens shorter than this are not indexed.
const MIN_KEYWORD_LEN: usize = 3;

/// Canonical cache key for a (query, location) pair.
///
/// Both parts are trimmed and lowercased, joined with `-`, stripped of every
/// character outside `[a-z0-9-]` (spaces included), hyphen runs collapsed and
/// edge hyphens removed.
pub fn normalize_cache_key(query: &str, location: &str) -> String {
    let joined = format!(
        "{}-{}",
        query.trim().to_lowercase(),
        location.trim().to_lowercase()
    );
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    let key = collapse_hyphens(&kept);
    if key.is_empty() {
        DEFAULT_CACHE_KEY.to_string()
    } else {
        key
    }
}

/// Deterministic job id from title and company.
///
/// Lowercases `"{title}-{company}"`, turns every non-alphanumeric run into a
/// single `-`, trims edge hyphens and truncates to `MAX_JOB_ID_LEN`. When
/// nothing survives (e.g. CJK-only text) the id is `job-` plus a SHA-256
/// prefix of the trimmed, lowercased pair.
pub fn derive_job_id(title: &str, company: &str) -> String {
    let lowered = format!("{title}-{company}").to_lowercase();
    let mut id = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !id.is_empty() {
                id.push('-');
            }
            pending_hyphen = false;
            id.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    id.truncate(MAX_JOB_ID_LEN);
    if id.is_empty() {
        return hashed_job_id(title, company);
    }
    id
}

fn hashed_job_id(title: &str, company: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(company.trim().to_lowercase().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("job-{}", &digest[..HASHED_ID_HEX_LEN])
}

/// Lowercased title tokens worth indexing, in order of first appearance.
pub fn title_keywords(title: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
    {
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

fn collapse_hyphens(s: &str) -> String {
    s.split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ignores_case_and_outer_whitespace() {
        assert_eq!(
            normalize_cache_key("Software Engineer", "NYC"),
            normalize_cache_key("  software engineer  ", "nyc")
        );
    }

    #[test]
    fn test_normalize_distinguishes_different_titles() {
        assert_ne!(
            normalize_cache_key("Software Engineer", "NYC"),
            normalize_cache_key("Software Engineer II", "NYC")
        );
    }

    #[test]
    fn test_normalize_strips_spaces_rather_than_hyphenating() {
        assert_eq!(
            normalize_cache_key("Backend Engineer", "Austin"),
            "backendengineer-austin"
        );
    }

    #[test]
    fn test_normalize_collapses_and_trims_hyphens() {
        assert_eq!(normalize_cache_key("--c++ -- dev--", ""), "c-dev");
        assert_eq!(normalize_cache_key("rust", ""), "rust");
    }

    #[test]
    fn test_normalize_empty_falls_back_to_default() {
        assert_eq!(normalize_cache_key("", ""), DEFAULT_CACHE_KEY);
        assert_eq!(normalize_cache_key("!!!", "  ??  "), DEFAULT_CACHE_KEY);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_cache_key("Data Scientist (Remote)", "San Francisco, CA");
        assert_eq!(normalize_cache_key(&once, ""), once);
    }

    #[test]
    fn test_job_id_for_non_ascii_text_is_hashed_and_distinct() {
        let engineer = derive_job_id("软件工程师", "腾讯");
        let designer = derive_job_id("设计师", "腾讯");
        assert!(engineer.starts_with("job-"));
        assert_eq!(engineer.len(), 4 + HASHED_ID_HEX_LEN);
        assert_ne!(engineer, designer);
        assert_eq!(engineer, derive_job_id("  软件工程师 ", "腾讯"));
    }

    #[test]
    fn test_job_id_basic_shape() {
        assert_eq!(
            derive_job_id("Senior Rust Engineer", "Acme, Inc."),
            "senior-rust-engineer-acme-inc"
        );
    }

    #[test]
    fn test_job_id_stable_across_case_and_whitespace() {
        assert_eq!(
            derive_job_id("  Senior   Rust Engineer ", "ACME inc"),
            derive_job_id("senior rust engineer", "Acme Inc")
        );
    }

    #[test]
    fn test_job_id_truncated_to_limit() {
        let title = "a".repeat(150);
        let id = derive_job_id(&title, "Acme");
        assert_eq!(id.len(), MAX_JOB_ID_LEN);
        assert!(id.chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_job_id_drops_non_ascii_letters() {
        assert_eq!(derive_job_id("Ingénieur", "Société"), "ing-nieur-soci-t");
    }

    #[test]
    fn test_title_keywords_filters_short_tokens() {
        assert_eq!(
            title_keywords("Sr. Rust / Go Engineer (Remote)"),
            vec!["rust", "engineer", "remote"]
        );
    }

    #[test]
    fn test_title_keywords_dedups() {
        assert_eq!(title_keywords("Data data DATA"), vec!["data"]);
    }
}
