//! Candidate URL screening and the two deterministic fallback URLs.
//!
//! Extraction-time fallbacks only know the caller's query; validation-time
//! fallbacks know the posting's company and title. Both are kept.

const SEARCH_ENGINE_URL: &str = "https://www.google.com/search";
/// Candidates shorter than this are treated as missing.
const MIN_URL_LEN: usize = 10;

/// Cheap syntactic screen applied before any network probe.
///
/// Rejects empty or very short strings and anything with a bracket, which
/// signals unresolved template text from extraction.
pub fn is_plausible_url(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.len() >= MIN_URL_LEN && !candidate.contains(|c: char| c == '[' || c == ']')
}

/// Substitute used at extraction time, built from the caller's full query.
pub fn query_fallback_url(query: &str) -> String {
    format!(
        "{SEARCH_ENGINE_URL}?q={}",
        urlencoding::encode(&format!("{} jobs", query.trim()))
    )
}

/// Substitute used after a failed probe, built from the posting itself.
pub fn job_fallback_url(company: &str, title: &str) -> String {
    format!(
        "{SEARCH_ENGINE_URL}?q={}",
        urlencoding::encode(&format!("{} {} careers", company.trim(), title.trim()))
    )
}
