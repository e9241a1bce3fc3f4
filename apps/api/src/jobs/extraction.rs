//! Extraction pipeline: turns raw search hits into `JobRecord`s through one
//! model completion and a tolerant line parser.
//!
//! Garbled model output degrades to defaults and dropped blocks, never to an
//! error. Only the completion call itself can fail the request.

use tracing::{debug, info};

use crate::errors::AppError;
use crate::jobs::keys::derive_job_id;
use crate::jobs::models::{JobRecord, SOURCE_WEB_SEARCH};
use crate::jobs::prompts::{
    BLOCK_DELIMITER, EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM, NO_RESULTS_SENTINEL,
};
use crate::jobs::urls::{is_plausible_url, query_fallback_url};
use crate::llm_client::prompts::NO_FABRICATION_INSTRUCTION;
use crate::llm_client::CompletionModel;
use crate::search::SearchHit;

pub const DEFAULT_LOCATION: &str = "Remote / Unspecified";
pub const DEFAULT_DESCRIPTION: &str = "No description provided";

/// The free-text phrase a (query, location) request searches for.
pub fn search_phrase(query: &str, location: &str) -> String {
    let (query, location) = (query.trim(), location.trim());
    if location.is_empty() {
        query.to_string()
    } else {
        format!("{query} {location}")
    }
}

/// Runs the completion call over `hits` and parses its output.
pub async fn extract_jobs(
    model: &dyn CompletionModel,
    query: &str,
    location: &str,
    hits: &[SearchHit],
) -> Result<Vec<JobRecord>, AppError> {
    let prompt = build_prompt(query, location, hits);
    let completion = model.complete(&prompt, EXTRACTION_SYSTEM).await?;

    let jobs = parse_completion(&completion, &search_phrase(query, location));
    info!(
        "Extracted {} jobs from {} search results",
        jobs.len(),
        hits.len()
    );
    Ok(jobs)
}

/// One `Source/Title/Snippet` paragraph per hit, blank-line separated.
pub fn build_source_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "Source: {}\nTitle: {}\nSnippet: {}",
                hit.link, hit.title, hit.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(query: &str, location: &str, hits: &[SearchHit]) -> String {
    let location = if location.trim().is_empty() {
        "any"
    } else {
        location.trim()
    };
    EXTRACTION_PROMPT_TEMPLATE
        .replace("{query}", query.trim())
        .replace("{location}", location)
        .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        .replace("{sources}", &build_source_context(hits))
}

#[derive(Debug, Default)]
struct RawBlock<'a> {
    title: Option<&'a str>,
    company: Option<&'a str>,
    location: Option<&'a str>,
    description: Option<&'a str>,
    url: Option<&'a str>,
    salary: Option<&'a str>,
    posted: Option<&'a str>,
}

/// Parses `---`-delimited blocks into records.
///
/// Blocks without both a title and a company are dropped. A missing or
/// implausible URL is replaced with the query-level fallback for `phrase`.
pub fn parse_completion(text: &str, phrase: &str) -> Vec<JobRecord> {
    let mut jobs = Vec::new();
    for block in text.split(BLOCK_DELIMITER) {
        let block = block.trim();
        if block.is_empty() || block == NO_RESULTS_SENTINEL {
            continue;
        }
        match build_record(parse_block(block), phrase) {
            Some(job) => jobs.push(job),
            None => debug!("Dropping extraction block without title/company"),
        }
    }
    jobs
}

fn parse_block(block: &str) -> RawBlock<'_> {
    let mut raw = RawBlock::default();
    for line in block.lines() {
        let Some((label, value)) = split_labeled_line(line) else {
            continue;
        };
        let slot = match label.as_str() {
            "title" => &mut raw.title,
            "company" => &mut raw.company,
            "location" => &mut raw.location,
            "description" => &mut raw.description,
            "url" | "link" => &mut raw.url,
            "salary" => &mut raw.salary,
            "posted" => &mut raw.posted,
            _ => continue,
        };
        // First occurrence wins.
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    raw
}

/// Splits `Label: value`, tolerating list markers and bold markup around the
/// label. Returns `None` for unlabeled lines and empty values.
fn split_labeled_line(line: &str) -> Option<(String, &str)> {
    let line = line
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace());
    let (label, value) = line.split_once(':')?;
    let label = label.trim().trim_matches('*').trim().to_lowercase();
    let value = value.trim().trim_matches('*').trim();
    if label.is_empty() || value.is_empty() {
        return None;
    }
    Some((label, value))
}

fn build_record(raw: RawBlock<'_>, phrase: &str) -> Option<JobRecord> {
    let title = raw.title?.to_string();
    let company = raw.company?.to_string();

    let url = match raw.url {
        Some(url) if is_plausible_url(url) => url.to_string(),
        _ => query_fallback_url(phrase),
    };

    Some(JobRecord {
        id: derive_job_id(&title, &company),
        location: raw.location.unwrap_or(DEFAULT_LOCATION).to_string(),
        description: raw.description.unwrap_or(DEFAULT_DESCRIPTION).to_string(),
        url,
        salary: raw.salary.map(str::to_string),
        posted: raw.posted.map(str::to_string),
        source: Some(SOURCE_WEB_SEARCH.to_string()),
        title,
        company,
    })
}
