// Prompt constants for the job extraction pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Block delimiter the model must emit after every posting.
pub const BLOCK_DELIMITER: &str = "---";

/// Token the model returns when no source qualifies.
pub const NO_RESULTS_SENTINEL: &str = "NO_JOBS_FOUND";

/// System prompt for extraction.
pub const EXTRACTION_SYSTEM: &str = "You are an expert recruiter who reads raw web search \
    results and pulls out genuine job postings. \
    Respond ONLY in the exact plain-text format requested. \
    Do NOT use markdown formatting or code fences. \
    Do NOT include explanations, preambles or apologies.";

/// Extraction prompt template. Replace `{query}`, `{location}` and `{sources}`
/// before sending; `{no_fabrication}` carries the shared grounding rule.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"A candidate is looking for: "{query}" (location: "{location}").

Below are raw web search results. Identify ONLY genuine job postings for a single role at a single employer.

EXCLUDE:
- job boards or aggregator pages listing many jobs
- career advice, salary guides or news articles
- forum threads, social media posts or discussions

For every qualifying posting output exactly these lines:
Title: <job title>
Company: <hiring company>
Location: <job location>
Description: <one or two sentence summary>
URL: <the Source link of that result, copied exactly>
Salary: <salary range> (optional, only when the source states it)
Posted: <posting date> (optional, only when the source states it)
---

Each field on its own line, all fields of one posting before its ---.
End EVERY posting with a line containing only ---.
If no result qualifies, respond with exactly: NO_JOBS_FOUND

{no_fabrication}

SEARCH RESULTS:
{sources}"#;
