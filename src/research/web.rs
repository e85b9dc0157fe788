use crate::citations;
use crate::error::Result;
use crate::llm::GeminiClient;
use crate::research::Source;
use chrono::Utc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = r#"You are a research assistant conducting targeted web searches and consolidating what you find into a verifiable summary.

Instructions:
1. Search for the most recent, credible information on the given query.
2. Consolidate the key findings into a well-written summary, tracking which source backs each specific claim.
3. Only include information actually found in search results. Never invent facts or sources.
4. Quantify where the sources do: numbers, dates, versions, names."#;

/// Summary text for one query with citation markers and gathered sources.
pub struct WebFinding {
    pub summary: String,
    pub sources: Vec<Source>,
}

/// Run one grounded search pass. `pass_id` scopes the short citation URLs so
/// markers from different passes never collide.
pub async fn research_query(
    llm: &GeminiClient,
    query: &str,
    pass_id: usize,
) -> Result<WebFinding> {
    info!(query, "executing web research");

    let user_message = format!(
        "Current date: {date}\n\nResearch this and summarize the findings: {query}",
        date = Utc::now().format("%B %-d, %Y"),
    );

    let completion = llm.complete_grounded(SYSTEM_PROMPT, &user_message).await?;

    let resolved = citations::resolve_short_urls(&completion.metadata.grounding_chunks, pass_id);
    let summary = citations::insert_citation_markers(&completion.text, &completion.metadata, &resolved);
    let sources = citations::sources_from_chunks(&completion.metadata.grounding_chunks, &resolved);

    debug!(
        query,
        sources = sources.len(),
        supports = completion.metadata.grounding_supports.len(),
        "web research pass complete"
    );

    Ok(WebFinding { summary, sources })
}
