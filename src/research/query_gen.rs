use crate::error::Result;
use crate::llm::GeminiClient;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

const SYSTEM_PROMPT: &str = r#"You write web search queries for a research assistant. Given a research topic, produce the queries whose combined results would let an expert write a well-sourced answer.

Instructions:
1. Prefer fewer queries. One is enough when the topic has a single clear aspect; only add more when the topic genuinely spans distinct aspects.
2. Each query must target a distinct facet of the topic. Never produce near-duplicates.
3. Queries should surface the most current information available.
4. Each query must be self-contained: it will be executed on its own, with no surrounding context.

Respond in JSON:
{
  "rationale": "one or two sentences on why these queries cover the topic",
  "queries": ["...", "..."]
}

Rules:
- Never exceed the query limit given in the request.
- Plain search phrasing only. No boolean operators, no site: filters.
- Don't restate the topic verbatim as every query."#;

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    queries: Vec<String>,
}

pub struct GeneratedQueries {
    pub rationale: String,
    pub queries: Vec<String>,
}

/// Ask the query-writer model for up to `count` search queries on `topic`.
/// Falls back to the topic itself if the model returns nothing usable.
pub async fn generate_queries(
    llm: &GeminiClient,
    topic: &str,
    count: u32,
) -> Result<GeneratedQueries> {
    info!("writing search queries via {}", llm.model());

    let user_message = format!(
        "Current date: {date}\nQuery limit: {count}\n\nResearch topic: {topic}",
        date = Utc::now().format("%B %-d, %Y"),
    );

    let response: QueryResponse = llm.complete_json(SYSTEM_PROMPT, &user_message).await?;

    let mut queries: Vec<String> = response
        .queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(count as usize)
        .collect();
    if queries.is_empty() {
        queries.push(topic.to_string());
    }

    info!(count = queries.len(), "generated search queries");
    Ok(GeneratedQueries {
        rationale: response.rationale,
        queries,
    })
}
