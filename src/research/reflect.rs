use crate::error::Result;
use crate::llm::GeminiClient;
use serde::Deserialize;
use tracing::info;

const SYSTEM_PROMPT: &str = r#"You are an expert research assistant judging whether gathered research summaries are sufficient to answer the user's topic.

Instructions:
1. Identify knowledge gaps: missing facets, stale data, unsupported claims, or depth the topic demands but the summaries lack.
2. If the summaries are sufficient, say so and generate no follow-up queries.
3. Follow-up queries must be self-contained: each will be searched on its own, with no surrounding context.

Respond in JSON:
{
  "is_sufficient": true,
  "knowledge_gap": "what is still missing, empty if nothing",
  "follow_up_queries": ["...", "..."]
}

Rules:
- At most 3 follow-up queries, and only for genuine gaps.
- Never repeat a question the summaries already answer."#;

#[derive(Debug, Deserialize)]
pub struct Reflection {
    pub is_sufficient: bool,
    #[serde(default)]
    pub knowledge_gap: String,
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

/// Judge the accumulated findings and propose follow-up queries for any gap.
pub async fn reflect(
    llm: &GeminiClient,
    topic: &str,
    findings: &[String],
) -> Result<Reflection> {
    let user_message = format!(
        "Research topic: {topic}\n\nGathered summaries:\n\n{}",
        findings.join("\n\n---\n\n")
    );

    let mut reflection: Reflection = llm.complete_json(SYSTEM_PROMPT, &user_message).await?;

    reflection
        .follow_up_queries
        .retain(|q| !q.trim().is_empty());
    // A verdict of "not sufficient" with no follow-ups can't drive another
    // loop; treat it as sufficient.
    if reflection.follow_up_queries.is_empty() {
        reflection.is_sufficient = true;
    }

    info!(
        is_sufficient = reflection.is_sufficient,
        follow_ups = reflection.follow_up_queries.len(),
        "reflection complete"
    );
    Ok(reflection)
}
