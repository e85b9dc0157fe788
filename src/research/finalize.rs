use crate::citations;
use crate::error::Result;
use crate::llm::GeminiClient;
use crate::research::Source;
use chrono::Utc;
use tracing::info;

const SYSTEM_PROMPT: &str = r#"You write the final answer for a research assistant, based only on the research summaries provided.

Instructions:
1. Answer the user's topic directly and thoroughly, synthesizing across all summaries.
2. Keep the markdown citation links exactly as they appear in the summaries ("[label](url)") next to the claims they back. Do not invent citations and do not alter the URLs.
3. Structure longer answers with markdown headings and bullet lists where it helps readability.
4. No preamble about being an assistant, no mention of the summaries themselves. Just the answer."#;

/// Compose the cited answer, then swap the short citation URLs back for the
/// real source URLs. Returns the answer and the sources it actually cites.
pub async fn finalize(
    llm: &GeminiClient,
    topic: &str,
    findings: &[String],
    sources: &[Source],
) -> Result<(String, Vec<Source>)> {
    let user_message = format!(
        "Current date: {date}\n\nResearch topic: {topic}\n\nSummaries:\n\n{summaries}",
        date = Utc::now().format("%B %-d, %Y"),
        summaries = findings.join("\n\n---\n\n"),
    );

    let answer = llm.complete(SYSTEM_PROMPT, &user_message).await?;
    let (answer, mut used_sources) = citations::restore_source_urls(&answer, sources);

    // Models occasionally rewrite the short citation URLs instead of keeping
    // them verbatim. Recover whatever citations survive in the answer text.
    if used_sources.is_empty() {
        used_sources = citations::extract_citation_urls(&answer)
            .into_iter()
            .map(|c| Source {
                label: c.label,
                short_url: String::new(),
                url: c.url,
            })
            .collect();
    }

    info!(
        cited = used_sources.len(),
        gathered = sources.len(),
        "final answer composed"
    );
    Ok((answer, used_sources))
}
