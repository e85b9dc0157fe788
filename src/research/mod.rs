// Research loop: generate queries → grounded web search → reflect → finalize

mod finalize;
mod query_gen;
mod reflect;
pub mod state;
mod web;

pub use reflect::Reflection;
pub use state::{ResearchReport, ResearchState, Source};

use crate::error::{Error, Result};
use crate::llm::{ModelRouter, TaskKind};
use crate::output::Progress;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const OVERLOAD_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct RunOptions {
    pub initial_queries: u32,
    pub max_loops: u32,
    /// Retries for overloaded-model and rate-limit failures.
    pub max_retries: u32,
}

/// Run the full research pipeline.
///
/// 1. Generate initial search queries for the topic
/// 2. Web research: one grounded search pass per query, concurrently
/// 3. Reflect on the accumulated findings; loop with follow-up queries
///    until sufficient or the loop budget is spent
/// 4. Compose the final cited answer
pub async fn run_research(
    router: &ModelRouter,
    topic: &str,
    opts: &RunOptions,
    progress: &Progress,
) -> Result<ResearchReport> {
    info!(topic, "research pipeline starting");
    let mut state = ResearchState::new(topic);

    let stage = progress.stage("Generating search queries");
    let llm = router.client_for(TaskKind::QueryGeneration);
    let generated = with_overload_retry(opts.max_retries, || {
        query_gen::generate_queries(llm, topic, opts.initial_queries)
    })
    .await?;
    stage.done();
    if !generated.rationale.is_empty() {
        debug!(rationale = %generated.rationale, "query plan");
    }

    let mut batch = generated.queries;

    loop {
        let label = if batch.len() == 1 {
            "Executing web search (1 query)".to_string()
        } else {
            format!("Executing web search ({} queries)", batch.len())
        };
        let stage = progress.stage(&label);

        let llm = router.client_for(TaskKind::WebResearch);
        let pass_offset = state.queries_run.len();
        let results = join_all(batch.iter().enumerate().map(|(i, query)| async move {
            with_overload_retry(opts.max_retries, || {
                web::research_query(llm, query, pass_offset + i)
            })
            .await
        }))
        .await;
        stage.done();

        let mut succeeded = 0;
        let mut last_error = None;
        for (query, result) in batch.iter().zip(results) {
            state.queries_run.push(query.clone());
            match result {
                Ok(finding) => {
                    succeeded += 1;
                    state.findings.push(finding.summary);
                    state.sources.extend(finding.sources);
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "web research failed for query");
                    last_error = Some(e);
                }
            }
        }
        if succeeded == 0 {
            return Err(
                last_error.unwrap_or_else(|| Error::parse("no search queries to execute"))
            );
        }
        state.loop_count += 1;

        if state.loop_count >= opts.max_loops {
            info!(loops = state.loop_count, "research loop budget spent");
            break;
        }

        let stage = progress.stage("Reflecting on findings");
        let llm = router.client_for(TaskKind::Reflection);
        let reflection = with_overload_retry(opts.max_retries, || {
            reflect::reflect(llm, topic, &state.findings)
        })
        .await?;
        stage.done();

        if reflection.is_sufficient {
            info!(loops = state.loop_count, "findings sufficient");
            break;
        }
        info!(gap = %reflection.knowledge_gap, "knowledge gap found, continuing research");
        batch = reflection.follow_up_queries;
    }

    let stage = progress.stage("Generating comprehensive answer");
    let llm = router.client_for(TaskKind::Answer);
    let (answer, cited) = with_overload_retry(opts.max_retries, || {
        finalize::finalize(llm, topic, &state.findings, &state.sources)
    })
    .await?;
    stage.done();

    info!(
        loops = state.loop_count,
        queries = state.queries_run.len(),
        sources = cited.len(),
        "research pipeline complete"
    );

    Ok(ResearchReport {
        topic: state.topic,
        answer,
        sources: cited,
        queries_run: state.queries_run,
        research_loops: state.loop_count,
    })
}

/// Retry `op` while it fails with an overloaded-model or rate-limit error,
/// up to `max_retries` times. Any other error propagates immediately.
async fn with_overload_retry<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let Some(delay) = overload_delay(&e) else {
                    return Err(e);
                };
                if attempt >= max_retries {
                    return Err(e);
                }
                attempt += 1;
                warn!(
                    attempt,
                    max_retries,
                    delay_secs = delay.as_secs(),
                    "model overloaded, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

fn overload_delay(error: &Error) -> Option<Duration> {
    match error {
        Error::RateLimit {
            retry_after_secs, ..
        } => Some(Duration::from_secs(
            retry_after_secs.unwrap_or(OVERLOAD_RETRY_DELAY.as_secs()),
        )),
        Error::Api {
            status_code: Some(503),
            message,
            ..
        } if message.contains("overloaded") || message.contains("UNAVAILABLE") => {
            Some(OVERLOAD_RETRY_DELAY)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn overload_delay_honors_retry_after() {
        let e = Error::RateLimit {
            platform: "generativelanguage.googleapis.com".into(),
            retry_after_secs: Some(12),
        };
        assert_eq!(overload_delay(&e), Some(Duration::from_secs(12)));
    }

    #[test]
    fn overload_delay_matches_overloaded_503() {
        let e = Error::api_with_status(
            "generativelanguage.googleapis.com",
            "503 UNAVAILABLE: The model is overloaded. Please try again later.",
            503,
        );
        assert_eq!(overload_delay(&e), Some(OVERLOAD_RETRY_DELAY));
    }

    #[test]
    fn overload_delay_ignores_other_errors() {
        assert_eq!(overload_delay(&Error::parse("bad json")), None);
        let e = Error::api_with_status("host", "invalid model", 404);
        assert_eq!(overload_delay(&e), None);
    }

    #[tokio::test]
    async fn retry_loop_recovers_from_transient_overload() {
        let calls = Cell::new(0u32);
        let result = with_overload_retry(3, || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 3 {
                    Err(Error::RateLimit {
                        platform: "test".into(),
                        retry_after_secs: Some(0),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn retry_loop_gives_up_after_max_retries() {
        let calls = Cell::new(0u32);
        let result: Result<()> = with_overload_retry(2, || {
            calls.set(calls.get() + 1);
            async {
                Err(Error::RateLimit {
                    platform: "test".into(),
                    retry_after_secs: Some(0),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 3); // initial attempt + 2 retries
    }

    #[tokio::test]
    async fn non_overload_error_propagates_immediately() {
        let calls = Cell::new(0u32);
        let result: Result<()> = with_overload_retry(5, || {
            calls.set(calls.get() + 1);
            async { Err(Error::parse("boom")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
