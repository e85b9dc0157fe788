use serde::{Deserialize, Serialize};

/// A web source gathered during research. `short_url` is the per-run stable
/// alias used in citation markers while the loop accumulates findings; `url`
/// is the real address restored into the final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
    pub short_url: String,
    pub url: String,
}

/// Accumulated state of one research run.
#[derive(Debug, Clone, Default)]
pub struct ResearchState {
    pub topic: String,
    pub queries_run: Vec<String>,
    /// One cited summary per executed search query.
    pub findings: Vec<String>,
    pub sources: Vec<Source>,
    pub loop_count: u32,
}

impl ResearchState {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Self::default()
        }
    }
}

/// Final output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub topic: String,
    pub answer: String,
    /// Sources cited in the answer, first-cited order.
    pub sources: Vec<Source>,
    pub queries_run: Vec<String>,
    pub research_loops: u32,
}
