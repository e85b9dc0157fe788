use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn scour_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".scour")
}

/// One completed research run, appended to `~/.scour/history/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub difficulty: String,
    pub model: String,
    pub research_loops: u32,
    pub queries_run: usize,
    pub source_count: usize,
    pub duration_secs: f64,
}

impl RunRecord {
    pub fn save(&self) -> Result<()> {
        let dir = scour_dir().join("history");
        std::fs::create_dir_all(&dir)?;
        let filename = format!("{}.json", self.timestamp.format("%Y%m%dT%H%M%S"));
        std::fs::write(dir.join(filename), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
