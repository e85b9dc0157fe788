//! Citation plumbing for grounded research text.
//!
//! Grounding URIs returned by the search tool are long redirect URLs. Each
//! research pass maps them to short stable URLs so citation markers stay
//! readable while the loop accumulates findings; the final answer swaps the
//! short URLs back for the real source URLs.

use crate::llm::{GroundingChunk, GroundingMetadata};
use crate::research::Source;
use fancy_regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

pub const SHORT_URL_BASE: &str = "https://vertexaisearch.cloud.google.com/id";

static CITATION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\((https?://[^)\s]+)\)").expect("citation link pattern")
});

static UNRESOLVED_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(https?://vertexaisearch\.cloud\.google\.com/[^)]*\)")
        .expect("redirect url pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub label: String,
    pub url: String,
}

/// Map each unique grounding URI to a short URL scoped to this research pass.
pub fn resolve_short_urls(chunks: &[GroundingChunk], pass_id: usize) -> HashMap<String, String> {
    let mut resolved = HashMap::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        if let Some(web) = &chunk.web {
            resolved
                .entry(web.uri.clone())
                .or_insert_with(|| format!("{SHORT_URL_BASE}/{pass_id}-{idx}"));
        }
    }
    resolved
}

/// Build source records from grounding chunks, first occurrence per URI wins.
pub fn sources_from_chunks(
    chunks: &[GroundingChunk],
    resolved: &HashMap<String, String>,
) -> Vec<Source> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .filter(|web| seen.insert(web.uri.clone()))
        .filter_map(|web| {
            resolved.get(&web.uri).map(|short| Source {
                label: source_label(&web.title),
                short_url: short.clone(),
                url: web.uri.clone(),
            })
        })
        .collect()
}

/// Insert ` [label](short_url)` markers at the end of each grounded segment.
///
/// Supports are applied in descending end-offset order so earlier insertions
/// never shift the offsets of later ones. Offsets are byte positions into the
/// generated text; a support pointing past the end or into the middle of a
/// character is skipped.
pub fn insert_citation_markers(
    text: &str,
    metadata: &GroundingMetadata,
    resolved: &HashMap<String, String>,
) -> String {
    let mut insertions: Vec<(usize, String)> = Vec::new();

    for support in &metadata.grounding_supports {
        let Some(segment) = &support.segment else {
            continue;
        };
        let end = segment.end_index;
        if end > text.len() || !text.is_char_boundary(end) {
            continue;
        }

        let mut marker = String::new();
        for &idx in &support.grounding_chunk_indices {
            let Some(web) = metadata
                .grounding_chunks
                .get(idx)
                .and_then(|c| c.web.as_ref())
            else {
                continue;
            };
            if let Some(short) = resolved.get(&web.uri) {
                marker.push_str(&format!(" [{}]({})", source_label(&web.title), short));
            }
        }
        if !marker.is_empty() {
            insertions.push((end, marker));
        }
    }

    insertions.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = text.to_string();
    for (end, marker) in insertions {
        out.insert_str(end, &marker);
    }
    out
}

/// Swap short URLs in the final answer back for the original source URLs.
/// Returns the restored text and the sources actually cited, deduplicated by
/// URL in first-cited order.
pub fn restore_source_urls(answer: &str, sources: &[Source]) -> (String, Vec<Source>) {
    let mut restored = answer.to_string();
    let mut seen = HashSet::new();
    let mut used = Vec::new();

    for source in sources {
        if restored.contains(&source.short_url) {
            restored = restored.replace(&source.short_url, &source.url);
            if seen.insert(source.url.clone()) {
                used.push(source.clone());
            }
        }
    }
    (restored, used)
}

/// Scan text for markdown citation links, deduplicated by URL in order.
pub fn extract_citation_urls(text: &str) -> Vec<Citation> {
    let mut seen = HashSet::new();
    CITATION_LINK
        .captures_iter(text)
        .filter_map(|c| c.ok())
        .filter_map(|caps| {
            let label = caps.get(1)?.as_str().to_string();
            let url = caps.get(2)?.as_str().to_string();
            seen.insert(url.clone()).then_some(Citation { label, url })
        })
        .collect()
}

/// Remove grounding-redirect URLs the finalize step could not map back to a
/// real source, leaving just the citation label behind.
pub fn strip_unresolved_redirects(text: &str) -> String {
    UNRESOLVED_REDIRECT.replace_all(text, "").into_owned()
}

/// Display label for a source: the title minus its trailing extension.
/// Grounding titles are usually bare domains ("docs.rs", "arxiv.org").
pub fn source_label(title: &str) -> String {
    match title.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GroundingSupport, Segment, WebSource};

    fn chunk(uri: &str, title: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebSource {
                uri: uri.into(),
                title: title.into(),
            }),
        }
    }

    fn support(end: usize, chunk_indices: Vec<usize>) -> GroundingSupport {
        GroundingSupport {
            segment: Some(Segment {
                start_index: 0,
                end_index: end,
            }),
            grounding_chunk_indices: chunk_indices,
        }
    }

    #[test]
    fn short_urls_are_stable_per_uri() {
        let chunks = vec![
            chunk("https://a.example/x", "a.example"),
            chunk("https://b.example/y", "b.example"),
            chunk("https://a.example/x", "a.example"),
        ];
        let resolved = resolve_short_urls(&chunks, 7);
        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved["https://a.example/x"],
            format!("{SHORT_URL_BASE}/7-0")
        );
        assert_eq!(
            resolved["https://b.example/y"],
            format!("{SHORT_URL_BASE}/7-1")
        );
    }

    #[test]
    fn markers_inserted_back_to_front() {
        let text = "First claim. Second claim.";
        let chunks = vec![
            chunk("https://a.example/x", "a.example"),
            chunk("https://b.example/y", "b.example"),
        ];
        let resolved = resolve_short_urls(&chunks, 0);
        let metadata = GroundingMetadata {
            grounding_supports: vec![support(12, vec![0]), support(26, vec![1])],
            grounding_chunks: chunks,
        };
        let out = insert_citation_markers(text, &metadata, &resolved);
        assert_eq!(
            out,
            format!(
                "First claim. [a]({SHORT_URL_BASE}/0-0) Second claim. [b]({SHORT_URL_BASE}/0-1)"
            )
        );
    }

    #[test]
    fn out_of_range_support_is_skipped() {
        let text = "Short text.";
        let chunks = vec![chunk("https://a.example/x", "a.example")];
        let resolved = resolve_short_urls(&chunks, 0);
        let metadata = GroundingMetadata {
            grounding_supports: vec![support(999, vec![0])],
            grounding_chunks: chunks,
        };
        assert_eq!(insert_citation_markers(text, &metadata, &resolved), text);
    }

    #[test]
    fn non_boundary_support_is_skipped() {
        let text = "héllo world";
        let chunks = vec![chunk("https://a.example/x", "a.example")];
        let resolved = resolve_short_urls(&chunks, 0);
        // byte 2 lands inside the two-byte 'é'
        let metadata = GroundingMetadata {
            grounding_supports: vec![support(2, vec![0])],
            grounding_chunks: chunks,
        };
        assert_eq!(insert_citation_markers(text, &metadata, &resolved), text);
    }

    #[test]
    fn restore_swaps_short_urls_and_collects_cited_sources() {
        let sources = vec![
            Source {
                label: "a".into(),
                short_url: format!("{SHORT_URL_BASE}/0-0"),
                url: "https://a.example/x".into(),
            },
            Source {
                label: "b".into(),
                short_url: format!("{SHORT_URL_BASE}/0-1"),
                url: "https://b.example/y".into(),
            },
        ];
        let answer = format!("Claim [a]({SHORT_URL_BASE}/0-0).");
        let (restored, used) = restore_source_urls(&answer, &sources);
        assert_eq!(restored, "Claim [a](https://a.example/x).");
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].url, "https://a.example/x");
    }

    #[test]
    fn extract_dedupes_by_url_preserving_order() {
        let text = "See [a](https://a.example/x) and [b](https://b.example/y) \
                    and again [a2](https://a.example/x).";
        let citations = extract_citation_urls(text);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].label, "a");
        assert_eq!(citations[1].url, "https://b.example/y");
    }

    #[test]
    fn unresolved_redirects_are_stripped() {
        let text = format!("Claim [a]({SHORT_URL_BASE}/9-9) stands.");
        assert_eq!(strip_unresolved_redirects(&text), "Claim [a] stands.");
    }

    #[test]
    fn label_strips_trailing_extension() {
        assert_eq!(source_label("docs.rs"), "docs");
        assert_eq!(source_label("vertexaisearch.cloud.google.com"), "vertexaisearch.cloud.google");
        assert_eq!(source_label("Rust Blog"), "Rust Blog");
        assert_eq!(source_label(".hidden"), ".hidden");
    }
}
