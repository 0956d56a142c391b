//! Terminal formatting for search results and chunks.

use retrieve_core::types::{Candidate, Chunk, SearchResult};

const SNIPPET_MAX_LEN: usize = 160;

pub fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results for \"{query}\"");
    }
    let mut out = format!("{} results for \"{query}\"\n", results.len());
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n{:>2}. {} [{:.4}] vector {:.3} keyword {:.3}",
            i + 1,
            r.id,
            r.combined_score,
            r.vector_score,
            r.keyword_score
        ));
        if let Some(source) = &r.source {
            out.push_str(&format!("  ({source})"));
        }
        out.push_str(&format!("\n    {}\n", snippet(&r.content)));
    }
    out
}

pub fn format_candidates(owner_id: &str, hits: &[Candidate]) -> String {
    if hits.is_empty() {
        return format!("Nothing similar to {owner_id}");
    }
    let mut out = format!("Closest to {owner_id}\n");
    for (i, c) in hits.iter().enumerate() {
        out.push_str(&format!("\n{:>2}. {} [{:.3}]\n    {}\n", i + 1, c.id, c.score, snippet(&c.content)));
    }
    out
}

pub fn format_chunks(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for c in chunks {
        out.push_str(&format!(
            "--- chunk {} [{}..{}] {} chars\n{}\n",
            c.index,
            c.start_char,
            c.end_char,
            c.char_len(),
            c.text
        ));
    }
    out
}

/// First line of `text`, cut to a char boundary.
fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= SNIPPET_MAX_LEN {
        return line.to_string();
    }
    let cut: String = line.chars().take(SNIPPET_MAX_LEN).collect();
    format!("{cut}...")
}
