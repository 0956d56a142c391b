//! Rank fusion of the vector and keyword candidate lists.

use std::collections::HashMap;

use retrieve_core::types::{Candidate, FusionConfig, FusionStrategy, SearchResult};

#[derive(Clone, Copy)]
enum Signal {
    Vector,
    Keyword,
}

/// Insertion-ordered accumulator keyed by candidate id.
#[derive(Default)]
struct Fused {
    order: Vec<SearchResult>,
    by_id: HashMap<String, usize>,
}

impl Fused {
    fn add(&mut self, signal: Signal, candidate: &Candidate, contribution: f64) {
        let idx = match self.by_id.get(&candidate.id) {
            Some(&i) => i,
            None => {
                self.order.push(SearchResult {
                    id: candidate.id.clone(),
                    content: candidate.content.clone(),
                    source: candidate.source.clone(),
                    vector_score: 0.0,
                    keyword_score: 0.0,
                    combined_score: 0.0,
                    metadata: candidate.metadata.clone(),
                });
                self.by_id.insert(candidate.id.clone(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        let entry = &mut self.order[idx];
        if entry.source.is_none() {
            entry.source.clone_from(&candidate.source);
        }
        for (k, v) in &candidate.metadata {
            entry.metadata.entry(k.clone()).or_insert_with(|| v.clone());
        }
        match signal {
            Signal::Vector => entry.vector_score = candidate.score,
            Signal::Keyword => entry.keyword_score = candidate.score,
        }
        entry.combined_score += contribution;
    }

    /// Sort by combined score, descending. The sort is stable, so exact ties
    /// keep first-seen order: vector candidates before keyword-only ones.
    fn finish(mut self, limit: usize) -> Vec<SearchResult> {
        self.order.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        self.order.truncate(limit);
        self.order
    }
}

/// Candidates after the first occurrence of each id, paired with their
/// 1-based position in the list.
fn ranked(list: &[Candidate]) -> impl Iterator<Item = (usize, &Candidate)> {
    let mut seen = std::collections::HashSet::new();
    list.iter().enumerate().filter_map(move |(i, c)| seen.insert(c.id.as_str()).then_some((i + 1, c)))
}

/// Reciprocal rank fusion: `weight / (rrf_k + rank)` summed over both lists.
pub fn reciprocal_rank(
    vector: &[Candidate],
    keyword: &[Candidate],
    config: &FusionConfig,
    limit: usize,
) -> Vec<SearchResult> {
    let k = f64::from(config.rrf_k);
    let mut fused = Fused::default();
    for (rank, c) in ranked(vector) {
        fused.add(Signal::Vector, c, config.vector_weight / (k + rank as f64));
    }
    for (rank, c) in ranked(keyword) {
        fused.add(Signal::Keyword, c, config.keyword_weight / (k + rank as f64));
    }
    fused.finish(limit)
}

/// Weighted sum of per-list max-normalised scores. A list whose maximum is
/// not positive contributes nothing.
pub fn weighted(vector: &[Candidate], keyword: &[Candidate], config: &FusionConfig, limit: usize) -> Vec<SearchResult> {
    let mut fused = Fused::default();
    for (signal, list, weight) in
        [(Signal::Vector, vector, config.vector_weight), (Signal::Keyword, keyword, config.keyword_weight)]
    {
        let max = list.iter().map(|c| c.score).fold(f64::NEG_INFINITY, f64::max);
        for (_, c) in ranked(list) {
            let normalised = if max > 0.0 { c.score / max } else { 0.0 };
            fused.add(signal, c, weight * normalised);
        }
    }
    fused.finish(limit)
}

pub fn fuse(
    strategy: FusionStrategy,
    vector: &[Candidate],
    keyword: &[Candidate],
    config: &FusionConfig,
    limit: usize,
) -> Vec<SearchResult> {
    match strategy {
        FusionStrategy::Rrf => reciprocal_rank(vector, keyword, config, limit),
        FusionStrategy::Weighted => weighted(vector, keyword, config, limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieve_core::types::Meta;

    fn cand(id: &str, score: f64) -> Candidate {
        Candidate { id: id.into(), content: format!("{id} text"), source: None, metadata: Meta::new(), score }
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn rrf_reference_scenario() {
        let vector = [cand("A", 0.9), cand("B", 0.8), cand("C", 0.7)];
        let keyword = [cand("B", 5.0), cand("A", 4.0), cand("D", 3.0)];
        let out = reciprocal_rank(&vector, &keyword, &FusionConfig::default(), 10);

        assert_eq!(ids(&out), vec!["A", "B", "C", "D"]);
        let expected = [0.016314, 0.016208, 0.011111, 0.004762];
        for (r, e) in out.iter().zip(expected) {
            assert!((r.combined_score - e).abs() < 1e-6, "{} = {}", r.id, r.combined_score);
        }
        assert_eq!(out[0].vector_score, 0.9);
        assert_eq!(out[0].keyword_score, 4.0);
        assert_eq!(out[2].keyword_score, 0.0);
        assert_eq!(out[3].vector_score, 0.0);
    }

    #[test]
    fn rrf_rewards_presence_in_both_lists() {
        let both = reciprocal_rank(&[cand("x", 0.5)], &[cand("x", 1.0)], &FusionConfig::default(), 10);
        let one = reciprocal_rank(&[cand("y", 0.5)], &[], &FusionConfig::default(), 10);
        assert!(both[0].combined_score > one[0].combined_score);
    }

    #[test]
    fn single_signal_items_are_still_ranked() {
        let out = reciprocal_rank(&[], &[cand("k1", 2.0), cand("k2", 1.0)], &FusionConfig::default(), 10);
        assert_eq!(ids(&out), vec!["k1", "k2"]);
        assert!(out.iter().all(|r| r.vector_score == 0.0));
    }

    #[test]
    fn weighted_normalises_by_list_maximum() {
        let cfg = FusionConfig::default();
        let out = weighted(&[cand("a", 0.8), cand("b", 0.4)], &[cand("b", 10.0), cand("c", 5.0)], &cfg, 10);
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
        assert!((out[0].combined_score - 0.7).abs() < 1e-9);
        assert!((out[1].combined_score - (0.7 * 0.5 + 0.3)).abs() < 1e-9);
        assert!((out[2].combined_score - 0.15).abs() < 1e-9);
    }

    #[test]
    fn weighted_skips_non_positive_maximum() {
        let out = weighted(&[cand("a", 0.0), cand("b", -0.2)], &[], &FusionConfig::default(), 10);
        assert!(out.iter().all(|r| r.combined_score == 0.0));
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let cfg = FusionConfig { vector_weight: 0.5, keyword_weight: 0.5, rrf_k: 60 };
        let out = reciprocal_rank(&[cand("v", 0.9)], &[cand("k", 3.0)], &cfg, 10);
        assert_eq!(ids(&out), vec!["v", "k"]);
    }

    #[test]
    fn duplicates_within_a_list_count_once() {
        let out = reciprocal_rank(&[cand("a", 0.9), cand("a", 0.8)], &[], &FusionConfig::default(), 10);
        assert_eq!(out.len(), 1);
        assert!((out[0].combined_score - 0.7 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let vector: Vec<_> = (0..10).map(|i| cand(&format!("v{i}"), 1.0 - i as f64 / 10.0)).collect();
        let out = fuse(FusionStrategy::Weighted, &vector, &[], &FusionConfig::default(), 3);
        assert_eq!(ids(&out), vec!["v0", "v1", "v2"]);
    }
}
