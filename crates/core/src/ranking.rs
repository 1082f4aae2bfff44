use crate::models::{Chunk, RetrievalOptions, ScoredCandidate};
use tracing::debug;

/// Candidates under the distance threshold, or the `fallback_count` nearest
/// ones when none qualify. Input order is preserved.
pub fn threshold_candidates(
    candidates: &[ScoredCandidate],
    options: &RetrievalOptions,
) -> Vec<Chunk> {
    let passing: Vec<Chunk> = candidates
        .iter()
        .filter(|candidate| candidate.distance < options.distance_threshold)
        .map(|candidate| candidate.chunk.clone())
        .collect();

    if !passing.is_empty() {
        return passing;
    }

    debug!(
        threshold = options.distance_threshold,
        fallback = options.fallback_count,
        "no candidate under threshold, using nearest"
    );

    let mut nearest: Vec<&ScoredCandidate> = candidates.iter().collect();
    nearest.sort_by(|left, right| left.distance.total_cmp(&right.distance));
    nearest
        .into_iter()
        .take(options.fallback_count)
        .map(|candidate| candidate.chunk.clone())
        .collect()
}

pub fn section_matches(chunk: &Chunk, section_ref: &str) -> bool {
    chunk
        .section_id
        .to_lowercase()
        .contains(&section_ref.to_lowercase())
}

/// Moves chunks whose section id contains `section_ref` to the front. A ref
/// of "10" also matches "410" and "10-b"; both partitions keep their order.
pub fn prioritize_section(chunks: Vec<Chunk>, section_ref: Option<&str>) -> Vec<Chunk> {
    let Some(section_ref) = section_ref else {
        return chunks;
    };

    let (mut matching, rest): (Vec<Chunk>, Vec<Chunk>) = chunks
        .into_iter()
        .partition(|chunk| section_matches(chunk, section_ref));
    matching.extend(rest);
    matching
}

/// Full ranking stage: threshold with fallback, reference priority, then
/// truncation to the context budget.
pub fn rank_candidates(
    candidates: &[ScoredCandidate],
    section_ref: Option<&str>,
    options: &RetrievalOptions,
) -> Vec<Chunk> {
    let mut ranked = prioritize_section(threshold_candidates(candidates, options), section_ref);
    ranked.truncate(options.max_context_chunks);
    ranked
}
