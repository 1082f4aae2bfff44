use crate::error::IngestError;
use crate::models::{Chunk, IngestionOptions, Section};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub split_threshold_chars: usize,
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            split_threshold_chars: value.chunk_split_threshold_chars,
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits on the coarsest separator present, recursing into pieces that are
/// still too long, then packs pieces back up to `max_chars` with overlap.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_with(text, &SEPARATORS, config)
        .into_iter()
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn split_with(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut fitting = Vec::new();

    for piece in pieces {
        if char_len(&piece) <= config.max_chars {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, separator, config));
            fitting.clear();
        }
        chunks.extend(split_with(&piece, finer, config));
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, separator, config));
    }

    chunks
}

fn merge_pieces(pieces: &[String], separator: &str, config: ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let piece_len = char_len(piece);
        let joiner = if current.is_empty() { 0 } else { separator_len };

        if total + piece_len + joiner > config.max_chars && !current.is_empty() {
            merged.push(join(&current, separator));

            // keep a tail of at most overlap_chars that still leaves room
            while total > config.overlap_chars
                || (total > 0 && total + piece_len + separator_len > config.max_chars)
            {
                let Some((_, front_len)) = current.pop_front() else {
                    break;
                };
                let dropped_joiner = if current.is_empty() { 0 } else { separator_len };
                total = total.saturating_sub(front_len + dropped_joiner);
            }
        }

        let joiner = if current.is_empty() { 0 } else { separator_len };
        total += piece_len + joiner;
        current.push_back((piece.as_str(), piece_len));
    }

    if !current.is_empty() {
        merged.push(join(&current, separator));
    }

    merged
}

fn join(pieces: &VecDeque<(&str, usize)>, separator: &str) -> String {
    pieces
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator)
}

/// One chunk for short sections, several overlapping ones past the threshold.
pub fn build_chunks(section: &Section, config: ChunkingConfig) -> Vec<Chunk> {
    let section_id = section.id.trim().to_lowercase();
    let text = section.text.trim();

    let pieces = if char_len(text) > config.split_threshold_chars {
        split_text(text, config)
    } else {
        vec![text.to_string()]
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| {
            let chunk_index = index as u32;
            Chunk {
                chunk_id: make_chunk_id(&section_id, section.page_estimate, chunk_index, &piece),
                section_id: section_id.clone(),
                chunk_index,
                page_estimate: section.page_estimate,
                text: piece,
            }
        })
        .collect()
}

pub fn chunk_sections(
    sections: &[Section],
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    options.validate()?;
    let config = ChunkingConfig::from(options);

    Ok(sections
        .iter()
        .flat_map(|section| build_chunks(section, config))
        .collect())
}

fn make_chunk_id(section_id: &str, page: u32, index: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(section_id.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkingConfig {
        ChunkingConfig::from(&IngestionOptions::default())
    }

    fn section(id: &str, body: &str) -> Section {
        Section {
            id: id.to_string(),
            text: format!("{id}. {body}"),
            page_estimate: 40,
        }
    }

    fn long_body(words: usize) -> String {
        (0..words)
            .map(|index| format!("clause{index:04}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_section_is_a_single_chunk() {
        let section = section("302", "Whoever commits qatl-i-amd shall be punished with death.");
        let chunks = build_chunks(&section, config());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, section.text);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].page_estimate, 40);
    }

    #[test]
    fn section_ids_are_lowercased_on_chunks() {
        let chunks = build_chunks(&section("402A", "Hijacking of an aircraft in flight."), config());
        assert_eq!(chunks[0].section_id, "402a");
    }

    #[test]
    fn section_at_threshold_is_not_split() {
        let body = "x".repeat(1_500 - "1. ".len());
        let chunks = build_chunks(&section("1", &body), config());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_section_is_split_within_size_with_overlap() {
        // 300 words of 10 chars => ~3300 chars
        let chunks = build_chunks(&section("300", &long_body(300)), config());

        assert!(chunks.len() >= 4);
        for (index, chunk) in chunks.iter().enumerate() {
            assert!(chunk.text.chars().count() <= 1_000);
            assert_eq!(chunk.chunk_index as usize, index);
            assert_eq!(chunk.section_id, "300");
        }

        let first_tail = chunks[0].text.split(' ').last().unwrap();
        assert!(chunks[1].text.contains(first_tail));
    }

    #[test]
    fn unbroken_text_is_hard_split() {
        let body = "y".repeat(2_400);
        let chunks = build_chunks(&section("9", &body), config());
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 1_000));
    }

    #[test]
    fn chunk_ids_are_reproducible_and_distinct() {
        let section = section("300", &long_body(300));
        let first = build_chunks(&section, config());
        let second = build_chunks(&section, config());
        assert_eq!(first, second);
        assert_ne!(first[0].chunk_id, first[1].chunk_id);
    }

    #[test]
    fn chunk_sections_rejects_bad_config() {
        let options = IngestionOptions {
            chunk_overlap_chars: 2_000,
            ..IngestionOptions::default()
        };
        assert!(chunk_sections(&[], &options).is_err());
    }

    #[test]
    fn merge_packs_small_pieces() {
        let config = ChunkingConfig {
            split_threshold_chars: 0,
            max_chars: 11,
            overlap_chars: 5,
        };
        assert_eq!(
            split_text("aaa bbb ccc ddd", config),
            vec!["aaa bbb ccc", "ccc ddd"]
        );
    }
}
