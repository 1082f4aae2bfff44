use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IngestError;

/// Fixed message returned when retrieval yields nothing to ground an answer on.
pub const NO_RELEVANT_SECTION: &str = "No relevant section found in Pakistan Penal Code.";

/// A run of text sharing one font style, in content-stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub italic: bool,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            italic: false,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            italic: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawPage {
    pub number: u32,
    pub runs: Vec<StyledRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_title: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// One numbered provision of the code. `id` is not unique: a misfiring
/// header match can produce duplicates, so treat it as a lookup key only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub text: String,
    pub page_estimate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub section_id: String,
    pub chunk_index: u32,
    pub page_estimate: u32,
}

/// The unit that is embedded and stored in the similarity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub section_id: String,
    pub chunk_index: u32,
    pub page_estimate: u32,
    pub text: String,
}

impl Chunk {
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            section_id: self.section_id.clone(),
            chunk_index: self.chunk_index,
            page_estimate: self.page_estimate,
        }
    }
}

/// A chunk paired with its distance to the query; lower is more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Per-question state. Built and dropped inside a single query.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub normalized_question: String,
    pub section_ref: Option<String>,
    pub ranked: Vec<Chunk>,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSection {
    pub section_id: String,
    pub text: String,
}

impl From<&Chunk> for SourceSection {
    fn from(chunk: &Chunk) -> Self {
        Self {
            section_id: chunk.section_id.clone(),
            text: chunk.text.clone(),
        }
    }
}

/// What `answer_question` hands back. Errors are folded into `result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub result: String,
    pub source_sections: Vec<SourceSection>,
}

impl Answer {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            result: format!("Error: {message}"),
            source_sections: Vec::new(),
        }
    }

    pub fn no_relevant_section() -> Self {
        Self {
            result: NO_RELEVANT_SECTION.to_string(),
            source_sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    /// Pages numbered at or below this (1-based) are front matter.
    pub start_page: u32,
    pub min_section_chars: usize,
    pub chunk_split_threshold_chars: usize,
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub embed_concurrency: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            start_page: 21,
            min_section_chars: 30,
            chunk_split_threshold_chars: 1_500,
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 150,
            embed_concurrency: 4,
        }
    }
}

impl IngestionOptions {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_max_chars must be positive".to_string(),
            ));
        }
        if self.chunk_overlap_chars >= self.chunk_max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.chunk_overlap_chars, self.chunk_max_chars
            )));
        }
        if self.embed_concurrency == 0 {
            return Err(IngestError::InvalidArgument(
                "embed_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub search_k: usize,
    pub distance_threshold: f32,
    pub fallback_count: usize,
    pub max_context_chunks: usize,
    pub search_timeout: Duration,
    pub llm_timeout: Duration,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            search_k: 10,
            distance_threshold: 0.35,
            fallback_count: 3,
            max_context_chunks: 4,
            search_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(120),
        }
    }
}

/// Instruction prefixes expected by e5-style embedding models. Applied only
/// to the text sent to the embedder, never to stored chunk text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingPrefixes {
    pub query: String,
    pub passage: String,
}

impl Default for EmbeddingPrefixes {
    fn default() -> Self {
        Self {
            query: "query: ".to_string(),
            passage: "passage: ".to_string(),
        }
    }
}

impl EmbeddingPrefixes {
    pub fn none() -> Self {
        Self {
            query: String::new(),
            passage: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ingestion_options_are_valid() {
        assert!(IngestionOptions::default().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let options = IngestionOptions {
            chunk_max_chars: 100,
            chunk_overlap_chars: 100,
            ..IngestionOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn error_answer_mentions_error_and_has_no_sources() {
        let answer = Answer::error("index offline");
        assert!(answer.result.contains("Error"));
        assert!(answer.source_sections.is_empty());
    }
}
