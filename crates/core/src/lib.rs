pub mod chunking;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod ranking;
pub mod reference;
pub mod segmenter;
pub mod stores;
pub mod traits;

pub use chunking::{build_chunks, chunk_sections, split_text, ChunkingConfig};
pub use context::{assemble_context, build_prompt, join_context};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, HttpEmbedderConfig,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, SearchError};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use ingest::{ingest_document, index_chunks, IngestionReport};
pub use llm::{ChatClientConfig, ChatCompletionClient};
pub use models::{
    Answer, Chunk, ChunkMetadata, DocumentFingerprint, EmbeddingPrefixes, IngestionOptions,
    QueryContext, RawPage, RetrievalOptions, ScoredCandidate, Section, SourceSection, StyledRun,
    NO_RELEVANT_SECTION,
};
pub use normalizer::{clean_text, normalize_pages};
pub use orchestrator::LawAssistant;
pub use ranking::rank_candidates;
pub use reference::parse_section_ref;
pub use segmenter::{segment_sections, SectionSegmenter};
pub use stores::{LocalIndex, QdrantStore};
pub use traits::{LanguageModel, VectorIndex};
