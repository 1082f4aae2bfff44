use crate::chunking::chunk_sections;
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::models::{Chunk, DocumentFingerprint, EmbeddingPrefixes, IngestionOptions, Section};
use crate::normalizer::normalize_pages;
use crate::segmenter::segment_sections;
use crate::traits::VectorIndex;
use crate::{IngestError, SearchError};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub struct IngestionReport {
    pub fingerprint: DocumentFingerprint,
    pub sections: Vec<Section>,
    pub chunks: Vec<Chunk>,
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn build_document_fingerprint(path: &Path) -> Result<DocumentFingerprint, IngestError> {
    let checksum = digest_file(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    Ok(DocumentFingerprint {
        document_title: name.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

/// Extract, normalize, segment and chunk one statute PDF. An unreadable
/// document is fatal; a document with no recognisable sections is not.
pub fn ingest_document<X: PdfExtractor>(
    extractor: &X,
    path: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    options.validate()?;
    let fingerprint = build_document_fingerprint(path)?;
    let pages = extractor.extract_pages(path, options.start_page)?;
    let normalized = normalize_pages(&pages);
    let sections = segment_sections(&normalized, options.start_page, options.min_section_chars)?;

    if sections.is_empty() {
        warn!(path = %path.display(), "no section headers recognised");
    }

    let chunks = chunk_sections(&sections, options)?;
    info!(
        pages = pages.len(),
        sections = sections.len(),
        chunks = chunks.len(),
        "document segmented"
    );

    Ok(IngestionReport {
        fingerprint,
        sections,
        chunks,
    })
}

/// Embeds chunks with up to `concurrency` requests in flight and stores them
/// in their original order.
pub async fn index_chunks<E, V>(
    embedder: &E,
    index: &V,
    chunks: &[Chunk],
    prefixes: &EmbeddingPrefixes,
    concurrency: usize,
) -> Result<usize, SearchError>
where
    E: Embedder + Sync,
    V: VectorIndex + Sync,
{
    if chunks.is_empty() {
        return Ok(0);
    }

    let embeddings: Vec<Vec<f32>> = stream::iter(chunks.iter())
        .map(|chunk| {
            let passage = format!("{}{}", prefixes.passage, chunk.text);
            async move { embedder.embed(&passage).await }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    index.index_chunks(chunks, &embeddings).await?;
    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{RawPage, StyledRun};
    use crate::stores::LocalIndex;
    use std::path::PathBuf;
    use tempfile::tempdir;

    struct FakeExtractor {
        pages: Vec<RawPage>,
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, _path: &Path, start_page: u32) -> Result<Vec<RawPage>, IngestError> {
            Ok(self
                .pages
                .iter()
                .filter(|page| page.number > start_page)
                .cloned()
                .collect())
        }
    }

    fn write_placeholder(dir: &Path) -> Result<PathBuf, std::io::Error> {
        let path = dir.join("ppc.pdf");
        fs::write(&path, b"%PDF-1.4\n%placeholder")?;
        Ok(path)
    }

    fn penal_code_pages() -> Vec<RawPage> {
        vec![
            RawPage {
                number: 3,
                runs: vec![StyledRun::plain("1. Front matter table of contents that must be skipped.")],
            },
            RawPage {
                number: 22,
                runs: vec![
                    StyledRun::italic("Of Murder\n"),
                    StyledRun::plain("302. Whoever commits qatl-i-amd shall, subject to the provisions of this Chapter, be punish-\n"),
                ],
            },
            RawPage {
                number: 23,
                runs: vec![StyledRun::plain(
                    "ed with death. 303. Punishment for abetment of qatl shall extend to ten years.",
                )],
            },
        ]
    }

    #[test]
    fn document_is_segmented_into_chunked_sections() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = write_placeholder(dir.path())?;
        let extractor = FakeExtractor {
            pages: penal_code_pages(),
        };

        let report = ingest_document(&extractor, &path, &IngestionOptions::default())?;

        let ids: Vec<_> = report.sections.iter().map(|section| section.id.as_str()).collect();
        assert_eq!(ids, vec!["302", "303"]);
        assert!(report.sections[0].text.ends_with("be punished with death."));
        assert!(!report.sections[0].text.contains("Murder"));
        assert_eq!(report.chunks.len(), 2);
        assert_eq!(report.fingerprint.document_title, "ppc.pdf");
        assert_eq!(report.fingerprint.checksum, digest_file(&path)?);
        Ok(())
    }

    #[test]
    fn document_without_sections_is_empty_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = write_placeholder(dir.path())?;
        let extractor = FakeExtractor {
            pages: vec![RawPage {
                number: 40,
                runs: vec![StyledRun::plain("schedule of amendments without numbered provisions")],
            }],
        };

        let report = ingest_document(&extractor, &path, &IngestionOptions::default())?;
        assert!(report.sections.is_empty());
        assert!(report.chunks.is_empty());
        Ok(())
    }

    #[test]
    fn missing_document_is_fatal() {
        let extractor = FakeExtractor { pages: Vec::new() };
        let result = ingest_document(
            &extractor,
            Path::new("/no/such/ppc.pdf"),
            &IngestionOptions::default(),
        );
        assert!(matches!(result, Err(IngestError::Io(_))));
    }

    #[tokio::test]
    async fn indexing_preserves_chunk_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = write_placeholder(dir.path())?;
        let extractor = FakeExtractor {
            pages: penal_code_pages(),
        };
        let report = ingest_document(&extractor, &path, &IngestionOptions::default())?;

        let embedder = CharacterNgramEmbedder { dimensions: 64 };
        let index = LocalIndex::create(dir.path().join("index.json"), 64);
        let stored = index_chunks(&embedder, &index, &report.chunks, &EmbeddingPrefixes::default(), 3)
            .await?;

        assert_eq!(stored, 2);
        let hits = index
            .search(&embedder.embed_sync("passage: 303. Punishment for abetment"), 10)
            .await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.section_id, "303");
        Ok(())
    }
}
