use crate::models::{Chunk, DocumentFingerprint, ScoredCandidate};
use crate::traits::{check_batch_shape, VectorIndex};
use crate::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexFile {
    dimensions: usize,
    document: Option<DocumentFingerprint>,
    entries: Vec<IndexedChunk>,
}

/// Brute-force index persisted as one JSON file. Entries keep insertion order,
/// which also breaks distance ties.
pub struct LocalIndex {
    path: PathBuf,
    state: RwLock<IndexFile>,
}

impl LocalIndex {
    pub fn create(path: impl Into<PathBuf>, dimensions: usize) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(IndexFile {
                dimensions,
                document: None,
                entries: Vec::new(),
            }),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SearchError> {
        let path = path.into();
        if !path.exists() {
            return Err(SearchError::NotReady(format!(
                "no index at {}; run `lexi ingest` first",
                path.display()
            )));
        }
        let contents = fs::read_to_string(&path)?;
        let file: IndexFile = serde_json::from_str(&contents)?;
        Ok(Self {
            path,
            state: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> Result<usize, SearchError> {
        Ok(self.read()?.dimensions)
    }

    pub fn len(&self) -> Result<usize, SearchError> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, SearchError> {
        Ok(self.len()? == 0)
    }

    pub fn document(&self) -> Result<Option<DocumentFingerprint>, SearchError> {
        Ok(self.read()?.document.clone())
    }

    pub fn set_document(&self, document: DocumentFingerprint) -> Result<(), SearchError> {
        self.write()?.document = Some(document);
        Ok(())
    }

    pub fn persist(&self) -> Result<(), SearchError> {
        let serialized = serde_json::to_string(&*self.read()?)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serialized)?;
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexFile>, SearchError> {
        self.state
            .read()
            .map_err(|_| SearchError::NotReady("local index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexFile>, SearchError> {
        self.state
            .write()
            .map_err(|_| SearchError::NotReady("local index lock poisoned".to_string()))
    }
}

pub fn squared_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

#[async_trait]
impl VectorIndex for LocalIndex {
    async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        let mut state = self.write()?;
        check_batch_shape(chunks, embeddings, state.dimensions)?;

        state.entries.extend(
            chunks
                .iter()
                .zip(embeddings.iter())
                .map(|(chunk, embedding)| IndexedChunk {
                    chunk: chunk.clone(),
                    embedding: embedding.clone(),
                }),
        );
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let state = self.read()?;
        if query_vector.len() != state.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                state.dimensions
            )));
        }

        let mut scored: Vec<ScoredCandidate> = state
            .entries
            .iter()
            .map(|entry| ScoredCandidate {
                chunk: entry.chunk.clone(),
                distance: squared_distance(query_vector, &entry.embedding),
            })
            .collect();

        scored.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        scored.truncate(k);
        Ok(scored)
    }
}
