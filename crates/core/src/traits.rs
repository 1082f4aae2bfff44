use crate::models::{Chunk, ScoredCandidate};
use crate::SearchError;
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex {
    /// Stores chunks in the given order; `embeddings[i]` belongs to `chunks[i]`.
    async fn index_chunks(&self, chunks: &[Chunk], embeddings: &[Vec<f32>])
        -> Result<(), SearchError>;

    /// Up to `k` candidates, nearest (smallest distance) first.
    async fn search(&self, query_vector: &[f32], k: usize)
        -> Result<Vec<ScoredCandidate>, SearchError>;
}

#[async_trait]
pub trait LanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String, SearchError>;
}

#[async_trait]
impl<T> VectorIndex for Box<T>
where
    T: VectorIndex + ?Sized + Send + Sync,
{
    async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        (**self).index_chunks(chunks, embeddings).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        (**self).search(query_vector, k).await
    }
}

pub(crate) fn check_batch_shape(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dimensions: usize,
) -> Result<(), SearchError> {
    if chunks.len() != embeddings.len() {
        return Err(SearchError::Request(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    if let Some(bad) = embeddings.iter().find(|embedding| embedding.len() != dimensions) {
        return Err(SearchError::Request(format!(
            "embedding dimension {} != {}",
            bad.len(),
            dimensions
        )));
    }

    Ok(())
}
