use crate::models::{Chunk, ChunkMetadata, ScoredCandidate};
use crate::traits::{check_batch_shape, VectorIndex};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::warn;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

/// Qdrant reports cosine similarity; the ranking stage expects the squared
/// Euclidean distance between unit vectors, which is `2 - 2 * cos`.
pub fn cosine_to_distance(similarity: f64) -> f32 {
    (2.0 - 2.0 * similarity).max(0.0) as f32
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let url = format!("{}/collections/{}", self.endpoint, self.collection);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(&url)
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "qdrant collection setup failed with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn point_id(chunk: &Chunk) -> u64 {
    chunk
        .chunk_id
        .get(..16)
        .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
        .unwrap_or(u64::from(chunk.chunk_index))
}

fn candidate_from_hit(hit: &Value) -> Option<ScoredCandidate> {
    let payload = hit.pointer("/payload")?;
    let metadata: ChunkMetadata = serde_json::from_value(payload.clone()).ok()?;
    let text = payload.pointer("/text").and_then(Value::as_str)?.to_string();
    let chunk_id = payload
        .pointer("/chunk_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let similarity = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

    Some(ScoredCandidate {
        chunk: Chunk {
            chunk_id,
            section_id: metadata.section_id,
            chunk_index: metadata.chunk_index,
            page_estimate: metadata.page_estimate,
            text,
        },
        distance: cosine_to_distance(similarity),
    })
}

/// Converts search hits, nearest first. Hits whose payload does not carry a
/// chunk are counted and reported rather than returned.
fn candidates_from_hits(hits: &[Value]) -> (Vec<ScoredCandidate>, usize) {
    let mut candidates: Vec<ScoredCandidate> = hits.iter().filter_map(candidate_from_hit).collect();
    let dropped = hits.len() - candidates.len();
    candidates.sort_by(|left, right| left.distance.total_cmp(&right.distance));
    (candidates, dropped)
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        check_batch_shape(chunks, embeddings, self.vector_size)?;

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                let metadata = chunk.metadata();
                json!({
                    "id": point_id(chunk),
                    "vector": embedding,
                    "payload": {
                        "chunk_id": chunk.chunk_id,
                        "section_id": metadata.section_id,
                        "chunk_index": metadata.chunk_index,
                        "page_estimate": metadata.page_estimate,
                        "text": chunk.text,
                    },
                })
            })
            .collect::<Vec<_>>();

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let (result, dropped) = candidates_from_hits(&hits);
        if dropped > 0 {
            warn!(
                collection = %self.collection,
                dropped,
                returned = result.len(),
                "qdrant hits with unreadable payload were skipped"
            );
        }
        Ok(result)
    }
}
