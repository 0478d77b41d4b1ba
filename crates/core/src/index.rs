use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{Chunk, DocumentFingerprint, SearchHit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;

pub const INDEX_FILE: &str = "index.json";
pub const CHUNKS_FILE: &str = "chunks.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub model_id: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub document: Option<DocumentFingerprint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexBlob {
    manifest: IndexManifest,
    chunks_sha256: String,
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct IndexArtifact {
    pub index_blob: Vec<u8>,
    pub chunk_blob: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    manifest: IndexManifest,
    embeddings: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    pub async fn build<E>(chunks: Vec<Chunk>, embedder: &E) -> Result<Self, IndexError>
    where
        E: Embedder + ?Sized,
    {
        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let embeddings = embedder.embed_batch(&texts).await?;

        let index = Self::from_parts(embedder.model_id(), chunks, embeddings)?;
        info!(
            chunks = index.len(),
            dimension = index.dimension(),
            model = %index.model_id(),
            "vector index built"
        );
        Ok(index)
    }

    pub fn from_parts(
        model_id: impl Into<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if embeddings.len() != chunks.len() {
            return Err(IndexError::EmbeddingCountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        check_dimensions(&embeddings, dimension)?;

        Ok(Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                model_id: model_id.into(),
                dimension,
                built_at: Utc::now(),
                document: None,
            },
            embeddings,
            chunks,
        })
    }

    pub fn with_document(mut self, document: DocumentFingerprint) -> Self {
        self.manifest.document = Some(document);
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    pub fn model_id(&self) -> &str {
        &self.manifest.model_id
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    pub async fn search<E>(
        &self,
        embedder: &E,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError>
    where
        E: Embedder + ?Sized,
    {
        if query.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }

        let query_model = embedder.model_id();
        if query_model != self.manifest.model_id {
            return Err(IndexError::ModelMismatch {
                index_model: self.manifest.model_id.clone(),
                query_model,
            });
        }

        let query_vector = embedder.embed_query(query).await?;
        self.nearest(&query_vector, top_k)
    }

    /// Ascending L2 distance; equal distances keep chunk order.
    pub fn nearest(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension() {
            return Err(IndexError::EmbeddingDimensionMismatch {
                expected: self.dimension(),
                actual: query_vector.len(),
                position: 0,
            });
        }

        let mut scored = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(position, embedding)| (l2_distance(embedding, query_vector), position))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| left.0.total_cmp(&right.0).then(left.1.cmp(&right.1)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, position)| SearchHit {
                chunk: self.chunks[position].clone(),
                distance,
            })
            .collect())
    }

    pub fn to_artifact(&self) -> Result<IndexArtifact, IndexError> {
        let chunk_blob = serde_json::to_vec(&self.chunks)?;
        let blob = IndexBlob {
            manifest: self.manifest.clone(),
            chunks_sha256: digest_blob(&chunk_blob),
            embeddings: self.embeddings.clone(),
        };

        Ok(IndexArtifact {
            index_blob: serde_json::to_vec(&blob)?,
            chunk_blob,
        })
    }

    pub fn from_artifact(artifact: &IndexArtifact) -> Result<Self, IndexError> {
        let blob: IndexBlob = serde_json::from_slice(&artifact.index_blob)?;

        if blob.manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::CorruptIndexArtifact(format!(
                "unsupported format version {}",
                blob.manifest.format_version
            )));
        }

        if digest_blob(&artifact.chunk_blob) != blob.chunks_sha256 {
            return Err(IndexError::CorruptIndexArtifact(
                "chunk list does not belong to this index".to_string(),
            ));
        }

        let chunks: Vec<Chunk> = serde_json::from_slice(&artifact.chunk_blob)?;

        if blob.embeddings.len() != chunks.len() {
            return Err(IndexError::CorruptIndexArtifact(format!(
                "{} embeddings but {} chunks",
                blob.embeddings.len(),
                chunks.len()
            )));
        }

        check_dimensions(&blob.embeddings, blob.manifest.dimension)
            .map_err(|error| IndexError::CorruptIndexArtifact(error.to_string()))?;

        Ok(Self {
            manifest: blob.manifest,
            embeddings: blob.embeddings,
            chunks,
        })
    }

    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir)?;
        let artifact = self.to_artifact()?;

        let index_tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        let chunks_tmp = dir.join(format!("{CHUNKS_FILE}.tmp"));
        fs::write(&index_tmp, &artifact.index_blob)?;
        fs::write(&chunks_tmp, &artifact.chunk_blob)?;
        fs::rename(&chunks_tmp, dir.join(CHUNKS_FILE))?;
        fs::rename(&index_tmp, dir.join(INDEX_FILE))?;

        info!(dir = %dir.display(), chunks = self.len(), "vector index saved");
        Ok(())
    }

    pub fn open(dir: &Path) -> Result<Self, IndexError> {
        let artifact = IndexArtifact {
            index_blob: fs::read(dir.join(INDEX_FILE))?,
            chunk_blob: fs::read(dir.join(CHUNKS_FILE))?,
        };

        let index = Self::from_artifact(&artifact)?;
        info!(
            dir = %dir.display(),
            chunks = index.len(),
            model = %index.model_id(),
            "vector index loaded"
        );
        Ok(index)
    }
}

fn digest_blob(blob: &[u8]) -> String {
    format!("{:x}", Sha256::digest(blob))
}

fn check_dimensions(embeddings: &[Vec<f32>], expected: usize) -> Result<(), IndexError> {
    match embeddings
        .iter()
        .enumerate()
        .find(|(_, embedding)| embedding.len() != expected)
    {
        Some((position, embedding)) => Err(IndexError::EmbeddingDimensionMismatch {
            expected,
            actual: embedding.len(),
            position,
        }),
        None => Ok(()),
    }
}

fn l2_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}
