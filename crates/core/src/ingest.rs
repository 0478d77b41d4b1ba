use crate::chunking::{build_chunks, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::index::VectorIndex;
use crate::models::{Chunk, DocumentFingerprint, ReconciledPage};
use crate::reconcile::TableReconciler;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn merge_page_texts(pages: &[ReconciledPage]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ChunkedDocument {
    pub pages: Vec<ReconciledPage>,
    pub chunks: Vec<Chunk>,
}

impl ChunkedDocument {
    pub fn tables_recovered(&self) -> usize {
        self.pages.iter().filter(|page| page.table.is_some()).count()
    }
}

pub fn chunk_document<X>(
    path: &Path,
    extractor: &X,
    config: ChunkingConfig,
) -> Result<ChunkedDocument, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let pages = extractor.extract_pages(path)?;
    let reconciled = TableReconciler::new()?.reconcile_pages(&pages);
    let chunks = build_chunks(&merge_page_texts(&reconciled), config)?;

    if chunks.is_empty() {
        return Err(IngestError::NoChunks(path.display().to_string()));
    }

    Ok(ChunkedDocument {
        pages: reconciled,
        chunks,
    })
}

pub struct IngestionReport {
    pub index: VectorIndex,
    pub pages: usize,
    pub tables_recovered: usize,
}

pub async fn ingest_document<X, E>(
    path: &Path,
    extractor: &X,
    embedder: &E,
    config: ChunkingConfig,
) -> Result<IngestionReport, IngestError>
where
    X: PdfExtractor + ?Sized,
    E: Embedder + ?Sized,
{
    let fingerprint = build_document_fingerprint(path)?;
    let document = chunk_document(path, extractor, config)?;
    let tables_recovered = document.tables_recovered();
    let pages = document.pages.len();

    info!(
        path = %path.display(),
        pages,
        tables_recovered,
        chunks = document.chunks.len(),
        "document chunked"
    );

    let index = VectorIndex::build(document.chunks, embedder)
        .await?
        .with_document(fingerprint);

    Ok(IngestionReport {
        index,
        pages,
        tables_recovered,
    })
}

fn build_document_fingerprint(path: &Path) -> Result<DocumentFingerprint, IngestError> {
    let checksum = digest_file(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    Ok(DocumentFingerprint {
        document_id: generate_document_id(path),
        document_title: name.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}
