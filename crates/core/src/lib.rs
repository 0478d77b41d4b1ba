pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod language;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod reconcile;

pub use chunking::{
    add_overlap, build_chunks, merge_small_segments, normalize_whitespace, ChunkingConfig,
    TextCleaner,
};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OLLAMA_URL,
};
pub use error::{EmbeddingError, GenerationError, IndexError, IngestError};
pub use extractor::{
    HttpOcrEngine, HybridExtractor, LayoutExtractor, LopdfLayoutExtractor, OcrEndpointConfig,
    OcrEngine, PdfExtractor, TesseractOcr,
};
pub use generation::{
    GeminiGenerator, Generator, OllamaGenerator, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL,
};
pub use index::{IndexArtifact, IndexManifest, VectorIndex};
pub use ingest::{chunk_document, digest_file, ingest_document, ChunkedDocument, IngestionReport};
pub use language::{detect_query_language, QueryLanguage};
pub use memory::ConversationMemory;
pub use models::{
    Answer, Chunk, ConversationTurn, DocumentFingerprint, Page, ReconciledPage, RetrievalOptions,
    SearchHit,
};
pub use orchestrator::{build_prompt, placeholder_answer, RagOrchestrator};
pub use reconcile::{AnswerTable, TableReconciler};
