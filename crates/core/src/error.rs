use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("extraction failed on page {page}: {details}")]
    ExtractionFailure { page: u32, details: String },

    #[error("document produced no chunks: {0}")]
    NoChunks(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid response from {backend}: {details}")]
    InvalidResponse { backend: String, details: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding service returned {actual} vectors for {expected} chunks")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("embedding {position} has dimension {actual}, expected {expected}")]
    EmbeddingDimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[error("corrupt index artifact: {0}")]
    CorruptIndexArtifact(String),

    #[error("index was built with model {index_model} but queries use {query_model}")]
    ModelMismatch {
        index_model: String,
        query_model: String,
    },

    #[error("query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generative service unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("malformed generation response: {0}")]
    InvalidResponse(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
