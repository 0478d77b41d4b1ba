use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentFingerprint {
    pub document_id: String,
    pub document_title: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub ocr_text: String,
    pub layout_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledPage {
    pub number: u32,
    pub text: String,
    pub table: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub text: String,
    pub char_len: usize,
}

impl Chunk {
    pub fn new(index: u64, text: String) -> Self {
        let char_len = text.chars().count();
        Self {
            index,
            text,
            char_len,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub history: Vec<ConversationTurn>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub top_k: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}
