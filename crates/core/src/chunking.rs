use crate::error::IngestError;
use crate::models::Chunk;
use regex::Regex;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub min_segment_chars: usize,
    pub merge_threshold: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_segment_chars: 10,
            merge_threshold: 500,
            overlap_words: 100,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

#[derive(Debug, Clone)]
pub struct TextCleaner {
    paragraph_break: Regex,
    ascii_digits: Regex,
    bracketed: Regex,
    marker_lines: Vec<Regex>,
    marker_tokens: Vec<Regex>,
    foreign: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self, IngestError> {
        const NOISE_MARKER: &str = r"\[?লুকছল";
        const PROMO_MARKER: &str = "অনলাইন";

        let mut marker_lines = Vec::new();
        let mut marker_tokens = Vec::new();
        for marker in [NOISE_MARKER, PROMO_MARKER] {
            marker_lines.push(Regex::new(&format!(r"(?im)^[ \t]*{marker}[^\n]*\n?"))?);
            marker_tokens.push(Regex::new(&format!("(?i){marker}"))?);
        }

        Ok(Self {
            paragraph_break: Regex::new(r"(?:\r?\n){2,}")?,
            ascii_digits: Regex::new(r"[0-9]+")?,
            bracketed: Regex::new(r"\[.*?\]")?,
            marker_lines,
            marker_tokens,
            foreign: Regex::new(r"[^\x{0980}-\x{09FF} ]+")?,
        })
    }

    pub fn split_segments(&self, text: &str, min_chars: usize) -> Vec<String> {
        self.paragraph_break
            .split(text)
            .map(str::trim)
            .filter(|segment| !segment.is_empty() && segment.chars().count() >= min_chars)
            .map(str::to_string)
            .collect()
    }

    pub fn clean(&self, segment: &str) -> String {
        let text = segment.replace('\u{000c}', " ");
        let text = self.ascii_digits.replace_all(&text, " ");
        let mut text = self.bracketed.replace_all(&text, "").into_owned();

        for marker in &self.marker_lines {
            text = marker.replace_all(&text, "").into_owned();
        }
        for marker in &self.marker_tokens {
            // removing one marker can splice a new one together
            while marker.is_match(&text) {
                text = marker.replace_all(&text, "").into_owned();
            }
        }

        let text = text.replace(['\r', '\n'], " ");
        let text = self.foreign.replace_all(&text, " ");
        normalize_whitespace(&text)
    }
}

/// A segment that alone reaches the threshold is emitted as its own chunk.
pub fn merge_small_segments(segments: Vec<String>, threshold: usize) -> Vec<String> {
    let mut merged = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0usize;

    for segment in segments {
        let segment_len = segment.chars().count();

        if buffer.is_empty() {
            buffer = segment;
            buffer_len = segment_len;
            continue;
        }

        if buffer_len + 1 + segment_len < threshold {
            buffer.push(' ');
            buffer.push_str(&segment);
            buffer_len += 1 + segment_len;
        } else {
            merged.push(std::mem::replace(&mut buffer, segment));
            buffer_len = segment_len;
        }
    }

    if !buffer.is_empty() {
        merged.push(buffer);
    }

    merged
}

/// Prefixes every chunk after the first with the trailing words of the chunk
/// emitted before it, including that chunk's own prefix.
pub fn add_overlap(chunks: Vec<String>, overlap_words: usize) -> Vec<String> {
    let mut overlapped: Vec<String> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let text = match overlapped.last() {
            Some(previous) => {
                let words = previous.split_whitespace().collect::<Vec<_>>();
                let tail = &words[words.len().saturating_sub(overlap_words)..];
                if tail.is_empty() {
                    chunk
                } else {
                    format!("{} {}", tail.join(" "), chunk)
                }
            }
            None => chunk,
        };
        overlapped.push(text);
    }

    overlapped
}

pub fn build_chunks(raw_text: &str, config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    let cleaner = TextCleaner::new()?;

    let cleaned = cleaner
        .split_segments(raw_text, config.min_segment_chars)
        .iter()
        .map(|segment| cleaner.clean(segment))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();

    let merged = merge_small_segments(cleaned, config.merge_threshold);
    let chunks = add_overlap(merged, config.overlap_words)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk::new(index as u64, text))
        .collect();

    Ok(chunks)
}
