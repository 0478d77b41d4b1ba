use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueryLanguage {
    Bengali,
    Other,
}

impl QueryLanguage {
    pub fn instruction(self) -> &'static str {
        match self {
            QueryLanguage::Bengali => "উত্তরটি প্রশ্নের ভাষায় দিন (বাংলা)।",
            QueryLanguage::Other => "Answer in the same language as the question (English).",
        }
    }
}

fn is_bengali(ch: char) -> bool {
    ('\u{0980}'..='\u{09FF}').contains(&ch)
}

/// Returns `None` when the text has no letters to judge by.
pub fn detect_query_language(text: &str) -> Option<QueryLanguage> {
    let (bengali, other) = text
        .chars()
        .filter(|ch| ch.is_alphabetic() || is_bengali(*ch))
        .fold((0usize, 0usize), |(bengali, other), ch| {
            if is_bengali(ch) {
                (bengali + 1, other)
            } else {
                (bengali, other + 1)
            }
        });

    match (bengali, other) {
        (0, 0) => None,
        (bengali, other) if bengali >= other => Some(QueryLanguage::Bengali),
        _ => Some(QueryLanguage::Other),
    }
}
