use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::language::{detect_query_language, QueryLanguage};
use crate::memory::ConversationMemory;
use crate::models::{Answer, RetrievalOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PREAMBLE: &str = "\
You are a patient and knowledgeable teacher. A student has asked a question about a study text.

Read the context taken from the text and work out what the student actually wants to know. \
If the question is about the context:

1. Think it through and explain the answer in your own words.
2. Answer in the language the question was asked in (English or Bengali).
3. Keep the answer short; being correct matters more than being detailed.

If the question has nothing to do with the context, say politely that it is outside the topic.";

const CLOSING: &str = "\
Instructions:
- Always answer in the question's language.
- Do not repeat the context unless it is needed.
- Be helpful, concise and relevant.";

pub fn build_prompt(context: &str, query: &str, history: &str, language: QueryLanguage) -> String {
    format!(
        "{PREAMBLE}\n\n---\nContext:\n{context}\n\nQuestion:\n{query}\n\n\
         Conversation History (for continuity):\n{history}\n\n{CLOSING}\n- {}",
        language.instruction()
    )
}

pub fn placeholder_answer(query: &str, context: &str) -> String {
    format!("Placeholder answer for query: {query}\nContext: {context}")
}

pub struct RagOrchestrator<E, G>
where
    E: Embedder,
    G: Generator,
{
    index: Arc<VectorIndex>,
    embedder: E,
    generator: Option<G>,
    options: RetrievalOptions,
}

impl<E, G> RagOrchestrator<E, G>
where
    E: Embedder,
    G: Generator,
{
    pub fn new(index: Arc<VectorIndex>, embedder: E, generator: Option<G>) -> Self {
        Self {
            index,
            embedder,
            generator,
            options: RetrievalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn answer(
        &self,
        query: &str,
        memory: &mut ConversationMemory,
    ) -> Result<Answer, IndexError> {
        let language = detect_query_language(query).unwrap_or_else(|| {
            debug!("query language not detected, answering in English");
            QueryLanguage::Other
        });

        let hits = self
            .index
            .search(&self.embedder, query, self.options.top_k)
            .await?;
        info!(hits = hits.len(), language = ?language, "retrieved context");

        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = build_prompt(&context, query, &memory.render(), language);

        let (answer, degraded) = match &self.generator {
            Some(generator) => match generator.generate(&prompt).await {
                Ok(answer) => (answer, false),
                Err(error) => {
                    warn!(%error, "generation failed, returning placeholder answer");
                    (placeholder_answer(query, &context), true)
                }
            },
            None => {
                warn!("no generator configured, returning placeholder answer");
                (placeholder_answer(query, &context), true)
            }
        };

        memory.append(query, answer.clone());

        Ok(Answer {
            query: query.to_string(),
            answer,
            history: memory.turns().to_vec(),
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::GenerationError;
    use crate::models::Chunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            let mut prompts = self.prompts.lock().expect("lock");
            prompts.push(prompt.to_string());
            Ok(format!("উত্তর {}", prompts.len()))
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl Generator for DownGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Unavailable("connection refused".to_string()))
        }
    }

    async fn index() -> Arc<VectorIndex> {
        let chunks = [
            "অনুপমের বয়স সাতাশ বছর",
            "কল্যাণীর বাবা শম্ভুনাথ সেন",
            "মামা বিয়ের সব আয়োজন করেন",
        ]
        .iter()
        .enumerate()
        .map(|(index, text)| Chunk::new(index as u64, text.to_string()))
        .collect();

        Arc::new(
            VectorIndex::build(chunks, &CharacterNgramEmbedder::default())
                .await
                .expect("index builds"),
        )
    }

    #[tokio::test]
    async fn prompt_carries_context_query_history_and_language() {
        let orchestrator = RagOrchestrator::new(
            index().await,
            CharacterNgramEmbedder::default(),
            Some(RecordingGenerator::default()),
        )
        .with_options(RetrievalOptions { top_k: 1 });
        let mut memory = ConversationMemory::new();

        let first = orchestrator
            .answer("কল্যাণীর বাবার নাম কী?", &mut memory)
            .await
            .expect("answer");
        let second = orchestrator
            .answer("Who arranged the wedding?", &mut memory)
            .await
            .expect("answer");

        assert_eq!(first.answer, "উত্তর 1");
        assert!(!first.degraded);
        assert_eq!(second.history.len(), 2);
        assert_eq!(second.history[0].question, "কল্যাণীর বাবার নাম কী?");
        assert_eq!(second.history[1].answer, "উত্তর 2");

        let generator = orchestrator.generator.as_ref().expect("generator");
        let prompts = generator.prompts.lock().expect("lock");
        assert!(prompts[0].contains("Context:\nকল্যাণীর বাবা শম্ভুনাথ সেন\n"));
        assert!(prompts[0].contains(QueryLanguage::Bengali.instruction()));
        assert!(prompts[1].contains("Human: কল্যাণীর বাবার নাম কী?\nAI: উত্তর 1"));
        assert!(prompts[1].contains("Question:\nWho arranged the wedding?"));
        assert!(prompts[1].contains(QueryLanguage::Other.instruction()));
    }

    #[tokio::test]
    async fn context_follows_similarity_order() {
        let orchestrator = RagOrchestrator::new(
            index().await,
            CharacterNgramEmbedder::default(),
            Some(RecordingGenerator::default()),
        );
        let mut memory = ConversationMemory::new();

        orchestrator
            .answer("মামা বিয়ের সব আয়োজন করেন", &mut memory)
            .await
            .expect("answer");

        let generator = orchestrator.generator.as_ref().expect("generator");
        let prompts = generator.prompts.lock().expect("lock");
        assert!(prompts[0].contains("Context:\nমামা বিয়ের সব আয়োজন করেন\n"));
    }

    #[tokio::test]
    async fn unavailable_generator_degrades_to_placeholder() {
        let orchestrator = RagOrchestrator::new(
            index().await,
            CharacterNgramEmbedder::default(),
            Some(DownGenerator),
        )
        .with_options(RetrievalOptions { top_k: 1 });
        let mut memory = ConversationMemory::new();

        let answer = orchestrator
            .answer("অনুপমের বয়স কত?", &mut memory)
            .await
            .expect("degraded answer is still an answer");

        assert!(answer.degraded);
        assert_eq!(
            answer.answer,
            "Placeholder answer for query: অনুপমের বয়স কত?\nContext: অনুপমের বয়স সাতাশ বছর"
        );
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn missing_generator_degrades_to_placeholder() {
        let orchestrator: RagOrchestrator<_, DownGenerator> =
            RagOrchestrator::new(index().await, CharacterNgramEmbedder::default(), None);
        let mut memory = ConversationMemory::new();

        let answer = orchestrator.answer("?!", &mut memory).await.expect("answer");

        assert!(answer.degraded);
        assert!(answer.answer.starts_with("Placeholder answer for query: ?!"));
    }

    #[tokio::test]
    async fn failed_search_leaves_memory_untouched() {
        let orchestrator = RagOrchestrator::new(
            index().await,
            CharacterNgramEmbedder { dimensions: 8 },
            Some(RecordingGenerator::default()),
        );
        let mut memory = ConversationMemory::new();

        let error = orchestrator
            .answer("অনুপম", &mut memory)
            .await
            .expect_err("model mismatch");

        assert!(matches!(error, IndexError::ModelMismatch { .. }));
        assert!(memory.is_empty());
    }

    #[test]
    fn prompt_sections_appear_in_order() {
        let prompt = build_prompt("প্রসঙ্গ", "প্রশ্ন", "Human: a\nAI: b", QueryLanguage::Bengali);

        let context = prompt.find("Context:\nপ্রসঙ্গ").expect("context");
        let question = prompt.find("Question:\nপ্রশ্ন").expect("question");
        let history = prompt.find("Human: a\nAI: b").expect("history");
        let language = prompt.find(QueryLanguage::Bengali.instruction()).expect("language");
        assert!(context < question && question < history && history < language);
    }
}
