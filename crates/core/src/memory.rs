use crate::models::ConversationTurn;

#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ConversationTurn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("Human: {}\nAI: {}", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_are_kept_in_order() {
        let mut memory = ConversationMemory::new();
        memory.append("প্রথম প্রশ্ন", "প্রথম উত্তর");
        memory.append("second", "answer");

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.turns()[0].question, "প্রথম প্রশ্ন");
        assert_eq!(memory.turns()[1].answer, "answer");
    }

    #[test]
    fn render_lists_every_turn() {
        let mut memory = ConversationMemory::new();
        assert_eq!(memory.render(), "");

        memory.append("q1", "a1");
        memory.append("q2", "a2");
        assert_eq!(memory.render(), "Human: q1\nAI: a1\nHuman: q2\nAI: a2");
    }
}
