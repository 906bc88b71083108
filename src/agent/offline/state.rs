use crate::rag::Passage;

/// Grounding judgment of the current answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grounding {
    #[default]
    Unknown,
    Grounded,
    NotGrounded,
}

/// Per-query record threaded through the self-correcting controller.
#[derive(Debug, Clone)]
pub struct OfflineState {
    question: String,
    retrieved_context: Vec<Passage>,
    answer: String,
    retry_count: u32,
    is_grounded: Grounding,
    reformulated_question: Option<String>,
    last_query: String,
}

impl OfflineState {
    pub fn new(question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            last_query: question.clone(),
            question,
            retrieved_context: Vec::new(),
            answer: String::new(),
            retry_count: 0,
            is_grounded: Grounding::Unknown,
            reformulated_question: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn retrieved_context(&self) -> &[Passage] {
        &self.retrieved_context
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_grounded(&self) -> Grounding {
        self.is_grounded
    }

    pub fn reformulated_question(&self) -> Option<&str> {
        self.reformulated_question.as_deref()
    }

    /// Query used by the most recent retrieval.
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    /// Query for the next retrieval; a pending reformulation is consumed.
    pub fn take_query(&mut self) -> String {
        let query = self
            .reformulated_question
            .take()
            .unwrap_or_else(|| self.question.clone());
        self.last_query = query.clone();
        query
    }

    pub fn set_context(&mut self, passages: Vec<Passage>) {
        self.retrieved_context = passages;
        self.is_grounded = Grounding::Unknown;
    }

    pub fn set_answer(&mut self, answer: String) {
        self.answer = answer;
    }

    pub fn set_grounding(&mut self, grounding: Grounding) {
        self.is_grounded = grounding;
    }

    pub fn record_reformulation(&mut self, query: String) {
        self.retry_count += 1;
        self.reformulated_question = Some(query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::passage;

    #[test]
    fn reformulation_is_used_once() {
        let mut state = OfflineState::new("original");
        assert_eq!(state.take_query(), "original");

        state.record_reformulation("rewritten".to_string());
        assert_eq!(state.retry_count(), 1);
        assert_eq!(state.take_query(), "rewritten");
        assert_eq!(state.reformulated_question(), None);
        assert_eq!(state.last_query(), "rewritten");
        assert_eq!(state.take_query(), "original");
    }

    #[test]
    fn new_context_resets_grounding() {
        let mut state = OfflineState::new("q");
        state.set_grounding(Grounding::NotGrounded);
        state.set_context(vec![passage("fresh")]);
        assert_eq!(state.is_grounded(), Grounding::Unknown);
        assert_eq!(state.retrieved_context().len(), 1);
    }
}
