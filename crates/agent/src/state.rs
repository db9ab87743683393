//! Per-stage state records.
//!
//! Each stage consumes the record produced by the stage before it and returns
//! a record with strictly more fields. Fields are private and only readable,
//! so a later stage cannot rewrite what an earlier one decided.

use crate::reflection::ReflectionJudgment;
use serde::{Deserialize, Serialize};

/// Input to the plan stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedState {
    query: String,
}

impl SeedState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn into_planned(self, retrieve_needed: bool) -> PlannedState {
        PlannedState {
            query: self.query,
            retrieve_needed,
        }
    }
}

/// Output of the plan stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedState {
    query: String,
    retrieve_needed: bool,
}

impl PlannedState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn retrieve_needed(&self) -> bool {
        self.retrieve_needed
    }

    pub fn into_retrieved(self, retrieved_docs: Vec<String>) -> RetrievedState {
        RetrievedState {
            query: self.query,
            retrieve_needed: self.retrieve_needed,
            retrieved_docs,
        }
    }
}

/// Output of the retrieve stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedState {
    query: String,
    retrieve_needed: bool,
    retrieved_docs: Vec<String>,
}

impl RetrievedState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn retrieve_needed(&self) -> bool {
        self.retrieve_needed
    }

    pub fn retrieved_docs(&self) -> &[String] {
        &self.retrieved_docs
    }

    pub fn into_answered(self, answer: String) -> AnsweredState {
        AnsweredState {
            query: self.query,
            retrieve_needed: self.retrieve_needed,
            retrieved_docs: self.retrieved_docs,
            answer,
        }
    }
}

/// Output of the answer stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredState {
    query: String,
    retrieve_needed: bool,
    retrieved_docs: Vec<String>,
    answer: String,
}

impl AnsweredState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn retrieve_needed(&self) -> bool {
        self.retrieve_needed
    }

    pub fn retrieved_docs(&self) -> &[String] {
        &self.retrieved_docs
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// `is_relevant` holds only for a score at or above `relevance_threshold`.
    pub fn into_reflected(
        self,
        judgment: ReflectionJudgment,
        relevance_threshold: f32,
    ) -> WorkflowState {
        let is_relevant = judgment.is_relevant(relevance_threshold);
        WorkflowState {
            query: self.query,
            retrieve_needed: self.retrieve_needed,
            retrieved_docs: self.retrieved_docs,
            answer: self.answer,
            reflection_score: judgment.score,
            reflection: judgment.reason,
            is_relevant,
        }
    }
}

/// Terminal record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    query: String,
    retrieve_needed: bool,
    retrieved_docs: Vec<String>,
    answer: String,
    reflection_score: Option<f32>,
    reflection: String,
    is_relevant: bool,
}

impl WorkflowState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn retrieve_needed(&self) -> bool {
        self.retrieve_needed
    }

    pub fn retrieved_docs(&self) -> &[String] {
        &self.retrieved_docs
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn reflection_score(&self) -> Option<f32> {
        self.reflection_score
    }

    pub fn reflection(&self) -> &str {
        &self.reflection
    }

    pub fn is_relevant(&self) -> bool {
        self.is_relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(score: Option<f32>) -> ReflectionJudgment {
        ReflectionJudgment {
            score,
            reason: "reason".to_string(),
        }
    }

    #[test]
    fn test_transitions_carry_earlier_fields() {
        let state = SeedState::new("What is wind power?")
            .into_planned(true)
            .into_retrieved(vec!["doc".to_string()])
            .into_answered("Wind power is...".to_string())
            .into_reflected(judgment(Some(0.9)), 0.7);

        assert_eq!(state.query(), "What is wind power?");
        assert!(state.retrieve_needed());
        assert_eq!(state.retrieved_docs(), ["doc".to_string()]);
        assert_eq!(state.answer(), "Wind power is...");
        assert_eq!(state.reflection_score(), Some(0.9));
        assert_eq!(state.reflection(), "reason");
        assert!(state.is_relevant());
    }

    #[test]
    fn test_relevance_boundary() {
        let answered = SeedState::new("q")
            .into_planned(false)
            .into_retrieved(vec![])
            .into_answered("a".to_string());

        assert!(answered.clone().into_reflected(judgment(Some(0.7)), 0.7).is_relevant());
        assert!(!answered.clone().into_reflected(judgment(Some(0.69)), 0.7).is_relevant());
        assert!(!answered.into_reflected(judgment(None), 0.7).is_relevant());
    }

    #[test]
    fn test_final_state_has_exactly_seven_keys() {
        let state = SeedState::new("q")
            .into_planned(false)
            .into_retrieved(vec![])
            .into_answered("a".to_string())
            .into_reflected(judgment(None), 0.7);

        let json = serde_json::to_value(&state).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 7);
        assert!(json["reflection_score"].is_null());
        assert_eq!(json["is_relevant"], false);
    }
}
