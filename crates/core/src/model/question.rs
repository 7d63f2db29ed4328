use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question needs at least {min} options, got {got}")]
    TooFewOptions { min: usize, got: usize },

    #[error("option {index} is blank")]
    BlankOption { index: usize },

    #[error("correct option {index} is outside 0..{len}")]
    CorrectIndexOutOfRange { index: usize, len: usize },

    #[error("unknown difficulty tag: {0}")]
    UnknownDifficulty(String),

    #[error("question set is empty")]
    EmptySet,
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

/// Difficulty tag attached by the question bank. Informational only: the
/// scorer never weights by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Parses a stored tag.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownDifficulty` for unrecognized tags.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A multiple-choice question as supplied by the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: String,
    difficulty: Difficulty,
}

impl Question {
    pub const MIN_OPTIONS: usize = 2;

    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are fewer than
    /// two options, an option is blank, or `correct_index` is out of range.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: impl Into<String>,
        difficulty: Difficulty,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.len() < Self::MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions {
                min: Self::MIN_OPTIONS,
                got: options.len(),
            });
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::BlankOption { index });
        }
        if correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
                len: options.len(),
            });
        }

        Ok(Self {
            id,
            prompt,
            options,
            correct_index,
            explanation: explanation.into(),
            difficulty,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_index
    }
}

//
// ─── QUESTION SET ─────────────────────────────────────────────────────────────
//

/// Ordered, immutable question sequence shared read-only by the session,
/// the scorer and the feedback orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet(Arc<[Question]>);

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptySet` when no questions are supplied.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionError> {
        if questions.is_empty() {
            return Err(QuestionError::EmptySet);
        }
        Ok(Self(questions.into()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.0.get(index)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Question] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn valid_question_builds() {
        let q = Question::new(QuestionId::new(1), "2 + 2?", opts(4), 2, "", Difficulty::Easy)
            .unwrap();
        assert_eq!(q.options().len(), 4);
        assert!(q.is_correct(2));
        assert!(!q.is_correct(0));
        assert_eq!(q.option(3), Some("option 3"));
        assert_eq!(q.option(4), None);
    }

    #[test]
    fn rejects_correct_index_out_of_range() {
        let err = Question::new(QuestionId::new(1), "Q", opts(3), 3, "", Difficulty::Hard)
            .unwrap_err();
        assert_eq!(err, QuestionError::CorrectIndexOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn rejects_blank_prompt_and_options() {
        assert_eq!(
            Question::new(QuestionId::new(1), "  ", opts(2), 0, "", Difficulty::Easy).unwrap_err(),
            QuestionError::EmptyPrompt
        );
        assert_eq!(
            Question::new(QuestionId::new(1), "Q", opts(1), 0, "", Difficulty::Easy).unwrap_err(),
            QuestionError::TooFewOptions { min: 2, got: 1 }
        );
        let options = vec!["a".to_string(), " ".to_string()];
        assert_eq!(
            Question::new(QuestionId::new(1), "Q", options, 0, "", Difficulty::Easy).unwrap_err(),
            QuestionError::BlankOption { index: 1 }
        );
    }

    #[test]
    fn difficulty_tags_parse() {
        assert_eq!(Difficulty::parse("Medium").unwrap(), Difficulty::Medium);
        assert_eq!(Difficulty::Hard.as_str(), "hard");
        assert!(Difficulty::parse("brutal").is_err());
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(QuestionSet::new(Vec::new()).unwrap_err(), QuestionError::EmptySet);
    }
}
