//! Deterministic grading of a fully answered session.
//!
//! One point per question whose selected option matches the correct index.
//! No partial credit and no weighting by difficulty.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{AnswerSet, Question};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("answer set has {answers} slots for {questions} questions")]
    LengthMismatch { questions: usize, answers: usize },

    #[error("question {index} is unanswered")]
    Unanswered { index: usize },

    #[error("too many questions to score: {0}")]
    TooManyQuestions(usize),
}

/// Number of correct answers out of the question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    correct: u32,
    total: u32,
}

impl Score {
    #[must_use]
    pub fn new(correct: u32, total: u32) -> Self {
        Self { correct, total }
    }

    #[must_use]
    pub fn zero(total: u32) -> Self {
        Self { correct: 0, total }
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Unscaled decimal form, e.g. `4.0` for 4 of 5.
    #[must_use]
    pub fn as_decimal(&self) -> f64 {
        f64::from(self.correct)
    }

    /// Share of correct answers scaled to 0..=100. Zero for an empty score.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.total) * 100.0
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.correct == self.total
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.correct, self.total)
    }
}

/// Per-question outcome shown on the review screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub index: usize,
    pub selected: usize,
    pub correct: usize,
    pub is_correct: bool,
    pub explanation: String,
}

fn check_complete(questions: &[Question], answers: &AnswerSet) -> Result<Vec<usize>, ScoreError> {
    if questions.len() != answers.len() {
        return Err(ScoreError::LengthMismatch {
            questions: questions.len(),
            answers: answers.len(),
        });
    }
    answers
        .iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(ScoreError::Unanswered { index }))
        .collect()
}

/// Grade a complete answer set.
///
/// # Errors
///
/// Returns `ScoreError::LengthMismatch` when the set does not cover the
/// questions one-to-one and `ScoreError::Unanswered` for the first empty slot.
pub fn score(questions: &[Question], answers: &AnswerSet) -> Result<Score, ScoreError> {
    let selected = check_complete(questions, answers)?;
    let total = u32::try_from(questions.len())
        .map_err(|_| ScoreError::TooManyQuestions(questions.len()))?;

    let mut correct = 0_u32;
    for (question, option) in questions.iter().zip(selected) {
        if question.is_correct(option) {
            correct = correct.saturating_add(1);
        }
    }

    Ok(Score::new(correct, total))
}

/// Per-question breakdown for a complete answer set.
///
/// # Errors
///
/// Same conditions as [`score`].
pub fn review(
    questions: &[Question],
    answers: &AnswerSet,
) -> Result<Vec<QuestionReview>, ScoreError> {
    let selected = check_complete(questions, answers)?;
    Ok(questions
        .iter()
        .zip(selected)
        .enumerate()
        .map(|(index, (question, option))| QuestionReview {
            index,
            selected: option,
            correct: question.correct_index(),
            is_correct: question.is_correct(option),
            explanation: question.explanation().to_string(),
        })
        .collect())
}
