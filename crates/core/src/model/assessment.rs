use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::answer::AnswerSet;
use crate::model::ids::StudentId;
use crate::scorer::Score;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("grade level must be between 1 and 12, got {0}")]
    InvalidGrade(u8),

    #[error("quarter must be between 1 and 4, got {0}")]
    InvalidQuarter(u8),

    #[error("unknown session mode: {0}")]
    UnknownMode(String),

    #[error("unknown result outcome: {0}")]
    UnknownOutcome(String),

    #[error("persisted result is inconsistent: {0}")]
    InconsistentResult(&'static str),
}

//
// ─── SCOPE KEYS ───────────────────────────────────────────────────────────────
//

/// School subject name, trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject(String);

impl Subject {
    /// # Errors
    ///
    /// Returns `ModelError::EmptySubject` for blank names.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptySubject);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// School year the question set targets (1..=12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GradeLevel(u8);

impl GradeLevel {
    /// # Errors
    ///
    /// Returns `ModelError::InvalidGrade` outside 1..=12.
    pub fn new(value: u8) -> Result<Self, ModelError> {
        if (1..=12).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ModelError::InvalidGrade(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

/// One of the four grading periods (bimesters) of the school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    First,
    Second,
    Third,
    Fourth,
}

impl Quarter {
    /// # Errors
    ///
    /// Returns `ModelError::InvalidQuarter` outside 1..=4.
    pub fn from_number(value: u8) -> Result<Self, ModelError> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            3 => Ok(Self::Third),
            4 => Ok(Self::Fourth),
            other => Err(ModelError::InvalidQuarter(other)),
        }
    }

    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Quarter::First => 1,
            Quarter::Second => 2,
            Quarter::Third => 3,
            Quarter::Fourth => 4,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}º bimestre", self.number())
    }
}

/// Whether a session counts. Official sessions are graded, monitored and
/// persisted; mock sessions are graded for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Official,
    Mock,
}

impl SessionMode {
    #[must_use]
    pub fn is_official(self) -> bool {
        matches!(self, SessionMode::Official)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Official => "official",
            SessionMode::Mock => "mock",
        }
    }

    /// # Errors
    ///
    /// Returns `ModelError::UnknownMode` for unrecognized values.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw {
            "official" => Ok(Self::Official),
            "mock" => Ok(Self::Mock),
            other => Err(ModelError::UnknownMode(other.to_string())),
        }
    }
}

/// Lookup key for the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionSetKey {
    pub subject: Subject,
    pub grade: GradeLevel,
    pub quarter: Quarter,
    pub mode: SessionMode,
}

/// Key a result is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssessmentKey {
    pub student: StudentId,
    pub subject: Subject,
    pub quarter: Quarter,
    pub mode: SessionMode,
}

//
// ─── RESULT ───────────────────────────────────────────────────────────────────
//

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOutcome {
    /// Finished through the normal path and scored.
    Completed,
    /// Voided by the integrity monitor.
    Blocked,
}

impl ResultOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResultOutcome::Completed => "completed",
            ResultOutcome::Blocked => "blocked",
        }
    }

    /// # Errors
    ///
    /// Returns `ModelError::UnknownOutcome` for unrecognized values.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw {
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            other => Err(ModelError::UnknownOutcome(other.to_string())),
        }
    }
}

/// Record of a session that reached a terminal phase.
///
/// Blocked results always carry a zero score and the review flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentResult {
    key: AssessmentKey,
    score: Score,
    answers: AnswerSet,
    strikes: u32,
    outcome: ResultOutcome,
    needs_review: bool,
    feedback: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl AssessmentResult {
    #[must_use]
    pub fn completed(
        key: AssessmentKey,
        score: Score,
        answers: AnswerSet,
        strikes: u32,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            score,
            answers,
            strikes,
            outcome: ResultOutcome::Completed,
            needs_review: false,
            feedback: None,
            recorded_at,
        }
    }

    /// The answer set is kept for the reviewer but never graded.
    #[must_use]
    pub fn blocked(
        key: AssessmentKey,
        total: u32,
        answers: AnswerSet,
        strikes: u32,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            score: Score::zero(total),
            answers,
            strikes,
            outcome: ResultOutcome::Blocked,
            needs_review: true,
            feedback: None,
            recorded_at,
        }
    }

    /// Rehydrate a result from storage.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InconsistentResult` if a blocked row has a nonzero
    /// score or no review flag, or if the answer count differs from the total.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        key: AssessmentKey,
        score: Score,
        answers: AnswerSet,
        strikes: u32,
        outcome: ResultOutcome,
        needs_review: bool,
        feedback: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        if outcome == ResultOutcome::Blocked && (score.correct() != 0 || !needs_review) {
            return Err(ModelError::InconsistentResult(
                "blocked result must be zero-score and flagged",
            ));
        }
        if score.correct() > score.total() {
            return Err(ModelError::InconsistentResult("score exceeds total"));
        }
        if usize::try_from(score.total()).ok() != Some(answers.len()) {
            return Err(ModelError::InconsistentResult(
                "answer count does not match score total",
            ));
        }
        Ok(Self {
            key,
            score,
            answers,
            strikes,
            outcome,
            needs_review,
            feedback,
            recorded_at,
        })
    }

    pub fn attach_feedback(&mut self, text: impl Into<String>) {
        self.feedback = Some(text.into());
    }

    #[must_use]
    pub fn key(&self) -> &AssessmentKey {
        &self.key
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    #[must_use]
    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    #[must_use]
    pub fn outcome(&self) -> ResultOutcome {
        self.outcome
    }

    #[must_use]
    pub fn needs_review(&self) -> bool {
        self.needs_review
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

//
// ─── ACCOUNT LOCK ─────────────────────────────────────────────────────────────
//

/// Written when a student is locked out; blocks new sessions until an
/// administrator clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLock {
    pub student: StudentId,
    pub subject: Subject,
    pub quarter: Quarter,
    pub strikes: u32,
    pub locked_at: DateTime<Utc>,
}
