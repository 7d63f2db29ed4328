//! Shared error types for the services crate.

use thiserror::Error;

use proctor_core::model::QuestionError;
use proctor_core::session::SessionError;
use storage::repository::StorageError;

/// Errors emitted by a feedback generator. Never surfaced past the
/// orchestrator, which substitutes the fallback text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("feedback generation is not configured")]
    Disabled,
    #[error("feedback service returned an empty response")]
    EmptyResponse,
    #[error("feedback request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("feedback service error: {0}")]
    Service(String),
}

/// Errors emitted by the assessment workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("account is locked pending administrator review ({strikes} strikes)")]
    AccountLocked { strikes: u32 },
    #[error("an official result already exists for this assessment")]
    AlreadySubmitted,
    #[error("no question set available for {subject}, grade {grade}, quarter {quarter}")]
    QuestionsUnavailable {
        subject: String,
        grade: u8,
        quarter: u8,
    },
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
