use thiserror::Error;

use crate::model::{AnswerError, ModelError, QuestionError};
use crate::scorer::ScoreError;
use crate::session::SessionError;

/// Any error raised by the domain crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
