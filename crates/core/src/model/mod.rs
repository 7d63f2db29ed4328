mod answer;
mod assessment;
mod ids;
mod question;

pub use answer::{AnswerError, AnswerSet, UNANSWERED};
pub use assessment::{
    AccountLock, AssessmentKey, AssessmentResult, GradeLevel, ModelError, QuestionSetKey, Quarter,
    ResultOutcome, SessionMode, Subject,
};
pub use ids::{ParseIdError, QuestionId, ResultId, SessionId, StudentId};
pub use question::{Difficulty, Question, QuestionError, QuestionSet};
