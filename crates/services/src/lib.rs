#![forbid(unsafe_code)]

pub mod error;
pub mod feedback;
pub mod sessions;

pub use proctor_core::Clock;

pub use error::{AssessmentError, FeedbackError};
pub use feedback::{
    FALLBACK_FEEDBACK, FeedbackClient, FeedbackConfig, FeedbackGenerator, FeedbackOrchestrator,
    FeedbackRequest, FeedbackTask,
};
pub use sessions::{
    AssessmentService, AttentionSource, ChannelAttentionSource, FeedbackStatus, LockoutNotice,
    ProctoredSession, QuestionView, ResultView, SessionProgress, SessionUpdate, StartRequest,
};
