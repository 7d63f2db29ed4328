//! Post-submission feedback: a bounded, cancellable call to a text generator
//! that always resolves to displayable text.

mod client;
mod orchestrator;
mod prompt;

pub use client::{FeedbackClient, FeedbackConfig};
pub use orchestrator::{
    DEFAULT_FEEDBACK_TIMEOUT, FALLBACK_FEEDBACK, FeedbackGenerator, FeedbackOrchestrator,
    FeedbackRequest, FeedbackTask,
};
pub use prompt::build_prompt;
