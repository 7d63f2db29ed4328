mod attention;
mod progress;
mod service;
mod view;
mod workflow;

pub use attention::{
    AttentionSource, AttentionSubscription, ChannelAttentionSource, SubscriptionId,
};
pub use progress::SessionProgress;
pub use service::ProctoredSession;
pub use view::{FeedbackStatus, LockoutNotice, QuestionView, ResultView};
pub use workflow::{AssessmentService, SessionUpdate, StartRequest};
