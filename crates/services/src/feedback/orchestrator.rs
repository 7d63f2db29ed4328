use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_core::model::{AnswerSet, QuestionSet, Subject};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::FeedbackError;

/// Shown whenever feedback cannot be produced.
pub const FALLBACK_FEEDBACK: &str = "Feedback indisponível";

pub const DEFAULT_FEEDBACK_TIMEOUT: Duration = Duration::from_secs(20);

/// Everything a generator needs. Owned so it can move into a spawned task.
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub subject: Subject,
    pub questions: QuestionSet,
    pub answers: AnswerSet,
}

/// Produces explanatory text for a submitted answer set.
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `FeedbackError` for any generator failure.
    async fn generate(&self, request: &FeedbackRequest) -> Result<String, FeedbackError>;
}

/// Runs a generator under a deadline and maps every failure to
/// [`FALLBACK_FEEDBACK`].
#[derive(Clone)]
pub struct FeedbackOrchestrator {
    generator: Arc<dyn FeedbackGenerator>,
    timeout: Duration,
}

impl FeedbackOrchestrator {
    #[must_use]
    pub fn new(generator: Arc<dyn FeedbackGenerator>) -> Self {
        Self {
            generator,
            timeout: DEFAULT_FEEDBACK_TIMEOUT,
        }
    }

    /// Like [`FeedbackOrchestrator::new`], with the deadline taken from
    /// `PROCTOR_FEEDBACK_TIMEOUT_SECS` when it holds a positive integer.
    #[must_use]
    pub fn from_env(generator: Arc<dyn FeedbackGenerator>) -> Self {
        let orchestrator = Self::new(generator);
        match env::var("PROCTOR_FEEDBACK_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            Some(secs) => orchestrator.with_timeout(Duration::from_secs(secs)),
            None => orchestrator,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call the generator once and return displayable text. Never fails.
    pub async fn generate_or_fallback(&self, request: &FeedbackRequest) -> String {
        match tokio::time::timeout(self.timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!("feedback generator returned blank text");
                FALLBACK_FEEDBACK.to_string()
            }
            Ok(Err(err)) => {
                warn!(error = %err, "feedback generation failed");
                FALLBACK_FEEDBACK.to_string()
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "feedback generation timed out");
                FALLBACK_FEEDBACK.to_string()
            }
        }
    }

    /// Start generation in the background. Must be called from within a
    /// tokio runtime.
    #[must_use]
    pub fn spawn(&self, request: FeedbackRequest) -> FeedbackTask {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!("feedback request cancelled");
                    FALLBACK_FEEDBACK.to_string()
                }
                text = orchestrator.generate_or_fallback(&request) => text,
            }
        });
        FeedbackTask {
            handle: Some(handle),
            cancel,
        }
    }
}

/// Handle to an in-flight feedback request. Dropping it cancels the request.
#[derive(Debug)]
pub struct FeedbackTask {
    handle: Option<JoinHandle<String>>,
    cancel: CancellationToken,
}

impl FeedbackTask {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the text. A cancelled or panicked task yields the fallback.
    pub async fn resolve(mut self) -> String {
        let Some(handle) = self.handle.take() else {
            return FALLBACK_FEEDBACK.to_string();
        };
        match handle.await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "feedback task did not complete");
                FALLBACK_FEEDBACK.to_string()
            }
        }
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for FeedbackTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proctor_core::model::{Difficulty, Question, QuestionId};

    use super::*;

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct StubGenerator {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FeedbackGenerator for StubGenerator {
        async fn generate(&self, _request: &FeedbackRequest) -> Result<String, FeedbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Reply(text) => Ok(text.to_string()),
                Behaviour::Fail => Err(FeedbackError::Service("boom".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("late".into())
                }
            }
        }
    }

    fn request() -> FeedbackRequest {
        let question = Question::new(
            QuestionId::new(1),
            "1 + 1?",
            vec!["1".into(), "2".into()],
            1,
            "Um mais um.",
            Difficulty::Easy,
        )
        .unwrap();
        FeedbackRequest {
            subject: Subject::new("Matemática").unwrap(),
            questions: QuestionSet::new(vec![question]).unwrap(),
            answers: AnswerSet::from_raw(&[1]).unwrap(),
        }
    }

    #[tokio::test]
    async fn successful_generation_passes_text_through() {
        let generator = StubGenerator::new(Behaviour::Reply("Muito bem!"));
        let orchestrator = FeedbackOrchestrator::new(generator.clone());
        let text = orchestrator.spawn(request()).resolve().await;
        assert_eq!(text, "Muito bem!");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_and_blank_text_become_fallback() {
        let failing = FeedbackOrchestrator::new(StubGenerator::new(Behaviour::Fail));
        assert_eq!(
            failing.generate_or_fallback(&request()).await,
            FALLBACK_FEEDBACK
        );

        let blank = FeedbackOrchestrator::new(StubGenerator::new(Behaviour::Reply("   ")));
        assert_eq!(blank.generate_or_fallback(&request()).await, FALLBACK_FEEDBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_generator_times_out_to_fallback() {
        let orchestrator = FeedbackOrchestrator::new(StubGenerator::new(Behaviour::Hang))
            .with_timeout(Duration::from_secs(20));
        let task = orchestrator.spawn(request());
        assert!(task.is_pending());
        assert_eq!(task.resolve().await, FALLBACK_FEEDBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_signal_the_running_task() {
        let orchestrator = FeedbackOrchestrator::new(StubGenerator::new(Behaviour::Hang));

        let task = orchestrator.spawn(request());
        let token = task.cancel.clone();
        tokio::task::yield_now().await;
        task.cancel();
        assert!(token.is_cancelled());

        let task = orchestrator.spawn(request());
        let token = task.cancel.clone();
        drop(task);
        assert!(token.is_cancelled());
    }
}
