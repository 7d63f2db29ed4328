use chrono::{DateTime, Utc};
use proctor_core::integrity::AttentionSignal;
use proctor_core::model::{
    AssessmentKey, AssessmentResult, GradeLevel, Question, ResultId, SessionId,
};
use proctor_core::scorer::{self, QuestionReview};
use proctor_core::session::{AssessmentSession, SessionPhase};

use super::attention::AttentionSubscription;
use super::progress::SessionProgress;
use super::view::{FeedbackStatus, QuestionView, ResultView};
use crate::feedback::FeedbackTask;

//
// ─── COMPLETION ───────────────────────────────────────────────────────────────
//

/// Set once the session reaches a terminal phase.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) result: AssessmentResult,
    pub(crate) result_id: Option<ResultId>,
    pub(crate) feedback: Option<FeedbackTask>,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One student's run through a question set, with its attention
/// subscription and, once terminal, its result and feedback task.
///
/// Driven through [`super::AssessmentService`]; dropping it detaches the
/// subscription and cancels any outstanding feedback request.
#[derive(Debug)]
pub struct ProctoredSession {
    id: SessionId,
    key: AssessmentKey,
    grade: GradeLevel,
    started_at: DateTime<Utc>,
    machine: AssessmentSession,
    subscription: Option<AttentionSubscription>,
    completion: Option<Completion>,
}

impl ProctoredSession {
    pub(crate) fn new(
        key: AssessmentKey,
        grade: GradeLevel,
        machine: AssessmentSession,
        subscription: Option<AttentionSubscription>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::random(),
            key,
            grade,
            started_at,
            machine,
            subscription,
            completion: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> &AssessmentKey {
        &self.key
    }

    #[must_use]
    pub fn grade(&self) -> GradeLevel {
        self.grade
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.machine.is_terminal()
    }

    /// Read access to the underlying state machine.
    #[must_use]
    pub fn state(&self) -> &AssessmentSession {
        &self.machine
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.machine.current_question()
    }

    #[must_use]
    pub fn is_monitored(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answers = self.machine.answers();
        SessionProgress {
            total: answers.len(),
            answered: answers.answered_count(),
            current: self.machine.current_index(),
            strikes: self.machine.strikes(),
            strike_threshold: self.machine.strike_threshold(),
            is_complete: answers.is_complete(),
        }
    }

    /// `None` once the session is terminal.
    #[must_use]
    pub fn question_view(&self) -> Option<QuestionView> {
        if self.machine.is_terminal() {
            return None;
        }
        let question = self.machine.current_question()?;
        let index = self.machine.current_index();
        let last = self.machine.last_index();
        let answers = self.machine.answers();
        let selected = answers.get(index);
        Some(QuestionView {
            index,
            total: answers.len(),
            prompt: question.prompt().to_string(),
            options: question.options().to_vec(),
            selected,
            can_retreat: index > 0,
            can_advance: index < last && selected.is_some(),
            can_finish: index == last && answers.is_complete(),
        })
    }

    #[must_use]
    pub fn result(&self) -> Option<&AssessmentResult> {
        self.completion.as_ref().map(|c| &c.result)
    }

    /// Id assigned by storage. `None` for mock sessions or before persistence.
    #[must_use]
    pub fn result_id(&self) -> Option<ResultId> {
        self.completion.as_ref().and_then(|c| c.result_id)
    }

    #[must_use]
    pub fn feedback_status(&self) -> FeedbackStatus {
        let Some(completion) = &self.completion else {
            return FeedbackStatus::NotRequested;
        };
        if let Some(text) = completion.result.feedback() {
            return FeedbackStatus::Ready(text.to_string());
        }
        if completion.feedback.is_some() {
            FeedbackStatus::Pending
        } else {
            FeedbackStatus::NotRequested
        }
    }

    /// Result screen for a finished session. Blocked sessions have none.
    #[must_use]
    pub fn result_view(&self) -> Option<ResultView> {
        let SessionPhase::Finished { score } = self.machine.phase() else {
            return None;
        };
        let review: Vec<QuestionReview> =
            scorer::review(self.machine.questions().as_slice(), self.machine.answers())
                .unwrap_or_default();
        Some(ResultView {
            score,
            review,
            feedback: self.feedback_status(),
        })
    }

    /// Wait for the next attention signal without applying it. `None` when
    /// the session is not monitored or the source has gone away. Cancel safe,
    /// so it can sit in a `tokio::select!` next to student input; hand the
    /// signal to [`super::AssessmentService::signal`].
    pub async fn next_signal(&mut self) -> Option<AttentionSignal> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => None,
        }
    }

    // ─── crate-internal plumbing for the workflow ───

    pub(crate) fn machine_mut(&mut self) -> &mut AssessmentSession {
        &mut self.machine
    }

    pub(crate) fn next_queued_signal(&mut self) -> Option<AttentionSignal> {
        self.subscription.as_mut().and_then(AttentionSubscription::try_next)
    }


    pub(crate) fn detach_attention(&mut self) {
        self.subscription = None;
    }

    pub(crate) fn complete(&mut self, result: AssessmentResult, feedback: Option<FeedbackTask>) {
        self.completion = Some(Completion {
            result,
            result_id: None,
            feedback,
        });
    }

    pub(crate) fn completion_mut(&mut self) -> Option<&mut Completion> {
        self.completion.as_mut()
    }

    pub(crate) fn take_feedback(&mut self) -> Option<FeedbackTask> {
        self.completion.as_mut().and_then(|c| c.feedback.take())
    }
}
