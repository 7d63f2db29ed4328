use std::sync::Arc;

use proctor_core::Clock;
use proctor_core::integrity::{AttentionSignal, StrikePolicy};
use proctor_core::model::{
    AccountLock, AssessmentKey, GradeLevel, QuestionSet, QuestionSetKey, Quarter, SessionMode,
    StudentId, Subject,
};
use proctor_core::scorer::Score;
use proctor_core::session::{AssessmentSession, SessionEvent, SessionOutcome};
use storage::repository::{AccountLockRepository, AssessmentResultRepository, QuestionBank};
use tracing::{debug, error, info, warn};

use super::attention::{AttentionSource, AttentionSubscription};
use super::service::ProctoredSession;
use super::view::LockoutNotice;
use crate::error::AssessmentError;
use crate::feedback::{FeedbackOrchestrator, FeedbackRequest};

/// Parameters for opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub student: StudentId,
    pub subject: Subject,
    pub grade: GradeLevel,
    pub quarter: Quarter,
    pub mode: SessionMode,
}

impl StartRequest {
    fn question_set_key(&self) -> QuestionSetKey {
        QuestionSetKey {
            subject: self.subject.clone(),
            grade: self.grade,
            quarter: self.quarter,
            mode: self.mode,
        }
    }

    fn assessment_key(&self) -> AssessmentKey {
        AssessmentKey {
            student: self.student,
            subject: self.subject.clone(),
            quarter: self.quarter,
            mode: self.mode,
        }
    }
}

/// What the caller should render after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The session is still in progress; includes rejections and strikes.
    Progress(SessionOutcome),
    /// Score is final. Feedback is requested in the background.
    Finished { score: Score },
    /// The student was locked out. Nothing else may be shown.
    LockedOut(LockoutNotice),
}

/// Orchestrates session start, event handling, persistence and feedback.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    questions: Arc<dyn QuestionBank>,
    results: Arc<dyn AssessmentResultRepository>,
    locks: Arc<dyn AccountLockRepository>,
    attention: Arc<dyn AttentionSource>,
    feedback: FeedbackOrchestrator,
    policy: StrikePolicy,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionBank>,
        results: Arc<dyn AssessmentResultRepository>,
        locks: Arc<dyn AccountLockRepository>,
        attention: Arc<dyn AttentionSource>,
        feedback: FeedbackOrchestrator,
    ) -> Self {
        Self {
            clock,
            questions,
            results,
            locks,
            attention,
            feedback,
            policy: StrikePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_strike_policy(mut self, policy: StrikePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn strike_policy(&self) -> StrikePolicy {
        self.policy
    }

    /// Open a session. Official sessions check the account lock and any
    /// existing result first, then subscribe to attention signals.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AccountLocked`, `AlreadySubmitted` or
    /// `QuestionsUnavailable` when the session may not start, and
    /// `AssessmentError::Storage` for backend failures.
    pub async fn start_session(
        &self,
        request: &StartRequest,
    ) -> Result<ProctoredSession, AssessmentError> {
        let key = request.assessment_key();

        if request.mode.is_official() {
            if let Some(lock) = self.locks.get_lock(request.student).await? {
                warn!(student = %request.student, strikes = lock.strikes, "locked account tried to start");
                return Err(AssessmentError::AccountLocked {
                    strikes: lock.strikes,
                });
            }
            if self.results.find_result(&key).await?.is_some() {
                return Err(AssessmentError::AlreadySubmitted);
            }
        }

        let questions = self
            .questions
            .get_question_set(&request.question_set_key())
            .await?
            .filter(|qs| !qs.is_empty())
            .ok_or_else(|| AssessmentError::QuestionsUnavailable {
                subject: request.subject.to_string(),
                grade: request.grade.value(),
                quarter: request.quarter.number(),
            })?;
        let questions = QuestionSet::new(questions)?;

        let machine = AssessmentSession::new(questions, request.mode, self.policy);
        let subscription = machine
            .monitor_active()
            .then(|| AttentionSubscription::open(self.attention.clone()));
        let session = ProctoredSession::new(
            key,
            request.grade,
            machine,
            subscription,
            self.clock.now(),
        );

        info!(
            session = %session.id(),
            student = %request.student,
            subject = %request.subject,
            quarter = request.quarter.number(),
            mode = request.mode.as_str(),
            questions = session.state().questions().len(),
            "assessment session started"
        );
        Ok(session)
    }

    /// Apply one student event. Attention signals queued since the last
    /// call are processed first, so a lockout takes precedence.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Session` for events on a terminal session or
    /// out-of-range indices, and `AssessmentError::Storage` when a terminal
    /// result cannot be persisted. The session stays terminal in that case.
    pub async fn apply(
        &self,
        session: &mut ProctoredSession,
        event: SessionEvent,
    ) -> Result<SessionUpdate, AssessmentError> {
        if let Some(notice) = self.poll_attention(session).await? {
            return Ok(SessionUpdate::LockedOut(notice));
        }
        let outcome = session.machine_mut().apply(event)?;
        self.settle(session, outcome).await
    }

    /// # Errors
    ///
    /// See [`AssessmentService::apply`].
    pub async fn select_answer(
        &self,
        session: &mut ProctoredSession,
        question: usize,
        option: usize,
    ) -> Result<SessionUpdate, AssessmentError> {
        self.apply(session, SessionEvent::SelectAnswer { question, option })
            .await
    }

    /// # Errors
    ///
    /// See [`AssessmentService::apply`].
    pub async fn advance(
        &self,
        session: &mut ProctoredSession,
    ) -> Result<SessionUpdate, AssessmentError> {
        self.apply(session, SessionEvent::Advance).await
    }

    /// # Errors
    ///
    /// See [`AssessmentService::apply`].
    pub async fn retreat(
        &self,
        session: &mut ProctoredSession,
    ) -> Result<SessionUpdate, AssessmentError> {
        self.apply(session, SessionEvent::Retreat).await
    }

    /// # Errors
    ///
    /// See [`AssessmentService::apply`].
    pub async fn finish(
        &self,
        session: &mut ProctoredSession,
    ) -> Result<SessionUpdate, AssessmentError> {
        self.apply(session, SessionEvent::Finish).await
    }

    /// Deliver a signal directly, bypassing the subscription queue.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` when a lockout cannot be persisted.
    pub async fn signal(
        &self,
        session: &mut ProctoredSession,
        signal: AttentionSignal,
    ) -> Result<SessionUpdate, AssessmentError> {
        let outcome = session.machine_mut().observe(signal);
        self.settle(session, outcome).await
    }

    /// Drain queued attention signals. Returns the notice if they caused a
    /// lockout.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` when a lockout cannot be persisted.
    pub async fn poll_attention(
        &self,
        session: &mut ProctoredSession,
    ) -> Result<Option<LockoutNotice>, AssessmentError> {
        while let Some(signal) = session.next_queued_signal() {
            let outcome = session.machine_mut().observe(signal);
            if let SessionUpdate::LockedOut(notice) = self.settle(session, outcome).await? {
                return Ok(Some(notice));
            }
        }
        Ok(None)
    }

    /// Wait for the next attention signal and apply it. Returns `None` when
    /// the session is not monitored or the source has gone away.
    ///
    /// Not cancel safe once a signal has arrived: dropping the future while a
    /// lockout is being persisted loses the write. Inside `tokio::select!`,
    /// await [`ProctoredSession::next_signal`] instead.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` when a lockout cannot be persisted.
    pub async fn next_attention(
        &self,
        session: &mut ProctoredSession,
    ) -> Result<Option<SessionUpdate>, AssessmentError> {
        let Some(signal) = session.next_signal().await else {
            return Ok(None);
        };
        self.signal(session, signal).await.map(Some)
    }

    /// Wait for feedback, store it on the result and return it. `None` when
    /// the session never requested feedback. A failed feedback write is
    /// logged and the text is still returned.
    pub async fn await_feedback(&self, session: &mut ProctoredSession) -> Option<String> {
        let session_id = session.id();
        let completion = session.completion_mut()?;
        if let Some(text) = completion.result.feedback() {
            return Some(text.to_string());
        }
        let task = completion.feedback.take()?;
        let text = task.resolve().await;
        completion.result.attach_feedback(text.clone());

        if let Some(id) = completion.result_id {
            if let Err(err) = self.results.attach_feedback(id, &text).await {
                warn!(session = %session_id, result = %id, error = %err, "failed to store feedback");
            }
        }
        debug!(session = %session_id, "feedback attached");
        Some(text)
    }

    /// Leave a session without submitting. Nothing is persisted.
    pub fn abandon(&self, mut session: ProctoredSession) {
        session.machine_mut().teardown();
        session.detach_attention();
        if let Some(task) = session.take_feedback() {
            task.cancel();
        }
        info!(session = %session.id(), phase = session.phase().label(), "assessment session abandoned");
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` for backend failures.
    pub async fn account_lock(
        &self,
        student: StudentId,
    ) -> Result<Option<AccountLock>, AssessmentError> {
        Ok(self.locks.get_lock(student).await?)
    }

    /// Administrator action after reviewing a lockout.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` (`NotFound` when not locked).
    pub async fn clear_account_lock(&self, student: StudentId) -> Result<(), AssessmentError> {
        self.locks.clear_lock(student).await?;
        info!(student = %student, "account lock cleared");
        Ok(())
    }

    //
    // ─── TERMINAL TRANSITIONS ─────────────────────────────────────────────────
    //

    async fn settle(
        &self,
        session: &mut ProctoredSession,
        outcome: SessionOutcome,
    ) -> Result<SessionUpdate, AssessmentError> {
        match outcome {
            SessionOutcome::Finished { score } => {
                self.close_finished(session, score).await?;
                Ok(SessionUpdate::Finished { score })
            }
            SessionOutcome::Blocked { strikes } => {
                let notice = self.close_blocked(session, strikes).await?;
                Ok(SessionUpdate::LockedOut(notice))
            }
            SessionOutcome::Strike { count } => {
                warn!(
                    session = %session.id(),
                    strikes = count,
                    threshold = self.policy.threshold(),
                    "attention strike recorded"
                );
                Ok(SessionUpdate::Progress(outcome))
            }
            other => Ok(SessionUpdate::Progress(other)),
        }
    }

    async fn close_finished(
        &self,
        session: &mut ProctoredSession,
        score: Score,
    ) -> Result<(), AssessmentError> {
        session.detach_attention();
        let result = session
            .state()
            .result(session.key().clone(), self.clock.now())?;
        info!(session = %session.id(), score = %score, "assessment finished");

        let task = self.feedback.spawn(FeedbackRequest {
            subject: session.key().subject.clone(),
            questions: session.state().questions().clone(),
            answers: session.state().answers().clone(),
        });
        let official = session.key().mode.is_official();
        session.complete(result.clone(), Some(task));

        if official {
            let id = self.results.append_result(&result).await.map_err(|err| {
                error!(session = %session.id(), error = %err, "failed to persist result");
                err
            })?;
            if let Some(completion) = session.completion_mut() {
                completion.result_id = Some(id);
            }
        }
        Ok(())
    }

    async fn close_blocked(
        &self,
        session: &mut ProctoredSession,
        strikes: u32,
    ) -> Result<LockoutNotice, AssessmentError> {
        session.detach_attention();
        let now = self.clock.now();
        let result = session.state().result(session.key().clone(), now)?;
        warn!(session = %session.id(), student = %session.key().student, strikes, "session blocked");
        session.complete(result.clone(), None);

        if session.key().mode.is_official() {
            let key = session.key();
            let lock = AccountLock {
                student: key.student,
                subject: key.subject.clone(),
                quarter: key.quarter,
                strikes,
                locked_at: now,
            };
            self.locks.lock_account(&lock).await.map_err(|err| {
                error!(session = %session.id(), error = %err, "failed to lock account");
                err
            })?;
            let id = self.results.append_result(&result).await.map_err(|err| {
                error!(session = %session.id(), error = %err, "failed to persist blocked result");
                err
            })?;
            if let Some(completion) = session.completion_mut() {
                completion.result_id = Some(id);
            }
        }
        Ok(LockoutNotice::new(strikes))
    }
}
