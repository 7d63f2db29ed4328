//! Assessment session state machine.
//!
//! `InProgress` is the only non-terminal phase. `Finished` is reached through
//! [`AssessmentSession::finish`]; `Blocked` only through the integrity monitor.
//! Every mutation goes through [`AssessmentSession::apply`], so the set of
//! mutation sites is exactly the set of [`SessionEvent`] variants.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::integrity::{AttentionSignal, IntegrityMonitor, MonitorVerdict, StrikePolicy};
use crate::model::{AnswerSet, AssessmentKey, AssessmentResult, Question, QuestionSet, SessionMode};
use crate::scorer::{self, Score, ScoreError};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Misuse of the session. Incomplete answers are not errors; see [`Rejection`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is {phase} and accepts no further input")]
    Terminal { phase: &'static str },

    #[error("question {index} is outside 0..{len}")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("option {option} is outside 0..{len} for question {question}")]
    OptionOutOfRange {
        question: usize,
        option: usize,
        len: usize,
    },

    #[error("session is still in progress")]
    NotTerminal,

    #[error(transparent)]
    Score(#[from] ScoreError),
}

//
// ─── PHASE / EVENTS / OUTCOMES ────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress,
    Blocked { strikes: u32 },
    Finished { score: Score },
}

impl SessionPhase {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionPhase::InProgress)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::InProgress => "in progress",
            SessionPhase::Blocked { .. } => "blocked",
            SessionPhase::Finished { .. } => "finished",
        }
    }
}

/// Every input the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SelectAnswer { question: usize, option: usize },
    Advance,
    Retreat,
    Finish,
    Attention(AttentionSignal),
}

/// A transition the session refused. Nothing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    CurrentUnanswered,
    AtFirstQuestion,
    AtLastQuestion,
    NotAtLastQuestion,
    Incomplete { unanswered: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Answered { question: usize, option: usize },
    Moved { index: usize },
    Rejected(Rejection),
    Strike { count: u32 },
    /// Signal arrived while the monitor was not attached.
    Ignored,
    Finished { score: Score },
    Blocked { strikes: u32 },
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct AssessmentSession {
    questions: QuestionSet,
    mode: SessionMode,
    phase: SessionPhase,
    index: usize,
    answers: AnswerSet,
    monitor: IntegrityMonitor,
    abandoned: bool,
}

impl AssessmentSession {
    /// Start a session on the given question set. The monitor attaches only
    /// for official sessions.
    #[must_use]
    pub fn new(questions: QuestionSet, mode: SessionMode, policy: StrikePolicy) -> Self {
        let answers = AnswerSet::unanswered(questions.len());
        let mut monitor = IntegrityMonitor::new(policy);
        if mode.is_official() {
            monitor.attach();
        }
        Self {
            questions,
            mode,
            phase: SessionPhase::InProgress,
            index: 0,
            answers,
            monitor,
            abandoned: false,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    #[must_use]
    pub fn strikes(&self) -> u32 {
        self.monitor.strikes()
    }

    #[must_use]
    pub fn strike_threshold(&self) -> u32 {
        self.monitor.policy().threshold()
    }

    /// True iff official and in progress.
    #[must_use]
    pub fn monitor_active(&self) -> bool {
        self.monitor.is_active()
    }

    /// Terminal phase reached, or the session was torn down.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.abandoned || self.phase.is_terminal()
    }

    /// # Errors
    ///
    /// Returns `SessionError` when the event is applied to a terminal session
    /// or addresses a question/option that does not exist.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionOutcome, SessionError> {
        if let SessionEvent::Attention(signal) = event {
            return Ok(self.observe(signal));
        }
        self.ensure_in_progress()?;

        match event {
            SessionEvent::SelectAnswer { question, option } => self.select(question, option),
            SessionEvent::Advance => Ok(self.step_forward()),
            SessionEvent::Retreat => Ok(self.step_back()),
            SessionEvent::Finish => self.complete(),
            SessionEvent::Attention(_) => Ok(SessionOutcome::Ignored),
        }
    }

    /// # Errors
    ///
    /// See [`AssessmentSession::apply`].
    pub fn select_answer(
        &mut self,
        question: usize,
        option: usize,
    ) -> Result<SessionOutcome, SessionError> {
        self.apply(SessionEvent::SelectAnswer { question, option })
    }

    /// # Errors
    ///
    /// See [`AssessmentSession::apply`].
    pub fn advance(&mut self) -> Result<SessionOutcome, SessionError> {
        self.apply(SessionEvent::Advance)
    }

    /// # Errors
    ///
    /// See [`AssessmentSession::apply`].
    pub fn retreat(&mut self) -> Result<SessionOutcome, SessionError> {
        self.apply(SessionEvent::Retreat)
    }

    /// # Errors
    ///
    /// See [`AssessmentSession::apply`].
    pub fn finish(&mut self) -> Result<SessionOutcome, SessionError> {
        self.apply(SessionEvent::Finish)
    }

    /// Feed one attention signal to the monitor.
    pub fn observe(&mut self, signal: AttentionSignal) -> SessionOutcome {
        match self.monitor.record(signal) {
            MonitorVerdict::Ignored => SessionOutcome::Ignored,
            MonitorVerdict::Strike { count } => SessionOutcome::Strike { count },
            MonitorVerdict::Lockout { count } => self.force_block(count),
        }
    }

    /// Abandon the session: the monitor detaches and all further input is
    /// refused. The phase stays `InProgress`, so no result can be built.
    pub fn teardown(&mut self) {
        self.monitor.tear_down();
        self.abandoned = true;
    }

    /// Build the record handed to persistence.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotTerminal` while the session is in progress.
    pub fn result(
        &self,
        key: AssessmentKey,
        recorded_at: DateTime<Utc>,
    ) -> Result<AssessmentResult, SessionError> {
        let total = u32::try_from(self.questions.len())
            .map_err(|_| ScoreError::TooManyQuestions(self.questions.len()))?;
        match self.phase {
            SessionPhase::InProgress => Err(SessionError::NotTerminal),
            SessionPhase::Finished { score } => Ok(AssessmentResult::completed(
                key,
                score,
                self.answers.clone(),
                self.strikes(),
                recorded_at,
            )),
            SessionPhase::Blocked { strikes } => Ok(AssessmentResult::blocked(
                key,
                total,
                self.answers.clone(),
                strikes,
                recorded_at,
            )),
        }
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.abandoned {
            return Err(SessionError::Terminal { phase: "abandoned" });
        }
        if self.phase.is_terminal() {
            return Err(SessionError::Terminal {
                phase: self.phase.label(),
            });
        }
        Ok(())
    }

    fn select(&mut self, question: usize, option: usize) -> Result<SessionOutcome, SessionError> {
        let len = self.questions.len();
        let q = self
            .questions
            .get(question)
            .ok_or(SessionError::QuestionOutOfRange {
                index: question,
                len,
            })?;
        if option >= q.options().len() {
            return Err(SessionError::OptionOutOfRange {
                question,
                option,
                len: q.options().len(),
            });
        }
        self.answers.set(question, option);
        Ok(SessionOutcome::Answered { question, option })
    }

    fn step_forward(&mut self) -> SessionOutcome {
        if !self.answers.is_answered(self.index) {
            return SessionOutcome::Rejected(Rejection::CurrentUnanswered);
        }
        if self.index >= self.last_index() {
            return SessionOutcome::Rejected(Rejection::AtLastQuestion);
        }
        self.index += 1;
        SessionOutcome::Moved { index: self.index }
    }

    fn step_back(&mut self) -> SessionOutcome {
        if self.index == 0 {
            return SessionOutcome::Rejected(Rejection::AtFirstQuestion);
        }
        self.index -= 1;
        SessionOutcome::Moved { index: self.index }
    }

    fn complete(&mut self) -> Result<SessionOutcome, SessionError> {
        if self.index != self.last_index() {
            return Ok(SessionOutcome::Rejected(Rejection::NotAtLastQuestion));
        }
        if !self.answers.is_complete() {
            return Ok(SessionOutcome::Rejected(Rejection::Incomplete {
                unanswered: self.answers.unanswered_indices(),
            }));
        }

        let score = scorer::score(self.questions.as_slice(), &self.answers)?;
        self.phase = SessionPhase::Finished { score };
        self.monitor.tear_down();
        Ok(SessionOutcome::Finished { score })
    }

    fn force_block(&mut self, strikes: u32) -> SessionOutcome {
        if self.phase.is_terminal() {
            return SessionOutcome::Ignored;
        }
        self.phase = SessionPhase::Blocked { strikes };
        self.monitor.tear_down();
        SessionOutcome::Blocked { strikes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuestionId, Quarter, StudentId, Subject};
    use crate::time::fixed_now;

    const CORRECT: [usize; 5] = [0, 1, 2, 3, 0];

    fn question_set() -> QuestionSet {
        let questions = CORRECT
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Question::new(
                    QuestionId::new(i as u64 + 1),
                    format!("Pergunta {}", i + 1),
                    vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    c,
                    "",
                    Difficulty::Easy,
                )
                .unwrap()
            })
            .collect();
        QuestionSet::new(questions).unwrap()
    }

    fn official() -> AssessmentSession {
        AssessmentSession::new(question_set(), SessionMode::Official, StrikePolicy::default())
    }

    fn mock() -> AssessmentSession {
        AssessmentSession::new(question_set(), SessionMode::Mock, StrikePolicy::default())
    }

    fn answer_all(session: &mut AssessmentSession, picks: &[usize]) {
        for (i, &pick) in picks.iter().enumerate() {
            session.select_answer(i, pick).unwrap();
            if i + 1 < picks.len() {
                assert_eq!(
                    session.advance().unwrap(),
                    SessionOutcome::Moved { index: i + 1 }
                );
            }
        }
    }

    fn key() -> AssessmentKey {
        AssessmentKey {
            student: StudentId::new(1),
            subject: Subject::new("Ciências").unwrap(),
            quarter: Quarter::First,
            mode: SessionMode::Official,
        }
    }

    #[test]
    fn perfect_official_session_scores_five() {
        let mut session = official();
        answer_all(&mut session, &CORRECT);
        let outcome = session.finish().unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Finished {
                score: Score::new(5, 5)
            }
        );
        assert!(session.is_terminal());
        assert!(!session.monitor_active());
    }

    #[test]
    fn advance_is_rejected_while_current_unanswered() {
        let mut session = official();
        assert_eq!(
            session.advance().unwrap(),
            SessionOutcome::Rejected(Rejection::CurrentUnanswered)
        );
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn retreat_allowed_everywhere_but_first() {
        let mut session = official();
        assert_eq!(
            session.retreat().unwrap(),
            SessionOutcome::Rejected(Rejection::AtFirstQuestion)
        );
        session.select_answer(0, 1).unwrap();
        session.advance().unwrap();
        // no answer on question 1 needed to go back
        assert_eq!(session.retreat().unwrap(), SessionOutcome::Moved { index: 0 });
    }

    #[test]
    fn advance_stops_at_last_question() {
        let mut session = official();
        answer_all(&mut session, &CORRECT);
        assert_eq!(
            session.advance().unwrap(),
            SessionOutcome::Rejected(Rejection::AtLastQuestion)
        );
        assert_eq!(session.current_index(), 4);
    }

    #[test]
    fn finish_requires_last_question_and_complete_answers() {
        let mut session = official();
        session.select_answer(0, 0).unwrap();
        assert_eq!(
            session.finish().unwrap(),
            SessionOutcome::Rejected(Rejection::NotAtLastQuestion)
        );

        for i in 0..4 {
            session.select_answer(i, 0).unwrap();
            session.advance().unwrap();
        }
        assert_eq!(session.current_index(), 4);
        assert_eq!(
            session.finish().unwrap(),
            SessionOutcome::Rejected(Rejection::Incomplete {
                unanswered: vec![4]
            })
        );
        assert_eq!(session.phase(), SessionPhase::InProgress);

        session.select_answer(4, 0).unwrap();
        assert!(matches!(
            session.finish().unwrap(),
            SessionOutcome::Finished { .. }
        ));
    }

    #[test]
    fn reanswering_changes_only_that_slot() {
        let mut session = official();
        answer_all(&mut session, &CORRECT);
        session.select_answer(2, 0).unwrap();
        assert_eq!(session.answers().to_raw(), vec![0, 1, 0, 3, 0]);
        assert_eq!(session.current_index(), 4);
        assert_eq!(
            session.finish().unwrap(),
            SessionOutcome::Finished {
                score: Score::new(4, 5)
            }
        );
    }

    #[test]
    fn out_of_range_selection_is_an_error() {
        let mut session = official();
        assert_eq!(
            session.select_answer(0, 4).unwrap_err(),
            SessionError::OptionOutOfRange {
                question: 0,
                option: 4,
                len: 4
            }
        );
        assert_eq!(
            session.select_answer(5, 0).unwrap_err(),
            SessionError::QuestionOutOfRange { index: 5, len: 5 }
        );
    }

    #[test]
    fn six_strikes_block_exactly_once() {
        let mut session = official();
        for k in 1..6 {
            assert_eq!(
                session.observe(AttentionSignal::FocusLost),
                SessionOutcome::Strike { count: k }
            );
            assert_eq!(session.phase(), SessionPhase::InProgress);
        }
        assert_eq!(
            session.observe(AttentionSignal::FocusLost),
            SessionOutcome::Blocked { strikes: 6 }
        );
        assert_eq!(session.phase(), SessionPhase::Blocked { strikes: 6 });
        assert_eq!(session.observe(AttentionSignal::SurfaceHidden), SessionOutcome::Ignored);
        assert_eq!(session.strikes(), 6);
    }

    #[test]
    fn blocked_session_rejects_all_input() {
        let mut session = official();
        for _ in 0..6 {
            session.observe(AttentionSignal::SurfaceHidden);
        }
        assert_eq!(
            session.select_answer(0, 0).unwrap_err(),
            SessionError::Terminal { phase: "blocked" }
        );
        assert!(session.advance().is_err());
        assert!(session.retreat().is_err());
        assert!(session.finish().is_err());
    }

    #[test]
    fn blocked_result_has_zero_score_and_review_flag() {
        let mut session = official();
        answer_all(&mut session, &CORRECT);
        for _ in 0..6 {
            session.observe(AttentionSignal::FocusLost);
        }
        let result = session.result(key(), fixed_now()).unwrap();
        assert_eq!(result.score().correct(), 0);
        assert!(result.needs_review());
        assert_eq!(result.strikes(), 6);
    }

    #[test]
    fn mock_sessions_are_never_blocked() {
        let mut session = mock();
        assert!(!session.monitor_active());
        for _ in 0..50 {
            assert_eq!(session.observe(AttentionSignal::SurfaceHidden), SessionOutcome::Ignored);
            assert_eq!(session.observe(AttentionSignal::FocusLost), SessionOutcome::Ignored);
        }
        assert_eq!(session.phase(), SessionPhase::InProgress);
        answer_all(&mut session, &CORRECT);
        assert!(matches!(session.finish().unwrap(), SessionOutcome::Finished { .. }));
    }

    #[test]
    fn signals_after_finish_are_not_counted() {
        let mut session = official();
        session.observe(AttentionSignal::FocusLost);
        answer_all(&mut session, &CORRECT);
        session.finish().unwrap();
        assert_eq!(session.observe(AttentionSignal::FocusLost), SessionOutcome::Ignored);
        assert_eq!(session.strikes(), 1);
    }

    #[test]
    fn teardown_stops_counting_without_changing_phase() {
        let mut session = official();
        session.teardown();
        assert_eq!(session.observe(AttentionSignal::FocusLost), SessionOutcome::Ignored);
        assert_eq!(session.phase(), SessionPhase::InProgress);
    }

    #[test]
    fn torn_down_session_refuses_input_and_cannot_finish() {
        let mut session = official();
        session.select_answer(0, 0).unwrap();
        session.teardown();
        assert!(session.is_terminal());
        assert!(!session.monitor_active());

        for _ in 0..10 {
            assert_eq!(session.observe(AttentionSignal::FocusLost), SessionOutcome::Ignored);
        }
        let abandoned = SessionError::Terminal { phase: "abandoned" };
        assert_eq!(session.select_answer(1, 0).unwrap_err(), abandoned);
        assert_eq!(session.advance().unwrap_err(), abandoned);
        assert_eq!(session.finish().unwrap_err(), abandoned);
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.strikes(), 0);
        assert_eq!(
            session.result(key(), fixed_now()).unwrap_err(),
            SessionError::NotTerminal
        );
    }

    #[test]
    fn result_is_unavailable_while_in_progress() {
        let session = official();
        assert_eq!(
            session.result(key(), fixed_now()).unwrap_err(),
            SessionError::NotTerminal
        );
    }
}
