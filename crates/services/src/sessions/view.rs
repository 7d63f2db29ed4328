use proctor_core::scorer::{QuestionReview, Score};

/// What the answering screen renders for the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub can_retreat: bool,
    pub can_advance: bool,
    pub can_finish: bool,
}

/// Feedback state as shown on the result screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackStatus {
    /// Blocked sessions never request feedback.
    NotRequested,
    Pending,
    Ready(String),
}

/// Result screen: score first, feedback when it arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub score: Score,
    pub review: Vec<QuestionReview>,
    pub feedback: FeedbackStatus,
}

/// Terminal notice shown after a lockout. It has no dismiss action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutNotice {
    pub strikes: u32,
    pub title: String,
    pub message: String,
}

impl LockoutNotice {
    #[must_use]
    pub fn new(strikes: u32) -> Self {
        Self {
            strikes,
            title: "Avaliação bloqueada".to_string(),
            message: format!(
                "Você saiu da tela da avaliação {strikes} vezes. Sua avaliação foi encerrada \
                 e sua conta foi bloqueada até que um administrador revise o ocorrido."
            ),
        }
    }
}
