//! Line-oriented terminal surface for one assessment session.

use std::fmt::Write as _;
use std::io::Write as _;

use proctor_core::integrity::AttentionSignal;
use proctor_core::model::StudentId;
use proctor_core::session::{Rejection, SessionOutcome};
use services::{
    AssessmentError, AssessmentService, ChannelAttentionSource, FeedbackStatus, LockoutNotice,
    QuestionView, ResultView, SessionProgress, SessionUpdate, StartRequest,
};
use storage::repository::StoredResult;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
Comandos:
  <n>      marcar a alternativa n da questão atual
  next     próxima questão
  prev     questão anterior
  finish   enviar a avaliação (na última questão)
  hide     simular a aba ficando oculta
  blur     simular a janela perdendo o foco
  away     simular troca de aplicativo (oculta + foco)
  quit     abandonar sem enviar";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Choose(usize),
    Next,
    Prev,
    Finish,
    Away(Vec<AttentionSignal>),
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if let Ok(n) = line.parse::<usize>() {
        return n
            .checked_sub(1)
            .map_or_else(|| Input::Unknown(line.to_string()), Input::Choose);
    }
    match line.to_lowercase().as_str() {
        "n" | "next" => Input::Next,
        "p" | "prev" => Input::Prev,
        "f" | "finish" => Input::Finish,
        "hide" => Input::Away(vec![AttentionSignal::SurfaceHidden]),
        "blur" => Input::Away(vec![AttentionSignal::FocusLost]),
        "away" => Input::Away(vec![AttentionSignal::SurfaceHidden, AttentionSignal::FocusLost]),
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

/// Run one session against stdin until it finishes, locks out, or the
/// student quits.
///
/// # Errors
///
/// Returns storage and I/O failures. Refused commands are printed instead.
pub async fn take_assessment(
    service: &AssessmentService,
    attention: &ChannelAttentionSource,
    request: &StartRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = match service.start_session(request).await {
        Ok(session) => session,
        Err(AssessmentError::AccountLocked { strikes }) => {
            println!(
                "Sua conta está bloqueada ({strikes} saídas registradas). \
                 Procure um administrador."
            );
            return Ok(());
        }
        Err(AssessmentError::AlreadySubmitted) => {
            println!("Você já enviou esta avaliação.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!(
        "{} · {} · {}{}",
        request.subject,
        request.quarter,
        request.grade.value(),
        if request.mode.is_official() {
            "º ano · avaliação oficial (monitorada)"
        } else {
            "º ano · simulado"
        }
    );
    println!("{HELP}\n");
    if let Some(view) = session.question_view() {
        print!("{}", render_question(&view));
    }

    let mut lines = spawn_line_reader();
    let mut watching = session.is_monitored();
    prompt()?;
    loop {
        let event = tokio::select! {
            line = lines.recv() => Event::Line(line),
            signal = session.next_signal(), if watching => Event::Attention(signal),
        };

        let update = match event {
            Event::Attention(None) => {
                watching = false;
                continue;
            }
            Event::Attention(Some(signal)) => service.signal(&mut session, signal).await,
            Event::Line(None) => {
                service.abandon(session);
                return Ok(());
            }
            Event::Line(Some(line)) => match parse_input(&line) {
                Input::Choose(option) => {
                    let question = session.state().current_index();
                    service.select_answer(&mut session, question, option).await
                }
                Input::Next => service.advance(&mut session).await,
                Input::Prev => service.retreat(&mut session).await,
                Input::Finish => service.finish(&mut session).await,
                Input::Away(signals) => {
                    for signal in signals {
                        attention.emit(signal);
                    }
                    continue;
                }
                Input::Help => {
                    println!("{HELP}");
                    prompt()?;
                    continue;
                }
                Input::Quit => {
                    service.abandon(session);
                    println!("Avaliação abandonada. Nada foi enviado.");
                    return Ok(());
                }
                Input::Unknown(raw) => {
                    println!("Comando desconhecido: {raw} (digite 'help')");
                    prompt()?;
                    continue;
                }
            },
        };

        match update {
            Err(AssessmentError::Session(err)) => println!("{err}"),
            Err(err) => return Err(err.into()),
            Ok(SessionUpdate::Progress(SessionOutcome::Strike { .. })) => {
                println!("{}", render_strikes(&session.progress()));
            }
            Ok(SessionUpdate::Progress(outcome)) => {
                if let Some(message) = describe_outcome(&outcome, &session.progress()) {
                    println!("{message}");
                }
                if let Some(view) = session.question_view() {
                    print!("{}", render_question(&view));
                }
            }
            Ok(SessionUpdate::Finished { .. }) => {
                if let Some(view) = session.result_view() {
                    print!("{}", render_result(&view));
                }
                println!("\nGerando feedback...");
                if let Some(text) = service.await_feedback(&mut session).await {
                    print!("{}", render_feedback(&text));
                }
                return Ok(());
            }
            Ok(SessionUpdate::LockedOut(notice)) => {
                print!("{}", render_lockout(&notice));
                return Ok(());
            }
        }
        prompt()?;
    }
}

enum Event {
    Line(Option<String>),
    Attention(Option<AttentionSignal>),
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

/// Stdin lines on a channel, so reading can be raced against attention
/// signals without losing a half-read line.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

pub fn print_results(student: StudentId, results: &[StoredResult]) {
    if results.is_empty() {
        println!("Nenhum resultado para o aluno {student}.");
        return;
    }
    for stored in results {
        let result = &stored.result;
        let key = result.key();
        println!(
            "#{} {} · {} · {} · {} · {}{}",
            stored.id,
            result.recorded_at().format("%Y-%m-%d %H:%M"),
            key.subject,
            key.quarter,
            result.outcome().as_str(),
            result.score(),
            if result.needs_review() {
                " · revisão pendente"
            } else {
                ""
            }
        );
    }
}

fn describe_outcome(outcome: &SessionOutcome, progress: &SessionProgress) -> Option<String> {
    match outcome {
        SessionOutcome::Rejected(rejection) => Some(match rejection {
            Rejection::CurrentUnanswered => "Responda a questão atual antes de avançar.".into(),
            Rejection::AtFirstQuestion => "Você já está na primeira questão.".into(),
            Rejection::AtLastQuestion => {
                "Esta é a última questão. Use 'finish' para enviar.".into()
            }
            Rejection::NotAtLastQuestion => "Vá até a última questão para enviar.".into(),
            Rejection::Incomplete { unanswered } => {
                let list: Vec<String> = unanswered.iter().map(|i| (i + 1).to_string()).collect();
                format!("Questões sem resposta: {}", list.join(", "))
            }
        }),
        SessionOutcome::Strike { .. } => Some(render_strikes(progress)),
        _ => None,
    }
}

fn render_strikes(progress: &SessionProgress) -> String {
    format!(
        "Atenção: saída da tela registrada ({}/{}).",
        progress.strikes, progress.strike_threshold
    )
}

fn render_question(view: &QuestionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nQuestão {}/{}", view.index + 1, view.total);
    let _ = writeln!(out, "{}", view.prompt);
    for (i, option) in view.options.iter().enumerate() {
        let mark = if view.selected == Some(i) { "x" } else { " " };
        let _ = writeln!(out, "  [{mark}] {}) {option}", i + 1);
    }
    let mut actions = Vec::new();
    if view.can_retreat {
        actions.push("prev");
    }
    if view.can_advance {
        actions.push("next");
    }
    if view.can_finish {
        actions.push("finish");
    }
    if !actions.is_empty() {
        let _ = writeln!(out, "({})", actions.join(" · "));
    }
    out
}

fn render_result(view: &ResultView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nResultado: {} ({:.0}%)",
        view.score,
        view.score.percent()
    );
    for item in &view.review {
        let _ = writeln!(
            out,
            "  {}. {} marcada {}, correta {}",
            item.index + 1,
            if item.is_correct { "✔" } else { "✘" },
            item.selected + 1,
            item.correct + 1
        );
        if !item.is_correct {
            let _ = writeln!(out, "     {}", item.explanation);
        }
    }
    if let FeedbackStatus::Ready(text) = &view.feedback {
        out.push_str(&render_feedback(text));
    }
    out
}

fn render_feedback(text: &str) -> String {
    format!("\nFeedback:\n{text}\n")
}

fn render_lockout(notice: &LockoutNotice) -> String {
    let rule = "=".repeat(60);
    format!(
        "\n{rule}\n{}\n\n{}\n{rule}\n",
        notice.title.to_uppercase(),
        notice.message
    )
}
