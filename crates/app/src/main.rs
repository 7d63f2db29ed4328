use std::fmt;
use std::sync::Arc;

use proctor_core::model::{GradeLevel, Quarter, SessionMode, StudentId, Subject};
use services::{
    AssessmentService, ChannelAttentionSource, Clock, FeedbackClient, FeedbackOrchestrator,
    StartRequest,
};
use storage::repository::{AssessmentResultRepository, Storage};
use tracing::info;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Results,
    Unlock,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "results" => Some(Self::Results),
            "unlock" => Some(Self::Unlock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    student_id: u64,
    subject: String,
    grade: u8,
    quarter: u8,
    mode: SessionMode,
    verbose: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("PROCTOR_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url),
            student_id: 1,
            subject: "Matemática".into(),
            grade: 6,
            quarter: 1,
            mode: SessionMode::Official,
            verbose: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--student-id" => {
                    parsed.student_id =
                        parse_number("--student-id", require_value(args, "--student-id")?)?;
                }
                "--subject" => parsed.subject = require_value(args, "--subject")?,
                "--grade" => parsed.grade = parse_number("--grade", require_value(args, "--grade")?)?,
                "--quarter" => {
                    parsed.quarter = parse_number("--quarter", require_value(args, "--quarter")?)?;
                }
                "--mock" => parsed.mode = SessionMode::Mock,
                "--verbose" | "-v" => parsed.verbose = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn start_request(&self) -> Result<StartRequest, Box<dyn std::error::Error>> {
        Ok(StartRequest {
            student: StudentId::new(self.student_id),
            subject: Subject::new(self.subject.clone())?,
            grade: GradeLevel::new(self.grade)?,
            quarter: Quarter::from_number(self.quarter)?,
            mode: self.mode,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [take]  [options]   # answer an assessment");
    eprintln!("  cargo run -p app -- results [options]   # list a student's results");
    eprintln!("  cargo run -p app -- unlock  [options]   # clear a lockout after review");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>    (default: sqlite://dev.sqlite3)");
    eprintln!("  --student-id <id>    (default: 1)");
    eprintln!("  --subject <name>     (default: Matemática)");
    eprintln!("  --grade <1-12>       (default: 6)");
    eprintln!("  --quarter <1-4>      (default: 1)");
    eprintln!("  --mock               practice session, unmonitored and not saved");
    eprintln!("  -v, --verbose        debug logging");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROCTOR_DB_URL, PROCTOR_AI_API_KEY, PROCTOR_AI_BASE_URL, PROCTOR_AI_MODEL,");
    eprintln!("  PROCTOR_FEEDBACK_TIMEOUT_SECS, RUST_LOG");
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| String::from(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with('-') => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.to_string())
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with('-') {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_tracing(parsed.verbose);

    // Open + migrate SQLite at startup so the services only ever see traits.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    info!(db = %parsed.db_url, "storage ready");

    let attention = Arc::new(ChannelAttentionSource::new());
    let feedback = FeedbackClient::from_env();
    if !feedback.enabled() {
        info!("PROCTOR_AI_API_KEY not set; feedback will use the fallback text");
    }
    let service = AssessmentService::new(
        Clock::system(),
        Arc::clone(&storage.questions),
        Arc::clone(&storage.results),
        Arc::clone(&storage.locks),
        attention.clone(),
        FeedbackOrchestrator::from_env(Arc::new(feedback)),
    );

    match cmd {
        Command::Take => {
            let request = parsed.start_request()?;
            terminal::take_assessment(&service, &attention, &request).await
        }
        Command::Results => {
            let student = StudentId::new(parsed.student_id);
            let results = storage.results.list_results(student).await?;
            terminal::print_results(student, &results);
            Ok(())
        }
        Command::Unlock => {
            let student = StudentId::new(parsed.student_id);
            service.clear_account_lock(student).await?;
            println!("Conta do aluno {student} desbloqueada.");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(&mut args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn parses_assessment_flags() {
        let args = parse(&[
            "--db",
            "sqlite::memory:",
            "--student-id",
            "42",
            "--subject",
            "História",
            "--grade",
            "8",
            "--quarter",
            "3",
            "--mock",
        ])
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.student_id, 42);
        assert_eq!(args.subject, "História");
        assert_eq!((args.grade, args.quarter), (8, 3));
        assert_eq!(args.mode, SessionMode::Mock);

        let request = args.start_request().unwrap();
        assert_eq!(request.quarter, Quarter::Third);
    }

    #[test]
    fn rejects_bad_flags() {
        assert!(matches!(
            parse(&["--grade"]),
            Err(ArgsError::MissingValue { flag: "--grade" })
        ));
        assert!(matches!(
            parse(&["--student-id", "abc"]),
            Err(ArgsError::InvalidNumber { .. })
        ));
        assert!(matches!(parse(&["--what"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(
            parse(&["--db", "  "]),
            Err(ArgsError::InvalidDbUrl { .. })
        ));
    }

    #[test]
    fn out_of_range_quarter_fails_request() {
        let args = parse(&["--db", "sqlite::memory:", "--quarter", "5"]).unwrap();
        assert!(args.start_request().is_err());
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/dev.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/dev.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite://x.db".into()),
            "sqlite://x.db"
        );
    }
}
