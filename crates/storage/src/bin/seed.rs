use std::fmt;

use proctor_core::model::{
    Difficulty, GradeLevel, Question, QuestionId, QuestionSetKey, Quarter, SessionMode, Subject,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    subject: String,
    grade: u8,
    quarter: u8,
    mode: SessionMode,
}

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

fn parse_u8(flag: &'static str, value: String) -> Result<u8, ArgsError> {
    value
        .parse::<u8>()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PROCTOR_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut subject = "Matemática".to_string();
        let mut grade = 6;
        let mut quarter = 1;
        let mut mode = SessionMode::Official;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--subject" => subject = require_value(&mut args, "--subject")?,
                "--grade" => grade = parse_u8("--grade", require_value(&mut args, "--grade")?)?,
                "--quarter" => {
                    quarter = parse_u8("--quarter", require_value(&mut args, "--quarter")?)?;
                }
                "--mock" => mode = SessionMode::Mock,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            subject,
            grade,
            quarter,
            mode,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>    SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --subject <name>     Subject (default: Matemática)");
    eprintln!("  --grade <1-12>       Grade level (default: 6)");
    eprintln!("  --quarter <1-4>      Quarter (default: 1)");
    eprintln!("  --mock               Seed the mock set instead of the official one");
    eprintln!("  -h, --help           Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROCTOR_DB_URL");
}

fn sample_questions() -> Result<Vec<Question>, Box<dyn std::error::Error>> {
    let rows: [(&str, [&str; 4], usize, &str, Difficulty); 5] = [
        (
            "Quanto é 7 × 8?",
            ["54", "56", "58", "64"],
            1,
            "7 × 8 = 56.",
            Difficulty::Easy,
        ),
        (
            "Qual fração é equivalente a 1/2?",
            ["2/3", "3/4", "4/8", "5/8"],
            2,
            "4/8 simplificada por 4 resulta em 1/2.",
            Difficulty::Easy,
        ),
        (
            "Qual é o MMC de 4 e 6?",
            ["12", "24", "6", "2"],
            0,
            "Os múltiplos comuns de 4 e 6 começam em 12.",
            Difficulty::Medium,
        ),
        (
            "Quantos graus tem a soma dos ângulos internos de um triângulo?",
            ["90", "360", "270", "180"],
            3,
            "A soma dos ângulos internos de qualquer triângulo é 180 graus.",
            Difficulty::Medium,
        ),
        (
            "Qual é o valor de 2³ + 3²?",
            ["13", "17", "15", "12"],
            1,
            "2³ = 8 e 3² = 9, logo 8 + 9 = 17.",
            Difficulty::Hard,
        ),
    ];

    let mut out = Vec::with_capacity(rows.len());
    for (i, (prompt, options, correct, explanation, difficulty)) in rows.into_iter().enumerate() {
        out.push(Question::new(
            QuestionId::new(u64::try_from(i)? + 1),
            prompt,
            options.iter().map(|o| (*o).to_string()).collect(),
            correct,
            explanation,
            difficulty,
        )?);
    }
    Ok(out)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let key = QuestionSetKey {
        subject: Subject::new(args.subject.clone())?,
        grade: GradeLevel::new(args.grade)?,
        quarter: Quarter::from_number(args.quarter)?,
        mode: args.mode,
    };

    let storage = Storage::sqlite(&args.db_url).await?;
    let questions = sample_questions()?;
    storage.questions.upsert_question_set(&key, &questions).await?;

    println!(
        "Seeded {} questions for {} / {}º ano / {} ({}) into {}",
        questions.len(),
        key.subject,
        key.grade.value(),
        key.quarter,
        key.mode.as_str(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
