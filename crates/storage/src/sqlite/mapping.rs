use proctor_core::model::{
    AccountLock, AnswerSet, AssessmentKey, AssessmentResult, Difficulty, Question, QuestionId,
    Quarter, ResultId, ResultOutcome, SessionMode, StudentId, Subject,
};
use proctor_core::scorer::Score;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn quarter_from_i64(v: i64) -> Result<Quarter, StorageError> {
    let raw = u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid quarter: {v}")))?;
    Quarter::from_number(raw).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let id = u64_from_i64("question_id", row.try_get("question_id").map_err(ser)?)?;
    let prompt: String = row.try_get("prompt").map_err(ser)?;
    let options_json: String = row.try_get("options_json").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let correct = usize_from_i64("correct_index", row.try_get("correct_index").map_err(ser)?)?;
    let explanation: String = row.try_get("explanation").map_err(ser)?;
    let difficulty: String = row.try_get("difficulty").map_err(ser)?;

    Question::new(
        QuestionId::new(id),
        prompt,
        options,
        correct,
        explanation,
        Difficulty::parse(&difficulty).map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<AssessmentResult, StorageError> {
    let student = u64_from_i64("student_id", row.try_get("student_id").map_err(ser)?)?;
    let subject: String = row.try_get("subject").map_err(ser)?;
    let quarter = quarter_from_i64(row.try_get("quarter").map_err(ser)?)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    let correct = u32_from_i64("correct", row.try_get("correct").map_err(ser)?)?;
    let total = u32_from_i64("total", row.try_get("total").map_err(ser)?)?;
    let answers_json: String = row.try_get("answers_json").map_err(ser)?;
    let raw_answers: Vec<i32> = serde_json::from_str(&answers_json).map_err(ser)?;
    let strikes = u32_from_i64("strikes", row.try_get("strikes").map_err(ser)?)?;
    let outcome: String = row.try_get("outcome").map_err(ser)?;
    let needs_review: bool = row.try_get("needs_review").map_err(ser)?;
    let feedback: Option<String> = row.try_get("feedback").map_err(ser)?;
    let recorded_at = row.try_get("recorded_at").map_err(ser)?;

    let key = AssessmentKey {
        student: StudentId::new(student),
        subject: Subject::new(subject).map_err(ser)?,
        quarter,
        mode: SessionMode::parse(&mode).map_err(ser)?,
    };

    AssessmentResult::from_persisted(
        key,
        Score::new(correct, total),
        AnswerSet::from_raw(&raw_answers).map_err(ser)?,
        strikes,
        ResultOutcome::parse(&outcome).map_err(ser)?,
        needs_review,
        feedback,
        recorded_at,
    )
    .map_err(ser)
}

pub(crate) fn result_id_from_row(row: &SqliteRow) -> Result<ResultId, StorageError> {
    Ok(ResultId::new(u64_from_i64(
        "id",
        row.try_get("id").map_err(ser)?,
    )?))
}

pub(crate) fn map_lock_row(row: &SqliteRow) -> Result<AccountLock, StorageError> {
    let student = u64_from_i64("student_id", row.try_get("student_id").map_err(ser)?)?;
    let subject: String = row.try_get("subject").map_err(ser)?;
    Ok(AccountLock {
        student: StudentId::new(student),
        subject: Subject::new(subject).map_err(ser)?,
        quarter: quarter_from_i64(row.try_get("quarter").map_err(ser)?)?,
        strikes: u32_from_i64("strikes", row.try_get("strikes").map_err(ser)?)?,
        locked_at: row.try_get("locked_at").map_err(ser)?,
    })
}
