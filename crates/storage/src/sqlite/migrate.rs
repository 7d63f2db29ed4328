use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS question_sets (
            id INTEGER PRIMARY KEY,
            subject TEXT NOT NULL,
            grade INTEGER NOT NULL CHECK (grade BETWEEN 1 AND 12),
            quarter INTEGER NOT NULL CHECK (quarter BETWEEN 1 AND 4),
            mode TEXT NOT NULL CHECK (mode IN ('official', 'mock')),
            UNIQUE (subject, grade, quarter, mode)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            set_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            question_id INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            options_json TEXT NOT NULL,
            correct_index INTEGER NOT NULL CHECK (correct_index >= 0),
            explanation TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            PRIMARY KEY (set_id, position),
            FOREIGN KEY (set_id) REFERENCES question_sets(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS assessment_results (
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            subject TEXT NOT NULL,
            quarter INTEGER NOT NULL CHECK (quarter BETWEEN 1 AND 4),
            mode TEXT NOT NULL CHECK (mode IN ('official', 'mock')),
            correct INTEGER NOT NULL CHECK (correct >= 0),
            total INTEGER NOT NULL CHECK (total >= correct),
            answers_json TEXT NOT NULL,
            strikes INTEGER NOT NULL CHECK (strikes >= 0),
            outcome TEXT NOT NULL CHECK (outcome IN ('completed', 'blocked')),
            needs_review INTEGER NOT NULL CHECK (needs_review IN (0, 1)),
            feedback TEXT,
            recorded_at TEXT NOT NULL,
            UNIQUE (student_id, subject, quarter, mode)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_assessment_results_student_recorded
            ON assessment_results (student_id, recorded_at);
    ",
    r"
        CREATE TABLE IF NOT EXISTS account_locks (
            student_id INTEGER PRIMARY KEY,
            subject TEXT NOT NULL,
            quarter INTEGER NOT NULL CHECK (quarter BETWEEN 1 AND 4),
            strikes INTEGER NOT NULL CHECK (strikes >= 0),
            locked_at TEXT NOT NULL
        );
    ",
];

/// Runs the schema migrations that have not been applied yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
