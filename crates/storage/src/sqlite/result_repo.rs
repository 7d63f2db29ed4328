use proctor_core::model::{AssessmentKey, AssessmentResult, ResultId, StudentId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_result_row, result_id_from_row, ser};
use crate::repository::{AssessmentResultRepository, StorageError, StoredResult};

const RESULT_COLUMNS: &str = r"
    id, student_id, subject, quarter, mode, correct, total, answers_json,
    strikes, outcome, needs_review, feedback, recorded_at
";

#[async_trait::async_trait]
impl AssessmentResultRepository for SqliteRepository {
    async fn append_result(&self, result: &AssessmentResult) -> Result<ResultId, StorageError> {
        let key = result.key();
        let answers_json = serde_json::to_string(&result.answers().to_raw()).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO assessment_results (
                    student_id, subject, quarter, mode, correct, total, answers_json,
                    strikes, outcome, needs_review, feedback, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(id_i64("student_id", key.student.value())?)
        .bind(key.subject.as_str())
        .bind(i64::from(key.quarter.number()))
        .bind(key.mode.as_str())
        .bind(i64::from(result.score().correct()))
        .bind(i64::from(result.score().total()))
        .bind(answers_json)
        .bind(i64::from(result.strikes()))
        .bind(result.outcome().as_str())
        .bind(result.needs_review())
        .bind(result.feedback())
        .bind(result.recorded_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("result id sign overflow".into()))?;
        Ok(ResultId::new(id))
    }

    async fn attach_feedback(&self, id: ResultId, feedback: &str) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE assessment_results SET feedback = ?1 WHERE id = ?2")
            .bind(feedback)
            .bind(id_i64("id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_result(&self, id: ResultId) -> Result<AssessmentResult, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM assessment_results WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn find_result(&self, key: &AssessmentKey) -> Result<Option<StoredResult>, StorageError> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM assessment_results
             WHERE student_id = ?1 AND subject = ?2 AND quarter = ?3 AND mode = ?4"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("student_id", key.student.value())?)
            .bind(key.subject.as_str())
            .bind(i64::from(key.quarter.number()))
            .bind(key.mode.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| {
            Ok(StoredResult {
                id: result_id_from_row(&row)?,
                result: map_result_row(&row)?,
            })
        })
        .transpose()
    }

    async fn list_results(&self, student: StudentId) -> Result<Vec<StoredResult>, StorageError> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM assessment_results
             WHERE student_id = ?1
             ORDER BY recorded_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("student_id", student.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(StoredResult {
                id: result_id_from_row(&row)?,
                result: map_result_row(&row)?,
            });
        }
        Ok(out)
    }
}
