use proctor_core::model::{Question, QuestionSetKey};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_question_row, ser};
use crate::repository::{QuestionBank, StorageError};

#[async_trait::async_trait]
impl QuestionBank for SqliteRepository {
    async fn get_question_set(
        &self,
        key: &QuestionSetKey,
    ) -> Result<Option<Vec<Question>>, StorageError> {
        let set_row = sqlx::query(
            r"
                SELECT id FROM question_sets
                WHERE subject = ?1 AND grade = ?2 AND quarter = ?3 AND mode = ?4
            ",
        )
        .bind(key.subject.as_str())
        .bind(i64::from(key.grade.value()))
        .bind(i64::from(key.quarter.number()))
        .bind(key.mode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(set_row) = set_row else {
            return Ok(None);
        };
        let set_id: i64 = set_row.try_get("id").map_err(ser)?;

        let rows = sqlx::query(
            r"
                SELECT question_id, prompt, options_json, correct_index, explanation, difficulty
                FROM questions
                WHERE set_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(Some(out))
    }

    async fn upsert_question_set(
        &self,
        key: &QuestionSetKey,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO question_sets (subject, grade, quarter, mode)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(subject, grade, quarter, mode) DO NOTHING
            ",
        )
        .bind(key.subject.as_str())
        .bind(i64::from(key.grade.value()))
        .bind(i64::from(key.quarter.number()))
        .bind(key.mode.as_str())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let set_id: i64 = sqlx::query(
            r"
                SELECT id FROM question_sets
                WHERE subject = ?1 AND grade = ?2 AND quarter = ?3 AND mode = ?4
            ",
        )
        .bind(key.subject.as_str())
        .bind(i64::from(key.grade.value()))
        .bind(i64::from(key.quarter.number()))
        .bind(key.mode.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?
        .try_get("id")
        .map_err(ser)?;

        sqlx::query("DELETE FROM questions WHERE set_id = ?1")
            .bind(set_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in questions.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            let correct = i64::try_from(question.correct_index())
                .map_err(|_| StorageError::Serialization("correct_index overflow".into()))?;
            let options_json = serde_json::to_string(question.options()).map_err(ser)?;

            sqlx::query(
                r"
                    INSERT INTO questions (
                        set_id, position, question_id, prompt, options_json,
                        correct_index, explanation, difficulty
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(set_id)
            .bind(position)
            .bind(id_i64("question_id", question.id().value())?)
            .bind(question.prompt())
            .bind(options_json)
            .bind(correct)
            .bind(question.explanation())
            .bind(question.difficulty().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
