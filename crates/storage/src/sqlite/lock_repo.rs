use proctor_core::model::{AccountLock, StudentId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_lock_row};
use crate::repository::{AccountLockRepository, StorageError};

#[async_trait::async_trait]
impl AccountLockRepository for SqliteRepository {
    async fn lock_account(&self, lock: &AccountLock) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO account_locks (student_id, subject, quarter, strikes, locked_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(student_id) DO UPDATE SET
                    subject = excluded.subject,
                    quarter = excluded.quarter,
                    strikes = excluded.strikes,
                    locked_at = excluded.locked_at
            ",
        )
        .bind(id_i64("student_id", lock.student.value())?)
        .bind(lock.subject.as_str())
        .bind(i64::from(lock.quarter.number()))
        .bind(i64::from(lock.strikes))
        .bind(lock.locked_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_lock(&self, student: StudentId) -> Result<Option<AccountLock>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT student_id, subject, quarter, strikes, locked_at
                FROM account_locks
                WHERE student_id = ?1
            ",
        )
        .bind(id_i64("student_id", student.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lock_row).transpose()
    }

    async fn clear_lock(&self, student: StudentId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM account_locks WHERE student_id = ?1")
            .bind(id_i64("student_id", student.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
