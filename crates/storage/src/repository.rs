use async_trait::async_trait;
use proctor_core::model::{
    AccountLock, AssessmentKey, AssessmentResult, Question, QuestionSetKey, ResultId, StudentId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted result together with the id storage assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub id: ResultId,
    pub result: AssessmentResult,
}

/// Supplies question sets for a (subject, grade, quarter, mode) tuple.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Fetch the ordered questions for a key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures. A missing set is `Ok(None)`.
    async fn get_question_set(
        &self,
        key: &QuestionSetKey,
    ) -> Result<Option<Vec<Question>>, StorageError>;

    /// Replace the questions stored for a key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn upsert_question_set(
        &self,
        key: &QuestionSetKey,
        questions: &[Question],
    ) -> Result<(), StorageError>;
}

/// Receives finished and blocked results. At most one result per key.
#[async_trait]
pub trait AssessmentResultRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a result already exists for the key.
    async fn append_result(&self, result: &AssessmentResult) -> Result<ResultId, StorageError>;

    /// Store feedback text that resolved after the result was appended.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown ids.
    async fn attach_feedback(&self, id: ResultId, feedback: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown ids.
    async fn get_result(&self, id: ResultId) -> Result<AssessmentResult, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn find_result(&self, key: &AssessmentKey) -> Result<Option<StoredResult>, StorageError>;

    /// Results for a student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_results(&self, student: StudentId) -> Result<Vec<StoredResult>, StorageError>;
}

/// Accounts locked out by the integrity monitor, pending administrator review.
#[async_trait]
pub trait AccountLockRepository: Send + Sync {
    /// Record a lock. An existing lock for the student is replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lock cannot be stored.
    async fn lock_account(&self, lock: &AccountLock) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn get_lock(&self, student: StudentId) -> Result<Option<AccountLock>, StorageError>;

    /// Administrator action after review.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the student is not locked.
    async fn clear_lock(&self, student: StudentId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct ResultTable {
    next_id: u64,
    rows: Vec<StoredResult>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    question_sets: Arc<Mutex<HashMap<QuestionSetKey, Vec<Question>>>>,
    results: Arc<Mutex<ResultTable>>,
    locks: Arc<Mutex<HashMap<StudentId, AccountLock>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn get_question_set(
        &self,
        key: &QuestionSetKey,
    ) -> Result<Option<Vec<Question>>, StorageError> {
        let guard = self.question_sets.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn upsert_question_set(
        &self,
        key: &QuestionSetKey,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut guard = self.question_sets.lock().map_err(poisoned)?;
        guard.insert(key.clone(), questions.to_vec());
        Ok(())
    }
}

#[async_trait]
impl AssessmentResultRepository for InMemoryRepository {
    async fn append_result(&self, result: &AssessmentResult) -> Result<ResultId, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        if guard.rows.iter().any(|row| row.result.key() == result.key()) {
            return Err(StorageError::Conflict);
        }
        guard.next_id += 1;
        let id = ResultId::new(guard.next_id);
        guard.rows.push(StoredResult {
            id,
            result: result.clone(),
        });
        Ok(id)
    }

    async fn attach_feedback(&self, id: ResultId, feedback: &str) -> Result<(), StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        let row = guard
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StorageError::NotFound)?;
        row.result.attach_feedback(feedback);
        Ok(())
    }

    async fn get_result(&self, id: ResultId) -> Result<AssessmentResult, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        guard
            .rows
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.result.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn find_result(&self, key: &AssessmentKey) -> Result<Option<StoredResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        Ok(guard.rows.iter().find(|row| row.result.key() == key).cloned())
    }

    async fn list_results(&self, student: StudentId) -> Result<Vec<StoredResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut rows: Vec<_> = guard
            .rows
            .iter()
            .filter(|row| row.result.key().student == student)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .recorded_at()
                .cmp(&a.result.recorded_at())
                .then(b.id.cmp(&a.id))
        });
        Ok(rows)
    }
}

#[async_trait]
impl AccountLockRepository for InMemoryRepository {
    async fn lock_account(&self, lock: &AccountLock) -> Result<(), StorageError> {
        let mut guard = self.locks.lock().map_err(poisoned)?;
        guard.insert(lock.student, lock.clone());
        Ok(())
    }

    async fn get_lock(&self, student: StudentId) -> Result<Option<AccountLock>, StorageError> {
        let guard = self.locks.lock().map_err(poisoned)?;
        Ok(guard.get(&student).cloned())
    }

    async fn clear_lock(&self, student: StudentId) -> Result<(), StorageError> {
        let mut guard = self.locks.lock().map_err(poisoned)?;
        guard.remove(&student).map(|_| ()).ok_or(StorageError::NotFound)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionBank>,
    pub results: Arc<dyn AssessmentResultRepository>,
    pub locks: Arc<dyn AccountLockRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            questions: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            locks: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proctor_core::model::{
        AnswerSet, Difficulty, GradeLevel, QuestionId, Quarter, SessionMode, Subject,
    };
    use proctor_core::scorer::Score;
    use proctor_core::time::fixed_now;

    fn set_key() -> QuestionSetKey {
        QuestionSetKey {
            subject: Subject::new("Geografia").unwrap(),
            grade: GradeLevel::new(6).unwrap(),
            quarter: Quarter::First,
            mode: SessionMode::Official,
        }
    }

    fn result_key(quarter: Quarter) -> AssessmentKey {
        AssessmentKey {
            student: StudentId::new(3),
            subject: Subject::new("Geografia").unwrap(),
            quarter,
            mode: SessionMode::Official,
        }
    }

    fn result(quarter: Quarter, minutes: i64) -> AssessmentResult {
        AssessmentResult::completed(
            result_key(quarter),
            Score::new(1, 2),
            AnswerSet::from_raw(&[0, 1]).unwrap(),
            0,
            fixed_now() + Duration::minutes(minutes),
        )
    }

    #[tokio::test]
    async fn question_sets_round_trip() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_question_set(&set_key()).await.unwrap().is_none());

        let q = Question::new(
            QuestionId::new(1),
            "Capital do Brasil?",
            vec!["Rio".into(), "Brasília".into()],
            1,
            "Desde 1960.",
            Difficulty::Easy,
        )
        .unwrap();
        repo.upsert_question_set(&set_key(), &[q.clone()]).await.unwrap();
        let fetched = repo.get_question_set(&set_key()).await.unwrap().unwrap();
        assert_eq!(fetched, vec![q]);
    }

    #[tokio::test]
    async fn second_result_for_same_key_conflicts() {
        let repo = InMemoryRepository::new();
        repo.append_result(&result(Quarter::First, 0)).await.unwrap();
        let err = repo.append_result(&result(Quarter::First, 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn feedback_attaches_after_append() {
        let repo = InMemoryRepository::new();
        let id = repo.append_result(&result(Quarter::First, 0)).await.unwrap();
        repo.attach_feedback(id, "Bom trabalho").await.unwrap();
        let stored = repo.get_result(id).await.unwrap();
        assert_eq!(stored.feedback(), Some("Bom trabalho"));
        assert!(matches!(
            repo.attach_feedback(ResultId::new(99), "x").await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn results_list_newest_first() {
        let repo = InMemoryRepository::new();
        repo.append_result(&result(Quarter::First, 0)).await.unwrap();
        repo.append_result(&result(Quarter::Second, 10)).await.unwrap();
        let rows = repo.list_results(StudentId::new(3)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].result.key().quarter, Quarter::Second);
        assert!(repo.list_results(StudentId::new(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn locks_can_be_cleared_once() {
        let repo = InMemoryRepository::new();
        let lock = AccountLock {
            student: StudentId::new(3),
            subject: Subject::new("Geografia").unwrap(),
            quarter: Quarter::First,
            strikes: 6,
            locked_at: fixed_now(),
        };
        repo.lock_account(&lock).await.unwrap();
        assert_eq!(repo.get_lock(StudentId::new(3)).await.unwrap(), Some(lock));
        repo.clear_lock(StudentId::new(3)).await.unwrap();
        assert!(repo.get_lock(StudentId::new(3)).await.unwrap().is_none());
        assert!(repo.clear_lock(StudentId::new(3)).await.is_err());
    }
}
