use chrono::Duration;
use proctor_core::model::{
    AccountLock, AnswerSet, AssessmentKey, AssessmentResult, Difficulty, GradeLevel, Question,
    QuestionId, QuestionSetKey, Quarter, ResultOutcome, SessionMode, StudentId, Subject,
};
use proctor_core::scorer::Score;
use proctor_core::time::fixed_now;
use storage::repository::{
    AccountLockRepository, AssessmentResultRepository, QuestionBank, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn question(id: u64, correct: usize) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Pergunta {id}"),
        vec!["A".into(), "B".into(), "C".into()],
        correct,
        format!("Explicação {id}"),
        Difficulty::Medium,
    )
    .unwrap()
}

fn set_key(mode: SessionMode) -> QuestionSetKey {
    QuestionSetKey {
        subject: Subject::new("Português").unwrap(),
        grade: GradeLevel::new(7).unwrap(),
        quarter: Quarter::Third,
        mode,
    }
}

fn result_key(student: u64) -> AssessmentKey {
    AssessmentKey {
        student: StudentId::new(student),
        subject: Subject::new("Português").unwrap(),
        quarter: Quarter::Third,
        mode: SessionMode::Official,
    }
}

#[tokio::test]
async fn question_sets_keep_order_and_are_replaced() {
    let repo = repo("memdb_questions").await;
    let key = set_key(SessionMode::Official);
    assert!(repo.get_question_set(&key).await.unwrap().is_none());

    let first = vec![question(3, 0), question(1, 2), question(2, 1)];
    repo.upsert_question_set(&key, &first).await.unwrap();
    assert_eq!(repo.get_question_set(&key).await.unwrap().unwrap(), first);

    let second = vec![question(9, 1)];
    repo.upsert_question_set(&key, &second).await.unwrap();
    assert_eq!(repo.get_question_set(&key).await.unwrap().unwrap(), second);

    // the mock set is a different key
    assert!(
        repo.get_question_set(&set_key(SessionMode::Mock))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn results_round_trip_with_late_feedback() {
    let repo = repo("memdb_results").await;
    let result = AssessmentResult::completed(
        result_key(10),
        Score::new(4, 5),
        AnswerSet::from_raw(&[0, 1, 2, 0, 1]).unwrap(),
        2,
        fixed_now(),
    );

    let id = repo.append_result(&result).await.unwrap();
    let stored = repo.get_result(id).await.unwrap();
    assert_eq!(stored, result);
    assert_eq!(stored.feedback(), None);

    repo.attach_feedback(id, "Ótimo desempenho.").await.unwrap();
    let stored = repo.get_result(id).await.unwrap();
    assert_eq!(stored.feedback(), Some("Ótimo desempenho."));

    let found = repo.find_result(&result_key(10)).await.unwrap().unwrap();
    assert_eq!(found.id, id);

    let err = repo.append_result(&result).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn blocked_results_keep_review_flag() {
    let repo = repo("memdb_blocked").await;
    let blocked = AssessmentResult::blocked(
        result_key(11),
        5,
        AnswerSet::from_raw(&[1, -1, -1, -1, -1]).unwrap(),
        6,
        fixed_now() + Duration::minutes(3),
    );
    let id = repo.append_result(&blocked).await.unwrap();

    let stored = repo.get_result(id).await.unwrap();
    assert_eq!(stored.outcome(), ResultOutcome::Blocked);
    assert!(stored.needs_review());
    assert_eq!(stored.score().correct(), 0);
    assert_eq!(stored.answers().to_raw(), vec![1, -1, -1, -1, -1]);

    let listed = repo.list_results(StudentId::new(11)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(repo.list_results(StudentId::new(12)).await.unwrap().is_empty());
}

#[tokio::test]
async fn account_locks_upsert_and_clear() {
    let repo = repo("memdb_locks").await;
    let student = StudentId::new(20);
    assert!(repo.get_lock(student).await.unwrap().is_none());

    let lock = AccountLock {
        student,
        subject: Subject::new("Português").unwrap(),
        quarter: Quarter::Third,
        strikes: 6,
        locked_at: fixed_now(),
    };
    repo.lock_account(&lock).await.unwrap();
    repo.lock_account(&AccountLock { strikes: 7, ..lock.clone() })
        .await
        .unwrap();
    assert_eq!(repo.get_lock(student).await.unwrap().unwrap().strikes, 7);

    repo.clear_lock(student).await.unwrap();
    assert!(repo.get_lock(student).await.unwrap().is_none());
    assert!(matches!(
        repo.clear_lock(student).await.unwrap_err(),
        StorageError::NotFound
    ));
}
