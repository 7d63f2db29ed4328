#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AccountLockRepository, AssessmentResultRepository, InMemoryRepository, QuestionBank, Storage,
    StorageError, StoredResult,
};
