//! The survey response store.
//!
//! Free functions operate on a borrowed connection so they compose inside
//! transactions and tests; [`ResponseStore`] wraps the pool and moves the
//! blocking SQLite work onto the blocking thread pool for async callers.

use crate::pool::DbPool;
use async_trait::async_trait;
use canvass_types::{AnswerSink, CollaboratorError, QuestionId, StoredAnswer};
use rusqlite::Connection;
use thiserror::Error;

/// Errors that can occur when reading or writing responses.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to check out a pooled connection.
    #[error("failed to get database connection: {0}")]
    Pool(#[from] r2d2::Error),

    /// A SQL statement failed.
    #[error("database operation failed: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The blocking task running the query was cancelled or panicked.
    #[error("database task failed: {0}")]
    Join(String),
}

/// Inserts one accepted answer.
///
/// Returns `true` if a row was written, `false` if an answer for this
/// `(call_id, question_id)` pair already exists. The conflict case is not an
/// error: the controller only stores after acceptance, so a conflict means a
/// duplicated delivery already handled.
pub fn insert_response(
    conn: &Connection,
    call_id: &str,
    question_id: &QuestionId,
    answer: &str,
) -> Result<bool, StoreError> {
    let written = conn.execute(
        "INSERT INTO responses (call_id, question_id, answer)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (call_id, question_id) DO NOTHING",
        rusqlite::params![call_id, question_id.as_str(), answer],
    )?;
    Ok(written > 0)
}

/// Returns every stored answer for a call, in insertion order.
pub fn list_responses(conn: &Connection, call_id: &str) -> Result<Vec<StoredAnswer>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT call_id, question_id, answer, created_at
         FROM responses
         WHERE call_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt.query_map([call_id], |row| {
        Ok(StoredAnswer {
            call_id: row.get(0)?,
            question_id: QuestionId::new(row.get::<_, String>(1)?),
            answer: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut answers = Vec::new();
    for row in rows {
        answers.push(row?);
    }
    Ok(answers)
}

/// Pool-backed response store used by async callers.
#[derive(Clone)]
pub struct ResponseStore {
    pool: DbPool,
}

impl ResponseStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Records one accepted answer; duplicate `(call, question)` pairs are
    /// silently ignored.
    pub async fn record_answer(
        &self,
        call_id: &str,
        question_id: &QuestionId,
        answer: &str,
    ) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        let call_id = call_id.to_string();
        let question_id = question_id.clone();
        let answer = answer.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            insert_response(&conn, &call_id, &question_id, &answer)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Returns every stored answer for a call, in insertion order.
    pub async fn answers_for_call(&self, call_id: &str) -> Result<Vec<StoredAnswer>, StoreError> {
        let pool = self.pool.clone();
        let call_id = call_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            list_responses(&conn, &call_id)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[async_trait]
impl AnswerSink for ResponseStore {
    async fn record(
        &self,
        call_id: &str,
        question_id: &QuestionId,
        answer: &str,
    ) -> Result<(), CollaboratorError> {
        self.record_answer(call_id, question_id, answer)
            .await
            .map(|_| ())
            .map_err(|e| CollaboratorError::Storage(e.to_string()))
    }
}
