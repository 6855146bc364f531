//! Shared types, collaborator traits, and error definitions for Canvass.
//!
//! This crate provides the foundational types used across all Canvass crates:
//! the question catalog entry, the tagged judgement outcome, and the narrow
//! collaborator traits (transcription, judgement, answer storage) the call
//! flow controller is written against.
//!
//! No crate in the workspace depends on anything *except* `canvass-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier for a survey question (e.g. "Q1").
///
/// Identifiers are keys into the catalog, nothing more. Question ordering is
/// the catalog's iteration order; no arithmetic is ever performed on the
/// identifier text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A single catalog entry: an opaque id and the prompt spoken to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
}

impl Question {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: QuestionId::new(id),
            prompt: prompt.into(),
        }
    }
}

/// One durably recorded answer, keyed by call and question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnswer {
    #[serde(rename = "callId")]
    pub call_id: String,
    #[serde(rename = "questionId")]
    pub question_id: QuestionId,
    pub answer: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Outcome of evaluating a caller's answer against the question it addresses.
///
/// Exactly two cases: the answer is usable as-is (store `value` and advance),
/// or it needs clarification (`question` is spoken next and the survey stays
/// on the same catalog position). Collaborator failures travel through
/// `Result`, not through a third variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Judgement {
    /// The answer addresses the question; `value` is what gets stored.
    Accepted { value: String },
    /// The answer is unclear or incomplete; `question` is the clarifying
    /// prompt to speak before re-recording.
    FollowUp { question: String },
}

/// Failure of an external collaborator, surfaced at the adapter boundary.
///
/// Adapters convert their internal errors (subprocess failures, HTTP errors,
/// timeouts, SQL errors) into this type so the controller can treat every
/// collaborator uniformly: log, apologize, repeat the question.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("judgement failed: {0}")]
    Judgement(String),

    #[error("storage failed: {0}")]
    Storage(String),
}

/// Converts a recorded audio clip into text.
///
/// An empty or whitespace-only result is a valid outcome (the caller said
/// nothing intelligible), not an error. Implementations enforce their own
/// bounded wait; a hung backend must surface as `Err`, never as a stalled
/// future held indefinitely.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, CollaboratorError>;
}

/// Judges a transcribed answer against the question it was given for.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, prompt: &str, answer: &str) -> Result<Judgement, CollaboratorError>;
}

/// Durably records one accepted answer per `(call, question)` pair.
#[async_trait]
pub trait AnswerSink: Send + Sync {
    async fn record(
        &self,
        call_id: &str,
        question_id: &QuestionId,
        answer: &str,
    ) -> Result<(), CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_id_is_opaque_text() {
        let id = QuestionId::new("Q7");
        assert_eq!(id.as_str(), "Q7");
        assert_eq!(id.to_string(), "Q7");
        assert_eq!(QuestionId::from("Q7"), id);
    }

    #[test]
    fn judgement_serializes_tagged() {
        let accepted = Judgement::Accepted {
            value: "yes".to_string(),
        };
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["kind"], "accepted");
        assert_eq!(json["value"], "yes");

        let follow_up: Judgement = serde_json::from_str(
            r#"{"kind":"follow_up","question":"Can you clarify, yes or no?"}"#,
        )
        .unwrap();
        assert_eq!(
            follow_up,
            Judgement::FollowUp {
                question: "Can you clarify, yes or no?".to_string()
            }
        );
    }

    #[test]
    fn stored_answer_uses_wire_field_names() {
        let answer = StoredAnswer {
            call_id: "CA1".to_string(),
            question_id: QuestionId::new("Q1"),
            answer: "yes".to_string(),
            created_at: "2026-01-01 00:00:00".to_string(),
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["callId"], "CA1");
        assert_eq!(json["questionId"], "Q1");
        assert_eq!(json["createdAt"], "2026-01-01 00:00:00");
    }
}
