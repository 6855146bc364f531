use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// No session exists for this call id. Raised for out-of-order webhooks
    /// and for answer events arriving after the call completed (completion
    /// evicts the session).
    #[error("unknown call: {0}")]
    UnknownCall(String),

    /// A survey needs at least one question.
    #[error("question catalog is empty")]
    EmptyCatalog,
}
