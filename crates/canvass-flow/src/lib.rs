//! The Canvass call flow controller.
//!
//! Owns one state machine instance per active call and decides, after each
//! recorded answer, whether to advance, re-ask, or end the call. Decisions
//! come back as data ([`FlowStep`]): the webhook boundary renders them into
//! the telephony vendor's reply format and never makes flow decisions of its
//! own.
//!
//! The controller talks to its four collaborators (transcription, judgement,
//! storage, and implicitly synthesis via the boundary) through the narrow
//! traits in `canvass-types`, so the whole state machine is testable with
//! in-memory fakes.

pub mod catalog;
pub mod controller;
pub mod error;
pub mod session;

pub use catalog::QuestionCatalog;
pub use controller::{FlowStep, SurveyController, SurveyScript};
pub use error::FlowError;
pub use session::{CallSession, SessionTable};
