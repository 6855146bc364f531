//! Collaborator adapters for the Canvass survey pipeline.
//!
//! Three narrow capabilities, each consumed by the call flow controller
//! through a trait from `canvass-types`:
//!
//! - [`SttService`] transcribes recorded answer audio (whisper.cpp
//!   subprocess).
//! - [`JudgeService`] validates a transcribed answer against its question and
//!   produces either an accepted value or a clarifying follow-up (language
//!   model over an OpenAI-compatible chat API).
//! - [`TtsService`] renders prompt text to a playable audio file (piper or
//!   espeak-ng subprocess).
//!
//! Every adapter enforces a bounded wait and converts its failures into
//! errors at this boundary; nothing here panics the call.

pub mod error;
pub mod judge;
pub mod stt;
pub mod tts;

pub use error::VoiceError;
pub use judge::{JudgeConfig, JudgeService};
pub use stt::SttService;
pub use tts::{SynthesisEngine, TtsService};
