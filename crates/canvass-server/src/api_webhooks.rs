//! Telephony webhook handlers.
//!
//! Two inbound events only: call-connected and answer-recorded. Handlers
//! translate the vendor's form payloads into controller calls and render the
//! returned [`FlowStep`] into TwiML; no flow decisions are made here.

use crate::api::ApiError;
use crate::twiml::{Twiml, VoiceReply};
use crate::AppState;
use axum::extract::{Extension, Form, Query};
use canvass_flow::{FlowError, FlowStep};
use canvass_types::QuestionId;
use serde::Deserialize;
use std::sync::Arc;

/// Recording cap per answer, in seconds.
const RECORD_MAX_LENGTH_SECS: u32 = 30;

/// Silence cutoff that ends a recording early, in seconds.
const RECORD_SILENCE_TIMEOUT_SECS: u32 = 5;

/// Form payload of a call-connected event.
#[derive(Debug, Deserialize)]
pub struct ConnectedEvent {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
}

/// Form payload of an answer-recorded event.
#[derive(Debug, Deserialize)]
pub struct AnswerEvent {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
}

/// Query parameters of the answer-recorded callback. The question id is
/// threaded through the record action URL so a late or duplicated delivery
/// identifies which question it was recorded for.
#[derive(Debug, Deserialize)]
pub struct AnswerParams {
    pub question: String,
}

/// Handler for `POST /voice/connected`.
pub async fn call_connected_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(event): Form<ConnectedEvent>,
) -> Result<Twiml, ApiError> {
    if event.call_sid.trim().is_empty() {
        return Err(ApiError::BadRequest("missing CallSid".to_string()));
    }

    let step = state.controller.begin_call(&event.call_sid);
    Ok(render_step(&state, step).await)
}

/// Handler for `POST /voice/answer`.
pub async fn answer_recorded_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<AnswerParams>,
    Form(event): Form<AnswerEvent>,
) -> Result<Twiml, ApiError> {
    if event.call_sid.trim().is_empty() {
        return Err(ApiError::BadRequest("missing CallSid".to_string()));
    }
    let expected = QuestionId::new(params.question);

    let audio = match &event.recording_url {
        Some(url) => match state.recordings.fetch(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(
                    call_sid = %event.call_sid,
                    error = %e,
                    "failed to retrieve recording"
                );
                None
            }
        },
        None => {
            tracing::warn!(call_sid = %event.call_sid, "answer event without a recording URL");
            None
        }
    };

    let step = match audio {
        Some(bytes) => {
            state
                .controller
                .submit_answer(&event.call_sid, &expected, &bytes)
                .await
        }
        // The recording never made it to us: apologize and re-ask rather
        // than dropping the call.
        None => state.controller.recover(&event.call_sid),
    };

    match step {
        Ok(step) => Ok(render_step(&state, step).await),
        Err(FlowError::UnknownCall(id)) => {
            Err(ApiError::BadRequest(format!("unknown call: {}", id)))
        }
        Err(e) => Err(ApiError::InternalServerError(e.to_string())),
    }
}

/// Renders a controller decision into the vendor reply document.
///
/// Speech prefers synthesized audio served from the media dir; when
/// synthesis fails the vendor's own voice reads the text instead, so the
/// caller never gets silence.
async fn render_step(state: &AppState, step: FlowStep) -> Twiml {
    match step {
        FlowStep::Gather {
            question_id,
            speech,
        } => {
            let reply = speak(state, VoiceReply::new(), &speech).await;
            reply
                .record(
                    &answer_action(&question_id),
                    RECORD_MAX_LENGTH_SECS,
                    RECORD_SILENCE_TIMEOUT_SECS,
                )
                .into_twiml()
        }
        FlowStep::Hangup { speech } => {
            let reply = speak(state, VoiceReply::new(), &speech).await;
            reply.hangup().into_twiml()
        }
    }
}

async fn speak(state: &AppState, reply: VoiceReply, speech: &str) -> VoiceReply {
    match state.tts.synthesize(speech).await {
        Ok(file_name) => reply.play(&format!(
            "{}/media/{}",
            state.public_url.trim_end_matches('/'),
            file_name
        )),
        Err(e) => {
            tracing::debug!(error = %e, "synthesis unavailable, falling back to vendor speech");
            reply.say(speech)
        }
    }
}

fn answer_action(question_id: &QuestionId) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("question", question_id.as_str())
        .finish();
    format!("/voice/answer?{}", query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_action_encodes_the_question_id() {
        assert_eq!(
            answer_action(&QuestionId::new("Q1")),
            "/voice/answer?question=Q1"
        );
        assert_eq!(
            answer_action(&QuestionId::new("about you")),
            "/voice/answer?question=about+you"
        );
    }
}
