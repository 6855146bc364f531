//! Language-model judgement of transcribed answers.
//!
//! Two-step protocol against an OpenAI-compatible `/chat/completions`
//! endpoint: first a validation prompt that must be answered `Valid` or
//! `Invalid`, then, only for invalid answers, a second call that generates
//! the clarifying follow-up question to speak to the caller.

use crate::error::VoiceError;
use async_trait::async_trait;
use canvass_types::{CollaboratorError, Judge, Judgement};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token budget for judgement replies. Verdicts are one word and follow-ups
/// one sentence; anything longer is wasted latency on a live call.
const MAX_COMPLETION_TOKENS: u32 = 100;

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Base URL of the chat API, e.g. `https://api.openai.com/v1`.
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-request bounded wait, in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

/// Judgement collaborator backed by a chat-completion model.
#[derive(Debug, Clone)]
pub struct JudgeService {
    http: reqwest::Client,
    config: JudgeConfig,
}

impl JudgeService {
    pub fn new(config: JudgeConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Sends one user message and returns the model's reply text.
    async fn chat(&self, content: &str) -> Result<String, VoiceError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VoiceError::Judge(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Judge(format!(
                "chat API returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Judge(format!("malformed chat response: {}", e)))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VoiceError::Judge("chat response had no choices".to_string()))?
            .message
            .content
            .trim()
            .to_string();

        Ok(reply)
    }

    pub async fn evaluate_answer(
        &self,
        prompt: &str,
        answer: &str,
    ) -> Result<Judgement, VoiceError> {
        let validation = format!(
            "Question: {}\nAnswer: {}\n\
             Instruction: Is this answer valid and does it clearly answer the question? \
             Respond with 'Valid' or 'Invalid'.",
            prompt, answer
        );

        let verdict = self.chat(&validation).await?;
        tracing::debug!(verdict = %verdict, "judgement verdict");

        if verdict_accepts(&verdict) {
            return Ok(Judgement::Accepted {
                value: answer.to_string(),
            });
        }

        let follow_up_prompt = format!(
            "The user was asked: '{}'\n\
             Their answer was: '{}', which seems invalid or unclear.\n\
             Generate one short follow-up question that will help clarify or correct \
             their response. Reply with the question only.",
            prompt, answer
        );

        let follow_up = self.chat(&follow_up_prompt).await?;
        Ok(Judgement::FollowUp {
            question: follow_up,
        })
    }
}

/// True when the verdict text accepts the answer.
///
/// The match is on the capitalized token, so `Invalid` (whose lowercase tail
/// contains "valid") never reads as acceptance.
fn verdict_accepts(verdict: &str) -> bool {
    verdict.contains("Valid")
}

#[async_trait]
impl Judge for JudgeService {
    async fn evaluate(&self, prompt: &str, answer: &str) -> Result<Judgement, CollaboratorError> {
        self.evaluate_answer(prompt, answer)
            .await
            .map_err(|e| CollaboratorError::Judgement(e.to_string()))
    }
}
