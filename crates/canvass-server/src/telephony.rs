//! Twilio REST integration: outbound call placement and recording download.
//!
//! The webhook boundary never touches these endpoints for flow decisions;
//! they only place calls (operator trigger) and retrieve the recorded answer
//! audio that a webhook references by URL.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Bounded wait for vendor REST calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("invalid telephony configuration: {0}")]
    Config(String),

    #[error("call placement failed: {0}")]
    Placement(String),

    #[error("recording fetch failed: {0}")]
    Recording(String),
}

/// Retrieves the recorded answer audio referenced by a webhook.
///
/// A trait seam so router tests can feed canned audio without a vendor
/// account.
#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    async fn fetch(&self, recording_url: &str) -> Result<Vec<u8>, TelephonyError>;
}

/// Twilio REST API client.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    api_base_url: String,
    account_sid: String,
    auth_token: String,
    caller_number: String,
}

#[derive(Debug, Deserialize)]
struct CallCreated {
    sid: String,
}

impl TwilioClient {
    pub fn new(
        api_base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        caller_number: impl Into<String>,
    ) -> Result<Self, TelephonyError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelephonyError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base_url: api_base_url.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            caller_number: caller_number.into(),
        })
    }

    fn calls_endpoint(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base_url.trim_end_matches('/'),
            self.account_sid
        )
    }

    /// Places an outbound call and points the vendor at `webhook_url` for
    /// the call-connected event. Returns the vendor's call sid.
    pub async fn create_call(
        &self,
        to_number: &str,
        webhook_url: &str,
    ) -> Result<String, TelephonyError> {
        let params = [
            ("To", to_number),
            ("From", self.caller_number.as_str()),
            ("Url", webhook_url),
        ];

        let response = self
            .http
            .post(self.calls_endpoint())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| TelephonyError::Placement(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelephonyError::Placement(format!(
                "vendor returned {}: {}",
                status, body
            )));
        }

        let created: CallCreated = response
            .json()
            .await
            .map_err(|e| TelephonyError::Placement(format!("malformed response: {}", e)))?;

        tracing::info!(call_sid = %created.sid, to = to_number, "outbound call placed");
        Ok(created.sid)
    }
}

/// The vendor serves recordings in WAV when the `.wav` extension is
/// requested.
fn wav_url(recording_url: &str) -> String {
    if recording_url.ends_with(".wav") {
        recording_url.to_string()
    } else {
        format!("{}.wav", recording_url)
    }
}

#[async_trait]
impl RecordingFetcher for TwilioClient {
    async fn fetch(&self, recording_url: &str) -> Result<Vec<u8>, TelephonyError> {
        let response = self
            .http
            .get(wav_url(recording_url))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| TelephonyError::Recording(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelephonyError::Recording(format!(
                "vendor returned {} for {}",
                status, recording_url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TelephonyError::Recording(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
