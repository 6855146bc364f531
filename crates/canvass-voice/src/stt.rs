use crate::error::VoiceError;
use async_trait::async_trait;
use canvass_types::{CollaboratorError, Transcriber};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum audio input size for transcription (8 MiB). A 30-second answer
/// recording is well under 1 MiB; anything larger is a malformed payload.
const MAX_STT_INPUT_BYTES: usize = 8 * 1024 * 1024;

/// Bounded wait for the transcription process. Expiry is reported as an
/// error, which the controller degrades into a spoken apology.
const STT_TIMEOUT: Duration = Duration::from_secs(60);

/// Speech-to-text over a whisper.cpp subprocess.
///
/// The binary receives WAV bytes on stdin (`-f -`) and writes the transcript
/// to stdout. An empty transcript is a valid result: it means the caller was
/// silent, which the flow controller treats as "didn't hear you" rather than
/// as a failure.
#[derive(Debug, Clone)]
pub struct SttService {
    binary_path: PathBuf,
    model_path: PathBuf,
}

impl SttService {
    pub fn new(binary_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model_path: model_path.into(),
        }
    }

    pub async fn transcribe_audio(&self, audio: &[u8]) -> Result<String, VoiceError> {
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let mut child = Command::new(&self.binary_path)
            .arg("-m")
            .arg(&self.model_path)
            .arg("-nt") // no timestamps, transcript text only
            .arg("-f")
            .arg("-") // read audio from stdin
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("failed to spawn STT binary: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Stt("failed to open stdin".to_string()))?;

        // Feed audio from a task so a full stdout pipe cannot deadlock us.
        let audio_owned = audio.to_vec();
        let write_task =
            tokio::spawn(async move { stdin.write_all(&audio_owned).await.map(|_| drop(stdin)) });

        let output = tokio::time::timeout(STT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Stt(format!(
                    "STT process timed out after {} seconds",
                    STT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Stt(format!("failed to wait for STT process: {}", e)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                // Short clips can finish before the write completes; a broken
                // pipe with a successful exit still yields a usable transcript.
                if !output.status.success() {
                    return Err(VoiceError::Stt(format!("failed to write audio: {}", e)));
                }
            }
            Err(e) => return Err(VoiceError::Stt(format!("stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!("STT binary failed: {}", stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Transcriber for SttService {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, CollaboratorError> {
        self.transcribe_audio(audio)
            .await
            .map_err(|e| CollaboratorError::Transcription(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_audio_is_rejected_before_spawning() {
        let service = SttService::new("/nonexistent/whisper", "/nonexistent/model.bin");
        let audio = vec![0u8; MAX_STT_INPUT_BYTES + 1];

        let err = service.transcribe_audio(&audio).await.unwrap_err();
        match err {
            VoiceError::Stt(msg) => assert!(msg.contains("maximum size")),
            other => panic!("expected Stt error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let service = SttService::new("/nonexistent/whisper", "/nonexistent/model.bin");

        let err = service.transcribe_audio(b"RIFF").await.unwrap_err();
        match err {
            VoiceError::Stt(msg) => assert!(msg.contains("spawn")),
            other => panic!("expected Stt error, got {:?}", other),
        }
    }
}
