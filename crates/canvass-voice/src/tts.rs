use crate::error::VoiceError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for synthesis (16 KiB). Prompts and follow-ups are
/// a sentence or two; anything larger is a misconfigured script.
const MAX_TTS_INPUT_BYTES: usize = 16 * 1024;

/// Bounded wait for the synthesis process.
const TTS_TIMEOUT: Duration = Duration::from_secs(30);

/// Supported synthesis backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthesisEngine {
    /// Piper TTS (ONNX-based, fast, local).
    #[default]
    Piper,
    /// espeak-ng, the cross-platform fallback.
    System,
}

/// Renders prompt text to a playable WAV file in the media directory.
///
/// The returned value is the generated file name, not a path: the webhook
/// boundary turns it into a public URL the telephony vendor can fetch and
/// play. Synthesis failures are errors here; the boundary degrades them to
/// the vendor's own speech verb so the caller always hears something.
#[derive(Debug, Clone)]
pub struct TtsService {
    engine: SynthesisEngine,
    binary_path: PathBuf,
    model_path: PathBuf,
    media_dir: PathBuf,
}

impl TtsService {
    pub fn new(
        engine: SynthesisEngine,
        binary_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            binary_path: binary_path.into(),
            model_path: model_path.into(),
            media_dir: media_dir.into(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Synthesizes `text` and returns the name of the WAV file written into
    /// the media directory.
    pub async fn synthesize(&self, text: &str) -> Result<String, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let wav = match self.engine {
            SynthesisEngine::Piper => self.run_piper(text).await?,
            SynthesisEngine::System => self.run_espeak(text).await?,
        };

        let file_name = format!("tts_{}.wav", uuid::Uuid::new_v4().simple());
        let path = self.media_dir.join(&file_name);

        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| VoiceError::Tts(format!("failed to create media dir: {}", e)))?;
        tokio::fs::write(&path, &wav)
            .await
            .map_err(|e| VoiceError::Tts(format!("failed to write {:?}: {}", path, e)))?;

        Ok(file_name)
    }

    /// Piper reads text on stdin and writes a WAV container to stdout when
    /// `--output_file -` is given.
    async fn run_piper(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        if !self.model_path.exists() {
            return Err(VoiceError::Tts(format!(
                "model file not found: {:?}",
                self.model_path
            )));
        }

        let mut child = Command::new(&self.binary_path)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--output_file")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("failed to spawn piper: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("failed to open stdin".to_string()))?;
        let text_owned = text.to_string();

        // Write from a task so a full stdout pipe cannot deadlock us.
        let write_task = tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output = tokio::time::timeout(TTS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    TTS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("failed to wait for piper: {}", e)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(VoiceError::Tts(format!("failed to write text: {}", e))),
            Err(e) => return Err(VoiceError::Tts(format!("stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Tts(format!("piper failed: {}", stderr)));
        }

        Ok(output.stdout)
    }

    /// espeak-ng takes the text as an argument and emits WAV on stdout with
    /// `--stdout`.
    async fn run_espeak(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        let binary: &Path = if self.binary_path.as_os_str().is_empty() {
            Path::new("espeak-ng")
        } else {
            &self.binary_path
        };

        let child = Command::new(binary)
            .arg("--stdout")
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("failed to spawn espeak-ng: {}", e)))?;

        let output = tokio::time::timeout(TTS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    TTS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("failed to wait for espeak-ng: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Tts(format!("espeak-ng failed: {}", stderr)));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_text_is_rejected() {
        let service = TtsService::new(SynthesisEngine::System, "", "", "/tmp/canvass-media");
        let text = "a".repeat(MAX_TTS_INPUT_BYTES + 1);

        let err = service.synthesize(&text).await.unwrap_err();
        match err {
            VoiceError::Tts(msg) => assert!(msg.contains("maximum size")),
            other => panic!("expected Tts error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn piper_requires_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = TtsService::new(
            SynthesisEngine::Piper,
            "piper",
            dir.path().join("missing.onnx"),
            dir.path(),
        );

        let err = service.synthesize("Hello").await.unwrap_err();
        match err {
            VoiceError::Tts(msg) => assert!(msg.contains("model file not found")),
            other => panic!("expected Tts error, got {:?}", other),
        }
    }
}
