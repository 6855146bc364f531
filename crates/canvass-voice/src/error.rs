use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("judgement error: {0}")]
    Judge(String),
}
