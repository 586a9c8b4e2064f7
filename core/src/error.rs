use thiserror::Error;

#[derive(Debug, Error)]
pub enum HtmlWaveError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("Insufficient data")]
    InsufficientData,

    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedWav(String),

    #[error("FSK framing error: {0}")]
    FramingError(String),

    #[error("CRC mismatch in text block (expected {expected:#04x}, computed {computed:#04x})")]
    PayloadCrcMismatch { expected: u8, computed: u8 },

    #[error("Capture source unavailable: {0}")]
    CaptureUnavailable(String),
}

pub type Result<T> = std::result::Result<T, HtmlWaveError>;
