//! Acoustic HTML transport
//!
//! Encodes a restricted HTML document as a sequence of sine-tone markers with
//! FSK-framed text blocks, and reconstructs a document from captured audio by
//! recognizing marker tones frame by frame.

pub mod error;
pub mod config;
pub mod tone;
pub mod framing;
pub mod fsk;
pub mod symbols;
pub mod html;
pub mod assembler;
pub mod encoder;
pub mod wav;
pub mod spectrum;
pub mod matcher;
pub mod session;
pub mod capture;

pub use capture::{run_session, FrameSource, SampleFrameSource, SessionReport};
pub use config::{DecoderConfig, EncoderConfig};
pub use encoder::{EncodeOp, HtmlEncoder};
pub use error::{HtmlWaveError, Result};
pub use session::{DecodeSession, DecodeState, StopHandle, TickOutcome};
pub use symbols::{Symbol, SymbolTable};

// Audio configuration
pub const SAMPLE_RATE: usize = 44100;
pub const DEFAULT_AMPLITUDE: f32 = 0.7;

/// Offset added to every frequency in ultrasonic mode
pub const ULTRASONIC_SHIFT_HZ: f32 = 20000.0;

// Text block configuration
pub const DEFAULT_BLOCK_SIZE: usize = 16;
pub const PRODUCTION_BLOCK_SIZE: usize = 32;
pub const MAX_BLOCK_SIZE: usize = 255;

/// Tones per FSK byte frame: start bit + 8 data bits + stop bit
pub const FSK_TONES_PER_BYTE: usize = 10;

// Listener configuration
pub const MATCH_TOLERANCE_HZ: f32 = 30.0;
pub const RETRIGGER_DELTA_HZ: f32 = 50.0;
pub const SYMBOL_COOLDOWN_MS: u64 = 500;
pub const ANALYSER_FFT_SIZE: usize = 4096;

/// Convert a duration in seconds to a sample count at `sample_rate`
pub fn seconds_to_samples(seconds: f32, sample_rate: usize) -> usize {
    (seconds * sample_rate as f32).round().max(0.0) as usize
}
