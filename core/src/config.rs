use crate::error::{HtmlWaveError, Result};
use crate::{
    ANALYSER_FFT_SIZE, DEFAULT_AMPLITUDE, DEFAULT_BLOCK_SIZE, MATCH_TOLERANCE_HZ, MAX_BLOCK_SIZE,
    PRODUCTION_BLOCK_SIZE, RETRIGGER_DELTA_HZ, SAMPLE_RATE, SYMBOL_COOLDOWN_MS,
    ULTRASONIC_SHIFT_HZ,
};
use std::time::Duration;

/// Configuration for the HTML encoder
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// Shift every emitted frequency by [`ULTRASONIC_SHIFT_HZ`]
    pub ultrasonic: bool,
    /// Marker tone length in seconds
    pub tone_duration: f32,
    /// Silence inserted after each tone when sequencing raw tones
    pub gap_duration: f32,
    /// Length of one FSK bit tone in seconds
    pub fsk_bit_duration: f32,
    /// Bytes per text block (at most 255, the block length travels in one byte)
    pub block_size: usize,
    /// Fade-in and fade-out applied to each marker tone, in seconds
    pub marker_fade: f32,
    /// Peak amplitude of synthesized tones
    pub amplitude: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ultrasonic: false,
            tone_duration: 0.3,
            gap_duration: 0.1,
            fsk_bit_duration: 0.08,
            block_size: DEFAULT_BLOCK_SIZE,
            marker_fade: 0.02,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }
}

impl EncoderConfig {
    /// Settings used when encoding documents to files
    pub fn production() -> Self {
        Self {
            block_size: PRODUCTION_BLOCK_SIZE,
            ..Self::default()
        }
    }

    pub fn with_ultrasonic(mut self, ultrasonic: bool) -> Self {
        self.ultrasonic = ultrasonic;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn frequency_shift(&self) -> f32 {
        if self.ultrasonic {
            ULTRASONIC_SHIFT_HZ
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "block_size must be between 1 and {}, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }

        for (name, value) in [
            ("tone_duration", self.tone_duration),
            ("fsk_bit_duration", self.fsk_bit_duration),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(HtmlWaveError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("gap_duration", self.gap_duration),
            ("marker_fade", self.marker_fade),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HtmlWaveError::InvalidConfig(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        if 2.0 * self.marker_fade > self.tone_duration {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "marker fades ({}s each) do not fit in a {}s tone",
                self.marker_fade, self.tone_duration
            )));
        }

        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "amplitude must be in (0, 1], got {}",
                self.amplitude
            )));
        }

        Ok(())
    }
}

/// Configuration for a decode session and the analyser feeding it
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// Expect frequencies shifted by [`ULTRASONIC_SHIFT_HZ`]
    pub ultrasonic: bool,
    pub sample_rate: usize,
    /// Analysis window length; bin spacing is `sample_rate / fft_size`
    pub fft_size: usize,
    /// Byte-scale magnitude a bin must exceed to count as a peak
    pub threshold: u8,
    /// Exponential averaging between consecutive spectra, in [0, 1)
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Maximum distance (exclusive) between a peak and a table frequency
    pub tolerance_hz: f32,
    /// Minimum change from the last accepted peak before it is looked up again
    pub retrigger_hz: f32,
    /// Per-symbol window during which repeats are dropped
    pub cooldown: Duration,
    /// Samples between two analysis ticks when driving from recorded audio
    pub hop_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ultrasonic: false,
            sample_rate: SAMPLE_RATE,
            fft_size: ANALYSER_FFT_SIZE,
            threshold: 128,
            smoothing: 0.8,
            min_decibels: -90.0,
            max_decibels: -10.0,
            tolerance_hz: MATCH_TOLERANCE_HZ,
            retrigger_hz: RETRIGGER_DELTA_HZ,
            cooldown: Duration::from_millis(SYMBOL_COOLDOWN_MS),
            // One tick per display refresh at 60 Hz
            hop_size: SAMPLE_RATE / 60,
        }
    }
}

impl DecoderConfig {
    pub fn with_ultrasonic(mut self, ultrasonic: bool) -> Self {
        self.ultrasonic = ultrasonic;
        self
    }

    pub fn frequency_shift(&self) -> f32 {
        if self.ultrasonic {
            ULTRASONIC_SHIFT_HZ
        } else {
            0.0
        }
    }

    /// Frequency spacing between analyser bins
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(HtmlWaveError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "fft_size must be a power of two in [32, 32768], got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            )));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if !(self.tolerance_hz > 0.0) {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "tolerance_hz must be positive, got {}",
                self.tolerance_hz
            )));
        }
        if !(self.retrigger_hz >= 0.0) {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "retrigger_hz must not be negative, got {}",
                self.retrigger_hz
            )));
        }
        if self.hop_size == 0 {
            return Err(HtmlWaveError::InvalidConfig(
                "hop_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_are_valid() {
        assert!(EncoderConfig::default().validate().is_ok());
        assert!(EncoderConfig::production().validate().is_ok());
        assert!(DecoderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_block_size_limits() {
        assert!(EncoderConfig::default().with_block_size(255).validate().is_ok());
        assert!(EncoderConfig::default().with_block_size(256).validate().is_err());
        assert!(EncoderConfig::default().with_block_size(0).validate().is_err());
    }

    #[test]
    fn test_non_positive_durations_rejected() {
        let config = EncoderConfig {
            tone_duration: 0.0,
            ..EncoderConfig::default()
        };
        assert!(matches!(config.validate(), Err(HtmlWaveError::InvalidConfig(_))));

        let config = EncoderConfig {
            fsk_bit_duration: -0.01,
            ..EncoderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EncoderConfig {
            gap_duration: f32::NAN,
            ..EncoderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_gap_is_allowed() {
        let config = EncoderConfig {
            gap_duration: 0.0,
            ..EncoderConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ultrasonic_shift() {
        assert_eq!(EncoderConfig::default().frequency_shift(), 0.0);
        assert_eq!(
            EncoderConfig::default().with_ultrasonic(true).frequency_shift(),
            ULTRASONIC_SHIFT_HZ
        );
        assert_eq!(
            DecoderConfig::default().with_ultrasonic(true).frequency_shift(),
            ULTRASONIC_SHIFT_HZ
        );
    }

    #[test]
    fn test_decoder_config_rejects_bad_fft_size() {
        let config = DecoderConfig {
            fft_size: 1000,
            ..DecoderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frequency_tolerance_limits() {
        let config = DecoderConfig {
            retrigger_hz: 0.0,
            ..DecoderConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = DecoderConfig {
            retrigger_hz: -1.0,
            ..DecoderConfig::default()
        };
        match config.validate() {
            Err(HtmlWaveError::InvalidConfig(msg)) => assert!(msg.contains("retrigger_hz")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }

        let config = DecoderConfig {
            tolerance_hz: 0.0,
            ..DecoderConfig::default()
        };
        match config.validate() {
            Err(HtmlWaveError::InvalidConfig(msg)) => assert!(msg.contains("tolerance_hz")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_bin_width() {
        let config = DecoderConfig {
            sample_rate: 48000,
            fft_size: 4800usize.next_power_of_two(),
            ..DecoderConfig::default()
        };
        assert!((config.bin_width() - 48000.0 / 8192.0).abs() < 1e-6);
    }
}
