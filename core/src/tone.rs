use crate::assembler::FrameAssembler;
use crate::seconds_to_samples;
use std::f32::consts::PI;

/// Fade applied to each tone of a raw tone sequence
const SEQUENCE_FADE_SECONDS: f32 = 0.01;

/// Sine tone generator with linear fade envelopes
///
/// Every tone is a pure function of its parameters: frequency (plus the
/// configured shift), duration, fade lengths, sample rate and amplitude.
/// Samples are not clipped here; clamping happens at PCM serialization.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    sample_rate: usize,
    amplitude: f32,
    frequency_shift: f32,
}

impl ToneGenerator {
    pub fn new(sample_rate: usize, amplitude: f32, frequency_shift: f32) -> Self {
        Self {
            sample_rate,
            amplitude,
            frequency_shift,
        }
    }

    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    pub fn frequency_shift(&self) -> f32 {
        self.frequency_shift
    }

    /// Number of samples produced for `seconds` of audio
    pub fn samples_for(&self, seconds: f32) -> usize {
        seconds_to_samples(seconds, self.sample_rate)
    }

    /// Generate one tone
    ///
    /// The first `fade_in` seconds ramp up linearly from zero, the last
    /// `fade_out` seconds ramp down. A fade that rounds to zero samples
    /// leaves that edge untouched.
    pub fn tone(&self, frequency: f32, duration: f32, fade_in: f32, fade_out: f32) -> Vec<f32> {
        let frequency = frequency + self.frequency_shift;
        let samples = self.samples_for(duration);
        let fade_in_samples = self.samples_for(fade_in);
        let fade_out_samples = self.samples_for(fade_out);
        let sample_rate = self.sample_rate as f32;

        let mut audio = vec![0.0f32; samples];
        for (i, sample) in audio.iter_mut().enumerate() {
            let t = i as f32 / sample_rate;
            let mut value = (2.0 * PI * frequency * t).sin() * self.amplitude;

            if fade_in_samples > 0 && i < fade_in_samples {
                value *= i as f32 / fade_in_samples as f32;
            }
            if fade_out_samples > 0 && i + fade_out_samples >= samples {
                value *= (samples - i) as f32 / fade_out_samples as f32;
            }

            *sample = value;
        }

        audio
    }

    /// Render raw frequencies back to back, each followed by `gap` seconds of silence
    pub fn sequence(&self, frequencies: &[f32], tone_duration: f32, gap: f32) -> Vec<f32> {
        let gap_samples = if gap > 0.0 { self.samples_for(gap) } else { 0 };
        let per_tone = self.samples_for(tone_duration) + gap_samples;
        let mut assembler = FrameAssembler::with_capacity(per_tone * frequencies.len());

        for &frequency in frequencies {
            assembler.push(&self.tone(
                frequency,
                tone_duration,
                SEQUENCE_FADE_SECONDS,
                SEQUENCE_FADE_SECONDS,
            ));
            if gap_samples > 0 {
                assembler.push_silence(gap_samples);
            }
        }
        assembler.finish()
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new(crate::SAMPLE_RATE, crate::DEFAULT_AMPLITUDE, 0.0)
    }
}
