use crate::error::{HtmlWaveError, Result};
use crate::framing::BlockDecoder;
use crate::tone::ToneGenerator;
use crate::FSK_TONES_PER_BYTE;
use std::f32::consts::PI;

// Binary FSK with asynchronous-serial byte framing
//
// Each byte is sent as 10 tones of equal length:
// - start bit: always the "1" tone
// - 8 data bits, least significant bit first
// - stop bit: always the "0" tone
//
// Bit tones have no fade and no gap between them; boundaries are purely
// time based. Marker tones around a payload already carry their own fades.

/// FSK modulator - renders bytes as framed two-tone sequences
#[derive(Debug, Clone)]
pub struct FskModulator {
    tones: ToneGenerator,
    freq_zero: f32,
    freq_one: f32,
    bit_duration: f32,
}

impl FskModulator {
    pub fn new(tones: ToneGenerator, freq_zero: f32, freq_one: f32, bit_duration: f32) -> Self {
        Self {
            tones,
            freq_zero,
            freq_one,
            bit_duration,
        }
    }

    /// Samples per bit tone
    pub fn bit_samples(&self) -> usize {
        self.tones.samples_for(self.bit_duration)
    }

    fn bit_tone(&self, bit: bool) -> Vec<f32> {
        let frequency = if bit { self.freq_one } else { self.freq_zero };
        self.tones.tone(frequency, self.bit_duration, 0.0, 0.0)
    }

    /// Modulate one byte into its 10-tone frame
    pub fn modulate_byte(&self, byte: u8) -> Vec<f32> {
        let mut samples = Vec::with_capacity(FSK_TONES_PER_BYTE * self.bit_samples());

        samples.extend_from_slice(&self.bit_tone(true));
        for bit in 0..8 {
            samples.extend_from_slice(&self.bit_tone((byte >> bit) & 1 == 1));
        }
        samples.extend_from_slice(&self.bit_tone(false));

        samples
    }

    /// Modulate a sequence of bytes, one frame per byte
    pub fn modulate(&self, bytes: &[u8]) -> Vec<f32> {
        // Only two distinct tones exist; render them once and copy
        let zero = self.bit_tone(false);
        let one = self.bit_tone(true);
        let mut samples = Vec::with_capacity(bytes.len() * FSK_TONES_PER_BYTE * zero.len());

        for &byte in bytes {
            samples.extend_from_slice(&one);
            for bit in 0..8 {
                if (byte >> bit) & 1 == 1 {
                    samples.extend_from_slice(&one);
                } else {
                    samples.extend_from_slice(&zero);
                }
            }
            samples.extend_from_slice(&zero);
        }

        samples
    }
}

/// FSK demodulator - classifies each bit window as the nearer of the two tones
///
/// Uses the Goertzel algorithm to measure energy at both frequencies in every
/// bit-length window and picks the stronger one. Frequencies given here are the
/// ones actually present in the audio, i.e. after any ultrasonic shift.
#[derive(Debug, Clone)]
pub struct FskDemodulator {
    sample_rate: f32,
    freq_zero: f32,
    freq_one: f32,
    bit_samples: usize,
}

impl FskDemodulator {
    pub fn new(sample_rate: usize, freq_zero: f32, freq_one: f32, bit_duration: f32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            freq_zero,
            freq_one,
            bit_samples: crate::seconds_to_samples(bit_duration, sample_rate),
        }
    }

    /// Demodulator matching a modulator's tones, window length and shift
    pub fn for_modulator(modulator: &FskModulator) -> Self {
        let shift = modulator.tones.frequency_shift();
        Self {
            sample_rate: modulator.tones.sample_rate() as f32,
            freq_zero: modulator.freq_zero + shift,
            freq_one: modulator.freq_one + shift,
            bit_samples: modulator.bit_samples(),
        }
    }

    /// Compute power for a specific frequency using Goertzel algorithm
    fn goertzel(&self, samples: &[f32], freq: f32) -> f32 {
        let n = samples.len();
        let k = (0.5 + (n as f32 * freq / self.sample_rate)) as usize;
        let omega = 2.0 * PI * k as f32 / n as f32;
        let coeff = 2.0 * omega.cos();

        let mut q1 = 0.0;
        let mut q2 = 0.0;

        for &sample in samples {
            let q0 = coeff * q1 - q2 + sample;
            q2 = q1;
            q1 = q0;
        }

        let real = q1 - q2 * omega.cos();
        let imag = q2 * omega.sin();
        real * real + imag * imag
    }

    /// Classify one bit window: true when the "1" tone carries more energy
    pub fn classify(&self, window: &[f32]) -> bool {
        self.goertzel(window, self.freq_one) > self.goertzel(window, self.freq_zero)
    }

    /// Slice samples into bit windows and classify each one
    /// samples.len() must be a multiple of the bit length
    pub fn demodulate_bits(&self, samples: &[f32]) -> Result<Vec<bool>> {
        if self.bit_samples == 0 || samples.len() % self.bit_samples != 0 {
            return Err(HtmlWaveError::InvalidInputSize);
        }

        Ok(samples
            .chunks(self.bit_samples)
            .map(|window| self.classify(window))
            .collect())
    }

    /// Demodulate framed bytes, checking every start and stop bit
    /// samples.len() must be a multiple of 10 bit lengths
    pub fn demodulate(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let bits = self.demodulate_bits(samples)?;
        if bits.len() % FSK_TONES_PER_BYTE != 0 {
            return Err(HtmlWaveError::InvalidInputSize);
        }

        let mut bytes = Vec::with_capacity(bits.len() / FSK_TONES_PER_BYTE);
        for (index, frame) in bits.chunks(FSK_TONES_PER_BYTE).enumerate() {
            if !frame[0] {
                return Err(HtmlWaveError::FramingError(format!(
                    "byte {} is missing its start bit",
                    index
                )));
            }
            if frame[FSK_TONES_PER_BYTE - 1] {
                return Err(HtmlWaveError::FramingError(format!(
                    "byte {} is missing its stop bit",
                    index
                )));
            }

            let mut byte = 0u8;
            for (bit, &value) in frame[1..9].iter().enumerate() {
                if value {
                    byte |= 1 << bit;
                }
            }
            bytes.push(byte);
        }

        Ok(bytes)
    }
}

/// Payload layer: recovers text from the FSK stream between `text_start` and `text_end`
///
/// Independent of marker recognition. The live decode session does not use it;
/// it exists for byte-accurate decoding of isolated payload audio.
pub struct PayloadDecoder {
    fsk: FskDemodulator,
}

impl PayloadDecoder {
    pub fn new(fsk: FskDemodulator) -> Self {
        Self { fsk }
    }

    /// Demodulate and verify every block (length, bytes, CRC-8), returning the text bytes
    pub fn decode(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let bytes = self.fsk.demodulate(samples)?;
        BlockDecoder::decode(&bytes)
    }
}
