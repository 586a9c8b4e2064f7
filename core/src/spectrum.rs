use crate::config::DecoderConfig;
use crate::error::{HtmlWaveError, Result};
use futuredsp::windows;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Index of the strongest bin strictly above `threshold`
///
/// Bins are scanned in order and a later bin only wins if it is strictly
/// greater, so the first bin reaching the maximum is returned.
pub fn peak_bin(magnitudes: &[u8], threshold: u8) -> Option<usize> {
    let mut peak: Option<(usize, u8)> = None;
    for (bin, &value) in magnitudes.iter().enumerate() {
        if value <= threshold {
            continue;
        }
        match peak {
            Some((_, max)) if value <= max => {}
            _ => peak = Some((bin, value)),
        }
    }
    peak.map(|(bin, _)| bin)
}

/// Center frequency of an analyser bin
pub fn bin_frequency(bin: usize, sample_rate: usize, fft_size: usize) -> f32 {
    bin as f32 * sample_rate as f32 / fft_size as f32
}

/// Frequency of the strongest bin above `threshold`, if any
pub fn dominant_frequency(
    magnitudes: &[u8],
    threshold: u8,
    sample_rate: usize,
    fft_size: usize,
) -> Option<f32> {
    peak_bin(magnitudes, threshold).map(|bin| bin_frequency(bin, sample_rate, fft_size))
}

/// Byte-scaled magnitude spectrum with the behavior of a Web Audio analyser
///
/// Each frame of `fft_size` samples is Blackman windowed and transformed;
/// magnitudes are normalized by the window length, averaged with the
/// previous frame by `smoothing`, converted to decibels and mapped linearly
/// from `[min_decibels, max_decibels]` onto `0..=255`. Only the lower
/// `fft_size / 2` bins are reported.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumAnalyser {
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        config.validate()?;
        let fft_size = config.fft_size;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft,
            fft_size,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of reported bins
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse one frame of exactly `fft_size` samples
    pub fn analyse(&mut self, frame: &[f32]) -> Result<Vec<u8>> {
        if frame.len() != self.fft_size {
            return Err(HtmlWaveError::InvalidInputSize);
        }

        for ((slot, &sample), &weight) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new(sample * weight, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let range = self.max_decibels - self.min_decibels;
        let mut bytes = Vec::with_capacity(self.smoothed.len());

        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.buffer) {
            let magnitude = bin.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;

            let decibels = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (decibels - self.min_decibels) / range;
            bytes.push(scaled.clamp(0.0, 255.0) as u8);
        }

        Ok(bytes)
    }

    /// Forget the smoothing history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

/// Periodic Blackman window of `size` taps
///
/// The symmetric window one tap longer, with its last tap dropped.
fn blackman_window(size: usize) -> Vec<f32> {
    let mut taps = windows::blackman(size + 1, false);
    taps.truncate(size);
    taps.into_iter().map(|w| w as f32).collect()
}
