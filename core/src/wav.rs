use crate::error::{HtmlWaveError, Result};

/// Size of the canonical PCM WAV header
pub const WAV_HEADER_SIZE: usize = 44;

const PCM_FORMAT: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Convert samples to 16-bit signed little-endian PCM
///
/// Each sample is clamped to [-1, 1] and scaled by 32767, truncating toward zero.
pub fn to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert 16-bit little-endian PCM back to samples in [-1, 1]
///
/// A trailing odd byte is ignored.
pub fn from_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32767.0)
        .collect()
}

/// Canonical 44-byte header for mono 16-bit PCM
pub fn wav_header(data_size: u32, sample_rate: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&data_size.wrapping_add(36).to_le_bytes());
    header[8..16].copy_from_slice(b"WAVEfmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT.to_le_bytes());
    header[22..24].copy_from_slice(&1u16.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&sample_rate.wrapping_mul(2).to_le_bytes());
    header[32..34].copy_from_slice(&2u16.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Fields of a canonical WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl WavHeader {
    /// Parse the 44-byte canonical layout at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(HtmlWaveError::InvalidWav(format!(
                "header needs {} bytes, got {}",
                WAV_HEADER_SIZE,
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(HtmlWaveError::InvalidWav("missing RIFF/WAVE tags".to_string()));
        }
        if &bytes[12..16] != b"fmt " || read_u32(bytes, 16) != 16 {
            return Err(HtmlWaveError::InvalidWav(
                "expected a 16-byte fmt chunk right after the RIFF header".to_string(),
            ));
        }
        if &bytes[36..40] != b"data" {
            return Err(HtmlWaveError::InvalidWav(
                "expected the data chunk right after fmt".to_string(),
            ));
        }

        Ok(Self {
            format: read_u16(bytes, 20),
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            byte_rate: read_u32(bytes, 28),
            block_align: read_u16(bytes, 32),
            bits_per_sample: read_u16(bytes, 34),
            data_size: read_u32(bytes, 40),
        })
    }
}

/// Header followed by the PCM data of `samples`
pub fn write_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let pcm = to_pcm16(samples);
    let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE + pcm.len());
    bytes.extend_from_slice(&wav_header(pcm.len() as u32, sample_rate));
    bytes.extend_from_slice(&pcm);
    bytes
}

/// Read a canonical mono 16-bit PCM WAV, returning its samples and sample rate
///
/// Anything else is rejected; general WAV input goes through `hound` in the CLI.
pub fn read_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let header = WavHeader::parse(bytes)?;
    if header.format != PCM_FORMAT {
        return Err(HtmlWaveError::UnsupportedWav(format!(
            "format tag {} (only PCM is supported)",
            header.format
        )));
    }
    if header.channels != 1 || header.bits_per_sample != BITS_PER_SAMPLE {
        return Err(HtmlWaveError::UnsupportedWav(format!(
            "{} channel(s) at {} bits (only mono 16-bit is supported)",
            header.channels, header.bits_per_sample
        )));
    }

    let data = &bytes[WAV_HEADER_SIZE..];
    let data_size = header.data_size as usize;
    if data.len() < data_size {
        return Err(HtmlWaveError::InvalidWav(format!(
            "data chunk declares {} bytes but only {} follow",
            data_size,
            data.len()
        )));
    }

    Ok((from_pcm16(&data[..data_size]), header.sample_rate))
}
