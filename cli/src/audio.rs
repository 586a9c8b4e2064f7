use hound::{SampleFormat, WavSpec};
use std::path::Path;

/// Read any PCM or float WAV file as mono samples in [-1, 1]
///
/// Multi-channel files are mixed down by averaging each frame.
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    log::info!(
        "read WAV: {} Hz, {} channels, {} bits {:?}",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(format!("Unsupported WAV format: {:?} at {} bits", format, bits).into());
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Write samples as a 16-bit mono WAV file
pub fn write_mono(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        // Clamp to [-1.0, 1.0] range to avoid overflow, then scale to i16
        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("htmlwave-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_write_then_read_mono() {
        let path = temp_path("mono.wav");
        let samples = vec![0.0, 0.5, -0.5, 0.25];
        write_mono(&path, &samples, 44100).unwrap();

        let (read, rate) = read_mono(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rate, 44100);
        assert_eq!(read.len(), samples.len());
        for (a, b) in read.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_stereo_is_mixed_down() {
        let path = temp_path("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (left, right) in [(0.5f32, 0.0f32), (-0.25, -0.75)] {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();

        let (read, rate) = read_mono(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rate, 8000);
        assert_eq!(read, vec![0.25, -0.5]);
    }
}
