use crate::config::DecoderConfig;
use crate::error::{HtmlWaveError, Result};
use crate::session::{DecodeSession, DecodeState, TickOutcome};
use crate::spectrum::SpectrumAnalyser;
use std::time::Duration;

/// One analysis tick worth of input
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    /// Time of the frame relative to the start of capture
    pub at: Duration,
    /// Byte-scaled magnitude per bin
    pub spectrum: Vec<u8>,
}

/// Producer of analysis frames (a microphone, a file, a test fixture)
pub trait FrameSource {
    /// Next frame, or `None` once the input is exhausted
    fn next_frame(&mut self) -> Result<Option<AnalysisFrame>>;

    /// Release the underlying capture resource; later calls must be harmless
    fn close(&mut self);
}

/// Frame source over recorded samples
///
/// Every `hop_size` samples it analyses the latest `fft_size` samples,
/// zero-padded before the start of the recording, the way a live analyser
/// sees the most recent audio at each display tick.
pub struct SampleFrameSource {
    samples: Vec<f32>,
    analyser: SpectrumAnalyser,
    window: Vec<f32>,
    hop_size: usize,
    sample_rate: usize,
    end: usize,
    closed: bool,
}

impl SampleFrameSource {
    pub fn new(samples: Vec<f32>, config: &DecoderConfig) -> Result<Self> {
        let analyser = SpectrumAnalyser::new(config)?;
        Ok(Self {
            window: vec![0.0; analyser.fft_size()],
            samples,
            analyser,
            hop_size: config.hop_size,
            sample_rate: config.sample_rate,
            end: 0,
            closed: false,
        })
    }

    /// Total number of ticks this source produces
    pub fn tick_count(&self) -> usize {
        self.samples.len().div_ceil(self.hop_size)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn fill_window(&mut self) {
        let fft_size = self.window.len();
        for (offset, slot) in self.window.iter_mut().enumerate() {
            // Sample index for this slot, counting back from the frame end
            *slot = (self.end + offset)
                .checked_sub(fft_size)
                .and_then(|index| self.samples.get(index))
                .copied()
                .unwrap_or(0.0);
        }
    }
}

impl FrameSource for SampleFrameSource {
    fn next_frame(&mut self) -> Result<Option<AnalysisFrame>> {
        if self.closed {
            return Err(HtmlWaveError::CaptureUnavailable(
                "sample source already closed".to_string(),
            ));
        }
        if self.end >= self.samples.len() {
            return Ok(None);
        }

        self.end += self.hop_size;
        self.fill_window();
        let spectrum = self.analyser.analyse(&self.window)?;

        Ok(Some(AnalysisFrame {
            at: Duration::from_secs_f64(self.end as f64 / self.sample_rate as f64),
            spectrum,
        }))
    }

    fn close(&mut self) {
        if !self.closed {
            log::debug!("closing sample source after {} samples", self.end);
        }
        self.closed = true;
    }
}

/// Summary of a driven session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub ticks: usize,
    pub silent_ticks: usize,
    pub applied: usize,
    pub stopped: bool,
    pub state: DecodeState,
    pub elapsed: Duration,
}

/// Drive a session from a frame source until the input ends or the session is stopped
///
/// The stop flag is checked before every tick; once it is set the source is
/// closed immediately and no further frame is pulled. A source error closes
/// the source and is returned without touching the session.
pub fn run_session(
    session: &mut DecodeSession,
    source: &mut dyn FrameSource,
) -> Result<SessionReport> {
    let mut report = SessionReport {
        ticks: 0,
        silent_ticks: 0,
        applied: 0,
        stopped: false,
        state: session.state(),
        elapsed: Duration::ZERO,
    };

    loop {
        if session.is_stopped() {
            log::info!("decode stopped after {} ticks", report.ticks);
            report.stopped = true;
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        report.ticks += 1;
        report.elapsed = frame.at;
        match session.process_spectrum(&frame.spectrum, frame.at) {
            TickOutcome::Silent => report.silent_ticks += 1,
            TickOutcome::Applied(_) => report.applied += 1,
            _ => {}
        }
    }

    source.close();
    report.state = session.state();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StopHandle;
    use crate::tone::ToneGenerator;
    use crate::Symbol;

    struct ScriptedSource {
        frames: Vec<AnalysisFrame>,
        fail_after: Option<usize>,
        pulled: usize,
        closes: usize,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<AnalysisFrame>) -> Self {
            Self {
                frames,
                fail_after: None,
                pulled: 0,
                closes: 0,
                stop_after: None,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<AnalysisFrame>> {
            if self.fail_after == Some(self.pulled) {
                return Err(HtmlWaveError::CaptureUnavailable("device unplugged".to_string()));
            }
            if let Some((count, handle)) = &self.stop_after {
                if self.pulled + 1 == *count {
                    handle.stop();
                }
            }
            let frame = self.frames.get(self.pulled).cloned();
            self.pulled += 1;
            Ok(frame)
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn peak_frame(bin: usize, millis: u64) -> AnalysisFrame {
        let mut spectrum = vec![0u8; 2048];
        spectrum[bin] = 200;
        AnalysisFrame {
            at: Duration::from_millis(millis),
            spectrum,
        }
    }

    #[test]
    fn test_run_session_to_end_of_input() {
        let mut session = DecodeSession::new(DecoderConfig::default()).unwrap();
        // ~797 Hz start_frame, silence, ~904 Hz end_frame
        let frames = vec![
            peak_frame(74, 0),
            AnalysisFrame {
                at: Duration::from_millis(16),
                spectrum: vec![0; 2048],
            },
            peak_frame(84, 400),
        ];
        let mut source = ScriptedSource::new(frames);

        let report = run_session(&mut session, &mut source).unwrap();
        assert_eq!(report.ticks, 3);
        assert_eq!(report.silent_ticks, 1);
        assert_eq!(report.applied, 2);
        assert_eq!(report.state, DecodeState::Complete);
        assert!(!report.stopped);
        assert_eq!(source.closes, 1);
        assert_eq!(session.symbol_log()[1].symbol, Symbol::EndFrame);
    }

    #[test]
    fn test_stop_closes_source_before_next_tick() {
        let mut session = DecodeSession::new(DecoderConfig::default()).unwrap();
        let frames = (0..10).map(|i| peak_frame(74 + i * 10, i as u64 * 100)).collect();
        let mut source = ScriptedSource::new(frames);
        source.stop_after = Some((2, session.stop_handle()));

        let report = run_session(&mut session, &mut source).unwrap();
        assert!(report.stopped);
        assert_eq!(report.ticks, 2);
        assert_eq!(source.pulled, 2);
        assert_eq!(source.closes, 1);
    }

    #[test]
    fn test_source_error_leaves_session_untouched() {
        let mut session = DecodeSession::new(DecoderConfig::default()).unwrap();
        let mut source = ScriptedSource::new(vec![peak_frame(74, 0)]);
        source.fail_after = Some(0);

        let result = run_session(&mut session, &mut source);
        assert!(matches!(result, Err(HtmlWaveError::CaptureUnavailable(_))));
        assert_eq!(session.state(), DecodeState::Waiting);
        assert!(session.html().is_empty());
        assert_eq!(source.closes, 1);
    }

    #[test]
    fn test_sample_source_ticks() {
        let config = DecoderConfig::default();
        let samples = ToneGenerator::default().tone(1000.0, 0.1, 0.0, 0.0);
        let mut source = SampleFrameSource::new(samples.clone(), &config).unwrap();
        assert_eq!(source.tick_count(), samples.len().div_ceil(config.hop_size));

        let mut frames = 0;
        let mut last_at = Duration::ZERO;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.spectrum.len(), config.fft_size / 2);
            assert!(frame.at > last_at);
            last_at = frame.at;
            frames += 1;
        }
        assert_eq!(frames, source.tick_count());

        source.close();
        assert!(source.is_closed());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn test_sample_source_drives_session() {
        let config = DecoderConfig::default();
        let samples = ToneGenerator::default().tone(1500.0, 0.3, 0.02, 0.02);
        let mut source = SampleFrameSource::new(samples, &config).unwrap();
        let mut session = DecodeSession::new(config).unwrap();

        let report = run_session(&mut session, &mut source).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(session.symbol_log()[0].symbol, Symbol::BodyOpen);
        assert!(source.is_closed());
    }
}
