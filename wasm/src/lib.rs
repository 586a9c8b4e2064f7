use htmlwave_core::{
    DecodeSession, DecoderConfig, EncoderConfig, HtmlEncoder, SymbolTable, TickOutcome,
};
use std::collections::BTreeMap;
use std::time::Duration;
use wasm_bindgen::prelude::*;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Session-relative milliseconds; negative or non-finite input maps to zero
fn timestamp(now_ms: f64) -> Duration {
    Duration::try_from_secs_f64(now_ms / 1000.0).unwrap_or(Duration::ZERO)
}

#[wasm_bindgen]
pub struct WasmEncoder {
    inner: HtmlEncoder,
}

#[wasm_bindgen]
impl WasmEncoder {
    #[wasm_bindgen(constructor)]
    pub fn new(ultrasonic: bool, block_size: usize) -> Result<WasmEncoder, JsValue> {
        let config = EncoderConfig::default()
            .with_ultrasonic(ultrasonic)
            .with_block_size(block_size);
        HtmlEncoder::new(config)
            .map(|encoder| WasmEncoder { inner: encoder })
            .map_err(to_js)
    }

    /// Encode an HTML document into audio samples
    /// Returns a Float32Array at `sampleRate`
    #[wasm_bindgen]
    pub fn encode(&self, html: &str) -> Result<Vec<f32>, JsValue> {
        self.inner.encode(html).map_err(to_js)
    }

    /// Encode an HTML document into a complete 16-bit mono WAV file
    #[wasm_bindgen(js_name = encodeWav)]
    pub fn encode_wav(&self, html: &str) -> Result<Vec<u8>, JsValue> {
        self.inner.encode_wav(html).map_err(to_js)
    }

    /// Unshifted symbol frequencies as a JSON object
    #[wasm_bindgen(js_name = frequencyMap)]
    pub fn frequency_map(&self) -> Result<String, JsValue> {
        frequency_json(&self.inner).map_err(to_js)
    }

    #[wasm_bindgen(getter, js_name = sampleRate)]
    pub fn sample_rate(&self) -> usize {
        htmlwave_core::SAMPLE_RATE
    }
}

/// Live decoder fed with byte spectra from a WebAudio analyser
#[wasm_bindgen]
pub struct WasmDecodeSession {
    inner: DecodeSession,
    spectrum: Vec<u8>,
}

#[wasm_bindgen]
impl WasmDecodeSession {
    #[wasm_bindgen(constructor)]
    pub fn new(
        ultrasonic: bool,
        threshold: u8,
        sample_rate: usize,
        fft_size: usize,
        listener_table: bool,
    ) -> Result<WasmDecodeSession, JsValue> {
        let config = DecoderConfig {
            ultrasonic,
            threshold,
            sample_rate,
            fft_size,
            ..DecoderConfig::default()
        };
        let table = if listener_table {
            SymbolTable::listener()
        } else {
            SymbolTable::encoder()
        };
        let bins = fft_size / 2;
        DecodeSession::with_table(config, table)
            .map(|session| WasmDecodeSession {
                inner: session,
                spectrum: vec![0; bins],
            })
            .map_err(to_js)
    }

    /// Process one byte spectrum captured at `now_ms` (session-relative)
    /// Returns the tick outcome, e.g. "applied:h1" or "silent"
    #[wasm_bindgen(js_name = processFrame)]
    pub fn process_frame(&mut self, spectrum: &[u8], now_ms: f64) -> String {
        describe(self.inner.process_spectrum(spectrum, timestamp(now_ms)))
    }

    /// Pull the current spectrum from an analyser node and process it
    ///
    /// The node's `fftSize` must match the size this session was created with,
    /// otherwise bins would map to the wrong frequencies.
    #[wasm_bindgen(js_name = processAnalyser)]
    pub fn process_analyser(
        &mut self,
        analyser: &web_sys::AnalyserNode,
        now_ms: f64,
    ) -> Result<String, JsValue> {
        self.check_analyser(analyser.fft_size() as usize)
            .map_err(to_js)?;
        analyser.get_byte_frequency_data(&mut self.spectrum);
        Ok(describe(
            self.inner.process_spectrum(&self.spectrum, timestamp(now_ms)),
        ))
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    #[wasm_bindgen]
    pub fn stop(&self) {
        self.inner.stop();
    }

    #[wasm_bindgen(getter)]
    pub fn html(&self) -> String {
        self.inner.html().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.inner.state().as_str().to_string()
    }

    #[wasm_bindgen(getter, js_name = elementCount)]
    pub fn element_count(&self) -> usize {
        self.inner.element_count()
    }
}

fn describe(outcome: TickOutcome) -> String {
    match outcome {
        TickOutcome::Stopped => "stopped".to_string(),
        TickOutcome::Silent => "silent".to_string(),
        TickOutcome::Gated(f) => format!("gated:{:.1}", f),
        TickOutcome::Unmatched(f) => format!("unmatched:{:.1}", f),
        TickOutcome::Debounced(s) => format!("debounced:{}", s.name()),
        TickOutcome::Ignored(s) => format!("ignored:{}", s.name()),
        TickOutcome::Applied(s) => format!("applied:{}", s.name()),
    }
}

impl WasmDecodeSession {
    fn check_analyser(&self, fft_size: usize) -> Result<(), String> {
        let expected = self.inner.config().fft_size;
        if fft_size != expected {
            return Err(format!(
                "analyser fftSize {} does not match session fft size {}",
                fft_size, expected
            ));
        }
        Ok(())
    }
}

fn frequency_json(encoder: &HtmlEncoder) -> serde_json::Result<String> {
    let map: BTreeMap<&'static str, f32> = encoder
        .frequency_map()
        .into_iter()
        .map(|(symbol, frequency)| (symbol.name(), frequency))
        .collect();
    serde_json::to_string(&map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_map_is_json_object() {
        let encoder = WasmEncoder::new(false, 16).expect("encoder");
        let json = frequency_json(&encoder.inner).expect("serialize");
        let map: BTreeMap<String, f32> = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(map.len(), encoder.inner.frequency_map().len());
        assert_eq!(map["start_frame"], 800.0);
        assert_eq!(map["end_frame"], 900.0);
    }

    #[test]
    fn test_session_processes_byte_spectrum() {
        let mut session =
            WasmDecodeSession::new(false, 128, 44100, 4096, false).expect("session");
        assert_eq!(session.state(), "waiting");

        // 800 Hz lands in bin 800 * 4096 / 44100 = 74.3
        let mut spectrum = vec![0u8; 2048];
        spectrum[74] = 230;
        assert_eq!(session.process_frame(&spectrum, 0.0), "applied:start_frame");
        assert_eq!(session.state(), "decoding");
        assert!(session.html().contains("Frame initialization complete"));
        assert_eq!(session.element_count(), 1);

        assert_eq!(session.process_frame(&vec![0u8; 2048], 16.0), "silent");

        session.reset();
        assert_eq!(session.state(), "waiting");
        assert!(session.html().is_empty());
    }

    #[test]
    fn test_analyser_fft_size_must_match() {
        let session = WasmDecodeSession::new(false, 128, 44100, 4096, false).expect("session");
        assert!(session.check_analyser(4096).is_ok());
        let err = session.check_analyser(2048).expect_err("mismatch rejected");
        assert!(err.contains("2048"));
    }

    #[test]
    fn test_timestamp_clamps_invalid_input() {
        assert_eq!(timestamp(1500.0), Duration::from_millis(1500));
        assert_eq!(timestamp(-5.0), Duration::ZERO);
        assert_eq!(timestamp(f64::NAN), Duration::ZERO);
        assert_eq!(timestamp(f64::INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_describe_outcomes() {
        assert_eq!(describe(TickOutcome::Silent), "silent");
        assert_eq!(
            describe(TickOutcome::Applied(htmlwave_core::Symbol::H1)),
            "applied:h1"
        );
        assert_eq!(describe(TickOutcome::Gated(812.34)), "gated:812.3");
    }
}
