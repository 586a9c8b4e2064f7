use crate::assembler::FrameAssembler;
use crate::config::EncoderConfig;
use crate::error::{HtmlWaveError, Result};
use crate::framing::BlockEncoder;
use crate::fsk::FskModulator;
use crate::html::{self, TagScanner};
use crate::symbols::{Symbol, SymbolTable};
use crate::tone::ToneGenerator;
use crate::wav;
use crate::SAMPLE_RATE;

/// One step of an encoded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOp {
    /// A single marker tone
    Marker(Symbol),
    /// Raw element content; rendered as a text unit when non-blank
    Text(String),
}

/// Repeated elements, each encoded as marker + text, in emission order
const REPEATED_ELEMENTS: [(&str, Symbol); 3] = [("h1", Symbol::H1), ("h2", Symbol::H2), ("p", Symbol::P)];

/// HTML structural encoder
///
/// Walks a fixed set of tag patterns in priority order and renders each match
/// as a marker tone, followed by an FSK text unit for element content.
/// Encoding is deterministic: identical input and configuration give
/// identical samples.
#[derive(Debug, Clone)]
pub struct HtmlEncoder {
    config: EncoderConfig,
    tones: ToneGenerator,
    table: SymbolTable,
    fsk: FskModulator,
}

impl HtmlEncoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;

        let table = SymbolTable::encoder();
        let bit_frequency = |symbol: Symbol| {
            table.frequency(symbol).ok_or_else(|| {
                HtmlWaveError::InvalidConfig(format!("symbol table has no {} tone", symbol))
            })
        };
        let freq_zero = bit_frequency(Symbol::Fsk0)?;
        let freq_one = bit_frequency(Symbol::Fsk1)?;

        let nyquist = SAMPLE_RATE as f32 / 2.0;
        let highest = table
            .entries()
            .iter()
            .flat_map(|entry| entry.frequencies.iter().copied())
            .fold(0.0f32, f32::max)
            + config.frequency_shift();
        if highest >= nyquist {
            log::warn!(
                "highest tone {:.0}Hz is above the {:.0}Hz Nyquist limit and will alias",
                highest,
                nyquist
            );
        }

        let tones = ToneGenerator::new(SAMPLE_RATE, config.amplitude, config.frequency_shift());
        let fsk = FskModulator::new(tones.clone(), freq_zero, freq_one, config.fsk_bit_duration);

        Ok(Self {
            config,
            tones,
            table,
            fsk,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn fsk(&self) -> &FskModulator {
        &self.fsk
    }

    /// Ordered marker and text operations for a document
    ///
    /// start_frame and http_200 always lead and end_frame always closes;
    /// everything in between depends on which tag patterns match.
    pub fn plan(html: &str) -> Vec<EncodeOp> {
        let html = html::trim(html);
        let scanner = TagScanner::new(html);
        let mut ops = vec![
            EncodeOp::Marker(Symbol::StartFrame),
            EncodeOp::Marker(Symbol::Http200),
        ];

        if scanner.has_open("html") {
            ops.push(EncodeOp::Marker(Symbol::HtmlOpen));
        }
        if scanner.has_open("head") {
            ops.push(EncodeOp::Marker(Symbol::HeadOpen));
        }
        if let Some(title) = scanner.first_element("title") {
            ops.push(EncodeOp::Marker(Symbol::Title));
            ops.push(EncodeOp::Text(title.to_string()));
        }
        if scanner.has_close("head") {
            ops.push(EncodeOp::Marker(Symbol::HeadClose));
        }
        if scanner.has_open("body") {
            ops.push(EncodeOp::Marker(Symbol::BodyOpen));
        }

        for (name, symbol) in REPEATED_ELEMENTS {
            for content in scanner.all_elements(name) {
                ops.push(EncodeOp::Marker(symbol));
                ops.push(EncodeOp::Text(content.to_string()));
            }
        }

        if scanner.has_close("body") {
            ops.push(EncodeOp::Marker(Symbol::BodyClose));
        }
        if scanner.has_close("html") {
            ops.push(EncodeOp::Marker(Symbol::HtmlClose));
        }

        ops.push(EncodeOp::Marker(Symbol::EndFrame));
        ops
    }

    /// Structural markers of a document, ignoring text units
    pub fn marker_sequence(html: &str) -> Vec<Symbol> {
        Self::plan(html)
            .into_iter()
            .filter_map(|op| match op {
                EncodeOp::Marker(symbol) => Some(symbol),
                EncodeOp::Text(_) => None,
            })
            .collect()
    }

    /// One marker tone with the configured duration and fades
    pub fn marker(&self, symbol: Symbol) -> Result<Vec<f32>> {
        let frequency = self.table.frequency(symbol).ok_or_else(|| {
            HtmlWaveError::InvalidConfig(format!("symbol {} has no encoder frequency", symbol))
        })?;
        Ok(self.tones.tone(
            frequency,
            self.config.tone_duration,
            self.config.marker_fade,
            self.config.marker_fade,
        ))
    }

    /// Encode element content as text_start, FSK blocks, text_end
    ///
    /// Blank content produces no audio at all. Markup inside the content is
    /// stripped before splitting into blocks; each block travels as its
    /// length byte, its bytes and its CRC-8, one FSK frame per byte.
    pub fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        if html::trim(text).is_empty() {
            return Ok(Vec::new());
        }

        let stripped = html::strip_tags(text);
        let payload = html::trim(&stripped).as_bytes();
        let bytes = BlockEncoder::encode(payload, self.config.block_size)?;

        let mut assembler = FrameAssembler::new();
        assembler.push(&self.marker(Symbol::TextStart)?);
        assembler.push(&self.fsk.modulate(&bytes));
        assembler.push(&self.marker(Symbol::TextEnd)?);

        log::debug!(
            "text unit: {} bytes in {} block(s), {} samples",
            payload.len(),
            payload.len().div_ceil(self.config.block_size),
            assembler.len()
        );
        Ok(assembler.finish())
    }

    /// Encode a document into one sample stream
    pub fn encode(&self, html: &str) -> Result<Vec<f32>> {
        let mut assembler = FrameAssembler::new();

        for op in Self::plan(html) {
            match op {
                EncodeOp::Marker(symbol) => {
                    log::debug!("marker {}", symbol);
                    assembler.push(&self.marker(symbol)?);
                }
                EncodeOp::Text(text) => {
                    let unit = self.encode_text(&text)?;
                    if !unit.is_empty() {
                        assembler.push(&unit);
                    }
                }
            }
        }

        log::debug!(
            "encoded document: {} units, {} samples",
            assembler.units(),
            assembler.len()
        );
        Ok(assembler.finish())
    }

    /// Encode a document into a complete WAV file image
    pub fn encode_wav(&self, html: &str) -> Result<Vec<u8>> {
        let samples = self.encode(html)?;
        Ok(wav::write_wav(&samples, SAMPLE_RATE as u32))
    }

    /// Render raw frequencies as tones separated by the configured gap
    pub fn encode_tones(&self, frequencies: &[f32]) -> Vec<f32> {
        self.tones.sequence(
            frequencies,
            self.config.tone_duration,
            self.config.gap_duration,
        )
    }

    /// Symbol to frequency map as listed in the encoder table, without any shift
    pub fn frequency_map(&self) -> Vec<(Symbol, f32)> {
        self.table
            .entries()
            .iter()
            .filter_map(|entry| entry.frequencies.first().map(|&f| (entry.symbol, f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DOC: &str =
        "<html><head><title>Hi</title></head><body><h1>A</h1><p>B</p></body></html>";

    fn encoder() -> HtmlEncoder {
        HtmlEncoder::new(EncoderConfig::default()).unwrap()
    }

    #[test]
    fn test_marker_sequence_for_sample_document() {
        use Symbol::*;
        assert_eq!(
            HtmlEncoder::marker_sequence(SAMPLE_DOC),
            vec![
                StartFrame, Http200, HtmlOpen, HeadOpen, Title, HeadClose, BodyOpen, H1, P,
                BodyClose, HtmlClose, EndFrame
            ]
        );
    }

    #[test]
    fn test_empty_document_has_outer_markers_only() {
        assert_eq!(
            HtmlEncoder::marker_sequence(""),
            vec![Symbol::StartFrame, Symbol::Http200, Symbol::EndFrame]
        );

        let encoder = encoder();
        let marker_len = encoder.tones.samples_for(0.3);
        assert_eq!(encoder.encode("").unwrap().len(), 3 * marker_len);
    }

    #[test]
    fn test_repeated_elements_grouped_by_type() {
        // Document order interleaves h1/p/h2, emission order groups by tag
        let doc = "<p>one</p><h2>two</h2><h1>three</h1><p>four</p>";
        let ops = HtmlEncoder::plan(doc);
        let texts: Vec<&str> = ops
            .iter()
            .filter_map(|op| match op {
                EncodeOp::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["three", "two", "one", "four"]);
    }

    #[test]
    fn test_title_uses_first_match_only() {
        let ops = HtmlEncoder::plan("<title>First</title><title>Second</title>");
        assert!(ops.contains(&EncodeOp::Text("First".to_string())));
        assert!(!ops.contains(&EncodeOp::Text("Second".to_string())));
    }

    #[test]
    fn test_blank_text_is_silent() {
        let encoder = encoder();
        assert!(encoder.encode_text("").unwrap().is_empty());
        assert!(encoder.encode_text(" \t\n\r").unwrap().is_empty());
    }

    #[test]
    fn test_text_unit_length() {
        let encoder = encoder();
        let marker_len = encoder.tones.samples_for(0.3);
        let bit_len = encoder.tones.samples_for(0.08);

        // "Hi": one block of length byte + 2 bytes + CRC
        let unit = encoder.encode_text("  Hi ").unwrap();
        assert_eq!(unit.len(), 2 * marker_len + 4 * 10 * bit_len);

        // 20 bytes with 16-byte blocks: two blocks, 20 + 2 * 2 frames
        let unit = encoder.encode_text("abcdefghijklmnopqrst").unwrap();
        assert_eq!(unit.len(), 2 * marker_len + 24 * 10 * bit_len);
    }

    #[test]
    fn test_markup_stripped_inside_text() {
        let encoder = encoder();
        assert_eq!(
            encoder.encode_text("Hello <b>there</b>").unwrap(),
            encoder.encode_text("Hello there").unwrap()
        );
    }

    #[test]
    fn test_comparison_text_sent_whole() {
        let encoder = encoder();
        let marker_len = encoder.tones.samples_for(0.3);
        let bit_len = encoder.tones.samples_for(0.08);

        // "1 < 2": length byte + 5 bytes + CRC
        let unit = encoder.encode_text("1 < 2").unwrap();
        assert_eq!(unit.len(), 2 * marker_len + 7 * 10 * bit_len);
    }

    #[test]
    fn test_markup_only_text_keeps_delimiters() {
        let encoder = encoder();
        let marker_len = encoder.tones.samples_for(0.3);
        assert_eq!(encoder.encode_text("<br>").unwrap().len(), 2 * marker_len);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = encoder();
        assert_eq!(encoder.encode(SAMPLE_DOC).unwrap(), encoder.encode(SAMPLE_DOC).unwrap());
        assert_eq!(
            encoder.encode_wav(SAMPLE_DOC).unwrap(),
            HtmlEncoder::new(EncoderConfig::default())
                .unwrap()
                .encode_wav(SAMPLE_DOC)
                .unwrap()
        );
    }

    #[test]
    fn test_ultrasonic_changes_audio_not_length() {
        let plain = encoder();
        let ultrasonic = HtmlEncoder::new(EncoderConfig::default().with_ultrasonic(true)).unwrap();
        let a = plain.encode(SAMPLE_DOC).unwrap();
        let b = ultrasonic.encode(SAMPLE_DOC).unwrap();
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let result = HtmlEncoder::new(EncoderConfig::default().with_block_size(300));
        assert!(matches!(result, Err(HtmlWaveError::InvalidConfig(_))));
    }

    #[test]
    fn test_encode_tones_uses_gap() {
        let encoder = encoder();
        let audio = encoder.encode_tones(&[800.0, 900.0, 1000.0]);
        let tone_len = encoder.tones.samples_for(0.3);
        let gap_len = encoder.tones.samples_for(0.1);
        assert_eq!(audio.len(), 3 * (tone_len + gap_len));
    }

    #[test]
    fn test_frequency_map() {
        let map = encoder().frequency_map();
        assert_eq!(map.len(), 20);
        assert_eq!(map[0], (Symbol::StartFrame, 800.0));
        assert!(map.contains(&(Symbol::Fsk1, 3200.0)));
    }

    #[test]
    fn test_wav_size() {
        let encoder = encoder();
        let samples = encoder.encode(SAMPLE_DOC).unwrap();
        let wav = encoder.encode_wav(SAMPLE_DOC).unwrap();
        assert_eq!(wav.len(), crate::wav::WAV_HEADER_SIZE + samples.len() * 2);
    }
}
