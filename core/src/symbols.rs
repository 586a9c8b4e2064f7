//! Symbol table: the mapping between protocol markers and tone frequencies.
//!
//! Two tables exist. [`SymbolTable::encoder`] is the table the encoder emits
//! (800-3200 Hz, evenly spaced) and is authoritative: decode sessions listen
//! for it by default so an encoded document can be recognized. The older
//! listener table ([`SymbolTable::listener`], 262-2800 Hz, note-derived, some
//! markers with several frequencies) disagrees with the encoder on every
//! marker and is kept only for recognizing signals produced against it.

use std::fmt;

/// A recognizable protocol marker or FSK bit tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    StartFrame,
    EndFrame,
    Http200,
    HtmlOpen,
    HtmlClose,
    HeadOpen,
    HeadClose,
    BodyOpen,
    BodyClose,
    Title,
    H1,
    H2,
    H3,
    P,
    Div,
    A,
    TextStart,
    TextEnd,
    Fsk0,
    Fsk1,
    Sync,
    BlockStart,
    BlockEnd,
}

impl Symbol {
    pub fn name(self) -> &'static str {
        match self {
            Symbol::StartFrame => "start_frame",
            Symbol::EndFrame => "end_frame",
            Symbol::Http200 => "http_200",
            Symbol::HtmlOpen => "html_open",
            Symbol::HtmlClose => "html_close",
            Symbol::HeadOpen => "head_open",
            Symbol::HeadClose => "head_close",
            Symbol::BodyOpen => "body_open",
            Symbol::BodyClose => "body_close",
            Symbol::Title => "title",
            Symbol::H1 => "h1",
            Symbol::H2 => "h2",
            Symbol::H3 => "h3",
            Symbol::P => "p",
            Symbol::Div => "div",
            Symbol::A => "a",
            Symbol::TextStart => "text_start",
            Symbol::TextEnd => "text_end",
            Symbol::Fsk0 => "fsk_0",
            Symbol::Fsk1 => "fsk_1",
            Symbol::Sync => "sync",
            Symbol::BlockStart => "block_start",
            Symbol::BlockEnd => "block_end",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One table row: a symbol and every frequency that identifies it
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub symbol: Symbol,
    pub frequencies: Vec<f32>,
}

/// Ordered symbol to frequency table
///
/// Row order matters: when two rows are equally close to a measured
/// frequency, the earlier row wins.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    /// Build a table from rows in matching priority order
    pub(crate) fn from_rows(rows: Vec<(Symbol, Vec<f32>)>) -> Self {
        Self {
            entries: rows
                .into_iter()
                .map(|(symbol, frequencies)| SymbolEntry {
                    symbol,
                    frequencies,
                })
                .collect(),
        }
    }

    fn single(rows: &[(Symbol, f32)]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|&(symbol, frequency)| (symbol, vec![frequency]))
                .collect(),
        )
    }

    /// The table the encoder emits, unshifted
    pub fn encoder() -> Self {
        Self::single(&[
            (Symbol::StartFrame, 800.0),
            (Symbol::EndFrame, 900.0),
            (Symbol::Http200, 1000.0),
            (Symbol::HtmlOpen, 1100.0),
            (Symbol::HtmlClose, 1200.0),
            (Symbol::HeadOpen, 1300.0),
            (Symbol::HeadClose, 1400.0),
            (Symbol::BodyOpen, 1500.0),
            (Symbol::BodyClose, 1600.0),
            (Symbol::Title, 1700.0),
            (Symbol::H1, 1800.0),
            (Symbol::H2, 1900.0),
            (Symbol::H3, 2000.0),
            (Symbol::P, 2100.0),
            (Symbol::Div, 2200.0),
            (Symbol::A, 2300.0),
            (Symbol::TextStart, 2400.0),
            (Symbol::TextEnd, 2500.0),
            (Symbol::Fsk0, 3000.0),
            (Symbol::Fsk1, 3200.0),
        ])
    }

    /// The note-derived listener table, unshifted
    pub fn listener() -> Self {
        let rows: Vec<(Symbol, Vec<f32>)> = vec![
            (Symbol::StartFrame, vec![440.0, 554.0, 659.0]),
            (Symbol::EndFrame, vec![440.0, 349.0, 262.0]),
            (Symbol::Http200, vec![523.0, 659.0, 784.0]),
            (Symbol::HtmlOpen, vec![440.0]),
            (Symbol::HtmlClose, vec![415.0]),
            (Symbol::HeadOpen, vec![660.0]),
            (Symbol::HeadClose, vec![622.0]),
            (Symbol::BodyOpen, vec![880.0]),
            (Symbol::BodyClose, vec![831.0]),
            (Symbol::Title, vec![523.0, 659.0, 784.0, 1047.0]),
            (Symbol::H1, vec![1047.0]),
            (Symbol::H2, vec![932.0]),
            (Symbol::H3, vec![831.0]),
            (Symbol::P, vec![698.0]),
            (Symbol::Div, vec![622.0]),
            (Symbol::A, vec![392.0, 494.0, 587.0]),
            (Symbol::Fsk0, vec![2000.0]),
            (Symbol::Fsk1, vec![2400.0]),
            (Symbol::Sync, vec![2800.0]),
            (Symbol::BlockStart, vec![1760.0]),
            (Symbol::BlockEnd, vec![1568.0]),
        ];
        Self::from_rows(rows)
    }

    /// Copy of this table with every frequency moved by `offset` Hz
    pub fn shifted(&self, offset: f32) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|entry| SymbolEntry {
                    symbol: entry.symbol,
                    frequencies: entry.frequencies.iter().map(|f| f + offset).collect(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// All frequencies of a symbol, or `None` if the table lacks it
    pub fn frequencies(&self, symbol: Symbol) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|entry| entry.symbol == symbol)
            .map(|entry| entry.frequencies.as_slice())
    }

    /// Primary (first) frequency of a symbol
    pub fn frequency(&self, symbol: Symbol) -> Option<f32> {
        self.frequencies(symbol).and_then(|f| f.first().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::encoder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_table_unique_frequencies() {
        let table = SymbolTable::encoder();
        let mut freqs: Vec<u32> = table
            .entries()
            .iter()
            .flat_map(|e| e.frequencies.iter().map(|&f| f as u32))
            .collect();
        let total = freqs.len();
        freqs.sort_unstable();
        freqs.dedup();
        assert_eq!(freqs.len(), total);
        assert_eq!(table.len(), 20);
    }

    #[test]
    fn test_encoder_table_values() {
        let table = SymbolTable::encoder();
        assert_eq!(table.frequency(Symbol::StartFrame), Some(800.0));
        assert_eq!(table.frequency(Symbol::EndFrame), Some(900.0));
        assert_eq!(table.frequency(Symbol::Fsk0), Some(3000.0));
        assert_eq!(table.frequency(Symbol::Fsk1), Some(3200.0));
        assert_eq!(table.frequency(Symbol::Sync), None);
    }

    #[test]
    fn test_listener_table_disagrees_with_encoder() {
        let encoder = SymbolTable::encoder();
        let listener = SymbolTable::listener();
        assert_ne!(
            encoder.frequency(Symbol::BodyOpen),
            listener.frequency(Symbol::BodyOpen)
        );
        assert_eq!(listener.frequencies(Symbol::Title).map(|f| f.len()), Some(4));
    }

    #[test]
    fn test_shifted_table() {
        let shifted = SymbolTable::encoder().shifted(20000.0);
        assert_eq!(shifted.frequency(Symbol::StartFrame), Some(20800.0));
        assert_eq!(shifted.frequency(Symbol::Fsk1), Some(23200.0));
    }

    #[test]
    fn test_symbol_names() {
        assert_eq!(Symbol::StartFrame.to_string(), "start_frame");
        assert_eq!(Symbol::Http200.name(), "http_200");
    }
}
