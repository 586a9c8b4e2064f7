use crate::config::DecoderConfig;
use crate::error::Result;
use crate::matcher::{Debouncer, FrequencyGate, SymbolMatcher};
use crate::spectrum;
use crate::symbols::{Symbol, SymbolTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reconstruction progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Waiting,
    Decoding,
    Complete,
}

impl DecodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            DecodeState::Waiting => "waiting",
            DecodeState::Decoding => "decoding",
            DecodeState::Complete => "complete",
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The session was stopped; nothing was looked at
    Stopped,
    /// No bin above the threshold
    Silent,
    /// Peak too close to the previous one
    Gated(f32),
    /// Peak not near any table frequency
    Unmatched(f32),
    /// Symbol seen again inside its cooldown
    Debounced(Symbol),
    /// Symbol reached the state machine but the document is complete
    Ignored(Symbol),
    /// Symbol changed the document
    Applied(Symbol),
}

/// A symbol that changed the document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolEvent {
    pub symbol: Symbol,
    pub frequency: f32,
    pub at: Duration,
}

/// Cancellation flag shared between a session and whoever drives it
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const SKELETON: &str = "<!DOCTYPE html>\n<html>\n<head>\n<title>HTMLWave Decoded Document</title>\n\
<style>body{font-family:sans-serif;margin:40px;}.signal{padding:12px;margin:8px 0;border-radius:6px;}</style>\n\
</head>\n<body>\n<h1>Document decoded from audio</h1>\n";

const FRAME_SKELETON: &str = "<!DOCTYPE html>\n<html>\n<head>\n<title>Frame Started</title>\n</head>\n\
<body>\n<h1>Transmission started</h1>\n";

fn format_elapsed(at: Duration) -> String {
    let millis = at.as_millis();
    format!(
        "{:02}:{:02}.{:03}",
        millis / 60_000,
        (millis / 1000) % 60,
        millis % 1000
    )
}

/// Incremental document builder driven by recognized symbols
///
/// The output is a set of canned fragments recording which markers were
/// heard, not the transmitted markup. The buffer only grows until
/// [`Reconstruction::reset`].
#[derive(Debug, Clone)]
pub struct Reconstruction {
    state: DecodeState,
    html: String,
    element_count: usize,
}

impl Default for Reconstruction {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconstruction {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Waiting,
            html: String::new(),
            element_count: 0,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Symbols delivered so far, including ignored ones
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Feed one recognized symbol; returns whether the document changed
    ///
    /// Once complete, only `start_frame` has an effect.
    pub fn apply(&mut self, symbol: Symbol, frequency: f32, at: Duration) -> bool {
        self.element_count += 1;

        if self.state == DecodeState::Complete && symbol != Symbol::StartFrame {
            log::debug!("ignoring {} after end of frame", symbol);
            return false;
        }

        if self.html.is_empty() {
            self.html.push_str(SKELETON);
            self.state = DecodeState::Decoding;
            log::info!("document initialized by {}", symbol);
        }

        match symbol {
            Symbol::StartFrame => {
                self.html.clear();
                self.html.push_str(FRAME_SKELETON);
                self.state = DecodeState::Decoding;
                self.html.push_str(
                    "<div class=\"signal\" style=\"background:#e8f5e8\">Frame initialization complete</div>\n",
                );
                log::info!("frame started");
            }
            Symbol::Http200 => {
                self.html.push_str(
                    "<div class=\"signal\" style=\"background:#d4edda\">HTTP 200 OK received</div>\n",
                );
            }
            Symbol::BodyOpen => {
                self.html.push_str(&format!(
                    "<div class=\"signal\" style=\"background:#cce5ff\">\n<h2>Body section detected</h2>\n\
<p>Marker received at <strong>{:.1}Hz</strong>.</p>\n<p><em>Decoded at {}</em></p>\n</div>\n",
                    frequency,
                    format_elapsed(at)
                ));
            }
            Symbol::HtmlClose => {
                self.html.push_str(&format!(
                    "<div class=\"signal\" style=\"background:#28a745;color:white\">\n<h2>Transmission complete</h2>\n\
<p><strong>Elements decoded:</strong> {}</p>\n<p><em>Completed at {}</em></p>\n</div>\n",
                    self.element_count,
                    format_elapsed(at)
                ));
                if !self.html.contains("</body>") {
                    self.html.push_str("</body>\n");
                }
                if !self.html.contains("</html>") {
                    self.html.push_str("</html>");
                }
                log::info!("document closed after {} elements", self.element_count);
            }
            Symbol::EndFrame => {
                self.html.push_str(&format!(
                    "\n<!-- end of frame at {}, {} elements -->\n",
                    format_elapsed(at),
                    self.element_count
                ));
                self.state = DecodeState::Complete;
                log::info!("frame complete");
            }
            other => {
                self.html.push_str(&format!(
                    "<div class=\"signal\" style=\"background:#fff3cd\">Signal: {} detected at {:.1}Hz</div>\n",
                    other, frequency
                ));
            }
        }

        true
    }

    pub fn reset(&mut self) {
        self.state = DecodeState::Waiting;
        self.html.clear();
        self.element_count = 0;
    }
}

/// One decode session: gates, matcher, debouncer and the document they feed
///
/// Driven one analysis frame at a time by an external scheduler. Ticks take
/// `&mut self`, so two ticks of the same session can never overlap.
pub struct DecodeSession {
    config: DecoderConfig,
    matcher: SymbolMatcher,
    gate: FrequencyGate,
    debouncer: Debouncer,
    document: Reconstruction,
    events: Vec<SymbolEvent>,
    stop: StopHandle,
}

impl DecodeSession {
    /// Session listening for the encoder's table (shifted in ultrasonic mode)
    pub fn new(config: DecoderConfig) -> Result<Self> {
        let table = SymbolTable::encoder();
        Self::with_table(config, table)
    }

    /// Session listening for a custom table; the ultrasonic shift is applied here
    pub fn with_table(config: DecoderConfig, table: SymbolTable) -> Result<Self> {
        config.validate()?;
        let table = table.shifted(config.frequency_shift());

        Ok(Self {
            matcher: SymbolMatcher::new(table, config.tolerance_hz),
            gate: FrequencyGate::new(config.retrigger_hz),
            debouncer: Debouncer::new(config.cooldown),
            document: Reconstruction::new(),
            events: Vec::new(),
            stop: StopHandle::new(),
            config,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn table(&self) -> &SymbolTable {
        self.matcher.table()
    }

    /// Process one byte-scaled magnitude spectrum
    ///
    /// `now` is the time of the frame relative to the session start.
    pub fn process_spectrum(&mut self, spectrum: &[u8], now: Duration) -> TickOutcome {
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }

        match spectrum::dominant_frequency(
            spectrum,
            self.config.threshold,
            self.config.sample_rate,
            self.config.fft_size,
        ) {
            Some(frequency) => self.process_frequency(frequency, now),
            None => TickOutcome::Silent,
        }
    }

    /// Process an already extracted peak frequency
    pub fn process_frequency(&mut self, frequency: f32, now: Duration) -> TickOutcome {
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }
        if !self.gate.pass(frequency) {
            return TickOutcome::Gated(frequency);
        }

        match self.matcher.identify(frequency) {
            Some(symbol) => self.accept_symbol(symbol, frequency, now),
            None => TickOutcome::Unmatched(frequency),
        }
    }

    /// Debounce a recognized symbol and feed it to the document
    pub fn accept_symbol(&mut self, symbol: Symbol, frequency: f32, now: Duration) -> TickOutcome {
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }
        if !self.debouncer.accept(symbol, now) {
            return TickOutcome::Debounced(symbol);
        }

        log::debug!("{:.1}Hz -> {} at {:?}", frequency, symbol, now);
        if self.document.apply(symbol, frequency, now) {
            self.events.push(SymbolEvent {
                symbol,
                frequency,
                at: now,
            });
            TickOutcome::Applied(symbol)
        } else {
            TickOutcome::Ignored(symbol)
        }
    }

    pub fn state(&self) -> DecodeState {
        self.document.state()
    }

    pub fn html(&self) -> &str {
        self.document.html()
    }

    pub fn element_count(&self) -> usize {
        self.document.element_count()
    }

    /// Symbols that changed the document, in order
    pub fn symbol_log(&self) -> &[SymbolEvent] {
        &self.events
    }

    /// Clear the document and all gate and cooldown history
    pub fn reset(&mut self) {
        self.document.reset();
        self.gate.reset();
        self.debouncer.reset();
        self.events.clear();
        log::info!("decode session reset");
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Handle that stops this session from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}
