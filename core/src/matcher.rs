use crate::symbols::{Symbol, SymbolTable};
use std::collections::HashMap;
use std::time::Duration;

/// Maps a measured frequency to the nearest table symbol within a tolerance
#[derive(Debug, Clone)]
pub struct SymbolMatcher {
    table: SymbolTable,
    tolerance: f32,
}

impl SymbolMatcher {
    pub fn new(table: SymbolTable, tolerance: f32) -> Self {
        Self { table, tolerance }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    /// Nearest symbol strictly closer than the tolerance
    ///
    /// Every frequency of a multi-frequency symbol is a candidate. On equal
    /// distance the candidate found first in table order is kept.
    pub fn identify(&self, frequency: f32) -> Option<Symbol> {
        let mut best: Option<(Symbol, f32)> = None;

        for entry in self.table.entries() {
            for &candidate in &entry.frequencies {
                let distance = (frequency - candidate).abs();
                if distance >= self.tolerance {
                    continue;
                }
                match best {
                    Some((_, best_distance)) if distance >= best_distance => {}
                    _ => best = Some((entry.symbol, distance)),
                }
            }
        }

        best.map(|(symbol, _)| symbol)
    }
}

/// Suppresses re-processing of a sustained tone across analysis frames
///
/// A frequency passes only when it is positive and differs from the last
/// passed frequency by more than `delta`. Passing updates the reference even
/// when no symbol is matched afterwards.
#[derive(Debug, Clone)]
pub struct FrequencyGate {
    delta: f32,
    last: f32,
}

impl FrequencyGate {
    pub fn new(delta: f32) -> Self {
        Self { delta, last: 0.0 }
    }

    pub fn pass(&mut self, frequency: f32) -> bool {
        if frequency > 0.0 && (frequency - self.last).abs() > self.delta {
            self.last = frequency;
            true
        } else {
            false
        }
    }

    pub fn last(&self) -> f32 {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0.0;
    }
}

/// Per-symbol cooldown
///
/// A symbol is accepted when it has never been seen or when at least
/// `cooldown` has elapsed since its last acceptance. Rejected repeats do not
/// extend the window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: Duration,
    last_accepted: HashMap<Symbol, Duration>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: HashMap::new(),
        }
    }

    /// `now` is the time since the session started
    pub fn accept(&mut self, symbol: Symbol, now: Duration) -> bool {
        if let Some(&last) = self.last_accepted.get(&symbol) {
            if now.saturating_sub(last) < self.cooldown {
                return false;
            }
        }
        self.last_accepted.insert(symbol, now);
        true
    }

    pub fn reset(&mut self) {
        self.last_accepted.clear();
    }
}
