/// Concatenates tone buffers and silence into one sample stream
///
/// Append-only while building; [`FrameAssembler::finish`] hands the stream over.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    samples: Vec<f32>,
    units: usize,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(samples),
            units: 0,
        }
    }

    /// Append one unit (a marker tone, an FSK payload, ...)
    pub fn push(&mut self, unit: &[f32]) {
        self.samples.extend_from_slice(unit);
        self.units += 1;
    }

    /// Append `count` zero samples
    pub fn push_silence(&mut self, count: usize) {
        self.samples.resize(self.samples.len() + count, 0.0);
        self.units += 1;
    }

    /// Number of units appended so far
    pub fn units(&self) -> usize {
        self.units
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn finish(self) -> Vec<f32> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_preserves_order() {
        let mut assembler = FrameAssembler::new();
        assembler.push(&[0.1, 0.2]);
        assembler.push_silence(2);
        assembler.push(&[0.3]);

        assert_eq!(assembler.units(), 3);
        assert_eq!(assembler.len(), 5);
        assert_eq!(assembler.finish(), vec![0.1, 0.2, 0.0, 0.0, 0.3]);
    }

    #[test]
    fn test_empty_assembler() {
        let assembler = FrameAssembler::with_capacity(16);
        assert!(assembler.is_empty());
        assert!(assembler.finish().is_empty());
    }
}
