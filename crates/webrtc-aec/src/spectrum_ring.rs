//! Fixed-depth history of spectra addressed by age.

use crate::common::NR_PART;
use crate::fft_data::FftData;

/// Holds the last [`NR_PART`] spectra. Index 0 is the most recent.
///
/// Pushing moves the head one slot backwards instead of shifting the
/// contents, so a push costs one spectrum copy.
#[derive(Debug, Clone)]
pub(crate) struct SpectrumRing {
    slots: Vec<FftData>,
    head: usize,
}

impl SpectrumRing {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![FftData::default(); NR_PART],
            head: 0,
        }
    }

    /// Makes `x` the newest entry, dropping the oldest.
    pub(crate) fn push_front(&mut self, x: &FftData) {
        self.head = if self.head == 0 { NR_PART - 1 } else { self.head - 1 };
        self.slots[self.head].clone_from(x);
    }

    /// Spectrum pushed `age` pushes ago.
    pub(crate) fn get(&self, age: usize) -> &FftData {
        debug_assert!(age < NR_PART);
        &self.slots[(self.head + age) % NR_PART]
    }

    /// Spectra from newest to oldest.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &FftData> {
        (0..NR_PART).map(|age| self.get(age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(v: f32) -> FftData {
        let mut x = FftData::default();
        x.re[0] = v;
        x
    }

    #[test]
    fn newest_first() {
        let mut ring = SpectrumRing::new();
        for v in 1..=5 {
            ring.push_front(&marked(v as f32));
        }
        assert_eq!(ring.get(0).re[0], 5.0);
        assert_eq!(ring.get(4).re[0], 1.0);
        assert_eq!(ring.get(5).re[0], 0.0);
    }

    #[test]
    fn oldest_entry_falls_off() {
        let mut ring = SpectrumRing::new();
        for v in 0..(NR_PART + 3) {
            ring.push_front(&marked(v as f32));
        }
        let ages: Vec<f32> = ring.iter().map(|x| x.re[0]).collect();
        let expected: Vec<f32> = (3..NR_PART + 3).rev().map(|v| v as f32).collect();
        assert_eq!(ages, expected);
    }
}
