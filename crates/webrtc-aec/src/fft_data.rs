//! Split real/imaginary spectrum of a two-block window.

use crate::common::{PART_LEN, PART_LEN1};

/// The 65 complex bins of a 128-point real transform, DC through Nyquist.
///
/// DC and Nyquist are real for any real input; their imaginary parts are
/// kept at zero by every producer in this crate.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FftData {
    pub re: [f32; PART_LEN1],
    pub im: [f32; PART_LEN1],
}

impl Default for FftData {
    fn default() -> Self {
        Self {
            re: [0.0; PART_LEN1],
            im: [0.0; PART_LEN1],
        }
    }
}

impl FftData {
    pub(crate) fn clear(&mut self) {
        self.re.fill(0.0);
        self.im.fill(0.0);
    }

    /// `out[k] = |X[k]|^2`.
    pub(crate) fn power_spectrum(&self, out: &mut [f32; PART_LEN1]) {
        for ((o, &re), &im) in out.iter_mut().zip(&self.re).zip(&self.im) {
            *o = re * re + im * im;
        }
    }

    /// Total energy over all bins.
    pub(crate) fn energy(&self) -> f32 {
        self.re
            .iter()
            .zip(&self.im)
            .map(|(&re, &im)| re * re + im * im)
            .sum()
    }

    /// Scales every bin by the matching real gain.
    pub(crate) fn apply_gain(&mut self, gain: &[f32; PART_LEN1]) {
        for k in 0..PART_LEN1 {
            self.re[k] *= gain[k];
            self.im[k] *= gain[k];
        }
    }

    /// Forces DC and Nyquist to be real.
    pub(crate) fn clear_edge_imaginary(&mut self) {
        self.im[0] = 0.0;
        self.im[PART_LEN] = 0.0;
    }
}
