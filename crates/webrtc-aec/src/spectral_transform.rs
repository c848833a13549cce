//! 128-point real transform used for every spectrum in the canceller.
//!
//! The inverse carries a gain of `PART_LEN2 / 2`; callers undo it with
//! [`IFFT_SCALE`](crate::common::IFFT_SCALE), matching the block-domain
//! scaling the filter update and overlap-add are written against.

use std::sync::Arc;

use derive_more::Debug;
use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::common::{PART_LEN, PART_LEN1, PART_LEN2, SQRT_HANNING};
use crate::fft_data::FftData;

/// Forward and inverse real FFT of length [`PART_LEN2`] with reusable
/// scratch space.
#[derive(Debug)]
pub(crate) struct SpectralTransform {
    #[debug(skip)]
    forward: Arc<dyn RealToComplex<f32>>,
    #[debug(skip)]
    inverse: Arc<dyn ComplexToReal<f32>>,
    #[debug(skip)]
    spectrum: Vec<Complex32>,
    #[debug(skip)]
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    pub(crate) fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(PART_LEN2);
        let inverse = planner.plan_fft_inverse(PART_LEN2);
        let scratch_len = forward.get_scratch_len().max(inverse.get_scratch_len());
        Self {
            forward,
            inverse,
            spectrum: vec![Complex32::new(0.0, 0.0); PART_LEN1],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }

    /// Transforms `x` into `out`. `x` is used as scratch and is clobbered.
    pub(crate) fn forward(&mut self, x: &mut [f32; PART_LEN2], out: &mut FftData) {
        self.forward
            .process_with_scratch(x, &mut self.spectrum, &mut self.scratch)
            .expect("transform buffers are sized at construction");
        for (k, c) in self.spectrum.iter().enumerate() {
            out.re[k] = c.re;
            out.im[k] = c.im;
        }
        out.clear_edge_imaginary();
    }

    /// Inverse transform of `x` into `out`, scaled by `PART_LEN2 / 2`.
    pub(crate) fn inverse(&mut self, x: &FftData, out: &mut [f32; PART_LEN2]) {
        for (k, c) in self.spectrum.iter_mut().enumerate() {
            *c = Complex32::new(x.re[k], x.im[k]);
        }
        self.spectrum[0].im = 0.0;
        self.spectrum[PART_LEN].im = 0.0;
        self.inverse
            .process_with_scratch(&mut self.spectrum, out, &mut self.scratch)
            .expect("transform buffers are sized at construction and edge bins are real");
        for v in out.iter_mut() {
            *v *= 0.5;
        }
    }

    /// Transforms `[0; PART_LEN] ++ half`.
    pub(crate) fn forward_zero_padded(&mut self, half: &[f32; PART_LEN], out: &mut FftData) {
        let mut buf = [0.0f32; PART_LEN2];
        buf[PART_LEN..].copy_from_slice(half);
        self.forward(&mut buf, out);
    }

    /// Transforms a two-block window after applying the square-root Hann
    /// analysis window.
    pub(crate) fn forward_windowed(&mut self, x: &[f32; PART_LEN2], out: &mut FftData) {
        let mut buf = [0.0f32; PART_LEN2];
        for i in 0..PART_LEN {
            buf[i] = x[i] * SQRT_HANNING[i];
            buf[PART_LEN + i] = x[PART_LEN + i] * SQRT_HANNING[PART_LEN - i];
        }
        self.forward(&mut buf, out);
    }
}
