//! Hot-loop kernels of the adaptive filter with runtime-selected variants.
//!
//! A [`KernelBackend`] is resolved once when a canceller is constructed and
//! stored by value. All variants are bit-exact with the scalar code.

mod scalar;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod sse2;

use crate::common::{IFFT_SCALE, PART_LEN, PART_LEN2};
use crate::fft_data::FftData;
use crate::spectral_transform::SpectralTransform;
use crate::spectrum_ring::SpectrumRing;

/// Implementation of the per-bin filter kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelBackend {
    /// Portable scalar code.
    Scalar,
    /// x86/x86_64 SSE2, four bins at a time.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Sse2,
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(has_sse2, "sse2");

impl KernelBackend {
    /// Best variant supported by the running CPU.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if has_sse2::get() {
                return Self::Sse2;
            }
        }
        Self::Scalar
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse2 => "sse2",
        }
    }

    /// Echo estimate `Y = sum_i X_i * W_i`, where `X_i` is the far spectrum
    /// `i` blocks old and `W_i` the matching partition.
    pub(crate) fn filter_far(self, far: &SpectrumRing, weights: &[FftData], echo: &mut FftData) {
        echo.clear();
        for (x, w) in far.iter().zip(weights) {
            self.multiply_accumulate(x, w, echo);
        }
    }

    /// Turns the error spectrum into the NLMS step: normalize by far power,
    /// clamp the magnitude and apply the step size.
    pub(crate) fn scale_error_signal(
        self,
        x_pow: &[f32],
        mu: f32,
        threshold: f32,
        error: &mut FftData,
    ) {
        match self {
            Self::Scalar => {
                scalar::scale_error_signal(x_pow, mu, threshold, &mut error.re, &mut error.im)
            }
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: detect() only returns Sse2 after confirming sse2 support.
            Self::Sse2 => unsafe {
                sse2::scale_error_signal(x_pow, mu, threshold, &mut error.re, &mut error.im)
            },
        }
    }

    /// Adds the gradient `conj(X_i) * E` to every partition.
    ///
    /// When `constrained`, each gradient is first limited to a causal
    /// `PART_LEN`-tap response: transform back, zero the second half,
    /// transform again.
    pub(crate) fn filter_adaptation(
        self,
        far: &SpectrumRing,
        error: &FftData,
        constrained: bool,
        transform: &mut SpectralTransform,
        weights: &mut [FftData],
    ) {
        let mut gradient = FftData::default();
        let mut td = [0.0f32; PART_LEN2];
        for (x, w) in far.iter().zip(weights.iter_mut()) {
            self.conjugate_multiply(x, error, &mut gradient);
            if constrained {
                transform.inverse(&gradient, &mut td);
                for v in &mut td[..PART_LEN] {
                    *v *= IFFT_SCALE;
                }
                td[PART_LEN..].fill(0.0);
                transform.forward(&mut td, &mut gradient);
            }
            for k in 0..w.re.len() {
                w.re[k] += gradient.re[k];
                w.im[k] += gradient.im[k];
            }
        }
    }

    fn multiply_accumulate(self, x: &FftData, w: &FftData, y: &mut FftData) {
        match self {
            Self::Scalar => {
                scalar::multiply_accumulate(&x.re, &x.im, &w.re, &w.im, &mut y.re, &mut y.im)
            }
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: detect() only returns Sse2 after confirming sse2 support.
            Self::Sse2 => unsafe {
                sse2::multiply_accumulate(&x.re, &x.im, &w.re, &w.im, &mut y.re, &mut y.im)
            },
        }
    }

    fn conjugate_multiply(self, x: &FftData, e: &FftData, out: &mut FftData) {
        match self {
            Self::Scalar => {
                scalar::conjugate_multiply(&x.re, &x.im, &e.re, &e.im, &mut out.re, &mut out.im)
            }
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: detect() only returns Sse2 after confirming sse2 support.
            Self::Sse2 => unsafe {
                sse2::conjugate_multiply(&x.re, &x.im, &e.re, &e.im, &mut out.re, &mut out.im)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_strategy::proptest;
    use webrtc_aec_proptest::comparison::assert_f32_relative;
    use webrtc_aec_proptest::generators::spectrum_parts;

    use super::*;
    use crate::common::{NR_PART, PART_LEN1};

    fn fft_data((re, im): (Vec<f32>, Vec<f32>)) -> FftData {
        let mut x = FftData::default();
        x.re.copy_from_slice(&re);
        x.im.copy_from_slice(&im);
        x.clear_edge_imaginary();
        x
    }

    #[test]
    fn filter_far_sums_partition_products() {
        let mut far = SpectrumRing::new();
        let mut x = FftData::default();
        x.re[3] = 2.0;
        x.im[3] = 1.0;
        far.push_front(&x);

        let mut weights = vec![FftData::default(); NR_PART];
        weights[0].re[3] = 3.0;
        weights[0].im[3] = -1.0;
        // Partition 1 pairs with an all-zero far spectrum and must not count.
        weights[1].re.fill(100.0);

        let mut y = FftData::default();
        KernelBackend::Scalar.filter_far(&far, &weights, &mut y);
        // (2 + j)(3 - j) = 7 + j
        assert_eq!(y.re[3], 7.0);
        assert_eq!(y.im[3], 1.0);
        assert_eq!(y.re[4], 0.0);
    }

    #[test]
    fn error_scaling_clamps_large_bins() {
        let x_pow = [1.0f32; PART_LEN1];
        let mut e = FftData::default();
        e.re[0] = 3.0;
        e.im[0] = 4.0;
        e.re[1] = 1e-7;
        KernelBackend::Scalar.scale_error_signal(&x_pow, 0.5, 1e-6, &mut e);
        let abs0 = (e.re[0] * e.re[0] + e.im[0] * e.im[0]).sqrt();
        assert!((abs0 - 0.5e-6).abs() < 1e-9, "clamped magnitude {abs0}");
        assert!((e.re[1] - 0.5e-7).abs() < 1e-12, "unclamped {}", e.re[1]);
    }

    #[test]
    fn unconstrained_adaptation_adds_conjugate_product() {
        let mut far = SpectrumRing::new();
        let mut x = FftData::default();
        x.re[0] = 3.0;
        x.re[5] = 3.0;
        x.im[5] = 4.0;
        far.push_front(&x);

        let mut e = FftData::default();
        e.re[5] = 2.0;
        e.im[5] = 1.0;

        let mut weights = vec![FftData::default(); NR_PART];
        let mut t = SpectralTransform::new();
        KernelBackend::Scalar.filter_adaptation(&far, &e, false, &mut t, &mut weights);
        // conj(3 + 4j)(2 + j) = 10 - 5j
        assert_eq!(weights[0].re[5], 10.0);
        assert_eq!(weights[0].im[5], -5.0);
        assert!(weights[1..].iter().all(|w| w.energy() == 0.0));
    }

    #[test]
    fn constrained_adaptation_yields_causal_update() {
        let mut far = SpectrumRing::new();
        let mut x = FftData::default();
        for k in 0..PART_LEN1 {
            x.re[k] = (k as f32 * 0.37).sin();
            x.im[k] = (k as f32 * 0.11).cos();
        }
        x.clear_edge_imaginary();
        far.push_front(&x);
        let mut e = FftData::default();
        e.re.fill(0.25);
        e.im.fill(-0.5);
        e.clear_edge_imaginary();

        let mut weights = vec![FftData::default(); NR_PART];
        let mut t = SpectralTransform::new();
        KernelBackend::Scalar.filter_adaptation(&far, &e, true, &mut t, &mut weights);

        let mut td = [0.0f32; PART_LEN2];
        t.inverse(&weights[0], &mut td);
        let head: f32 = td[..PART_LEN].iter().map(|v| v.abs()).sum();
        let tail: f32 = td[PART_LEN..].iter().map(|v| v.abs()).sum();
        assert!(head > 1e-3, "update vanished");
        assert!(tail < 1e-4 * head, "non-causal tail {tail} vs {head}");
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[proptest]
    fn sse2_matches_scalar_bit_exactly(
        #[strategy(spectrum_parts(PART_LEN1, 1e4))] x: (Vec<f32>, Vec<f32>),
        #[strategy(spectrum_parts(PART_LEN1, 1e4))] w: (Vec<f32>, Vec<f32>),
        #[strategy(spectrum_parts(PART_LEN1, 1e4))] e: (Vec<f32>, Vec<f32>),
        #[strategy(proptest::collection::vec(0.0f32..1e9, PART_LEN1))] x_pow: Vec<f32>,
    ) {
        if !has_sse2::get() {
            return Ok(());
        }
        let (x, w, e) = (fft_data(x), fft_data(w), fft_data(e));

        let mut y_scalar = FftData::default();
        let mut y_sse2 = FftData::default();
        KernelBackend::Scalar.multiply_accumulate(&x, &w, &mut y_scalar);
        KernelBackend::Sse2.multiply_accumulate(&x, &w, &mut y_sse2);
        prop_assert_eq!(&y_scalar, &y_sse2);

        KernelBackend::Scalar.conjugate_multiply(&x, &e, &mut y_scalar);
        KernelBackend::Sse2.conjugate_multiply(&x, &e, &mut y_sse2);
        prop_assert_eq!(&y_scalar, &y_sse2);

        let mut e_scalar = e.clone();
        let mut e_sse2 = e;
        KernelBackend::Scalar.scale_error_signal(&x_pow, 0.5, 1.5e-6, &mut e_scalar);
        KernelBackend::Sse2.scale_error_signal(&x_pow, 0.5, 1.5e-6, &mut e_sse2);
        prop_assert_eq!(&e_scalar, &e_sse2);
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[proptest(cases = 64)]
    fn sse2_filter_far_matches_scalar_over_all_partitions(
        #[strategy(proptest::collection::vec(spectrum_parts(PART_LEN1, 1e3), NR_PART))]
        far_parts: Vec<(Vec<f32>, Vec<f32>)>,
        #[strategy(proptest::collection::vec(spectrum_parts(PART_LEN1, 1e3), NR_PART))]
        weight_parts: Vec<(Vec<f32>, Vec<f32>)>,
    ) {
        if !has_sse2::get() {
            return Ok(());
        }
        let mut far = SpectrumRing::new();
        for parts in far_parts {
            far.push_front(&fft_data(parts));
        }
        let weights: Vec<FftData> = weight_parts.into_iter().map(fft_data).collect();

        let mut y_scalar = FftData::default();
        let mut y_sse2 = FftData::default();
        KernelBackend::Scalar.filter_far(&far, &weights, &mut y_scalar);
        KernelBackend::Sse2.filter_far(&far, &weights, &mut y_sse2);
        assert_f32_relative(&y_sse2.re, &y_scalar.re, 1e-5, 1e-6);
        assert_f32_relative(&y_sse2.im, &y_scalar.im, 1e-5, 1e-6);
    }
}
