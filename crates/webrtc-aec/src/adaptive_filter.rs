//! Partitioned-block frequency-domain NLMS filter.
//!
//! The echo path is modelled as [`NR_PART`] partitions of [`PART_LEN`] taps,
//! each applied in the frequency domain to the far-end spectrum of the
//! matching age. The filter produces the linear error `e = d - y` and then
//! steps its weights along the normalized gradient.

use derive_more::Debug;

use crate::common::{IFFT_SCALE, NR_PART, PART_LEN, PART_LEN1, PART_LEN2, SampleRate};
use crate::fft_data::FftData;
use crate::kernels::KernelBackend;
use crate::spectral_transform::SpectralTransform;
use crate::spectrum_ring::SpectrumRing;

const FAR_POWER_SMOOTHING: f32 = 0.9;

#[derive(Debug, Clone)]
pub(crate) struct AdaptiveFilter {
    backend: KernelBackend,
    mu: f32,
    error_threshold: f32,
    #[debug(skip)]
    weights: Vec<FftData>,
    #[debug(skip)]
    far_spectra: SpectrumRing,
    #[debug(skip)]
    far_pow: [f32; PART_LEN1],
}

impl AdaptiveFilter {
    pub(crate) fn new(rate: SampleRate, backend: KernelBackend) -> Self {
        let (mu, error_threshold) = match rate {
            SampleRate::Hz8000 => (0.6, 2e-6),
            SampleRate::Hz16000 | SampleRate::Hz32000 => (0.5, 1.5e-6),
        };
        Self {
            backend,
            mu,
            error_threshold,
            weights: vec![FftData::default(); NR_PART],
            far_spectra: SpectrumRing::new(),
            far_pow: [0.0; PART_LEN1],
        }
    }

    pub(crate) fn weights(&self) -> &[FftData] {
        &self.weights
    }

    /// Zeroes every partition.
    pub(crate) fn reset_weights(&mut self) {
        tracing::debug!("resetting diverged echo path estimate");
        for w in &mut self.weights {
            w.clear();
        }
    }

    /// Runs one block: `far` is the spectrum of the latest two far-end
    /// blocks and `near` the newest near-end block. Writes the linear error
    /// to `error` and, when `adapt` is set, updates the weights.
    pub(crate) fn process(
        &mut self,
        far: &FftData,
        near: &[f32; PART_LEN],
        adapt: bool,
        constrained: bool,
        transform: &mut SpectralTransform,
        error: &mut [f32; PART_LEN],
    ) {
        let mut power = [0.0f32; PART_LEN1];
        far.power_spectrum(&mut power);
        for (smoothed, p) in self.far_pow.iter_mut().zip(power) {
            *smoothed = FAR_POWER_SMOOTHING * *smoothed
                + (1.0 - FAR_POWER_SMOOTHING) * NR_PART as f32 * p;
        }
        self.far_spectra.push_front(far);

        let mut echo = FftData::default();
        self.backend
            .filter_far(&self.far_spectra, &self.weights, &mut echo);
        let mut td = [0.0f32; PART_LEN2];
        transform.inverse(&echo, &mut td);
        for i in 0..PART_LEN {
            error[i] = near[i] - td[PART_LEN + i] * IFFT_SCALE;
        }

        if !adapt {
            return;
        }
        let mut gradient = FftData::default();
        transform.forward_zero_padded(error, &mut gradient);
        self.backend.scale_error_signal(
            &self.far_pow,
            self.mu,
            self.error_threshold,
            &mut gradient,
        );
        self.backend.filter_adaptation(
            &self.far_spectra,
            &gradient,
            constrained,
            transform,
            &mut self.weights,
        );
    }
}
