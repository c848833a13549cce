//! One 64-sample block through the whole canceller.
//!
//! Linear echo cancellation runs on rectangular two-block windows
//! (overlap-save). Suppression runs on square-root Hann windows of the same
//! signals and is resynthesized by overlap-add, which delays the suppressed
//! output by one block relative to the linear error.

use derive_more::Debug;

use crate::adaptive_filter::AdaptiveFilter;
use crate::comfort_noise::ComfortNoiseGenerator;
use crate::common::{
    IFFT_SCALE, PART_LEN, PART_LEN1, PART_LEN2, SQRT_HANNING, SampleRate, saturate_i16,
};
use crate::config::EchoCancellerConfig;
use crate::fft_data::FftData;
use crate::kernels::KernelBackend;
use crate::metrics::{EchoMetrics, MetricsEngine};
use crate::noise_estimator::NoiseEstimator;
use crate::spectral_transform::SpectralTransform;
use crate::suppressor::{ResidualEchoSuppressor, high_band_gain};

/// Weight of comfort noise mixed into the upper band.
const HIGH_BAND_NOISE_SCALE: f32 = 0.4;

pub(crate) type Block = [i16; PART_LEN];

#[derive(Debug)]
pub(crate) struct BlockProcessor {
    rate: SampleRate,
    config: EchoCancellerConfig,
    transform: SpectralTransform,
    filter: AdaptiveFilter,
    noise: NoiseEstimator,
    suppressor: ResidualEchoSuppressor,
    comfort_noise: ComfortNoiseGenerator,
    metrics: MetricsEngine,

    #[debug(skip)]
    far_td: [f32; PART_LEN2],
    #[debug(skip)]
    near_td: [f32; PART_LEN2],
    #[debug(skip)]
    error_td: [f32; PART_LEN2],
    #[debug(skip)]
    near_high_td: [f32; PART_LEN2],
    #[debug(skip)]
    synthesis_tail: [f32; PART_LEN],
}

impl BlockProcessor {
    pub(crate) fn new(
        rate: SampleRate,
        backend: KernelBackend,
        config: EchoCancellerConfig,
    ) -> Self {
        let mult = rate.mult();
        Self {
            rate,
            transform: SpectralTransform::new(),
            filter: AdaptiveFilter::new(rate, backend),
            noise: NoiseEstimator::new(mult),
            suppressor: ResidualEchoSuppressor::new(mult, config.suppression_level),
            comfort_noise: ComfortNoiseGenerator::new(),
            metrics: MetricsEngine::default(),
            config,
            far_td: [0.0; PART_LEN2],
            near_td: [0.0; PART_LEN2],
            error_td: [0.0; PART_LEN2],
            near_high_td: [0.0; PART_LEN2],
            synthesis_tail: [0.0; PART_LEN],
        }
    }

    pub(crate) fn set_config(&mut self, config: EchoCancellerConfig) {
        if config.metrics_enabled && !self.config.metrics_enabled {
            self.metrics.reset();
        }
        self.suppressor.set_suppression_level(config.suppression_level);
        self.config = config;
    }

    pub(crate) fn echo_state(&self) -> bool {
        self.suppressor.echo_state()
    }

    pub(crate) fn metrics(&self) -> EchoMetrics {
        self.metrics.report()
    }

    /// Processes one block. `near_high` and `out_high` are only used at
    /// 32 kHz.
    pub(crate) fn process(
        &mut self,
        far: &Block,
        near: &Block,
        near_high: &Block,
        out: &mut Block,
        out_high: &mut Block,
    ) {
        let high_band = self.rate.has_high_band();
        let mut near_block = [0.0f32; PART_LEN];
        for i in 0..PART_LEN {
            self.far_td[PART_LEN + i] = f32::from(far[i]);
            near_block[i] = f32::from(near[i]);
        }
        self.near_td[PART_LEN..].copy_from_slice(&near_block);
        if high_band {
            for i in 0..PART_LEN {
                self.near_high_td[PART_LEN + i] = f32::from(near_high[i]);
            }
        }

        let mut far_spectrum = FftData::default();
        let mut buf = self.far_td;
        self.transform.forward(&mut buf, &mut far_spectrum);
        let mut near_spectrum = FftData::default();
        let mut buf = self.near_td;
        self.transform.forward(&mut buf, &mut near_spectrum);
        self.noise.update(&near_spectrum);

        let mut error = [0.0f32; PART_LEN];
        self.filter.process(
            &far_spectrum,
            &near_block,
            self.config.adaptation_enabled,
            !self.config.unconstrained_filter,
            &mut self.transform,
            &mut error,
        );
        self.error_td[PART_LEN..].copy_from_slice(&error);

        self.suppress(out, out_high);

        let linear_out: Block = std::array::from_fn(|i| saturate_i16(error[i]));
        if !self.config.nonlinear_processing_enabled {
            *out = linear_out;
        }
        if self.config.metrics_enabled {
            self.metrics
                .update(far, near, &linear_out, out, self.suppressor.echo_state());
        }

        self.far_td.copy_within(PART_LEN.., 0);
        self.near_td.copy_within(PART_LEN.., 0);
        self.error_td.copy_within(PART_LEN.., 0);
        if high_band {
            self.near_high_td.copy_within(PART_LEN.., 0);
        }
    }

    /// Residual echo suppression, comfort noise and overlap-add synthesis.
    fn suppress(&mut self, out: &mut Block, out_high: &mut Block) {
        let high_band = self.rate.has_high_band();
        self.suppressor.update_delay_estimate(self.filter.weights());

        let mut far_w = FftData::default();
        let mut near_w = FftData::default();
        let mut error_w = FftData::default();
        self.transform.forward_windowed(&self.far_td, &mut far_w);
        self.transform.forward_windowed(&self.near_td, &mut near_w);
        self.transform.forward_windowed(&self.error_td, &mut error_w);

        let mut gain = [0.0f32; PART_LEN1];
        let events = self
            .suppressor
            .process(&far_w, &near_w, &mut error_w, &mut gain);
        if events.reset_filter {
            self.filter.reset_weights();
        }

        let mut noise_high = FftData::default();
        let high_noise_active = high_band && self.config.comfort_noise_enabled;
        if self.config.comfort_noise_enabled {
            self.comfort_noise.generate(
                self.noise.noise_power(),
                &gain,
                &mut error_w,
                high_band.then_some(&mut noise_high),
            );
        }

        let mut td = [0.0f32; PART_LEN2];
        self.transform.inverse(&error_w, &mut td);
        for i in 0..PART_LEN {
            let v = td[i] * IFFT_SCALE * SQRT_HANNING[i] + self.synthesis_tail[i];
            out[i] = saturate_i16(v);
            self.synthesis_tail[i] = td[PART_LEN + i] * IFFT_SCALE * SQRT_HANNING[PART_LEN - i];
        }

        if high_band {
            let gain_high = high_band_gain(&gain);
            let mut noise_td = [0.0f32; PART_LEN2];
            if high_noise_active {
                self.transform.inverse(&noise_high, &mut noise_td);
            }
            // The old half lines up with the overlap-add delay of the low band.
            for i in 0..PART_LEN {
                let v = self.near_high_td[i] * gain_high
                    + HIGH_BAND_NOISE_SCALE * noise_td[i] * IFFT_SCALE;
                out_high[i] = saturate_i16(v);
            }
        }
    }
}
