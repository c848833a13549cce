//! Near-end background noise power by minimum statistics.
//!
//! The smoothed near-end power is tracked from below with a slowly rising
//! floor. Early on, the reported noise ramps up from zero so comfort noise
//! does not start with a burst.

use crate::common::PART_LEN1;
use crate::fft_data::FftData;

const POWER_SMOOTHING: f32 = 0.9;
const WARMUP_BLOCKS: usize = 50;
const MIN_STEP: f32 = 0.1;
const MIN_RAMP: f32 = 1.0002;
const INITIAL_MIN_POWER: f32 = 1.0e6;
const INIT_SMOOTHING: f32 = 0.999;

#[derive(Debug, Clone)]
pub(crate) struct NoiseEstimator {
    near_pow: [f32; PART_LEN1],
    min_pow: [f32; PART_LEN1],
    init_min_pow: [f32; PART_LEN1],
    counter: usize,
    ramp_blocks: usize,
    /// Whether the last update was still inside the initial ramp.
    ramping: bool,
}

impl NoiseEstimator {
    /// `mult` stretches the initial ramp to the block rate.
    pub(crate) fn new(mult: usize) -> Self {
        Self {
            near_pow: [0.0; PART_LEN1],
            min_pow: [INITIAL_MIN_POWER; PART_LEN1],
            init_min_pow: [0.0; PART_LEN1],
            counter: 0,
            ramp_blocks: 500 * mult,
            ramping: true,
        }
    }

    /// Folds in one near-end spectrum.
    pub(crate) fn update(&mut self, near: &FftData) {
        let mut power = [0.0f32; PART_LEN1];
        near.power_spectrum(&mut power);
        for (smoothed, p) in self.near_pow.iter_mut().zip(power) {
            *smoothed = POWER_SMOOTHING * *smoothed + (1.0 - POWER_SMOOTHING) * p;
        }

        if self.counter > WARMUP_BLOCKS {
            for (min, &pow) in self.min_pow.iter_mut().zip(&self.near_pow) {
                if pow < *min {
                    *min = (pow + MIN_STEP * (*min - pow)) * MIN_RAMP;
                } else {
                    *min *= MIN_RAMP;
                }
            }
        }

        self.ramping = self.counter < self.ramp_blocks;
        if self.ramping {
            self.counter += 1;
            for (init, &min) in self.init_min_pow.iter_mut().zip(&self.min_pow) {
                if min > *init {
                    *init = INIT_SMOOTHING * *init + (1.0 - INIT_SMOOTHING) * min;
                } else {
                    *init = min;
                }
            }
        }
    }

    /// Noise power per bin used to shape comfort noise.
    pub(crate) fn noise_power(&self) -> &[f32; PART_LEN1] {
        if self.ramping {
            &self.init_min_pow
        } else {
            &self.min_pow
        }
    }
}
