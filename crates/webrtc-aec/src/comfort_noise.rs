//! Comfort noise filling the spectral holes left by suppression.
//!
//! Noise has the estimated background magnitude and a uniformly random
//! phase. It is weighted by `sqrt(1 - g^2)` so that signal plus noise keeps
//! the background power where the gain `g` removed it.

use std::f32::consts::TAU;

use crate::common::{PART_LEN, PART_LEN1};
use crate::fft_data::FftData;
use crate::random::fill_uniform16;

const INITIAL_SEED: u32 = 777;
/// First bin of the upper half of the low band.
pub(crate) const HIGH_HALF_START: usize = PART_LEN1 / 2;

#[derive(Debug, Clone)]
pub(crate) struct ComfortNoiseGenerator {
    seed: u32,
}

impl ComfortNoiseGenerator {
    pub(crate) fn new() -> Self {
        Self { seed: INITIAL_SEED }
    }

    /// Adds weighted noise to `spectrum`. When `high_band` is given it
    /// receives flat noise at the average level of the upper half of the
    /// low band.
    pub(crate) fn generate(
        &mut self,
        noise_pow: &[f32; PART_LEN1],
        gain: &[f32; PART_LEN1],
        spectrum: &mut FftData,
        high_band: Option<&mut FftData>,
    ) {
        let mut rand = [0i16; PART_LEN];
        fill_uniform16(&mut self.seed, &mut rand);
        let phase: [f32; PART_LEN] = std::array::from_fn(|i| TAU * (rand[i] as f32 / 32768.0));

        let mut weight = [0.0f32; PART_LEN1];
        for (w, &g) in weight.iter_mut().zip(gain) {
            *w = (1.0 - g * g).max(0.0).sqrt();
        }

        // Bin 0 gets no noise; Nyquist stays real.
        for k in 1..PART_LEN1 {
            let magnitude = noise_pow[k].sqrt();
            let (sin, cos) = phase[k - 1].sin_cos();
            spectrum.re[k] += weight[k] * magnitude * cos;
            if k < PART_LEN {
                spectrum.im[k] -= weight[k] * magnitude * sin;
            }
        }

        if let Some(high) = high_band {
            let span = (PART_LEN1 - HIGH_HALF_START) as f32;
            let noise_avg =
                noise_pow[HIGH_HALF_START..].iter().map(|p| p.sqrt()).sum::<f32>() / span;
            let weight_avg = weight[HIGH_HALF_START..].iter().sum::<f32>() / span;
            high.clear();
            for k in 1..PART_LEN1 {
                let (sin, cos) = phase[k - 1].sin_cos();
                high.re[k] = weight_avg * noise_avg * cos;
                if k < PART_LEN {
                    high.im[k] = -weight_avg * noise_avg * sin;
                }
            }
        }
    }
}
