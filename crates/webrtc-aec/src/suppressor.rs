//! Coherence-based residual echo suppression.
//!
//! Smoothed auto- and cross-spectra of the near-end, error and delayed
//! far-end signals give two coherences per bin:
//!
//! - `cohde`, near vs. error: close to 1 when the linear filter removed
//!   little, i.e. the near end dominates.
//! - `cohxd`, far vs. near: close to 1 when the microphone is mostly echo.
//!
//! The suppression gain is derived from both, shaped by a per-bin
//! overdrive that adapts to how deep the echo has to be pushed, and
//! applied to the error spectrum.

use derive_more::Debug;

use crate::common::{
    NR_PART, OVERDRIVE_CURVE, PART_LEN, PART_LEN1, PREF_BAND_SIZE, WEIGHT_CURVE,
};
use crate::comfort_noise::HIGH_HALF_START;
use crate::config::SuppressionLevel;
use crate::fft_data::FftData;
use crate::spectrum_ring::SpectrumRing;

const FAR_POWER_FLOOR: f32 = 15.0;
const DIVERGENCE_HYSTERESIS: f32 = 1.05;
/// Error more than 13 dB above the near end means the filter is useless.
const DIVERGENCE_RESET_RATIO: f32 = 19.95;
const PREF_BAND_QUANT: f32 = 0.75;
const PREF_BAND_QUANT_LOW: f32 = 0.5;

/// Per-block outcome that the caller acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SuppressorEvents {
    /// The filter diverged badly; all partitions should be zeroed.
    pub reset_filter: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ResidualEchoSuppressor {
    mult: usize,
    smoothing: (f32, f32),
    target_suppression: f32,
    min_overdrive: f32,

    #[debug(skip)]
    far_windowed: SpectrumRing,
    delay_idx: usize,
    delay_est_counter: usize,

    #[debug(skip)]
    sd: [f32; PART_LEN1],
    #[debug(skip)]
    se: [f32; PART_LEN1],
    #[debug(skip)]
    sx: [f32; PART_LEN1],
    #[debug(skip)]
    sde: FftData,
    #[debug(skip)]
    sxd: FftData,

    diverged: bool,
    near_state: bool,
    echo_state: bool,

    hnl_fb_min: f32,
    hnl_fb_local_min: f32,
    hnl_xd_avg_min: f32,
    new_min: bool,
    min_counter: usize,
    overdrive: f32,
    overdrive_smoothed: f32,
}

impl ResidualEchoSuppressor {
    pub(crate) fn new(mult: usize, level: SuppressionLevel) -> Self {
        let smoothing = if mult == 1 { (0.9, 0.1) } else { (0.93, 0.07) };
        let (target_suppression, min_overdrive) = level.targets();
        Self {
            mult,
            smoothing,
            target_suppression,
            min_overdrive,
            far_windowed: SpectrumRing::new(),
            delay_idx: 0,
            delay_est_counter: 0,
            sd: [1.0; PART_LEN1],
            se: [0.0; PART_LEN1],
            sx: [1.0; PART_LEN1],
            sde: FftData::default(),
            sxd: FftData::default(),
            diverged: false,
            near_state: false,
            echo_state: false,
            hnl_fb_min: 1.0,
            hnl_fb_local_min: 1.0,
            hnl_xd_avg_min: 1.0,
            new_min: false,
            min_counter: 0,
            overdrive: 2.0,
            overdrive_smoothed: 2.0,
        }
    }

    pub(crate) fn set_suppression_level(&mut self, level: SuppressionLevel) {
        (self.target_suppression, self.min_overdrive) = level.targets();
    }

    /// Whether the last block was judged to contain echo.
    pub(crate) fn echo_state(&self) -> bool {
        self.echo_state
    }

    #[cfg(test)]
    pub(crate) fn diverged(&self) -> bool {
        self.diverged
    }

    /// Every `10 * mult` blocks, re-estimates which filter partition holds
    /// the echo path peak; its index selects the far-end delay used for
    /// coherence.
    pub(crate) fn update_delay_estimate(&mut self, weights: &[FftData]) {
        self.delay_est_counter += 1;
        if self.delay_est_counter == 10 * self.mult {
            self.delay_est_counter = 0;
        }
        if self.delay_est_counter != 0 {
            return;
        }
        let mut max_energy = 0.0f32;
        self.delay_idx = 0;
        for (i, w) in weights.iter().enumerate().take(NR_PART) {
            let energy = w.energy();
            if energy > max_energy {
                max_energy = energy;
                self.delay_idx = i;
            }
        }
    }

    /// Computes this block's suppression gain from the windowed far, near
    /// and error spectra and applies it to `error` in place.
    ///
    /// While the filter is diverged the near spectrum replaces the error
    /// before suppression.
    pub(crate) fn process(
        &mut self,
        far: &FftData,
        near: &FftData,
        error: &mut FftData,
        gain: &mut [f32; PART_LEN1],
    ) -> SuppressorEvents {
        self.far_windowed.push_front(far);
        let far = self.far_windowed.get(self.delay_idx);

        let (a, b) = self.smoothing;
        let mut sd_sum = 0.0f32;
        let mut se_sum = 0.0f32;
        for k in 0..PART_LEN1 {
            let (dr, di) = (near.re[k], near.im[k]);
            let (er, ei) = (error.re[k], error.im[k]);
            let (xr, xi) = (far.re[k], far.im[k]);
            self.sd[k] = a * self.sd[k] + b * (dr * dr + di * di);
            self.se[k] = a * self.se[k] + b * (er * er + ei * ei);
            self.sx[k] = a * self.sx[k] + b * (xr * xr + xi * xi).max(FAR_POWER_FLOOR);
            self.sde.re[k] = a * self.sde.re[k] + b * (dr * er + di * ei);
            self.sde.im[k] = a * self.sde.im[k] + b * (dr * ei - di * er);
            self.sxd.re[k] = a * self.sxd.re[k] + b * (dr * xr + di * xi);
            self.sxd.im[k] = a * self.sxd.im[k] + b * (dr * xi - di * xr);
            sd_sum += self.sd[k];
            se_sum += self.se[k];
        }

        let was_diverged = self.diverged;
        if !self.diverged {
            self.diverged = se_sum > sd_sum;
        } else if se_sum * DIVERGENCE_HYSTERESIS < sd_sum {
            self.diverged = false;
        }
        if self.diverged != was_diverged {
            tracing::debug!(
                diverged = self.diverged,
                se_sum,
                sd_sum,
                "filter divergence state changed"
            );
        }
        if self.diverged {
            error.clone_from(near);
        }
        let events = SuppressorEvents {
            reset_filter: se_sum > DIVERGENCE_RESET_RATIO * sd_sum,
        };

        let mut cohde = [0.0f32; PART_LEN1];
        let mut cohxd = [0.0f32; PART_LEN1];
        for k in 0..PART_LEN1 {
            let de = self.sde.re[k] * self.sde.re[k] + self.sde.im[k] * self.sde.im[k];
            let xd = self.sxd.re[k] * self.sxd.re[k] + self.sxd.im[k] * self.sxd.im[k];
            cohde[k] = (de / (self.sd[k] * self.se[k] + 1e-10)).clamp(0.0, 1.0);
            cohxd[k] = (xd / (self.sx[k] * self.sd[k] + 1e-10)).clamp(0.0, 1.0);
        }

        let band_size = PREF_BAND_SIZE / self.mult;
        let band_start = 4 / self.mult;
        let band = band_start..band_start + band_size;
        let hnl_xd_avg = 1.0 - cohxd[band.clone()].iter().sum::<f32>() / band_size as f32;
        let hnl_de_avg = cohde[band.clone()].iter().sum::<f32>() / band_size as f32;

        if hnl_xd_avg < 0.75 && hnl_xd_avg < self.hnl_xd_avg_min {
            self.hnl_xd_avg_min = hnl_xd_avg;
        }

        if hnl_de_avg > 0.98 && hnl_xd_avg > 0.9 {
            self.near_state = true;
        } else if hnl_de_avg < 0.95 || hnl_xd_avg < 0.8 {
            self.near_state = false;
        }

        let (hnl_fb, hnl_fb_low) = if self.hnl_xd_avg_min == 1.0 {
            // No echo observed yet.
            self.echo_state = false;
            self.overdrive = self.min_overdrive;
            if self.near_state {
                *gain = cohde;
                (hnl_de_avg, hnl_de_avg)
            } else {
                for k in 0..PART_LEN1 {
                    gain[k] = 1.0 - cohxd[k];
                }
                (hnl_xd_avg, hnl_xd_avg)
            }
        } else if self.near_state {
            self.echo_state = false;
            *gain = cohde;
            (hnl_de_avg, hnl_de_avg)
        } else {
            self.echo_state = true;
            for k in 0..PART_LEN1 {
                gain[k] = cohde[k].min(1.0 - cohxd[k]);
            }
            // Order statistics of the preferred band.
            let mut pref = [0.0f32; PREF_BAND_SIZE];
            let pref = &mut pref[..band_size];
            pref.copy_from_slice(&gain[band]);
            pref.sort_unstable_by(f32::total_cmp);
            let last = (band_size - 1) as f32;
            (
                pref[(PREF_BAND_QUANT * last).floor() as usize],
                pref[(PREF_BAND_QUANT_LOW * last).floor() as usize],
            )
        };

        self.track_overdrive(hnl_fb_low);

        for k in 0..PART_LEN1 {
            if gain[k] > hnl_fb {
                gain[k] = WEIGHT_CURVE[k] * hnl_fb + (1.0 - WEIGHT_CURVE[k]) * gain[k];
            }
            gain[k] = gain[k].powf(self.overdrive_smoothed * OVERDRIVE_CURVE[k]);
        }
        error.apply_gain(gain);

        events
    }

    /// Follows the lowest recent feedback gain and derives the overdrive
    /// needed to reach the target suppression from it.
    fn track_overdrive(&mut self, hnl_fb_low: f32) {
        if hnl_fb_low < 0.6 && hnl_fb_low < self.hnl_fb_local_min {
            self.hnl_fb_local_min = hnl_fb_low;
            self.hnl_fb_min = hnl_fb_low;
            self.new_min = true;
            self.min_counter = 0;
        }
        let mult = self.mult as f32;
        self.hnl_fb_local_min = (self.hnl_fb_local_min + 0.0008 / mult).min(1.0);
        self.hnl_xd_avg_min = (self.hnl_xd_avg_min + 0.0006 / mult).min(1.0);

        if self.new_min {
            self.min_counter += 1;
        }
        if self.min_counter == 2 {
            self.new_min = false;
            self.min_counter = 0;
            self.overdrive = (self.target_suppression / ((self.hnl_fb_min + 1e-10).ln() + 1e-10))
                .max(self.min_overdrive);
        }

        self.overdrive_smoothed = if self.overdrive < self.overdrive_smoothed {
            0.99 * self.overdrive_smoothed + 0.01 * self.overdrive
        } else {
            0.9 * self.overdrive_smoothed + 0.1 * self.overdrive
        };
    }
}

/// Gain for the upper band: the mean low-band gain over its upper half,
/// excluding Nyquist.
pub(crate) fn high_band_gain(gain: &[f32; PART_LEN1]) -> f32 {
    let bins = &gain[HIGH_HALF_START..PART_LEN];
    bins.iter().sum::<f32>() / bins.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(seed: u32, scale: f32) -> FftData {
        let mut state = seed.max(1);
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 2001) as f32 / 1000.0 - 1.0
        };
        let mut x = FftData::default();
        for k in 0..PART_LEN1 {
            x.re[k] = next() * scale;
            x.im[k] = next() * scale;
        }
        x.clear_edge_imaginary();
        x
    }

    #[test]
    fn silence_keeps_unit_gain() {
        let mut s = ResidualEchoSuppressor::new(1, SuppressionLevel::Moderate);
        let zero = FftData::default();
        let mut gain = [0.0; PART_LEN1];
        for _ in 0..50 {
            let mut e = FftData::default();
            let ev = s.process(&zero, &zero, &mut e, &mut gain);
            assert!(!ev.reset_filter);
            assert!(gain.iter().all(|&g| g == 1.0), "{gain:?}");
            assert_eq!(e, FftData::default());
        }
        assert!(!s.echo_state());
    }

    #[test]
    fn gains_stay_in_unit_interval() {
        let mut s = ResidualEchoSuppressor::new(2, SuppressionLevel::Aggressive);
        let mut gain = [0.0; PART_LEN1];
        for n in 0..400u32 {
            let far = spectrum(n * 3 + 1, 5000.0);
            let near = spectrum(n * 7 + 2, 2000.0);
            let mut err = spectrum(n * 11 + 3, 1000.0);
            s.process(&far, &near, &mut err, &mut gain);
            for (k, &g) in gain.iter().enumerate() {
                assert!((0.0..=1.0).contains(&g), "block {n} bin {k}: {g}");
            }
        }
    }

    #[test]
    fn echo_only_input_is_detected_and_suppressed() {
        // Near is a scaled copy of far and the error keeps half of it: a
        // poorly converged filter facing pure echo.
        let mut s = ResidualEchoSuppressor::new(1, SuppressionLevel::Moderate);
        let mut gain = [0.0; PART_LEN1];
        let mut seen_echo = false;
        for n in 0..300u32 {
            let far = spectrum(n + 1, 3000.0);
            let mut near = far.clone();
            near.apply_gain(&[0.5; PART_LEN1]);
            let mut err = near.clone();
            err.apply_gain(&[0.5; PART_LEN1]);
            s.process(&far, &near, &mut err, &mut gain);
            seen_echo |= s.echo_state();
        }
        assert!(seen_echo);
        let band_gain = gain[4..28].iter().sum::<f32>() / 24.0;
        assert!(band_gain < 0.1, "echo band gain {band_gain}");
    }

    #[test]
    fn diverged_filter_passes_near_end() {
        let mut s = ResidualEchoSuppressor::new(1, SuppressionLevel::Moderate);
        let mut gain = [0.0; PART_LEN1];
        let far = FftData::default();
        let near = spectrum(5, 100.0);
        let mut err = spectrum(6, 4000.0);
        let ev = s.process(&far, &near, &mut err, &mut gain);
        assert!(s.diverged);
        assert!(ev.reset_filter);
        // The near spectrum, scaled by the gain, replaced the error.
        for k in 0..PART_LEN1 {
            assert!((err.re[k] - near.re[k] * gain[k]).abs() < 1e-3);
        }
    }

    #[test]
    fn divergence_clears_once_error_drops() {
        let mut s = ResidualEchoSuppressor::new(1, SuppressionLevel::Moderate);
        let mut gain = [0.0; PART_LEN1];
        let far = FftData::default();
        let mut err = spectrum(6, 4000.0);
        s.process(&far, &spectrum(5, 100.0), &mut err, &mut gain);
        assert!(s.diverged);

        for n in 0..100u32 {
            let near = spectrum(n + 10, 3000.0);
            let mut err = near.clone();
            err.apply_gain(&[0.1; PART_LEN1]);
            s.process(&far, &near, &mut err, &mut gain);
        }
        assert!(!s.diverged);
    }

    #[test]
    fn delay_estimate_picks_strongest_partition() {
        let mut s = ResidualEchoSuppressor::new(1, SuppressionLevel::Moderate);
        let mut weights = vec![FftData::default(); NR_PART];
        weights[7].re[10] = 4.0;
        weights[2].re[10] = 1.0;
        for _ in 0..9 {
            s.update_delay_estimate(&weights);
            assert_eq!(s.delay_idx, 0);
        }
        s.update_delay_estimate(&weights);
        assert_eq!(s.delay_idx, 7);
    }

    #[test]
    fn overdrive_follows_new_minimum() {
        let mut s = ResidualEchoSuppressor::new(1, SuppressionLevel::Moderate);
        s.track_overdrive(0.1);
        assert!(s.new_min);
        s.track_overdrive(0.9);
        // -11.5 / ln(0.1) ~ 4.99
        assert!((s.overdrive - 4.994).abs() < 1e-2, "{}", s.overdrive);
        assert!(!s.new_min);
    }

    #[test]
    fn high_band_gain_averages_upper_half() {
        let mut g = [0.0f32; PART_LEN1];
        for v in &mut g[HIGH_HALF_START..PART_LEN] {
            *v = 0.5;
        }
        g[PART_LEN] = 100.0;
        assert!((high_band_gain(&g) - 0.5).abs() < 1e-6);
    }
}
