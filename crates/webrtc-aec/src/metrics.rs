//! Echo return loss statistics.
//!
//! Four signal levels are tracked per block (far end, near end, linear
//! filter output and suppressor output). Every [`COUNT_LEN`] frames of
//! [`SUB_COUNT_LEN`] blocks, if the far end was active and echo was present
//! for most of the window, the level ratios update three statistics:
//!
//! - ERL: far-end level over near-end level.
//! - A_NLP: attenuation of the suppressor, near-end over linear output.
//! - ERLE: echo level over what is left of it after suppression.
//!
//! Nothing here feeds back into the audio path.

use crate::common::PART_LEN;

const OFFSET_LEVEL: f32 = -100.0;
const SUB_COUNT_LEN: usize = 4;
const COUNT_LEN: usize = 50;
const INITIAL_MIN_LEVEL: f32 = 1e17;
const MIN_LEVEL_RISE: f32 = 1.001;

const ACTIVITY_THRESHOLD_CLEAN: f32 = 40.0;
const ACTIVITY_THRESHOLD_NOISY: f32 = 8.0;
const NOISY_POWER: f32 = 300_000.0;
/// Share of the noise floor subtracted to isolate echo power.
const NOISE_SAFETY: f32 = 0.99995;
const UPPER_MEAN_WEIGHT: f32 = 0.7;

/// Mean square level of a signal with a slowly rising minimum tracker.
#[derive(Debug, Clone)]
struct PowerLevel {
    block_sum: f32,
    block_counter: usize,
    frame_level: f32,
    frame_sum: f32,
    frame_counter: usize,
    average_level: f32,
    min_level: f32,
}

impl Default for PowerLevel {
    fn default() -> Self {
        Self {
            block_sum: 0.0,
            block_counter: 0,
            frame_level: 0.0,
            frame_sum: 0.0,
            frame_counter: 0,
            average_level: 0.0,
            min_level: INITIAL_MIN_LEVEL,
        }
    }
}

impl PowerLevel {
    /// Adds one block. Returns `true` when it completed a new average.
    fn update(&mut self, block: &[i16; PART_LEN]) -> bool {
        self.block_sum += block.iter().map(|&s| f32::from(s) * f32::from(s)).sum::<f32>();
        self.block_counter += 1;
        if self.block_counter < SUB_COUNT_LEN {
            return false;
        }

        self.frame_level = self.block_sum / (SUB_COUNT_LEN * PART_LEN) as f32;
        self.block_sum = 0.0;
        self.block_counter = 0;
        if self.frame_level > 0.0 {
            if self.frame_level < self.min_level {
                self.min_level = self.frame_level;
            } else {
                self.min_level *= MIN_LEVEL_RISE;
            }
        }

        self.frame_sum += self.frame_level;
        self.frame_counter += 1;
        if self.frame_counter < COUNT_LEN {
            return false;
        }
        self.average_level = self.frame_sum / COUNT_LEN as f32;
        self.frame_sum = 0.0;
        self.frame_counter = 0;
        true
    }

    /// Average with the noise floor removed.
    fn above_floor(&self) -> f32 {
        self.average_level - NOISE_SAFETY * self.min_level
    }
}

/// Running dB statistic.
#[derive(Debug, Clone)]
struct Statistic {
    instant: f32,
    average: f32,
    min: f32,
    max: f32,
    sum: f32,
    counter: usize,
    upper_sum: f32,
    upper_counter: usize,
    upper_mean: f32,
}

impl Default for Statistic {
    fn default() -> Self {
        Self {
            instant: OFFSET_LEVEL,
            average: OFFSET_LEVEL,
            min: -OFFSET_LEVEL,
            max: OFFSET_LEVEL,
            sum: 0.0,
            counter: 0,
            upper_sum: 0.0,
            upper_counter: 0,
            upper_mean: OFFSET_LEVEL,
        }
    }
}

impl Statistic {
    /// Records `value` in the running statistics and `instant` as the
    /// latest reading.
    fn update(&mut self, value: f32, instant: f32) {
        self.instant = instant;
        self.max = self.max.max(value);
        self.min = self.min.min(value);
        self.counter += 1;
        self.sum += value;
        self.average = self.sum / self.counter as f32;
        if value > self.average {
            self.upper_counter += 1;
            self.upper_sum += value;
            self.upper_mean = self.upper_sum / self.upper_counter as f32;
        }
    }

    fn report(&self) -> Metric {
        let average = if self.upper_mean > OFFSET_LEVEL && self.average > OFFSET_LEVEL {
            UPPER_MEAN_WEIGHT * self.upper_mean + (1.0 - UPPER_MEAN_WEIGHT) * self.average
        } else {
            OFFSET_LEVEL
        };
        let min = if self.min < -OFFSET_LEVEL {
            self.min
        } else {
            OFFSET_LEVEL
        };
        Metric {
            instant: self.instant as i16,
            average: average as i16,
            max: self.max as i16,
            min: min as i16,
        }
    }
}

/// One reported statistic, in whole dB.
///
/// Values that have not been measured yet read `-100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub instant: i16,
    /// Blend of the mean and the mean of readings above it.
    pub average: i16,
    pub max: i16,
    pub min: i16,
}

/// Snapshot of the echo statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoMetrics {
    /// Echo return loss: attenuation from loudspeaker to microphone.
    pub erl: Metric,
    /// Echo return loss enhancement achieved by the canceller.
    pub erle: Metric,
    /// Attenuation contributed by the residual echo suppressor.
    pub a_nlp: Metric,
    /// Total loss, ERL plus ERLE averages. All four fields carry the same
    /// value.
    pub rerl: Metric,
}

/// Floors at -100 dB, including for ratios pushed negative by the
/// noise-floor subtraction.
fn db(ratio: f32) -> f32 {
    10.0 * (ratio.max(0.0) + 1e-10).log10()
}

/// Level trackers plus the statistics derived from them.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsEngine {
    far: PowerLevel,
    near: PowerLevel,
    linear_out: PowerLevel,
    nlp_out: PowerLevel,
    echo_blocks: usize,
    erl: Statistic,
    erle: Statistic,
    a_nlp: Statistic,
}

impl MetricsEngine {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Folds in one block of each signal and whether the suppressor saw echo
    /// in it.
    pub(crate) fn update(
        &mut self,
        far: &[i16; PART_LEN],
        near: &[i16; PART_LEN],
        linear_out: &[i16; PART_LEN],
        nlp_out: &[i16; PART_LEN],
        echo_present: bool,
    ) {
        let window_done = self.far.update(far);
        self.near.update(near);
        self.linear_out.update(linear_out);
        self.nlp_out.update(nlp_out);
        if echo_present {
            self.echo_blocks += 1;
        }
        if !window_done {
            return;
        }

        let threshold = if self.far.min_level < NOISY_POWER {
            ACTIVITY_THRESHOLD_CLEAN
        } else {
            ACTIVITY_THRESHOLD_NOISY
        };
        let mostly_echo = self.echo_blocks > COUNT_LEN * SUB_COUNT_LEN / 2;
        let far_active = self.far.average_level > threshold * self.far.min_level;
        if mostly_echo && far_active {
            let echo = self.near.above_floor();

            let erl = db(self.far.average_level / self.near.average_level);
            self.erl.update(erl, erl);

            let linear_residual = self.linear_out.above_floor();
            let a_nlp = db(self.near.average_level / self.linear_out.average_level);
            self.a_nlp.update(a_nlp, db(echo / linear_residual));

            let nlp_residual = self.nlp_out.above_floor();
            let erle = db(echo / nlp_residual);
            self.erle.update(erle, erle);
        }
        self.echo_blocks = 0;
    }

    pub(crate) fn report(&self) -> EchoMetrics {
        let erl = self.erl.report();
        let erle = self.erle.report();
        let offset = OFFSET_LEVEL as i16;
        let rerl = if erl.average > offset && erle.average > offset {
            erl.average.saturating_add(erle.average)
        } else {
            offset
        };
        EchoMetrics {
            erl,
            erle,
            a_nlp: self.a_nlp.report(),
            rerl: Metric {
                instant: rerl,
                average: rerl,
                max: rerl,
                min: rerl,
            },
        }
    }
}
