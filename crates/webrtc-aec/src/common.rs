//! Block geometry, sample-rate classes and shared lookup tables.

use crate::echo_canceller::Error;

/// Samples per API frame (10 ms at 8 kHz, one band at 16 and 32 kHz).
pub const FRAME_LEN: usize = 80;
/// Samples per processing block.
pub const PART_LEN: usize = 64;
/// Bins in the spectrum of a two-block window, DC through Nyquist.
pub const PART_LEN1: usize = PART_LEN + 1;
/// Transform length.
pub const PART_LEN2: usize = 2 * PART_LEN;
/// Number of filter partitions.
pub const NR_PART: usize = 12;

pub(crate) const FILT_LEN: usize = PART_LEN * NR_PART;
/// Far-end delay buffer length in samples.
pub(crate) const FAR_BUF_LEN: usize = 2 * 2 * FILT_LEN;

/// Capacity of each re-blocking ring buffer.
pub(crate) const FRAME_BUF_LEN: usize = FRAME_LEN + PART_LEN;

pub(crate) const PREF_BAND_SIZE: usize = 24;

/// Scale factor undoing the gain of an inverse transform.
pub(crate) const IFFT_SCALE: f32 = 2.0 / PART_LEN2 as f32;

/// Input sampling rates the canceller runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    /// Narrowband.
    Hz8000,
    /// Wideband.
    Hz16000,
    /// Super-wideband, processed as a 16 kHz low band plus a gain-only
    /// high band.
    Hz32000,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz32000 => 32000,
        }
    }

    /// Block-rate multiplier relative to 8 kHz. Time constants expressed in
    /// blocks are scaled by it.
    pub(crate) fn mult(self) -> usize {
        match self {
            Self::Hz8000 => 1,
            Self::Hz16000 | Self::Hz32000 => 2,
        }
    }

    /// Whether frames carry a separate upper band.
    pub fn has_high_band(self) -> bool {
        self == Self::Hz32000
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = Error;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            8000 => Ok(Self::Hz8000),
            16000 => Ok(Self::Hz16000),
            32000 => Ok(Self::Hz32000),
            other => Err(Error::BadSampleRate(other)),
        }
    }
}

/// Saturating conversion to a 16-bit sample.
#[inline]
pub(crate) fn saturate_i16(v: f32) -> i16 {
    v.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Square-root Hann window, rising half plus the peak.
///
/// The falling half of the analysis window is read backwards, so a
/// two-block window is `w[i]` for the first block and `w[PART_LEN - i]`
/// for the second.
#[rustfmt::skip]
#[allow(clippy::approx_constant, clippy::excessive_precision, reason = "tabulated window values")]
pub(crate) const SQRT_HANNING: [f32; PART_LEN1] = [
    0.000000000, 0.024541229, 0.049067674,
    0.073564564, 0.098017140, 0.122410675,
    0.146730474, 0.170961889, 0.195090322,
    0.219101240, 0.242980180, 0.266712757,
    0.290284677, 0.313681740, 0.336889853,
    0.359895037, 0.382683432, 0.405241314,
    0.427555093, 0.449611330, 0.471396737,
    0.492898192, 0.514102744, 0.534997620,
    0.555570233, 0.575808191, 0.595699304,
    0.615231591, 0.634393284, 0.653172843,
    0.671558955, 0.689540545, 0.707106781,
    0.724247083, 0.740951125, 0.757208847,
    0.773010453, 0.788346428, 0.803207531,
    0.817584813, 0.831469612, 0.844853565,
    0.857728610, 0.870086991, 0.881921264,
    0.893224301, 0.903989293, 0.914209756,
    0.923879533, 0.932992799, 0.941544065,
    0.949528181, 0.956940336, 0.963776066,
    0.970031253, 0.975702130, 0.980785280,
    0.985277642, 0.989176510, 0.992479535,
    0.995184727, 0.997290457, 0.998795456,
    0.999698819, 1.000000000,
];

/// Per-bin blend weight toward the feedback gain: `0.3 * sqrt(k / 63) + 0.1`,
/// with bin 0 unweighted.
#[rustfmt::skip]
pub(crate) const WEIGHT_CURVE: [f32; PART_LEN1] = [
    0.0000, 0.1000, 0.1378, 0.1535, 0.1655, 0.1756,
    0.1845, 0.1926, 0.2000, 0.2069, 0.2134, 0.2195,
    0.2254, 0.2309, 0.2363, 0.2414, 0.2464, 0.2512,
    0.2558, 0.2604, 0.2648, 0.2690, 0.2732, 0.2773,
    0.2813, 0.2852, 0.2890, 0.2927, 0.2964, 0.3000,
    0.3035, 0.3070, 0.3104, 0.3138, 0.3171, 0.3204,
    0.3236, 0.3268, 0.3299, 0.3330, 0.3360, 0.3390,
    0.3420, 0.3449, 0.3478, 0.3507, 0.3535, 0.3563,
    0.3591, 0.3619, 0.3646, 0.3673, 0.3699, 0.3726,
    0.3752, 0.3777, 0.3803, 0.3828, 0.3854, 0.3878,
    0.3903, 0.3928, 0.3952, 0.3976, 0.4000,
];

/// Per-bin overdrive exponent scale: `sqrt(k / 64) + 1`.
#[rustfmt::skip]
pub(crate) const OVERDRIVE_CURVE: [f32; PART_LEN1] = [
    1.0000, 1.1250, 1.1768, 1.2165, 1.2500, 1.2795,
    1.3062, 1.3307, 1.3536, 1.3750, 1.3953, 1.4146,
    1.4330, 1.4507, 1.4677, 1.4841, 1.5000, 1.5154,
    1.5303, 1.5449, 1.5590, 1.5728, 1.5863, 1.5995,
    1.6124, 1.6250, 1.6374, 1.6495, 1.6614, 1.6731,
    1.6847, 1.6960, 1.7071, 1.7181, 1.7289, 1.7395,
    1.7500, 1.7603, 1.7706, 1.7806, 1.7906, 1.8004,
    1.8101, 1.8197, 1.8292, 1.8385, 1.8478, 1.8570,
    1.8660, 1.8750, 1.8839, 1.8927, 1.9014, 1.9100,
    1.9186, 1.9270, 1.9354, 1.9437, 1.9520, 1.9601,
    1.9682, 1.9763, 1.9843, 1.9922, 2.0000,
];
