//! Input generators for property-based tests.

use proptest::prelude::*;
use test_strategy::Arbitrary;

/// Samples per 10 ms frame in each band.
pub const FRAME_SAMPLES: usize = 80;

/// A sample rate the canceller accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum SupportedRate {
    Hz8000,
    Hz16000,
    Hz32000,
}

impl SupportedRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz32000 => 32000,
        }
    }
}

/// One frame of far and near samples plus a reported delay.
#[derive(Debug, Clone, Arbitrary)]
pub struct FramePair {
    #[strategy(frame_i16())]
    pub far: Vec<i16>,
    #[strategy(frame_i16())]
    pub near: Vec<i16>,
    #[strategy(known_delay())]
    pub known_delay: i32,
}

/// Full-scale 16-bit frame.
pub fn frame_i16() -> impl Strategy<Value = Vec<i16>> {
    proptest::collection::vec(any::<i16>(), FRAME_SAMPLES)
}

/// Reported far-end delay in samples, including out-of-range values.
pub fn known_delay() -> impl Strategy<Value = i32> {
    prop_oneof![
        4 => 0i32..=480,
        1 => -4000i32..=4000,
    ]
}

/// Real and imaginary parts of a spectrum with `len` bins, each component
/// within `±magnitude`.
pub fn spectrum_parts(
    len: usize,
    magnitude: f32,
) -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
    let part = proptest::collection::vec(-magnitude..=magnitude, len);
    (part.clone(), part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn frames_have_frame_length(#[strategy(frame_i16())] frame: Vec<i16>) {
        assert_eq!(frame.len(), FRAME_SAMPLES);
    }

    #[proptest]
    fn spectrum_parts_have_requested_shape(
        #[strategy(spectrum_parts(65, 10.0))] parts: (Vec<f32>, Vec<f32>),
    ) {
        assert_eq!(parts.0.len(), 65);
        assert_eq!(parts.1.len(), 65);
        assert!(parts.0.iter().chain(&parts.1).all(|v| v.abs() <= 10.0));
    }

    #[proptest]
    fn frame_pair_is_consistent(pair: FramePair) {
        assert_eq!(pair.far.len(), FRAME_SAMPLES);
        assert_eq!(pair.near.len(), FRAME_SAMPLES);
        assert!((-4000..=4000).contains(&pair.known_delay));
    }

    #[proptest]
    fn rates_are_supported(rate: SupportedRate) {
        assert!([8000, 16000, 32000].contains(&rate.hz()));
    }
}
