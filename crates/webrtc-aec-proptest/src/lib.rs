//! Property-test support for the echo canceller crates.
//!
//! Generators produce frames, delays and spectra shaped like the real
//! inputs; the comparison helpers report the first offending index.
//!
//! ```ignore
//! use test_strategy::proptest;
//! use webrtc_aec_proptest::generators::frame_i16;
//!
//! #[proptest]
//! fn frames_have_80_samples(#[strategy(frame_i16())] frame: Vec<i16>) {
//!     assert_eq!(frame.len(), 80);
//! }
//! ```

pub mod comparison;
pub mod generators;

pub use proptest;
pub use test_strategy;
