//! Frequency-domain acoustic echo canceller.
//!
//! Removes the loudspeaker signal picked up by the microphone in two
//! stages: a 12-partition frequency-domain NLMS filter subtracts the
//! linear echo, and a coherence-based suppressor attenuates what remains,
//! filling suppressed bins with comfort noise. Runs on mono 16-bit audio at
//! 8, 16 or 32 kHz in 10 ms frames.
//!
//! ```
//! use webrtc_aec::{EchoCanceller, EchoCancellerConfig, FRAME_LEN, SampleRate};
//!
//! let mut aec = EchoCanceller::new(EchoCancellerConfig::default(), SampleRate::Hz16000)?;
//! let far = [0i16; FRAME_LEN];
//! let near = [0i16; FRAME_LEN];
//! let mut out = [0i16; FRAME_LEN];
//! aec.process_frame(&far, &near, None, &mut out, None, 0);
//! # Ok::<(), webrtc_aec::Error>(())
//! ```

pub(crate) mod adaptive_filter;
pub(crate) mod block_processor;
pub(crate) mod comfort_noise;
pub(crate) mod common;
pub(crate) mod config;
pub(crate) mod echo_canceller;
pub(crate) mod far_buffer;
pub(crate) mod fft_data;
pub(crate) mod kernels;
pub(crate) mod metrics;
pub(crate) mod noise_estimator;
pub(crate) mod random;
pub(crate) mod spectral_transform;
pub(crate) mod spectrum_ring;
pub(crate) mod suppressor;

pub use common::{FRAME_LEN, NR_PART, PART_LEN, PART_LEN1, PART_LEN2, SampleRate};
pub use config::{EchoCancellerConfig, KernelPreference, SuppressionLevel};
pub use echo_canceller::{EchoCanceller, Error, Frame};
pub use kernels::KernelBackend;
pub use metrics::{EchoMetrics, Metric};
