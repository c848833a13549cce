//! Public frame-level API.
//!
//! Callers hand in 10 ms frames of [`FRAME_LEN`] samples; processing runs on
//! blocks of [`PART_LEN`]. Ring buffers between the two re-block the
//! streams; when a block is not ready in time the output is padded with
//! zeros ahead of the buffered samples, which settles into a fixed 48-sample
//! re-blocking delay after the third frame.

use std::collections::TryReserveError;
use std::num::NonZero;

use derive_more::Debug;
use webrtc_ring_buffer::RingBuffer;

use crate::block_processor::{Block, BlockProcessor};
use crate::common::{FRAME_BUF_LEN, FRAME_LEN, PART_LEN, SampleRate};
use crate::config::{EchoCancellerConfig, KernelPreference};
use crate::far_buffer::FarBuffer;
use crate::kernels::KernelBackend;
use crate::metrics::EchoMetrics;

/// One 10 ms frame of one band.
pub type Frame = [i16; FRAME_LEN];

const FRAME_BUF_CAPACITY: NonZero<usize> = match NonZero::new(FRAME_BUF_LEN) {
    Some(n) => n,
    None => panic!("frame buffer capacity must be non-zero"),
};

const SILENCE: Frame = [0; FRAME_LEN];

// ─── Error ───────────────────────────────────────────────────────────

/// Errors returned when setting up an echo canceller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Only 8000, 16000 and 32000 Hz are supported.
    BadSampleRate(u32),
    /// Buffer storage could not be allocated.
    Allocation,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSampleRate(hz) => write!(f, "unsupported sample rate {hz} Hz"),
            Self::Allocation => write!(f, "buffer allocation failed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Self::Allocation
    }
}

// ─── EchoCanceller ──────────────────────────────────────────────────

/// Acoustic echo canceller for one far-end / near-end pair.
///
/// # Usage
///
/// 1. Create an instance with [`EchoCanceller::new`].
/// 2. Every 10 ms, call [`process_frame`](EchoCanceller::process_frame) with
///    the frame just sent to the loudspeaker, the frame just captured by the
///    microphone and the known extra far-end delay in samples.
/// 3. Optionally query [`metrics`](EchoCanceller::metrics) and
///    [`echo_state`](EchoCanceller::echo_state).
///
/// At 32 kHz the caller supplies the band-split signal: the lower band in
/// `near` and the upper band in `near_high`. The far end is always the
/// lower band only.
#[derive(Debug)]
pub struct EchoCanceller {
    config: EchoCancellerConfig,
    sample_rate: SampleRate,
    backend: KernelBackend,
    far_buffer: FarBuffer,
    #[debug(skip)]
    far_frames: RingBuffer<i16>,
    #[debug(skip)]
    near_frames: RingBuffer<i16>,
    #[debug(skip)]
    near_high_frames: RingBuffer<i16>,
    #[debug(skip)]
    out_frames: RingBuffer<i16>,
    #[debug(skip)]
    out_high_frames: RingBuffer<i16>,
    block: BlockProcessor,
}

impl EchoCanceller {
    /// Allocates and initializes a canceller.
    pub fn new(config: EchoCancellerConfig, sample_rate: SampleRate) -> Result<Self, Error> {
        let backend = select_backend(config.kernel);
        let this = Self {
            far_buffer: FarBuffer::new(),
            far_frames: RingBuffer::try_new(FRAME_BUF_CAPACITY)?,
            near_frames: RingBuffer::try_new(FRAME_BUF_CAPACITY)?,
            near_high_frames: RingBuffer::try_new(FRAME_BUF_CAPACITY)?,
            out_frames: RingBuffer::try_new(FRAME_BUF_CAPACITY)?,
            out_high_frames: RingBuffer::try_new(FRAME_BUF_CAPACITY)?,
            block: BlockProcessor::new(sample_rate, backend, config.clone()),
            config,
            sample_rate,
            backend,
        };
        tracing::debug!(
            sample_rate = sample_rate.hz(),
            backend = backend.name(),
            "echo canceller initialized"
        );
        Ok(this)
    }

    /// Discards all adaptive state and restarts at `sample_rate`, keeping
    /// the current configuration.
    pub fn initialize(&mut self, sample_rate: SampleRate) {
        self.sample_rate = sample_rate;
        self.backend = select_backend(self.config.kernel);
        self.far_buffer.reset();
        for ring in [
            &mut self.far_frames,
            &mut self.near_frames,
            &mut self.near_high_frames,
            &mut self.out_frames,
            &mut self.out_high_frames,
        ] {
            ring.clear();
        }
        self.block = BlockProcessor::new(sample_rate, self.backend, self.config.clone());
        tracing::debug!(
            sample_rate = sample_rate.hz(),
            backend = self.backend.name(),
            "echo canceller initialized"
        );
    }

    /// Processes one frame.
    ///
    /// `known_delay` is the extra far-end delay in samples the caller
    /// already knows about; changing it moves the far-end read position by
    /// the difference. Below 32 kHz the upper-band arguments are ignored.
    /// At 32 kHz a missing `near_high` is processed as silence and a
    /// missing `out_high` discards the upper band.
    pub fn process_frame(
        &mut self,
        far: &Frame,
        near: &Frame,
        near_high: Option<&Frame>,
        out: &mut Frame,
        out_high: Option<&mut Frame>,
        known_delay: i32,
    ) {
        let high_band = self.sample_rate.has_high_band();

        self.far_buffer.write(far);
        let mut aligned = [0i16; FRAME_LEN];
        self.far_buffer.fetch(known_delay, &mut aligned);

        self.far_frames.write(&aligned);
        self.near_frames.write(near);
        if high_band {
            self.near_high_frames.write(near_high.unwrap_or(&SILENCE));
        }

        let mut far_block: Block = [0; PART_LEN];
        let mut near_block: Block = [0; PART_LEN];
        let mut near_high_block: Block = [0; PART_LEN];
        let mut out_block: Block = [0; PART_LEN];
        let mut out_high_block: Block = [0; PART_LEN];
        while self.far_frames.available_read() >= PART_LEN {
            self.far_frames.read(&mut far_block);
            self.near_frames.read(&mut near_block);
            if high_band {
                self.near_high_frames.read(&mut near_high_block);
            }
            self.block.process(
                &far_block,
                &near_block,
                &near_high_block,
                &mut out_block,
                &mut out_high_block,
            );
            self.out_frames.write(&out_block);
            if high_band {
                self.out_high_frames.write(&out_high_block);
            }
        }

        let missing = FRAME_LEN.saturating_sub(self.out_frames.available_read());
        if missing > 0 {
            self.out_frames.stuff_zeros(missing);
            if high_band {
                self.out_high_frames.stuff_zeros(missing);
            }
        }
        self.out_frames.read(out);
        if high_band {
            let mut discard = SILENCE;
            self.out_high_frames.read(out_high.unwrap_or(&mut discard));
        }
    }

    /// Turns statistics collection on or off. Turning it on starts from
    /// empty statistics.
    pub fn set_metrics_enabled(&mut self, enabled: bool) {
        let config = EchoCancellerConfig {
            metrics_enabled: enabled,
            ..self.config.clone()
        };
        self.set_config(config);
    }

    /// Current echo statistics. Unmeasured values read `-100`.
    pub fn metrics(&self) -> EchoMetrics {
        self.block.metrics()
    }

    /// Whether the last processed block was judged to contain echo.
    pub fn echo_state(&self) -> bool {
        self.block.echo_state()
    }

    /// Applies a new configuration from the next frame on.
    ///
    /// A changed [`kernel`](EchoCancellerConfig::kernel) preference takes
    /// effect at the next [`initialize`](Self::initialize).
    pub fn set_config(&mut self, config: EchoCancellerConfig) {
        self.block.set_config(config.clone());
        self.config = config;
    }

    pub fn config(&self) -> &EchoCancellerConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Kernel implementation in use.
    pub fn kernel_backend(&self) -> KernelBackend {
        self.backend
    }
}

fn select_backend(preference: KernelPreference) -> KernelBackend {
    match preference {
        KernelPreference::Auto => KernelBackend::detect(),
        KernelPreference::Scalar => KernelBackend::Scalar,
    }
}
