//! Runtime configuration of the echo canceller.

/// How hard the residual echo suppressor pushes down bins it believes
/// contain echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionLevel {
    /// Least near-end distortion, most residual echo.
    Conservative,
    #[default]
    Moderate,
    /// Strongest suppression, at the cost of clipping double talk.
    Aggressive,
}

impl SuppressionLevel {
    /// `(target suppression in natural-log units, minimum overdrive)`.
    pub(crate) fn targets(self) -> (f32, f32) {
        match self {
            Self::Conservative => (-6.9, 1.0),
            Self::Moderate => (-11.5, 2.0),
            Self::Aggressive => (-18.4, 5.0),
        }
    }
}

/// Which kernel implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelPreference {
    /// Fastest variant the CPU supports.
    #[default]
    Auto,
    /// Always the portable scalar code.
    Scalar,
}

/// Echo canceller settings. All can be changed between frames with
/// [`EchoCanceller::set_config`](crate::EchoCanceller::set_config).
#[derive(Debug, Clone, PartialEq)]
pub struct EchoCancellerConfig {
    pub suppression_level: SuppressionLevel,
    /// Collect ERL / ERLE / A_NLP statistics.
    pub metrics_enabled: bool,
    /// Update the adaptive filter. When off, the filter keeps its current
    /// weights.
    pub adaptation_enabled: bool,
    /// Run the residual echo suppressor. When off, the linear filter output
    /// is returned.
    pub nonlinear_processing_enabled: bool,
    /// Fill suppressed bins with comfort noise.
    pub comfort_noise_enabled: bool,
    /// Skip the causality constraint on filter updates.
    pub unconstrained_filter: bool,
    /// Only read at construction and [`initialize`](crate::EchoCanceller::initialize).
    pub kernel: KernelPreference,
}

impl Default for EchoCancellerConfig {
    fn default() -> Self {
        Self {
            suppression_level: SuppressionLevel::Moderate,
            metrics_enabled: false,
            adaptation_enabled: true,
            nonlinear_processing_enabled: true,
            comfort_noise_enabled: true,
            unconstrained_filter: false,
            kernel: KernelPreference::Auto,
        }
    }
}
