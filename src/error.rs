use thiserror::Error;

/// Unified error type for `bufferstock` operations.
#[derive(Debug, Error)]
pub enum ConsumptionError {
    /// Raised when a model parameter is outside its admissible range.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The value that was supplied.
        value: f64,
        /// Human-readable description of the admissible range.
        reason: &'static str,
    },

    /// Raised when an asset grid or interpolation table is malformed.
    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: &'static str },

    /// Raised when numerical options are unusable.
    #[error("invalid options: {reason}")]
    InvalidOptions { reason: &'static str },

    /// Raised when discrete probabilities are non-positive or do not sum to one.
    #[error("probabilities must be strictly positive and sum to one (slack {slack})")]
    InvalidWeights { slack: f64 },

    /// Raised when a discretized shock does not have unit mean.
    #[error("{shock} shock must have mean one, found {mean}")]
    NonUnitMean { shock: &'static str, mean: f64 },

    /// Raised when backward induction hits the iteration cap.
    #[error(
        "backward induction did not converge after {iterations} iterations; last distance {distance}"
    )]
    DidNotConverge {
        /// Number of iterations performed before termination.
        iterations: usize,
        /// Sup-norm distance between the last two policies.
        distance: f64,
    },

    /// Raised when the distance between successive policies stops shrinking.
    #[error(
        "backward induction stalled after {iterations} iterations: distance {distance}, best {best}"
    )]
    Stalled {
        iterations: usize,
        distance: f64,
        best: f64,
    },

    /// Raised when the parameters do not certify a nondegenerate limiting solution.
    #[error("limiting consumption function is degenerate: {condition} fails")]
    DegenerateLimit { condition: &'static str },

    /// Raised by the locators when the relevant impatience condition fails.
    #[error("{locator} has no finite root because {condition} fails")]
    NoFiniteRoot {
        locator: &'static str,
        condition: &'static str,
    },

    /// Raised when no sign change can be found for a locator.
    #[error("could not bracket a root for {locator}")]
    RootNotBracketed { locator: &'static str },

    /// Raised when numerical routines produce NaN or infinities.
    #[error("encountered non-finite value during {context}")]
    NumericalError { context: &'static str },
}

impl ConsumptionError {
    /// Helper to format an [`InvalidParameter`](ConsumptionError::InvalidParameter) error.
    pub fn invalid_parameter(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }

    /// Helper for malformed grids.
    pub fn invalid_grid(reason: &'static str) -> Self {
        Self::InvalidGrid { reason }
    }

    /// Helper for non-finite intermediate values.
    pub fn numerical(context: &'static str) -> Self {
        Self::NumericalError { context }
    }

    /// Returns `true` for the "root is infinite" outcome, which callers may
    /// accept as a valid modeling result rather than a failure.
    pub fn is_infinite_root(&self) -> bool {
        matches!(self, Self::NoFiniteRoot { .. })
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, ConsumptionError>;
