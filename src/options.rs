//! Configuration structures for the asset grid, shock discretization, and backward induction.

use serde::{Deserialize, Serialize};

use crate::error::{ConsumptionError, Result};

/// End-of-period asset grid, measured above the natural borrowing limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridOptions {
    /// Smallest grid point above the borrowing limit.
    pub a_xtra_min: f64,
    /// Largest grid point above the borrowing limit.
    pub a_xtra_max: f64,
    /// Number of multi-exponentially spaced points.
    pub a_xtra_count: usize,
    /// How many times the `exp(x) - 1` transform is nested (0 gives a linear grid).
    pub nest_count: usize,
    /// Additional points near the constraint where curvature is highest.
    pub extra_points: Vec<f64>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            a_xtra_min: 0.001,
            a_xtra_max: 20.0,
            a_xtra_count: 48,
            nest_count: 3,
            extra_points: vec![1e-5, 1e-4],
        }
    }
}

/// Quadrature rule used to discretize a mean-one lognormal shock.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DiscretizationMethod {
    /// Gauss–Hermite nodes and weights for the underlying normal.
    GaussHermite,
    /// Equally weighted pseudo-random draws from a seeded generator.
    MonteCarlo { draws: usize, seed: u64 },
}

/// Controls how the continuous income shocks are approximated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationOptions {
    /// Number of nodes for the permanent shock.
    pub perm_shock_count: usize,
    /// Number of nodes for the employed transitory shock.
    pub tran_shock_count: usize,
    /// Quadrature rule shared by both shocks.
    pub method: DiscretizationMethod,
}

impl Default for DiscretizationOptions {
    fn default() -> Self {
        Self {
            perm_shock_count: 7,
            tran_shock_count: 7,
            method: DiscretizationMethod::GaussHermite,
        }
    }
}

/// Interpolation order used to represent each period's consumption function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationOrder {
    /// Piecewise linear through the endogenous gridpoints.
    Linear,
    /// Piecewise cubic Hermite using the marginal propensities to consume as slopes.
    Cubic,
}

/// Configuration for backward induction towards the limiting consumption function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Sup-norm tolerance between successive consumption functions.
    pub tolerance: f64,
    /// Maximum number of backward steps before aborting.
    pub max_iterations: usize,
    /// Abort when the distance has not reached a new minimum for this many iterations.
    pub stall_limit: Option<usize>,
    /// Interpolation order of the fitted policies.
    pub interpolation: InterpolationOrder,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 10_000,
            stall_limit: Some(250),
            interpolation: InterpolationOrder::Cubic,
        }
    }
}

impl SolverOptions {
    /// Checks that the tolerance and caps are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConsumptionError::InvalidOptions {
                reason: "tolerance must be finite and strictly positive",
            });
        }
        if self.max_iterations == 0 {
            return Err(ConsumptionError::InvalidOptions {
                reason: "max_iterations must be at least one",
            });
        }
        if self.stall_limit == Some(0) {
            return Err(ConsumptionError::InvalidOptions {
                reason: "stall_limit must be at least one when set",
            });
        }
        Ok(())
    }
}

/// Aggregated configuration used when building and solving a [`ConsumerProblem`](crate::ConsumerProblem).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemOptions {
    pub grid: GridOptions,
    pub discretization: DiscretizationOptions,
    pub solver: SolverOptions,
}

impl ProblemOptions {
    /// Override the asset grid while preserving other defaults.
    pub fn with_grid(mut self, grid: GridOptions) -> Self {
        self.grid = grid;
        self
    }

    /// Override the shock discretization while preserving other defaults.
    pub fn with_discretization(mut self, discretization: DiscretizationOptions) -> Self {
        self.discretization = discretization;
        self
    }

    /// Override the backward-induction settings while preserving other defaults.
    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    /// Set the convergence tolerance of the infinite-horizon iteration.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.solver.tolerance = tolerance;
        self
    }

    /// Set the iteration cap of the infinite-horizon iteration.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.solver.max_iterations = max_iterations.max(1);
        self
    }

    /// Set or disable the stall check.
    pub fn with_stall_limit(mut self, stall_limit: Option<usize>) -> Self {
        self.solver.stall_limit = stall_limit;
        self
    }

    /// Choose linear or cubic policy interpolation.
    pub fn with_interpolation(mut self, interpolation: InterpolationOrder) -> Self {
        self.solver.interpolation = interpolation;
        self
    }

    /// Scale the asset grid, as is needed close to the critical patience values.
    pub fn with_asset_grid(mut self, a_xtra_max: f64, a_xtra_count: usize) -> Self {
        self.grid.a_xtra_max = a_xtra_max;
        self.grid.a_xtra_count = a_xtra_count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SolverOptions::default().validate().is_ok());
    }

    #[test]
    fn chaining_overrides_only_named_fields() {
        let options = ProblemOptions::default()
            .with_tolerance(1e-8)
            .with_asset_grid(96.0, 192)
            .with_stall_limit(None);
        assert_eq!(options.solver.tolerance, 1e-8);
        assert_eq!(options.grid.a_xtra_count, 192);
        assert_eq!(options.grid.nest_count, 3);
        assert_eq!(options.solver.stall_limit, None);
        assert_eq!(options.discretization, DiscretizationOptions::default());
    }

    #[test]
    fn zero_tolerance_is_rejected() {
        let options = SolverOptions {
            tolerance: 0.0,
            ..SolverOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConsumptionError::InvalidOptions { .. })
        ));
    }
}
