//! Backward-induction solver for the normalized buffer-stock
//! consumption-saving problem.
//!
//! A household with CRRA utility receives labor income hit by permanent
//! and transitory lognormal shocks plus an occasional unemployment spell,
//! and chooses how much of its market resources to consume each period.
//! The crate offers tools to
//!
//! - validate model parameters (`params` module),
//! - discretize mean-one income shocks (`shocks` module),
//! - evaluate the closed-form impatience conditions (`conditions` module),
//! - iterate consumption rules backwards with the endogenous grid method (`solver` module), and
//! - locate target and pseudo-steady-state wealth ratios (`target` module).
//!
//! Everything is expressed relative to permanent income, so the problem
//! has a single state variable `m`, the ratio of market resources to
//! permanent income.
//!
//! # Quick start
//!
//! ```no_run
//! use bufferstock::{ConsumerProblem, ParameterSet, ProblemOptions};
//!
//! let params = ParameterSet::builder()
//!     .crra(2.0)
//!     .disc_fac(0.96)
//!     .rfree(1.04)
//!     .perm_gro_fac(1.03)
//!     .unemp_prb(0.005)
//!     .build()
//!     .expect("valid parameters");
//!
//! let problem = ConsumerProblem::new(params, ProblemOptions::default()).expect("well-formed problem");
//! println!("{}", problem.conditions());
//!
//! let solution = problem.solve().expect("converged");
//! println!("c(2) = {}", solution.consumption(2.0));
//! println!("target m = {:?}", solution.target_m());
//! ```
//!
//! Life-cycle profiles of survival, growth, or risk, and simulation of
//! populations of households, are outside the scope of this crate.

pub mod bounds;
pub mod conditions;
pub mod error;
pub mod grid;
pub mod interpolation;
pub mod options;
pub mod params;
pub mod shocks;
pub mod solver;
pub mod target;

pub use bounds::ConsumptionBounds;
pub use conditions::{Condition, ConditionReport};
pub use error::{ConsumptionError, Result};
pub use interpolation::PolicyFunction;
pub use options::{
    DiscretizationMethod, DiscretizationOptions, GridOptions, InterpolationOrder, ProblemOptions,
    SolverOptions,
};
pub use params::{ParameterSet, ParameterSetBuilder};
pub use shocks::ShockGrid;
pub use solver::{
    ConsumerProblem, ConvergenceSummary, FiniteHorizonSolution, InfiniteHorizonSolution,
    PeriodSolution,
};
