//! Backward induction over consumption functions.
//!
//! Each step uses the endogenous grid method: for every end-of-period asset
//! level the expected discounted marginal value is integrated over the
//! [`ShockGrid`], the Euler equation is inverted for consumption, and the
//! resulting `(m, c, κ)` points are interpolated into the new
//! [`PolicyFunction`]. Steps within a period are independent across asset
//! points and run on the rayon pool; periods are strictly sequential.

use log::{debug, info, warn};
use nalgebra::DVector;
use rayon::prelude::*;

use crate::bounds::ConsumptionBounds;
use crate::conditions::ConditionReport;
use crate::error::{ConsumptionError, Result};
use crate::grid::asset_grid;
use crate::interpolation::{Extrapolation, Interpolant, PolicyFunction};
use crate::options::{InterpolationOrder, ProblemOptions};
use crate::params::ParameterSet;
use crate::shocks::ShockGrid;

/// The solution of one period: the consumption rule plus the bookkeeping
/// the preceding period needs.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodSolution {
    policy: PolicyFunction,
    m_min: f64,
    human_wealth: f64,
    mpc_min: f64,
    mpc_max: f64,
}

impl PeriodSolution {
    /// Last period of life: consume everything.
    pub fn terminal() -> Self {
        Self {
            policy: PolicyFunction::consume_everything(),
            m_min: 0.0,
            human_wealth: 0.0,
            mpc_min: 1.0,
            mpc_max: 1.0,
        }
    }

    /// The consumption rule `c(m)`.
    pub fn policy(&self) -> &PolicyFunction {
        &self.policy
    }

    /// Consumption at market resources `m`.
    pub fn consumption(&self, m: f64) -> f64 {
        self.policy.evaluate(m)
    }

    /// Marginal propensity to consume at `m`.
    pub fn mpc(&self, m: f64) -> f64 {
        self.policy.derivative(m)
    }

    /// Lowest feasible market resources (the tighter of the natural and artificial limits).
    pub fn m_min(&self) -> f64 {
        self.m_min
    }

    /// Expected human wealth beyond the current period, normalized by permanent income.
    pub fn human_wealth(&self) -> f64 {
        self.human_wealth
    }

    /// MPC as resources grow without bound.
    pub fn mpc_min(&self) -> f64 {
        self.mpc_min
    }

    /// MPC as resources approach `m_min`; one when the artificial limit binds.
    pub fn mpc_max(&self) -> f64 {
        self.mpc_max
    }
}

/// Diagnostics returned alongside the converged consumption function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceSummary {
    /// Number of backward steps performed.
    pub iterations: usize,
    /// Sup-norm distance between the last two consumption functions.
    pub distance: f64,
}

/// Consumption functions for a finite horizon, indexed by periods remaining.
///
/// Index 0 is the terminal period; the sequence only ever grows from the
/// back of life towards the front.
#[derive(Clone, Debug)]
pub struct FiniteHorizonSolution {
    periods: Vec<PeriodSolution>,
}

impl FiniteHorizonSolution {
    /// Number of stored periods (the horizon plus the terminal period).
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Solution with `periods_remaining` periods left before the terminal one.
    pub fn period(&self, periods_remaining: usize) -> Option<&PeriodSolution> {
        self.periods.get(periods_remaining)
    }

    /// The terminal period.
    pub fn terminal(&self) -> &PeriodSolution {
        &self.periods[0]
    }

    /// The earliest solved period.
    pub fn first_period(&self) -> &PeriodSolution {
        &self.periods[self.periods.len() - 1]
    }

    /// Iterates from the terminal period backwards in time.
    pub fn iter(&self) -> impl Iterator<Item = &PeriodSolution> {
        self.periods.iter()
    }
}

/// The limiting consumption function of the infinite-horizon problem.
#[derive(Clone, Debug)]
pub struct InfiniteHorizonSolution {
    pub(crate) solution: PeriodSolution,
    pub(crate) convergence: ConvergenceSummary,
    pub(crate) conditions: ConditionReport,
    pub(crate) params: ParameterSet,
    pub(crate) shocks: ShockGrid,
}

impl InfiniteHorizonSolution {
    /// The converged period solution.
    pub fn solution(&self) -> &PeriodSolution {
        &self.solution
    }

    /// The converged consumption rule `c(m)`.
    pub fn policy(&self) -> &PolicyFunction {
        &self.solution.policy
    }

    pub fn consumption(&self, m: f64) -> f64 {
        self.solution.consumption(m)
    }

    pub fn mpc(&self, m: f64) -> f64 {
        self.solution.mpc(m)
    }

    pub fn convergence(&self) -> &ConvergenceSummary {
        &self.convergence
    }

    pub fn conditions(&self) -> &ConditionReport {
        &self.conditions
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn shocks(&self) -> &ShockGrid {
        &self.shocks
    }

    /// Closed-form MPC limits and consumption bounds for these parameters.
    pub fn bounds(&self) -> ConsumptionBounds {
        ConsumptionBounds::new(&self.params)
    }
}

/// A buffer-stock consumption problem ready to be solved.
#[derive(Clone, Debug)]
pub struct ConsumerProblem {
    params: ParameterSet,
    shocks: ShockGrid,
    a_xtra: DVector<f64>,
    options: ProblemOptions,
    conditions: ConditionReport,
}

impl ConsumerProblem {
    /// Discretizes the income shocks, builds the asset grid, and evaluates the conditions.
    pub fn new(params: ParameterSet, options: ProblemOptions) -> Result<Self> {
        let shocks = ShockGrid::from_parameters(&params, &options.discretization)?;
        Self::with_shocks(params, shocks, options)
    }

    /// Builds a problem around an explicitly supplied shock grid.
    pub fn with_shocks(params: ParameterSet, shocks: ShockGrid, options: ProblemOptions) -> Result<Self> {
        options.solver.validate()?;
        let a_xtra = asset_grid(&options.grid)?;
        let conditions = ConditionReport::evaluate(&params, &shocks);
        debug!("conditions for {:?}:\n{}", params, conditions);
        Ok(Self {
            params,
            shocks,
            a_xtra,
            options,
            conditions,
        })
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn shocks(&self) -> &ShockGrid {
        &self.shocks
    }

    /// End-of-period asset grid above the borrowing limit.
    pub fn asset_grid(&self) -> &DVector<f64> {
        &self.a_xtra
    }

    pub fn options(&self) -> &ProblemOptions {
        &self.options
    }

    pub fn conditions(&self) -> &ConditionReport {
        &self.conditions
    }

    /// Solves `periods` periods backwards from the consume-everything terminal rule.
    pub fn solve_finite_horizon(&self, periods: usize) -> Result<FiniteHorizonSolution> {
        self.solve_finite_horizon_from(PeriodSolution::terminal(), periods)
    }

    /// Solves `periods` periods backwards from an arbitrary terminal solution.
    pub fn solve_finite_horizon_from(
        &self,
        terminal: PeriodSolution,
        periods: usize,
    ) -> Result<FiniteHorizonSolution> {
        let mut solved = Vec::with_capacity(periods + 1);
        solved.push(terminal);
        for remaining in 1..=periods {
            let next = self.solve_period(&solved[remaining - 1])?;
            solved.push(next);
        }
        info!("solved {periods} periods of the finite-horizon problem");
        Ok(FiniteHorizonSolution { periods: solved })
    }

    /// Iterates backwards to the limiting consumption function.
    ///
    /// Fails with [`ConsumptionError::DegenerateLimit`] when the conditions do
    /// not certify a nondegenerate limit, [`ConsumptionError::Stalled`] when the
    /// distance stops improving, and [`ConsumptionError::DidNotConverge`] at the
    /// iteration cap.
    pub fn solve(&self) -> Result<InfiniteHorizonSolution> {
        if let Err(err) = self.conditions.certify() {
            warn!("refusing to iterate to the limit: {err}");
            return Err(err);
        }
        if !self.conditions.gic_nrm.holds {
            warn!("GICNrm fails: the individual target wealth ratio is infinite");
        }

        let options = &self.options.solver;
        let mut current = PeriodSolution::terminal();
        let mut best = f64::INFINITY;
        let mut since_best = 0usize;
        let mut distance = f64::INFINITY;

        for iteration in 1..=options.max_iterations {
            let next = self.solve_period(&current)?;
            distance = next.policy.distance(&current.policy);
            if !distance.is_finite() {
                return Err(ConsumptionError::numerical("policy distance"));
            }
            debug!("iteration {iteration}: sup-norm distance {distance:e}");

            if distance < options.tolerance {
                info!("converged after {iteration} iterations (distance {distance:e})");
                return Ok(InfiniteHorizonSolution {
                    solution: next,
                    convergence: ConvergenceSummary {
                        iterations: iteration,
                        distance,
                    },
                    conditions: self.conditions.clone(),
                    params: self.params.clone(),
                    shocks: self.shocks.clone(),
                });
            }

            if distance < best {
                best = distance;
                since_best = 0;
            } else {
                since_best += 1;
                if let Some(limit) = options.stall_limit {
                    if since_best >= limit {
                        return Err(ConsumptionError::Stalled {
                            iterations: iteration,
                            distance,
                            best,
                        });
                    }
                }
            }
            current = next;
        }

        Err(ConsumptionError::DidNotConverge {
            iterations: options.max_iterations,
            distance,
        })
    }

    /// One backward step: the solution of the period preceding `next`.
    pub fn solve_period(&self, next: &PeriodSolution) -> Result<PeriodSolution> {
        let params = &self.params;
        let rho = params.crra();
        let rfree = params.rfree();
        let gamma = params.perm_gro_fac();
        let return_patience = params.absolute_patience_factor() / rfree;

        let boro_cnst_nat =
            (next.m_min - self.shocks.tran_min()) * self.shocks.perm_min() * gamma / rfree;
        let artificial = params.boro_cnst_art().filter(|limit| *limit > boro_cnst_nat);
        let m_min = artificial.unwrap_or(boro_cnst_nat);

        let human_wealth = gamma / rfree * (1.0 + next.human_wealth);
        let mpc_min = 1.0 / (1.0 + return_patience / next.mpc_min);
        // A binding artificial limit puts the kink of c(m) above m_min, so
        // consumption there moves one for one with resources.
        let mpc_max = if artificial.is_some() {
            1.0
        } else {
            let worst = self.shocks.worst_income_prb().powf(1.0 / rho);
            1.0 / (1.0 + worst * return_patience / next.mpc_max)
        };

        // Under a binding artificial constraint the grid starts at the limit
        // itself, whose endogenous point is the kink of the consumption rule.
        let assets: Vec<f64> = match artificial {
            Some(limit) => std::iter::once(limit)
                .chain(self.a_xtra.iter().map(|a| limit + a))
                .collect(),
            None => self.a_xtra.iter().map(|a| boro_cnst_nat + a).collect(),
        };

        let marginals = assets
            .par_iter()
            .map(|a| self.end_of_period_marginals(*a, next))
            .collect::<Result<Vec<_>>>()?;

        let capacity = assets.len() + 1;
        let mut m_nodes = Vec::with_capacity(capacity);
        let mut c_nodes = Vec::with_capacity(capacity);
        let mut mpc_nodes = Vec::with_capacity(capacity);
        if artificial.is_none() {
            m_nodes.push(boro_cnst_nat);
            c_nodes.push(0.0);
            mpc_nodes.push(mpc_max);
        }
        for (a, (v_prime, v_double_prime)) in assets.iter().zip(marginals) {
            let c = v_prime.powf(-1.0 / rho);
            let u_double_prime = -rho * c.powf(-rho - 1.0);
            let dc_da = v_double_prime / u_double_prime;
            m_nodes.push(a + c);
            c_nodes.push(c);
            mpc_nodes.push(dc_da / (dc_da + 1.0));
        }
        if c_nodes.iter().chain(mpc_nodes.iter()).any(|v| !v.is_finite()) {
            return Err(ConsumptionError::numerical("Euler equation inversion"));
        }

        let intercept = mpc_min * human_wealth;
        let extrapolation = if intercept.is_finite() && mpc_min > 0.0 {
            Extrapolation::Asymptote {
                intercept,
                slope: mpc_min,
            }
        } else {
            Extrapolation::Linear
        };

        let unconstrained = match self.options.solver.interpolation {
            InterpolationOrder::Linear => Interpolant::linear(m_nodes, c_nodes, extrapolation)?,
            InterpolationOrder::Cubic => {
                Interpolant::cubic(m_nodes, c_nodes, mpc_nodes, extrapolation)?
            }
        };

        Ok(PeriodSolution {
            policy: PolicyFunction::new(unconstrained, artificial, m_min),
            m_min,
            human_wealth,
            mpc_min,
            mpc_max,
        })
    }

    /// Expected discounted marginal value of assets `a` and its derivative.
    fn end_of_period_marginals(&self, a: f64, next: &PeriodSolution) -> Result<(f64, f64)> {
        let params = &self.params;
        let rho = params.crra();
        let rfree = params.rfree();
        let gamma = params.perm_gro_fac();

        let mut v_prime = 0.0;
        let mut v_double_prime = 0.0;
        for (probability, psi, theta) in self.shocks.iter() {
            let m_next = rfree / (gamma * psi) * a + theta;
            let c_next = next.policy.evaluate(m_next);
            if c_next <= 0.0 || !c_next.is_finite() {
                return Err(ConsumptionError::numerical("next-period consumption"));
            }
            let mpc_next = next.policy.derivative(m_next);
            let marginal_utility = c_next.powf(-rho);
            let weight = probability * psi.powf(-rho);
            v_prime += weight * marginal_utility;
            v_double_prime += weight / psi * (-rho) * marginal_utility / c_next * mpc_next;
        }

        let scale = params.disc_fac() * params.liv_prb() * rfree * gamma.powf(-rho);
        Ok((scale * v_prime, scale * rfree / gamma * v_double_prime))
    }
}
