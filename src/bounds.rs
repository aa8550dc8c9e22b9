//! Analytical limits of the marginal propensity to consume and the
//! consumption bounds implied by them.

use serde::Serialize;

use crate::params::ParameterSet;

/// Closed-form bounds on the limiting consumption function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ConsumptionBounds {
    /// Limiting MPC as `m → ∞`: `1 - Φ/R`, or zero when the RIC fails.
    pub kappa_min: f64,
    /// Limiting MPC as `m → 0`: `1 - ℘^{1/ρ} Φ/R`.
    pub kappa_max: f64,
    /// Human wealth including current income, `1 / (1 - Γ/R)`; infinite when the FHWC fails.
    pub human_wealth: f64,
}

impl ConsumptionBounds {
    pub fn new(params: &ParameterSet) -> Self {
        let rfree = params.rfree();
        let return_patience = params.absolute_patience_factor() / rfree;
        let kappa_min = (1.0 - return_patience).max(0.0);
        let kappa_max = 1.0 - params.unemp_prb().powf(1.0 / params.crra()) * return_patience;
        let human_wealth = if params.perm_gro_fac() < rfree {
            1.0 / (1.0 - params.perm_gro_fac() / rfree)
        } else {
            f64::INFINITY
        };
        Self {
            kappa_min,
            kappa_max,
            human_wealth,
        }
    }

    /// Unconstrained perfect-foresight consumption `(m - 1 + h) κ_min`.
    pub fn perfect_foresight(&self, m: f64) -> f64 {
        (m - 1.0 + self.human_wealth) * self.kappa_min
    }

    /// Upper bound `min(κ_max m, (m - 1 + h) κ_min)`.
    pub fn upper(&self, m: f64) -> f64 {
        let steep = self.kappa_max * m;
        if self.human_wealth.is_finite() {
            steep.min(self.perfect_foresight(m))
        } else {
            steep
        }
    }

    /// Lower bound `κ_min m`.
    pub fn lower(&self, m: f64) -> f64 {
        self.kappa_min * m
    }

    /// Resources at which the two pieces of the upper bound meet.
    pub fn kink(&self) -> Option<f64> {
        let denominator = self.kappa_max - self.kappa_min;
        if !self.human_wealth.is_finite() || denominator <= 0.0 {
            return None;
        }
        Some((self.human_wealth - 1.0) * self.kappa_min / denominator)
    }
}
