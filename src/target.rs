//! Target and pseudo-steady-state wealth ratios, the loci on which they
//! sit, and the expected growth factors of consumption and resources.

use log::debug;

use crate::error::{ConsumptionError, Result};
use crate::solver::InfiniteHorizonSolution;

const MAX_DOUBLINGS: usize = 64;
const MAX_BISECTIONS: usize = 200;

impl InfiniteHorizonSolution {
    /// Market resources `m̌` at which `E[m_{t+1}] = m_t`, i.e. the root of
    /// `(m - c(m)) R/Γ E[ψ⁻¹] + 1 - m`.
    ///
    /// Requires GICNrm; otherwise the ratio is infinite and
    /// [`ConsumptionError::NoFiniteRoot`] is returned.
    pub fn target_m(&self) -> Result<f64> {
        if !self.conditions.gic_nrm.holds {
            return Err(ConsumptionError::NoFiniteRoot {
                locator: "target",
                condition: "GICNrm",
            });
        }
        let r_bar = self.normalized_return_factor();
        let target = self.locate("target", |m| {
            (m - self.consumption(m)) * r_bar + 1.0 - m
        })?;
        debug!("target market resources {target}");
        Ok(target)
    }

    /// Market resources `m̂` at which expected resources in levels grow at
    /// `Γ`, i.e. the root of `(m - c(m)) R/Γ + 1 - m`.
    ///
    /// Requires GICRaw.
    pub fn pseudo_steady_state_m(&self) -> Result<f64> {
        if !self.conditions.gic_raw.holds {
            return Err(ConsumptionError::NoFiniteRoot {
                locator: "pseudo-steady-state",
                condition: "GICRaw",
            });
        }
        let r_over_gamma = self.params.rfree() / self.params.perm_gro_fac();
        let steady = self.locate("pseudo-steady-state", |m| {
            (m - self.consumption(m)) * r_over_gamma + 1.0 - m
        })?;
        debug!("pseudo-steady-state market resources {steady}");
        Ok(steady)
    }

    /// Consumption that makes `E[m_{t+1}] = m_t`; crosses `c(m)` at the target.
    pub fn c_where_ex_delta_m_zero(&self, m: f64) -> f64 {
        m - (m - 1.0) / self.normalized_return_factor()
    }

    /// Consumption that makes expected resources grow at `Γ` in levels;
    /// crosses `c(m)` at the pseudo-steady-state.
    pub fn c_where_ex_m_growth_equals_gamma(&self, m: f64) -> f64 {
        m - (m - 1.0) * self.params.perm_gro_fac() / self.params.rfree()
    }

    /// `E[m_{t+1} p_{t+1} / p_t]` given end-of-period assets `a`.
    pub fn expected_m_level_next(&self, a: f64) -> f64 {
        let rfree = self.params.rfree();
        let gamma = self.params.perm_gro_fac();
        self.shocks.expect(|psi, theta| rfree * a + gamma * psi * theta)
    }

    /// `E[c_{t+1} p_{t+1} / p_t]` given end-of-period assets `a`.
    pub fn expected_c_level_next(&self, a: f64) -> f64 {
        let rfree = self.params.rfree();
        let gamma = self.params.perm_gro_fac();
        self.shocks.expect(|psi, theta| {
            let growth = gamma * psi;
            growth * self.consumption(rfree * a / growth + theta)
        })
    }

    /// Expected growth factor of consumption in levels starting from `m`.
    pub fn expected_consumption_growth(&self, m: f64) -> f64 {
        let c = self.consumption(m);
        self.expected_c_level_next(m - c) / c
    }

    /// Expected growth factor of market resources in levels starting from `m`.
    pub fn expected_resource_growth(&self, m: f64) -> f64 {
        let c = self.consumption(m);
        self.expected_m_level_next(m - c) / m
    }

    fn normalized_return_factor(&self) -> f64 {
        self.params.rfree() / self.params.perm_gro_fac() * self.shocks.ex_inv_perm()
    }

    /// Bisection on a bracket that starts at the lowest feasible resources
    /// and widens its upper end until the sign flips.
    ///
    /// When `f` is already non-positive at `m_min` resources drift down to
    /// the borrowing limit, which is then the root.
    fn locate<F: Fn(f64) -> f64>(&self, locator: &'static str, f: F) -> Result<f64> {
        let lo = self.solution.m_min();
        let f_lo = f(lo);
        if f_lo.is_nan() {
            return Err(ConsumptionError::numerical("root bracketing"));
        }
        if f_lo <= 0.0 {
            return Ok(lo);
        }
        bisect(locator, f, lo)
    }
}

/// Widens `[lo, lo + 1]` by doubling until `f` changes sign, then bisects.
fn bisect<F: Fn(f64) -> f64>(locator: &'static str, f: F, mut lo: f64) -> Result<f64> {
    let mut width = 1.0;
    let mut hi = lo + width;
    let mut doublings = 0;
    while f(hi) >= 0.0 {
        doublings += 1;
        if doublings > MAX_DOUBLINGS || !hi.is_finite() {
            return Err(ConsumptionError::RootNotBracketed { locator });
        }
        lo = hi;
        width *= 2.0;
        hi = lo + width;
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            break;
        }
        if f(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let root = 0.5 * (lo + hi);
    if root.is_finite() {
        Ok(root)
    } else {
        Err(ConsumptionError::numerical("root bracketing"))
    }
}
