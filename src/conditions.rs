//! Closed-form patience and impatience conditions.
//!
//! Each condition compares a factor built from the parameters against one.
//! Which of them must hold for the limiting consumption function to exist
//! depends on whether the problem is stochastic and whether an artificial
//! borrowing constraint is imposed; see [`ConditionReport::certify`].

use std::fmt;

use serde::Serialize;

use crate::error::{ConsumptionError, Result};
use crate::params::ParameterSet;
use crate::shocks::ShockGrid;

/// A factor and whether it lies strictly below one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Condition {
    pub factor: f64,
    pub holds: bool,
}

impl Condition {
    fn below_one(factor: f64) -> Self {
        Self {
            factor,
            holds: factor < 1.0,
        }
    }
}

/// Results of evaluating every condition for one parameter set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConditionReport {
    /// Absolute Impatience Condition: Φ = (Rβℒ)^{1/ρ} < 1.
    pub aic: Condition,
    /// Return Impatience Condition: Φ/R < 1.
    pub ric: Condition,
    /// Finite Human Wealth Condition: Γ/R < 1.
    pub fhwc: Condition,
    /// Growth Impatience Condition in levels: Φ/Γ < 1.
    pub gic_raw: Condition,
    /// Growth Impatience Condition for the individual ratio: Φ E[ψ⁻¹] / Γ < 1.
    pub gic_nrm: Condition,
    /// Finite Value of Autarky Condition: βℒ Γ^{1-ρ} E[ψ^{1-ρ}] < 1.
    pub fvac: Condition,
    /// Weak Return Impatience Condition: ℘^{1/ρ} Φ/R < 1.
    pub wric: Condition,
    /// Whether the household faces no income risk.
    pub perfect_foresight: bool,
    /// Whether an artificial borrowing constraint is imposed.
    pub constrained: bool,
}

impl ConditionReport {
    /// Evaluates all conditions. Pure: neither input is modified.
    pub fn evaluate(params: &ParameterSet, shocks: &ShockGrid) -> Self {
        let rho = params.crra();
        let rfree = params.rfree();
        let gamma = params.perm_gro_fac();
        let apf = params.absolute_patience_factor();

        let fvaf = params.disc_fac()
            * params.liv_prb()
            * gamma.powf(1.0 - rho)
            * shocks.ex_perm_pow(1.0 - rho);

        Self {
            aic: Condition::below_one(apf),
            ric: Condition::below_one(apf / rfree),
            fhwc: Condition::below_one(gamma / rfree),
            gic_raw: Condition::below_one(apf / gamma),
            gic_nrm: Condition::below_one(apf * shocks.ex_inv_perm() / gamma),
            fvac: Condition::below_one(fvaf),
            wric: Condition::below_one(params.unemp_prb().powf(1.0 / rho) * apf / rfree),
            perfect_foresight: params.is_perfect_foresight(),
            constrained: params.boro_cnst_art().is_some(),
        }
    }

    /// Confirms that backward induction converges to a nondegenerate limit
    /// with `0 < c(m) < ∞`.
    ///
    /// Risky problems need FVAC and WRIC. Perfect-foresight problems need
    /// FHWC and RIC when unconstrained, and GICRaw or RIC under an artificial
    /// constraint.
    pub fn certify(&self) -> Result<()> {
        let failing = if !self.perfect_foresight {
            if !self.fvac.holds {
                Some("FVAC")
            } else if !self.wric.holds {
                Some("WRIC")
            } else {
                None
            }
        } else if self.constrained {
            if self.gic_raw.holds || self.ric.holds {
                None
            } else {
                Some("GICRaw and RIC")
            }
        } else if !self.fhwc.holds {
            Some("FHWC")
        } else if !self.ric.holds {
            Some("RIC")
        } else {
            None
        };

        match failing {
            Some(condition) => Err(ConsumptionError::DegenerateLimit { condition }),
            None => Ok(()),
        }
    }

    pub fn certifies_limit(&self) -> bool {
        self.certify().is_ok()
    }

    fn rows(&self) -> [(&'static str, &'static str, Condition); 7] {
        [
            ("AIC", "Φ", self.aic),
            ("RIC", "Φ/R", self.ric),
            ("FHWC", "Γ/R", self.fhwc),
            ("GICRaw", "Φ/Γ", self.gic_raw),
            ("GICNrm", "Φ E[ψ⁻¹]/Γ", self.gic_nrm),
            ("FVAC", "βℒΓ^(1-ρ) E[ψ^(1-ρ)]", self.fvac),
            ("WRIC", "℘^(1/ρ) Φ/R", self.wric),
        ]
    }
}

impl fmt::Display for ConditionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, label, condition) in self.rows() {
            let verdict = if condition.holds { "holds" } else { "fails" };
            writeln!(
                f,
                "{name:<7} {label} = {:.6}: {verdict}",
                condition.factor
            )?;
        }
        Ok(())
    }
}
