//! Preference and income-process parameters of the buffer-stock household.

use serde::{Deserialize, Serialize};

use crate::error::{ConsumptionError, Result};

/// Immutable parameter record for one consumption-saving scenario.
///
/// Construct it with [`ParameterSetBuilder`] (or deserialize it, which runs
/// the same validation). Symbols follow the buffer-stock literature:
/// ρ is `crra`, β is `disc_fac`, R is `rfree`, Γ is `perm_gro_fac` and ℘ is
/// `unemp_prb`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterSetBuilder")]
pub struct ParameterSet {
    crra: f64,
    disc_fac: f64,
    rfree: f64,
    perm_gro_fac: f64,
    perm_shk_std: f64,
    tran_shk_std: f64,
    unemp_prb: f64,
    inc_unemp: f64,
    liv_prb: f64,
    boro_cnst_art: Option<f64>,
}

impl ParameterSet {
    /// Starts a builder pre-filled with the baseline calibration.
    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::new()
    }

    /// Baseline calibration: ρ=2, β=0.96, R=1.04, Γ=1.03, ℘=0.005, θᵘ=0,
    /// σψ=σθ=0.1, no artificial borrowing constraint.
    pub fn baseline() -> Self {
        Self {
            crra: 2.0,
            disc_fac: 0.96,
            rfree: 1.04,
            perm_gro_fac: 1.03,
            perm_shk_std: 0.1,
            tran_shk_std: 0.1,
            unemp_prb: 0.005,
            inc_unemp: 0.0,
            liv_prb: 1.0,
            boro_cnst_art: None,
        }
    }

    /// Coefficient of relative risk aversion ρ.
    pub fn crra(&self) -> f64 {
        self.crra
    }

    /// Time preference factor β.
    pub fn disc_fac(&self) -> f64 {
        self.disc_fac
    }

    /// Risk-free interest factor R.
    pub fn rfree(&self) -> f64 {
        self.rfree
    }

    /// Permanent income growth factor Γ.
    pub fn perm_gro_fac(&self) -> f64 {
        self.perm_gro_fac
    }

    /// Standard deviation of log permanent shocks σψ.
    pub fn perm_shk_std(&self) -> f64 {
        self.perm_shk_std
    }

    /// Standard deviation of log transitory shocks σθ.
    pub fn tran_shk_std(&self) -> f64 {
        self.tran_shk_std
    }

    /// Probability of unemployment ℘.
    pub fn unemp_prb(&self) -> f64 {
        self.unemp_prb
    }

    /// Income when unemployed θᵘ, as a ratio to permanent income.
    pub fn inc_unemp(&self) -> f64 {
        self.inc_unemp
    }

    /// Probability of surviving into the next period.
    pub fn liv_prb(&self) -> f64 {
        self.liv_prb
    }

    /// Artificial borrowing constraint on normalized end-of-period assets, if any.
    pub fn boro_cnst_art(&self) -> Option<f64> {
        self.boro_cnst_art
    }

    /// Absolute patience factor Φ = (Rβℒ)^{1/ρ}.
    pub fn absolute_patience_factor(&self) -> f64 {
        (self.rfree * self.disc_fac * self.liv_prb).powf(1.0 / self.crra)
    }

    /// Returns `true` when the household faces no income risk at all.
    pub fn is_perfect_foresight(&self) -> bool {
        self.perm_shk_std == 0.0 && self.tran_shk_std == 0.0 && self.unemp_prb == 0.0
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Builder that validates every field before constructing a [`ParameterSet`].
///
/// Also serves as the deserialization shape: missing fields fall back to the
/// baseline calibration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ParameterSetBuilder {
    crra: f64,
    disc_fac: f64,
    rfree: f64,
    perm_gro_fac: f64,
    perm_shk_std: f64,
    tran_shk_std: f64,
    unemp_prb: f64,
    inc_unemp: f64,
    liv_prb: f64,
    boro_cnst_art: Option<f64>,
}

impl Default for ParameterSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSetBuilder {
    /// Starts from the baseline calibration.
    pub fn new() -> Self {
        let base = ParameterSet::baseline();
        Self {
            crra: base.crra,
            disc_fac: base.disc_fac,
            rfree: base.rfree,
            perm_gro_fac: base.perm_gro_fac,
            perm_shk_std: base.perm_shk_std,
            tran_shk_std: base.tran_shk_std,
            unemp_prb: base.unemp_prb,
            inc_unemp: base.inc_unemp,
            liv_prb: base.liv_prb,
            boro_cnst_art: base.boro_cnst_art,
        }
    }

    pub fn crra(mut self, value: f64) -> Self {
        self.crra = value;
        self
    }

    pub fn disc_fac(mut self, value: f64) -> Self {
        self.disc_fac = value;
        self
    }

    pub fn rfree(mut self, value: f64) -> Self {
        self.rfree = value;
        self
    }

    pub fn perm_gro_fac(mut self, value: f64) -> Self {
        self.perm_gro_fac = value;
        self
    }

    pub fn perm_shk_std(mut self, value: f64) -> Self {
        self.perm_shk_std = value;
        self
    }

    pub fn tran_shk_std(mut self, value: f64) -> Self {
        self.tran_shk_std = value;
        self
    }

    pub fn unemp_prb(mut self, value: f64) -> Self {
        self.unemp_prb = value;
        self
    }

    pub fn inc_unemp(mut self, value: f64) -> Self {
        self.inc_unemp = value;
        self
    }

    pub fn liv_prb(mut self, value: f64) -> Self {
        self.liv_prb = value;
        self
    }

    /// Sets (or clears, with `None`) the artificial borrowing constraint.
    pub fn boro_cnst_art(mut self, limit: impl Into<Option<f64>>) -> Self {
        self.boro_cnst_art = limit.into();
        self
    }

    /// Removes all income risk, leaving a perfect-foresight household.
    pub fn perfect_foresight(self) -> Self {
        self.perm_shk_std(0.0).tran_shk_std(0.0).unemp_prb(0.0)
    }

    /// Finalizes construction after validating every field.
    pub fn build(self) -> Result<ParameterSet> {
        positive("crra", self.crra)?;
        positive("disc_fac", self.disc_fac)?;
        if self.disc_fac > 1.0 {
            return Err(ConsumptionError::invalid_parameter(
                "disc_fac",
                self.disc_fac,
                "must lie in (0, 1]",
            ));
        }
        positive("rfree", self.rfree)?;
        positive("perm_gro_fac", self.perm_gro_fac)?;
        non_negative("perm_shk_std", self.perm_shk_std)?;
        non_negative("tran_shk_std", self.tran_shk_std)?;
        non_negative("inc_unemp", self.inc_unemp)?;

        if !self.unemp_prb.is_finite() || !(0.0..1.0).contains(&self.unemp_prb) {
            return Err(ConsumptionError::invalid_parameter(
                "unemp_prb",
                self.unemp_prb,
                "must lie in [0, 1)",
            ));
        }
        if self.unemp_prb * self.inc_unemp >= 1.0 {
            return Err(ConsumptionError::invalid_parameter(
                "inc_unemp",
                self.inc_unemp,
                "expected unemployment income must stay below mean income",
            ));
        }

        positive("liv_prb", self.liv_prb)?;
        if self.liv_prb > 1.0 {
            return Err(ConsumptionError::invalid_parameter(
                "liv_prb",
                self.liv_prb,
                "must lie in (0, 1]",
            ));
        }

        if let Some(limit) = self.boro_cnst_art {
            if !limit.is_finite() {
                return Err(ConsumptionError::invalid_parameter(
                    "boro_cnst_art",
                    limit,
                    "must be finite when present",
                ));
            }
        }

        Ok(ParameterSet {
            crra: self.crra,
            disc_fac: self.disc_fac,
            rfree: self.rfree,
            perm_gro_fac: self.perm_gro_fac,
            perm_shk_std: self.perm_shk_std,
            tran_shk_std: self.tran_shk_std,
            unemp_prb: self.unemp_prb,
            inc_unemp: self.inc_unemp,
            liv_prb: self.liv_prb,
            boro_cnst_art: self.boro_cnst_art,
        })
    }
}

impl TryFrom<ParameterSetBuilder> for ParameterSet {
    type Error = ConsumptionError;

    fn try_from(builder: ParameterSetBuilder) -> Result<Self> {
        builder.build()
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConsumptionError::invalid_parameter(
            name,
            value,
            "must be finite and strictly positive",
        ));
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConsumptionError::invalid_parameter(
            name,
            value,
            "must be finite and non-negative",
        ));
    }
    Ok(())
}
