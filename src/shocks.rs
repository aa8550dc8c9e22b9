//! Discretization of the permanent and transitory income shocks.
//!
//! Both shocks are mean-one lognormals. The transitory shock is mixed with an
//! unemployment state paying `inc_unemp`, and the employed draws are scaled so
//! that the overall transitory mean stays exactly one. The joint distribution
//! is the tensor product of the two marginals, stored as a [`ShockGrid`].

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal};
use serde::Serialize;

use crate::error::{ConsumptionError, Result};
use crate::options::{DiscretizationMethod, DiscretizationOptions};
use crate::params::ParameterSet;

const PROBABILITY_SLACK: f64 = 1e-10;

/// A univariate discrete distribution: probability-weighted nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscreteDistribution {
    probabilities: DVector<f64>,
    values: DVector<f64>,
}

impl DiscreteDistribution {
    /// Builds a distribution after checking lengths and probabilities.
    pub fn new(probabilities: DVector<f64>, values: DVector<f64>) -> Result<Self> {
        if values.is_empty() || probabilities.len() != values.len() {
            return Err(ConsumptionError::invalid_grid(
                "distribution needs matching, non-empty probabilities and values",
            ));
        }
        check_probabilities(&probabilities)?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConsumptionError::numerical("distribution values"));
        }
        Ok(Self {
            probabilities,
            values,
        })
    }

    /// The degenerate distribution placing all mass on one.
    pub fn unit() -> Self {
        Self {
            probabilities: DVector::from_element(1, 1.0),
            values: DVector::from_element(1, 1.0),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn probabilities(&self) -> &DVector<f64> {
        &self.probabilities
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Expected value of `f(x)`.
    pub fn expect<F: Fn(f64) -> f64>(&self, f: F) -> f64 {
        self.probabilities
            .iter()
            .zip(self.values.iter())
            .map(|(p, x)| p * f(*x))
            .sum()
    }

    pub fn mean(&self) -> f64 {
        self.expect(|x| x)
    }
}

/// Discretizes a lognormal with `E[x] = 1` and log standard deviation `std`.
///
/// A zero standard deviation yields the single node 1. Nodes are rescaled so
/// that the discrete mean is one up to rounding.
pub fn discretize_mean_one_lognormal(
    std: f64,
    count: usize,
    method: DiscretizationMethod,
) -> Result<DiscreteDistribution> {
    if !std.is_finite() || std < 0.0 {
        return Err(ConsumptionError::invalid_parameter(
            "shock std",
            std,
            "must be finite and non-negative",
        ));
    }
    if count == 0 {
        return Err(ConsumptionError::invalid_grid(
            "shock discretization needs at least one node",
        ));
    }
    if std == 0.0 {
        return Ok(DiscreteDistribution::unit());
    }

    let mu = -0.5 * std * std;
    let (probabilities, mut values) = match method {
        DiscretizationMethod::GaussHermite => {
            let (nodes, weights) = gauss_hermite(count)?;
            let values = nodes.map(|z| (mu + std * z).exp());
            (weights, values)
        }
        DiscretizationMethod::MonteCarlo { draws, seed } => {
            if draws == 0 {
                return Err(ConsumptionError::invalid_grid(
                    "Monte Carlo discretization needs at least one draw",
                ));
            }
            let lognormal = LogNormal::new(mu, std).map_err(|_| {
                ConsumptionError::invalid_parameter("shock std", std, "rejected by sampler")
            })?;
            let mut rng = SmallRng::seed_from_u64(seed);
            let values = DVector::from_fn(draws, |_, _| lognormal.sample(&mut rng));
            (DVector::from_element(draws, 1.0 / draws as f64), values)
        }
    };

    let mean = probabilities.dot(&values);
    if !mean.is_finite() || mean <= 0.0 {
        return Err(ConsumptionError::numerical("lognormal normalization"));
    }
    values /= mean;

    DiscreteDistribution::new(probabilities, values)
}

/// Transitory shock including the unemployment state.
pub fn transitory_with_unemployment(
    std: f64,
    count: usize,
    method: DiscretizationMethod,
    unemp_prb: f64,
    inc_unemp: f64,
) -> Result<DiscreteDistribution> {
    if !unemp_prb.is_finite() || !(0.0..1.0).contains(&unemp_prb) {
        return Err(ConsumptionError::invalid_parameter(
            "unemp_prb",
            unemp_prb,
            "must lie in [0, 1)",
        ));
    }
    let employed = discretize_mean_one_lognormal(std, count, method)?;
    if unemp_prb == 0.0 {
        return Ok(employed);
    }

    let scale = (1.0 - unemp_prb * inc_unemp) / (1.0 - unemp_prb);
    let n = employed.len() + 1;
    let mut probabilities = DVector::zeros(n);
    let mut values = DVector::zeros(n);
    probabilities[0] = unemp_prb;
    values[0] = inc_unemp;
    for (index, (p, v)) in employed
        .probabilities
        .iter()
        .zip(employed.values.iter())
        .enumerate()
    {
        probabilities[index + 1] = p * (1.0 - unemp_prb);
        values[index + 1] = v * scale;
    }

    DiscreteDistribution::new(probabilities, values)
}

/// Joint (probability, permanent shock ψ, transitory shock θ) nodes used for expectations.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShockGrid {
    probabilities: DVector<f64>,
    perm: DVector<f64>,
    tran: DVector<f64>,
}

impl ShockGrid {
    /// Builds a grid from raw triples, checking `Σp = 1`, `E[ψ] = 1` and `E[θ] = 1`.
    pub fn new(probabilities: DVector<f64>, perm: DVector<f64>, tran: DVector<f64>) -> Result<Self> {
        let n = probabilities.len();
        if n == 0 || perm.len() != n || tran.len() != n {
            return Err(ConsumptionError::invalid_grid(
                "shock grid needs matching, non-empty columns",
            ));
        }
        check_probabilities(&probabilities)?;
        if perm.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ConsumptionError::invalid_grid(
                "permanent shocks must be finite and strictly positive",
            ));
        }
        if tran.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConsumptionError::invalid_grid(
                "transitory shocks must be finite and non-negative",
            ));
        }

        let perm_mean = probabilities.dot(&perm);
        if (perm_mean - 1.0).abs() > PROBABILITY_SLACK {
            return Err(ConsumptionError::NonUnitMean {
                shock: "permanent",
                mean: perm_mean,
            });
        }
        let tran_mean = probabilities.dot(&tran);
        if (tran_mean - 1.0).abs() > PROBABILITY_SLACK {
            return Err(ConsumptionError::NonUnitMean {
                shock: "transitory",
                mean: tran_mean,
            });
        }

        Ok(Self {
            probabilities,
            perm,
            tran,
        })
    }

    /// Tensor product of independent permanent and transitory marginals.
    pub fn from_marginals(perm: &DiscreteDistribution, tran: &DiscreteDistribution) -> Result<Self> {
        let n = perm.len() * tran.len();
        let mut probabilities = Vec::with_capacity(n);
        let mut perm_values = Vec::with_capacity(n);
        let mut tran_values = Vec::with_capacity(n);
        for (p_perm, psi) in perm.probabilities.iter().zip(perm.values.iter()) {
            for (p_tran, theta) in tran.probabilities.iter().zip(tran.values.iter()) {
                probabilities.push(p_perm * p_tran);
                perm_values.push(*psi);
                tran_values.push(*theta);
            }
        }
        Self::new(
            DVector::from_vec(probabilities),
            DVector::from_vec(perm_values),
            DVector::from_vec(tran_values),
        )
    }

    /// Discretizes the income process described by `params`.
    pub fn from_parameters(params: &ParameterSet, options: &DiscretizationOptions) -> Result<Self> {
        let (perm_method, tran_method) = match options.method {
            DiscretizationMethod::GaussHermite => {
                (DiscretizationMethod::GaussHermite, DiscretizationMethod::GaussHermite)
            }
            DiscretizationMethod::MonteCarlo { draws, seed } => (
                DiscretizationMethod::MonteCarlo { draws, seed },
                DiscretizationMethod::MonteCarlo {
                    draws,
                    seed: seed.wrapping_add(1),
                },
            ),
        };
        let perm = discretize_mean_one_lognormal(
            params.perm_shk_std(),
            options.perm_shock_count,
            perm_method,
        )?;
        let tran = transitory_with_unemployment(
            params.tran_shk_std(),
            options.tran_shock_count,
            tran_method,
            params.unemp_prb(),
            params.inc_unemp(),
        )?;
        Self::from_marginals(&perm, &tran)
    }

    /// Number of joint nodes.
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn probabilities(&self) -> &DVector<f64> {
        &self.probabilities
    }

    pub fn perm_shocks(&self) -> &DVector<f64> {
        &self.perm
    }

    pub fn tran_shocks(&self) -> &DVector<f64> {
        &self.tran
    }

    /// Iterates over `(probability, ψ, θ)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.probabilities
            .iter()
            .zip(self.perm.iter())
            .zip(self.tran.iter())
            .map(|((p, psi), theta)| (*p, *psi, *theta))
    }

    /// Expected value of `f(ψ, θ)`.
    pub fn expect<F: Fn(f64, f64) -> f64>(&self, f: F) -> f64 {
        self.iter().map(|(p, psi, theta)| p * f(psi, theta)).sum()
    }

    pub fn perm_min(&self) -> f64 {
        self.perm.min()
    }

    pub fn tran_min(&self) -> f64 {
        self.tran.min()
    }

    /// Probability of the worst income realization `ψ·θ = min(ψ)·min(θ)`.
    pub fn worst_income_prb(&self) -> f64 {
        let worst = self.perm_min() * self.tran_min();
        self.iter()
            .filter(|(_, psi, theta)| psi * theta == worst)
            .map(|(p, _, _)| p)
            .sum()
    }

    /// `E[ψ^{-1}]`, the inverse-permanent-shock correction used by the normalized growth factors.
    pub fn ex_inv_perm(&self) -> f64 {
        self.ex_perm_pow(-1.0)
    }

    /// `E[ψ^power]`.
    pub fn ex_perm_pow(&self, power: f64) -> f64 {
        self.expect(|psi, _| psi.powf(power))
    }
}

/// Gauss–Hermite nodes and weights for the standard normal (Golub–Welsch).
fn gauss_hermite(count: usize) -> Result<(DVector<f64>, DVector<f64>)> {
    let mut jacobi = DMatrix::<f64>::zeros(count, count);
    for k in 1..count {
        let off_diagonal = (k as f64).sqrt();
        jacobi[(k - 1, k)] = off_diagonal;
        jacobi[(k, k - 1)] = off_diagonal;
    }

    let eigen = SymmetricEigen::new(jacobi);
    let mut pairs: Vec<(f64, f64)> = (0..count)
        .map(|i| (eigen.eigenvalues[i], eigen.eigenvectors[(0, i)].powi(2)))
        .collect();
    if pairs.iter().any(|(x, w)| !x.is_finite() || !w.is_finite()) {
        return Err(ConsumptionError::numerical("Gauss-Hermite eigen-decomposition"));
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    let nodes = DVector::from_iterator(count, pairs.iter().map(|(x, _)| *x));
    let weights = DVector::from_iterator(count, pairs.iter().map(|(_, w)| w / total));
    Ok((nodes, weights))
}

fn check_probabilities(probabilities: &DVector<f64>) -> Result<()> {
    for p in probabilities.iter() {
        if !p.is_finite() || *p <= 0.0 {
            return Err(ConsumptionError::InvalidWeights { slack: *p });
        }
    }
    let slack = (probabilities.sum() - 1.0).abs();
    if slack > PROBABILITY_SLACK {
        return Err(ConsumptionError::InvalidWeights { slack });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn gauss_hermite_integrates_normal_moments() {
        let (nodes, weights) = gauss_hermite(7).unwrap();
        assert_abs_diff_eq!(weights.sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(weights.dot(&nodes), 0.0, epsilon = 1e-12);
        let second: f64 = weights
            .iter()
            .zip(nodes.iter())
            .map(|(w, z)| w * z * z)
            .sum();
        assert_abs_diff_eq!(second, 1.0, epsilon = 1e-10);
        let fourth: f64 = weights
            .iter()
            .zip(nodes.iter())
            .map(|(w, z)| w * z.powi(4))
            .sum();
        assert_abs_diff_eq!(fourth, 3.0, epsilon = 1e-9);
        assert!(nodes.as_slice().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn lognormal_has_unit_mean_for_any_std() {
        for std in [0.0, 0.05, 0.1, 0.2, 0.5, 1.0] {
            let dist =
                discretize_mean_one_lognormal(std, 7, DiscretizationMethod::GaussHermite).unwrap();
            assert_abs_diff_eq!(dist.mean(), 1.0, epsilon = 1e-12);
        }
        let mc = discretize_mean_one_lognormal(
            0.2,
            500,
            DiscretizationMethod::MonteCarlo { draws: 500, seed: 9 },
        )
        .unwrap();
        assert_eq!(mc.len(), 500);
        assert_abs_diff_eq!(mc.mean(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn lognormal_gauss_hermite_matches_inverse_moment() {
        // E[ψ^{-1}] = exp(σ²) for a mean-one lognormal.
        let std: f64 = 0.1;
        let dist = discretize_mean_one_lognormal(std, 7, DiscretizationMethod::GaussHermite).unwrap();
        assert_abs_diff_eq!(dist.expect(|x| 1.0 / x), (std * std).exp(), epsilon = 1e-8);
    }

    #[test]
    fn negative_std_is_rejected() {
        let result = discretize_mean_one_lognormal(-0.1, 7, DiscretizationMethod::GaussHermite);
        assert!(matches!(
            result,
            Err(ConsumptionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn unemployment_preserves_unit_mean() {
        let dist =
            transitory_with_unemployment(0.1, 7, DiscretizationMethod::GaussHermite, 0.05, 0.3)
                .unwrap();
        assert_eq!(dist.len(), 8);
        assert_abs_diff_eq!(dist.mean(), 1.0, epsilon = 1e-12);
        assert_eq!(dist.values()[0], 0.3);
        assert_abs_diff_eq!(dist.probabilities()[0], 0.05, epsilon = 1e-15);

        let invalid =
            transitory_with_unemployment(0.1, 7, DiscretizationMethod::GaussHermite, 1.0, 0.0);
        assert!(invalid.is_err());
    }

    #[test]
    fn shock_grid_from_baseline() {
        let params = ParameterSet::baseline();
        let grid = ShockGrid::from_parameters(&params, &DiscretizationOptions::default()).unwrap();
        assert_eq!(grid.len(), 7 * 8);
        assert_abs_diff_eq!(grid.probabilities().sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.expect(|psi, _| psi), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.expect(|_, theta| theta), 1.0, epsilon = 1e-12);
        assert_eq!(grid.tran_min(), 0.0);
        assert_abs_diff_eq!(grid.worst_income_prb(), 0.005, epsilon = 1e-12);
        assert!(grid.ex_inv_perm() > 1.0);
    }

    #[test]
    fn shock_grid_rejects_biased_mean() {
        let probabilities = DVector::from_vec(vec![0.5, 0.5]);
        let perm = DVector::from_vec(vec![0.9, 1.2]);
        let tran = DVector::from_vec(vec![1.0, 1.0]);
        let result = ShockGrid::new(probabilities, perm, tran);
        assert!(matches!(
            result,
            Err(ConsumptionError::NonUnitMean {
                shock: "permanent",
                ..
            })
        ));
    }

    #[test]
    fn perfect_foresight_grid_is_single_node() {
        let params = ParameterSet::builder().perfect_foresight().build().unwrap();
        let grid = ShockGrid::from_parameters(&params, &DiscretizationOptions::default()).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.worst_income_prb(), 1.0);
    }
}
