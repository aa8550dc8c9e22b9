use approx::assert_relative_eq;
use bufferstock::shocks::{discretize_mean_one_lognormal, transitory_with_unemployment};
use bufferstock::{
    ConsumerProblem, ConsumptionError, DiscretizationMethod, DiscretizationOptions,
    InfiniteHorizonSolution, InterpolationOrder, ParameterSet, ProblemOptions, ShockGrid,
};

fn solve(params: ParameterSet, options: ProblemOptions) -> InfiniteHorizonSolution {
    ConsumerProblem::new(params, options)
        .unwrap()
        .solve()
        .unwrap()
}

fn resources(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    let step = (hi - lo) / (count - 1) as f64;
    (0..count).map(|i| lo + step * i as f64).collect()
}

fn sup_distance(a: &InfiniteHorizonSolution, b: &InfiniteHorizonSolution, m: &[f64]) -> f64 {
    m.iter()
        .map(|m| (a.consumption(*m) - b.consumption(*m)).abs())
        .fold(0.0, f64::max)
}

/// Baseline calibration: the limit exists, the rule is concave-looking and
/// sandwiched between the closed-form bounds, and the target lies a little above one.
#[test]
fn baseline_solution_respects_analytical_bounds() {
    let solution = solve(ParameterSet::baseline(), ProblemOptions::default());
    let conditions = solution.conditions();
    assert!(conditions.fvac.holds && conditions.wric.holds);
    assert!(solution.convergence().distance < 1e-6);

    let grid = resources(0.01, 30.0, 3000);
    let consumption = solution.policy().evaluate_many(&grid);
    assert!(consumption.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    assert!(grid.iter().zip(&consumption).all(|(m, c)| *c > 0.0 && c <= m));

    let bounds = solution.bounds();
    for m in resources(0.5, 20.0, 200) {
        let c = solution.consumption(m);
        assert!(c >= bounds.lower(m) - 1e-9, "c({m}) = {c} below lower bound");
        assert!(c <= bounds.upper(m) + 1e-9, "c({m}) = {c} above upper bound");
    }

    // The MPC approaches its upper limit near the borrowing constraint.
    assert_relative_eq!(solution.mpc(1e-3), bounds.kappa_max, epsilon = 1e-3);
    assert!(solution.mpc(8.0) > bounds.kappa_min);

    let target = solution.target_m().unwrap();
    assert!(target > 1.3 && target < 1.5, "target {target}");
}

/// Larger permanent risk keeps GICRaw but breaks GICNrm: the pseudo-steady-state
/// is finite while the individual target is not.
#[test]
fn failing_normalized_gic_has_no_finite_target() {
    let params = ParameterSet::builder().perm_shk_std(0.2).build().unwrap();
    let options = ProblemOptions::default().with_asset_grid(96.0, 192);
    let solution = solve(params, options);

    assert!(solution.conditions().gic_raw.holds);
    assert!(!solution.conditions().gic_nrm.holds);

    let steady = solution.pseudo_steady_state_m().unwrap();
    assert!(steady > 1.0 && steady.is_finite());

    let target = solution.target_m();
    assert!(matches!(
        target,
        Err(ConsumptionError::NoFiniteRoot {
            condition: "GICNrm",
            ..
        })
    ));
    assert!(target.unwrap_err().is_infinite_root());
}

/// A patient household facing a high return fails GICRaw as well as GICNrm:
/// neither the pseudo-steady-state nor the target is finite.
#[test]
fn failing_raw_gic_has_no_finite_pseudo_steady_state() {
    let params = ParameterSet::builder()
        .rfree(1.06)
        .perm_gro_fac(1.0)
        .build()
        .unwrap();
    let solution = solve(params, ProblemOptions::default());

    let conditions = solution.conditions();
    assert!(!conditions.gic_raw.holds);
    assert!(conditions.fvac.holds && conditions.wric.holds);

    let steady = solution.pseudo_steady_state_m();
    assert!(matches!(
        steady,
        Err(ConsumptionError::NoFiniteRoot {
            locator: "pseudo-steady-state",
            condition: "GICRaw",
        })
    ));
    assert!(steady.unwrap_err().is_infinite_root());
    assert!(solution.target_m().unwrap_err().is_infinite_root());
}

/// Perfect foresight with R < Γ and β = 1 fails FHWC and RIC; the
/// artificial constraint still delivers a bounded rule.
#[test]
fn constrained_perfect_foresight_with_infinite_human_wealth() {
    let params = ParameterSet::builder()
        .crra(2.0)
        .disc_fac(1.0)
        .rfree(0.98)
        .perm_gro_fac(0.99)
        .perfect_foresight()
        .boro_cnst_art(0.0)
        .build()
        .unwrap();
    let solution = solve(params, ProblemOptions::default());

    let conditions = solution.conditions();
    assert!(!conditions.fhwc.holds);
    assert!(!conditions.ric.holds);
    assert!(conditions.gic_raw.holds);

    for m in resources(0.05, 0.95, 19) {
        assert_relative_eq!(solution.consumption(m), m, epsilon = 1e-10);
    }
    for m in resources(0.05, 9.5, 190) {
        let c = solution.consumption(m);
        assert!(c > 0.0 && c <= m + 1e-12);
    }
    let rich = solution.consumption(9.5);
    assert!(rich > 1.0 && rich < 1.03, "c(9.5) = {rich}");

    // Without risk the household settles exactly at the kink m = 1.
    assert_relative_eq!(solution.pseudo_steady_state_m().unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(solution.target_m().unwrap(), 1.0, epsilon = 1e-6);
}

/// As the unemployment probability vanishes, the unconstrained rule
/// approaches the one with a zero borrowing limit.
#[test]
fn deaton_limit_as_unemployment_risk_vanishes() {
    let constrained = solve(
        ParameterSet::builder()
            .unemp_prb(0.0)
            .boro_cnst_art(0.0)
            .build()
            .unwrap(),
        ProblemOptions::default(),
    );
    let grid = resources(0.25, 10.0, 40);

    let distance_at = |unemp_prb: f64| {
        let params = ParameterSet::builder().unemp_prb(unemp_prb).build().unwrap();
        sup_distance(&solve(params, ProblemOptions::default()), &constrained, &grid)
    };

    let coarse = distance_at(1e-4);
    let fine = distance_at(1e-8);
    assert!(fine < 5e-3, "distance {fine}");
    assert!(fine < coarse);
}

/// Backward induction converges whenever FVAC and WRIC hold.
#[test]
fn converges_for_assorted_impatient_calibrations() {
    let calibrations = [
        ParameterSet::builder().crra(3.0).disc_fac(0.95).build(),
        ParameterSet::builder().rfree(1.02).perm_gro_fac(1.01).build(),
        ParameterSet::builder().unemp_prb(0.05).inc_unemp(0.3).build(),
        ParameterSet::builder().boro_cnst_art(0.0).build(),
    ];

    for params in calibrations {
        let params = params.unwrap();
        let solution = solve(params.clone(), ProblemOptions::default());
        assert!(solution.conditions().certifies_limit());

        let m_min = solution.solution().m_min();
        let grid = resources(0.05, 30.0, 600);
        let consumption = solution.policy().evaluate_many(&grid);
        assert!(
            consumption.windows(2).all(|w| w[1] >= w[0] - 1e-12),
            "non-monotone rule for {params:?}"
        );
        assert!(grid
            .iter()
            .zip(&consumption)
            .all(|(m, c)| *c > 0.0 && *c <= m - m_min + 1e-12));
    }
}

/// A long finite horizon reproduces the infinite-horizon rule.
#[test]
fn long_finite_horizon_approaches_the_limit() {
    let problem = ConsumerProblem::new(ParameterSet::baseline(), ProblemOptions::default()).unwrap();
    let limit = problem.solve().unwrap();
    let finite = problem.solve_finite_horizon(100).unwrap();
    let earliest = finite.first_period();

    for m in resources(0.5, 10.0, 20) {
        assert_relative_eq!(earliest.consumption(m), limit.consumption(m), epsilon = 1e-6);
    }
}

/// Linear interpolation converges to nearly the same rule as cubic.
#[test]
fn linear_and_cubic_interpolation_agree() {
    let cubic = solve(ParameterSet::baseline(), ProblemOptions::default());
    let linear = solve(
        ParameterSet::baseline(),
        ProblemOptions::default().with_interpolation(InterpolationOrder::Linear),
    );
    assert!(!linear.policy().unconstrained().is_cubic());
    assert!(sup_distance(&cubic, &linear, &resources(0.5, 10.0, 20)) < 1e-2);
}

/// Every discretization has unit mean, with or without unemployment.
#[test]
fn discretized_shocks_have_unit_mean() {
    let methods = [
        DiscretizationMethod::GaussHermite,
        DiscretizationMethod::MonteCarlo {
            draws: 500,
            seed: 7,
        },
    ];
    for method in methods {
        for std in [0.05, 0.1, 0.3] {
            for count in [1, 3, 7, 11] {
                let dist = discretize_mean_one_lognormal(std, count, method).unwrap();
                assert_relative_eq!(dist.mean(), 1.0, epsilon = 1e-12);
                assert_relative_eq!(dist.probabilities().sum(), 1.0, epsilon = 1e-12);
            }
        }
        let tran = transitory_with_unemployment(0.1, 7, method, 0.05, 0.3).unwrap();
        assert_relative_eq!(tran.mean(), 1.0, epsilon = 1e-12);
        assert_eq!(tran.values()[0], 0.3);
    }

    let params = ParameterSet::builder().unemp_prb(0.1).inc_unemp(0.2).build().unwrap();
    let options = DiscretizationOptions {
        perm_shock_count: 5,
        tran_shock_count: 9,
        method: DiscretizationMethod::GaussHermite,
    };
    let grid = ShockGrid::from_parameters(&params, &options).unwrap();
    assert_eq!(grid.len(), 5 * 10);
    assert_relative_eq!(grid.expect(|psi, _| psi), 1.0, epsilon = 1e-12);
    assert_relative_eq!(grid.expect(|_, theta| theta), 1.0, epsilon = 1e-12);
    assert_relative_eq!(grid.expect(|psi, theta| psi * theta), 1.0, epsilon = 1e-12);
}

/// Parameters and options round-trip through JSON, and deserialization validates.
#[test]
fn configuration_round_trips_through_json() {
    let options = ProblemOptions::default()
        .with_asset_grid(40.0, 80)
        .with_stall_limit(None)
        .with_discretization(DiscretizationOptions {
            perm_shock_count: 5,
            tran_shock_count: 5,
            method: DiscretizationMethod::MonteCarlo {
                draws: 100,
                seed: 3,
            },
        });
    let json = serde_json::to_string(&options).unwrap();
    let restored: ProblemOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, options);

    let params = ParameterSet::builder().crra(3.0).boro_cnst_art(0.0).build().unwrap();
    let json = serde_json::to_string(&params).unwrap();
    let restored: ParameterSet = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, params);

    let partial: ParameterSet = serde_json::from_str(r#"{ "disc_fac": 0.9 }"#).unwrap();
    assert_eq!(partial.disc_fac(), 0.9);
    assert_eq!(partial.crra(), ParameterSet::baseline().crra());

    assert!(serde_json::from_str::<ParameterSet>(r#"{ "crra": -1.0 }"#).is_err());
}

/// The discretized shock grid serializes alongside the configuration.
#[test]
fn shock_grid_serializes_to_json() {
    let grid =
        ShockGrid::from_parameters(&ParameterSet::baseline(), &DiscretizationOptions::default())
            .unwrap();
    let value = serde_json::to_value(&grid).unwrap();
    for key in ["probabilities", "perm", "tran"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
}
