//! Exogenous end-of-period asset grid.

use nalgebra::DVector;

use crate::error::{ConsumptionError, Result};
use crate::options::GridOptions;

/// Builds the grid of assets above the borrowing limit.
///
/// Points are spaced evenly after `nest_count` nested `ln(1 + x)` transforms,
/// which concentrates them near the constraint, then merged with the extra
/// points, sorted, and deduplicated.
pub fn asset_grid(options: &GridOptions) -> Result<DVector<f64>> {
    let GridOptions {
        a_xtra_min,
        a_xtra_max,
        a_xtra_count,
        nest_count,
        ref extra_points,
    } = *options;

    if a_xtra_count < 2 {
        return Err(ConsumptionError::invalid_grid(
            "asset grid needs at least two points",
        ));
    }
    if !a_xtra_min.is_finite() || !a_xtra_max.is_finite() || a_xtra_min <= 0.0 {
        return Err(ConsumptionError::invalid_grid(
            "asset grid bounds must be finite with a positive minimum",
        ));
    }
    if a_xtra_min >= a_xtra_max {
        return Err(ConsumptionError::invalid_grid(
            "asset grid minimum must lie below its maximum",
        ));
    }
    if extra_points.iter().any(|x| !x.is_finite() || *x <= 0.0) {
        return Err(ConsumptionError::invalid_grid(
            "extra asset points must be finite and positive",
        ));
    }

    let mut lo = a_xtra_min;
    let mut hi = a_xtra_max;
    for _ in 0..nest_count {
        lo = lo.ln_1p();
        hi = hi.ln_1p();
    }
    let step = (hi - lo) / (a_xtra_count - 1) as f64;

    let mut points: Vec<f64> = (0..a_xtra_count)
        .map(|i| {
            let mut x = lo + step * i as f64;
            for _ in 0..nest_count {
                x = x.exp_m1();
            }
            x
        })
        .collect();
    // Pin the endpoints against rounding in the nested transforms.
    points[0] = a_xtra_min;
    points[a_xtra_count - 1] = a_xtra_max;

    points.extend(extra_points.iter().copied());
    points.sort_by(f64::total_cmp);
    points.dedup_by(|a, b| (*a - *b).abs() <= f64::EPSILON * b.abs().max(1.0));

    Ok(DVector::from_vec(points))
}
