//! Interpolated consumption functions.
//!
//! An [`Interpolant`] is an immutable table of nodes with optional node slopes
//! (cubic Hermite when present, piecewise linear otherwise). Above the top node
//! it either continues the last segment or decays exponentially towards a
//! linear asymptote, which for consumption functions is the perfect-foresight
//! limit `κ_min (m + h)`.

use serde::Serialize;

use crate::error::{ConsumptionError, Result};

/// Behaviour above the largest node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Extrapolation {
    /// Continue with the slope at the top node.
    Linear,
    /// Approach `intercept + slope * x` from the top node.
    Asymptote { intercept: f64, slope: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Tail {
    Linear { slope: f64 },
    Decay {
        intercept: f64,
        slope: f64,
        gap: f64,
        rate: f64,
    },
}

/// Immutable one-dimensional interpolation table.
#[derive(Clone, Debug, PartialEq)]
pub struct Interpolant {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Option<Vec<f64>>,
    tail: Tail,
}

impl Interpolant {
    /// Piecewise linear interpolant through `(x, y)`.
    pub fn linear(x: Vec<f64>, y: Vec<f64>, extrapolation: Extrapolation) -> Result<Self> {
        validate_nodes(&x, &y)?;
        let n = x.len();
        let top_slope = (y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]);
        let tail = build_tail(x[n - 1], y[n - 1], top_slope, extrapolation);
        Ok(Self {
            x,
            y,
            slopes: None,
            tail,
        })
    }

    /// Cubic Hermite interpolant through `(x, y)` with first derivatives `slopes`.
    pub fn cubic(
        x: Vec<f64>,
        y: Vec<f64>,
        slopes: Vec<f64>,
        extrapolation: Extrapolation,
    ) -> Result<Self> {
        validate_nodes(&x, &y)?;
        if slopes.len() != x.len() {
            return Err(ConsumptionError::invalid_grid(
                "cubic interpolant needs one slope per node",
            ));
        }
        if slopes.iter().any(|s| !s.is_finite()) {
            return Err(ConsumptionError::numerical("cubic interpolant slopes"));
        }
        let n = x.len();
        let tail = build_tail(x[n - 1], y[n - 1], slopes[n - 1], extrapolation);
        Ok(Self {
            x,
            y,
            slopes: Some(slopes),
            tail,
        })
    }

    /// Node abscissas.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Node ordinates.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn is_cubic(&self) -> bool {
        self.slopes.is_some()
    }

    /// Interpolated value at `xq`.
    pub fn value(&self, xq: f64) -> f64 {
        let n = self.x.len();
        if xq > self.x[n - 1] {
            let dx = xq - self.x[n - 1];
            return match self.tail {
                Tail::Linear { slope } => self.y[n - 1] + slope * dx,
                Tail::Decay {
                    intercept,
                    slope,
                    gap,
                    rate,
                } => intercept + slope * xq - gap * (-rate * dx).exp(),
            };
        }
        if xq < self.x[0] {
            return self.y[0] + self.node_slope_left() * (xq - self.x[0]);
        }

        let i = self.segment(xq);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        match &self.slopes {
            None => {
                let w = (xq - x0) / (x1 - x0);
                (1.0 - w) * y0 + w * y1
            }
            Some(d) => hermite_value(x0, x1, y0, y1, d[i], d[i + 1], xq),
        }
    }

    /// First derivative at `xq`.
    pub fn derivative(&self, xq: f64) -> f64 {
        let n = self.x.len();
        if xq > self.x[n - 1] {
            let dx = xq - self.x[n - 1];
            return match self.tail {
                Tail::Linear { slope } => slope,
                Tail::Decay {
                    slope, gap, rate, ..
                } => slope + gap * rate * (-rate * dx).exp(),
            };
        }
        if xq < self.x[0] {
            return self.node_slope_left();
        }

        let i = self.segment(xq);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        match &self.slopes {
            None => (y1 - y0) / (x1 - x0),
            Some(d) => hermite_derivative(x0, x1, y0, y1, d[i], d[i + 1], xq),
        }
    }

    fn node_slope_left(&self) -> f64 {
        match &self.slopes {
            Some(d) => d[0],
            None => (self.y[1] - self.y[0]) / (self.x[1] - self.x[0]),
        }
    }

    /// Index `i` of the segment `[x_i, x_{i+1}]` containing `xq` (which lies inside the nodes).
    fn segment(&self, xq: f64) -> usize {
        let idx = self.x.partition_point(|v| *v <= xq);
        idx.saturating_sub(1).min(self.x.len() - 2)
    }
}

fn build_tail(x_top: f64, y_top: f64, top_slope: f64, extrapolation: Extrapolation) -> Tail {
    match extrapolation {
        Extrapolation::Linear => Tail::Linear { slope: top_slope },
        Extrapolation::Asymptote { intercept, slope } => {
            let gap = intercept + slope * x_top - y_top;
            let rate = (top_slope - slope) / gap;
            if gap > 0.0 && rate.is_finite() && rate > 0.0 {
                Tail::Decay {
                    intercept,
                    slope,
                    gap,
                    rate,
                }
            } else {
                Tail::Linear { slope: top_slope }
            }
        }
    }
}

fn validate_nodes(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(ConsumptionError::invalid_grid(
            "x and y must have the same length",
        ));
    }
    if x.len() < 2 {
        return Err(ConsumptionError::invalid_grid(
            "interpolant needs at least two nodes",
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ConsumptionError::numerical("interpolation nodes"));
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ConsumptionError::invalid_grid(
            "interpolation nodes must be strictly increasing",
        ));
    }
    Ok(())
}

#[inline]
fn hermite_value(x0: f64, x1: f64, y0: f64, y1: f64, d0: f64, d1: f64, xq: f64) -> f64 {
    let h = x1 - x0;
    let t = (xq - x0) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * y0 + h10 * h * d0 + h01 * y1 + h11 * h * d1
}

#[inline]
fn hermite_derivative(x0: f64, x1: f64, y0: f64, y1: f64, d0: f64, d1: f64, xq: f64) -> f64 {
    let h = x1 - x0;
    let t = (xq - x0) / h;
    let t2 = t * t;
    let dh00 = 6.0 * t2 - 6.0 * t;
    let dh10 = 3.0 * t2 - 4.0 * t + 1.0;
    let dh01 = -6.0 * t2 + 6.0 * t;
    let dh11 = 3.0 * t2 - 2.0 * t;
    (dh00 * y0 + dh01 * y1) / h + dh10 * d0 + dh11 * d1
}

/// A consumption rule `c(m)` over normalized market resources.
///
/// Combines an unconstrained interpolant with an optional artificial
/// borrowing constraint line `c = m - b` and the lowest feasible resource
/// level `m_min`, below which consumption is zero.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyFunction {
    unconstrained: Interpolant,
    constraint: Option<f64>,
    m_min: f64,
}

impl PolicyFunction {
    pub fn new(unconstrained: Interpolant, constraint: Option<f64>, m_min: f64) -> Self {
        Self {
            unconstrained,
            constraint,
            m_min,
        }
    }

    /// The terminal-period rule: consume all resources.
    pub fn consume_everything() -> Self {
        let identity = Interpolant {
            x: vec![0.0, 1.0],
            y: vec![0.0, 1.0],
            slopes: None,
            tail: Tail::Linear { slope: 1.0 },
        };
        Self::new(identity, None, 0.0)
    }

    /// Lowest market resources at which consumption is feasible.
    pub fn m_min(&self) -> f64 {
        self.m_min
    }

    /// Artificial borrowing limit `b` of the constraint line `c = m - b`, if active.
    pub fn constraint(&self) -> Option<f64> {
        self.constraint
    }

    pub fn unconstrained(&self) -> &Interpolant {
        &self.unconstrained
    }

    /// Market-resource nodes of the fitted rule.
    pub fn nodes(&self) -> &[f64] {
        self.unconstrained.x()
    }

    /// Consumption at market resources `m`.
    pub fn evaluate(&self, m: f64) -> f64 {
        if m <= self.m_min {
            return 0.0;
        }
        let mut c = self.unconstrained.value(m);
        if let Some(limit) = self.constraint {
            c = c.min(m - limit);
        }
        c.clamp(0.0, m - self.m_min)
    }

    /// Marginal propensity to consume at `m`.
    pub fn derivative(&self, m: f64) -> f64 {
        if m <= self.m_min {
            return 0.0;
        }
        if let Some(limit) = self.constraint {
            if m - limit < self.unconstrained.value(m) {
                return 1.0;
            }
        }
        self.unconstrained.derivative(m)
    }

    /// Consumption at each point of `m`.
    pub fn evaluate_many(&self, m: &[f64]) -> Vec<f64> {
        m.iter().map(|x| self.evaluate(*x)).collect()
    }

    /// Sup-norm distance to `other` over this rule's nodes.
    pub fn distance(&self, other: &PolicyFunction) -> f64 {
        self.nodes()
            .iter()
            .map(|m| (self.evaluate(*m) - other.evaluate(*m)).abs())
            .fold(0.0, f64::max)
    }
}
