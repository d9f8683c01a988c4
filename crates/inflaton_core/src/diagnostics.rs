//! Pre-flight slow-roll checks evaluated at the initial field value.
//!
//! The potential slow-roll parameters are
//! ε_V = ½(V'/V)² and η_V = V''/V. Inflation can only start where both are
//! small. V'' comes from differentiating the analytic slope with dual
//! numbers, and the analytic slope itself is cross-checked against the
//! dual-number derivative of V.

use crate::autodiff::{value_and_derivative, Dual};
use crate::potential::Potential;
use serde::Serialize;
use std::fmt;

/// Relative disagreement between `dv_dphi` and the derivative of `v` that is
/// still treated as rounding.
pub const SLOPE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SlowRollWarning {
    NonPositivePotential { v: f64 },
    EpsilonTooLarge { epsilon: f64 },
    EtaTooLarge { eta: f64 },
    SlopeMismatch { analytic: f64, derived: f64 },
    NonFinite,
}

impl fmt::Display for SlowRollWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlowRollWarning::NonPositivePotential { v } => {
                write!(f, "V(φ0) = {v:e} is not positive; H is clamped to zero")
            }
            SlowRollWarning::EpsilonTooLarge { epsilon } => {
                write!(f, "ε_V = {epsilon:.4} ≥ 1, the field does not start in slow roll")
            }
            SlowRollWarning::EtaTooLarge { eta } => {
                write!(f, "|η_V| = {:.4} ≥ 1, slow roll will not be sustained", eta.abs())
            }
            SlowRollWarning::SlopeMismatch { analytic, derived } => write!(
                f,
                "dV/dφ = {analytic:e} disagrees with the derivative of V ({derived:e})"
            ),
            SlowRollWarning::NonFinite => f.write_str("potential is not finite at φ0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowRollReport {
    pub phi: f64,
    pub v: f64,
    pub slope: f64,
    pub curvature: f64,
    pub epsilon_v: f64,
    pub eta_v: f64,
    pub warnings: Vec<SlowRollWarning>,
}

impl SlowRollReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl fmt::Display for SlowRollReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "φ0 = {}: V = {:e}, V' = {:e}, ε_V = {:.4e}, η_V = {:.4e}",
            self.phi, self.v, self.slope, self.epsilon_v, self.eta_v
        )
    }
}

pub fn check_slow_roll(potential: &Potential, phi: f64) -> SlowRollReport {
    let v = potential.v(phi);
    let slope = potential.dv_dphi(phi);
    let (_, derived) = value_and_derivative(|x: Dual| potential.value(x), phi);
    let (_, curvature) = value_and_derivative(|x: Dual| potential.slope(x), phi);

    let epsilon_v = 0.5 * (slope / v).powi(2);
    let eta_v = curvature / v;

    let mut warnings = Vec::new();
    if !v.is_finite() || !slope.is_finite() {
        warnings.push(SlowRollWarning::NonFinite);
    } else if v <= 0.0 {
        warnings.push(SlowRollWarning::NonPositivePotential { v });
    } else {
        if epsilon_v >= 1.0 {
            warnings.push(SlowRollWarning::EpsilonTooLarge { epsilon: epsilon_v });
        }
        if eta_v.abs() >= 1.0 {
            warnings.push(SlowRollWarning::EtaTooLarge { eta: eta_v });
        }
    }
    if slope.is_finite() && derived.is_finite() {
        let scale = slope.abs().max(derived.abs());
        if scale > 0.0 && (slope - derived).abs() > SLOPE_TOLERANCE * scale {
            warnings.push(SlowRollWarning::SlopeMismatch {
                analytic: slope,
                derived,
            });
        }
    }

    SlowRollReport {
        phi,
        v,
        slope,
        curvature,
        epsilon_v,
        eta_v,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_parameters_match_closed_form() {
        // ε_V = η_V = 2/φ² for V = ½m²φ².
        let report = check_slow_roll(&Potential::Quadratic { m: 0.1 }, 5.0);
        assert!((report.epsilon_v - 0.08).abs() < 1e-12);
        assert!((report.eta_v - 0.08).abs() < 1e-12);
        assert!((report.curvature - 0.01).abs() < 1e-15);
        assert!(report.is_clean(), "{:?}", report.warnings);
    }

    #[test]
    fn flags_fast_roll_start() {
        let report = check_slow_roll(&Potential::Quadratic { m: 0.1 }, 1.0);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, SlowRollWarning::EpsilonTooLarge { .. })));
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, SlowRollWarning::EtaTooLarge { .. })));
    }

    #[test]
    fn flags_negative_potential() {
        let potential = Potential::Hilltop {
            v0: 1e-10,
            mu: 1.0,
            p: 4.0,
        };
        let report = check_slow_roll(&potential, 1.5);
        assert_eq!(
            report.warnings,
            vec![SlowRollWarning::NonPositivePotential { v: potential.v(1.5) }]
        );
        assert!(report.warnings[0].to_string().contains("not positive"));
    }

    #[test]
    fn starobinsky_plateau_is_slow_rolling() {
        let report = check_slow_roll(&Potential::Starobinsky { v0: 1e-10 }, 5.5);
        assert!(report.epsilon_v < 1e-3);
        assert!(report.eta_v.abs() < 1e-1);
        assert!(report.is_clean());
    }

    #[test]
    fn massless_field_has_zero_potential() {
        let report = check_slow_roll(&Potential::Quadratic { m: 0.0 }, 3.0);
        assert_eq!(
            report.warnings,
            vec![SlowRollWarning::NonPositivePotential { v: 0.0 }]
        );
    }
}
