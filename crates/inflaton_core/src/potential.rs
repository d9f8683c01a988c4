//! Inflaton potentials V(φ) and their slopes.
//!
//! Each variant owns its parameters and is immutable once built. The formulas
//! are written once against [`Scalar`] so the same code path serves plain
//! `f64` evaluation and dual-number differentiation.

use crate::config::ConfigError;
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Potential family tag, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PotentialKind {
    Quadratic,
    Starobinsky,
    Hilltop,
    Natural,
}

impl PotentialKind {
    pub const ALL: [PotentialKind; 4] = [
        PotentialKind::Quadratic,
        PotentialKind::Starobinsky,
        PotentialKind::Hilltop,
        PotentialKind::Natural,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PotentialKind::Quadratic => "quadratic",
            PotentialKind::Starobinsky => "starobinsky",
            PotentialKind::Hilltop => "hilltop",
            PotentialKind::Natural => "natural",
        }
    }

    /// Human-readable title used in plot captions.
    pub fn title(self) -> &'static str {
        match self {
            PotentialKind::Quadratic => "Quadratic",
            PotentialKind::Starobinsky => "Starobinsky",
            PotentialKind::Hilltop => "Hilltop",
            PotentialKind::Natural => "Natural",
        }
    }

    /// Accepted parameter names, in canonical order.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            PotentialKind::Quadratic => &["m"],
            PotentialKind::Starobinsky => &["V0"],
            PotentialKind::Hilltop => &["V0", "mu", "p"],
            PotentialKind::Natural => &["Lambda", "f"],
        }
    }

    /// Defaults applied to parameters the configuration leaves out.
    pub fn default_parameters(self) -> &'static [(&'static str, f64)] {
        match self {
            PotentialKind::Quadratic => &[("m", 0.01)],
            PotentialKind::Starobinsky => &[("V0", 1e-10)],
            PotentialKind::Hilltop => &[("V0", 1e-10), ("mu", 1.0), ("p", 4.0)],
            PotentialKind::Natural => &[("Lambda", 1e-10), ("f", 1.0)],
        }
    }

    pub fn accepts(self, name: &str) -> bool {
        self.parameter_names().contains(&name)
    }
}

impl FromStr for PotentialKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        PotentialKind::ALL
            .into_iter()
            .find(|kind| kind.name() == tag)
            .ok_or_else(|| ConfigError::UnknownPotential(s.to_string()))
    }
}

impl fmt::Display for PotentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete potential with its parameters resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Potential {
    /// V = ½ m² φ²
    Quadratic { m: f64 },
    /// V = V0 (1 − e^(−√(2/3) φ))²
    Starobinsky { v0: f64 },
    /// V = V0 (1 − (φ/μ)^p)
    Hilltop { v0: f64, mu: f64, p: f64 },
    /// V = Λ⁴ (1 + cos(φ/f))
    Natural { lambda: f64, f: f64 },
}

fn lit<T: Scalar>(x: f64) -> T {
    T::from_f64(x).unwrap_or_else(T::nan)
}

impl Potential {
    /// Builds a potential from a tag and named parameter values.
    ///
    /// Names are matched exactly; parameters that are not given fall back to
    /// [`PotentialKind::default_parameters`].
    pub fn from_params(kind: PotentialKind, params: &[(String, f64)]) -> Result<Self, ConfigError> {
        let mut resolved: Vec<(&'static str, f64)> = kind.default_parameters().to_vec();
        let mut seen: Vec<&str> = Vec::with_capacity(params.len());

        for (name, value) in params {
            if seen.contains(&name.as_str()) {
                return Err(ConfigError::DuplicateParameter(name.clone()));
            }
            seen.push(name);

            let slot = resolved
                .iter_mut()
                .find(|(key, _)| *key == name.as_str())
                .ok_or_else(|| ConfigError::UnknownParameter {
                    potential: kind.name(),
                    name: name.clone(),
                    expected: kind.parameter_names().join(", "),
                })?;
            if !value.is_finite() {
                return Err(ConfigError::NonFinite {
                    name: name.clone(),
                    value: *value,
                });
            }
            slot.1 = *value;
        }

        let get = |key: &str| {
            resolved
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| *v)
                .unwrap_or(f64::NAN)
        };

        Ok(match kind {
            PotentialKind::Quadratic => Potential::Quadratic { m: get("m") },
            PotentialKind::Starobinsky => Potential::Starobinsky { v0: get("V0") },
            PotentialKind::Hilltop => Potential::Hilltop {
                v0: get("V0"),
                mu: get("mu"),
                p: get("p"),
            },
            PotentialKind::Natural => Potential::Natural {
                lambda: get("Lambda"),
                f: get("f"),
            },
        })
    }

    /// Parses the tag first so an unknown potential is reported before
    /// anything else about the parameters.
    pub fn build(tag: &str, params: &[(String, f64)]) -> Result<Self, ConfigError> {
        let kind: PotentialKind = tag.parse()?;
        Self::from_params(kind, params)
    }

    pub fn kind(&self) -> PotentialKind {
        match self {
            Potential::Quadratic { .. } => PotentialKind::Quadratic,
            Potential::Starobinsky { .. } => PotentialKind::Starobinsky,
            Potential::Hilltop { .. } => PotentialKind::Hilltop,
            Potential::Natural { .. } => PotentialKind::Natural,
        }
    }

    /// Parameters in canonical order, named as in configuration files.
    pub fn parameters(&self) -> Vec<(&'static str, f64)> {
        match *self {
            Potential::Quadratic { m } => vec![("m", m)],
            Potential::Starobinsky { v0 } => vec![("V0", v0)],
            Potential::Hilltop { v0, mu, p } => vec![("V0", v0), ("mu", mu), ("p", p)],
            Potential::Natural { lambda, f } => vec![("Lambda", lambda), ("f", f)],
        }
    }

    /// V(φ)
    pub fn v(&self, phi: f64) -> f64 {
        self.value(phi)
    }

    /// dV/dφ
    pub fn dv_dphi(&self, phi: f64) -> f64 {
        self.slope(phi)
    }

    pub fn value<T: Scalar>(&self, phi: T) -> T {
        let one = T::one();
        match *self {
            Potential::Quadratic { m } => {
                let m = lit::<T>(m);
                lit::<T>(0.5) * m * m * phi * phi
            }
            Potential::Starobinsky { v0 } => {
                let decay = one - (-starobinsky_alpha::<T>() * phi).exp();
                lit::<T>(v0) * decay * decay
            }
            Potential::Hilltop { v0, mu, p } => {
                lit::<T>(v0) * (one - (phi / lit::<T>(mu)).powf(lit::<T>(p)))
            }
            Potential::Natural { lambda, f } => {
                lit::<T>(lambda.powi(4)) * (one + (phi / lit::<T>(f)).cos())
            }
        }
    }

    pub fn slope<T: Scalar>(&self, phi: T) -> T {
        let one = T::one();
        match *self {
            Potential::Quadratic { m } => lit::<T>(m * m) * phi,
            Potential::Starobinsky { v0 } => {
                let alpha = starobinsky_alpha::<T>();
                let exp_term = (-alpha * phi).exp();
                lit::<T>(2.0 * v0) * (one - exp_term) * (alpha * exp_term)
            }
            Potential::Hilltop { v0, mu, p } => {
                -lit::<T>(v0 * p) * phi.powf(lit::<T>(p - 1.0)) / lit::<T>(mu.powf(p))
            }
            Potential::Natural { lambda, f } => {
                -lit::<T>(lambda.powi(4) / f) * (phi / lit::<T>(f)).sin()
            }
        }
    }
}

fn starobinsky_alpha<T: Scalar>() -> T {
    lit::<T>((2.0f64 / 3.0).sqrt())
}

impl fmt::Display for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .parameters()
            .iter()
            .map(|(name, value)| format!("{name}={}", crate::config::format_number(*value)))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} ({params})", self.kind().title())
    }
}
