//! Sweep configuration: potential selection, list-or-scalar parameters,
//! initial conditions, and shared simulation/output settings.
//!
//! Configurations are JSON documents. Every field has a default, so a file
//! only needs to list what it changes.

use crate::integrate::{EventDirection, IntegrationOptions};
use crate::potential::PotentialKind;
use anyhow::Context;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown potential type '{0}' (expected one of: quadratic, starobinsky, hilltop, natural)")]
    UnknownPotential(String),
    #[error("unknown parameter '{name}' for the {potential} potential (expected: {expected})")]
    UnknownParameter {
        potential: &'static str,
        name: String,
        expected: String,
    },
    #[error("parameter '{0}' is given more than once")]
    DuplicateParameter(String),
    #[error("sweep list for '{0}' is empty")]
    EmptySweep(String),
    #[error("value for '{name}' must be finite, got {value}")]
    NonFinite { name: String, value: f64 },
    #[error("invalid simulation settings: {0}")]
    InvalidSettings(String),
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A configuration value that is either fixed or swept over a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Sweep(Vec<f64>),
}

impl ParamValue {
    /// The values this entry contributes to the sweep, in declared order.
    pub fn values(&self) -> &[f64] {
        match self {
            ParamValue::Scalar(value) => std::slice::from_ref(value),
            ParamValue::Sweep(values) => values,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.values().is_empty() {
            return Err(ConfigError::EmptySweep(name.to_string()));
        }
        if let Some(value) = self.values().iter().find(|v| !v.is_finite()) {
            return Err(ConfigError::NonFinite {
                name: name.to_string(),
                value: *value,
            });
        }
        Ok(())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(values: Vec<f64>) -> Self {
        ParamValue::Sweep(values)
    }
}

/// Named potential parameters in the order the document declares them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTable(pub Vec<(String, ParamValue)>);

impl ParamTable {
    pub fn new<K: Into<String>, V: Into<ParamValue>>(entries: Vec<(K, V)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[(String, ParamValue)] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    fn validate(&self, kind: PotentialKind) -> Result<(), ConfigError> {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if !kind.accepts(name) {
                return Err(ConfigError::UnknownParameter {
                    potential: kind.name(),
                    name: name.clone(),
                    expected: kind.parameter_names().join(", "),
                });
            }
            if self.0[..i].iter().any(|(earlier, _)| earlier == name) {
                return Err(ConfigError::DuplicateParameter(name.clone()));
            }
            value.validate(name)?;
        }
        Ok(())
    }
}

impl Serialize for ParamTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ParamTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from parameter names to numbers or lists of numbers")
            }

            // Entries are kept as they stream in, duplicates included, so
            // validation can name them.
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ParamTable, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, value)) = map.next_entry::<String, ParamValue>()? {
                    entries.push((name, value));
                }
                Ok(ParamTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Settings shared by every run of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    pub t_start: f64,
    pub t_end: f64,
    pub num_points: usize,
    pub rtol: f64,
    pub atol: f64,
    /// Stop each run at the end of inflation instead of integrating to `t_end`.
    pub terminate_on_event: bool,
    pub event_direction: EventDirection,
    /// Step attempts allowed per run.
    pub max_steps: usize,
    pub max_step: Option<f64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 500.0,
            num_points: 2000,
            rtol: 1e-8,
            atol: 1e-10,
            terminate_on_event: true,
            event_direction: EventDirection::Rising,
            max_steps: 100_000,
            max_step: None,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::InvalidSettings(msg.to_string()));
        if !self.t_start.is_finite() || !self.t_end.is_finite() {
            return invalid("t_start and t_end must be finite");
        }
        if self.t_end <= self.t_start {
            return invalid("t_end must be greater than t_start");
        }
        if self.num_points < 2 {
            return invalid("num_points must be at least 2");
        }
        if !(self.rtol >= 0.0 && self.rtol.is_finite()) {
            return invalid("rtol must be non-negative and finite");
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return invalid("atol must be positive and finite");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be at least 1");
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0) {
                return invalid("max_step must be positive");
            }
        }
        Ok(())
    }

    /// `num_points` evenly spaced samples covering `[t_start, t_end]`.
    pub fn time_grid(&self) -> Vec<f64> {
        let n = self.num_points;
        if n < 2 {
            return vec![self.t_start; n];
        }
        let span = self.t_end - self.t_start;
        let mut grid: Vec<f64> = (0..n)
            .map(|i| self.t_start + span * (i as f64 / (n - 1) as f64))
            .collect();
        grid[n - 1] = self.t_end;
        grid
    }

    pub fn integration_options(&self) -> IntegrationOptions {
        IntegrationOptions {
            rtol: self.rtol,
            atol: self.atol,
            max_steps: self.max_steps,
            first_step: None,
            max_step: self.max_step.unwrap_or(f64::INFINITY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub save_plot: bool,
    pub output_folder: PathBuf,
    /// Figure size in inches.
    pub plot_width: f64,
    pub plot_height: f64,
    pub dpi: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            save_plot: true,
            output_folder: PathBuf::from("results"),
            plot_width: 10.0,
            plot_height: 6.0,
            dpi: 300,
        }
    }
}

impl OutputSettings {
    /// Pixel dimensions of one figure.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| (inches * f64::from(self.dpi)).round().max(1.0) as u32;
        (px(self.plot_width), px(self.plot_height))
    }
}

/// A complete sweep description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub potential_type: String,
    pub quadratic_params: ParamTable,
    pub starobinsky_params: ParamTable,
    pub hilltop_params: ParamTable,
    pub natural_params: ParamTable,
    pub phi_init: ParamValue,
    pub phi_dot_init: ParamValue,
    pub simulation: SimulationSettings,
    pub output: OutputSettings,
    pub verbose: bool,
    /// Report slow-roll diagnostics at φ0 before each run.
    pub check_slow_roll: bool,
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::template(PotentialKind::Quadratic)
    }
}

impl SweepConfig {
    /// Starting configuration for the given potential.
    pub fn template(kind: PotentialKind) -> Self {
        let phi_init = match kind {
            PotentialKind::Starobinsky => 7.0,
            _ => 5.0,
        };
        Self {
            potential_type: kind.name().to_string(),
            quadratic_params: ParamTable::new(vec![("m", 0.1)]),
            starobinsky_params: ParamTable::new(vec![("V0", 1e-10)]),
            hilltop_params: ParamTable::new(vec![("V0", 1e-10), ("mu", 1.0), ("p", 4.0)]),
            natural_params: ParamTable::new(vec![("Lambda", 1e-3), ("f", 5.0)]),
            phi_init: ParamValue::Scalar(phi_init),
            phi_dot_init: ParamValue::Scalar(0.0),
            simulation: SimulationSettings::default(),
            output: OutputSettings::default(),
            verbose: true,
            check_slow_roll: true,
            parallel: false,
        }
    }

    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SweepConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn potential_kind(&self) -> Result<PotentialKind, ConfigError> {
        self.potential_type.parse()
    }

    pub fn parameter_table(&self, kind: PotentialKind) -> &ParamTable {
        match kind {
            PotentialKind::Quadratic => &self.quadratic_params,
            PotentialKind::Starobinsky => &self.starobinsky_params,
            PotentialKind::Hilltop => &self.hilltop_params,
            PotentialKind::Natural => &self.natural_params,
        }
    }

    /// Checks everything a sweep depends on. Only the selected potential's
    /// table is inspected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self.potential_kind()?;
        self.parameter_table(kind).validate(kind)?;
        self.phi_init.validate("phi_init")?;
        self.phi_dot_init.validate("phi_dot_init")?;
        self.simulation.validate()
    }
}

/// Formats a number the way it reads in a config file: plain decimals for
/// ordinary magnitudes (whole numbers keep one decimal, `5.0`), exponent
/// notation for very small or large ones.
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value != 0.0 && (magnitude < 1e-4 || magnitude >= 1e16) {
        format!("{value:e}")
    } else if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
