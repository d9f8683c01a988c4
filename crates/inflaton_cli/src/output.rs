use crate::render::{self, FigureStyle};
use anyhow::{anyhow, Context, Result};
use inflaton_core::config::{format_number, OutputSettings};
use inflaton_core::sweep::{RunOutcome, RunSpec};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `<base>/<potential>/run_<index>_<k1><v1>_..._phi<φ0>`
pub fn run_directory(base: &Path, spec: &RunSpec) -> PathBuf {
    let mut name = format!("run_{}", spec.index);
    for (key, value) in &spec.params {
        name.push_str(&format!("_{key}{}", format_number(*value)));
    }
    name.push_str(&format!("_phi{}", format_number(spec.phi_init)));
    base.join(spec.kind.name()).join(name)
}

/// Writes the figures of one run. Returns the directory written, or `None`
/// when the trajectory is too short to plot.
pub fn write_run(outcome: &RunOutcome, settings: &OutputSettings, text: bool) -> Result<Option<PathBuf>> {
    let spec = &outcome.spec;
    if outcome.trajectory.len() < 2 {
        warn!(
            run = spec.index,
            total = spec.total,
            samples = outcome.trajectory.len(),
            "too few samples to plot"
        );
        return Ok(None);
    }

    let dir = run_directory(&settings.output_folder, spec);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let style = FigureStyle {
        size: settings.pixel_size(),
        dpi: settings.dpi,
        text,
    };
    render::render_run(&dir, outcome, style)
        .map_err(|err| anyhow!("Failed to render plots into {}: {err}", dir.display()))?;
    debug!(run = spec.index, total = spec.total, dir = %dir.display(), "plots written");
    Ok(Some(dir))
}
