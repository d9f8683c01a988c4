//! PNG figures for one run.

use inflaton_core::config::format_number;
use inflaton_core::sweep::RunOutcome;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

const FIELD_COLOR: RGBColor = RGBColor(31, 119, 180);
const VELOCITY_COLOR: RGBColor = RGBColor(255, 127, 14);
const EVENT_COLOR: RGBColor = RGBColor(214, 39, 40);

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Registers a sans-serif font for chart text, once per process.
///
/// `INFLATON_FONT` names a TTF file to use instead of the system search.
/// Returns false when no font could be loaded; figures are then drawn
/// without text.
pub fn load_fonts() -> bool {
    static LOADED: OnceLock<bool> = OnceLock::new();
    *LOADED.get_or_init(|| {
        let override_path = std::env::var_os("INFLATON_FONT").map(PathBuf::from);
        let candidates = override_path
            .into_iter()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from));
        for path in candidates {
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                debug!(font = %path.display(), "chart font loaded");
                return true;
            }
        }
        warn!("no usable TTF font found; plots will have no text (set INFLATON_FONT)");
        false
    })
}

#[derive(Debug, Clone, Copy)]
pub struct FigureStyle {
    pub size: (u32, u32),
    pub dpi: u32,
    pub text: bool,
}

impl FigureStyle {
    fn font(&self, points: f64) -> (&'static str, f64) {
        ("sans-serif", points * f64::from(self.dpi) / 72.0)
    }

    fn stroke(&self, points: f64) -> u32 {
        (points * f64::from(self.dpi) / 72.0).round().max(1.0) as u32
    }
}

struct Series<'a> {
    label: &'a str,
    points: Vec<(f64, f64)>,
    color: RGBColor,
}

struct Figure<'a> {
    title: String,
    y_desc: &'a str,
    series: Vec<Series<'a>>,
    event: Option<f64>,
}

/// Title shared by the three figures of a run.
pub fn base_title(outcome: &RunOutcome) -> String {
    let params: Vec<String> = outcome
        .spec
        .params
        .iter()
        .map(|(name, value)| format!("{name}={}", format_number(*value)))
        .collect();
    format!(
        "{} ({}), φ₀={}, φ̇₀={}",
        outcome.spec.kind.title(),
        params.join(", "),
        format_number(outcome.spec.phi_init),
        format_number(outcome.spec.phi_dot_init)
    )
}

/// Writes `combined_dynamics.png`, `field_phi.png` and `velocity_phi_dot.png`
/// into `dir`.
pub fn render_run(dir: &Path, outcome: &RunOutcome, style: FigureStyle) -> Result<(), Box<dyn Error>> {
    let trajectory = &outcome.trajectory;
    let (phi, phi_dot): (Vec<(f64, f64)>, Vec<(f64, f64)>) = trajectory
        .samples()
        .map(|(t, phi, phi_dot)| ((t, phi), (t, phi_dot)))
        .unzip();
    let event = trajectory.end_of_inflation().map(|e| e.t);
    let title = base_title(outcome);

    draw(
        &dir.join("combined_dynamics.png"),
        &Figure {
            title: format!("{title} - Combined Dynamics"),
            y_desc: "Values",
            series: vec![
                Series {
                    label: "Inflaton Field φ(t)",
                    points: phi.clone(),
                    color: FIELD_COLOR,
                },
                Series {
                    label: "Inflaton Field Derivative φ̇(t)",
                    points: phi_dot.clone(),
                    color: VELOCITY_COLOR,
                },
            ],
            event,
        },
        style,
    )?;
    draw(
        &dir.join("field_phi.png"),
        &Figure {
            title: format!("{title} - Field Evolution"),
            y_desc: "Field Value φ",
            series: vec![Series {
                label: "Inflaton Field φ(t)",
                points: phi,
                color: FIELD_COLOR,
            }],
            event,
        },
        style,
    )?;
    draw(
        &dir.join("velocity_phi_dot.png"),
        &Figure {
            title: format!("{title} - Velocity Evolution"),
            y_desc: "Velocity φ̇",
            series: vec![Series {
                label: "Velocity φ̇(t)",
                points: phi_dot,
                color: VELOCITY_COLOR,
            }],
            event,
        },
        style,
    )
}

fn draw(path: &Path, figure: &Figure<'_>, style: FigureStyle) -> Result<(), Box<dyn Error>> {
    let (x_range, y_range) = bounds(&figure.series);
    // A terminal event lies at or just past the last sample.
    let event = figure.event.filter(|t| t.is_finite());
    let x_range = match event {
        Some(t) => x_range.start.min(t)..x_range.end.max(t),
        None => x_range,
    };

    let root = BitMapBackend::new(path, style.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(style.stroke(10.0));
    if style.text {
        builder
            .caption(&figure.title, style.font(14.0))
            .x_label_area_size(style.stroke(40.0))
            .y_label_area_size(style.stroke(60.0));
    }
    let mut chart = builder.build_cartesian_2d(x_range, y_range.clone())?;

    if style.text {
        chart
            .configure_mesh()
            .light_line_style(BLACK.mix(0.05))
            .bold_line_style(BLACK.mix(0.15))
            .x_desc("Time (Planck units)")
            .y_desc(figure.y_desc)
            .label_style(style.font(10.0))
            .axis_desc_style(style.font(12.0))
            .draw()?;
    }

    let width = style.stroke(2.0);
    for series in &figure.series {
        let color = series.color;
        let drawn = chart.draw_series(LineSeries::new(
            series.points.iter().copied(),
            color.stroke_width(width),
        ))?;
        if style.text {
            drawn
                .label(series.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    if let Some(t) = event {
        let drawn = chart.draw_series(std::iter::once(PathElement::new(
            vec![(t, y_range.start), (t, y_range.end)],
            EVENT_COLOR.mix(0.8).stroke_width(style.stroke(1.0)),
        )))?;
        if style.text {
            drawn
                .label(format!("End of inflation (t={t:.2})"))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], EVENT_COLOR));
        }
    }

    if style.text {
        chart
            .configure_series_labels()
            .label_font(style.font(11.0))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Axis ranges covering every series, padded so flat lines stay visible.
fn bounds(series: &[Series<'_>]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(t, v) in series.iter().flat_map(|s| s.points.iter()) {
        if t.is_finite() {
            x = (x.0.min(t), x.1.max(t));
        }
        if v.is_finite() {
            y = (y.0.min(v), y.1.max(v));
        }
    }
    (pad(x, 0.0), pad(y, 0.05))
}

fn pad((lo, hi): (f64, f64), fraction: f64) -> std::ops::Range<f64> {
    if !(lo.is_finite() && hi.is_finite()) {
        return 0.0..1.0;
    }
    let span = hi - lo;
    if span <= 0.0 {
        let half = if lo == 0.0 { 1.0 } else { 0.1 * lo.abs() };
        return (lo - half)..(hi + half);
    }
    (lo - fraction * span)..(hi + fraction * span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: Vec<(f64, f64)>) -> Series<'static> {
        Series {
            label: "test",
            points,
            color: FIELD_COLOR,
        }
    }

    #[test]
    fn bounds_cover_all_series() {
        let (x, y) = bounds(&[
            series(vec![(0.0, 5.0), (10.0, 1.0)]),
            series(vec![(0.0, 0.0), (10.0, -0.1)]),
        ]);
        assert_eq!(x, 0.0..10.0);
        assert!(y.start < -0.1 && y.end > 5.0);
    }

    #[test]
    fn flat_series_get_a_visible_range() {
        let (_, y) = bounds(&[series(vec![(0.0, 0.0), (1.0, 0.0)])]);
        assert_eq!(y, -1.0..1.0);
        let (_, y) = bounds(&[series(vec![(0.0, 2.0), (1.0, 2.0)])]);
        assert!(y.start < 2.0 && y.end > 2.0);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let (x, y) = bounds(&[series(vec![(0.0, f64::NAN), (1.0, 3.0), (2.0, 4.0)])]);
        assert_eq!(x, 0.0..2.0);
        assert!(y.start < 3.0 && y.end > 4.0);
    }
}
