//! Adaptive integration with uniform sampling and zero-crossing events.
//!
//! Drives [`DormandPrince45`] across a time span, reports the state on a
//! caller-supplied grid by cubic Hermite interpolation inside each accepted
//! step, and watches an [`EventFunction`] for sign changes. Crossings are
//! located with Brent's method on the same interpolant.

use crate::solvers::{DormandPrince45, ERROR_ESTIMATOR_ORDER};
use crate::traits::{DynamicalSystem, EventFunction};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ROOT_TOLERANCE: f64 = 4.0 * f64::EPSILON;
const ROOT_MAX_ITER: usize = 100;

/// Which sign changes of the event function count as crossings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventDirection {
    /// Negative to positive.
    #[default]
    Rising,
    /// Positive to negative.
    Falling,
    Either,
}

impl EventDirection {
    /// A zero at either end counts, so a function pinned at zero keeps firing.
    pub fn is_active(self, before: f64, after: f64) -> bool {
        let up = before <= 0.0 && after >= 0.0;
        let down = before >= 0.0 && after <= 0.0;
        match self {
            EventDirection::Rising => up,
            EventDirection::Falling => down,
            EventDirection::Either => up || down,
        }
    }
}

/// An event function together with how the integrator reacts to it.
#[derive(Debug, Clone)]
pub struct EventSpec<E> {
    pub function: E,
    pub direction: EventDirection,
    /// Stop at the first crossing instead of recording and continuing.
    pub terminal: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IntegrationOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Upper bound on step attempts, accepted or rejected.
    pub max_steps: usize,
    /// Initial step; chosen automatically when `None`.
    pub first_step: Option<f64>,
    pub max_step: f64,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_steps: 100_000,
            first_step: None,
            max_step: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("invalid integration input: {0}")]
    InvalidInput(String),
    #[error("step budget of {0} attempts exhausted")]
    StepBudgetExhausted(usize),
    #[error("required step size {h:e} is below the resolvable minimum at t = {t}")]
    StepSizeTooSmall { t: f64, h: f64 },
    #[error("state became non-finite at t = {t}")]
    NonFiniteState { t: f64 },
}

/// How an integration run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationStatus {
    /// Reached the end of the span.
    Completed,
    /// Stopped at a terminal event.
    Terminated,
    /// Gave up before the end of the span; samples up to `t` are valid.
    Failed { t: f64, error: IntegrationError },
}

impl IntegrationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, IntegrationStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

/// A located zero crossing of the event function.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub t: f64,
    pub state: Vec<f64>,
}

/// Output of [`integrate`]. States are stored row-major, one row per sample.
#[derive(Debug, Clone)]
pub struct Solution {
    pub dimension: usize,
    pub times: Vec<f64>,
    pub states: Vec<f64>,
    pub crossings: Vec<Crossing>,
    pub status: IntegrationStatus,
    pub stats: SolverStats,
}

impl Solution {
    fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            times: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity * dimension),
            crossings: Vec::new(),
            status: IntegrationStatus::Completed,
            stats: SolverStats::default(),
        }
    }

    fn push(&mut self, t: f64, state: &[f64]) {
        self.times.push(t);
        self.states.extend_from_slice(state);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn state(&self, index: usize) -> &[f64] {
        let d = self.dimension;
        &self.states[index * d..(index + 1) * d]
    }

    pub fn component(&self, j: usize) -> impl Iterator<Item = f64> + '_ {
        self.states
            .chunks_exact(self.dimension)
            .map(move |row| row[j])
    }
}

/// Cubic Hermite interpolant over one accepted step.
struct HermiteSegment<'a> {
    t0: f64,
    t1: f64,
    y0: &'a [f64],
    f0: &'a [f64],
    y1: &'a [f64],
    f1: &'a [f64],
}

impl HermiteSegment<'_> {
    fn eval(&self, t: f64, out: &mut [f64]) {
        let dt = self.t1 - self.t0;
        let s = (t - self.t0) / dt;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 1.0 - 3.0 * s2 + 2.0 * s3;
        let h10 = s - 2.0 * s2 + s3;
        let h01 = 3.0 * s2 - 2.0 * s3;
        let h11 = s3 - s2;
        for i in 0..out.len() {
            out[i] = h00 * self.y0[i]
                + h10 * dt * self.f0[i]
                + h01 * self.y1[i]
                + h11 * dt * self.f1[i];
        }
    }
}

/// Integrates `system` from `y0` over `t_span`.
///
/// With a non-empty `t_eval` (ascending, inside the span) the solution holds
/// exactly those sample times up to where integration stopped; with an empty
/// one it holds every accepted step. Input errors are returned as `Err`;
/// failures during stepping end the run with [`IntegrationStatus::Failed`]
/// and keep everything sampled so far.
pub fn integrate<S, E>(
    system: &S,
    event: Option<&EventSpec<E>>,
    options: &IntegrationOptions,
    t_span: (f64, f64),
    y0: &[f64],
    t_eval: &[f64],
) -> Result<Solution, IntegrationError>
where
    S: DynamicalSystem<f64>,
    E: EventFunction,
{
    validate(system, options, t_span, y0, t_eval)?;
    let (t0, t_end) = t_span;
    let dim = y0.len();

    let mut stepper = DormandPrince45::new(dim);
    let mut solution = Solution::new(dim, t_eval.len().max(16));
    let mut t = t0;
    let mut y = y0.to_vec();
    let mut y_prev = vec![0.0; dim];
    let mut f_prev = vec![0.0; dim];
    let mut scratch = vec![0.0; dim];

    stepper.prime(system, t, &y);

    let mut next_sample = 0usize;
    if t_eval.is_empty() {
        solution.push(t, &y);
    } else {
        while next_sample < t_eval.len() && t_eval[next_sample] <= t0 {
            solution.push(t_eval[next_sample], &y);
            next_sample += 1;
        }
    }

    let mut g_prev = event.map(|spec| spec.function.eval(t, &y));
    let mut h_abs = match options.first_step {
        Some(h) => h.min(t_end - t0),
        None => initial_step(system, &mut stepper, t0, &y, t_end, options),
    }
    .min(options.max_step);

    let mut attempts = 0usize;
    let mut stats = SolverStats::default();

    let status = 'outer: loop {
        if t >= t_end {
            break IntegrationStatus::Completed;
        }
        let min_step = 10.0 * f64::EPSILON * t.abs().max(t_end - t0);
        let mut rejected_once = false;

        let t_new = loop {
            if attempts >= options.max_steps {
                break 'outer IntegrationStatus::Failed {
                    t,
                    error: IntegrationError::StepBudgetExhausted(options.max_steps),
                };
            }
            if h_abs < min_step {
                break 'outer IntegrationStatus::Failed {
                    t,
                    error: IntegrationError::StepSizeTooSmall { t, h: h_abs },
                };
            }

            let t_new = (t + h_abs).min(t_end);
            let h = t_new - t;
            attempts += 1;
            let error_norm = stepper.attempt(system, t, &y, h, options.rtol, options.atol);
            // A NaN proposal would only be rejected and shrunk until underflow.
            if !stepper.proposal().iter().all(|v| v.is_finite()) {
                break 'outer IntegrationStatus::Failed {
                    t,
                    error: IntegrationError::NonFiniteState { t: t_new },
                };
            }

            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(-1.0 / exponent_order()))
                };
                if rejected_once {
                    factor = factor.min(1.0);
                }
                h_abs = (h * factor).min(options.max_step);
                stats.accepted += 1;
                break t_new;
            }

            h_abs = h * MIN_FACTOR.max(SAFETY * error_norm.powf(-1.0 / exponent_order()));
            rejected_once = true;
            stats.rejected += 1;
        };

        y_prev.copy_from_slice(&y);
        f_prev.copy_from_slice(stepper.slope_start());
        stepper.accept(&mut y);

        let segment = HermiteSegment {
            t0: t,
            t1: t_new,
            y0: &y_prev,
            f0: &f_prev,
            y1: &y,
            f1: stepper.slope_start(),
        };

        if let (Some(spec), Some(before)) = (event, g_prev) {
            let after = spec.function.eval(t_new, &y);
            if spec.direction.is_active(before, after) {
                let t_root = brent_root(
                    |s| {
                        segment.eval(s, &mut scratch);
                        spec.function.eval(s, &scratch)
                    },
                    t,
                    t_new,
                    before,
                    after,
                );
                let mut state = vec![0.0; dim];
                segment.eval(t_root, &mut state);
                trace!(t = t_root, "event crossing located");

                if spec.terminal {
                    emit_samples(&mut solution, &segment, t_eval, &mut next_sample, t_root);
                    if t_eval.is_empty() {
                        solution.push(t_root, &state);
                    }
                    solution.crossings.push(Crossing { t: t_root, state });
                    break IntegrationStatus::Terminated;
                }
                solution.crossings.push(Crossing { t: t_root, state });
            }
            g_prev = Some(after);
        }

        if t_eval.is_empty() {
            solution.push(t_new, &y);
        } else {
            emit_samples(&mut solution, &segment, t_eval, &mut next_sample, t_new);
        }
        t = t_new;
    };

    stats.evaluations = stepper.evaluations();
    solution.stats = stats;
    solution.status = status;
    Ok(solution)
}

fn exponent_order() -> f64 {
    f64::from(ERROR_ESTIMATOR_ORDER + 1)
}

fn emit_samples(
    solution: &mut Solution,
    segment: &HermiteSegment<'_>,
    t_eval: &[f64],
    next: &mut usize,
    until: f64,
) {
    let mut buffer = vec![0.0; solution.dimension];
    while *next < t_eval.len() && t_eval[*next] <= until {
        segment.eval(t_eval[*next], &mut buffer);
        solution.push(t_eval[*next], &buffer);
        *next += 1;
    }
}

fn validate<S: DynamicalSystem<f64>>(
    system: &S,
    options: &IntegrationOptions,
    (t0, t_end): (f64, f64),
    y0: &[f64],
    t_eval: &[f64],
) -> Result<(), IntegrationError> {
    let invalid = |msg: String| -> Result<(), IntegrationError> {
        Err(IntegrationError::InvalidInput(msg))
    };
    if y0.is_empty() {
        return invalid("initial state must have positive dimension".into());
    }
    if y0.len() != system.dimension() {
        return invalid(format!(
            "initial state has dimension {}, system expects {}",
            y0.len(),
            system.dimension()
        ));
    }
    if let Some((i, v)) = y0.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return invalid(format!("y0[{i}] = {v} is not finite"));
    }
    if !t0.is_finite() || !t_end.is_finite() || t_end <= t0 {
        return invalid(format!("time span ({t0}, {t_end}) must be finite and increasing"));
    }
    if !(options.rtol >= 0.0 && options.rtol.is_finite()) {
        return invalid("rtol must be non-negative and finite".into());
    }
    if !(options.atol > 0.0 && options.atol.is_finite()) {
        return invalid("atol must be positive and finite".into());
    }
    if options.max_steps == 0 {
        return invalid("max_steps must be at least 1".into());
    }
    if !(options.max_step > 0.0) {
        return invalid("max_step must be positive".into());
    }
    if let Some(h) = options.first_step {
        if !(h > 0.0 && h.is_finite()) {
            return invalid("first_step must be positive and finite".into());
        }
    }
    if t_eval.windows(2).any(|w| w[1] < w[0]) {
        return invalid("t_eval must be sorted ascending".into());
    }
    if let (Some(first), Some(last)) = (t_eval.first(), t_eval.last()) {
        if *first < t0 || *last > t_end {
            return invalid("t_eval must lie within the time span".into());
        }
    }
    Ok(())
}

/// Hairer–Wanner starting step estimate.
fn initial_step<S: DynamicalSystem<f64>>(
    system: &S,
    stepper: &mut DormandPrince45,
    t0: f64,
    y0: &[f64],
    t_end: f64,
    options: &IntegrationOptions,
) -> f64 {
    let span = t_end - t0;
    let f0 = stepper.slope_start().to_vec();
    let scale: Vec<f64> = y0
        .iter()
        .map(|y| options.atol + y.abs() * options.rtol)
        .collect();
    let d0 = rms_norm(y0.iter().zip(&scale).map(|(y, s)| y / s));
    let d1 = rms_norm(f0.iter().zip(&scale).map(|(f, s)| f / s));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
    .min(span);

    let y1: Vec<f64> = y0.iter().zip(&f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; y0.len()];
    system.apply(t0 + h0, &y1, &mut f1);
    stepper.record_evaluation();

    let d2 = rms_norm(
        f1.iter()
            .zip(&f0)
            .zip(&scale)
            .map(|((a, b), s)| (a - b) / s),
    ) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / exponent_order())
    };

    (100.0 * h0).min(h1).min(span)
}

fn rms_norm(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    (sum / n.max(1) as f64).sqrt()
}

/// Brent's method on a bracket `[a, b]` with known end values.
fn brent_root<F: FnMut(f64) -> f64>(mut f: F, a: f64, b: f64, fa: f64, fb: f64) -> f64 {
    let (mut xpre, mut xcur) = (a, b);
    let (mut fpre, mut fcur) = (fa, fb);
    let (mut xblk, mut fblk) = (0.0, 0.0);
    let (mut spre, mut scur) = (0.0f64, 0.0f64);

    if fpre == 0.0 {
        return xpre;
    }
    if fcur == 0.0 {
        return xcur;
    }

    for _ in 0..ROOT_MAX_ITER {
        if fpre != 0.0 && fcur != 0.0 && (fpre < 0.0) != (fcur < 0.0) {
            xblk = xpre;
            fblk = fpre;
            spre = xcur - xpre;
            scur = spre;
        }
        if fblk.abs() < fcur.abs() {
            xpre = xcur;
            xcur = xblk;
            xblk = xpre;
            fpre = fcur;
            fcur = fblk;
            fblk = fpre;
        }

        let delta = (ROOT_TOLERANCE + ROOT_TOLERANCE * xcur.abs()) / 2.0;
        let sbis = (xblk - xcur) / 2.0;
        if fcur == 0.0 || sbis.abs() < delta {
            return xcur;
        }

        if spre.abs() > delta && fcur.abs() < fpre.abs() {
            let stry = if xpre == xblk {
                // secant
                -fcur * (xcur - xpre) / (fcur - fpre)
            } else {
                // inverse quadratic interpolation
                let dpre = (fpre - fcur) / (xpre - xcur);
                let dblk = (fblk - fcur) / (xblk - xcur);
                -fcur * (fblk * dblk - fpre * dpre) / (dblk * dpre * (fblk - fpre))
            };
            if 2.0 * stry.abs() < spre.abs().min(3.0 * sbis.abs() - delta) {
                spre = scur;
                scur = stry;
            } else {
                spre = sbis;
                scur = sbis;
            }
        } else {
            spre = sbis;
            scur = sbis;
        }

        xpre = xcur;
        fpre = fcur;
        if scur.abs() > delta {
            xcur += scur;
        } else {
            xcur += if sbis > 0.0 { delta } else { -delta };
        }
        fcur = f(xcur);
    }
    xcur
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    struct Oscillator {
        omega: f64,
    }

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -self.omega * self.omega * x[0];
        }
    }

    struct Position;

    impl EventFunction for Position {
        fn eval(&self, _t: f64, x: &[f64]) -> f64 {
            x[0]
        }
    }

    struct NoEvent;

    impl EventFunction for NoEvent {
        fn eval(&self, _t: f64, _x: &[f64]) -> f64 {
            -1.0
        }
    }

    fn integrate_plain<S: DynamicalSystem<f64>>(
        system: &S,
        options: &IntegrationOptions,
        t_span: (f64, f64),
        y0: &[f64],
        t_eval: &[f64],
    ) -> Result<Solution, IntegrationError> {
        integrate::<S, NoEvent>(system, None, options, t_span, y0, t_eval)
    }

    /// y' = 1 up to y = 1, undefined beyond.
    struct Cliff;

    impl DynamicalSystem<f64> for Cliff {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = if x[0] > 1.0 { f64::NAN } else { 1.0 };
        }
    }

    /// y' = y², which blows up at t = 1 from y(0) = 1.
    struct BlowUp;

    impl DynamicalSystem<f64> for BlowUp {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[0] * x[0];
        }
    }

    fn grid(t0: f64, t1: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| t0 + (t1 - t0) * (i as f64 / (n - 1) as f64))
            .collect()
    }

    fn tight() -> IntegrationOptions {
        IntegrationOptions {
            rtol: 1e-10,
            atol: 1e-12,
            max_step: 0.05,
            ..IntegrationOptions::default()
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, IntegrationError>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn oscillator_samples_follow_cosine() {
        let system = Oscillator { omega: 1.0 };
        let t_eval = grid(0.0, 4.0 * PI, 101);
        let solution = integrate_plain(&system, &tight(), (0.0, 4.0 * PI), &[1.0, 0.0], &t_eval)
            .expect("integration should run");

        assert_eq!(solution.status, IntegrationStatus::Completed);
        assert_eq!(solution.len(), t_eval.len());
        assert_eq!(solution.times, t_eval);
        for (i, &t) in solution.times.iter().enumerate() {
            let state = solution.state(i);
            assert!((state[0] - t.cos()).abs() < 1e-7, "x({t}) = {}", state[0]);
            assert!((state[1] + t.sin()).abs() < 1e-7, "v({t}) = {}", state[1]);
        }
        assert!(solution.stats.accepted > 0);
        assert!(solution.stats.evaluations >= 6 * solution.stats.accepted);
    }

    #[test]
    fn empty_grid_records_every_step() {
        let system = Oscillator { omega: 2.0 };
        let solution = integrate_plain(&system, &tight(), (0.0, 1.0), &[1.0, 0.0], &[])
            .expect("integration should run");
        assert_eq!(solution.len(), solution.stats.accepted + 1);
        assert_eq!(solution.times.first(), Some(&0.0));
        assert_eq!(solution.times.last(), Some(&1.0));
    }

    #[test]
    fn terminal_event_stops_at_first_falling_crossing() {
        let system = Oscillator { omega: 1.0 };
        let spec = EventSpec {
            function: Position,
            direction: EventDirection::Falling,
            terminal: true,
        };
        let t_eval = grid(0.0, 10.0, 201);
        let solution = integrate(&system, Some(&spec), &tight(), (0.0, 10.0), &[1.0, 0.0], &t_eval)
            .expect("integration should run");

        assert_eq!(solution.status, IntegrationStatus::Terminated);
        assert_eq!(solution.crossings.len(), 1);
        let crossing = &solution.crossings[0];
        assert!((crossing.t - PI / 2.0).abs() < 1e-6, "t = {}", crossing.t);
        assert!(crossing.state[0].abs() < 1e-8);
        assert!(solution.times.iter().all(|&t| t <= crossing.t));
        assert_eq!(
            solution.len(),
            t_eval.iter().filter(|&&t| t <= crossing.t).count()
        );
    }

    #[test]
    fn rising_direction_skips_falling_crossings() {
        let system = Oscillator { omega: 1.0 };
        let spec = EventSpec {
            function: Position,
            direction: EventDirection::Rising,
            terminal: true,
        };
        let solution = integrate(&system, Some(&spec), &tight(), (0.0, 10.0), &[1.0, 0.0], &[])
            .expect("integration should run");
        assert_eq!(solution.status, IntegrationStatus::Terminated);
        assert!((solution.crossings[0].t - 1.5 * PI).abs() < 1e-6);
        assert_eq!(solution.times.last(), Some(&solution.crossings[0].t));
    }

    #[test]
    fn non_terminal_event_records_all_crossings_and_keeps_grid() {
        let system = Oscillator { omega: 1.0 };
        let spec = EventSpec {
            function: Position,
            direction: EventDirection::Either,
            terminal: false,
        };
        let t_eval = grid(0.0, 10.0, 51);
        let solution = integrate(&system, Some(&spec), &tight(), (0.0, 10.0), &[1.0, 0.0], &t_eval)
            .expect("integration should run");

        assert_eq!(solution.status, IntegrationStatus::Completed);
        assert_eq!(solution.len(), t_eval.len());
        // cos t vanishes at π/2, 3π/2, 5π/2 in [0, 10].
        assert_eq!(solution.crossings.len(), 3);
        for (k, crossing) in solution.crossings.iter().enumerate() {
            let expected = PI / 2.0 + k as f64 * PI;
            assert!((crossing.t - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn step_budget_exhaustion_keeps_partial_samples() {
        let system = Oscillator { omega: 1.0 };
        let options = IntegrationOptions {
            max_steps: 5,
            ..tight()
        };
        let t_eval = grid(0.0, 100.0, 1001);
        let solution = integrate_plain(&system, &options, (0.0, 100.0), &[1.0, 0.0], &t_eval)
            .expect("inputs are valid");

        match &solution.status {
            IntegrationStatus::Failed { t, error } => {
                assert_eq!(*error, IntegrationError::StepBudgetExhausted(5));
                assert!(*t < 100.0);
                assert!(solution.times.iter().all(|s| s <= t));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!solution.is_empty());
        assert!(solution.len() < t_eval.len());
    }

    #[test]
    fn non_finite_proposal_fails_immediately() {
        let options = IntegrationOptions {
            rtol: 1e-6,
            atol: 1e-9,
            ..IntegrationOptions::default()
        };
        let solution = integrate_plain(&Cliff, &options, (0.0, 5.0), &[0.0], &[])
            .expect("inputs are valid");

        match &solution.status {
            IntegrationStatus::Failed { t, error } => {
                assert!(matches!(error, IntegrationError::NonFiniteState { .. }));
                assert!(*t <= 1.0 + 1e-12, "failed at {t}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(solution.stats.rejected, 0);
        assert!(solution.states.iter().all(|y| y.is_finite()));
    }

    #[test]
    fn blow_up_ends_in_step_size_underflow() {
        let options = IntegrationOptions {
            rtol: 1e-6,
            atol: 1e-9,
            ..IntegrationOptions::default()
        };
        let solution = integrate_plain(&BlowUp, &options, (0.0, 2.0), &[1.0], &[])
            .expect("inputs are valid");

        match &solution.status {
            IntegrationStatus::Failed { t, error } => {
                match error {
                    IntegrationError::StepSizeTooSmall { h, .. } => {
                        assert!(*h < 10.0 * f64::EPSILON * 2.0)
                    }
                    other => panic!("expected step-size underflow, got {other:?}"),
                }
                assert!(*t > 0.99 && *t < 1.0, "failed at {t}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_inputs() {
        let system = Oscillator { omega: 1.0 };
        let options = IntegrationOptions::default();
        assert_err_contains(
            integrate_plain(&system, &options, (0.0, 1.0), &[1.0], &[]),
            "dimension",
        );
        assert_err_contains(
            integrate_plain(&system, &options, (1.0, 0.0), &[1.0, 0.0], &[]),
            "increasing",
        );
        assert_err_contains(
            integrate_plain(&system, &options, (0.0, 1.0), &[1.0, 0.0], &[0.5, 2.0]),
            "within the time span",
        );
        assert_err_contains(
            integrate_plain(&system, &options, (0.0, 1.0), &[1.0, 0.0], &[0.5, 0.2]),
            "sorted",
        );
        let bad_tol = IntegrationOptions {
            atol: 0.0,
            ..options
        };
        assert_err_contains(
            integrate_plain(&system, &bad_tol, (0.0, 1.0), &[1.0, 0.0], &[]),
            "atol",
        );
    }

    #[test]
    fn brent_finds_cubic_root() {
        let f = |x: f64| x * x * x - 2.0;
        let root = brent_root(f, 0.0, 2.0, f(0.0), f(2.0));
        assert!((root - 2f64.cbrt()).abs() < 1e-14);
    }

    #[test]
    fn direction_semantics() {
        assert!(EventDirection::Rising.is_active(-1.0, 0.5));
        assert!(EventDirection::Rising.is_active(-1.0, 0.0));
        assert!(!EventDirection::Rising.is_active(1.0, -0.5));
        assert!(EventDirection::Falling.is_active(1.0, -0.5));
        assert!(EventDirection::Either.is_active(1.0, -0.5));
        assert!(!EventDirection::Either.is_active(-1.0, -0.5));
    }
}
