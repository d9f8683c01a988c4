//! Parameter sweeps: one independent integration per combination of the
//! list-valued configuration entries.

use crate::config::{format_number, ConfigError, SimulationSettings, SweepConfig};
use crate::diagnostics::{check_slow_roll, SlowRollReport};
use crate::dynamics::{EndOfInflation, InflatonSystem};
use crate::integrate::{integrate, EventSpec, IntegrationStatus, SolverStats};
use crate::potential::{Potential, PotentialKind};
use crate::trajectory::Trajectory;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// One fully resolved combination of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    /// 1-based position in the sweep.
    pub index: usize,
    pub total: usize,
    pub kind: PotentialKind,
    /// Swept potential parameters in declared order.
    pub params: Vec<(String, f64)>,
    pub phi_init: f64,
    pub phi_dot_init: f64,
}

impl RunSpec {
    /// Human-readable summary, e.g. `quadratic m=0.1, φ0=5.0, φ̇0=0.0`.
    pub fn label(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, value)| format!("{name}={}", format_number(*value)))
            .collect();
        let mut label = self.kind.name().to_string();
        if !params.is_empty() {
            label.push(' ');
            label.push_str(&params.join(", "));
        }
        label.push_str(&format!(
            ", φ0={}, φ̇0={}",
            format_number(self.phi_init),
            format_number(self.phi_dot_init)
        ));
        label
    }
}

/// Expands a configuration into its runs: potential parameters in declared
/// order, then φ0, then φ̇0, with the last axis varying fastest.
pub fn expand(config: &SweepConfig) -> Result<Vec<RunSpec>, ConfigError> {
    config.validate()?;
    let kind = config.potential_kind()?;
    let table = config.parameter_table(kind);

    let mut axes: Vec<&[f64]> = table.entries().iter().map(|(_, v)| v.values()).collect();
    axes.push(config.phi_init.values());
    axes.push(config.phi_dot_init.values());

    let combinations = cartesian(&axes);
    let total = combinations.len();
    let n_params = table.entries().len();

    Ok(combinations
        .into_iter()
        .enumerate()
        .map(|(i, combo)| RunSpec {
            index: i + 1,
            total,
            kind,
            params: table
                .entries()
                .iter()
                .zip(&combo)
                .map(|((name, _), &value)| (name.clone(), value))
                .collect(),
            phi_init: combo[n_params],
            phi_dot_init: combo[n_params + 1],
        })
        .collect())
}

fn cartesian(axes: &[&[f64]]) -> Vec<Vec<f64>> {
    axes.iter().fold(vec![Vec::new()], |prefixes, axis| {
        prefixes
            .iter()
            .flat_map(|prefix| {
                axis.iter().map(move |&value| {
                    let mut combo = prefix.clone();
                    combo.push(value);
                    combo
                })
            })
            .collect()
    })
}

/// A run ready to integrate.
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub spec: RunSpec,
    pub potential: Potential,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub spec: RunSpec,
    pub potential: Potential,
    pub trajectory: Trajectory,
    pub diagnostics: Option<SlowRollReport>,
}

impl RunOutcome {
    pub fn failed(&self) -> bool {
        self.trajectory.status.is_failure()
    }
}

/// Validated sweep with every potential already built, so configuration
/// errors surface before the first integration.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    runs: Vec<PlannedRun>,
    settings: SimulationSettings,
    grid: Vec<f64>,
    check_slow_roll: bool,
    parallel: bool,
}

impl SweepPlan {
    pub fn from_config(config: &SweepConfig) -> Result<Self, ConfigError> {
        let runs = expand(config)?
            .into_iter()
            .map(|spec| {
                let potential = Potential::from_params(spec.kind, &spec.params)?;
                Ok(PlannedRun { spec, potential })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            runs,
            settings: config.simulation,
            grid: config.simulation.time_grid(),
            check_slow_roll: config.check_slow_roll,
            parallel: config.parallel,
        })
    }

    pub fn runs(&self) -> &[PlannedRun] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn execute(&self) -> Vec<RunOutcome> {
        self.execute_with(|_| {})
    }

    /// Runs every combination, calling `on_done` as each one finishes.
    /// Outcomes are returned in run order in both sequential and parallel mode.
    pub fn execute_with<F>(&self, on_done: F) -> Vec<RunOutcome>
    where
        F: Fn(&RunOutcome) + Sync,
    {
        info!(runs = self.runs.len(), parallel = self.parallel, "sweep starting");
        let step = |run: &PlannedRun| {
            let outcome = run_single(run, &self.settings, &self.grid, self.check_slow_roll);
            on_done(&outcome);
            outcome
        };
        let outcomes: Vec<RunOutcome> = if self.parallel {
            self.runs.par_iter().map(step).collect()
        } else {
            self.runs.iter().map(step).collect()
        };

        let failed = outcomes.iter().filter(|o| o.failed()).count();
        let terminated = outcomes
            .iter()
            .filter(|o| o.trajectory.status == IntegrationStatus::Terminated)
            .count();
        info!(
            runs = outcomes.len(),
            terminated,
            failed,
            "sweep complete"
        );
        outcomes
    }
}

/// Integrates one run on `grid`.
pub fn run_single(
    run: &PlannedRun,
    settings: &SimulationSettings,
    grid: &[f64],
    check: bool,
) -> RunOutcome {
    let spec = &run.spec;
    info!(
        run = spec.index,
        total = spec.total,
        "Run {}/{}: {}",
        spec.index,
        spec.total,
        spec.label()
    );

    let diagnostics = check.then(|| check_slow_roll(&run.potential, spec.phi_init));
    if let Some(report) = &diagnostics {
        debug!(run = spec.index, total = spec.total, "{report}");
        for warning in &report.warnings {
            warn!(run = spec.index, total = spec.total, "slow-roll check: {warning}");
        }
    }

    let system = InflatonSystem::new(run.potential);
    let event = EventSpec {
        function: EndOfInflation::new(run.potential),
        direction: settings.event_direction,
        terminal: settings.terminate_on_event,
    };
    let y0 = [spec.phi_init, spec.phi_dot_init];

    let trajectory = match integrate(
        &system,
        Some(&event),
        &settings.integration_options(),
        (settings.t_start, settings.t_end),
        &y0,
        grid,
    ) {
        Ok(solution) => Trajectory::from(solution),
        Err(error) => Trajectory {
            times: Vec::new(),
            states: Vec::new(),
            events: Vec::new(),
            status: IntegrationStatus::Failed {
                t: settings.t_start,
                error,
            },
            stats: SolverStats::default(),
        },
    };

    match &trajectory.status {
        IntegrationStatus::Failed { t, error } => {
            warn!(run = spec.index, total = spec.total, t, "run failed: {error}");
        }
        status => {
            if let Some(event) = trajectory.end_of_inflation() {
                info!(
                    run = spec.index,
                    total = spec.total,
                    t_end = event.t,
                    phi = event.state[0],
                    "end of inflation"
                );
            }
            debug!(run = spec.index, total = spec.total, ?status, "run finished");
        }
    }
    debug!(
        run = spec.index,
        total = spec.total,
        accepted = trajectory.stats.accepted,
        rejected = trajectory.stats.rejected,
        evaluations = trajectory.stats.evaluations,
        "solver statistics"
    );

    RunOutcome {
        spec: spec.clone(),
        potential: run.potential,
        trajectory,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParamTable, ParamValue};
    use crate::dynamics::slow_roll_margin;
    use crate::integrate::IntegrationError;

    fn quadratic_sweep(m: ParamValue, phi: ParamValue) -> SweepConfig {
        SweepConfig {
            quadratic_params: ParamTable(vec![("m".to_string(), m)]),
            phi_init: phi,
            phi_dot_init: ParamValue::Scalar(0.0),
            check_slow_roll: false,
            ..SweepConfig::default()
        }
    }

    #[test]
    fn expands_in_declared_order_with_initial_conditions_fastest() {
        let config = quadratic_sweep(vec![0.1, 0.2].into(), vec![5.0, 6.0].into());
        let runs = expand(&config).expect("valid sweep");
        let order: Vec<(f64, f64)> = runs.iter().map(|r| (r.params[0].1, r.phi_init)).collect();
        assert_eq!(order, vec![(0.1, 5.0), (0.1, 6.0), (0.2, 5.0), (0.2, 6.0)]);
        assert_eq!(
            runs.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(runs.iter().all(|r| r.total == 4 && r.phi_dot_init == 0.0));
    }

    #[test]
    fn multi_parameter_product_follows_key_order() {
        let config = SweepConfig::from_json(
            r#"{
                "potential_type": "natural",
                "natural_params": { "f": [5.0, 7.0], "Lambda": [1e-3, 2e-3, 3e-3] },
                "phi_init": 1.0,
                "phi_dot_init": [0.0, -1e-4]
            }"#,
        )
        .expect("valid config");
        let runs = expand(&config).expect("valid sweep");
        assert_eq!(runs.len(), 12);
        assert_eq!(
            runs[0].params,
            vec![("f".to_string(), 5.0), ("Lambda".to_string(), 1e-3)]
        );
        assert_eq!(runs[1].phi_dot_init, -1e-4);
        assert_eq!(runs[2].params[1].1, 2e-3);
        assert_eq!(runs[6].params[0].1, 7.0);
    }

    #[test]
    fn label_lists_parameters_and_initial_conditions() {
        let config = quadratic_sweep(0.1.into(), 5.0.into());
        let runs = expand(&config).expect("valid sweep");
        assert_eq!(runs[0].label(), "quadratic m=0.1, φ0=5.0, φ̇0=0.0");
    }

    #[test]
    fn missing_parameters_fall_back_to_defaults() {
        let config = SweepConfig {
            potential_type: "hilltop".to_string(),
            hilltop_params: ParamTable::new(vec![("p", 6.0)]),
            ..SweepConfig::default()
        };
        let plan = SweepPlan::from_config(&config).expect("valid plan");
        assert_eq!(
            plan.runs()[0].potential,
            Potential::Hilltop {
                v0: 1e-10,
                mu: 1.0,
                p: 6.0
            }
        );
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let config = SweepConfig {
            potential_type: "quartic".to_string(),
            ..SweepConfig::default()
        };
        assert!(matches!(
            SweepPlan::from_config(&config),
            Err(ConfigError::UnknownPotential(_))
        ));
    }

    #[test]
    fn quadratic_inflation_ends_once() {
        let config = quadratic_sweep(0.1.into(), 5.0.into());
        let plan = SweepPlan::from_config(&config).expect("valid plan");
        let outcomes = plan.execute();
        assert_eq!(outcomes.len(), 1);
        let trajectory = &outcomes[0].trajectory;

        assert_eq!(trajectory.status, IntegrationStatus::Terminated);
        assert_eq!(trajectory.events.len(), 1);
        let event = trajectory.end_of_inflation().expect("inflation ends");
        assert!(event.t > 0.0 && event.t < 500.0, "event at {}", event.t);
        let margin = slow_roll_margin(event.t, &event.state, &outcomes[0].potential);
        assert!(margin.abs() < 1e-6, "margin {margin}");

        let phi: Vec<f64> = trajectory.samples().map(|(_, phi, _)| phi).collect();
        assert!(phi.len() > 50);
        assert!(phi[..50].windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(trajectory.times[0], 0.0);
        assert!(trajectory.last_time().is_some_and(|t| t <= event.t));
    }

    #[test]
    fn non_terminal_runs_cover_the_whole_grid() {
        let mut config = quadratic_sweep(0.1.into(), 5.0.into());
        config.simulation.terminate_on_event = false;
        config.simulation.num_points = 400;
        let outcomes = SweepPlan::from_config(&config).expect("valid plan").execute();
        let trajectory = &outcomes[0].trajectory;
        assert_eq!(trajectory.status, IntegrationStatus::Completed);
        assert_eq!(trajectory.len(), 400);
        assert_eq!(trajectory.last_time(), Some(500.0));
        // Reheating oscillations push ε back above one repeatedly.
        assert!(trajectory.events.len() > 1);
        assert!(trajectory.events.windows(2).all(|w| w[0].t < w[1].t));
    }

    #[test]
    fn parallel_results_match_sequential_order() {
        let mut config = quadratic_sweep(vec![0.1, 0.2].into(), vec![4.0, 5.0, 6.0].into());
        config.simulation.num_points = 100;
        let mut plan = SweepPlan::from_config(&config).expect("valid plan");
        let sequential = plan.execute();
        plan.set_parallel(true);
        let parallel = plan.execute();

        assert_eq!(sequential.len(), 6);
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.spec, b.spec);
            assert_eq!(a.trajectory.times, b.trajectory.times);
            assert_eq!(a.trajectory.states, b.trajectory.states);
        }
    }

    #[test]
    fn failed_run_keeps_partial_samples_and_sweep_continues() {
        let mut config = quadratic_sweep(vec![0.1, 0.2].into(), 5.0.into());
        config.simulation.max_steps = 5;
        let outcomes = SweepPlan::from_config(&config).expect("valid plan").execute();
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            assert!(outcome.failed());
            assert!(matches!(
                outcome.trajectory.status,
                IntegrationStatus::Failed {
                    error: IntegrationError::StepBudgetExhausted(5),
                    ..
                }
            ));
            assert!(!outcome.trajectory.is_empty());
        }
    }

    #[test]
    fn leaving_the_potential_domain_reports_non_finite_state() {
        // (φ/μ)^2.5 is undefined once φ rolls past zero.
        let config = SweepConfig {
            potential_type: "hilltop".to_string(),
            hilltop_params: ParamTable::new(vec![("V0", 1.0), ("mu", 1.0), ("p", 2.5)]),
            phi_init: 0.05.into(),
            phi_dot_init: (-0.5).into(),
            check_slow_roll: false,
            ..SweepConfig::default()
        };
        let outcomes = SweepPlan::from_config(&config).expect("valid plan").execute();
        let trajectory = &outcomes[0].trajectory;
        match &trajectory.status {
            IntegrationStatus::Failed { t, error } => {
                assert!(matches!(error, IntegrationError::NonFiniteState { .. }), "{error:?}");
                assert!(*t > 0.0 && *t < 1.0, "failed at {t}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(trajectory.states.iter().all(|s| s.iter().all(|v| v.is_finite())));
        assert!(trajectory.stats.rejected < 10);
    }

    #[test]
    fn diagnostics_are_attached_when_requested() {
        let mut config = quadratic_sweep(0.1.into(), 5.0.into());
        config.check_slow_roll = true;
        config.simulation.num_points = 10;
        let outcomes = SweepPlan::from_config(&config).expect("valid plan").execute();
        let report = outcomes[0].diagnostics.as_ref().expect("report attached");
        assert!((report.epsilon_v - 0.08).abs() < 1e-12);
    }
}
