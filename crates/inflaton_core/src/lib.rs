pub mod autodiff;
pub mod config;
pub mod diagnostics;
pub mod dynamics;
pub mod integrate;
pub mod potential;
pub mod solvers;
pub mod sweep;
/// The `inflaton_core` crate integrates single-field inflation models.
/// The field equations are generic over the scalar type, so they run on `f64`
/// for integration and on dual numbers where diagnostics need derivatives.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODEs), `EventFunction` (zero-crossing watchers).
/// - **Potentials**: Quadratic, Starobinsky, Hilltop and Natural inflation.
/// - **Integration**: Adaptive Dormand–Prince 5(4) with dense output and end-of-inflation detection.
/// - **Sweeps**: Cartesian expansion of list-valued configuration entries into independent runs.
pub mod traits;
pub mod trajectory;

pub use config::{ConfigError, SweepConfig};
pub use dynamics::State;
pub use potential::{Potential, PotentialKind};
pub use sweep::{RunOutcome, RunSpec, SweepPlan};
