//! Equations of motion for a homogeneous inflaton in reduced Planck units.
//!
//! φ̈ + 3Hφ̇ + V'(φ) = 0, H² = ρ/3, ρ = ½φ̇² + V(φ).

use crate::potential::Potential;
use crate::traits::{DynamicalSystem, EventFunction, Scalar};
use nalgebra::Vector2;

/// Field value and velocity, (φ, φ̇).
pub type State = Vector2<f64>;

pub fn energy_density<T: Scalar>(potential: &Potential, phi: T, phi_dot: T) -> T {
    let half = T::from_f64(0.5).unwrap_or_else(T::nan);
    half * phi_dot * phi_dot + potential.value(phi)
}

/// H = √(ρ/3), clamped to zero when ρ ≤ 0.
pub fn hubble_rate<T: Scalar>(rho: T) -> T {
    if rho <= T::zero() {
        return T::zero();
    }
    let three = T::from_f64(3.0).unwrap_or_else(T::nan);
    (rho / three).sqrt()
}

/// Time derivative of the state. `t` is unused: the system is autonomous.
pub fn derivative(_t: f64, state: &State, potential: &Potential) -> State {
    let (phi, phi_dot) = (state[0], state[1]);
    let h = hubble_rate(energy_density(potential, phi, phi_dot));
    State::new(phi_dot, -3.0 * h * phi_dot - potential.dv_dphi(phi))
}

/// ε − 1 with ε = ½(φ̇/H)²; exactly 0.0 when ρ ≤ 0.
///
/// Inflation ends where this crosses zero upwards.
pub fn slow_roll_margin(_t: f64, state: &State, potential: &Potential) -> f64 {
    let (phi, phi_dot) = (state[0], state[1]);
    let rho = energy_density(potential, phi, phi_dot);
    if rho <= 0.0 {
        return 0.0;
    }
    let h = hubble_rate(rho);
    let epsilon = 0.5 * (phi_dot / h).powi(2);
    epsilon - 1.0
}

/// The inflaton equations as a [`DynamicalSystem`] over `(φ, φ̇)`.
#[derive(Debug, Clone, Copy)]
pub struct InflatonSystem {
    pub potential: Potential,
}

impl InflatonSystem {
    pub fn new(potential: Potential) -> Self {
        Self { potential }
    }
}

impl<T: Scalar> DynamicalSystem<T> for InflatonSystem {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let (phi, phi_dot) = (x[0], x[1]);
        let h = hubble_rate(energy_density(&self.potential, phi, phi_dot));
        let three = T::from_f64(3.0).unwrap_or_else(T::nan);
        out[0] = phi_dot;
        out[1] = -three * h * phi_dot - self.potential.slope(phi);
    }
}

/// Event function g = ε − 1 marking the end of inflation.
#[derive(Debug, Clone, Copy)]
pub struct EndOfInflation {
    pub potential: Potential,
}

impl EndOfInflation {
    pub fn new(potential: Potential) -> Self {
        Self { potential }
    }
}

impl EventFunction for EndOfInflation {
    fn eval(&self, t: f64, x: &[f64]) -> f64 {
        slow_roll_margin(t, &State::new(x[0], x[1]), &self.potential)
    }
}
