use crate::traits::DynamicalSystem;

/// Dormand–Prince 5(4) embedded Runge–Kutta pair.
///
/// Seven stages with the first-same-as-last property: the final stage of an
/// accepted step is the derivative at the new point, so it becomes `k1` of the
/// next step. The 5th-order solution is propagated; the 4th-order companion
/// only feeds the error estimate.
pub struct DormandPrince45 {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    k7: Vec<f64>,
    tmp: Vec<f64>,
    y_new: Vec<f64>,
    evaluations: usize,
}

/// Order of the embedded error estimator, used for step-size control.
pub const ERROR_ESTIMATOR_ORDER: i32 = 4;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;

const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;

const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;

const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;

const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (also row 7 of the tableau)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// b - b̂ (5th minus embedded 4th order)
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

impl DormandPrince45 {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            tmp: vec![0.0; dim],
            y_new: vec![0.0; dim],
            evaluations: 0,
        }
    }

    /// Evaluates f(t, y) into the first stage. Must be called once before the
    /// first `attempt`; afterwards `accept` keeps it current.
    pub fn prime(&mut self, system: &impl DynamicalSystem<f64>, t: f64, y: &[f64]) {
        system.apply(t, y, &mut self.k1);
        self.evaluations += 1;
    }

    /// Derivative at the start of the current step.
    pub fn slope_start(&self) -> &[f64] {
        &self.k1
    }

    /// Derivative at the end of the last attempted step.
    pub fn slope_end(&self) -> &[f64] {
        &self.k7
    }

    /// Proposed state at the end of the last attempted step.
    pub fn proposal(&self) -> &[f64] {
        &self.y_new
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Counts a right-hand-side evaluation done on this stepper's behalf
    /// (e.g. while choosing the first step).
    pub fn record_evaluation(&mut self) {
        self.evaluations += 1;
    }

    /// Attempts a step of size `h` from `(t, y)` and returns the scaled RMS
    /// error norm; the step is acceptable when the norm is below one.
    ///
    /// Error scale per component: `atol + rtol * max(|y|, |y_new|)`.
    pub fn attempt(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: f64,
        y: &[f64],
        h: f64,
        rtol: f64,
        atol: f64,
    ) -> f64 {
        let n = y.len();

        // k2
        for i in 0..n {
            self.tmp[i] = y[i] + h * (A21 * self.k1[i]);
        }
        system.apply(t + C2 * h, &self.tmp, &mut self.k2);

        // k3
        for i in 0..n {
            self.tmp[i] = y[i] + h * (A31 * self.k1[i] + A32 * self.k2[i]);
        }
        system.apply(t + C3 * h, &self.tmp, &mut self.k3);

        // k4
        for i in 0..n {
            self.tmp[i] = y[i] + h * (A41 * self.k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system.apply(t + C4 * h, &self.tmp, &mut self.k4);

        // k5
        for i in 0..n {
            self.tmp[i] = y[i]
                + h * (A51 * self.k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system.apply(t + C5 * h, &self.tmp, &mut self.k5);

        // k6
        for i in 0..n {
            self.tmp[i] = y[i]
                + h * (A61 * self.k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system.apply(t + h, &self.tmp, &mut self.k6);

        // 5th-order solution
        for i in 0..n {
            self.y_new[i] = y[i]
                + h * (B1 * self.k1[i]
                    + B3 * self.k3[i]
                    + B4 * self.k4[i]
                    + B5 * self.k5[i]
                    + B6 * self.k6[i]);
        }

        // k7 = f(t + h, y_new), reused as k1 if the step is accepted
        system.apply(t + h, &self.y_new, &mut self.k7);
        self.evaluations += 6;

        let mut sum = 0.0;
        for i in 0..n {
            let err = h
                * (E1 * self.k1[i]
                    + E3 * self.k3[i]
                    + E4 * self.k4[i]
                    + E5 * self.k5[i]
                    + E6 * self.k6[i]
                    + E7 * self.k7[i]);
            let scale = atol + rtol * y[i].abs().max(self.y_new[i].abs());
            sum += (err / scale).powi(2);
        }
        (sum / n.max(1) as f64).sqrt()
    }

    /// Commits the last attempt: copies the proposal into `y` and rolls the
    /// final stage over to the first.
    pub fn accept(&mut self, y: &mut [f64]) {
        y.copy_from_slice(&self.y_new);
        std::mem::swap(&mut self.k1, &mut self.k7);
    }
}
