use crate::dynamics::State;
use crate::integrate::{IntegrationStatus, Solution, SolverStats};

/// An end-of-inflation crossing located by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub t: f64,
    pub state: State,
}

/// Sampled (t, φ, φ̇) history of one run.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub events: Vec<EventRecord>,
    pub status: IntegrationStatus,
    pub stats: SolverStats,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Samples as `(t, φ, φ̇)` triples.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.times
            .iter()
            .zip(&self.states)
            .map(|(&t, s)| (t, s[0], s[1]))
    }

    /// The first recorded end of inflation, if any.
    pub fn end_of_inflation(&self) -> Option<&EventRecord> {
        self.events.first()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }
}

impl From<Solution> for Trajectory {
    fn from(solution: Solution) -> Self {
        let states = (0..solution.len())
            .map(|i| {
                let s = solution.state(i);
                State::new(s[0], s[1])
            })
            .collect();
        let events = solution
            .crossings
            .iter()
            .map(|c| EventRecord {
                t: c.t,
                state: State::new(c.state[0], c.state[1]),
            })
            .collect();
        Self {
            times: solution.times,
            states,
            events,
            status: solution.status,
            stats: solution.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::Crossing;

    #[test]
    fn converts_row_major_solution() {
        let solution = Solution {
            dimension: 2,
            times: vec![0.0, 1.0, 2.0],
            states: vec![5.0, 0.0, 4.9, -0.1, 4.7, -0.2],
            crossings: vec![Crossing {
                t: 1.5,
                state: vec![4.8, -0.15],
            }],
            status: IntegrationStatus::Terminated,
            stats: SolverStats::default(),
        };
        let trajectory = Trajectory::from(solution);
        assert_eq!(trajectory.len(), 3);
        let samples: Vec<(f64, f64, f64)> = trajectory.samples().collect();
        assert_eq!(
            samples,
            vec![(0.0, 5.0, 0.0), (1.0, 4.9, -0.1), (2.0, 4.7, -0.2)]
        );
        let event = trajectory.end_of_inflation().expect("event recorded");
        assert_eq!(event.t, 1.5);
        assert_eq!(event.state, State::new(4.8, -0.15));
        assert_eq!(trajectory.last_time(), Some(2.0));
    }
}
