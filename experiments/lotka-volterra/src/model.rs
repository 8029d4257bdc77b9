use anyhow::{ensure, Result};
use labnote_core::{normal_sample, seeded_rng, Table};
use serde::{Deserialize, Serialize};

/// Predator/prey rate constants and initial populations.
///
/// `prey -> 2 prey` at `alpha * prey`, `prey + predator -> 2 predator` at
/// `beta * prey * predator`, `predator -> ()` at `gamma * predator`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub prey: f64,
    pub predator: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            alpha: 1.1,
            beta: 0.4,
            gamma: 0.4,
            prey: 10.0,
            predator: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub start: f64,
    pub stop: f64,
    /// Number of integration steps between `start` and `stop`.
    pub steps: usize,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 40.0,
            steps: 2000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub seed: u64,
    /// Relative standard deviation of the multiplicative measurement noise.
    pub noise: f64,
    /// Keep one sample every `every` integration points.
    pub every: usize,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            seed: 1337,
            noise: 0.05,
            every: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct State {
    pub time: f64,
    pub prey: f64,
    pub predator: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub points: usize,
    pub peak_prey: f64,
    pub peak_prey_time: f64,
    pub peak_predator: f64,
    pub peak_predator_time: f64,
    pub final_prey: f64,
    pub final_predator: f64,
    /// Largest deviation of the conserved quantity from its initial value.
    pub invariant_drift: f64,
}

impl ModelParams {
    fn derivative(&self, prey: f64, predator: f64) -> (f64, f64) {
        let predation = self.beta * prey * predator;
        (
            self.alpha * prey - predation,
            predation - self.gamma * predator,
        )
    }

    /// Quantity conserved along exact trajectories.
    pub fn invariant(&self, prey: f64, predator: f64) -> f64 {
        self.beta * prey - self.gamma * prey.ln() + self.beta * predator
            - self.alpha * predator.ln()
    }
}

/// Integrate with classic fourth-order Runge-Kutta, returning `steps + 1` states.
pub fn simulate(params: &ModelParams, simulation: &Simulation) -> Result<Vec<State>> {
    ensure!(simulation.steps > 0, "simulation needs at least one step");
    ensure!(
        simulation.stop > simulation.start,
        "simulation stop {} must be after start {}",
        simulation.stop,
        simulation.start
    );

    let dt = (simulation.stop - simulation.start) / simulation.steps as f64;
    let mut state = State {
        time: simulation.start,
        prey: params.prey,
        predator: params.predator,
    };
    let mut trajectory = Vec::with_capacity(simulation.steps + 1);
    trajectory.push(state);

    for step in 1..=simulation.steps {
        let (x, y) = (state.prey, state.predator);
        let k1 = params.derivative(x, y);
        let k2 = params.derivative(x + 0.5 * dt * k1.0, y + 0.5 * dt * k1.1);
        let k3 = params.derivative(x + 0.5 * dt * k2.0, y + 0.5 * dt * k2.1);
        let k4 = params.derivative(x + dt * k3.0, y + dt * k3.1);
        state = State {
            time: simulation.start + step as f64 * dt,
            prey: x + dt / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0),
            predator: y + dt / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1),
        };
        trajectory.push(state);
    }

    Ok(trajectory)
}

pub fn trajectory_table(trajectory: &[State]) -> Result<Table> {
    let mut table = Table::new(["time", "prey", "predator"]);
    for state in trajectory {
        table.push_row([state.time, state.prey, state.predator])?;
    }
    Ok(table)
}

/// Subsample the trajectory and perturb it with seeded log-normal-ish noise.
pub fn observe(trajectory: &[State], observation: &Observation) -> Result<Table> {
    ensure!(observation.every > 0, "observation interval must be positive");
    let mut rng = seeded_rng(observation.seed);
    let mut table = Table::new(["time", "prey_observed", "predator_observed"]);
    for state in trajectory.iter().step_by(observation.every) {
        let prey = state.prey * normal_sample(&mut rng, 1.0, observation.noise);
        let predator = state.predator * normal_sample(&mut rng, 1.0, observation.noise);
        table.push_row([state.time, prey.max(0.0), predator.max(0.0)])?;
    }
    Ok(table)
}

pub fn summarize(params: &ModelParams, trajectory: &[State]) -> Result<Summary> {
    let first = trajectory
        .first()
        .ok_or_else(|| anyhow::anyhow!("trajectory is empty"))?;
    let last = trajectory.last().unwrap_or(first);
    let peak_prey = trajectory
        .iter()
        .max_by(|a, b| a.prey.total_cmp(&b.prey))
        .unwrap_or(last);
    let peak_predator = trajectory
        .iter()
        .max_by(|a, b| a.predator.total_cmp(&b.predator))
        .unwrap_or(last);
    let initial = params.invariant(first.prey, first.predator);
    let invariant_drift = trajectory
        .iter()
        .map(|s| (params.invariant(s.prey, s.predator) - initial).abs())
        .fold(0.0, f64::max);

    Ok(Summary {
        points: trajectory.len(),
        peak_prey: peak_prey.prey,
        peak_prey_time: peak_prey.time,
        peak_predator: peak_predator.predator,
        peak_predator_time: peak_predator.time,
        final_prey: last.prey,
        final_predator: last.predator,
        invariant_drift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_conserves_invariant() {
        let params = ModelParams::default();
        let trajectory = simulate(&params, &Simulation::default()).unwrap();
        assert_eq!(trajectory.len(), 2001);
        assert!(trajectory.iter().all(|s| s.prey > 0.0 && s.predator > 0.0));

        let drift = summarize(&params, &trajectory).unwrap().invariant_drift;
        assert!(drift < 1e-4, "invariant drifted by {drift}");
    }

    #[test]
    fn test_equilibrium_is_stationary() {
        let params = ModelParams {
            prey: 1.0,
            predator: 2.75,
            ..ModelParams::default()
        };
        let trajectory = simulate(&params, &Simulation::default()).unwrap();
        let last = trajectory.last().unwrap();
        assert!((last.prey - 1.0).abs() < 1e-9);
        assert!((last.predator - 2.75).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_simulation_rejected() {
        let params = ModelParams::default();
        let backwards = Simulation {
            start: 5.0,
            stop: 1.0,
            steps: 10,
        };
        assert!(simulate(&params, &backwards).is_err());
        let no_steps = Simulation {
            steps: 0,
            ..Simulation::default()
        };
        assert!(simulate(&params, &no_steps).is_err());
    }

    #[test]
    fn test_observations_are_reproducible_and_subsampled() {
        let trajectory = simulate(&ModelParams::default(), &Simulation::default()).unwrap();
        let observation = Observation::default();
        let first = observe(&trajectory, &observation).unwrap();
        let second = observe(&trajectory, &observation).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.row_count(), 41);
        assert_eq!(first.columns(), ["time", "prey_observed", "predator_observed"]);
    }

    #[test]
    fn test_noiseless_observation_matches_trajectory() {
        let trajectory = simulate(&ModelParams::default(), &Simulation::default()).unwrap();
        let observation = Observation {
            noise: 0.0,
            every: 1000,
            ..Observation::default()
        };
        let table = observe(&trajectory, &observation).unwrap();
        let prey: Vec<f64> = table
            .column("prey_observed")
            .unwrap()
            .into_iter()
            .filter_map(|cell| cell.as_f64())
            .collect();
        assert_eq!(prey, vec![trajectory[0].prey, trajectory[1000].prey, trajectory[2000].prey]);
    }

    #[test]
    fn test_summary_peaks() {
        let trajectory = vec![
            State { time: 0.0, prey: 1.0, predator: 3.0 },
            State { time: 1.0, prey: 4.0, predator: 2.0 },
            State { time: 2.0, prey: 2.0, predator: 1.0 },
        ];
        let summary = summarize(&ModelParams::default(), &trajectory).unwrap();
        assert_eq!(summary.points, 3);
        assert_eq!((summary.peak_prey, summary.peak_prey_time), (4.0, 1.0));
        assert_eq!((summary.peak_predator, summary.peak_predator_time), (3.0, 0.0));
        assert_eq!((summary.final_prey, summary.final_predator), (2.0, 1.0));
        assert!(summary.invariant_drift > 0.0);
        assert!(summarize(&ModelParams::default(), &[]).is_err());
    }
}
