#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::constraint::SolverUpdateable;
use crate::config::SolverSettings;
use crate::core::bodies::Bodies;
use crate::utils::logging::ScopedTimer;

/// Counters gathered during one solve.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverStepMetrics {
    pub constraints_solved: usize,
    pub iterations: u32,
    /// Sum of the impulse magnitudes returned by every constraint, per iteration.
    pub impulse_per_iteration: Vec<f32>,
}

impl SolverStepMetrics {
    pub fn total_impulse(&self) -> f32 {
        self.impulse_per_iteration.iter().sum()
    }

    /// Impulse applied by the last iteration; small values mean the solve converged.
    pub fn final_impulse(&self) -> f32 {
        self.impulse_per_iteration.last().copied().unwrap_or(0.0)
    }

    pub fn merge(&mut self, other: &Self) {
        self.constraints_solved += other.constraints_solved;
        self.iterations = self.iterations.max(other.iterations);
        if self.impulse_per_iteration.len() < other.impulse_per_iteration.len() {
            self.impulse_per_iteration.resize(other.impulse_per_iteration.len(), 0.0);
        }
        let sums = self.impulse_per_iteration.iter_mut();
        for (sum, impulse) in sums.zip(&other.impulse_per_iteration) {
            *sum += impulse;
        }
    }
}

/// Sequential-impulse solver with warm starting.
///
/// Every participating constraint is pre-stepped, warm-started once, then iterated the
/// configured number of times in program order. There is no early exit.
#[derive(Debug, Clone)]
pub struct Solver {
    pub settings: SolverSettings,
    parallel: bool,
    metrics: SolverStepMetrics,
}

impl Solver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            parallel: cfg!(feature = "parallel"),
            metrics: SolverStepMetrics::default(),
        }
    }

    /// Runs the prestep on the rayon pool when the `parallel` feature is on.
    pub fn set_parallel(&mut self, enabled: bool) {
        self.parallel = enabled && cfg!(feature = "parallel");
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn metrics(&self) -> &SolverStepMetrics {
        &self.metrics
    }

    pub fn solve(
        &mut self,
        bodies: &mut Bodies,
        mut constraints: Vec<&mut dyn SolverUpdateable>,
        dt: f32,
    ) {
        let _timer = ScopedTimer::new("solver");
        constraints.retain(|constraint| constraint.state().participates());

        self.prestep(bodies, &mut constraints, dt);
        for constraint in constraints.iter_mut() {
            constraint.exclusive_update(bodies);
        }

        let iterations = self.settings.iterations;
        let mut impulse_per_iteration = Vec::with_capacity(iterations as usize);
        for _ in 0..iterations {
            let impulse: f32 = constraints
                .iter_mut()
                .map(|constraint| constraint.solve_iteration(bodies))
                .sum();
            impulse_per_iteration.push(impulse);
        }

        self.metrics = SolverStepMetrics {
            constraints_solved: constraints.len(),
            iterations,
            impulse_per_iteration,
        };
    }

    fn prestep(&self, bodies: &Bodies, constraints: &mut [&mut dyn SolverUpdateable], dt: f32) {
        #[cfg(feature = "parallel")]
        if self.parallel {
            constraints
                .par_iter_mut()
                .for_each(|constraint| constraint.update(bodies, dt));
            return;
        }

        for constraint in constraints.iter_mut() {
            constraint.update(bodies, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::constraint::{Constraint, SolverUpdateable};
    use crate::dynamics::joints::BallSocketJoint;
    use crate::core::entity::Entity;
    use crate::core::types::{MassProperties, Transform};
    use glam::Vec3;

    #[test]
    fn runs_the_whole_iteration_budget() {
        let mut bodies = Bodies::new();
        let a = bodies.insert(Entity::dynamic(Transform::default(), MassProperties::default()));
        let b = bodies.insert(
            Entity::dynamic(Transform::from_position(Vec3::X * 2.0), MassProperties::default())
                .with_velocity(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO),
        );
        let mut joint = Constraint::from(BallSocketJoint::new(&bodies, a, b, Vec3::X));
        let mut idle = Constraint::from(BallSocketJoint::new(&bodies, a, b, Vec3::X));
        idle.set_enabled(false);

        let mut solver = Solver::new(SolverSettings::default());
        solver.solve(&mut bodies, vec![&mut joint, &mut idle], 1.0 / 60.0);

        let metrics = solver.metrics();
        assert_eq!(metrics.constraints_solved, 1);
        let iterations = SolverSettings::default().iterations as usize;
        assert_eq!(metrics.impulse_per_iteration.len(), iterations);
        assert!(metrics.final_impulse() < metrics.impulse_per_iteration[0]);
    }
}
