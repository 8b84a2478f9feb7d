use serde::{Deserialize, Serialize};

use crate::dynamics::solver::SolverStepMetrics;

/// Counters describing the most recent fixed step.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Fixed steps taken since the world was created.
    pub step_index: u64,
    pub broad_phase_pairs: usize,
    pub pair_handlers: usize,
    pub contacts: usize,
    pub islands: usize,
    pub active_islands: usize,
    pub sleeping_bodies: usize,
    pub step_micros: u64,
    pub solver: SolverStepMetrics,
}

impl StepMetrics {
    /// Constraints and contact manifolds that took part in the solve.
    pub fn constraints_solved(&self) -> usize {
        self.solver.constraints_solved
    }
}
