//! Default constants and explicitly constructed settings objects.
//!
//! Nothing here is global state: a [`WorldConfig`] is built by the caller and handed to the
//! world, which copies the relevant pieces into manifolds and constraints.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Number of sequential-impulse iterations performed per step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 10;

/// A manifold never holds more contacts than this.
pub const MAX_MANIFOLD_CONTACTS: usize = 4;

/// Default damping applied to linear velocity.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.03;

/// Default damping applied to angular velocity.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.15;

/// Padding added to collidable bounds before broad-phase overlap tests.
pub const DEFAULT_BOUNDS_MARGIN: f32 = 0.04;

/// Narrow-phase tolerances used by manifolds and pair testers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Tangential drift beyond which a persisted contact is discarded.
    pub contact_invalidation_length: f32,
    /// Contacts closer than this are merged.
    pub contact_minimum_separation_distance: f32,
    /// Speculative margin; contacts separated by more than this are dropped.
    pub maximum_contact_distance: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            contact_invalidation_length: 0.1,
            contact_minimum_separation_distance: 0.03,
            maximum_contact_distance: 0.1,
        }
    }
}

impl CollisionSettings {
    pub fn contact_invalidation_length_squared(&self) -> f32 {
        self.contact_invalidation_length * self.contact_invalidation_length
    }

    pub fn contact_minimum_separation_distance_squared(&self) -> f32 {
        self.contact_minimum_separation_distance * self.contact_minimum_separation_distance
    }
}

/// Contact response tuning for the sequential-impulse solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub iterations: u32,
    /// Penetration tolerated before positional correction kicks in.
    pub allowed_penetration: f32,
    /// Fraction of excess penetration corrected per second of update rate.
    pub penetration_recovery_stiffness: f32,
    pub maximum_penetration_recovery_speed: f32,
    /// Approach speed required before restitution is applied.
    pub bouncing_velocity_threshold: f32,
    /// Contact softness, scaled by the update rate in the prestep.
    pub contact_softness: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SOLVER_ITERATIONS,
            allowed_penetration: 0.01,
            penetration_recovery_stiffness: 0.2,
            maximum_penetration_recovery_speed: 2.0,
            bouncing_velocity_threshold: 1.0,
            contact_softness: 0.001,
        }
    }
}

/// Sleep policy: an island sleeps once every member stayed below `velocity_lower_limit` for
/// `low_velocity_time_minimum` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeactivationSettings {
    pub enabled: bool,
    pub velocity_lower_limit: f32,
    pub low_velocity_time_minimum: f32,
    /// Island split attempts processed per bookkeeping pass.
    pub max_split_attempts_per_step: usize,
}

impl Default for DeactivationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            velocity_lower_limit: 0.26,
            low_velocity_time_minimum: 1.0,
            max_split_attempts_per_step: 64,
        }
    }
}

impl DeactivationSettings {
    pub fn velocity_lower_limit_squared(&self) -> f32 {
        self.velocity_lower_limit * self.velocity_lower_limit
    }
}

/// Spring-like constraint stiffness expressed as stiffness and damping constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringSettings {
    pub stiffness: f32,
    pub damping: f32,
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self {
            stiffness: 600_000.0,
            damping: 90_000.0,
        }
    }
}

impl SpringSettings {
    /// Returns `(error_reduction, softness)` for the given step.
    pub fn error_reduction_and_softness(&self, dt: f32, update_rate: f32) -> (f32, f32) {
        let multiplier = 1.0 / (dt * self.stiffness + self.damping);
        (self.stiffness * multiplier, update_rate * multiplier)
    }
}

/// How a motor interprets its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MotorMode {
    /// Drive toward a goal velocity.
    #[default]
    VelocityMotor,
    /// Drive toward a goal position or orientation.
    Servomechanism,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityMotorSettings {
    /// Softness of the velocity goal, scaled by the update rate.
    pub softness: f32,
}

impl Default for VelocityMotorSettings {
    fn default() -> Self {
        Self { softness: 0.0001 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoSettings {
    /// Constant correction speed added on top of the spring response.
    pub base_corrective_speed: f32,
    pub max_corrective_velocity: f32,
    pub spring: SpringSettings,
}

impl Default for ServoSettings {
    fn default() -> Self {
        Self {
            base_corrective_speed: 0.0,
            max_corrective_velocity: f32::MAX,
            spring: SpringSettings::default(),
        }
    }
}

/// Shared motor configuration; goals live on the individual motors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorSettings {
    pub mode: MotorMode,
    pub maximum_force: f32,
    pub velocity_motor: VelocityMotorSettings,
    pub servo: ServoSettings,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            mode: MotorMode::VelocityMotor,
            maximum_force: f32::MAX,
            velocity_motor: VelocityMotorSettings::default(),
            servo: ServoSettings::default(),
        }
    }
}

impl MotorSettings {
    pub fn servo() -> Self {
        Self {
            mode: MotorMode::Servomechanism,
            ..Self::default()
        }
    }

    pub fn with_maximum_force(mut self, maximum_force: f32) -> Self {
        self.maximum_force = maximum_force;
        self
    }
}

/// Aggregate configuration handed to [`PhysicsWorld`](crate::world::PhysicsWorld).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: Vec3,
    pub time_step: f32,
    /// Upper bound on fixed steps taken by a single `step` call.
    pub max_steps_per_call: u32,
    pub collision: CollisionSettings,
    pub solver: SolverSettings,
    pub deactivation: DeactivationSettings,
    /// Steps slower than this emit a warning.
    pub step_budget_ms: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::from_array(DEFAULT_GRAVITY),
            time_step: DEFAULT_TIME_STEP,
            max_steps_per_call: 4,
            collision: CollisionSettings::default(),
            solver: SolverSettings::default(),
            deactivation: DeactivationSettings::default(),
            step_budget_ms: 16.0,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(PhysicsError::InvalidConfiguration {
                reason: reason.to_string(),
            })
        };
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return invalid("time_step must be positive and finite");
        }
        if !self.gravity.is_finite() {
            return invalid("gravity must be finite");
        }
        if self.solver.iterations == 0 {
            return invalid("solver.iterations must be at least 1");
        }
        if self.max_steps_per_call == 0 {
            return invalid("max_steps_per_call must be at least 1");
        }
        let collision = &self.collision;
        if collision.contact_invalidation_length < 0.0
            || collision.contact_minimum_separation_distance < 0.0
            || collision.maximum_contact_distance < 0.0
        {
            return invalid("collision distances must be non-negative");
        }
        if self.deactivation.velocity_lower_limit < 0.0
            || self.deactivation.low_velocity_time_minimum < 0.0
        {
            return invalid("deactivation thresholds must be non-negative");
        }
        Ok(())
    }
}
