//! Motors acting on a single entity against the inertial frame.

use glam::{Mat3, Quat, Vec3};

use super::constraint::{BodySnapshot, SolverState, SolverUpdateable};
use super::joints::servo_bias;
use crate::config::{MotorMode, MotorSettings};
use crate::core::bodies::Bodies;
use crate::utils::allocator::EntityId;
use crate::utils::math::{clamp_length3, invert_or_zero3, manhattan, rotation_vector, skew};

/// [`servo_bias`] applied along the direction of a vector error.
fn servo_bias_along(settings: &MotorSettings, error: Vec3, dt: f32) -> (Vec3, f32) {
    let distance = error.length();
    let (speed, softness) = servo_bias(settings, distance, dt);
    if speed == 0.0 {
        return (Vec3::ZERO, softness);
    }
    (error * (speed / distance), softness)
}

/// Drives the velocity of a point on an entity, or the point itself toward a goal position.
#[derive(Debug, Clone)]
pub struct SingleEntityLinearMotor {
    entity: EntityId,
    /// Driven point in the entity's local frame.
    pub local_point: Vec3,
    pub settings: MotorSettings,
    pub goal_velocity: Vec3,
    pub goal_position: Vec3,
    state: SolverState,
    r: Vec3,
    error: Vec3,
    bias: Vec3,
    softness: f32,
    effective_mass: Mat3,
    max_impulse: f32,
    accumulated_impulse: Vec3,
}

impl SingleEntityLinearMotor {
    pub fn new(entity: EntityId, local_point: Vec3, settings: MotorSettings) -> Self {
        Self {
            entity,
            local_point,
            settings,
            goal_velocity: Vec3::ZERO,
            goal_position: Vec3::ZERO,
            state: SolverState::default(),
            r: Vec3::ZERO,
            error: Vec3::ZERO,
            bias: Vec3::ZERO,
            softness: 0.0,
            effective_mass: Mat3::ZERO,
            max_impulse: 0.0,
            accumulated_impulse: Vec3::ZERO,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn set_entity(&mut self, entity: EntityId) {
        self.entity = entity;
        self.accumulated_impulse = Vec3::ZERO;
    }

    pub fn accumulated_impulse(&self) -> Vec3 {
        self.accumulated_impulse
    }

    /// Offset from the driven point to the goal position at the last prestep.
    pub fn error(&self) -> Vec3 {
        self.error
    }
}

impl SolverUpdateable for SingleEntityLinearMotor {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let body = BodySnapshot::of(bodies, self.entity);
        self.r = body.rotation * self.local_point;
        self.error = self.goal_position - (body.position + self.r);

        let (bias, softness) = match self.settings.mode {
            MotorMode::VelocityMotor => {
                (self.goal_velocity, self.settings.velocity_motor.softness / dt)
            }
            MotorMode::Servomechanism => servo_bias_along(&self.settings, self.error, dt),
        };
        self.bias = bias;
        self.softness = softness;
        self.max_impulse = self.settings.maximum_force * dt;

        let skew_r = skew(self.r);
        let k = Mat3::from_diagonal(Vec3::splat(body.inverse_mass + softness))
            - skew_r * body.inverse_inertia * skew_r;
        self.effective_mass = invert_or_zero3(k);
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        if let Some(entity) = bodies.get_mut(self.entity) {
            entity.apply_linear_impulse(self.accumulated_impulse);
            entity.apply_angular_impulse(self.r.cross(self.accumulated_impulse));
        }
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let Some(entity) = bodies.get_mut(self.entity) else {
            return 0.0;
        };
        let velocity = entity.velocity.at_offset(self.r);
        let unclamped = self.effective_mass
            * (self.bias - velocity - self.accumulated_impulse * self.softness);
        let previous = self.accumulated_impulse;
        self.accumulated_impulse = clamp_length3(previous + unclamped, self.max_impulse);
        let lambda = self.accumulated_impulse - previous;

        entity.apply_linear_impulse(lambda);
        entity.apply_angular_impulse(self.r.cross(lambda));
        manhattan(lambda)
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.push(self.entity);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}

/// Drives the angular velocity of an entity, or its orientation toward a goal.
#[derive(Debug, Clone)]
pub struct SingleEntityAngularMotor {
    entity: EntityId,
    pub settings: MotorSettings,
    pub goal_velocity: Vec3,
    pub goal_orientation: Quat,
    state: SolverState,
    error: Vec3,
    bias: Vec3,
    softness: f32,
    effective_mass: Mat3,
    max_impulse: f32,
    accumulated_impulse: Vec3,
}

impl SingleEntityAngularMotor {
    pub fn new(entity: EntityId, settings: MotorSettings) -> Self {
        Self {
            entity,
            settings,
            goal_velocity: Vec3::ZERO,
            goal_orientation: Quat::IDENTITY,
            state: SolverState::default(),
            error: Vec3::ZERO,
            bias: Vec3::ZERO,
            softness: 0.0,
            effective_mass: Mat3::ZERO,
            max_impulse: 0.0,
            accumulated_impulse: Vec3::ZERO,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn set_entity(&mut self, entity: EntityId) {
        self.entity = entity;
        self.accumulated_impulse = Vec3::ZERO;
    }

    pub fn accumulated_impulse(&self) -> Vec3 {
        self.accumulated_impulse
    }

    /// Rotation vector from the current orientation to the goal at the last prestep.
    pub fn error(&self) -> Vec3 {
        self.error
    }
}

impl SolverUpdateable for SingleEntityAngularMotor {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let body = BodySnapshot::of(bodies, self.entity);
        self.error = rotation_vector(self.goal_orientation * body.rotation.inverse());

        let (bias, softness) = match self.settings.mode {
            MotorMode::VelocityMotor => {
                (self.goal_velocity, self.settings.velocity_motor.softness / dt)
            }
            MotorMode::Servomechanism => servo_bias_along(&self.settings, self.error, dt),
        };
        self.bias = bias;
        self.softness = softness;
        self.max_impulse = self.settings.maximum_force * dt;
        self.effective_mass =
            invert_or_zero3(body.inverse_inertia + Mat3::from_diagonal(Vec3::splat(softness)));
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        if let Some(entity) = bodies.get_mut(self.entity) {
            entity.apply_angular_impulse(self.accumulated_impulse);
        }
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let Some(entity) = bodies.get_mut(self.entity) else {
            return 0.0;
        };
        let unclamped = self.effective_mass
            * (self.bias - entity.velocity.angular - self.accumulated_impulse * self.softness);
        let previous = self.accumulated_impulse;
        self.accumulated_impulse = clamp_length3(previous + unclamped, self.max_impulse);
        let lambda = self.accumulated_impulse - previous;
        entity.apply_angular_impulse(lambda);
        manhattan(lambda)
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.push(self.entity);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}
