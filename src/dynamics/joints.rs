//! Two-entity joints solved with sequential impulses.
//!
//! Every joint follows the same recipe: the prestep rebuilds the jacobian and effective mass from
//! the current transforms and turns the positional error into a bias velocity through its
//! [`SpringSettings`]; each iteration solves for the impulse that drives the relative velocity
//! to the bias, softened by the accumulated impulse.

use glam::{Mat2, Mat3, Quat, Vec2, Vec3};

use super::constraint::{with_pair, BodySnapshot, SolverState, SolverUpdateable};
use crate::config::{MotorMode, MotorSettings, SpringSettings};
use crate::core::bodies::Bodies;
use crate::core::entity::Entity;
use crate::utils::allocator::EntityId;
use crate::utils::math::{
    invert_or_zero2, invert_or_zero3, manhattan, normalize_or, perpendicular, rotation_vector, skew,
    wrap_angle, BIG_EPSILON,
};

fn apply_linear_pair(a: &mut Entity, b: &mut Entity, impulse: Vec3, r_a: Vec3, r_b: Vec3) {
    b.apply_linear_impulse(impulse);
    b.apply_angular_impulse(r_b.cross(impulse));
    a.apply_linear_impulse(-impulse);
    a.apply_angular_impulse(-r_a.cross(impulse));
}

fn apply_angular_pair(a: &mut Entity, b: &mut Entity, impulse: Vec3) {
    b.apply_angular_impulse(impulse);
    a.apply_angular_impulse(-impulse);
}

fn local_point(bodies: &Bodies, entity: EntityId, world: Vec3) -> Vec3 {
    let snapshot = BodySnapshot::of(bodies, entity);
    snapshot.rotation.inverse() * (world - snapshot.position)
}

fn local_direction(bodies: &Bodies, entity: EntityId, world: Vec3) -> Vec3 {
    BodySnapshot::of(bodies, entity).rotation.inverse() * world
}

/// Keeps an anchor on A and an anchor on B coincident (3 linear DOF).
#[derive(Debug, Clone)]
pub struct BallSocketJoint {
    entity_a: EntityId,
    entity_b: EntityId,
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    pub spring: SpringSettings,
    state: SolverState,
    r_a: Vec3,
    r_b: Vec3,
    error: Vec3,
    bias: Vec3,
    softness: f32,
    effective_mass: Mat3,
    accumulated_impulse: Vec3,
}

impl BallSocketJoint {
    /// Connects both entities at the world-space `anchor`.
    pub fn new(bodies: &Bodies, entity_a: EntityId, entity_b: EntityId, anchor: Vec3) -> Self {
        Self::from_local(
            entity_a,
            entity_b,
            local_point(bodies, entity_a, anchor),
            local_point(bodies, entity_b, anchor),
        )
    }

    pub fn from_local(
        entity_a: EntityId,
        entity_b: EntityId,
        local_anchor_a: Vec3,
        local_anchor_b: Vec3,
    ) -> Self {
        Self {
            entity_a,
            entity_b,
            local_anchor_a,
            local_anchor_b,
            spring: SpringSettings::default(),
            state: SolverState::default(),
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            error: Vec3::ZERO,
            bias: Vec3::ZERO,
            softness: 0.0,
            effective_mass: Mat3::ZERO,
            accumulated_impulse: Vec3::ZERO,
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.entity_a, self.entity_b)
    }

    /// Rebinds the joint. Warm-start data belongs to the old pair and is discarded.
    pub fn set_entities(&mut self, entity_a: EntityId, entity_b: EntityId) {
        self.entity_a = entity_a;
        self.entity_b = entity_b;
        self.accumulated_impulse = Vec3::ZERO;
    }

    pub fn accumulated_impulse(&self) -> Vec3 {
        self.accumulated_impulse
    }

    /// Separation of the anchors measured by the last prestep.
    pub fn error(&self) -> Vec3 {
        self.error
    }
}

impl SolverUpdateable for BallSocketJoint {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let a = BodySnapshot::of(bodies, self.entity_a);
        let b = BodySnapshot::of(bodies, self.entity_b);
        self.r_a = a.rotation * self.local_anchor_a;
        self.r_b = b.rotation * self.local_anchor_b;
        self.error = (b.position + self.r_b) - (a.position + self.r_a);

        let (error_reduction, softness) = self.spring.error_reduction_and_softness(dt, 1.0 / dt);
        self.bias = -self.error * error_reduction;
        self.softness = softness;

        let skew_a = skew(self.r_a);
        let skew_b = skew(self.r_b);
        let linear = Mat3::from_diagonal(Vec3::splat(a.inverse_mass + b.inverse_mass + softness));
        let k = linear - skew_a * a.inverse_inertia * skew_a - skew_b * b.inverse_inertia * skew_b;
        self.effective_mass = invert_or_zero3(k);
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        let (impulse, r_a, r_b) = (self.accumulated_impulse, self.r_a, self.r_b);
        with_pair(bodies, self.entity_a, self.entity_b, |a, b| {
            apply_linear_pair(a, b, impulse, r_a, r_b)
        });
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let (r_a, r_b) = (self.r_a, self.r_b);
        let target = self.bias - self.accumulated_impulse * self.softness;
        let effective_mass = self.effective_mass;
        let lambda = with_pair(bodies, self.entity_a, self.entity_b, |a, b| {
            let relative = b.velocity.at_offset(r_b) - a.velocity.at_offset(r_a);
            let lambda = effective_mass * (target - relative);
            apply_linear_pair(a, b, lambda, r_a, r_b);
            lambda
        });
        self.accumulated_impulse += lambda;
        manhattan(lambda)
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.extend([self.entity_a, self.entity_b]);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}

/// Locks the relative orientation of two entities (3 angular DOF).
#[derive(Debug, Clone)]
pub struct NoRotationJoint {
    entity_a: EntityId,
    entity_b: EntityId,
    /// Orientation of B expressed in A's frame that the joint maintains.
    pub relative_orientation: Quat,
    pub spring: SpringSettings,
    state: SolverState,
    error: Vec3,
    bias: Vec3,
    softness: f32,
    effective_mass: Mat3,
    accumulated_impulse: Vec3,
}

impl NoRotationJoint {
    /// Preserves the relative orientation the entities have right now.
    pub fn new(bodies: &Bodies, entity_a: EntityId, entity_b: EntityId) -> Self {
        let a = BodySnapshot::of(bodies, entity_a);
        let b = BodySnapshot::of(bodies, entity_b);
        Self::with_relative_orientation(entity_a, entity_b, a.rotation.inverse() * b.rotation)
    }

    pub fn with_relative_orientation(
        entity_a: EntityId,
        entity_b: EntityId,
        relative_orientation: Quat,
    ) -> Self {
        Self {
            entity_a,
            entity_b,
            relative_orientation,
            spring: SpringSettings::default(),
            state: SolverState::default(),
            error: Vec3::ZERO,
            bias: Vec3::ZERO,
            softness: 0.0,
            effective_mass: Mat3::ZERO,
            accumulated_impulse: Vec3::ZERO,
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.entity_a, self.entity_b)
    }

    pub fn set_entities(&mut self, entity_a: EntityId, entity_b: EntityId) {
        self.entity_a = entity_a;
        self.entity_b = entity_b;
        self.accumulated_impulse = Vec3::ZERO;
    }

    pub fn accumulated_impulse(&self) -> Vec3 {
        self.accumulated_impulse
    }

    /// Rotation vector taking the target orientation of B to its actual one.
    pub fn error(&self) -> Vec3 {
        self.error
    }
}

impl SolverUpdateable for NoRotationJoint {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let a = BodySnapshot::of(bodies, self.entity_a);
        let b = BodySnapshot::of(bodies, self.entity_b);
        let target = a.rotation * self.relative_orientation;
        self.error = rotation_vector(b.rotation * target.inverse());

        let (error_reduction, softness) = self.spring.error_reduction_and_softness(dt, 1.0 / dt);
        self.bias = -self.error * error_reduction;
        self.softness = softness;
        let k = a.inverse_inertia + b.inverse_inertia + Mat3::from_diagonal(Vec3::splat(softness));
        self.effective_mass = invert_or_zero3(k);
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        let impulse = self.accumulated_impulse;
        with_pair(bodies, self.entity_a, self.entity_b, |a, b| apply_angular_pair(a, b, impulse));
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let target = self.bias - self.accumulated_impulse * self.softness;
        let effective_mass = self.effective_mass;
        let lambda = with_pair(bodies, self.entity_a, self.entity_b, |a, b| {
            let relative = b.velocity.angular - a.velocity.angular;
            let lambda = effective_mass * (target - relative);
            apply_angular_pair(a, b, lambda);
            lambda
        });
        self.accumulated_impulse += lambda;
        manhattan(lambda)
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.extend([self.entity_a, self.entity_b]);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}

/// Keeps a free axis on A aligned with a free axis on B, leaving rotation about it (2 angular DOF).
#[derive(Debug, Clone)]
pub struct RevoluteAngularJoint {
    entity_a: EntityId,
    entity_b: EntityId,
    pub local_axis_a: Vec3,
    pub local_axis_b: Vec3,
    pub spring: SpringSettings,
    state: SolverState,
    constrained_axes: [Vec3; 2],
    error: Vec3,
    bias: Vec2,
    softness: f32,
    effective_mass: Mat2,
    accumulated_impulse: Vec2,
}

impl RevoluteAngularJoint {
    /// Free axis given in world space; both entities share it at construction.
    pub fn new(bodies: &Bodies, entity_a: EntityId, entity_b: EntityId, free_axis: Vec3) -> Self {
        let axis = normalize_or(free_axis, Vec3::Y);
        Self::from_local(
            entity_a,
            entity_b,
            local_direction(bodies, entity_a, axis),
            local_direction(bodies, entity_b, axis),
        )
    }

    pub fn from_local(
        entity_a: EntityId,
        entity_b: EntityId,
        local_axis_a: Vec3,
        local_axis_b: Vec3,
    ) -> Self {
        Self {
            entity_a,
            entity_b,
            local_axis_a: normalize_or(local_axis_a, Vec3::Y),
            local_axis_b: normalize_or(local_axis_b, Vec3::Y),
            spring: SpringSettings::default(),
            state: SolverState::default(),
            constrained_axes: [Vec3::X, Vec3::Z],
            error: Vec3::ZERO,
            bias: Vec2::ZERO,
            softness: 0.0,
            effective_mass: Mat2::ZERO,
            accumulated_impulse: Vec2::ZERO,
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.entity_a, self.entity_b)
    }

    pub fn set_entities(&mut self, entity_a: EntityId, entity_b: EntityId) {
        self.entity_a = entity_a;
        self.entity_b = entity_b;
        self.accumulated_impulse = Vec2::ZERO;
    }

    /// Misalignment of the two free axes measured by the last prestep.
    pub fn error(&self) -> Vec3 {
        self.error
    }

    fn world_impulse(&self, impulse: Vec2) -> Vec3 {
        self.constrained_axes[0] * impulse.x + self.constrained_axes[1] * impulse.y
    }
}

impl SolverUpdateable for RevoluteAngularJoint {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let a = BodySnapshot::of(bodies, self.entity_a);
        let b = BodySnapshot::of(bodies, self.entity_b);
        let axis_a = a.rotation * self.local_axis_a;
        let axis_b = b.rotation * self.local_axis_b;

        // Carry the warm-start impulse over into this step's basis.
        let previous = self.world_impulse(self.accumulated_impulse);
        let first = perpendicular(axis_a);
        let second = axis_a.cross(first);
        self.constrained_axes = [first, second];
        self.accumulated_impulse = Vec2::new(previous.dot(first), previous.dot(second));

        self.error = axis_a.cross(axis_b);
        let (error_reduction, softness) = self.spring.error_reduction_and_softness(dt, 1.0 / dt);
        self.bias = -Vec2::new(self.error.dot(first), self.error.dot(second)) * error_reduction;
        self.softness = softness;

        let inertia = a.inverse_inertia + b.inverse_inertia;
        let k00 = first.dot(inertia * first) + softness;
        let k01 = first.dot(inertia * second);
        let k11 = second.dot(inertia * second) + softness;
        self.effective_mass =
            invert_or_zero2(Mat2::from_cols(Vec2::new(k00, k01), Vec2::new(k01, k11)));
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        let impulse = self.world_impulse(self.accumulated_impulse);
        with_pair(bodies, self.entity_a, self.entity_b, |a, b| apply_angular_pair(a, b, impulse));
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let [first, second] = self.constrained_axes;
        let target = self.bias - self.accumulated_impulse * self.softness;
        let effective_mass = self.effective_mass;
        let lambda = with_pair(bodies, self.entity_a, self.entity_b, |a, b| {
            let relative = b.velocity.angular - a.velocity.angular;
            let velocity = Vec2::new(relative.dot(first), relative.dot(second));
            let lambda = effective_mass * (target - velocity);
            apply_angular_pair(a, b, first * lambda.x + second * lambda.y);
            lambda
        });
        self.accumulated_impulse += lambda;
        lambda.x.abs() + lambda.y.abs()
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.extend([self.entity_a, self.entity_b]);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}

/// Measurement frame for the angle of B about a hinge fixed in A.
///
/// The angle is `atan2` of B's test axis projected onto A's measurement plane, zero in the pose
/// the frame was built in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeFrame {
    pub local_hinge_a: Vec3,
    pub local_x_a: Vec3,
    pub local_y_a: Vec3,
    pub local_test_axis_b: Vec3,
}

impl HingeFrame {
    pub fn new(bodies: &Bodies, entity_a: EntityId, entity_b: EntityId, hinge: Vec3) -> Self {
        let hinge = normalize_or(hinge, Vec3::Y);
        let x = perpendicular(hinge);
        let y = hinge.cross(x);
        Self {
            local_hinge_a: local_direction(bodies, entity_a, hinge),
            local_x_a: local_direction(bodies, entity_a, x),
            local_y_a: local_direction(bodies, entity_a, y),
            local_test_axis_b: local_direction(bodies, entity_b, x),
        }
    }

    /// World hinge axis and the current angle of B about it.
    fn measure(&self, a: &BodySnapshot, b: &BodySnapshot) -> (Vec3, f32) {
        let hinge = a.rotation * self.local_hinge_a;
        let x = a.rotation * self.local_x_a;
        let y = a.rotation * self.local_y_a;
        let test = b.rotation * self.local_test_axis_b;
        (hinge, test.dot(y).atan2(test.dot(x)))
    }
}

/// Keeps the hinge angle within `[minimum, maximum]`; pushes only, never pulls.
#[derive(Debug, Clone)]
pub struct RevoluteLimit {
    entity_a: EntityId,
    entity_b: EntityId,
    pub frame: HingeFrame,
    minimum: f32,
    maximum: f32,
    pub spring: SpringSettings,
    state: SolverState,
    angle: f32,
    jacobian: Vec3,
    bias: f32,
    softness: f32,
    effective_mass: f32,
    accumulated_impulse: f32,
}

impl RevoluteLimit {
    pub fn new(
        frame: HingeFrame,
        entity_a: EntityId,
        entity_b: EntityId,
        minimum: f32,
        maximum: f32,
    ) -> Self {
        let (minimum, maximum) = (minimum.min(maximum), minimum.max(maximum));
        Self {
            entity_a,
            entity_b,
            frame,
            minimum,
            maximum,
            spring: SpringSettings::default(),
            state: SolverState::default(),
            angle: 0.0,
            jacobian: Vec3::ZERO,
            bias: 0.0,
            softness: 0.0,
            effective_mass: 0.0,
            accumulated_impulse: 0.0,
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.entity_a, self.entity_b)
    }

    pub fn set_entities(&mut self, entity_a: EntityId, entity_b: EntityId) {
        self.entity_a = entity_a;
        self.entity_b = entity_b;
        self.accumulated_impulse = 0.0;
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.minimum, self.maximum)
    }

    pub fn set_limits(&mut self, minimum: f32, maximum: f32) {
        self.minimum = minimum.min(maximum);
        self.maximum = minimum.max(maximum);
    }

    /// Hinge angle measured by the last prestep.
    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl SolverUpdateable for RevoluteLimit {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let a = BodySnapshot::of(bodies, self.entity_a);
        let b = BodySnapshot::of(bodies, self.entity_b);
        let (hinge, angle) = self.frame.measure(&a, &b);
        self.angle = angle;

        // Guard the nearer bound. Positive error means the bound is violated.
        let (jacobian, error) = if angle - self.minimum < self.maximum - angle {
            (hinge, self.minimum - angle)
        } else {
            (-hinge, angle - self.maximum)
        };
        if jacobian.dot(self.jacobian) < 0.0 {
            self.accumulated_impulse = 0.0;
        }
        self.jacobian = jacobian;

        let (error_reduction, softness) = self.spring.error_reduction_and_softness(dt, 1.0 / dt);
        self.bias = if error > 0.0 { error * error_reduction } else { error / dt };
        self.softness = softness;
        let k = jacobian.dot((a.inverse_inertia + b.inverse_inertia) * jacobian) + softness;
        self.effective_mass = if k > 0.0 { 1.0 / k } else { 0.0 };
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        let impulse = self.jacobian * self.accumulated_impulse;
        with_pair(bodies, self.entity_a, self.entity_b, |a, b| apply_angular_pair(a, b, impulse));
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let jacobian = self.jacobian;
        let (bias, softness, effective_mass) = (self.bias, self.softness, self.effective_mass);
        let accumulated = self.accumulated_impulse;
        let lambda = with_pair(bodies, self.entity_a, self.entity_b, |a, b| {
            let velocity = (b.velocity.angular - a.velocity.angular).dot(jacobian);
            let unclamped = effective_mass * (bias - velocity - softness * accumulated);
            let lambda = (accumulated + unclamped).max(0.0) - accumulated;
            apply_angular_pair(a, b, jacobian * lambda);
            lambda
        });
        self.accumulated_impulse += lambda;
        lambda.abs()
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.extend([self.entity_a, self.entity_b]);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}

/// Bias velocity for a servo with positional `error`, shared by every servo-mode motor.
pub(crate) fn servo_bias(settings: &MotorSettings, error: f32, dt: f32) -> (f32, f32) {
    let servo = &settings.servo;
    let (error_reduction, softness) = servo.spring.error_reduction_and_softness(dt, 1.0 / dt);
    if error.abs() < BIG_EPSILON {
        return (0.0, softness);
    }
    let approach = servo.base_corrective_speed.min(error.abs() / dt);
    let bias = error.signum() * approach + error * error_reduction;
    (bias.clamp(-servo.max_corrective_velocity, servo.max_corrective_velocity), softness)
}

/// Drives the hinge angle or angular speed of B relative to A.
#[derive(Debug, Clone)]
pub struct RevoluteMotor {
    entity_a: EntityId,
    entity_b: EntityId,
    pub frame: HingeFrame,
    pub settings: MotorSettings,
    /// Target relative angular speed about the hinge in velocity mode.
    pub goal_velocity: f32,
    /// Target hinge angle in servo mode.
    pub goal_angle: f32,
    state: SolverState,
    angle: f32,
    hinge: Vec3,
    bias: f32,
    softness: f32,
    effective_mass: f32,
    max_impulse: f32,
    accumulated_impulse: f32,
}

impl RevoluteMotor {
    pub fn new(
        frame: HingeFrame,
        entity_a: EntityId,
        entity_b: EntityId,
        settings: MotorSettings,
    ) -> Self {
        Self {
            entity_a,
            entity_b,
            frame,
            settings,
            goal_velocity: 0.0,
            goal_angle: 0.0,
            state: SolverState::default(),
            angle: 0.0,
            hinge: Vec3::ZERO,
            bias: 0.0,
            softness: 0.0,
            effective_mass: 0.0,
            max_impulse: 0.0,
            accumulated_impulse: 0.0,
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.entity_a, self.entity_b)
    }

    pub fn set_entities(&mut self, entity_a: EntityId, entity_b: EntityId) {
        self.entity_a = entity_a;
        self.entity_b = entity_b;
        self.accumulated_impulse = 0.0;
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn accumulated_impulse(&self) -> f32 {
        self.accumulated_impulse
    }
}

impl SolverUpdateable for RevoluteMotor {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        let a = BodySnapshot::of(bodies, self.entity_a);
        let b = BodySnapshot::of(bodies, self.entity_b);
        let (hinge, angle) = self.frame.measure(&a, &b);
        self.hinge = hinge;
        self.angle = angle;

        let (bias, softness) = match self.settings.mode {
            MotorMode::VelocityMotor => {
                (self.goal_velocity, self.settings.velocity_motor.softness / dt)
            }
            MotorMode::Servomechanism => {
                servo_bias(&self.settings, wrap_angle(self.goal_angle - angle), dt)
            }
        };
        self.bias = bias;
        self.softness = softness;
        self.max_impulse = self.settings.maximum_force * dt;
        let k = hinge.dot((a.inverse_inertia + b.inverse_inertia) * hinge) + softness;
        self.effective_mass = if k > 0.0 { 1.0 / k } else { 0.0 };
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        let impulse = self.hinge * self.accumulated_impulse;
        with_pair(bodies, self.entity_a, self.entity_b, |a, b| apply_angular_pair(a, b, impulse));
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        let hinge = self.hinge;
        let (bias, softness, effective_mass) = (self.bias, self.softness, self.effective_mass);
        let (accumulated, max_impulse) = (self.accumulated_impulse, self.max_impulse);
        let lambda = with_pair(bodies, self.entity_a, self.entity_b, |a, b| {
            let velocity = (b.velocity.angular - a.velocity.angular).dot(hinge);
            let unclamped = effective_mass * (bias - velocity - softness * accumulated);
            let lambda = (accumulated + unclamped).clamp(-max_impulse, max_impulse) - accumulated;
            apply_angular_pair(a, b, hinge * lambda);
            lambda
        });
        self.accumulated_impulse += lambda;
        lambda.abs()
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        out.extend([self.entity_a, self.entity_b]);
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }
}
