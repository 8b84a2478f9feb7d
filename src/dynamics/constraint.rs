//! Constraint capability shared by joints, motors, contacts and solver groups.

use glam::{Mat3, Quat, Vec3};

use super::joints::{
    BallSocketJoint, NoRotationJoint, RevoluteAngularJoint, RevoluteLimit, RevoluteMotor,
};
use super::motors::{SingleEntityAngularMotor, SingleEntityLinearMotor};
use super::solver_group::SolverGroup;
use crate::core::bodies::Bodies;
use crate::core::entity::Entity;
use crate::utils::allocator::EntityId;

/// Participation flags every solver item carries.
///
/// `enabled` is owned by the user; `active` is driven by deactivation and turns off when every
/// involved body sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverState {
    pub enabled: bool,
    pub active: bool,
}

impl Default for SolverState {
    fn default() -> Self {
        Self {
            enabled: true,
            active: true,
        }
    }
}

impl SolverState {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            active: true,
        }
    }

    pub fn participates(&self) -> bool {
        self.enabled && self.active
    }
}

/// Lifecycle every solver item implements.
///
/// Per step the solver calls [`update`](Self::update) on everything, then
/// [`exclusive_update`](Self::exclusive_update) once, then
/// [`solve_iteration`](Self::solve_iteration) for the configured number of iterations.
pub trait SolverUpdateable: Send {
    /// Prestep: recompute jacobians, effective masses and biases from the current transforms.
    fn update(&mut self, bodies: &Bodies, dt: f32);

    /// Warm start: apply the impulse accumulated during the previous step.
    fn exclusive_update(&mut self, bodies: &mut Bodies);

    /// Applies one incremental impulse and returns its magnitude.
    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32;

    /// Appends every entity this item touches.
    fn involved_entities(&self, out: &mut Vec<EntityId>);

    fn state(&self) -> &SolverState;

    fn state_mut(&mut self) -> &mut SolverState;

    fn is_active(&self) -> bool {
        self.state().active
    }

    fn set_active(&mut self, active: bool) {
        self.state_mut().active = active;
    }

    fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.state_mut().enabled = enabled;
    }
}

/// Read-only view of a body used during the prestep. Missing bodies read as immovable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodySnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub inverse_mass: f32,
    pub inverse_inertia: Mat3,
}

impl BodySnapshot {
    pub fn of(bodies: &Bodies, id: EntityId) -> Self {
        match bodies.get(id) {
            Some(entity) => Self {
                position: entity.transform.position,
                rotation: entity.transform.rotation,
                inverse_mass: entity.inverse_mass(),
                inverse_inertia: entity.inverse_inertia(),
            },
            None => Self {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                inverse_mass: 0.0,
                inverse_inertia: Mat3::ZERO,
            },
        }
    }
}

/// Runs `f` with both bodies of a two-entity constraint.
pub(crate) fn with_pair<R: Default>(
    bodies: &mut Bodies,
    a: EntityId,
    b: EntityId,
    f: impl FnOnce(&mut Entity, &mut Entity) -> R,
) -> R {
    match bodies.get2_mut(a, b) {
        Some((entity_a, entity_b)) => f(entity_a, entity_b),
        None => R::default(),
    }
}

/// Every user-registered constraint. Contacts are owned by pair handlers instead.
#[derive(Debug, Clone)]
pub enum Constraint {
    BallSocket(BallSocketJoint),
    NoRotation(NoRotationJoint),
    RevoluteAngular(RevoluteAngularJoint),
    RevoluteLimit(RevoluteLimit),
    RevoluteMotor(RevoluteMotor),
    LinearMotor(SingleEntityLinearMotor),
    AngularMotor(SingleEntityAngularMotor),
    Group(SolverGroup),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Constraint::BallSocket($inner) => $body,
            Constraint::NoRotation($inner) => $body,
            Constraint::RevoluteAngular($inner) => $body,
            Constraint::RevoluteLimit($inner) => $body,
            Constraint::RevoluteMotor($inner) => $body,
            Constraint::LinearMotor($inner) => $body,
            Constraint::AngularMotor($inner) => $body,
            Constraint::Group($inner) => $body,
        }
    };
}

impl SolverUpdateable for Constraint {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        dispatch!(self, c => c.update(bodies, dt))
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        dispatch!(self, c => c.exclusive_update(bodies))
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        dispatch!(self, c => c.solve_iteration(bodies))
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        dispatch!(self, c => c.involved_entities(out))
    }

    fn state(&self) -> &SolverState {
        dispatch!(self, c => c.state())
    }

    fn state_mut(&mut self) -> &mut SolverState {
        dispatch!(self, c => c.state_mut())
    }

    fn set_active(&mut self, active: bool) {
        // Groups cascade to their members.
        dispatch!(self, c => c.set_active(active))
    }

    fn set_enabled(&mut self, enabled: bool) {
        dispatch!(self, c => c.set_enabled(enabled))
    }
}

impl Constraint {
    /// Entities this constraint touches, deduplicated.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities = Vec::new();
        self.involved_entities(&mut entities);
        entities.sort_unstable();
        entities.dedup();
        entities
    }

    /// Short name used in log lines.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::BallSocket(_) => "ball_socket",
            Constraint::NoRotation(_) => "no_rotation",
            Constraint::RevoluteAngular(_) => "revolute_angular",
            Constraint::RevoluteLimit(_) => "revolute_limit",
            Constraint::RevoluteMotor(_) => "revolute_motor",
            Constraint::LinearMotor(_) => "linear_motor",
            Constraint::AngularMotor(_) => "angular_motor",
            Constraint::Group(_) => "solver_group",
        }
    }
}

impl From<BallSocketJoint> for Constraint {
    fn from(joint: BallSocketJoint) -> Self {
        Constraint::BallSocket(joint)
    }
}

impl From<NoRotationJoint> for Constraint {
    fn from(joint: NoRotationJoint) -> Self {
        Constraint::NoRotation(joint)
    }
}

impl From<RevoluteAngularJoint> for Constraint {
    fn from(joint: RevoluteAngularJoint) -> Self {
        Constraint::RevoluteAngular(joint)
    }
}

impl From<RevoluteLimit> for Constraint {
    fn from(limit: RevoluteLimit) -> Self {
        Constraint::RevoluteLimit(limit)
    }
}

impl From<RevoluteMotor> for Constraint {
    fn from(motor: RevoluteMotor) -> Self {
        Constraint::RevoluteMotor(motor)
    }
}

impl From<SingleEntityLinearMotor> for Constraint {
    fn from(motor: SingleEntityLinearMotor) -> Self {
        Constraint::LinearMotor(motor)
    }
}

impl From<SingleEntityAngularMotor> for Constraint {
    fn from(motor: SingleEntityAngularMotor) -> Self {
        Constraint::AngularMotor(motor)
    }
}

impl From<SolverGroup> for Constraint {
    fn from(group: SolverGroup) -> Self {
        Constraint::Group(group)
    }
}
