use glam::Vec3;

use super::constraint::{Constraint, SolverState, SolverUpdateable};
use super::joints::{
    BallSocketJoint, HingeFrame, NoRotationJoint, RevoluteAngularJoint, RevoluteLimit,
    RevoluteMotor,
};
use crate::config::MotorSettings;
use crate::core::bodies::Bodies;
use crate::utils::allocator::EntityId;

/// Which preset built a group, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Custom,
    /// Ball-socket plus no-rotation: the entities move as one.
    Weld,
    /// Ball-socket, revolute angular, limit and motor around one hinge.
    Revolute,
}

/// Several constraints solved as one logical joint.
///
/// Lifecycle calls are forwarded to the members in order. Members keep their own enabled flag,
/// so a revolute joint's limit and motor can be switched on separately; activity cascades.
#[derive(Debug, Clone)]
pub struct SolverGroup {
    kind: GroupKind,
    members: Vec<Constraint>,
    state: SolverState,
}

impl SolverGroup {
    pub fn new(members: Vec<Constraint>) -> Self {
        Self {
            kind: GroupKind::Custom,
            members,
            state: SolverState::default(),
        }
    }

    /// Rigidly attaches B to A at the world-space `anchor`.
    pub fn weld(bodies: &Bodies, entity_a: EntityId, entity_b: EntityId, anchor: Vec3) -> Self {
        Self {
            kind: GroupKind::Weld,
            members: vec![
                BallSocketJoint::new(bodies, entity_a, entity_b, anchor).into(),
                NoRotationJoint::new(bodies, entity_a, entity_b).into(),
            ],
            state: SolverState::default(),
        }
    }

    /// Hinge through the world-space `anchor` about `axis`. The limit and motor start disabled.
    pub fn revolute(
        bodies: &Bodies,
        entity_a: EntityId,
        entity_b: EntityId,
        anchor: Vec3,
        axis: Vec3,
    ) -> Self {
        let frame = HingeFrame::new(bodies, entity_a, entity_b, axis);
        let mut limit = RevoluteLimit::new(
            frame,
            entity_a,
            entity_b,
            -std::f32::consts::PI,
            std::f32::consts::PI,
        );
        limit.set_enabled(false);
        let mut motor = RevoluteMotor::new(frame, entity_a, entity_b, MotorSettings::default());
        motor.set_enabled(false);

        Self {
            kind: GroupKind::Revolute,
            members: vec![
                BallSocketJoint::new(bodies, entity_a, entity_b, anchor).into(),
                RevoluteAngularJoint::new(bodies, entity_a, entity_b, axis).into(),
                limit.into(),
                motor.into(),
            ],
            state: SolverState::default(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn members(&self) -> &[Constraint] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Constraint] {
        &mut self.members
    }

    pub fn push(&mut self, member: impl Into<Constraint>) {
        let mut member = member.into();
        member.set_active(self.state.active);
        self.members.push(member);
    }

    pub fn ball_socket_mut(&mut self) -> Option<&mut BallSocketJoint> {
        self.members.iter_mut().find_map(|member| match member {
            Constraint::BallSocket(joint) => Some(joint),
            _ => None,
        })
    }

    pub fn revolute_limit_mut(&mut self) -> Option<&mut RevoluteLimit> {
        self.members.iter_mut().find_map(|member| match member {
            Constraint::RevoluteLimit(limit) => Some(limit),
            _ => None,
        })
    }

    pub fn revolute_motor_mut(&mut self) -> Option<&mut RevoluteMotor> {
        self.members.iter_mut().find_map(|member| match member {
            Constraint::RevoluteMotor(motor) => Some(motor),
            _ => None,
        })
    }
}

impl SolverUpdateable for SolverGroup {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        for member in self.members.iter_mut().filter(|m| m.state().participates()) {
            member.update(bodies, dt);
        }
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        for member in self.members.iter_mut().filter(|m| m.state().participates()) {
            member.exclusive_update(bodies);
        }
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        self.members
            .iter_mut()
            .filter(|m| m.state().participates())
            .map(|member| member.solve_iteration(bodies))
            .sum()
    }

    fn involved_entities(&self, out: &mut Vec<EntityId>) {
        for member in &self.members {
            member.involved_entities(out);
        }
    }

    fn state(&self) -> &SolverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }

    fn set_active(&mut self, active: bool) {
        self.state.active = active;
        for member in &mut self.members {
            member.set_active(active);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use crate::core::types::{MassProperties, Transform};

    fn pair() -> (Bodies, EntityId, EntityId) {
        let mut bodies = Bodies::new();
        let a = bodies.insert(Entity::dynamic(Transform::default(), MassProperties::default()));
        let b = bodies.insert(Entity::dynamic(
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            MassProperties::default(),
        ));
        (bodies, a, b)
    }

    #[test]
    fn revolute_preset_has_dormant_limit_and_motor() {
        let (bodies, a, b) = pair();
        let mut group = SolverGroup::revolute(&bodies, a, b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z);
        assert_eq!(group.kind(), GroupKind::Revolute);
        assert_eq!(group.members().len(), 4);
        assert!(!group.revolute_limit_mut().is_some_and(|l| l.is_enabled()));
        assert!(!group.revolute_motor_mut().is_some_and(|m| m.is_enabled()));
    }

    #[test]
    fn activity_cascades_to_members() {
        let (bodies, a, b) = pair();
        let mut group = SolverGroup::weld(&bodies, a, b, Vec3::new(0.5, 0.0, 0.0));
        group.set_active(false);
        assert!(group.members().iter().all(|m| !m.is_active()));
        group.set_active(true);
        assert!(group.members().iter().all(|m| m.is_active()));
    }

    #[test]
    fn group_reports_member_entities() {
        let (bodies, a, b) = pair();
        let group = Constraint::from(SolverGroup::weld(&bodies, a, b, Vec3::ZERO));
        assert_eq!(group.entities(), vec![a, b]);
    }

    #[test]
    fn disabled_members_are_skipped() {
        let (mut bodies, a, b) = pair();
        let mut group = SolverGroup::revolute(&bodies, a, b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z);
        if let Some(body) = bodies.get_mut(b) {
            body.velocity.angular = Vec3::new(0.0, 0.0, 3.0);
        }
        group.update(&bodies, 1.0 / 60.0);
        group.exclusive_update(&mut bodies);
        for _ in 0..10 {
            group.solve_iteration(&mut bodies);
        }
        // Free rotation about the hinge survives because the motor is off.
        let wa = bodies.get(a).map(|e| e.velocity.angular).unwrap_or_default();
        let wb = bodies.get(b).map(|e| e.velocity.angular).unwrap_or_default();
        assert!((wb - wa).z > 1.0);
    }
}
