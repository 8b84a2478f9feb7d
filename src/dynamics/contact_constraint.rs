//! Contact response for one manifold: per-contact penetration plus manifold-wide friction.

use glam::{Mat2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::constraint::{BodySnapshot, SolverState, SolverUpdateable};
use crate::collision::contact::{Contact, ContactEvent};
use crate::config::{SolverSettings, MAX_MANIFOLD_CONTACTS};
use crate::core::bodies::Bodies;
use crate::core::entity::Entity;
use crate::core::types::{Material, MaterialPairProperties};
use crate::utils::allocator::EntityId;
use crate::utils::math::{clamp_length2, invert_or_zero2, normalize_or, orthonormal_basis};

/// Tangential speed above which kinetic friction replaces static friction.
pub const STATIC_FRICTION_VELOCITY_THRESHOLD: f32 = 0.2;

/// Non-penetration along the normal of a single contact.
#[derive(Debug, Clone, Default)]
pub struct ContactPenetrationConstraint {
    pub contact: Contact,
    r_a: Vec3,
    r_b: Vec3,
    bias: f32,
    effective_mass: f32,
    accumulated_impulse: f32,
}

impl ContactPenetrationConstraint {
    pub fn accumulated_impulse(&self) -> f32 {
        self.accumulated_impulse
    }
}

/// Impulse and velocity snapshot for one contact, handed to event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactInformation {
    pub contact: Contact,
    pub normal_impulse: f32,
    /// Share of the manifold's friction impulse attributed to this contact.
    pub friction_impulse: f32,
    /// Velocity of A relative to B at the contact position.
    pub relative_velocity: Vec3,
}

/// Solver constraint paired with a contact manifold.
///
/// Holds one [`ContactPenetrationConstraint`] per manifold contact, kept parallel to the manifold
/// by replaying its [`ContactEvent`]s, plus two-axis sliding friction at the manifold center and
/// twist friction about the normal.
#[derive(Debug, Clone)]
pub struct ContactManifoldConstraint {
    entity_a: EntityId,
    entity_b: EntityId,
    settings: SolverSettings,
    material: MaterialPairProperties,
    penetration: Vec<ContactPenetrationConstraint>,
    state: SolverState,
    softness: f32,
    friction_coefficient: f32,
    tangents: [Vec3; 2],
    friction_r_a: Vec3,
    friction_r_b: Vec3,
    friction_mass: Mat2,
    sliding_impulse: Vec2,
    twist_axis: Vec3,
    twist_mass: f32,
    twist_lever: f32,
    twist_impulse: f32,
}

impl ContactManifoldConstraint {
    pub fn new(entity_a: EntityId, entity_b: EntityId, settings: SolverSettings) -> Self {
        Self {
            entity_a,
            entity_b,
            settings,
            material: MaterialPairProperties::default(),
            penetration: Vec::with_capacity(MAX_MANIFOLD_CONTACTS),
            state: SolverState::default(),
            softness: 0.0,
            friction_coefficient: 0.0,
            tangents: [Vec3::X, Vec3::Z],
            friction_r_a: Vec3::ZERO,
            friction_r_b: Vec3::ZERO,
            friction_mass: Mat2::ZERO,
            sliding_impulse: Vec2::ZERO,
            twist_axis: Vec3::Y,
            twist_mass: 0.0,
            twist_lever: 0.0,
            twist_impulse: 0.0,
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.entity_a, self.entity_b)
    }

    /// Rebinds the constraint and forgets every accumulated impulse.
    pub fn set_entities(&mut self, entity_a: EntityId, entity_b: EntityId) {
        self.entity_a = entity_a;
        self.entity_b = entity_b;
        for constraint in &mut self.penetration {
            constraint.accumulated_impulse = 0.0;
        }
        self.sliding_impulse = Vec2::ZERO;
        self.twist_impulse = 0.0;
    }

    /// Drops every contact and impulse.
    pub fn clear(&mut self) {
        self.penetration.clear();
        self.sliding_impulse = Vec2::ZERO;
        self.twist_impulse = 0.0;
    }

    /// Mirrors one manifold change so indices stay aligned.
    pub fn apply_event(&mut self, event: ContactEvent) {
        match event {
            ContactEvent::Added(index) => {
                debug_assert_eq!(index, self.penetration.len());
                self.penetration.push(ContactPenetrationConstraint::default());
            }
            ContactEvent::Removed(index) => {
                if index < self.penetration.len() {
                    self.penetration.remove(index);
                }
            }
        }
        if self.penetration.is_empty() {
            self.sliding_impulse = Vec2::ZERO;
            self.twist_impulse = 0.0;
        }
    }

    /// Copies the manifold's current contact data into the per-contact constraints.
    pub fn sync_contacts(&mut self, contacts: &[Contact]) {
        debug_assert_eq!(contacts.len(), self.penetration.len());
        for (constraint, contact) in self.penetration.iter_mut().zip(contacts) {
            constraint.contact = *contact;
        }
    }

    pub fn len(&self) -> usize {
        self.penetration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.penetration.is_empty()
    }

    pub fn penetration_constraints(&self) -> &[ContactPenetrationConstraint] {
        &self.penetration
    }

    pub fn material(&self) -> MaterialPairProperties {
        self.material
    }

    pub fn total_normal_impulse(&self) -> f32 {
        self.penetration.iter().map(|c| c.accumulated_impulse).sum()
    }

    pub fn sliding_friction_impulse(&self) -> Vec3 {
        self.tangents[0] * self.sliding_impulse.x + self.tangents[1] * self.sliding_impulse.y
    }

    pub fn twist_friction_impulse(&self) -> f32 {
        self.twist_impulse
    }

    /// Snapshot for the contact at `index`, reading velocities from `bodies`.
    pub fn contact_information(&self, index: usize, bodies: &Bodies) -> Option<ContactInformation> {
        let constraint = self.penetration.get(index)?;
        let total = self.total_normal_impulse();
        let friction_impulse = if total > 0.0 {
            let friction = self.sliding_impulse.length() + self.twist_impulse.abs();
            constraint.accumulated_impulse / total * friction
        } else {
            0.0
        };

        let position = constraint.contact.position;
        let velocity_at = |id: EntityId| {
            bodies
                .get(id)
                .map(|entity| entity.velocity.at_offset(position - entity.transform.position))
                .unwrap_or(Vec3::ZERO)
        };
        Some(ContactInformation {
            contact: constraint.contact,
            normal_impulse: constraint.accumulated_impulse,
            friction_impulse,
            relative_velocity: velocity_at(self.entity_a) - velocity_at(self.entity_b),
        })
    }

    fn update_friction(
        &mut self,
        a: &BodySnapshot,
        b: &BodySnapshot,
        relative: impl Fn(Vec3) -> Vec3,
    ) {
        let count = self.penetration.len() as f32;
        let center = self.penetration.iter().map(|c| c.contact.position).sum::<Vec3>() / count;
        let normal_sum = self.penetration.iter().map(|c| c.contact.normal).sum::<Vec3>();
        let normal = normalize_or(normal_sum, self.penetration[0].contact.normal);

        let previous = self.sliding_friction_impulse();
        let (t1, t2) = orthonormal_basis(normal);
        self.tangents = [t1, t2];
        self.sliding_impulse = Vec2::new(previous.dot(t1), previous.dot(t2));
        self.friction_r_a = center - a.position;
        self.friction_r_b = center - b.position;

        let row = |t: Vec3| {
            (
                self.friction_r_a.cross(t),
                self.friction_r_b.cross(t),
            )
        };
        let (a1, b1) = row(t1);
        let (a2, b2) = row(t2);
        let linear = a.inverse_mass + b.inverse_mass;
        let k00 = linear + a1.dot(a.inverse_inertia * a1) + b1.dot(b.inverse_inertia * b1);
        let k01 = a1.dot(a.inverse_inertia * a2) + b1.dot(b.inverse_inertia * b2);
        let k11 = linear + a2.dot(a.inverse_inertia * a2) + b2.dot(b.inverse_inertia * b2);
        self.friction_mass =
            invert_or_zero2(Mat2::from_cols(Vec2::new(k00, k01), Vec2::new(k01, k11)));

        let slip = relative(center);
        let tangential = slip - normal * slip.dot(normal);
        self.friction_coefficient = if tangential.length() > STATIC_FRICTION_VELOCITY_THRESHOLD {
            self.material.kinetic_friction
        } else {
            self.material.static_friction
        };

        self.twist_axis = normal;
        let k_twist = normal.dot((a.inverse_inertia + b.inverse_inertia) * normal);
        self.twist_mass = if k_twist > 0.0 { 1.0 / k_twist } else { 0.0 };
        self.twist_lever = self
            .penetration
            .iter()
            .map(|c| (c.contact.position - center).length())
            .sum::<f32>()
            / count;
    }
}

fn push_apart(a: &mut Entity, b: &mut Entity, impulse: Vec3, r_a: Vec3, r_b: Vec3) {
    a.apply_linear_impulse(impulse);
    a.apply_angular_impulse(r_a.cross(impulse));
    b.apply_linear_impulse(-impulse);
    b.apply_angular_impulse(-r_b.cross(impulse));
}

impl SolverUpdateable for ContactManifoldConstraint {
    fn update(&mut self, bodies: &Bodies, dt: f32) {
        if self.penetration.is_empty() {
            return;
        }
        let a = BodySnapshot::of(bodies, self.entity_a);
        let b = BodySnapshot::of(bodies, self.entity_b);
        let material_of = |id| bodies.get(id).map(|e: &Entity| e.material).unwrap_or_default();
        self.material = Material::combine(&material_of(self.entity_a), &material_of(self.entity_b));

        let velocity_of = |id| bodies.get(id).map(|e: &Entity| e.velocity).unwrap_or_default();
        let (velocity_a, velocity_b) = (velocity_of(self.entity_a), velocity_of(self.entity_b));
        let relative = |point: Vec3| {
            velocity_a.at_offset(point - a.position) - velocity_b.at_offset(point - b.position)
        };

        let rate = 1.0 / dt;
        let settings = self.settings;
        self.softness = settings.contact_softness * rate;
        let restitution = self.material.restitution;

        for constraint in &mut self.penetration {
            let contact = &constraint.contact;
            let normal = contact.normal;
            constraint.r_a = contact.position - a.position;
            constraint.r_b = contact.position - b.position;
            let angular_a = constraint.r_a.cross(normal);
            let angular_b = constraint.r_b.cross(normal);
            let k = a.inverse_mass
                + b.inverse_mass
                + angular_a.dot(a.inverse_inertia * angular_a)
                + angular_b.dot(b.inverse_inertia * angular_b)
                + self.softness;
            constraint.effective_mass = if k > 0.0 { 1.0 / k } else { 0.0 };

            let depth = contact.penetration_depth;
            let mut bias = if depth > settings.allowed_penetration {
                let excess = depth - settings.allowed_penetration;
                (excess * settings.penetration_recovery_stiffness * rate)
                    .min(settings.maximum_penetration_recovery_speed)
            } else if depth < 0.0 {
                // Speculative: let the gap close this step, but no further.
                depth * rate
            } else {
                0.0
            };

            let approach = -relative(contact.position).dot(normal);
            let closes_this_step = approach * dt >= -depth;
            if restitution > 0.0
                && approach > settings.bouncing_velocity_threshold
                && closes_this_step
            {
                bias = bias.max(restitution * approach);
            }
            constraint.bias = bias;
        }

        self.update_friction(&a, &b, relative);
    }

    fn exclusive_update(&mut self, bodies: &mut Bodies) {
        if self.penetration.is_empty() {
            return;
        }
        let Some((a, b)) = bodies.get2_mut(self.entity_a, self.entity_b) else {
            return;
        };
        for constraint in &self.penetration {
            let impulse = constraint.contact.normal * constraint.accumulated_impulse;
            push_apart(a, b, impulse, constraint.r_a, constraint.r_b);
        }
        let sliding =
            self.tangents[0] * self.sliding_impulse.x + self.tangents[1] * self.sliding_impulse.y;
        push_apart(a, b, sliding, self.friction_r_a, self.friction_r_b);
        let twist = self.twist_axis * self.twist_impulse;
        a.apply_angular_impulse(twist);
        b.apply_angular_impulse(-twist);
    }

    fn solve_iteration(&mut self, bodies: &mut Bodies) -> f32 {
        if self.penetration.is_empty() {
            return 0.0;
        }
        let Some((a, b)) = bodies.get2_mut(self.entity_a, self.entity_b) else {
            return 0.0;
        };
        let mut magnitude = 0.0;

        for constraint in &mut self.penetration {
            let normal = constraint.contact.normal;
            let relative =
                a.velocity.at_offset(constraint.r_a) - b.velocity.at_offset(constraint.r_b);
            let softened = self.softness * constraint.accumulated_impulse;
            let unclamped =
                constraint.effective_mass * (constraint.bias - relative.dot(normal) - softened);
            let previous = constraint.accumulated_impulse;
            constraint.accumulated_impulse = (previous + unclamped).max(0.0);
            let lambda = constraint.accumulated_impulse - previous;
            push_apart(a, b, normal * lambda, constraint.r_a, constraint.r_b);
            magnitude += lambda.abs();
        }

        let total_normal: f32 = self.penetration.iter().map(|c| c.accumulated_impulse).sum();
        let max_friction = self.friction_coefficient * total_normal;

        let [t1, t2] = self.tangents;
        let relative =
            a.velocity.at_offset(self.friction_r_a) - b.velocity.at_offset(self.friction_r_b);
        let unclamped = self.friction_mass * -Vec2::new(relative.dot(t1), relative.dot(t2));
        let previous = self.sliding_impulse;
        self.sliding_impulse = clamp_length2(previous + unclamped, max_friction);
        let lambda = self.sliding_impulse - previous;
        push_apart(a, b, t1 * lambda.x + t2 * lambda.y, self.friction_r_a, self.friction_r_b);
        magnitude += lambda.x.abs() + lambda.y.abs();

        let twist_limit = max_friction * self.twist_lever;
        let spin = (a.velocity.angular - b.velocity.angular).dot(self.twist_axis);
        let previous = self.twist_impulse;
        self.twist_impulse = (previous - self.twist_mass * spin).clamp(-twist_limit, twist_limit);
        let lambda = self.twist_impulse - previous;
        a.apply_angular_impulse(self.twist_axis * lambda);
        b.apply_angular_impulse(-self.twist_axis * lambda);
        magnitude + lambda.abs()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MassProperties, Transform};
    use approx::assert_abs_diff_eq;

    const DT: f32 = 1.0 / 60.0;

    fn falling_box(velocity: Vec3) -> (Bodies, EntityId) {
        let mut bodies = Bodies::new();
        let body = Entity::dynamic(
            Transform::from_position(Vec3::new(0.0, 0.5, 0.0)),
            MassProperties::solid_box(Vec3::splat(0.5), 1.0),
        )
        .with_velocity(velocity, Vec3::ZERO);
        let id = bodies.insert(body);
        (bodies, id)
    }

    fn floor_constraint(entity: EntityId, depth: f32) -> ContactManifoldConstraint {
        let mut constraint =
            ContactManifoldConstraint::new(entity, EntityId::WORLD, SolverSettings::default());
        let corners = [(0.5, 0.5), (-0.5, 0.5), (-0.5, -0.5), (0.5, -0.5)];
        let contacts: Vec<Contact> = corners
            .iter()
            .map(|&(x, z)| Contact::new(Vec3::new(x, 0.0, z), Vec3::Y, depth))
            .collect();
        for index in 0..contacts.len() {
            constraint.apply_event(ContactEvent::Added(index));
        }
        constraint.sync_contacts(&contacts);
        constraint
    }

    fn solve(constraint: &mut ContactManifoldConstraint, bodies: &mut Bodies, iterations: usize) {
        constraint.update(bodies, DT);
        constraint.exclusive_update(bodies);
        for _ in 0..iterations {
            constraint.solve_iteration(bodies);
        }
    }

    #[test]
    fn added_contacts_start_empty() {
        let world = EntityId::WORLD;
        let mut constraint =
            ContactManifoldConstraint::new(world, world, SolverSettings::default());
        constraint.apply_event(ContactEvent::Added(0));
        let added = &constraint.penetration[0];
        assert_eq!(added.contact, Contact::default());
        assert_eq!(added.accumulated_impulse(), 0.0);
    }

    #[test]
    fn resting_contact_stops_the_fall() {
        let (mut bodies, id) = falling_box(Vec3::new(0.0, -2.0, 0.0));
        let mut constraint = floor_constraint(id, 0.0);
        solve(&mut constraint, &mut bodies, 10);
        let velocity = bodies.get(id).map(|e| e.velocity.linear).unwrap_or_default();
        assert!(velocity.y.abs() < 0.05, "{velocity:?}");
        assert_abs_diff_eq!(constraint.total_normal_impulse(), 2.0, epsilon = 0.05);
    }

    #[test]
    fn speculative_contact_allows_closing_the_gap() {
        let (mut bodies, id) = falling_box(Vec3::new(0.0, -1.0, 0.0));
        // 0.05 apart: falling at 1 m/s only covers 1/60 m this step.
        let mut constraint = floor_constraint(id, -0.05);
        solve(&mut constraint, &mut bodies, 10);
        let velocity = bodies.get(id).map(|e| e.velocity.linear).unwrap_or_default();
        assert_abs_diff_eq!(velocity.y, -1.0, epsilon = 1e-4);
        assert_eq!(constraint.total_normal_impulse(), 0.0);
    }

    #[test]
    fn friction_is_bounded_by_normal_impulse() {
        let (mut bodies, id) = falling_box(Vec3::new(5.0, -1.0, 0.0));
        let mut constraint = floor_constraint(id, 0.0);
        solve(&mut constraint, &mut bodies, 10);
        let limit = constraint.material().kinetic_friction * constraint.total_normal_impulse();
        assert!(constraint.sliding_friction_impulse().length() <= limit + 1e-5);
        let velocity = bodies.get(id).map(|e| e.velocity.linear).unwrap_or_default();
        assert!(velocity.x < 5.0 && velocity.x > 0.0);
    }

    #[test]
    fn warm_start_reapplies_previous_impulse() {
        let (mut bodies, id) = falling_box(Vec3::new(0.0, -2.0, 0.0));
        let mut constraint = floor_constraint(id, 0.0);
        solve(&mut constraint, &mut bodies, 10);
        let accumulated = constraint.total_normal_impulse();

        // Same incoming velocity again: the warm start alone brings the box to rest.
        if let Some(body) = bodies.get_mut(id) {
            body.velocity.linear = Vec3::new(0.0, -2.0, 0.0);
        }
        constraint.update(&bodies, DT);
        constraint.exclusive_update(&mut bodies);
        let velocity = bodies.get(id).map(|e| e.velocity.linear).unwrap_or_default();
        assert_abs_diff_eq!(velocity.y, -2.0 + accumulated, epsilon = 1e-4);
        assert_abs_diff_eq!(constraint.total_normal_impulse(), accumulated, epsilon = 1e-6);
    }

    #[test]
    fn friction_share_follows_normal_impulse() {
        let (mut bodies, id) = falling_box(Vec3::new(1.0, -2.0, 0.0));
        let mut constraint = floor_constraint(id, 0.0);
        solve(&mut constraint, &mut bodies, 10);
        let total_friction = constraint.sliding_impulse.length() + constraint.twist_impulse.abs();
        let shares: f32 = (0..4)
            .filter_map(|i| constraint.contact_information(i, &bodies))
            .map(|info| info.friction_impulse)
            .sum();
        assert_abs_diff_eq!(shares, total_friction, epsilon = 1e-4);
        assert!(constraint.contact_information(4, &bodies).is_none());
    }

    #[test]
    fn removal_events_keep_constraints_parallel() {
        let mut constraint = floor_constraint(EntityId::from_index(1), 0.0);
        constraint.apply_event(ContactEvent::Removed(1));
        assert_eq!(constraint.len(), 3);
        assert_eq!(constraint.penetration_constraints()[1].contact.position.x, -0.5);
        assert_eq!(constraint.penetration_constraints()[1].contact.position.z, -0.5);
    }
}
