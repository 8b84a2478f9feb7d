use glam::{Mat3, Vec3};

use super::types::{MassProperties, Material, Transform, Velocity};
use crate::config::{DEFAULT_ANGULAR_DAMPING, DEFAULT_LINEAR_DAMPING};
use crate::utils::math::invert_or_zero3;

/// Rigid body state mutated by constraints during a solve and by the integrator between steps.
#[derive(Debug, Clone)]
pub struct Entity {
    pub transform: Transform,
    pub velocity: Velocity,
    /// Force accumulated since the last step; cleared by the integrator.
    pub force: Vec3,
    pub torque: Vec3,
    pub mass_properties: MassProperties,
    pub material: Material,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    inverse_mass: f32,
    local_inverse_inertia: Mat3,
    inverse_inertia_world: Mat3,
    is_active: bool,
}

impl Default for Entity {
    fn default() -> Self {
        Self::dynamic(Transform::default(), MassProperties::default())
    }
}

impl Entity {
    /// Body that responds to forces and impulses.
    pub fn dynamic(transform: Transform, mass_properties: MassProperties) -> Self {
        let mut entity = Self {
            transform,
            velocity: Velocity::default(),
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass_properties,
            material: Material::default(),
            gravity_scale: 1.0,
            linear_damping: DEFAULT_LINEAR_DAMPING,
            angular_damping: DEFAULT_ANGULAR_DAMPING,
            inverse_mass: 0.0,
            local_inverse_inertia: Mat3::ZERO,
            inverse_inertia_world: Mat3::ZERO,
            is_active: true,
        };
        entity.recompute_inverses();
        entity
    }

    /// Immovable body: zero inverse mass and inverse inertia.
    pub fn kinematic(transform: Transform) -> Self {
        let mut entity = Self::dynamic(transform, MassProperties::default());
        entity.make_kinematic();
        entity
    }

    /// The distinguished world entity that owns static geometry.
    pub fn world() -> Self {
        Self::kinematic(Transform::IDENTITY)
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.velocity = Velocity::new(linear, angular);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.inverse_mass > 0.0
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// World-space inverse inertia, refreshed by
    /// [`update_inertia_tensor`](Self::update_inertia_tensor).
    pub fn inverse_inertia(&self) -> Mat3 {
        self.inverse_inertia_world
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
        if !active {
            self.velocity = Velocity::default();
        }
    }

    pub fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        self.recompute_inverses();
    }

    pub fn make_kinematic(&mut self) {
        self.inverse_mass = 0.0;
        self.local_inverse_inertia = Mat3::ZERO;
        self.inverse_inertia_world = Mat3::ZERO;
    }

    /// Rotates the local inverse inertia into world space for the current orientation.
    pub fn update_inertia_tensor(&mut self) {
        let rotation = Mat3::from_quat(self.transform.rotation);
        self.inverse_inertia_world = rotation * self.local_inverse_inertia * rotation.transpose();
    }

    pub fn apply_force(&mut self, force: Vec3) {
        if self.is_dynamic() {
            self.force += force;
        }
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec3) {
        self.velocity.linear += impulse * self.inverse_mass;
    }

    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        self.velocity.angular += self.inverse_inertia_world * impulse;
    }

    /// Applies an impulse at a world-space point.
    pub fn apply_impulse_at(&mut self, impulse: Vec3, point: Vec3) {
        self.apply_linear_impulse(impulse);
        let torque = (point - self.transform.position).cross(impulse);
        self.apply_angular_impulse(torque);
    }

    pub fn kinetic_energy_proxy(&self) -> f32 {
        self.velocity.length_squared()
    }

    fn recompute_inverses(&mut self) {
        if self.mass_properties.mass.abs() < f32::EPSILON {
            self.make_kinematic();
            return;
        }
        self.inverse_mass = 1.0 / self.mass_properties.mass;
        self.local_inverse_inertia = invert_or_zero3(self.mass_properties.inertia);
        self.update_inertia_tensor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    #[test]
    fn world_entity_ignores_impulses() {
        let mut world = Entity::world();
        world.apply_impulse_at(Vec3::new(5.0, 2.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(world.velocity, Velocity::default());
        assert!(!world.is_dynamic());
    }

    #[test]
    fn inertia_follows_orientation() {
        let half_extents = Vec3::new(2.0, 0.5, 0.5);
        let mut body = Entity::dynamic(
            Transform::default(),
            MassProperties::solid_box(half_extents, 3.0),
        );
        let along_x = body.inverse_inertia() * Vec3::X;

        body.transform.rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        body.update_inertia_tensor();
        let along_y = body.inverse_inertia() * Vec3::Y;
        assert_abs_diff_eq!(along_x.x, along_y.y, epsilon = 1e-4);
    }
}
