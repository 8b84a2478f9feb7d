use glam::{Quat, Vec3};

use crate::core::bodies::Bodies;
use crate::core::entity::Entity;

/// Semi-implicit Euler: velocities are advanced before the solver, positions after it.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub gravity: Vec3,
}

impl Integrator {
    pub fn new(gravity: Vec3) -> Self {
        Self { gravity }
    }

    fn skips(body: &Entity) -> bool {
        !body.is_dynamic() || !body.is_active()
    }

    /// Applies gravity, accumulated forces and damping, then clears the accumulators.
    pub fn integrate_velocity(&self, body: &mut Entity, dt: f32) {
        if Self::skips(body) {
            body.force = Vec3::ZERO;
            body.torque = Vec3::ZERO;
            return;
        }

        let acceleration = self.gravity * body.gravity_scale + body.force * body.inverse_mass();
        body.velocity.linear += acceleration * dt;
        body.velocity.angular += body.inverse_inertia() * body.torque * dt;

        body.velocity.linear *= (1.0 - body.linear_damping * dt).max(0.0);
        body.velocity.angular *= (1.0 - body.angular_damping * dt).max(0.0);

        body.force = Vec3::ZERO;
        body.torque = Vec3::ZERO;
    }

    pub fn integrate_position(&self, body: &mut Entity, dt: f32) {
        if Self::skips(body) {
            return;
        }

        body.transform.position += body.velocity.linear * dt;

        let omega_mag = body.velocity.angular.length();
        if omega_mag > 1e-6 {
            let axis = body.velocity.angular / omega_mag;
            let delta = Quat::from_axis_angle(axis, omega_mag * dt);
            body.transform.rotation = (delta * body.transform.rotation).normalize();
        }
        body.update_inertia_tensor();
    }

    pub fn integrate_velocities(&self, bodies: &mut Bodies, dt: f32) {
        for (_, body) in bodies.iter_mut() {
            self.integrate_velocity(body, dt);
        }
    }

    pub fn integrate_positions(&self, bodies: &mut Bodies, dt: f32) {
        for (_, body) in bodies.iter_mut() {
            self.integrate_position(body, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MassProperties, Transform};
    use approx::assert_relative_eq;

    #[test]
    fn gravity_accelerates_dynamic_bodies_only() {
        let integrator = Integrator::new(Vec3::new(0.0, -10.0, 0.0));
        let mut falling = Entity::dynamic(Transform::default(), MassProperties::default());
        falling.linear_damping = 0.0;
        let mut fixed = Entity::kinematic(Transform::default());

        integrator.integrate_velocity(&mut falling, 0.1);
        integrator.integrate_velocity(&mut fixed, 0.1);
        integrator.integrate_position(&mut falling, 0.1);

        assert_relative_eq!(falling.velocity.linear.y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(falling.transform.position.y, -0.1, epsilon = 1e-6);
        assert_eq!(fixed.velocity.linear, Vec3::ZERO);
    }

    #[test]
    fn sleeping_bodies_are_frozen_and_forces_cleared() {
        let integrator = Integrator::new(Vec3::new(0.0, -10.0, 0.0));
        let mut body = Entity::dynamic(Transform::default(), MassProperties::default());
        body.set_active(false);
        body.apply_force(Vec3::X);

        integrator.integrate_velocity(&mut body, 0.1);
        integrator.integrate_position(&mut body, 0.1);

        assert_eq!(body.velocity.linear, Vec3::ZERO);
        assert_eq!(body.transform.position, Vec3::ZERO);
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn angular_velocity_rotates_the_body() {
        let integrator = Integrator::new(Vec3::ZERO);
        let mut body = Entity::dynamic(Transform::default(), MassProperties::default())
            .with_velocity(Vec3::ZERO, Vec3::new(0.0, std::f32::consts::PI, 0.0));
        body.angular_damping = 0.0;
        integrator.integrate_position(&mut body, 0.5);
        let forward = body.transform.rotation * Vec3::X;
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-5);
    }
}
