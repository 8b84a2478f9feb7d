use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rigid transform: position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform {
            position: rotation * -self.position,
            rotation,
        }
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.conjugate() * (world - self.position)
    }

    pub fn transform_vector(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    pub fn inverse_transform_vector(&self, world: Vec3) -> Vec3 {
        self.rotation.conjugate() * world
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Velocity {
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    /// Velocity of a point offset by `r` from the center of mass.
    pub fn at_offset(&self, r: Vec3) -> Vec3 {
        self.linear + self.angular.cross(r)
    }

    pub fn length_squared(&self) -> f32 {
        self.linear.length_squared() + self.angular.length_squared()
    }
}

/// Mass and body-local inertia tensor data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f32,
    pub inertia: Mat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia: Mat3::IDENTITY,
        }
    }
}

impl MassProperties {
    pub fn solid_box(half_extents: Vec3, mass: f32) -> Self {
        Self {
            mass,
            inertia: Mat3::for_solid_box(half_extents, mass),
        }
    }

    pub fn solid_sphere(radius: f32, mass: f32) -> Self {
        Self {
            mass,
            inertia: Mat3::for_solid_sphere(radius, mass),
        }
    }
}

/// Surface coefficients that affect contact response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub static_friction: f32,
    pub kinetic_friction: f32,
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            static_friction: 0.6,
            kinetic_friction: 0.3,
            restitution: 0.0,
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            static_friction: 1.2,
            kinetic_friction: 1.0,
            restitution: 0.8,
        }
    }

    pub fn ice() -> Self {
        Self {
            static_friction: 0.05,
            kinetic_friction: 0.03,
            restitution: 0.05,
        }
    }

    /// Combines two materials by averaging each coefficient.
    pub fn combine(a: &Material, b: &Material) -> MaterialPairProperties {
        MaterialPairProperties {
            static_friction: 0.5 * (a.static_friction + b.static_friction),
            kinetic_friction: 0.5 * (a.kinetic_friction + b.kinetic_friction),
            restitution: 0.5 * (a.restitution + b.restitution),
        }
    }
}

/// Coefficients blended for a specific pair of materials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialPairProperties {
    pub static_friction: f32,
    pub kinetic_friction: f32,
    pub restitution: f32,
}

impl Default for MaterialPairProperties {
    fn default() -> Self {
        Material::combine(&Material::default(), &Material::default())
    }
}

/// Helper methods for inertia calculations.
pub trait InertiaTensorExt {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Mat3;
    fn for_solid_sphere(radius: f32, mass: f32) -> Mat3;
}

impl InertiaTensorExt for Mat3 {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Mat3 {
        let lx = half_extents.x * 2.0;
        let ly = half_extents.y * 2.0;
        let lz = half_extents.z * 2.0;
        let factor = mass / 12.0;
        Mat3::from_diagonal(Vec3::new(
            factor * (ly * ly + lz * lz),
            factor * (lx * lx + lz * lz),
            factor * (lx * lx + ly * ly),
        ))
    }

    fn for_solid_sphere(radius: f32, mass: f32) -> Mat3 {
        let value = 0.4 * mass * radius * radius;
        Mat3::from_diagonal(Vec3::splat(value))
    }
}
