use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::mesh::{Aabb, Terrain, TriangleMesh};
use super::types::MassProperties;

/// Enumeration of supported collidable geometries.
///
/// Convex primitives are expressed in the collidable's local frame. Mesh data is shared behind
/// `Arc` so many collidables can reference one cooked buffer.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    /// Capsule aligned with local Y; `half_height` excludes the caps.
    Capsule { radius: f32, half_height: f32 },
    ConvexHull { vertices: Vec<Vec3> },
    Triangle { vertices: [Vec3; 3] },
    StaticMesh(Arc<TriangleMesh>),
    InstancedMesh { mesh: Arc<TriangleMesh>, scale: Vec3 },
    Terrain(Arc<Terrain>),
}

/// Discriminant of [`Shape`], used for pair dispatch and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Sphere,
    Box,
    Capsule,
    ConvexHull,
    Triangle,
    StaticMesh,
    InstancedMesh,
    Terrain,
}

impl ShapeKind {
    pub fn is_convex(self) -> bool {
        matches!(
            self,
            ShapeKind::Sphere | ShapeKind::Box | ShapeKind::Capsule | ShapeKind::ConvexHull
        )
    }

    /// Shapes made of many triangles.
    pub fn is_triangle_source(self) -> bool {
        matches!(
            self,
            ShapeKind::StaticMesh | ShapeKind::InstancedMesh | ShapeKind::Terrain
        )
    }
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Shape::Sphere { radius }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Shape::Box { half_extents }
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Shape::Capsule {
            radius,
            half_height,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere { .. } => ShapeKind::Sphere,
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Capsule { .. } => ShapeKind::Capsule,
            Shape::ConvexHull { .. } => ShapeKind::ConvexHull,
            Shape::Triangle { .. } => ShapeKind::Triangle,
            Shape::StaticMesh(_) => ShapeKind::StaticMesh,
            Shape::InstancedMesh { .. } => ShapeKind::InstancedMesh,
            Shape::Terrain(_) => ShapeKind::Terrain,
        }
    }

    /// Farthest local-space point along `direction`. Returns `None` for non-convex shapes.
    pub fn local_support(&self, direction: Vec3) -> Option<Vec3> {
        let point = match self {
            Shape::Sphere { radius } => direction.normalize_or_zero() * *radius,
            Shape::Box { half_extents } => Vec3::new(
                half_extents.x.copysign(direction.x),
                half_extents.y.copysign(direction.y),
                half_extents.z.copysign(direction.z),
            ),
            Shape::Capsule {
                radius,
                half_height,
            } => {
                let cap = Vec3::Y * half_height.copysign(direction.y);
                cap + direction.normalize_or_zero() * *radius
            }
            Shape::ConvexHull { vertices } => farthest(vertices, direction)?,
            Shape::Triangle { vertices } => farthest(vertices, direction)?,
            Shape::StaticMesh(_) | Shape::InstancedMesh { .. } | Shape::Terrain(_) => {
                return None
            }
        };
        Some(point)
    }

    /// Tight local-space bounds.
    pub fn local_bounds(&self) -> Aabb {
        match self {
            Shape::Sphere { radius } => Aabb::from_center_extent(Vec3::ZERO, Vec3::splat(*radius)),
            Shape::Box { half_extents } => Aabb::from_center_extent(Vec3::ZERO, *half_extents),
            Shape::Capsule {
                radius,
                half_height,
            } => Aabb::from_center_extent(
                Vec3::ZERO,
                Vec3::new(*radius, half_height + radius, *radius),
            ),
            Shape::ConvexHull { vertices } => Aabb::from_points(vertices),
            Shape::Triangle { vertices } => Aabb::from_points(vertices),
            Shape::StaticMesh(mesh) => mesh.bounds,
            Shape::InstancedMesh { mesh, scale } => {
                let a = mesh.bounds.min * *scale;
                let b = mesh.bounds.max * *scale;
                Aabb::new(a.min(b), a.max(b))
            }
            Shape::Terrain(terrain) => {
                use super::mesh::TriangleSource;
                terrain.local_bounds()
            }
        }
    }

    pub fn bounding_radius(&self) -> f32 {
        match self {
            Shape::Sphere { radius } => *radius,
            Shape::Box { half_extents } => half_extents.length(),
            Shape::Capsule {
                radius,
                half_height,
            } => radius + half_height,
            Shape::ConvexHull { vertices } => {
                vertices.iter().map(|v| v.length()).fold(0.0, f32::max)
            }
            Shape::Triangle { vertices } => {
                vertices.iter().map(|v| v.length()).fold(0.0, f32::max)
            }
            Shape::StaticMesh(mesh) => mesh.bounding_radius(),
            Shape::InstancedMesh { mesh, scale } => {
                mesh.bounding_radius() * scale.abs().max_element()
            }
            Shape::Terrain(_) => self.local_bounds().radius() * 2.0,
        }
    }

    /// Mass properties for a uniform density. Non-convex shapes fall back to their bounds.
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        match self {
            Shape::Sphere { radius } => {
                let volume = 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3);
                MassProperties::solid_sphere(*radius, volume * density)
            }
            _ => {
                let extent = self.local_bounds().extent();
                let volume = 8.0 * extent.x * extent.y * extent.z;
                MassProperties::solid_box(extent, volume * density)
            }
        }
    }
}

fn farthest(vertices: &[Vec3], direction: Vec3) -> Option<Vec3> {
    vertices.iter().copied().max_by(|a, b| a.dot(direction).total_cmp(&b.dot(direction)))
}
