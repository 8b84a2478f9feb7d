//! Ray casts against individual shapes and collidables.
//!
//! Rays are `origin + direction * t` with `direction` normalized internally, so `t` is a
//! distance. Rays starting inside a solid report no hit against that solid.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::collidable::Collidable;
use crate::core::mesh::{Aabb, ScaledMesh, TriangleSource};
use crate::core::shape::Shape;
use crate::core::types::Transform;

const PARALLEL_EPSILON: f32 = 1e-6;

/// Where a ray first touches a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    pub location: Vec3,
    /// Surface normal facing the ray origin.
    pub normal: Vec3,
    pub t: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` for a zero-length direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    fn to_local(&self, transform: &Transform) -> Ray {
        Ray {
            origin: transform.inverse_transform_point(self.origin),
            direction: transform.inverse_transform_vector(self.direction),
        }
    }

    fn hit(&self, t: f32, normal: Vec3) -> RayHit {
        RayHit {
            location: self.at(t),
            normal,
            t,
        }
    }
}

pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f32, max_t: f32) -> Option<RayHit> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    if t < 0.0 || t > max_t {
        return None;
    }
    let location = ray.at(t);
    Some(RayHit {
        location,
        normal: (location - center) / radius,
        t,
    })
}

/// Slab test against an axis-aligned box centered at the origin of the ray's frame.
fn ray_aabb(ray: &Ray, half_extents: Vec3, max_t: f32) -> Option<(f32, Vec3)> {
    let mut t_min = 0.0;
    let mut t_max = max_t;
    let mut normal = Vec3::ZERO;

    for i in 0..3 {
        let origin = ray.origin[i];
        let direction = ray.direction[i];
        let (min, max) = (-half_extents[i], half_extents[i]);

        if direction.abs() < PARALLEL_EPSILON {
            if origin < min || origin > max {
                return None;
            }
            continue;
        }

        let inv_dir = 1.0 / direction;
        let mut t1 = (min - origin) * inv_dir;
        let mut t2 = (max - origin) * inv_dir;
        let mut axis_normal = Vec3::ZERO;
        axis_normal[i] = -direction.signum();
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_min {
            t_min = t1;
            normal = axis_normal;
        }
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    // Started inside.
    if normal == Vec3::ZERO {
        return None;
    }
    Some((t_min, normal))
}

/// Oriented box: the ray is moved into the box frame, tested, and the hit moved back.
pub fn ray_box(ray: &Ray, transform: &Transform, half_extents: Vec3, max_t: f32) -> Option<RayHit> {
    let local = ray.to_local(transform);
    let (t, normal) = ray_aabb(&local, half_extents, max_t)?;
    Some(ray.hit(t, transform.transform_vector(normal)))
}

/// Capsule along the local Y axis.
pub fn ray_capsule(
    ray: &Ray,
    transform: &Transform,
    radius: f32,
    half_height: f32,
    max_t: f32,
) -> Option<RayHit> {
    let local = ray.to_local(transform);
    let mut best: Option<RayHit> = None;
    let mut keep = |candidate: Option<RayHit>| {
        if let Some(hit) = candidate {
            if best.map_or(true, |b| hit.t < b.t) {
                best = Some(hit);
            }
        }
    };

    // Infinite cylinder restricted to the segment.
    let (o, d) = (local.origin, local.direction);
    let a = d.x * d.x + d.z * d.z;
    if a > PARALLEL_EPSILON {
        let b = o.x * d.x + o.z * d.z;
        let c = o.x * o.x + o.z * o.z - radius * radius;
        let discriminant = b * b - a * c;
        if discriminant >= 0.0 && !(c < 0.0 && o.y.abs() <= half_height) {
            let t = (-b - discriminant.sqrt()) / a;
            let y = o.y + d.y * t;
            if t >= 0.0 && t <= max_t && y.abs() <= half_height {
                let p = local.at(t);
                keep(Some(RayHit {
                    location: p,
                    normal: Vec3::new(p.x, 0.0, p.z) / radius,
                    t,
                }));
            }
        }
    }
    keep(ray_sphere(&local, Vec3::Y * half_height, radius, max_t));
    keep(ray_sphere(&local, Vec3::NEG_Y * half_height, radius, max_t));

    best.map(|hit| ray.hit(hit.t, transform.transform_vector(hit.normal)))
}

/// Two-sided triangle test.
pub fn ray_triangle(ray: &Ray, [a, b, c]: [Vec3; 3], max_t: f32) -> Option<RayHit> {
    let ab = b - a;
    let ac = c - a;
    let p = ray.direction.cross(ac);
    let det = ab.dot(p);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(ab);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = ac.dot(q) * inv_det;
    if t < 0.0 || t > max_t {
        return None;
    }
    let mut normal = ab.cross(ac).normalize_or_zero();
    if normal.dot(ray.direction) > 0.0 {
        normal = -normal;
    }
    Some(ray.hit(t, normal))
}

/// Closest triangle of a mesh or terrain placed at `transform`.
pub fn ray_triangle_source<S: TriangleSource + ?Sized>(
    ray: &Ray,
    transform: &Transform,
    source: &S,
    max_t: f32,
) -> Option<RayHit> {
    let local = ray.to_local(transform);
    let bounds = source.local_bounds();
    // Clip the ray to the source bounds so the triangle query stays small.
    let half = bounds.extent();
    let centered = Ray {
        origin: local.origin - bounds.center(),
        direction: local.direction,
    };
    let inside = (centered.origin.abs() - half).max_element() <= 0.0;
    let t_enter = if inside {
        0.0
    } else {
        ray_aabb(&centered, half, max_t)?.0
    };
    let t_exit = max_t.min(exit_distance(&centered, half));
    let mut segment = Aabb::empty();
    segment.extend(local.at(t_enter));
    segment.extend(local.at(t_exit.max(t_enter)));

    let mut candidates = Vec::new();
    source.triangles_overlapping(&segment.expanded(1e-4), &mut candidates);
    let best = candidates
        .into_iter()
        .filter_map(|index| ray_triangle(&local, source.triangle(index), max_t))
        .min_by(|x, y| x.t.total_cmp(&y.t))?;
    Some(ray.hit(best.t, transform.transform_vector(best.normal)))
}

fn exit_distance(ray: &Ray, half_extents: Vec3) -> f32 {
    let mut t_exit = f32::INFINITY;
    for i in 0..3 {
        let direction = ray.direction[i];
        if direction.abs() < PARALLEL_EPSILON {
            continue;
        }
        let bound = half_extents[i] * direction.signum();
        t_exit = t_exit.min((bound - ray.origin[i]) / direction);
    }
    t_exit
}

/// Casts against a collidable in its current world placement.
pub fn ray_collidable(ray: &Ray, collidable: &Collidable, max_t: f32) -> Option<RayHit> {
    let transform = collidable.world_transform();
    match &collidable.shape {
        Shape::Sphere { radius } => ray_sphere(ray, transform.position, *radius, max_t),
        Shape::Box { half_extents } => ray_box(ray, transform, *half_extents, max_t),
        Shape::Capsule {
            radius,
            half_height,
        } => ray_capsule(ray, transform, *radius, *half_height, max_t),
        Shape::Triangle { vertices } => {
            let world = vertices.map(|v| transform.transform_point(v));
            ray_triangle(ray, world, max_t)
        }
        Shape::StaticMesh(mesh) => ray_triangle_source(ray, transform, mesh.as_ref(), max_t),
        Shape::InstancedMesh { mesh, scale } => {
            let scaled = ScaledMesh {
                mesh: mesh.as_ref(),
                scale: *scale,
            };
            ray_triangle_source(ray, transform, &scaled, max_t)
        }
        Shape::Terrain(terrain) => ray_triangle_source(ray, transform, terrain.as_ref(), max_t),
        Shape::ConvexHull { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::Terrain;
    use approx::assert_relative_eq;
    use glam::{Quat, Vec2};

    fn ray(origin: Vec3, direction: Vec3) -> Ray {
        Ray::new(origin, direction).expect("non-zero direction")
    }

    #[test]
    fn sphere_hit_reports_entry_point() {
        let hit = ray_sphere(&ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::X), Vec3::ZERO, 1.0, 100.0)
            .expect("hit");
        assert_relative_eq!(hit.t, 4.0, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
        let short = ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        assert!(ray_sphere(&short, Vec3::ZERO, 1.0, 3.0).is_none());
    }

    #[test]
    fn rotated_box_normal_is_in_world_space() {
        let transform = Transform::from_position_rotation(
            Vec3::new(0.0, 0.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
        );
        let hit = ray_box(&ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::X), &transform, Vec3::ONE, 100.0)
            .expect("hit");
        assert_relative_eq!(hit.t, 5.0 - std::f32::consts::SQRT_2, epsilon = 1e-4);
        assert!(hit.normal.x < -0.7);
    }

    #[test]
    fn capsule_side_and_cap_hits() {
        let transform = Transform::default();
        let side_ray = ray(Vec3::new(-5.0, 0.5, 0.0), Vec3::X);
        let side = ray_capsule(&side_ray, &transform, 0.5, 1.0, 100.0).expect("side hit");
        assert_relative_eq!(side.t, 4.5, epsilon = 1e-5);
        let cap_ray = ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y);
        let cap = ray_capsule(&cap_ray, &transform, 0.5, 1.0, 100.0).expect("cap hit");
        assert_relative_eq!(cap.t, 3.5, epsilon = 1e-5);
        assert_relative_eq!(cap.normal.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn triangle_normal_faces_the_ray() {
        let triangle = [Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)];
        let upward = ray(Vec3::new(0.2, -3.0, 0.2), Vec3::Y);
        let hit = ray_triangle(&upward, triangle, 10.0).expect("hit");
        assert_relative_eq!(hit.t, 3.0, epsilon = 1e-5);
        assert!(hit.normal.y < -0.99);
    }

    #[test]
    fn terrain_is_hit_from_above() {
        let terrain = Terrain::flat(8, 8, Vec2::ONE, 0.5).expect("valid grid");
        let down = ray(Vec3::new(3.3, 10.0, 2.7), Vec3::NEG_Y);
        let hit = ray_triangle_source(&down, &Transform::default(), &terrain, 100.0).expect("hit");
        assert_relative_eq!(hit.t, 9.5, epsilon = 1e-4);
        assert!(hit.normal.y > 0.99);
    }
}
