//! Polygon clipping used to build face-face contact patches.

use glam::Vec3;

const EPSILON: f32 = 1e-4;

/// Half-space `normal · p <= distance`.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalize_or_zero();
        Self {
            normal: n,
            distance: n.dot(point),
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

/// Clips `polygon` in place against every plane (Sutherland-Hodgman).
///
/// `scratch` is reused between calls to avoid allocating per pair.
pub fn clip_polygon(polygon: &mut Vec<Vec3>, planes: &[Plane], scratch: &mut Vec<Vec3>) {
    for plane in planes {
        if polygon.is_empty() {
            return;
        }
        scratch.clear();
        clip_against_plane(polygon, *plane, scratch);
        std::mem::swap(polygon, scratch);
    }
}

fn clip_against_plane(vertices: &[Vec3], plane: Plane, out: &mut Vec<Vec3>) {
    for i in 0..vertices.len() {
        let current = vertices[i];
        let next = vertices[(i + 1) % vertices.len()];

        let current_dist = plane.signed_distance(current);
        let next_dist = plane.signed_distance(next);

        let current_inside = current_dist <= EPSILON;
        let next_inside = next_dist <= EPSILON;

        match (current_inside, next_inside) {
            (true, true) => out.push(next),
            (true, false) => out.extend(intersection(current, next, current_dist, next_dist)),
            (false, true) => {
                out.extend(intersection(current, next, current_dist, next_dist));
                out.push(next);
            }
            (false, false) => {}
        }
    }
}

fn intersection(start: Vec3, end: Vec3, start_dist: f32, end_dist: f32) -> Option<Vec3> {
    let denom = start_dist - end_dist;
    if denom.abs() <= EPSILON {
        return None;
    }
    let t = start_dist / denom;
    Some(start + (end - start) * t)
}

/// Side planes of a rectangle with the given tangents and half-extents.
pub fn rectangle_planes(
    center: Vec3,
    tangent_u: Vec3,
    tangent_v: Vec3,
    half_u: f32,
    half_v: f32,
) -> [Plane; 4] {
    [
        Plane::from_point_normal(center + tangent_u * half_u, tangent_u),
        Plane::from_point_normal(center - tangent_u * half_u, -tangent_u),
        Plane::from_point_normal(center + tangent_v * half_v, tangent_v),
        Plane::from_point_normal(center - tangent_v * half_v, -tangent_v),
    ]
}
