//! Gilbert-Johnson-Keerthi intersection with EPA penetration depth.
//!
//! Shapes are queried through [`SupportMap`]. Shape A is inflated by a margin so that pairs
//! separated by less than the margin still produce a (negative depth) speculative contact.

use glam::Vec3;

use crate::collision::contact::Contact;
use crate::core::shape::Shape;
use crate::core::types::Transform;

/// World-space support function of a convex set.
pub trait SupportMap {
    fn support(&self, direction: Vec3) -> Vec3;
    fn center(&self) -> Vec3;
}

/// A convex [`Shape`] placed at a world transform.
pub struct PlacedConvex<'a> {
    pub shape: &'a Shape,
    pub transform: &'a Transform,
}

impl SupportMap for PlacedConvex<'_> {
    fn support(&self, direction: Vec3) -> Vec3 {
        let local = self.transform.inverse_transform_vector(direction);
        let point = self.shape.local_support(local).unwrap_or(Vec3::ZERO);
        self.transform.transform_point(point)
    }

    fn center(&self) -> Vec3 {
        self.transform.position
    }
}

/// A world-space triangle.
pub struct TriangleSupport(pub [Vec3; 3]);

impl SupportMap for TriangleSupport {
    fn support(&self, direction: Vec3) -> Vec3 {
        let [a, b, c] = self.0;
        let (da, db, dc) = (a.dot(direction), b.dot(direction), c.dot(direction));
        if da >= db && da >= dc {
            a
        } else if db >= dc {
            b
        } else {
            c
        }
    }

    fn center(&self) -> Vec3 {
        (self.0[0] + self.0[1] + self.0[2]) / 3.0
    }
}

/// Minkowski-difference vertex remembering the witness points on each shape.
#[derive(Debug, Clone, Copy)]
struct SupportPoint {
    point: Vec3,
    a: Vec3,
    b: Vec3,
}

/// Penetration between two convex sets.
#[derive(Debug, Clone, Copy)]
pub struct Penetration {
    /// Unit normal pointing from B toward A.
    pub normal: Vec3,
    /// Positive when overlapping, negative when separated by less than the margin.
    pub depth: f32,
    pub point_a: Vec3,
    pub point_b: Vec3,
}

impl Penetration {
    pub fn to_contact(&self) -> Contact {
        Contact::new((self.point_a + self.point_b) * 0.5, self.normal, self.depth)
    }
}

const GJK_MAX_ITERATIONS: usize = 32;
const EPA_MAX_ITERATIONS: usize = 32;
const EPSILON: f32 = 1e-6;

/// Runs GJK/EPA on A inflated by `margin` against B.
///
/// `initial_direction` seeds the search; testers cache the last separating direction here.
pub fn penetration<A, B>(a: &A, b: &B, margin: f32, initial_direction: Vec3) -> Option<Penetration>
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let support = |direction: Vec3| -> SupportPoint {
        let unit = direction.normalize_or_zero();
        let on_a = a.support(direction);
        let on_b = b.support(-direction);
        SupportPoint {
            point: on_a + unit * margin - on_b,
            a: on_a,
            b: on_b,
        }
    };

    let mut direction = initial_direction;
    if direction.length_squared() < EPSILON {
        direction = b.center() - a.center();
    }
    if direction.length_squared() < EPSILON {
        direction = Vec3::X;
    }

    let mut simplex: Vec<SupportPoint> = Vec::with_capacity(4);
    for _ in 0..GJK_MAX_ITERATIONS {
        let vertex = support(direction);
        if vertex.point.dot(direction) < 0.0 {
            return None;
        }
        simplex.push(vertex);
        if contains_origin(&mut simplex, &mut direction) {
            let (distance, normal, point_a, point_b) = expand(&simplex, &support)?;
            return Some(Penetration {
                normal: -normal,
                depth: distance - margin,
                point_a,
                point_b,
            });
        }
        if direction.length_squared() < EPSILON {
            return None;
        }
    }
    None
}

fn contains_origin(simplex: &mut Vec<SupportPoint>, direction: &mut Vec3) -> bool {
    match simplex.len() {
        1 => {
            *direction = -simplex[0].point;
            false
        }
        2 => {
            let a = simplex[1].point;
            let b = simplex[0].point;
            let ab = b - a;
            let ao = -a;
            let dir = ab.cross(ao).cross(ab);
            if dir.length_squared() < EPSILON {
                // Origin lies on AB; any perpendicular works.
                let axis = if ab.x.abs() < 0.1 { Vec3::X } else { Vec3::Y };
                *direction = ab.cross(axis);
            } else {
                *direction = dir;
            }
            false
        }
        3 => {
            let a = simplex[2].point;
            let b = simplex[1].point;
            let c = simplex[0].point;
            let ab = b - a;
            let ac = c - a;
            let ao = -a;
            let abc = ab.cross(ac);

            if abc.cross(ac).dot(ao) > 0.0 {
                simplex.remove(1);
                *direction = ac.cross(ao).cross(ac);
            } else if ab.cross(abc).dot(ao) > 0.0 {
                simplex.remove(0);
                *direction = ab.cross(ao).cross(ab);
            } else if abc.length_squared() < EPSILON {
                simplex.remove(0);
                *direction = crate::utils::math::perpendicular(ab);
            } else if abc.dot(ao) > 0.0 {
                *direction = abc;
            } else {
                simplex.swap(0, 1);
                *direction = -abc;
            }
            false
        }
        4 => {
            let a = simplex[3].point;
            let b = simplex[2].point;
            let c = simplex[1].point;
            let d = simplex[0].point;
            let ab = b - a;
            let ac = c - a;
            let ad = d - a;
            let ao = -a;
            let abc = ab.cross(ac);
            let acd = ac.cross(ad);
            let adb = ad.cross(ab);

            if abc.dot(ao) > 0.0 {
                simplex.remove(0);
                *direction = abc;
                false
            } else if acd.dot(ao) > 0.0 {
                simplex.remove(2);
                *direction = acd;
                false
            } else if adb.dot(ao) > 0.0 {
                simplex.remove(1);
                *direction = adb;
                false
            } else {
                true
            }
        }
        _ => false,
    }
}

type Face = (usize, usize, usize);

/// Expanding polytope; returns `(distance, normal, witness_a, witness_b)` where `normal` points
/// from the origin to the closest face of the Minkowski difference.
fn expand<F>(simplex: &[SupportPoint], support: &F) -> Option<(f32, Vec3, Vec3, Vec3)>
where
    F: Fn(Vec3) -> SupportPoint,
{
    let mut polytope = simplex.to_vec();
    let mut faces: Vec<Face> = vec![(0, 1, 2), (0, 2, 3), (0, 3, 1), (1, 3, 2)];
    for face in &mut faces {
        let normal = face_normal(&polytope, *face);
        if polytope[face.0].point.dot(normal) < 0.0 {
            std::mem::swap(&mut face.1, &mut face.2);
        }
    }

    let mut closest = closest_face(&polytope, &faces)?;
    for _ in 0..EPA_MAX_ITERATIONS {
        let (_, distance, normal) = closest;
        let vertex = support(normal);
        if vertex.point.dot(normal) - distance < 1e-4 {
            break;
        }
        expand_polytope(&mut polytope, &mut faces, vertex);
        closest = match closest_face(&polytope, &faces) {
            Some(face) => face,
            None => break,
        };
    }

    let (face_index, distance, normal) = closest;
    let (i, j, k) = faces[face_index];
    let (u, v, w) = barycentric(
        normal * distance,
        polytope[i].point,
        polytope[j].point,
        polytope[k].point,
    );
    let witness_a = polytope[i].a * u + polytope[j].a * v + polytope[k].a * w;
    let witness_b = polytope[i].b * u + polytope[j].b * v + polytope[k].b * w;
    Some((distance, normal, witness_a, witness_b))
}

fn face_normal(polytope: &[SupportPoint], (a, b, c): Face) -> Vec3 {
    let ab = polytope[b].point - polytope[a].point;
    let ac = polytope[c].point - polytope[a].point;
    ab.cross(ac).normalize_or_zero()
}

fn closest_face(polytope: &[SupportPoint], faces: &[Face]) -> Option<(usize, f32, Vec3)> {
    let mut best: Option<(usize, f32, Vec3)> = None;
    for (index, face) in faces.iter().enumerate() {
        let normal = face_normal(polytope, *face);
        if normal == Vec3::ZERO {
            continue;
        }
        let distance = polytope[face.0].point.dot(normal);
        if best.map_or(true, |(_, best_distance, _)| distance < best_distance) {
            best = Some((index, distance, normal));
        }
    }
    best
}

fn expand_polytope(polytope: &mut Vec<SupportPoint>, faces: &mut Vec<Face>, vertex: SupportPoint) {
    let new_index = polytope.len();
    polytope.push(vertex);

    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < faces.len() {
        let (a, b, c) = faces[i];
        let normal = face_normal(polytope, faces[i]);
        if normal.dot(vertex.point - polytope[a].point) > 0.0 {
            for edge in [(a, b), (b, c), (c, a)] {
                // Shared edges cancel out; what remains is the horizon.
                if let Some(position) = edges.iter().position(|&e| e == (edge.1, edge.0)) {
                    edges.swap_remove(position);
                } else {
                    edges.push(edge);
                }
            }
            faces.swap_remove(i);
        } else {
            i += 1;
        }
    }

    for (u, v) in edges {
        faces.push((u, v, new_index));
    }
}

fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denominator = d00 * d11 - d01 * d01;
    if denominator.abs() < EPSILON {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denominator;
    let w = (d00 * d21 - d01 * d20) / denominator;
    (1.0 - v - w, v, w)
}
