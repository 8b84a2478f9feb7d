use glam::{Mat3, Vec3};

use super::PairTester;
use crate::collision::clipping::{clip_polygon, rectangle_planes};
use crate::collision::contact::Contact;
use crate::core::collidable::Collidable;
use crate::core::shape::Shape;
use crate::core::types::Transform;

/// Face axes win over edge axes unless the edge separation is larger by this much.
const EDGE_TOLERANCE: f32 = 1e-3;
/// Face axes of B must beat A's by this much to become the reference.
const FACE_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Feature {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

/// Oriented box against oriented box: separating axis test followed by face clipping.
#[derive(Debug, Default)]
pub struct BoxBoxTester {
    polygon: Vec<Vec3>,
    scratch: Vec<Vec3>,
}

struct OrientedBox {
    center: Vec3,
    axes: [Vec3; 3],
    half_extents: Vec3,
}

impl OrientedBox {
    fn new(half_extents: Vec3, transform: &Transform) -> Self {
        let rotation = Mat3::from_quat(transform.rotation);
        Self {
            center: transform.position,
            axes: [rotation.x_axis, rotation.y_axis, rotation.z_axis],
            half_extents,
        }
    }

    fn projected_radius(&self, axis: Vec3) -> f32 {
        (0..3)
            .map(|i| self.axes[i].dot(axis).abs() * self.half_extents[i])
            .sum()
    }

    fn support(&self, direction: Vec3) -> Vec3 {
        let mut point = self.center;
        for i in 0..3 {
            point += self.axes[i] * self.half_extents[i].copysign(self.axes[i].dot(direction));
        }
        point
    }

    /// Corners of the face on `axis` whose outward normal has the sign of `sign`.
    fn face(&self, axis: usize, sign: f32, out: &mut Vec<Vec3>) {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        let center = self.center + self.axes[axis] * (self.half_extents[axis] * sign);
        let du = self.axes[u] * self.half_extents[u];
        let dv = self.axes[v] * self.half_extents[v];
        out.clear();
        out.extend([center + du + dv, center - du + dv, center - du - dv, center + du - dv]);
    }
}

impl PairTester for BoxBoxTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {}

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) =
            (&a.shape, &b.shape)
        else {
            return false;
        };
        let box_a = OrientedBox::new(*ha, a.world_transform());
        let box_b = OrientedBox::new(*hb, b.world_transform());
        let offset = box_b.center - box_a.center;

        let separation = |axis: Vec3| -> f32 {
            offset.dot(axis).abs() - box_a.projected_radius(axis) - box_b.projected_radius(axis)
        };

        let mut best_face = (f32::NEG_INFINITY, Feature::FaceA(0));
        for i in 0..3 {
            let s = separation(box_a.axes[i]);
            if s > margin {
                return false;
            }
            if s > best_face.0 {
                best_face = (s, Feature::FaceA(i));
            }
        }
        for i in 0..3 {
            let s = separation(box_b.axes[i]);
            if s > margin {
                return false;
            }
            if s > best_face.0 + FACE_TOLERANCE {
                best_face = (s, Feature::FaceB(i));
            }
        }

        let mut best_edge = (f32::NEG_INFINITY, Feature::Edge(0, 0));
        for i in 0..3 {
            for j in 0..3 {
                let axis = box_a.axes[i].cross(box_b.axes[j]);
                let length_squared = axis.length_squared();
                if length_squared < 1e-6 {
                    continue;
                }
                let s = separation(axis / length_squared.sqrt());
                if s > margin {
                    return false;
                }
                if s > best_edge.0 {
                    best_edge = (s, Feature::Edge(i, j));
                }
            }
        }

        let (_, feature) = if best_edge.0 > best_face.0 + EDGE_TOLERANCE {
            best_edge
        } else {
            best_face
        };

        match feature {
            Feature::FaceA(axis) => {
                let sign = if offset.dot(box_a.axes[axis]) >= 0.0 { 1.0 } else { -1.0 };
                let normal = box_a.axes[axis] * sign;
                let first = out.len();
                self.clip_faces(&box_a, axis, normal, &box_b, margin, out);
                // Reference normal points from A toward B; manifolds want B toward A.
                for contact in &mut out[first..] {
                    contact.normal = -contact.normal;
                }
            }
            Feature::FaceB(axis) => {
                let sign = if offset.dot(box_b.axes[axis]) <= 0.0 { 1.0 } else { -1.0 };
                let normal = box_b.axes[axis] * sign;
                self.clip_faces(&box_b, axis, normal, &box_a, margin, out);
            }
            Feature::Edge(i, j) => {
                let mut axis = box_a.axes[i].cross(box_b.axes[j]).normalize();
                if axis.dot(offset) < 0.0 {
                    axis = -axis;
                }
                let edge_a = box_a.support(axis);
                let edge_b = box_b.support(-axis);
                let (point_a, point_b) =
                    closest_points_on_lines(edge_a, box_a.axes[i], edge_b, box_b.axes[j]);
                let depth = (point_a - point_b).dot(axis);
                out.push(Contact::new((point_a + point_b) * 0.5, -axis, depth).with_id(16));
            }
        }
        true
    }

    fn clean_up(&mut self) {
        self.polygon.clear();
        self.scratch.clear();
    }
}

impl BoxBoxTester {
    /// Clips the incident face against the reference face's side planes.
    ///
    /// `normal` is the outward reference normal, pointing toward the incident box. Emitted
    /// contacts carry `normal` unchanged.
    fn clip_faces(
        &mut self,
        reference: &OrientedBox,
        axis: usize,
        normal: Vec3,
        incident: &OrientedBox,
        margin: f32,
        out: &mut Vec<Contact>,
    ) {
        let incident_axis = (0..3)
            .max_by(|&x, &y| {
                incident.axes[x]
                    .dot(normal)
                    .abs()
                    .total_cmp(&incident.axes[y].dot(normal).abs())
            })
            .unwrap_or(0);
        let incident_sign = if incident.axes[incident_axis].dot(normal) > 0.0 { -1.0 } else { 1.0 };
        incident.face(incident_axis, incident_sign, &mut self.polygon);

        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        let face_center = reference.center + normal * reference.half_extents[axis];
        let planes = rectangle_planes(
            face_center,
            reference.axes[u],
            reference.axes[v],
            reference.half_extents[u],
            reference.half_extents[v],
        );
        clip_polygon(&mut self.polygon, &planes, &mut self.scratch);

        for (index, point) in self.polygon.iter().enumerate() {
            let separation = (*point - face_center).dot(normal);
            if separation > margin {
                continue;
            }
            let position = *point - normal * (separation * 0.5);
            out.push(Contact::new(position, normal, -separation).with_id(index as u32));
        }
    }
}

/// Closest points between two infinite lines `p1 + s d1` and `p2 + t d2`.
fn closest_points_on_lines(p1: Vec3, d1: Vec3, p2: Vec3, d2: Vec3) -> (Vec3, Vec3) {
    let r = p1 - p2;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let b = d1.dot(d2);
    let c = d1.dot(r);
    let f = d2.dot(r);
    let denominator = a * e - b * b;
    if denominator.abs() < 1e-8 {
        return (p1, p2 + d2 * (f / e));
    }
    let s = (b * f - c * e) / denominator;
    let t = (a * f - b * c) / denominator;
    (p1 + d1 * s, p2 + d2 * t)
}
