use glam::Vec3;

use super::PairTester;
use crate::collision::contact::Contact;
use crate::core::collidable::Collidable;
use crate::core::shape::Shape;
use crate::utils::math::EPSILON;

/// Sphere against sphere: one contact along the center line.
#[derive(Debug, Default)]
pub struct SphereSphereTester;

impl PairTester for SphereSphereTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {}

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let (Shape::Sphere { radius: radius_a }, Shape::Sphere { radius: radius_b }) =
            (&a.shape, &b.shape)
        else {
            return false;
        };
        let center_a = a.world_transform().position;
        let center_b = b.world_transform().position;
        let offset = center_a - center_b;
        let distance_squared = offset.length_squared();
        let reach = radius_a + radius_b + margin;
        if distance_squared > reach * reach {
            return false;
        }

        let distance = distance_squared.sqrt();
        let normal = if distance_squared > EPSILON {
            offset / distance
        } else {
            Vec3::Y
        };
        let depth = radius_a + radius_b - distance;
        let surface_a = center_a - normal * *radius_a;
        let surface_b = center_b + normal * *radius_b;
        out.push(Contact::new((surface_a + surface_b) * 0.5, normal, depth));
        true
    }

    fn clean_up(&mut self) {}
}

/// Box (A) against sphere (B).
#[derive(Debug, Default)]
pub struct BoxSphereTester;

impl PairTester for BoxSphereTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {}

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        let (Shape::Box { half_extents }, Shape::Sphere { radius }) = (&a.shape, &b.shape) else {
            return false;
        };
        let box_transform = a.world_transform();
        let center = b.world_transform().position;
        let local_center = box_transform.inverse_transform_point(center);
        let closest = local_center.clamp(-*half_extents, *half_extents);
        let outside = local_center - closest;
        let outside_squared = outside.length_squared();

        if outside_squared > EPSILON {
            let distance = outside_squared.sqrt();
            if distance > radius + margin {
                return false;
            }
            // Sphere direction seen from the box; the manifold normal points toward the box.
            let local_normal = -outside / distance;
            let depth = radius - distance;
            let surface_box = box_transform.transform_point(closest);
            let normal = box_transform.transform_vector(local_normal);
            let surface_sphere = center + normal * *radius;
            out.push(Contact::new((surface_box + surface_sphere) * 0.5, normal, depth));
            return true;
        }

        // Center inside the box: push out through the nearest face.
        let distances = *half_extents - local_center.abs();
        let axis = if distances.x <= distances.y && distances.x <= distances.z {
            0
        } else if distances.y <= distances.z {
            1
        } else {
            2
        };
        let mut face_normal = Vec3::ZERO;
        face_normal[axis] = if local_center[axis] >= 0.0 { 1.0 } else { -1.0 };
        let depth = radius + distances[axis];
        let mut face_point = local_center;
        face_point[axis] = half_extents[axis] * face_normal[axis];
        let normal = box_transform.transform_vector(-face_normal);
        let surface_sphere = center + normal * *radius;
        let surface_box = box_transform.transform_point(face_point);
        out.push(Contact::new((surface_box + surface_sphere) * 0.5, normal, depth));
        true
    }

    fn clean_up(&mut self) {}
}
