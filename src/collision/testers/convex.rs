use glam::Vec3;

use super::gjk::{self, PlacedConvex};
use super::PairTester;
use crate::collision::contact::Contact;
use crate::core::collidable::Collidable;

/// Any two convex primitives, one GJK/EPA contact per step.
///
/// The manifold accumulates the single contacts over several steps into a full patch.
#[derive(Debug, Default)]
pub struct ConvexPairTester {
    /// Last normal found; seeds the next search.
    cached_direction: Vec3,
}

impl PairTester for ConvexPairTester {
    fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {
        self.cached_direction = Vec3::ZERO;
    }

    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool {
        if !a.shape.kind().is_convex() || !b.shape.kind().is_convex() {
            return false;
        }
        let placed_a = PlacedConvex {
            shape: &a.shape,
            transform: a.world_transform(),
        };
        let placed_b = PlacedConvex {
            shape: &b.shape,
            transform: b.world_transform(),
        };
        match gjk::penetration(&placed_a, &placed_b, margin, self.cached_direction) {
            Some(hit) => {
                self.cached_direction = -hit.normal;
                out.push(hit.to_contact());
                true
            }
            None => false,
        }
    }

    fn clean_up(&mut self) {
        self.cached_direction = Vec3::ZERO;
    }
}
