use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::types::Transform;

/// A single point of contact between two collidables.
///
/// `normal` points from B toward A; `penetration_depth` is positive while the shapes overlap
/// and negative for speculative contacts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Contact {
    pub position: Vec3,
    pub normal: Vec3,
    pub penetration_depth: f32,
    /// Feature identifier reported by the tester that produced the contact.
    pub id: u32,
}

impl Contact {
    pub fn new(position: Vec3, normal: Vec3, penetration_depth: f32) -> Self {
        Self {
            position,
            normal,
            penetration_depth,
            id: 0,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// The same contact seen from the other collidable.
    pub fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// Local-space data stored beside each manifold contact for incremental refresh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactSupplementData {
    /// Contact position relative to collidable A, in A's local frame.
    pub local_offset_a: Vec3,
    /// Contact position relative to collidable B, in B's local frame.
    pub local_offset_b: Vec3,
    /// Penetration depth when the contact was created or last overwritten.
    pub base_depth: f32,
}

impl ContactSupplementData {
    pub fn capture(contact: &Contact, transform_a: &Transform, transform_b: &Transform) -> Self {
        Self {
            local_offset_a: transform_a.inverse_transform_point(contact.position),
            local_offset_b: transform_b.inverse_transform_point(contact.position),
            base_depth: contact.penetration_depth,
        }
    }

    /// World-space anchors on A and B for the current transforms.
    pub fn anchors(&self, transform_a: &Transform, transform_b: &Transform) -> (Vec3, Vec3) {
        (
            transform_a.transform_point(self.local_offset_a),
            transform_b.transform_point(self.local_offset_b),
        )
    }
}

/// Change to a manifold's contact list, drained by the owning pair handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Added(usize),
    Removed(usize),
}
