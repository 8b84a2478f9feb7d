use super::mesh::Aabb;
use super::shape::Shape;
use super::types::Transform;
use crate::config::DEFAULT_BOUNDS_MARGIN;
use crate::utils::allocator::EntityId;

/// A shape attached to an entity, plus its world transform for the current step.
#[derive(Debug, Clone)]
pub struct Collidable {
    /// Owning entity; static geometry belongs to [`EntityId::WORLD`].
    pub entity: EntityId,
    pub shape: Shape,
    /// Offset from the owning entity's frame.
    pub local_transform: Transform,
    world_transform: Transform,
    bounds: Aabb,
    pub bounds_margin: f32,
}

impl Collidable {
    pub fn new(entity: EntityId, shape: Shape) -> Self {
        let bounds = shape.local_bounds();
        Self {
            entity,
            shape,
            local_transform: Transform::IDENTITY,
            world_transform: Transform::IDENTITY,
            bounds,
            bounds_margin: DEFAULT_BOUNDS_MARGIN,
        }
    }

    /// Static geometry owned by the world entity, placed at `transform`.
    pub fn fixed(shape: Shape, transform: Transform) -> Self {
        let mut collidable = Self::new(EntityId::WORLD, shape).with_offset(transform);
        collidable.update_world_transform(&Transform::IDENTITY);
        collidable
    }

    pub fn with_offset(mut self, offset: Transform) -> Self {
        self.local_transform = offset;
        self
    }

    pub fn world_transform(&self) -> &Transform {
        &self.world_transform
    }

    /// Broad-phase bounds, padded by `bounds_margin`.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn is_static(&self) -> bool {
        self.entity.is_world()
    }

    /// Recomputes the world transform and bounds from the owner's transform.
    pub fn update_world_transform(&mut self, entity_transform: &Transform) {
        self.world_transform = entity_transform.combine(&self.local_transform);
        self.bounds = self
            .shape
            .local_bounds()
            .transformed(&self.world_transform)
            .expanded(self.bounds_margin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn bounds_follow_the_owner() {
        let mut collidable = Collidable::new(EntityId::from_index(1), Shape::cuboid(Vec3::ONE))
            .with_offset(Transform::from_position(Vec3::Y));
        let owner = Transform::from_position_rotation(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
        );
        collidable.update_world_transform(&owner);
        let bounds = collidable.bounds();
        assert!((bounds.center() - Vec3::new(10.0, 1.0, 0.0)).length() < 1e-4);
        assert!(bounds.extent().x > 1.4);
    }
}
