use super::entity::Entity;
use crate::error::{PhysicsError, Result};
use crate::utils::allocator::{Arena, EntityId};

/// Body storage whose first slot always holds the immovable world entity.
#[derive(Debug, Clone)]
pub struct Bodies {
    arena: Arena<Entity>,
}

impl Default for Bodies {
    fn default() -> Self {
        Self::new()
    }
}

impl Bodies {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let world = arena.insert(Entity::world());
        debug_assert_eq!(world, EntityId::WORLD);
        Self { arena }
    }

    pub fn insert(&mut self, entity: Entity) -> EntityId {
        self.arena.insert(entity)
    }

    pub fn remove(&mut self, id: EntityId) -> Result<Entity> {
        if id.is_world() {
            return Err(PhysicsError::WorldEntityImmutable);
        }
        self.arena.remove(id).ok_or(PhysicsError::InvalidEntity(id))
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(id)
    }

    /// Mutable access; the world entity is never handed out.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if id.is_world() {
            return None;
        }
        self.arena.get_mut(id)
    }

    /// Both bodies of a two-entity constraint. Fails when the ids coincide or are stale.
    pub fn get2_mut(&mut self, a: EntityId, b: EntityId) -> Option<(&mut Entity, &mut Entity)> {
        self.arena.get2_mut(a, b)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.arena.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.arena.iter().filter(|(id, _)| !id.is_world())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut Entity)> + '_ {
        self.arena.iter_mut().filter(|(id, _)| !id.is_world())
    }

    /// Number of user bodies, excluding the world entity.
    pub fn len(&self) -> usize {
        self.arena.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dynamic(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(Entity::is_dynamic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_entity_cannot_be_removed() {
        let mut bodies = Bodies::new();
        assert!(bodies.contains(EntityId::WORLD));
        assert_eq!(
            bodies.remove(EntityId::WORLD).err(),
            Some(PhysicsError::WorldEntityImmutable)
        );
        assert!(bodies.get_mut(EntityId::WORLD).is_none());
        assert!(bodies.is_empty());
    }

    #[test]
    fn pairs_with_the_world_are_mutable() {
        let mut bodies = Bodies::new();
        let id = bodies.insert(Entity::default());
        let (world, body) = bodies.get2_mut(EntityId::WORLD, id).expect("distinct bodies");
        assert!(!world.is_dynamic());
        assert!(body.is_dynamic());
        assert_eq!(bodies.len(), 1);
    }
}
