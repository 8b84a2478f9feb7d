use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

/// Unique identifier with generation tracking to prevent stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Typed handle stored in an [`Arena`].
pub trait ArenaId: Copy {
    fn from_raw(raw: GenerationalId) -> Self;
    fn raw(&self) -> GenerationalId;

    fn index(&self) -> usize {
        self.raw().index
    }

    fn generation(&self) -> u32 {
        self.raw().generation
    }
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub GenerationalId);

        impl $name {
            pub fn new(index: usize, generation: u32) -> Self {
                Self(GenerationalId::new(index, generation))
            }

            pub fn from_index(index: u32) -> Self {
                Self::new(index as usize, 0)
            }

            pub fn index(&self) -> usize {
                self.0.index
            }

            pub fn generation(&self) -> u32 {
                self.0.generation
            }
        }

        impl ArenaId for $name {
            fn from_raw(raw: GenerationalId) -> Self {
                Self(raw)
            }

            fn raw(&self) -> GenerationalId {
                self.0
            }
        }
    };
}

arena_id!(
    /// Identifier of a rigid body.
    EntityId
);
arena_id!(
    /// Identifier of a collidable registered with the world.
    CollidableId
);
arena_id!(
    /// Identifier of a user constraint (joint, motor, solver group).
    ConstraintId
);
arena_id!(
    /// Identifier of a simulation island.
    IslandId
);
arena_id!(
    /// Identifier of an island connection.
    ConnectionId
);

impl EntityId {
    /// The immovable world entity always occupies the first slot of a body set.
    pub const WORLD: EntityId = EntityId(GenerationalId {
        index: 0,
        generation: 0,
    });

    pub fn is_world(&self) -> bool {
        *self == Self::WORLD
    }
}

impl GenerationalId {
    pub fn is_null(&self) -> bool {
        self.index == usize::MAX
    }
}

impl Default for GenerationalId {
    fn default() -> Self {
        GenerationalId::new(usize::MAX, 0)
    }
}

/// Generational arena that hands out stable IDs while preventing use-after-free.
pub struct Arena<T, I: ArenaId = EntityId> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    _id: PhantomData<fn() -> I>,
}

impl<T, I: ArenaId> Default for Arena<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, I: ArenaId> Clone for Arena<T, I> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            generations: self.generations.clone(),
            free_list: self.free_list.clone(),
            _id: PhantomData,
        }
    }
}

impl<T: fmt::Debug, I: ArenaId + fmt::Debug> fmt::Debug for Arena<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T, I: ArenaId> Arena<T, I> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            _id: PhantomData,
        }
    }

    pub fn insert(&mut self, item: T) -> I {
        if let Some(index) = self.free_list.pop_front() {
            let generation = self.generations[index];
            self.items[index] = Some(item);
            return I::from_raw(GenerationalId::new(index, generation));
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        I::from_raw(GenerationalId::new(index, 0))
    }

    pub fn get(&self, id: I) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index()).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn get2_mut(&mut self, id_a: I, id_b: I) -> Option<(&mut T, &mut T)> {
        if id_a.index() == id_b.index() {
            return None;
        }

        if !self.is_valid(id_a) || !self.is_valid(id_b) {
            return None;
        }

        let (first, second, flipped) = if id_a.index() < id_b.index() {
            (id_a, id_b, false)
        } else {
            (id_b, id_a, true)
        };

        let second_index = second.index();
        if second_index >= self.items.len() {
            return None;
        }

        let (left, right) = self.items.split_at_mut(second_index);
        let first_slot = left
            .get_mut(first.index())
            .and_then(|slot| slot.as_mut())?;
        let second_slot = right.get_mut(0).and_then(|slot| slot.as_mut())?;

        if flipped {
            Some((second_slot, first_slot))
        } else {
            Some((first_slot, second_slot))
        }
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index())?;
        if slot.is_some() {
            self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
            self.free_list.push_back(id.index());
        }
        slot.take()
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        let generations = &self.generations;
        self.items.iter().enumerate().filter_map(move |(index, slot)| {
            slot.as_ref()
                .map(|item| (I::from_raw(GenerationalId::new(index, generations[index])), item))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> + '_ {
        let generations = &self.generations;
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_mut().map(|item| {
                    (I::from_raw(GenerationalId::new(index, generations[index])), item)
                })
            })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|_| I::from_raw(GenerationalId::new(index, self.generations[index])))
        })
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_valid(&self, id: I) -> bool {
        self.generations
            .get(id.index())
            .copied()
            .map(|gen| gen == id.generation())
            .unwrap_or(false)
    }
}
