//! Utility helpers: generational arenas, math extensions, pools, logging and validation.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod pool;
pub mod validation;

pub use allocator::{
    Arena, ArenaId, CollidableId, ConnectionId, ConstraintId, EntityId, GenerationalId, IslandId,
};
pub use math::*;
pub use pool::{LockedStorage, PoolStorage, ResourcePool, SingleOwnerStorage};
