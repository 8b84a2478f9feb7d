//! Error types for world configuration and pair wiring.
//!
//! The per-step hot path (manifold refresh, solver iterations) never fails; errors surface
//! only when the world is configured or mutated.

use thiserror::Error;

use crate::{
    collision::pair_handler::PairKind,
    core::shape::ShapeKind,
    utils::allocator::{CollidableId, ConstraintId, EntityId},
};

/// Errors returned by fallible physics operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// No pair handler exists for this combination of shapes.
    #[error("no pair handler supports {a:?} vs {b:?}")]
    UnsupportedPair { a: ShapeKind, b: ShapeKind },

    /// A handler was initialized with shapes it cannot process. This is a wiring bug.
    #[error("{kind:?} handler cannot process {a:?} vs {b:?}")]
    InvalidPairConfiguration {
        kind: PairKind,
        a: ShapeKind,
        b: ShapeKind,
    },

    /// Entity id does not refer to a live body.
    #[error("invalid entity: {0:?}")]
    InvalidEntity(EntityId),

    /// Collidable id does not refer to a live collidable.
    #[error("invalid collidable: {0:?}")]
    InvalidCollidable(CollidableId),

    /// Constraint id does not refer to a live constraint.
    #[error("invalid constraint: {0:?}")]
    InvalidConstraint(ConstraintId),

    /// The world entity cannot be removed or mutated.
    #[error("the world entity cannot be modified")]
    WorldEntityImmutable,

    /// A settings value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PhysicsError>;
