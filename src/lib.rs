//! Impulse Core – rigid-body contact and constraint simulation.
//!
//! The crate turns overlapping collidables into persistent contact manifolds and solves
//! contacts, joints and motors with a warm-started sequential-impulse solver. Connected bodies
//! are grouped into simulation islands that fall asleep together once they come to rest.
//!
//! [`PhysicsWorld`] drives the whole pipeline; the lower layers (manifolds, pair handlers,
//! constraints, the solver) are public so they can be embedded in other drivers.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use collision::{
    contact::{Contact, ContactEvent},
    manifold::ContactManifold,
    pair_handler::{PairHandler, PairKind},
    queries::RayHit,
    BroadPhase,
};
pub use config::{
    CollisionSettings, DeactivationSettings, MotorMode, MotorSettings, SolverSettings,
    SpringSettings, WorldConfig,
};
pub use core::{
    collidable::Collidable,
    entity::Entity,
    shape::{Shape, ShapeKind},
    types::{MassProperties, Material, Transform, Velocity},
};
pub use dynamics::{
    constraint::{Constraint, SolverUpdateable},
    contact_constraint::ContactInformation,
    joints::{BallSocketJoint, NoRotationJoint, RevoluteAngularJoint, RevoluteLimit, RevoluteMotor},
    motors::{SingleEntityAngularMotor, SingleEntityLinearMotor},
    solver_group::SolverGroup,
};
pub use error::{PhysicsError, Result};
pub use utils::allocator::{CollidableId, ConstraintId, EntityId, IslandId};
pub use world::{PhysicsWorld, StepMetrics};
