//! Core types describing bodies, shapes, collidables and shared data.

pub mod bodies;
pub mod collidable;
pub mod entity;
pub mod mesh;
pub mod shape;
pub mod types;

pub use bodies::Bodies;
pub use collidable::Collidable;
pub use entity::Entity;
pub use mesh::{Aabb, MeshBuilder, ScaledMesh, Terrain, TriangleMesh, TriangleSource};
pub use shape::{Shape, ShapeKind};
pub use types::{
    InertiaTensorExt, MassProperties, Material, MaterialPairProperties, Transform, Velocity,
};
