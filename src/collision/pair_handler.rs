//! Pair handlers bind two collidables to a contact manifold and its solver constraint.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::contact::ContactEvent;
use super::manifold::ContactManifold;
use super::testers::{
    tester_pool, BoxBoxTester, BoxSphereTester, ConvexPairTester, MeshPairTester, PairTester,
    SphereSphereTester, TesterPool, TesterSource, TriangleConvexTester, TriangleSphereTester,
};
use crate::config::{CollisionSettings, SolverSettings};
use crate::core::bodies::Bodies;
use crate::core::collidable::Collidable;
use crate::core::shape::ShapeKind;
use crate::core::types::Transform;
use crate::dynamics::contact_constraint::{ContactInformation, ContactManifoldConstraint};
use crate::error::{PhysicsError, Result};
use crate::utils::allocator::{CollidableId, ConnectionId, EntityId};
use crate::utils::pool::ResourcePool;

/// Which handler, and therefore which tester, processes a pair.
///
/// The variant fixes the expected shape order: the box is A in `BoxSphere`, and the triangle,
/// mesh or terrain is always B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKind {
    SphereSphere,
    BoxSphere,
    BoxBox,
    Convex,
    TriangleSphere,
    TriangleConvex,
    MeshSphere,
    MeshConvex,
    TerrainSphere,
    TerrainConvex,
}

impl PairKind {
    pub const ALL: [PairKind; 10] = [
        PairKind::SphereSphere,
        PairKind::BoxSphere,
        PairKind::BoxBox,
        PairKind::Convex,
        PairKind::TriangleSphere,
        PairKind::TriangleConvex,
        PairKind::MeshSphere,
        PairKind::MeshConvex,
        PairKind::TerrainSphere,
        PairKind::TerrainConvex,
    ];

    /// Picks the handler for two shapes. The flag is `true` when A and B must be swapped to
    /// match the handler's order.
    pub fn for_shapes(a: ShapeKind, b: ShapeKind) -> Result<(PairKind, bool)> {
        if let Some(kind) = Self::ordered(a, b) {
            return Ok((kind, false));
        }
        if let Some(kind) = Self::ordered(b, a) {
            return Ok((kind, true));
        }
        Err(PhysicsError::UnsupportedPair { a, b })
    }

    fn ordered(a: ShapeKind, b: ShapeKind) -> Option<PairKind> {
        use ShapeKind::*;
        let kind = match (a, b) {
            (Sphere, Sphere) => PairKind::SphereSphere,
            (Box, Sphere) => PairKind::BoxSphere,
            (Box, Box) => PairKind::BoxBox,
            (Sphere, Box) => return None,
            (a, b) if a.is_convex() && b.is_convex() => PairKind::Convex,
            (Sphere, Triangle) => PairKind::TriangleSphere,
            (a, Triangle) if a.is_convex() => PairKind::TriangleConvex,
            (Sphere, StaticMesh | InstancedMesh) => PairKind::MeshSphere,
            (a, StaticMesh | InstancedMesh) if a.is_convex() => PairKind::MeshConvex,
            (Sphere, Terrain) => PairKind::TerrainSphere,
            (a, Terrain) if a.is_convex() => PairKind::TerrainConvex,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether this handler can process `a` against `b` in that order.
    pub fn accepts(self, a: ShapeKind, b: ShapeKind) -> bool {
        Self::ordered(a, b) == Some(self)
    }

    fn new_pool(self) -> TesterPool {
        match self {
            PairKind::SphereSphere => tester_pool::<SphereSphereTester>(),
            PairKind::BoxSphere => tester_pool::<BoxSphereTester>(),
            PairKind::BoxBox => tester_pool::<BoxBoxTester>(),
            PairKind::Convex => tester_pool::<ConvexPairTester>(),
            PairKind::TriangleSphere => tester_pool::<TriangleSphereTester>(),
            PairKind::TriangleConvex => tester_pool::<TriangleConvexTester>(),
            PairKind::MeshSphere | PairKind::TerrainSphere => ResourcePool::locked(|| {
                Box::new(MeshPairTester::for_spheres()) as Box<dyn PairTester>
            }),
            PairKind::MeshConvex | PairKind::TerrainConvex => ResourcePool::locked(|| {
                Box::new(MeshPairTester::for_convexes()) as Box<dyn PairTester>
            }),
        }
    }
}

/// One shared, thread-safe tester pool per pair kind.
#[derive(Clone)]
pub struct TesterPools {
    pools: HashMap<PairKind, Arc<TesterPool>>,
}

impl Default for TesterPools {
    fn default() -> Self {
        Self::new()
    }
}

impl TesterPools {
    pub fn new() -> Self {
        let pools = PairKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::new(kind.new_pool())))
            .collect();
        Self { pools }
    }

    pub fn get(&self, kind: PairKind) -> Option<&Arc<TesterPool>> {
        self.pools.get(&kind)
    }

    /// Testers currently lent out across every kind.
    pub fn outstanding(&self) -> usize {
        self.pools.values().map(|pool| pool.outstanding()).sum()
    }
}

/// Result of one handler update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairUpdate {
    pub added: usize,
    pub removed: usize,
}

/// Owns the manifold and contact constraint for one collidable pair.
///
/// The manifold's events are replayed onto the constraint after every update, so both always
/// hold the same number of contacts in the same order.
pub struct PairHandler {
    kind: PairKind,
    collidables: (CollidableId, CollidableId),
    manifold: ContactManifold,
    constraint: ContactManifoldConstraint,
    connection: Option<ConnectionId>,
    last_update: PairUpdate,
    /// World transforms of both collidables at the last refresh; `None` until the first one.
    refreshed_at: Option<(Transform, Transform)>,
}

impl PairHandler {
    /// Builds a handler for `a` and `b`, already in the order `kind` expects.
    pub fn new(
        kind: PairKind,
        pools: &TesterPools,
        (id_a, a): (CollidableId, &Collidable),
        (id_b, b): (CollidableId, &Collidable),
        collision: CollisionSettings,
        solver: SolverSettings,
    ) -> Result<Self> {
        let (kind_a, kind_b) = (a.shape.kind(), b.shape.kind());
        let invalid = || PhysicsError::InvalidPairConfiguration {
            kind,
            a: kind_a,
            b: kind_b,
        };
        if !kind.accepts(kind_a, kind_b) {
            return Err(invalid());
        }
        let pool = pools.get(kind).ok_or_else(invalid)?;
        let source: Arc<dyn TesterSource> = pool.clone();

        let mut manifold = ContactManifold::new(source, collision);
        manifold.initialize(a, b);
        debug!("pair handler {:?} created for {:?} / {:?}", kind, id_a, id_b);

        Ok(Self {
            kind,
            collidables: (id_a, id_b),
            manifold,
            constraint: ContactManifoldConstraint::new(a.entity, b.entity, solver),
            connection: None,
            last_update: PairUpdate::default(),
            refreshed_at: None,
        })
    }

    pub fn kind(&self) -> PairKind {
        self.kind
    }

    pub fn collidables(&self) -> (CollidableId, CollidableId) {
        self.collidables
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        self.constraint.entities()
    }

    pub fn manifold(&self) -> &ContactManifold {
        &self.manifold
    }

    pub fn constraint(&self) -> &ContactManifoldConstraint {
        &self.constraint
    }

    pub fn constraint_mut(&mut self) -> &mut ContactManifoldConstraint {
        &mut self.constraint
    }

    pub fn contact_count(&self) -> usize {
        self.manifold.len()
    }

    /// Island connection registered while the manifold has contacts.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn set_connection(&mut self, connection: Option<ConnectionId>) {
        self.connection = connection;
    }

    pub fn take_connection(&mut self) -> Option<ConnectionId> {
        self.connection.take()
    }

    /// Refreshes the manifold against the collidables' current transforms and mirrors its
    /// changes onto the constraint.
    pub fn update(&mut self, a: &Collidable, b: &Collidable, dt: f32) -> PairUpdate {
        self.manifold.update(a, b, dt);

        let mut summary = PairUpdate::default();
        for event in self.manifold.drain_events() {
            match event {
                ContactEvent::Added(_) => summary.added += 1,
                ContactEvent::Removed(_) => summary.removed += 1,
            }
            self.constraint.apply_event(event);
        }
        self.constraint.sync_contacts(self.manifold.contacts());
        self.last_update = summary;
        self.refreshed_at = Some((*a.world_transform(), *b.world_transform()));
        summary
    }

    /// Whether either collidable moved since the last refresh. New handlers count as moved.
    pub fn moved_since_update(&self, a: &Collidable, b: &Collidable) -> bool {
        match self.refreshed_at {
            Some((pose_a, pose_b)) => {
                pose_a != *a.world_transform() || pose_b != *b.world_transform()
            }
            None => true,
        }
    }

    /// Marks a step in which the pair was not refreshed.
    pub(crate) fn skip_update(&mut self) {
        self.last_update = PairUpdate::default();
    }

    /// Changes made by the most recent [`update`](Self::update).
    pub fn last_update(&self) -> PairUpdate {
        self.last_update
    }

    /// Snapshot of every contact with its impulses.
    pub fn contact_information(&self, bodies: &Bodies) -> Vec<ContactInformation> {
        (0..self.constraint.len())
            .filter_map(|index| self.constraint.contact_information(index, bodies))
            .collect()
    }

    /// Releases the tester and forgets every contact.
    pub fn clean_up(&mut self) {
        self.manifold.clean_up();
        self.constraint.clear();
        debug!("pair handler {:?} removed for {:?}", self.kind, self.collidables);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;
    use crate::core::types::Transform;
    use glam::Vec3;

    fn sphere_at(entity: u32, x: f32) -> Collidable {
        let mut collidable = Collidable::new(EntityId::from_index(entity), Shape::sphere(0.5));
        collidable.update_world_transform(&Transform::from_position(Vec3::new(x, 0.0, 0.0)));
        collidable
    }

    #[test]
    fn dispatch_orders_shapes_for_the_handler() {
        use ShapeKind::*;
        assert_eq!(PairKind::for_shapes(Sphere, Box).ok(), Some((PairKind::BoxSphere, true)));
        assert_eq!(
            PairKind::for_shapes(Terrain, Capsule).ok(),
            Some((PairKind::TerrainConvex, true))
        );
        assert_eq!(
            PairKind::for_shapes(Sphere, InstancedMesh).ok(),
            Some((PairKind::MeshSphere, false))
        );
        assert_eq!(PairKind::for_shapes(Capsule, ConvexHull).ok(), Some((PairKind::Convex, false)));
        assert_eq!(
            PairKind::for_shapes(StaticMesh, Terrain).err(),
            Some(PhysicsError::UnsupportedPair { a: StaticMesh, b: Terrain })
        );
    }

    #[test]
    fn wrong_shapes_are_a_configuration_error() {
        let pools = TesterPools::new();
        let a = sphere_at(1, 0.0);
        let b = sphere_at(2, 0.8);
        let result = PairHandler::new(
            PairKind::BoxBox,
            &pools,
            (CollidableId::from_index(0), &a),
            (CollidableId::from_index(1), &b),
            CollisionSettings::default(),
            SolverSettings::default(),
        );
        assert!(matches!(result, Err(PhysicsError::InvalidPairConfiguration { .. })));
        assert_eq!(pools.outstanding(), 0);
    }

    #[test]
    fn constraint_mirrors_manifold_and_tester_is_returned() {
        let pools = TesterPools::new();
        let a = sphere_at(1, 0.0);
        let b = sphere_at(2, 0.9);
        let mut handler = PairHandler::new(
            PairKind::SphereSphere,
            &pools,
            (CollidableId::from_index(0), &a),
            (CollidableId::from_index(1), &b),
            CollisionSettings::default(),
            SolverSettings::default(),
        )
        .expect("spheres are supported");
        assert_eq!(pools.outstanding(), 1);

        let update = handler.update(&a, &b, 1.0 / 60.0);
        assert_eq!(update.added, 1);
        assert_eq!(handler.constraint().len(), handler.contact_count());

        let far = sphere_at(2, 5.0);
        let update = handler.update(&a, &far, 1.0 / 60.0);
        assert_eq!(update.removed, 1);
        assert!(handler.constraint().is_empty());

        drop(handler);
        assert_eq!(pools.outstanding(), 0);
    }
}
