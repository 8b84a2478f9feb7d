use std::collections::{BTreeMap, HashSet};

use log::{debug, trace};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::pair_handler::{PairHandler, PairKind, TesterPools};
use crate::config::{CollisionSettings, SolverSettings};
use crate::core::bodies::Bodies;
use crate::core::collidable::Collidable;
use crate::error::PhysicsError;
use crate::utils::allocator::{Arena, CollidableId, ConnectionId};
use crate::utils::logging::ScopedTimer;

type PairKey = (CollidableId, CollidableId);

/// Owns one [`PairHandler`] per overlapping collidable pair. Iteration follows pair order.
///
/// Handlers live as long as the broad phase keeps reporting their pair; their manifolds are
/// updated concurrently when the `parallel` feature is enabled.
pub struct NarrowPhase {
    pools: TesterPools,
    handlers: BTreeMap<PairKey, PairHandler>,
    /// Pairs with no handler for their shapes; remembered so they are not retried every step.
    unsupported: HashSet<PairKey>,
    pub collision: CollisionSettings,
    pub solver: SolverSettings,
    parallel: bool,
    live: HashSet<PairKey>,
}

impl NarrowPhase {
    pub fn new(collision: CollisionSettings, solver: SolverSettings) -> Self {
        Self {
            pools: TesterPools::new(),
            handlers: BTreeMap::new(),
            unsupported: HashSet::new(),
            collision,
            solver,
            parallel: cfg!(feature = "parallel"),
            live: HashSet::new(),
        }
    }

    pub fn set_parallel(&mut self, enabled: bool) {
        self.parallel = enabled && cfg!(feature = "parallel");
    }

    pub fn pools(&self) -> &TesterPools {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contact_count(&self) -> usize {
        self.handlers.values().map(PairHandler::contact_count).sum()
    }

    pub fn handler(&self, a: CollidableId, b: CollidableId) -> Option<&PairHandler> {
        self.handlers.get(&canonical(a, b))
    }

    pub fn handlers(&self) -> impl Iterator<Item = &PairHandler> + '_ {
        self.handlers.values()
    }

    pub fn handlers_mut(&mut self) -> impl Iterator<Item = &mut PairHandler> + '_ {
        self.handlers.values_mut()
    }

    /// Creates handlers for new pairs, drops handlers whose pair left the broad phase and
    /// refreshes every remaining manifold. Returns the island connections of dropped handlers.
    pub fn update(
        &mut self,
        pairs: &[PairKey],
        collidables: &Arena<Collidable, CollidableId>,
        bodies: &Bodies,
        dt: f32,
    ) -> Vec<ConnectionId> {
        let _timer = ScopedTimer::new("narrow_phase");

        self.live.clear();
        self.live.extend(pairs.iter().map(|(a, b)| canonical(*a, *b)));
        self.unsupported.retain(|key| self.live.contains(key));

        let mut released = Vec::new();
        let live = &self.live;
        self.handlers.retain(|key, handler| {
            let keep = live.contains(key);
            if !keep {
                released.extend(handler.take_connection());
                handler.clean_up();
            }
            keep
        });

        for key in pairs.iter().map(|(a, b)| canonical(*a, *b)) {
            if self.handlers.contains_key(&key) || self.unsupported.contains(&key) {
                continue;
            }
            if let Some(handler) = self.create_handler(key, collidables) {
                self.handlers.insert(key, handler);
            }
        }

        // Pairs without an awake dynamic body keep their contacts frozen until something moves.
        let awake = |id| bodies.get(id).is_some_and(|e| e.is_dynamic() && e.is_active());
        let refresh = |handler: &mut PairHandler| {
            let (id_a, id_b) = handler.collidables();
            let (Some(a), Some(b)) = (collidables.get(id_a), collidables.get(id_b)) else {
                handler.skip_update();
                return;
            };
            let (entity_a, entity_b) = handler.entities();
            if !awake(entity_a) && !awake(entity_b) && !handler.moved_since_update(a, b) {
                handler.skip_update();
                return;
            }
            handler.update(a, b, dt);
        };

        #[cfg(feature = "parallel")]
        if self.parallel {
            self.handlers.par_iter_mut().for_each(|(_, handler)| refresh(handler));
            return released;
        }

        self.handlers.values_mut().for_each(refresh);
        released
    }

    /// Drops every handler involving `id`. Returns their island connections.
    pub fn remove_collidable(&mut self, id: CollidableId) -> Vec<ConnectionId> {
        let mut released = Vec::new();
        self.handlers.retain(|(a, b), handler| {
            let keep = *a != id && *b != id;
            if !keep {
                released.extend(handler.take_connection());
                handler.clean_up();
            }
            keep
        });
        self.unsupported.retain(|(a, b)| *a != id && *b != id);
        released
    }

    fn create_handler(
        &mut self,
        key: PairKey,
        collidables: &Arena<Collidable, CollidableId>,
    ) -> Option<PairHandler> {
        let (a, b) = (collidables.get(key.0)?, collidables.get(key.1)?);
        let (kind, swapped) = match PairKind::for_shapes(a.shape.kind(), b.shape.kind()) {
            Ok(found) => found,
            Err(err) => {
                trace!("skipping pair {:?}: {}", key, err);
                self.unsupported.insert(key);
                return None;
            }
        };
        let (first, second) = if swapped {
            ((key.1, b), (key.0, a))
        } else {
            ((key.0, a), (key.1, b))
        };

        match PairHandler::new(kind, &self.pools, first, second, self.collision, self.solver) {
            Ok(handler) => Some(handler),
            Err(err @ PhysicsError::InvalidPairConfiguration { .. }) => {
                debug!("pair {:?} rejected: {}", key, err);
                self.unsupported.insert(key);
                None
            }
            Err(err) => {
                debug!("pair {:?} failed: {}", key, err);
                None
            }
        }
    }
}

fn canonical(a: CollidableId, b: CollidableId) -> PairKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::pair_handler::PairUpdate;
    use crate::core::entity::Entity;
    use crate::core::mesh::TriangleMesh;
    use crate::core::shape::Shape;
    use crate::core::types::{MassProperties, Transform};
    use glam::Vec3;
    use std::sync::Arc;

    struct Scene {
        bodies: Bodies,
        collidables: Arena<Collidable, CollidableId>,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                bodies: Bodies::new(),
                collidables: Arena::new(),
            }
        }

        fn body(&mut self, shape: Shape, position: Vec3) -> CollidableId {
            let transform = Transform::from_position(position);
            let entity = self
                .bodies
                .insert(Entity::dynamic(transform, MassProperties::default()));
            let mut collidable = Collidable::new(entity, shape);
            collidable.update_world_transform(&transform);
            self.collidables.insert(collidable)
        }
    }

    #[test]
    fn sphere_box_pair_is_swapped_into_handler_order() {
        let mut scene = Scene::new();
        let sphere = scene.body(Shape::sphere(0.5), Vec3::new(0.0, 0.95, 0.0));
        let cube = scene.body(Shape::cuboid(Vec3::splat(0.5)), Vec3::ZERO);
        let mut narrow = NarrowPhase::new(CollisionSettings::default(), SolverSettings::default());

        narrow.update(&[(sphere, cube)], &scene.collidables, &scene.bodies, 1.0 / 60.0);

        let handler = narrow.handler(cube, sphere).expect("handler created");
        assert_eq!(handler.kind(), PairKind::BoxSphere);
        assert_eq!(handler.collidables(), (cube, sphere));
        assert_eq!(handler.contact_count(), 1);
        // Normal points from B (sphere) toward A (box).
        assert!(handler.manifold().contacts()[0].normal.y < -0.99);
    }

    #[test]
    fn leaving_the_broad_phase_releases_the_handler() {
        let mut scene = Scene::new();
        let a = scene.body(Shape::sphere(0.5), Vec3::ZERO);
        let b = scene.body(Shape::sphere(0.5), Vec3::new(0.9, 0.0, 0.0));
        let mut narrow = NarrowPhase::new(CollisionSettings::default(), SolverSettings::default());

        narrow.update(&[(a, b)], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        assert_eq!(narrow.pools().outstanding(), 1);
        narrow.update(&[], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        assert!(narrow.is_empty());
        assert_eq!(narrow.pools().outstanding(), 0);
    }

    #[test]
    fn unsupported_pairs_are_skipped() {
        let mut scene = Scene::new();
        let mesh = Arc::new(
            TriangleMesh::builder(
                vec![Vec3::ZERO, Vec3::X, Vec3::Z],
                vec![[0, 1, 2]],
            )
            .build(),
        );
        let a = scene.body(Shape::StaticMesh(mesh.clone()), Vec3::ZERO);
        let b = scene.body(Shape::StaticMesh(mesh), Vec3::ZERO);
        let mut narrow = NarrowPhase::new(CollisionSettings::default(), SolverSettings::default());
        narrow.update(&[(a, b)], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        assert!(narrow.is_empty());
    }

    #[test]
    fn sleeping_pairs_keep_their_contacts_frozen() {
        let mut scene = Scene::new();
        let a = scene.body(Shape::sphere(0.5), Vec3::ZERO);
        let b = scene.body(Shape::sphere(0.5), Vec3::new(0.9, 0.0, 0.0));
        let mut narrow = NarrowPhase::new(CollisionSettings::default(), SolverSettings::default());
        narrow.update(&[(a, b)], &scene.collidables, &scene.bodies, 1.0 / 60.0);

        for (_, body) in scene.bodies.iter_mut() {
            body.set_active(false);
        }
        narrow.update(&[(a, b)], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        assert_eq!(narrow.contact_count(), 1);
        let handler = narrow.handler(a, b).expect("handler kept");
        assert_eq!(handler.last_update(), PairUpdate::default());
    }

    #[test]
    fn moved_kinematic_body_touches_a_sleeper() {
        let mut scene = Scene::new();
        let sleeper = scene.body(Shape::sphere(0.5), Vec3::ZERO);
        let pusher_entity = scene
            .bodies
            .insert(Entity::kinematic(Transform::from_position(Vec3::new(3.0, 0.0, 0.0))));
        let mut pusher = Collidable::new(pusher_entity, Shape::cuboid(Vec3::splat(0.5)));
        pusher.update_world_transform(&Transform::from_position(Vec3::new(3.0, 0.0, 0.0)));
        let pusher = scene.collidables.insert(pusher);
        for (_, body) in scene.bodies.iter_mut() {
            body.set_active(false);
        }

        let mut narrow = NarrowPhase::new(CollisionSettings::default(), SolverSettings::default());
        narrow.update(&[(sleeper, pusher)], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        assert_eq!(narrow.contact_count(), 0, "a new handler is refreshed once");

        narrow.update(&[(sleeper, pusher)], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        let handler = narrow.handler(sleeper, pusher).expect("handler kept");
        assert_eq!(handler.last_update(), PairUpdate::default(), "nothing moved");

        if let Some(collidable) = scene.collidables.get_mut(pusher) {
            collidable.update_world_transform(&Transform::from_position(Vec3::new(0.9, 0.0, 0.0)));
        }
        narrow.update(&[(sleeper, pusher)], &scene.collidables, &scene.bodies, 1.0 / 60.0);
        let handler = narrow.handler(sleeper, pusher).expect("handler kept");
        assert_eq!(handler.contact_count(), 1);
        assert_eq!(handler.last_update().added, 1);
    }
}
