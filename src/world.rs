use std::collections::HashMap;
use std::time::Instant;

use glam::Vec3;
use log::{debug, warn};

use crate::{
    collision::{
        broad_phase::{AllPairsBroadPhase, BroadPhase},
        narrow_phase::NarrowPhase,
        queries::{ray_collidable, Ray, RayHit},
    },
    config::WorldConfig,
    core::{bodies::Bodies, collidable::Collidable, entity::Entity},
    dynamics::{
        constraint::{Constraint, SolverUpdateable},
        contact_constraint::ContactInformation,
        integrator::Integrator,
        island::DeactivationManager,
        solver::Solver,
    },
    error::{PhysicsError, Result},
    utils::{
        allocator::{Arena, CollidableId, ConnectionId, ConstraintId, EntityId, IslandId},
        logging::{warn_if_step_budget_exceeded, ScopedTimer},
    },
};

mod metrics;

pub use metrics::StepMetrics;

/// Central simulation container orchestrating all subsystems.
///
/// One fixed step runs forces, broad phase, narrow phase, the solver, position integration and
/// deactivation, in that order.
pub struct PhysicsWorld {
    config: WorldConfig,
    bodies: Bodies,
    collidables: Arena<Collidable, CollidableId>,
    constraints: Arena<Constraint, ConstraintId>,
    constraint_connections: HashMap<ConstraintId, ConnectionId>,
    broad_phase: Box<dyn BroadPhase>,
    narrow_phase: NarrowPhase,
    solver: Solver,
    integrator: Integrator,
    deactivation: DeactivationManager,
    time_accumulated: f32,
    pairs: Vec<(CollidableId, CollidableId)>,
    metrics: StepMetrics,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::from_valid_config(WorldConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: WorldConfig) -> Self {
        Self {
            bodies: Bodies::new(),
            collidables: Arena::new(),
            constraints: Arena::new(),
            constraint_connections: HashMap::new(),
            broad_phase: Box::new(AllPairsBroadPhase::new()),
            narrow_phase: NarrowPhase::new(config.collision, config.solver),
            solver: Solver::new(config.solver),
            integrator: Integrator::new(config.gravity),
            deactivation: DeactivationManager::new(config.deactivation),
            time_accumulated: 0.0,
            pairs: Vec::new(),
            metrics: StepMetrics::default(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        self.integrator.gravity = gravity;
    }

    pub fn set_broad_phase(&mut self, broad_phase: Box<dyn BroadPhase>) {
        self.broad_phase = broad_phase;
    }

    /// Toggles rayon for manifold updates and the solver prestep. No-op without the `parallel`
    /// feature.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.narrow_phase.set_parallel(enabled);
        self.solver.set_parallel(enabled);
    }

    pub fn parallel_enabled(&self) -> bool {
        self.solver.parallel()
    }

    pub fn bodies(&self) -> &Bodies {
        &self.bodies
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = self.bodies.insert(entity);
        self.deactivation.add_member(id, &self.bodies);
        id
    }

    /// Removes a body together with its collidables and every constraint that involves it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        if id.is_world() {
            return Err(PhysicsError::WorldEntityImmutable);
        }
        if !self.bodies.contains(id) {
            return Err(PhysicsError::InvalidEntity(id));
        }

        let owned: Vec<CollidableId> = self
            .collidables
            .iter()
            .filter(|(_, collidable)| collidable.entity == id)
            .map(|(collidable_id, _)| collidable_id)
            .collect();
        for collidable_id in owned {
            self.remove_collidable(collidable_id)?;
        }

        let attached: Vec<ConstraintId> = self
            .constraints
            .iter()
            .filter(|(_, constraint)| constraint.entities().contains(&id))
            .map(|(constraint_id, _)| constraint_id)
            .collect();
        for constraint_id in attached {
            debug!("removing {:?} along with entity {:?}", constraint_id, id);
            self.remove_constraint(constraint_id)?;
        }

        self.deactivation.remove_member(id);
        self.bodies.remove(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.bodies.get(id)
    }

    /// Mutable access. The entity's island is woken so edits take effect.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.deactivation.wake(id, &mut self.bodies);
        self.bodies.get_mut(id)
    }

    pub fn is_entity_active(&self, id: EntityId) -> bool {
        self.bodies.get(id).is_some_and(Entity::is_active)
    }

    pub fn island_of(&self, id: EntityId) -> Option<IslandId> {
        self.deactivation.island_of(id)
    }

    pub fn deactivation(&self) -> &DeactivationManager {
        &self.deactivation
    }

    pub fn apply_impulse(&mut self, id: EntityId, impulse: Vec3, point: Vec3) -> Result<()> {
        let entity = self.awake_entity_mut(id)?;
        entity.apply_impulse_at(impulse, point);
        Ok(())
    }

    /// Accumulates a force for the next step.
    pub fn apply_force(&mut self, id: EntityId, force: Vec3) -> Result<()> {
        let entity = self.awake_entity_mut(id)?;
        entity.apply_force(force);
        Ok(())
    }

    fn awake_entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        if id.is_world() {
            return Err(PhysicsError::WorldEntityImmutable);
        }
        self.deactivation.wake(id, &mut self.bodies);
        self.bodies.get_mut(id).ok_or(PhysicsError::InvalidEntity(id))
    }

    /// Registers a collidable. Static geometry belongs to [`EntityId::WORLD`].
    pub fn add_collidable(&mut self, mut collidable: Collidable) -> Result<CollidableId> {
        let owner = self
            .bodies
            .get(collidable.entity)
            .ok_or(PhysicsError::InvalidEntity(collidable.entity))?;
        collidable.update_world_transform(&owner.transform);
        Ok(self.collidables.insert(collidable))
    }

    pub fn remove_collidable(&mut self, id: CollidableId) -> Result<Collidable> {
        let collidable = self
            .collidables
            .remove(id)
            .ok_or(PhysicsError::InvalidCollidable(id))?;
        for connection in self.narrow_phase.remove_collidable(id) {
            self.deactivation.remove_connection(connection);
        }
        Ok(collidable)
    }

    pub fn collidable(&self, id: CollidableId) -> Option<&Collidable> {
        self.collidables.get(id)
    }

    pub fn add_constraint(&mut self, constraint: impl Into<Constraint>) -> Result<ConstraintId> {
        let constraint = constraint.into();
        if let Some(missing) = constraint
            .entities()
            .into_iter()
            .find(|entity| !self.bodies.contains(*entity))
        {
            return Err(PhysicsError::InvalidEntity(missing));
        }

        let connection = self.deactivation.add_connection(&constraint, &mut self.bodies);
        for entity in constraint.entities() {
            self.deactivation.wake(entity, &mut self.bodies);
        }
        let id = self.constraints.insert(constraint);
        self.constraint_connections.insert(id, connection);
        Ok(id)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        let constraint = self
            .constraints
            .remove(id)
            .ok_or(PhysicsError::InvalidConstraint(id))?;
        if let Some(connection) = self.constraint_connections.remove(&id) {
            self.deactivation.remove_connection(connection);
        }
        for entity in constraint.entities() {
            self.deactivation.wake(entity, &mut self.bodies);
        }
        Ok(constraint)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    /// Mutable access; wakes the constrained entities so changed goals take effect.
    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        let constraint = self.constraints.get_mut(id)?;
        for entity in constraint.entities() {
            self.deactivation.wake(entity, &mut self.bodies);
        }
        Some(constraint)
    }

    /// Contacts between two collidables with their last solved impulses.
    pub fn contact_information(&self, a: CollidableId, b: CollidableId) -> Vec<ContactInformation> {
        self.narrow_phase
            .handler(a, b)
            .map(|handler| handler.contact_information(&self.bodies))
            .unwrap_or_default()
    }

    pub fn pair_count(&self) -> usize {
        self.narrow_phase.len()
    }

    pub fn contact_count(&self) -> usize {
        self.narrow_phase.contact_count()
    }

    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    /// Closest collidable hit by a ray within `max_t`.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_t: f32,
    ) -> Option<(CollidableId, RayHit)> {
        let ray = Ray::new(origin, direction)?;
        self.collidables
            .iter()
            .filter_map(|(id, collidable)| {
                ray_collidable(&ray, collidable, max_t).map(|hit| (id, hit))
            })
            .min_by(|(_, a), (_, b)| a.t.total_cmp(&b.t))
    }

    /// Advances the simulation using a fixed timestep accumulator. Returns the number of
    /// fixed steps taken.
    pub fn step(&mut self, dt: f32) -> u32 {
        if !(dt.is_finite() && dt >= 0.0) {
            warn!("ignoring step with invalid dt {dt}");
            return 0;
        }
        self.time_accumulated += dt;

        let time_step = self.config.time_step;
        let mut steps = 0;
        while self.time_accumulated >= time_step {
            if steps == self.config.max_steps_per_call {
                debug!(
                    "dropping {:.4}s of simulation time after {} steps",
                    self.time_accumulated, steps
                );
                self.time_accumulated %= time_step;
                break;
            }
            self.time_accumulated -= time_step;
            self.step_once();
            steps += 1;
        }
        steps
    }

    /// Runs exactly one fixed step, ignoring the accumulator.
    pub fn step_once(&mut self) {
        let started = Instant::now();
        let dt = self.config.time_step;

        {
            let _timer = ScopedTimer::new("forces");
            self.integrator.integrate_velocities(&mut self.bodies, dt);
        }

        {
            let _timer = ScopedTimer::new("broad_phase");
            self.sync_collidables();
            self.pairs.clear();
            self.broad_phase.find_pairs(&self.collidables, &mut self.pairs);
        }

        let released = self
            .narrow_phase
            .update(&self.pairs, &self.collidables, &self.bodies, dt);
        for connection in released {
            self.deactivation.remove_connection(connection);
        }
        self.track_contact_connections();
        self.refresh_constraint_activity();

        {
            let mut items: Vec<&mut dyn SolverUpdateable> =
                Vec::with_capacity(self.constraints.len() + self.narrow_phase.len());
            items.extend(
                self.constraints
                    .values_mut()
                    .map(|constraint| constraint as &mut dyn SolverUpdateable),
            );
            items.extend(
                self.narrow_phase
                    .handlers_mut()
                    .filter(|handler| handler.contact_count() > 0)
                    .map(|handler| handler.constraint_mut() as &mut dyn SolverUpdateable),
            );
            self.solver.solve(&mut self.bodies, items, dt);
        }

        {
            let _timer = ScopedTimer::new("integrate_positions");
            self.integrator.integrate_positions(&mut self.bodies, dt);
        }

        {
            let _timer = ScopedTimer::new("deactivation");
            self.deactivation.update(&mut self.bodies, dt);
        }

        let elapsed = started.elapsed();
        warn_if_step_budget_exceeded(elapsed, self.config.step_budget_ms);
        self.record_metrics(elapsed.as_micros() as u64);
    }

    fn sync_collidables(&mut self) {
        for collidable in self.collidables.values_mut() {
            if collidable.is_static() {
                continue;
            }
            if let Some(owner) = self.bodies.get(collidable.entity) {
                collidable.update_world_transform(&owner.transform);
            }
        }
    }

    /// Manifolds join islands when they gain their first contact and leave when they empty.
    /// A newly added contact wakes both sides.
    fn track_contact_connections(&mut self) {
        for handler in self.narrow_phase.handlers_mut() {
            let touching = handler.contact_count() > 0;
            match (touching, handler.connection()) {
                (true, None) => {
                    let connection =
                        self.deactivation.add_connection(handler.constraint(), &mut self.bodies);
                    handler.set_connection(Some(connection));
                }
                (false, Some(_)) => {
                    if let Some(connection) = handler.take_connection() {
                        self.deactivation.remove_connection(connection);
                    }
                }
                _ => {}
            }
            if handler.last_update().added > 0 {
                let (a, b) = handler.entities();
                self.deactivation.wake(a, &mut self.bodies);
                self.deactivation.wake(b, &mut self.bodies);
            }
        }
    }

    /// A constraint participates while any dynamic entity it touches is awake.
    fn refresh_constraint_activity(&mut self) {
        let bodies = &self.bodies;
        let mut scratch = Vec::new();
        let mut awake = |owner: &dyn SolverUpdateable| {
            scratch.clear();
            owner.involved_entities(&mut scratch);
            scratch
                .iter()
                .any(|id| bodies.get(*id).is_some_and(|e| e.is_dynamic() && e.is_active()))
        };

        for constraint in self.constraints.values_mut() {
            let active = awake(constraint);
            constraint.set_active(active);
        }
        for handler in self.narrow_phase.handlers_mut() {
            let active = awake(handler.constraint());
            handler.constraint_mut().set_active(active);
        }
    }

    fn record_metrics(&mut self, step_micros: u64) {
        let islands = self.deactivation.island_count();
        let active_islands = self
            .deactivation
            .islands()
            .filter(|(_, island)| island.is_active())
            .count();
        let sleeping_bodies = self
            .bodies
            .iter()
            .filter(|(_, body)| body.is_dynamic() && !body.is_active())
            .count();

        self.metrics = StepMetrics {
            step_index: self.metrics.step_index + 1,
            broad_phase_pairs: self.pairs.len(),
            pair_handlers: self.narrow_phase.len(),
            contacts: self.narrow_phase.contact_count(),
            islands,
            active_islands,
            sleeping_bodies,
            step_micros,
            solver: self.solver.metrics().clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;
    use crate::core::types::{MassProperties, Transform};
    use crate::dynamics::joints::BallSocketJoint;

    #[test]
    fn accumulator_caps_steps_per_call() {
        let mut world = PhysicsWorld::default();
        assert_eq!(world.step(1.0 / 60.0 + 1e-4), 1);
        assert_eq!(world.step(1.0), world.config().max_steps_per_call);
        assert!(world.time_accumulated < world.config().time_step);
        assert_eq!(world.step(f32::NAN), 0);
    }

    #[test]
    fn world_entity_is_protected() {
        let mut world = PhysicsWorld::default();
        assert_eq!(
            world.remove_entity(EntityId::WORLD).err(),
            Some(PhysicsError::WorldEntityImmutable)
        );
        assert_eq!(
            world.apply_impulse(EntityId::WORLD, Vec3::Y, Vec3::ZERO).err(),
            Some(PhysicsError::WorldEntityImmutable)
        );
    }

    #[test]
    fn constraints_require_live_entities() {
        let mut world = PhysicsWorld::default();
        let a = world.add_entity(Entity::default());
        let b = world.add_entity(Entity::dynamic(
            Transform::from_position(Vec3::X),
            MassProperties::default(),
        ));
        let joint = BallSocketJoint::new(world.bodies(), a, b, Vec3::new(0.5, 0.0, 0.0));
        world.remove_entity(b).expect("live entity");
        assert_eq!(world.add_constraint(joint).err(), Some(PhysicsError::InvalidEntity(b)));
    }

    #[test]
    fn removing_an_entity_takes_its_collidables_and_constraints() {
        let mut world = PhysicsWorld::default();
        let a = world.add_entity(Entity::default());
        let b = world.add_entity(Entity::dynamic(
            Transform::from_position(Vec3::X),
            MassProperties::default(),
        ));
        let collidable = world
            .add_collidable(Collidable::new(b, Shape::sphere(0.5)))
            .expect("live owner");
        let joint = BallSocketJoint::new(world.bodies(), a, b, Vec3::new(0.5, 0.0, 0.0));
        let constraint = world.add_constraint(joint).expect("live entities");
        assert_eq!(world.island_of(a), world.island_of(b));

        world.remove_entity(b).expect("live entity");
        assert!(world.collidable(collidable).is_none());
        assert!(world.constraint(constraint).is_none());
        assert!(world.island_of(b).is_none());
    }
}
