//! Simulation islands and sleep bookkeeping.
//!
//! Every dynamic body is a member; every constraint or touching contact manifold registers a
//! connection between the members it involves. Islands are the connected components of that
//! graph and are maintained incrementally: connecting merges islands immediately, while
//! disconnecting only queues a split attempt that is resolved during
//! [`DeactivationManager::update`].

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use super::constraint::{Constraint, SolverUpdateable};
use super::contact_constraint::ContactManifoldConstraint;
use crate::config::DeactivationSettings;
use crate::core::bodies::Bodies;
use crate::utils::allocator::{Arena, ConnectionId, EntityId, IslandId};

/// Anything that ties bodies together for the purpose of island membership.
///
/// Implemented by constraints and contact manifolds; other owners, such as compound shapes
/// that want their parts to sleep together, can implement it as well.
pub trait ConnectionOwner {
    fn connected_entities(&self, out: &mut Vec<EntityId>);
}

impl ConnectionOwner for Constraint {
    fn connected_entities(&self, out: &mut Vec<EntityId>) {
        self.involved_entities(out);
    }
}

impl ConnectionOwner for ContactManifoldConstraint {
    fn connected_entities(&self, out: &mut Vec<EntityId>) {
        self.involved_entities(out);
    }
}

impl<const N: usize> ConnectionOwner for [EntityId; N] {
    fn connected_entities(&self, out: &mut Vec<EntityId>) {
        out.extend_from_slice(self);
    }
}

#[derive(Debug, Clone)]
struct Member {
    island: IslandId,
    connections: Vec<ConnectionId>,
    low_velocity_time: f32,
}

#[derive(Debug, Clone)]
struct Connection {
    /// Island members only; kinematic bodies and the world entity never join islands.
    members: Vec<EntityId>,
}

/// Connected set of bodies that sleeps and wakes as a unit.
#[derive(Debug, Clone)]
pub struct Island {
    members: Vec<EntityId>,
    is_active: bool,
}

impl Island {
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Tracks island membership and puts whole islands to sleep once they have been slow long enough.
#[derive(Debug, Clone, Default)]
pub struct DeactivationManager {
    pub settings: DeactivationSettings,
    members: HashMap<EntityId, Member>,
    connections: Arena<Connection, ConnectionId>,
    islands: Arena<Island, IslandId>,
    /// Seeds of pending split attempts.
    split_queue: VecDeque<Vec<EntityId>>,
    scratch: Vec<EntityId>,
}

impl DeactivationManager {
    pub fn new(settings: DeactivationSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Registers a dynamic body as a single-member island matching the body's activity.
    pub fn add_member(&mut self, entity: EntityId, bodies: &Bodies) {
        if self.members.contains_key(&entity) || !bodies.is_dynamic(entity) {
            return;
        }
        let is_active = bodies.get(entity).is_some_and(|body| body.is_active());
        let island = self.islands.insert(Island {
            members: vec![entity],
            is_active,
        });
        self.members.insert(
            entity,
            Member {
                island,
                connections: Vec::new(),
                low_velocity_time: 0.0,
            },
        );
    }

    /// Drops a body from its island. Former neighbors are checked for a split on the next update.
    pub fn remove_member(&mut self, entity: EntityId) {
        let Some(member) = self.members.remove(&entity) else {
            return;
        };

        let mut neighbors = Vec::new();
        for connection_id in &member.connections {
            if let Some(connection) = self.connections.get_mut(*connection_id) {
                connection.members.retain(|id| *id != entity);
                neighbors.extend_from_slice(&connection.members);
            }
        }
        neighbors.sort_unstable();
        neighbors.dedup();

        let island_emptied = match self.islands.get_mut(member.island) {
            Some(island) => {
                island.members.retain(|id| *id != entity);
                island.members.is_empty()
            }
            None => false,
        };
        if island_emptied {
            self.islands.remove(member.island);
        } else if neighbors.len() > 1 {
            self.split_queue.push_back(neighbors);
        }
    }

    pub fn is_member(&self, entity: EntityId) -> bool {
        self.members.contains_key(&entity)
    }

    /// Connects the members `owner` involves, merging their islands.
    ///
    /// Merging a sleeping island into an awake one wakes it.
    pub fn add_connection(
        &mut self,
        owner: &dyn ConnectionOwner,
        bodies: &mut Bodies,
    ) -> ConnectionId {
        self.scratch.clear();
        owner.connected_entities(&mut self.scratch);
        let mut members: Vec<EntityId> = self
            .scratch
            .iter()
            .copied()
            .filter(|id| self.members.contains_key(id))
            .collect();
        members.sort_unstable();
        members.dedup();

        let id = self.connections.insert(Connection {
            members: members.clone(),
        });
        for entity in &members {
            if let Some(member) = self.members.get_mut(entity) {
                member.connections.push(id);
            }
        }

        if let Some((first, rest)) = members.split_first() {
            for other in rest {
                self.merge(*first, *other, bodies);
            }
        }
        id
    }

    /// Removes a connection. The affected island is split lazily if it fell apart.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove(id) else {
            return;
        };
        for entity in &connection.members {
            if let Some(member) = self.members.get_mut(entity) {
                member.connections.retain(|c| *c != id);
            }
        }
        if connection.members.len() > 1 {
            self.split_queue.push_back(connection.members);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn island_of(&self, entity: EntityId) -> Option<IslandId> {
        self.members.get(&entity).map(|member| member.island)
    }

    pub fn island(&self, id: IslandId) -> Option<&Island> {
        self.islands.get(id)
    }

    pub fn islands(&self) -> impl Iterator<Item = (IslandId, &Island)> + '_ {
        self.islands.iter()
    }

    pub fn island_count(&self) -> usize {
        self.islands.len()
    }

    pub fn pending_splits(&self) -> usize {
        self.split_queue.len()
    }

    /// Wakes the island containing `entity`. Non-members are ignored.
    pub fn wake(&mut self, entity: EntityId, bodies: &mut Bodies) {
        if let Some(island) = self.island_of(entity) {
            self.set_island_active(island, true, bodies);
        }
    }

    /// Resolves queued splits, then advances low-velocity timers and puts islands to sleep.
    pub fn update(&mut self, bodies: &mut Bodies, dt: f32) {
        for _ in 0..self.settings.max_split_attempts_per_step {
            let Some(seeds) = self.split_queue.pop_front() else {
                break;
            };
            self.try_split(&seeds);
        }

        if !self.settings.enabled {
            return;
        }

        let limit = self.settings.velocity_lower_limit_squared();
        for (entity, member) in self.members.iter_mut() {
            let Some(body) = bodies.get(*entity) else {
                continue;
            };
            if !body.is_active() {
                continue;
            }
            let slow = body.velocity.linear.length_squared() < limit
                && body.velocity.angular.length_squared() < limit;
            member.low_velocity_time = if slow { member.low_velocity_time + dt } else { 0.0 };
        }

        let minimum = self.settings.low_velocity_time_minimum;
        let sleepy: Vec<IslandId> = self
            .islands
            .iter()
            .filter(|(_, island)| island.is_active)
            .filter(|(_, island)| {
                island.members.iter().all(|entity| {
                    self.members
                        .get(entity)
                        .is_some_and(|member| member.low_velocity_time >= minimum)
                })
            })
            .map(|(id, _)| id)
            .collect();
        for island in sleepy {
            self.set_island_active(island, false, bodies);
        }
    }

    fn set_island_active(&mut self, id: IslandId, active: bool, bodies: &mut Bodies) {
        let Some(island) = self.islands.get_mut(id) else {
            return;
        };
        if island.is_active == active {
            return;
        }
        island.is_active = active;
        debug!(
            "island {:?} {} ({} bodies)",
            id,
            if active { "woke" } else { "went to sleep" },
            island.members.len()
        );
        for entity in &island.members {
            if let Some(body) = bodies.get_mut(*entity) {
                body.set_active(active);
            }
            if let Some(member) = self.members.get_mut(entity) {
                member.low_velocity_time = 0.0;
            }
        }
    }

    fn merge(&mut self, a: EntityId, b: EntityId, bodies: &mut Bodies) {
        let (Some(island_a), Some(island_b)) = (self.island_of(a), self.island_of(b)) else {
            return;
        };
        if island_a == island_b {
            return;
        }
        let len_a = self.islands.get(island_a).map_or(0, |island| island.members.len());
        let len_b = self.islands.get(island_b).map_or(0, |island| island.members.len());
        let (keep, absorb) = if len_a >= len_b {
            (island_a, island_b)
        } else {
            (island_b, island_a)
        };

        let Some(absorbed) = self.islands.remove(absorb) else {
            return;
        };
        let keep_active = self.islands.get(keep).is_some_and(|island| island.is_active);
        // Whichever side was awake wakes the union.
        if keep_active != absorbed.is_active {
            if keep_active {
                for entity in &absorbed.members {
                    if let Some(body) = bodies.get_mut(*entity) {
                        body.set_active(true);
                    }
                }
            } else {
                self.set_island_active(keep, true, bodies);
            }
        }

        for entity in &absorbed.members {
            if let Some(member) = self.members.get_mut(entity) {
                member.island = keep;
                member.low_velocity_time = 0.0;
            }
        }
        if let Some(island) = self.islands.get_mut(keep) {
            island.members.extend(absorbed.members);
            debug!("merged islands into {:?} ({} bodies)", keep, island.members.len());
        }
    }

    /// Flood-fills from every seed; each component that no longer spans its island gets its own.
    fn try_split(&mut self, seeds: &[EntityId]) {
        let mut visited: HashSet<EntityId> = HashSet::new();
        for seed in seeds {
            if !self.members.contains_key(seed) || visited.contains(seed) {
                continue;
            }
            let component = self.flood_fill(*seed, &mut visited);
            let Some(old) = self.island_of(*seed) else {
                continue;
            };
            let Some(old_island) = self.islands.get_mut(old) else {
                continue;
            };
            if old_island.members.len() == component.len() {
                continue;
            }

            let in_component: HashSet<EntityId> = component.iter().copied().collect();
            old_island.members.retain(|id| !in_component.contains(id));
            let is_active = old_island.is_active;
            let new = self.islands.insert(Island {
                members: component,
                is_active,
            });
            for entity in &in_component {
                if let Some(member) = self.members.get_mut(entity) {
                    member.island = new;
                }
            }
            debug!("split {} bodies from island {:?} into {:?}", in_component.len(), old, new);
        }
    }

    fn flood_fill(&self, start: EntityId, visited: &mut HashSet<EntityId>) -> Vec<EntityId> {
        let mut stack = vec![start];
        let mut component = Vec::new();
        while let Some(entity) = stack.pop() {
            if !visited.insert(entity) {
                continue;
            }
            component.push(entity);
            let Some(member) = self.members.get(&entity) else {
                continue;
            };
            for connection_id in &member.connections {
                if let Some(connection) = self.connections.get(*connection_id) {
                    stack.extend(connection.members.iter().filter(|id| !visited.contains(id)));
                }
            }
        }
        component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use crate::core::types::{MassProperties, Transform};
    use glam::Vec3;

    fn bodies_with(count: usize) -> (Bodies, Vec<EntityId>, DeactivationManager) {
        let mut bodies = Bodies::new();
        let mut manager = DeactivationManager::new(DeactivationSettings::default());
        let ids: Vec<EntityId> = (0..count)
            .map(|i| {
                bodies.insert(Entity::dynamic(
                    Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)),
                    MassProperties::default(),
                ))
            })
            .collect();
        for id in &ids {
            manager.add_member(*id, &bodies);
        }
        (bodies, ids, manager)
    }

    #[test]
    fn connections_merge_islands() {
        let (mut bodies, ids, mut manager) = bodies_with(3);
        assert_eq!(manager.island_count(), 3);
        manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        manager.add_connection(&[ids[1], ids[2]], &mut bodies);
        assert_eq!(manager.island_count(), 1);
        assert_eq!(manager.island_of(ids[0]), manager.island_of(ids[2]));
    }

    #[test]
    fn world_and_kinematic_bodies_stay_out_of_islands() {
        let (mut bodies, ids, mut manager) = bodies_with(2);
        let ground = bodies.insert(Entity::kinematic(Transform::default()));
        manager.add_member(ground, &bodies);
        manager.add_connection(&[ids[0], ground], &mut bodies);
        manager.add_connection(&[ids[1], EntityId::WORLD], &mut bodies);
        assert!(!manager.is_member(ground));
        assert_ne!(manager.island_of(ids[0]), manager.island_of(ids[1]));
    }

    #[test]
    fn removing_the_only_link_splits_on_update() {
        let (mut bodies, ids, mut manager) = bodies_with(3);
        let link = manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        manager.add_connection(&[ids[1], ids[2]], &mut bodies);

        manager.remove_connection(link);
        assert_eq!(manager.island_count(), 1);
        manager.update(&mut bodies, 1.0 / 60.0);

        assert_eq!(manager.island_count(), 2);
        assert_ne!(manager.island_of(ids[0]), manager.island_of(ids[1]));
        assert_eq!(manager.island_of(ids[1]), manager.island_of(ids[2]));
    }

    #[test]
    fn redundant_link_removal_keeps_the_island() {
        let (mut bodies, ids, mut manager) = bodies_with(2);
        let first = manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        manager.remove_connection(first);
        manager.update(&mut bodies, 1.0 / 60.0);
        assert_eq!(manager.island_count(), 1);
    }

    #[test]
    fn island_sleeps_only_when_every_member_is_slow() {
        let (mut bodies, ids, mut manager) = bodies_with(2);
        manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        if let Some(body) = bodies.get_mut(ids[1]) {
            body.velocity.linear = Vec3::new(1.0, 0.0, 0.0);
        }

        for _ in 0..120 {
            manager.update(&mut bodies, 1.0 / 60.0);
        }
        assert!(bodies.get(ids[0]).is_some_and(|b| b.is_active()));

        if let Some(body) = bodies.get_mut(ids[1]) {
            body.velocity.linear = Vec3::ZERO;
        }
        for _ in 0..61 {
            manager.update(&mut bodies, 1.0 / 60.0);
        }
        assert!(ids.iter().all(|id| bodies.get(*id).is_some_and(|b| !b.is_active())));
        let island = manager.island_of(ids[0]).and_then(|id| manager.island(id));
        assert!(island.is_some_and(|island| !island.is_active()));
    }

    #[test]
    fn connecting_to_an_awake_island_wakes_sleepers() {
        let (mut bodies, ids, mut manager) = bodies_with(2);
        let sleeping = manager.island_of(ids[0]).expect("registered member");
        manager.set_island_active(sleeping, false, &mut bodies);
        assert!(bodies.get(ids[0]).is_some_and(|b| !b.is_active()));

        manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        assert!(ids.iter().all(|id| bodies.get(*id).is_some_and(|b| b.is_active())));
        let island = manager.island_of(ids[0]).and_then(|id| manager.island(id));
        assert!(island.is_some_and(Island::is_active));
    }

    #[test]
    fn removing_a_bridge_member_splits_its_neighbors() {
        let (mut bodies, ids, mut manager) = bodies_with(3);
        manager.add_connection(&[ids[0], ids[1]], &mut bodies);
        manager.add_connection(&[ids[1], ids[2]], &mut bodies);
        manager.remove_member(ids[1]);
        manager.update(&mut bodies, 1.0 / 60.0);
        assert_eq!(manager.island_count(), 2);
        assert_ne!(manager.island_of(ids[0]), manager.island_of(ids[2]));
    }
}
