//! Persistent contact manifold for one ordered pair of collidables.

use std::sync::Arc;

use super::contact::{Contact, ContactEvent, ContactSupplementData};
use super::reduction::{reduce, Reduction};
use super::testers::{PairTester, TesterSource};
use crate::config::{CollisionSettings, MAX_MANIFOLD_CONTACTS};
use crate::core::collidable::Collidable;
use crate::core::types::Transform;
use crate::utils::validation::validate_contact;

/// Up to four contacts between two collidables, refreshed incrementally each step.
///
/// Geometry is delegated to a pair tester borrowed from a [`TesterSource`]. Every change to the
/// contact list is recorded as a [`ContactEvent`] so the owner can keep parallel per-contact
/// state (solver constraints) aligned by index.
pub struct ContactManifold {
    contacts: Vec<Contact>,
    supplements: Vec<ContactSupplementData>,
    candidates: Vec<Contact>,
    removals: Vec<usize>,
    events: Vec<ContactEvent>,
    source: Arc<dyn TesterSource>,
    tester: Option<Box<dyn PairTester>>,
    settings: CollisionSettings,
}

impl ContactManifold {
    pub fn new(source: Arc<dyn TesterSource>, settings: CollisionSettings) -> Self {
        Self {
            contacts: Vec::with_capacity(MAX_MANIFOLD_CONTACTS),
            supplements: Vec::with_capacity(MAX_MANIFOLD_CONTACTS),
            candidates: Vec::new(),
            removals: Vec::new(),
            events: Vec::new(),
            source,
            tester: None,
            settings,
        }
    }

    /// Binds the manifold to a pair and borrows a tester for it.
    pub fn initialize(&mut self, a: &Collidable, b: &Collidable) {
        if self.tester.is_some() {
            self.clean_up();
        }
        let mut tester = self.source.take();
        tester.initialize(a, b);
        self.tester = Some(tester);
    }

    /// Clears all contacts and returns the tester to its source.
    pub fn clean_up(&mut self) {
        if let Some(mut tester) = self.tester.take() {
            tester.clean_up();
            self.source.give_back(tester);
        }
        self.contacts.clear();
        self.supplements.clear();
        self.candidates.clear();
        self.events.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.tester.is_some()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn supplements(&self) -> &[ContactSupplementData] {
        &self.supplements
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn settings(&self) -> &CollisionSettings {
        &self.settings
    }

    /// Events recorded since the last drain, in the order they happened.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, ContactEvent> {
        self.events.drain(..)
    }

    /// Refreshes persisted contacts, then merges fresh candidates from the tester.
    pub fn update(&mut self, a: &Collidable, b: &Collidable, _dt: f32) {
        let transform_a = *a.world_transform();
        let transform_b = *b.world_transform();
        self.refresh(&transform_a, &transform_b);

        let Some(tester) = self.tester.as_mut() else {
            return;
        };
        self.candidates.clear();
        let overlapping = tester.generate_contacts(
            a,
            b,
            self.settings.maximum_contact_distance,
            &mut self.candidates,
        );
        if !overlapping {
            self.remove_all();
            return;
        }

        let candidates = std::mem::take(&mut self.candidates);
        for candidate in &candidates {
            self.add_candidate(*candidate, &transform_a, &transform_b);
        }
        self.candidates = candidates;
    }

    /// Re-derives positions and depths from the stored local offsets, dropping contacts that
    /// drifted tangentially or separated past the speculative margin.
    pub fn refresh(&mut self, transform_a: &Transform, transform_b: &Transform) {
        let invalidation = self.settings.contact_invalidation_length_squared();
        let max_separation = self.settings.maximum_contact_distance;

        self.removals.clear();
        for (index, (contact, supplement)) in self
            .contacts
            .iter_mut()
            .zip(self.supplements.iter())
            .enumerate()
        {
            let (anchor_a, anchor_b) = supplement.anchors(transform_a, transform_b);
            let ab = anchor_a - anchor_b;
            let along_normal = ab.dot(contact.normal);
            let drift = ab - contact.normal * along_normal;
            if drift.length_squared() > invalidation {
                self.removals.push(index);
                continue;
            }
            contact.penetration_depth = supplement.base_depth - along_normal;
            contact.position = (anchor_a + anchor_b) * 0.5;
            if contact.penetration_depth < -max_separation {
                self.removals.push(index);
            }
        }

        // Highest index first keeps the remaining indices valid.
        while let Some(index) = self.removals.pop() {
            self.remove(index);
        }
    }

    fn add_candidate(
        &mut self,
        candidate: Contact,
        transform_a: &Transform,
        transform_b: &Transform,
    ) {
        validate_contact(&candidate);
        let min_separation = self.settings.contact_minimum_separation_distance_squared();

        if let Some(index) = self
            .contacts
            .iter()
            .position(|c| (c.position - candidate.position).length_squared() < min_separation)
        {
            // Same feature: overwrite in place so solver state attached to the index survives.
            self.contacts[index] = candidate;
            self.supplements[index] =
                ContactSupplementData::capture(&candidate, transform_a, transform_b);
            return;
        }

        if self.contacts.len() < MAX_MANIFOLD_CONTACTS {
            self.push(candidate, transform_a, transform_b);
            return;
        }

        match reduce(&self.contacts, &candidate) {
            Reduction::Replace(index) => {
                self.remove(index);
                self.push(candidate, transform_a, transform_b);
            }
            Reduction::Reject => {}
        }
    }

    fn push(&mut self, contact: Contact, transform_a: &Transform, transform_b: &Transform) {
        self.supplements
            .push(ContactSupplementData::capture(&contact, transform_a, transform_b));
        self.contacts.push(contact);
        self.events.push(ContactEvent::Added(self.contacts.len() - 1));
    }

    fn remove(&mut self, index: usize) {
        self.contacts.remove(index);
        self.supplements.remove(index);
        self.events.push(ContactEvent::Removed(index));
    }

    fn remove_all(&mut self) {
        for index in (0..self.contacts.len()).rev() {
            self.remove(index);
        }
    }
}

impl Drop for ContactManifold {
    fn drop(&mut self) {
        self.clean_up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::testers::{tester_pool, SphereSphereTester};
    use crate::core::shape::Shape;
    use crate::utils::allocator::EntityId;
    use approx::assert_abs_diff_eq;
    use glam::Vec3;

    fn sphere_at(index: u32, position: Vec3) -> Collidable {
        let mut collidable = Collidable::new(EntityId::from_index(index), Shape::sphere(1.0));
        collidable.update_world_transform(&Transform::from_position(position));
        collidable
    }

    #[test]
    fn tester_returns_to_pool_on_clean_up() {
        let pool = Arc::new(tester_pool::<SphereSphereTester>());
        let a = sphere_at(1, Vec3::ZERO);
        let b = sphere_at(2, Vec3::new(1.9, 0.0, 0.0));

        let mut manifold = ContactManifold::new(pool.clone(), CollisionSettings::default());
        manifold.initialize(&a, &b);
        assert_eq!(pool.outstanding(), 1);
        manifold.update(&a, &b, 1.0 / 60.0);
        assert_eq!(manifold.len(), 1);
        assert_eq!(manifold.drain_events().collect::<Vec<_>>(), vec![ContactEvent::Added(0)]);

        manifold.clean_up();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 1);
        assert!(manifold.is_empty());
    }

    #[test]
    fn refresh_tracks_depth_along_normal() {
        let pool = Arc::new(tester_pool::<SphereSphereTester>());
        let a = sphere_at(1, Vec3::ZERO);
        let b = sphere_at(2, Vec3::new(1.9, 0.0, 0.0));
        let mut manifold = ContactManifold::new(pool, CollisionSettings::default());
        manifold.initialize(&a, &b);
        manifold.update(&a, &b, 1.0 / 60.0);
        assert_abs_diff_eq!(manifold.contacts()[0].penetration_depth, 0.1, epsilon = 1e-5);

        // B approaches A along the normal by 0.05.
        let closer = Transform::from_position(Vec3::new(1.85, 0.0, 0.0));
        manifold.refresh(&Transform::default(), &closer);
        assert_abs_diff_eq!(manifold.contacts()[0].penetration_depth, 0.15, epsilon = 1e-5);
    }

    /// Emits whatever the test scripted, regardless of geometry.
    struct ScriptedTester {
        script: Arc<parking_lot::Mutex<Option<Vec<Contact>>>>,
    }

    impl PairTester for ScriptedTester {
        fn initialize(&mut self, _a: &Collidable, _b: &Collidable) {}

        fn generate_contacts(
            &mut self,
            _a: &Collidable,
            _b: &Collidable,
            _margin: f32,
            out: &mut Vec<Contact>,
        ) -> bool {
            match self.script.lock().as_ref() {
                Some(contacts) => {
                    out.extend_from_slice(contacts);
                    true
                }
                None => false,
            }
        }

        fn clean_up(&mut self) {}
    }

    type Script = Arc<parking_lot::Mutex<Option<Vec<Contact>>>>;

    fn scripted_manifold() -> (ContactManifold, Script, Collidable, Collidable) {
        let script: Script = Arc::new(parking_lot::Mutex::new(None));
        let factory_script = script.clone();
        let pool = crate::utils::pool::ResourcePool::locked(move || {
            Box::new(ScriptedTester {
                script: factory_script.clone(),
            }) as Box<dyn PairTester>
        });
        let a = sphere_at(1, Vec3::ZERO);
        let b = sphere_at(2, Vec3::ZERO);
        let mut manifold = ContactManifold::new(Arc::new(pool), CollisionSettings::default());
        manifold.initialize(&a, &b);
        (manifold, script, a, b)
    }

    fn floor_contact(x: f32, z: f32, depth: f32) -> Contact {
        Contact::new(Vec3::new(x, 0.0, z), Vec3::Y, depth)
    }

    #[test]
    fn never_holds_more_than_four_contacts() {
        let (mut manifold, script, a, b) = scripted_manifold();
        *script.lock() = Some(vec![
            floor_contact(1.0, 1.0, 0.01),
            floor_contact(-1.0, 1.0, 0.01),
            floor_contact(-1.0, -1.0, 0.01),
            floor_contact(1.0, -1.0, 0.01),
            floor_contact(0.0, 0.0, 0.01),
            floor_contact(0.2, 0.1, 0.01),
        ]);
        manifold.update(&a, &b, 1.0 / 60.0);
        assert_eq!(manifold.len(), MAX_MANIFOLD_CONTACTS);
        assert_eq!(manifold.supplements().len(), manifold.len());
        // Interior candidates do not displace the corners.
        assert!(manifold.contacts().iter().all(|c| c.position.x.abs() == 1.0));
    }

    #[test]
    fn nearby_candidate_overwrites_in_place() {
        let (mut manifold, script, a, b) = scripted_manifold();
        *script.lock() = Some(vec![floor_contact(0.0, 0.0, 0.01)]);
        manifold.update(&a, &b, 1.0 / 60.0);
        manifold.drain_events().for_each(drop);

        *script.lock() = Some(vec![floor_contact(0.01, 0.0, 0.02)]);
        manifold.update(&a, &b, 1.0 / 60.0);
        assert_eq!(manifold.len(), 1);
        assert_eq!(manifold.contacts()[0].penetration_depth, 0.02);
        assert_eq!(manifold.drain_events().count(), 0);
    }

    #[test]
    fn refresh_without_motion_is_stable() {
        let (mut manifold, script, a, b) = scripted_manifold();
        *script.lock() = Some(vec![floor_contact(0.5, 0.0, 0.01), floor_contact(-0.5, 0.0, 0.02)]);
        manifold.update(&a, &b, 1.0 / 60.0);
        let before = manifold.contacts().to_vec();

        manifold.refresh(&Transform::IDENTITY, &Transform::IDENTITY);
        manifold.refresh(&Transform::IDENTITY, &Transform::IDENTITY);
        assert_eq!(manifold.contacts(), before.as_slice());
    }

    #[test]
    fn tangential_drift_and_separation_remove_contacts() {
        let (mut manifold, script, a, b) = scripted_manifold();
        *script.lock() = Some(vec![floor_contact(0.5, 0.0, 0.01), floor_contact(-0.5, 0.0, 0.02)]);
        manifold.update(&a, &b, 1.0 / 60.0);
        manifold.drain_events().for_each(drop);

        // Sliding B sideways past the invalidation length drops both contacts.
        let slid = Transform::from_position(Vec3::new(0.2, 0.0, 0.0));
        manifold.refresh(&Transform::IDENTITY, &slid);
        assert!(manifold.is_empty());
        assert_eq!(
            manifold.drain_events().collect::<Vec<_>>(),
            vec![ContactEvent::Removed(1), ContactEvent::Removed(0)]
        );

        manifold.update(&a, &b, 1.0 / 60.0);
        assert_eq!(manifold.len(), 2);
        // Moving B down along the normal separates the pair past the speculative margin.
        let separated = Transform::from_position(Vec3::new(0.0, -0.2, 0.0));
        manifold.refresh(&Transform::IDENTITY, &separated);
        assert!(manifold.is_empty());
    }

    #[test]
    fn losing_overlap_clears_the_manifold() {
        let (mut manifold, script, a, b) = scripted_manifold();
        *script.lock() = Some(vec![floor_contact(0.0, 0.0, 0.01)]);
        manifold.update(&a, &b, 1.0 / 60.0);
        assert_eq!(manifold.len(), 1);

        *script.lock() = None;
        manifold.update(&a, &b, 1.0 / 60.0);
        assert!(manifold.is_empty());
    }
}
