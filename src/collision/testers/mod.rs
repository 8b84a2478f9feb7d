//! Pair testers: reusable algorithm objects that turn two collidables into contact candidates.
//!
//! A manifold never knows which geometry it is tracking. It borrows a tester from a
//! [`TesterSource`] at initialization and gives it back at clean-up; the source decides the
//! algorithm.

mod box_box;
mod convex;
pub mod gjk;
mod mesh;
mod sphere;
mod triangle;

pub use box_box::BoxBoxTester;
pub use convex::ConvexPairTester;
pub use mesh::MeshPairTester;
pub use sphere::{BoxSphereTester, SphereSphereTester};
pub use triangle::{TriangleConvexTester, TrianglePairTester, TriangleSphereTester};

use crate::core::collidable::Collidable;
use crate::utils::pool::ResourcePool;

use super::contact::Contact;

/// Computes contact candidates for one specific shape-pair type.
///
/// Candidates follow the manifold conventions: the normal points from B toward A and depth is
/// positive when overlapping. Contacts separated by up to `margin` are reported speculatively.
pub trait PairTester: Send {
    /// Prepares the tester for a new pair.
    fn initialize(&mut self, a: &Collidable, b: &Collidable);

    /// Appends candidates to `out`. Returns `false` when the shapes are farther apart than
    /// `margin`, in which case the manifold drops every contact.
    fn generate_contacts(
        &mut self,
        a: &Collidable,
        b: &Collidable,
        margin: f32,
        out: &mut Vec<Contact>,
    ) -> bool;

    /// Resets per-pair state before the tester returns to its pool.
    fn clean_up(&mut self);
}

/// Hands out pair testers to manifolds.
pub trait TesterSource: Send + Sync {
    fn take(&self) -> Box<dyn PairTester>;
    fn give_back(&self, tester: Box<dyn PairTester>);
}

/// Thread-safe tester pool shared by every manifold of one pair kind.
pub type TesterPool = ResourcePool<Box<dyn PairTester>>;

impl TesterSource for TesterPool {
    fn take(&self) -> Box<dyn PairTester> {
        ResourcePool::take(self)
    }

    fn give_back(&self, tester: Box<dyn PairTester>) {
        ResourcePool::give_back(self, tester)
    }
}

/// Builds a locked pool whose factory creates `T::default()` testers.
pub fn tester_pool<T>() -> TesterPool
where
    T: PairTester + Default + 'static,
{
    ResourcePool::locked(|| Box::new(T::default()) as Box<dyn PairTester>)
}
