//! Collision detection: broad phase, pair handlers, contact manifolds and queries.

pub mod broad_phase;
pub mod clipping;
pub mod contact;
pub mod manifold;
pub mod narrow_phase;
pub mod pair_handler;
pub mod queries;
pub mod reduction;
pub mod testers;

pub use broad_phase::{AllPairsBroadPhase, BroadPhase, SpatialGridBroadPhase};
pub use contact::{Contact, ContactEvent, ContactSupplementData};
pub use manifold::ContactManifold;
pub use narrow_phase::NarrowPhase;
pub use pair_handler::{PairHandler, PairKind, PairUpdate, TesterPools};
pub use queries::{Ray, RayHit};
pub use testers::{PairTester, TesterSource};
