//! Constraint solving: joints, motors, contact constraints, islands and integration.

pub mod constraint;
pub mod contact_constraint;
pub mod integrator;
pub mod island;
pub mod joints;
pub mod motors;
pub mod solver;
pub mod solver_group;

pub use constraint::{Constraint, SolverState, SolverUpdateable};
pub use contact_constraint::{
    ContactInformation, ContactManifoldConstraint, ContactPenetrationConstraint,
};
pub use integrator::Integrator;
pub use island::{ConnectionOwner, DeactivationManager, Island};
pub use joints::{
    BallSocketJoint, HingeFrame, NoRotationJoint, RevoluteAngularJoint, RevoluteLimit,
    RevoluteMotor,
};
pub use motors::{SingleEntityAngularMotor, SingleEntityLinearMotor};
pub use solver::{Solver, SolverStepMetrics};
pub use solver_group::{GroupKind, SolverGroup};
