//! 2D mass-spring simulation with implicit integration.
//!
//! The core of the crate is [`ConstrainedPcg`], a preconditioned conjugate
//! gradient solver that enforces pin and contact constraints by filtering
//! every vector of its recurrence through a per-particle projector. The
//! [`ImplicitEuler`] integrator builds the linear system for a backward
//! Euler step and hands it to the solver; [`Simulation`] ties a
//! [`ParticleSystem`], an integrator and an optional [`BoxBoundary`]
//! together behind a serde-friendly [`SimulationConfig`].
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod boundary;
pub mod config;
pub mod error;
pub mod filter;
pub mod integrator;
pub mod math;
pub mod matrix;
pub mod particle;
pub mod pcg;
pub mod simulation;
pub mod spring;
pub mod system;

pub use boundary::BoxBoundary;
pub use config::SimulationConfig;
pub use error::{SimError, SimResult};
pub use filter::ConstraintFilter;
pub use integrator::{
    ForwardEuler, ImplicitEuler, Integrator, IntegratorKind, RungeKutta4, VelocityVerlet,
};
pub use matrix::{CsrMatrix, DenseMatrix, SystemMatrix};
pub use particle::ParticleSet;
pub use pcg::{ConstrainedPcg, SolveObserver, SolveStats, Termination};
pub use simulation::Simulation;
pub use spring::Spring;
pub use system::ParticleSystem;
