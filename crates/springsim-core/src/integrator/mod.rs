//! Time integrators.
//!
//! Every integrator advances a [`ParticleSystem`] by one step through the
//! same [`Integrator`] contract. Only [`ImplicitEuler`] needs the
//! constraint filter and the PCG solver; the explicit schemes honour pins
//! by never moving pinned particles.

pub mod explicit;
pub mod implicit;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::particle::ParticleSet;
use crate::system::ParticleSystem;

pub use explicit::{ForwardEuler, RungeKutta4, VelocityVerlet};
pub use implicit::ImplicitEuler;

/// One time-integration scheme.
pub trait Integrator {
    /// Short identifier, matching the config spelling.
    fn name(&self) -> &'static str;

    /// Advance `system` from `time` to `time + dt`.
    ///
    /// `iterations` caps the linear solver for implicit schemes and is
    /// ignored by explicit ones.
    fn step(
        &mut self,
        system: &mut ParticleSystem,
        time: f64,
        dt: f64,
        iterations: usize,
    ) -> SimResult<()>;
}

/// Integrator selection for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    ForwardEuler,
    RungeKutta4,
    VelocityVerlet,
    #[default]
    ImplicitEuler,
}

impl IntegratorKind {
    /// Build an integrator sized for `particles`.
    pub fn build(self, particles: &ParticleSet) -> Box<dyn Integrator> {
        match self {
            IntegratorKind::ForwardEuler => Box::new(ForwardEuler),
            IntegratorKind::RungeKutta4 => Box::new(RungeKutta4::default()),
            IntegratorKind::VelocityVerlet => Box::new(VelocityVerlet::default()),
            IntegratorKind::ImplicitEuler => Box::new(ImplicitEuler::new(particles)),
        }
    }
}
