use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::boundary::BoxBoundary;
use crate::error::{SimError, SimResult};
use crate::integrator::IntegratorKind;

/// Settings for a [`Simulation`](crate::simulation::Simulation).
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Step length used by [`Simulation::run`](crate::simulation::Simulation::run).
    pub timestep: f64,
    /// PCG iteration cap for implicit integration.
    pub solver_iterations: usize,
    pub gravity: DVec2,
    pub drag: f64,
    pub integrator: IntegratorKind,
    pub boundary: Option<BoxBoundary>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            solver_iterations: 20,
            gravity: DVec2::new(0.0, -9.81),
            drag: 0.0,
            integrator: IntegratorKind::default(),
            boundary: None,
        }
    }
}

impl SimulationConfig {
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_solver_iterations(mut self, iterations: usize) -> Self {
        self.solver_iterations = iterations;
        self
    }

    pub fn with_gravity(mut self, gravity: DVec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_drag(mut self, drag: f64) -> Self {
        self.drag = drag;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_boundary(mut self, boundary: BoxBoundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if !self.gravity.is_finite() {
            return Err(SimError::InvalidConfig("gravity must be finite".into()));
        }
        if !(self.drag.is_finite() && self.drag >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "drag must be non-negative, got {}",
                self.drag
            )));
        }
        if let Some(boundary) = &self.boundary {
            boundary.validate()?;
        }
        Ok(())
    }
}
