use crate::config::SimulationConfig;
use crate::error::SimResult;
use crate::integrator::Integrator;
use crate::system::ParticleSystem;

/// Owns a [`ParticleSystem`] and advances it with the configured integrator.
pub struct Simulation {
    pub system: ParticleSystem,
    config: SimulationConfig,
    integrator: Box<dyn Integrator>,
    time: f64,
    steps: u64,
}

impl Simulation {
    /// Validates `config` and the spring indices, then builds the integrator.
    ///
    /// The config's gravity and drag replace whatever `system` carried.
    pub fn new(mut system: ParticleSystem, config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        system.check_spring_indices()?;
        system.gravity = config.gravity;
        system.drag = config.drag;

        let integrator = config.integrator.build(&system.particles);
        log::debug!(
            "simulation created: {} particles, {} springs, {} integrator",
            system.particles.count,
            system.springs.len(),
            integrator.name()
        );

        Ok(Self {
            system,
            config,
            integrator,
            time: 0.0,
            steps: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn integrator_name(&self) -> &'static str {
        self.integrator.name()
    }

    /// Rebuild the integrator, e.g. after particles were added.
    pub fn reset_integrator(&mut self) -> SimResult<()> {
        self.system.check_spring_indices()?;
        self.integrator = self.config.integrator.build(&self.system.particles);
        Ok(())
    }

    /// Advance by `dt` seconds. Negligible steps are skipped.
    pub fn step(&mut self, dt: f64) -> SimResult<()> {
        if dt.abs() < 1.0e-12 {
            return Ok(());
        }

        self.integrator
            .step(&mut self.system, self.time, dt, self.config.solver_iterations)?;
        if let Some(boundary) = &self.config.boundary {
            boundary.resolve(&mut self.system.particles);
        }

        self.time += dt;
        self.steps += 1;
        Ok(())
    }

    /// Take `steps` steps of `config.timestep`.
    pub fn run(&mut self, steps: usize) -> SimResult<()> {
        let dt = self.config.timestep;
        for _ in 0..steps {
            self.step(dt)?;
        }
        Ok(())
    }
}
