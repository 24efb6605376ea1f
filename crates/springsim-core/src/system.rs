//! Particle system context shared by every integrator.

use glam::DVec2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{check_len, SimError, SimResult};
use crate::particle::ParticleSet;
use crate::spring::{accumulate_spring_forces, Spring};

/// Particles, the springs connecting them, and the global force field.
#[derive(Clone, Debug, Default)]
pub struct ParticleSystem {
    pub particles: ParticleSet,
    pub springs: Vec<Spring>,
    /// Gravitational acceleration.
    pub gravity: DVec2,
    /// Viscous drag coefficient (force = -drag * velocity).
    pub drag: f64,
}

impl ParticleSystem {
    pub fn new(gravity: DVec2, drag: f64) -> Self {
        Self {
            particles: ParticleSet::new(),
            springs: Vec::new(),
            gravity,
            drag,
        }
    }

    pub fn add_particle(&mut self, position: DVec2, velocity: DVec2, mass: f64) -> SimResult<usize> {
        self.particles.push(position, velocity, mass)
    }

    /// Add a spring between two existing particles and return its index.
    pub fn add_spring(
        &mut self,
        a: usize,
        b: usize,
        rest_length: f64,
        stiffness: f64,
        damping: f64,
    ) -> SimResult<usize> {
        self.particles.check_index(a)?;
        self.particles.check_index(b)?;
        self.springs
            .push(Spring::new(a, b, rest_length, stiffness, damping)?);
        Ok(self.springs.len() - 1)
    }

    /// Add a spring whose rest length is the current distance between `a` and `b`.
    pub fn connect(&mut self, a: usize, b: usize, stiffness: f64, damping: f64) -> SimResult<usize> {
        self.particles.check_index(a)?;
        self.particles.check_index(b)?;
        let rest = self.particles.position[a].distance(self.particles.position[b]);
        self.add_spring(a, b, rest, stiffness, damping)
    }

    pub fn pin(&mut self, index: usize) -> SimResult<()> {
        self.particles.pin(index)
    }

    pub fn unpin(&mut self, index: usize) -> SimResult<()> {
        self.particles.unpin(index)
    }

    /// Recompute `particles.force` from gravity, drag and springs.
    ///
    /// Fails if a spring references a particle that does not exist.
    pub fn compute_forces(&mut self) -> SimResult<()> {
        self.check_spring_indices()?;
        let p = &mut self.particles;
        apply_ambient_forces(&p.mass, &p.velocity, &mut p.force, self.gravity, self.drag);
        accumulate_spring_forces(&self.springs, &p.position, &p.velocity, &mut p.force);
        Ok(())
    }

    /// Accelerations for an arbitrary state, leaving the stored state alone.
    ///
    /// Pinned particles get zero acceleration. All slices must be
    /// `particles.count` long.
    pub fn accelerations_at(
        &self,
        positions: &[DVec2],
        velocities: &[DVec2],
        out: &mut [DVec2],
    ) -> SimResult<()> {
        let p = &self.particles;
        check_len("stage positions", p.count, positions.len())?;
        check_len("stage velocities", p.count, velocities.len())?;
        check_len("acceleration output", p.count, out.len())?;
        self.check_spring_indices()?;

        apply_ambient_forces(&p.mass, velocities, out, self.gravity, self.drag);
        accumulate_spring_forces(&self.springs, positions, velocities, out);
        for ((a, m), pinned) in out.iter_mut().zip(&p.mass).zip(&p.pinned) {
            *a = if *pinned { DVec2::ZERO } else { *a / *m };
        }
        Ok(())
    }

    /// Kinetic plus spring potential energy, minus the gravitational term.
    pub fn total_energy(&self) -> f64 {
        let p = &self.particles;
        let gravity: f64 = p
            .position
            .iter()
            .zip(&p.mass)
            .map(|(x, m)| -m * self.gravity.dot(*x))
            .sum();
        let springs: f64 = self
            .springs
            .iter()
            .map(|s| s.potential_energy(&p.position))
            .sum();
        p.kinetic_energy() + springs + gravity
    }

    /// Every spring must connect two existing particles.
    pub fn check_spring_indices(&self) -> SimResult<()> {
        for s in &self.springs {
            if s.a >= self.particles.count || s.b >= self.particles.count {
                return Err(SimError::InvalidSpring(format!(
                    "spring ({}, {}) references a missing particle (count: {})",
                    s.a, s.b, self.particles.count
                )));
            }
        }
        Ok(())
    }
}

/// `f = m g - drag v` for every particle.
fn apply_ambient_forces(
    mass: &[f64],
    velocity: &[DVec2],
    forces: &mut [DVec2],
    gravity: DVec2,
    drag: f64,
) {
    #[cfg(feature = "parallel")]
    {
        forces
            .par_iter_mut()
            .zip(mass.par_iter())
            .zip(velocity.par_iter())
            .for_each(|((f, m), v)| *f = gravity * *m - *v * drag);
    }

    #[cfg(not(feature = "parallel"))]
    {
        for ((f, m), v) in forces.iter_mut().zip(mass).zip(velocity) {
            *f = gravity * *m - *v * drag;
        }
    }
}
