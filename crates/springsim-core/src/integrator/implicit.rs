//! Backward (implicit) Euler with constraint filtering.
//!
//! Each step linearises the forces around the current state and solves
//!
//! ```text
//! (M - h²K - hB) Δv = h (f₀ + h K v₀)
//! ```
//!
//! with `K = ∂f/∂x` and `B = ∂f/∂v`, using [`ConstrainedPcg`] so that pinned
//! and contacting particles only change velocity along their free
//! directions.

use glam::DVec2;

use super::Integrator;
use crate::error::{check_len, SimError, SimResult};
use crate::math::{as_flat, as_flat_mut};
use crate::matrix::{CsrMatrix, SystemMatrix};
use crate::particle::ParticleSet;
use crate::pcg::{ConstrainedPcg, SolveStats};
use crate::spring::assemble_spring_jacobians;
use crate::system::ParticleSystem;

type Triplets = Vec<(usize, usize, f64)>;

pub struct ImplicitEuler {
    solver: ConstrainedPcg,
    stiffness: Triplets,
    damping: Triplets,
    system_matrix: Triplets,
    rhs: Vec<f64>,
    k_times_v: Vec<f64>,
    delta_v: Vec<DVec2>,
    last_stats: Option<SolveStats>,
}

impl ImplicitEuler {
    /// Sizes the solver for `particles`; the particle count is fixed from here on.
    pub fn new(particles: &ParticleSet) -> Self {
        let dof = particles.dof();
        Self {
            solver: ConstrainedPcg::new(particles),
            stiffness: Vec::new(),
            damping: Vec::new(),
            system_matrix: Vec::new(),
            rhs: vec![0.0; dof],
            k_times_v: vec![0.0; dof],
            delta_v: vec![DVec2::ZERO; particles.count],
            last_stats: None,
        }
    }

    /// Statistics from the most recent solve.
    pub fn last_stats(&self) -> Option<SolveStats> {
        self.last_stats
    }

    /// Constraint force of particle `index` from the most recent step.
    pub fn constraint_force(&self, index: usize) -> SimResult<DVec2> {
        let count = self.solver.particle_count();
        if index >= count {
            return Err(SimError::ParticleOutOfBounds { index, count });
        }
        let f = self.solver.constraint_force();
        Ok(DVec2::new(f[2 * index], f[2 * index + 1]))
    }

    /// Build `A = M - h²K - hB` and `b = h (f₀ + h K v₀)`.
    ///
    /// Expects `system.particles.force` to be current.
    pub fn assemble(&mut self, system: &ParticleSystem, dt: f64) -> SimResult<CsrMatrix> {
        let p = &system.particles;
        check_len("particle count", self.solver.particle_count(), p.count)?;
        system.check_spring_indices()?;
        let dof = p.dof();

        self.stiffness.clear();
        self.damping.clear();
        assemble_spring_jacobians(&system.springs, &p.position, &mut self.stiffness, &mut self.damping);
        if system.drag != 0.0 {
            for i in 0..dof {
                self.damping.push((i, i, -system.drag));
            }
        }

        let k = CsrMatrix::from_triplets(dof, &self.stiffness)?;
        k.mul_vec(as_flat(&p.velocity), &mut self.k_times_v);
        for ((b, f), kv) in self.rhs.iter_mut().zip(as_flat(&p.force)).zip(&self.k_times_v) {
            *b = dt * (f + dt * kv);
        }

        self.system_matrix.clear();
        for (i, m) in p.mass.iter().enumerate() {
            self.system_matrix.push((2 * i, 2 * i, *m));
            self.system_matrix.push((2 * i + 1, 2 * i + 1, *m));
        }
        let h2 = dt * dt;
        self.system_matrix
            .extend(self.stiffness.iter().map(|&(r, c, v)| (r, c, -h2 * v)));
        self.system_matrix
            .extend(self.damping.iter().map(|&(r, c, v)| (r, c, -dt * v)));

        CsrMatrix::from_triplets(dof, &self.system_matrix)
    }

    /// Right-hand side from the most recent [`assemble`](Self::assemble).
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// Drop contacts whose constraint force points into the wall: the wall
    /// would have to pull the particle to hold it.
    fn release_pulling_contacts(&self, particles: &mut ParticleSet) {
        let forces = self.solver.constraint_force().chunks_exact(2);
        for (i, (contact, f)) in particles.contact.iter_mut().zip(forces).enumerate() {
            if let Some(n) = *contact {
                if DVec2::new(f[0], f[1]).dot(n) < 0.0 {
                    log::trace!("releasing contact on particle {i}");
                    *contact = None;
                }
            }
        }
    }
}

impl Integrator for ImplicitEuler {
    fn name(&self) -> &'static str {
        "implicit_euler"
    }

    fn step(&mut self, system: &mut ParticleSystem, _time: f64, dt: f64, iterations: usize) -> SimResult<()> {
        check_len("particle count", self.solver.particle_count(), system.particles.count)?;

        system.compute_forces()?;
        let a = self.assemble(system, dt)?;

        self.solver.update_constraints(&system.particles)?;
        let stats = self
            .solver
            .solve(&a, &self.rhs, as_flat_mut(&mut self.delta_v), iterations)?;
        self.last_stats = Some(stats);

        if !self.delta_v.iter().all(|dv| dv.is_finite()) {
            log::warn!(
                "implicit step produced a non-finite velocity change ({:?}); state left unchanged",
                stats.termination
            );
            return Ok(());
        }

        let p = &mut system.particles;
        for i in 0..p.count {
            if p.pinned[i] {
                continue;
            }
            p.velocity[i] += self.delta_v[i];
            p.position[i] += p.velocity[i] * dt;
        }
        self.release_pulling_contacts(p);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_free_particle_without_springs() {
        let mut system = ParticleSystem::new(DVec2::new(0.0, -10.0), 0.0);
        system.add_particle(DVec2::ZERO, DVec2::ZERO, 2.0).unwrap();
        system.compute_forces().unwrap();

        let mut integrator = ImplicitEuler::new(&system.particles);
        let a = integrator.assemble(&system, 0.1).unwrap();

        assert_eq!(a.get(0, 0), 2.0);
        assert_eq!(a.get(1, 1), 2.0);
        assert_eq!(a.get(0, 1), 0.0);
        assert!((integrator.rhs()[1] + 2.0).abs() < 1e-12, "b = h f = 0.1 * -20");
    }

    #[test]
    fn test_drag_adds_to_diagonal() {
        let mut system = ParticleSystem::new(DVec2::ZERO, 4.0);
        system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
        system.compute_forces().unwrap();

        let mut integrator = ImplicitEuler::new(&system.particles);
        let a = integrator.assemble(&system, 0.5).unwrap();
        assert_eq!(a.diagonal(0), 1.0 + 0.5 * 4.0);
    }

    #[test]
    fn test_free_fall_matches_backward_euler() {
        let mut system = ParticleSystem::new(DVec2::new(0.0, -10.0), 0.0);
        system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
        let mut integrator = ImplicitEuler::new(&system.particles);

        integrator.step(&mut system, 0.0, 0.1, 10).unwrap();
        let p = &system.particles;
        assert!((p.velocity[0].y + 1.0).abs() < 1e-12);
        assert!((p.position[0].y + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_grown_particle_set() {
        let mut system = ParticleSystem::default();
        system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
        let mut integrator = ImplicitEuler::new(&system.particles);
        system.add_particle(DVec2::X, DVec2::ZERO, 1.0).unwrap();

        assert!(integrator.step(&mut system, 0.0, 0.01, 10).is_err());
    }

    #[test]
    fn test_contact_released_when_pulled_off_the_wall() {
        // Upward gravity pulls the particle away from a floor contact.
        let mut system = ParticleSystem::new(DVec2::new(0.0, 5.0), 0.0);
        system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
        system.particles.contact[0] = Some(DVec2::Y);
        let mut integrator = ImplicitEuler::new(&system.particles);

        integrator.step(&mut system, 0.0, 0.1, 10).unwrap();
        assert_eq!(system.particles.velocity[0], DVec2::ZERO, "filtered step");
        assert_eq!(system.particles.contact[0], None);

        integrator.step(&mut system, 0.1, 0.1, 10).unwrap();
        assert!(system.particles.velocity[0].y > 0.0);
    }

    #[test]
    fn test_resting_contact_is_kept() {
        let mut system = ParticleSystem::new(DVec2::new(0.0, -9.81), 0.0);
        system.add_particle(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
        system.particles.contact[0] = Some(DVec2::Y);
        let mut integrator = ImplicitEuler::new(&system.particles);

        integrator.step(&mut system, 0.0, 0.01, 10).unwrap();
        assert_eq!(system.particles.contact[0], Some(DVec2::Y));
        assert_eq!(system.particles.position[0], DVec2::ZERO);
        assert!(integrator.constraint_force(0).unwrap().y > 0.0, "floor pushes up");
        assert_eq!(
            integrator.constraint_force(1),
            Err(SimError::ParticleOutOfBounds { index: 1, count: 1 })
        );
    }
}
