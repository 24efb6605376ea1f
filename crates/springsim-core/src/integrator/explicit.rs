//! Explicit integrators: forward Euler, classical RK4 and velocity Verlet.
//!
//! None of these use the constraint filter. Pinned particles keep their
//! position and a zero velocity because their acceleration is zero.

use glam::DVec2;

use super::Integrator;
use crate::error::SimResult;
use crate::system::ParticleSystem;

/// `x += h v`, then `v += h a`, both from the start-of-step state.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn name(&self) -> &'static str {
        "forward_euler"
    }

    fn step(&mut self, system: &mut ParticleSystem, _time: f64, dt: f64, _iterations: usize) -> SimResult<()> {
        system.compute_forces()?;
        let p = &mut system.particles;
        for i in 0..p.count {
            if p.pinned[i] {
                p.velocity[i] = DVec2::ZERO;
                continue;
            }
            p.position[i] += p.velocity[i] * dt;
            p.velocity[i] += p.force[i] / p.mass[i] * dt;
        }
        Ok(())
    }
}

/// Classical four-stage Runge-Kutta on `(x, v)`.
#[derive(Clone, Debug, Default)]
pub struct RungeKutta4 {
    stage_pos: Vec<DVec2>,
    stage_vel: Vec<DVec2>,
    /// Position derivatives for stages 1-4.
    kx: [Vec<DVec2>; 4],
    /// Velocity derivatives for stages 1-4.
    kv: [Vec<DVec2>; 4],
}

impl RungeKutta4 {
    fn resize(&mut self, count: usize) {
        self.stage_pos.resize(count, DVec2::ZERO);
        self.stage_vel.resize(count, DVec2::ZERO);
        for k in self.kx.iter_mut().chain(self.kv.iter_mut()) {
            k.resize(count, DVec2::ZERO);
        }
    }
}

impl Integrator for RungeKutta4 {
    fn name(&self) -> &'static str {
        "runge_kutta4"
    }

    fn step(&mut self, system: &mut ParticleSystem, _time: f64, dt: f64, _iterations: usize) -> SimResult<()> {
        let count = system.particles.count;
        self.resize(count);

        // Stage offsets along the previous stage's derivative.
        let offsets = [0.0, 0.5 * dt, 0.5 * dt, dt];
        for stage in 0..4 {
            let p = &system.particles;
            for i in 0..count {
                if stage == 0 {
                    self.stage_pos[i] = p.position[i];
                    self.stage_vel[i] = p.velocity[i];
                } else {
                    self.stage_pos[i] = p.position[i] + self.kx[stage - 1][i] * offsets[stage];
                    self.stage_vel[i] = p.velocity[i] + self.kv[stage - 1][i] * offsets[stage];
                }
            }
            self.kx[stage].copy_from_slice(&self.stage_vel);
            system.accelerations_at(&self.stage_pos, &self.stage_vel, &mut self.kv[stage])?;
        }

        let p = &mut system.particles;
        let sixth = dt / 6.0;
        let [kx1, kx2, kx3, kx4] = &self.kx;
        let [kv1, kv2, kv3, kv4] = &self.kv;
        for i in 0..count {
            if p.pinned[i] {
                p.velocity[i] = DVec2::ZERO;
                continue;
            }
            p.position[i] += (kx1[i] + 2.0 * kx2[i] + 2.0 * kx3[i] + kx4[i]) * sixth;
            p.velocity[i] += (kv1[i] + 2.0 * kv2[i] + 2.0 * kv3[i] + kv4[i]) * sixth;
        }
        Ok(())
    }
}

/// Velocity Verlet.
///
/// The end-of-step acceleration sees the velocity predicted by a forward
/// Euler step (drag and spring damping are velocity dependent).
#[derive(Clone, Debug, Default)]
pub struct VelocityVerlet {
    accel: Vec<DVec2>,
    next_accel: Vec<DVec2>,
    predicted_vel: Vec<DVec2>,
}

impl Integrator for VelocityVerlet {
    fn name(&self) -> &'static str {
        "velocity_verlet"
    }

    fn step(&mut self, system: &mut ParticleSystem, _time: f64, dt: f64, _iterations: usize) -> SimResult<()> {
        let count = system.particles.count;
        self.accel.resize(count, DVec2::ZERO);
        self.next_accel.resize(count, DVec2::ZERO);
        self.predicted_vel.resize(count, DVec2::ZERO);

        {
            let p = &system.particles;
            system.accelerations_at(&p.position, &p.velocity, &mut self.accel)?;
        }

        {
            let p = &mut system.particles;
            for i in 0..count {
                if p.pinned[i] {
                    continue;
                }
                p.position[i] += p.velocity[i] * dt + self.accel[i] * (0.5 * dt * dt);
                self.predicted_vel[i] = p.velocity[i] + self.accel[i] * dt;
            }
        }

        {
            let p = &system.particles;
            system.accelerations_at(&p.position, &self.predicted_vel, &mut self.next_accel)?;
        }

        let p = &mut system.particles;
        for i in 0..count {
            if p.pinned[i] {
                p.velocity[i] = DVec2::ZERO;
                continue;
            }
            p.velocity[i] += (self.accel[i] + self.next_accel[i]) * (0.5 * dt);
        }
        Ok(())
    }
}
