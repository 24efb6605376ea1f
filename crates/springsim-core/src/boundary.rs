use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::particle::ParticleSet;

/// Axis-aligned box that keeps particles inside.
///
/// Particles that cross a wall are clamped back onto it and their normal
/// velocity is reflected and scaled by `restitution`. A rebound slower than
/// `rest_speed` is cancelled instead and the particle is marked as resting
/// on that wall, which the implicit integrator turns into a contact
/// constraint.
///
/// Only one contact normal is kept per particle; in a corner the y wall wins.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxBoundary {
    pub min: DVec2,
    pub max: DVec2,
    /// Fraction of normal speed kept after a bounce, in [0, 1].
    pub restitution: f64,
    /// Rebounds slower than this come to rest on the wall.
    pub rest_speed: f64,
    /// Distance from a wall within which a resting particle stays in contact.
    pub contact_slop: f64,
}

impl Default for BoxBoundary {
    fn default() -> Self {
        Self {
            min: DVec2::new(-10.0, -10.0),
            max: DVec2::new(10.0, 10.0),
            restitution: 0.5,
            rest_speed: 0.1,
            contact_slop: 1e-6,
        }
    }
}

impl BoxBoundary {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_rest_speed(mut self, rest_speed: f64) -> Self {
        self.rest_speed = rest_speed;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min.cmpge(self.max).any() {
            return Err(SimError::InvalidConfig(format!(
                "boundary min {} must be below max {}",
                self.min, self.max
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::InvalidConfig(format!(
                "restitution must be in [0, 1], got {}",
                self.restitution
            )));
        }
        if !(self.rest_speed >= 0.0 && self.contact_slop >= 0.0) {
            return Err(SimError::InvalidConfig(
                "rest speed and contact slop must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Push every free particle back inside and refresh its contact state.
    pub fn resolve(&self, particles: &mut ParticleSet) {
        for i in 0..particles.count {
            if particles.pinned[i] {
                particles.contact[i] = None;
                continue;
            }

            let previous = particles.contact[i];
            let mut contact = None;
            let pos = &mut particles.position[i];
            let vel = &mut particles.velocity[i];

            for axis in 0..2 {
                let mut normal = DVec2::ZERO;
                normal[axis] = 1.0;
                // (wall coordinate, inward normal, penetration depth)
                let walls = [
                    (self.min[axis], normal, self.min[axis] - pos[axis]),
                    (self.max[axis], -normal, pos[axis] - self.max[axis]),
                ];

                for (wall, n, depth) in walls {
                    let vn = vel.dot(n);
                    if depth > 0.0 {
                        pos[axis] = wall;
                        if vn < 0.0 {
                            let rebound = -vn * self.restitution;
                            if rebound < self.rest_speed {
                                *vel -= n * vn;
                                contact = Some(n);
                            } else {
                                *vel += n * (rebound - vn);
                            }
                        } else if previous == Some(n) {
                            contact = Some(n);
                        }
                    } else if depth > -self.contact_slop && previous == Some(n) && vn <= 0.0 {
                        contact = Some(n);
                    }
                }
            }

            particles.contact[i] = contact;
        }
    }
}
