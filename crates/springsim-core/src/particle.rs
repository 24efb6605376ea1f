use glam::DVec2;

use crate::error::{SimError, SimResult};

/// SoA particle storage.
///
/// A particle's index is its slot in these arrays. Slots are assigned by
/// [`ParticleSet::push`] and never renumbered, so flat solver vectors can
/// address particle `i` at `2i` (x) and `2i + 1` (y).
#[derive(Clone, Debug, Default)]
pub struct ParticleSet {
    pub count: usize,
    pub position: Vec<DVec2>,
    pub velocity: Vec<DVec2>,
    /// Accumulated force for the current step
    pub force: Vec<DVec2>,
    pub mass: Vec<f64>,
    /// Pinned particles never move (zero velocity-change directions).
    pub pinned: Vec<bool>,
    /// Normal of the wall a particle rests on, pointing away from the wall
    pub contact: Vec<Option<DVec2>>,
}

impl ParticleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a particle and return its index.
    pub fn push(&mut self, position: DVec2, velocity: DVec2, mass: f64) -> SimResult<usize> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimError::InvalidMass(mass));
        }
        let index = self.count;
        self.position.push(position);
        self.velocity.push(velocity);
        self.force.push(DVec2::ZERO);
        self.mass.push(mass);
        self.pinned.push(false);
        self.contact.push(None);
        self.count += 1;
        Ok(index)
    }

    pub fn check_index(&self, index: usize) -> SimResult<()> {
        if index < self.count {
            Ok(())
        } else {
            Err(SimError::ParticleOutOfBounds {
                index,
                count: self.count,
            })
        }
    }

    /// Pin a particle in place; its velocity is cleared.
    pub fn pin(&mut self, index: usize) -> SimResult<()> {
        self.check_index(index)?;
        self.pinned[index] = true;
        self.velocity[index] = DVec2::ZERO;
        Ok(())
    }

    pub fn unpin(&mut self, index: usize) -> SimResult<()> {
        self.check_index(index)?;
        self.pinned[index] = false;
        Ok(())
    }

    /// Number of scalar degrees of freedom (two per particle).
    #[inline]
    pub fn dof(&self) -> usize {
        2 * self.count
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.velocity
            .iter()
            .zip(&self.mass)
            .map(|(v, m)| 0.5 * m * v.length_squared())
            .sum()
    }
}
