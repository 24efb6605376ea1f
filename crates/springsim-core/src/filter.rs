//! Per-particle velocity filter for pin and contact constraints.
//!
//! Each particle owns a symmetric, idempotent 2x2 projector onto the
//! directions its velocity is still free to change in:
//!
//! - free: identity
//! - pinned: zero
//! - resting on a wall with normal `n`: `I - n nᵀ`
//!
//! The solver applies the filter to every vector in its recurrence, so the
//! iteration never moves a particle along a constrained direction. The
//! companion vector `z` holds the prescribed velocity change along those
//! directions and seeds the solve.

use glam::{DMat2, DVec2};

use crate::error::{check_len, SimError, SimResult};
use crate::math::outer;
use crate::particle::ParticleSet;

pub struct ConstraintFilter {
    projectors: Vec<DMat2>,
    target: Vec<f64>,
}

impl ConstraintFilter {
    /// Creates an unconstrained filter for `count` particles.
    pub fn new(count: usize) -> Self {
        Self {
            projectors: vec![DMat2::IDENTITY; count],
            target: vec![0.0; 2 * count],
        }
    }

    /// Number of particles covered.
    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }

    /// Re-derive every projector from the current pin/contact state and
    /// clear the target vector.
    pub fn rebuild(&mut self, particles: &ParticleSet) -> SimResult<()> {
        check_len("particle count", self.len(), particles.count)?;

        for (i, s) in self.projectors.iter_mut().enumerate() {
            *s = if particles.pinned[i] {
                DMat2::ZERO
            } else if let Some(n) = particles.contact[i] {
                let n = n.normalize_or_zero();
                DMat2::IDENTITY - outer(n, n)
            } else {
                DMat2::IDENTITY
            };
        }
        self.target.fill(0.0);
        Ok(())
    }

    /// Replace each particle's pair `(x[2i], x[2i+1])` with `S[i]` applied to it.
    ///
    /// `x` must be `2 * len()` long; use [`try_apply`](Self::try_apply) for
    /// vectors of unchecked length.
    pub fn apply<'a>(&self, x: &'a mut [f64]) -> &'a mut [f64] {
        debug_assert_eq!(x.len(), 2 * self.len(), "filtered vector length");
        for (s, pair) in self.projectors.iter().zip(x.chunks_exact_mut(2)) {
            // Free pairs pass through untouched (0 * inf would give NaN).
            if *s == DMat2::IDENTITY {
                continue;
            }
            let v = *s * DVec2::new(pair[0], pair[1]);
            pair[0] = v.x;
            pair[1] = v.y;
        }
        x
    }

    /// [`apply`](Self::apply) after checking the length of `x`.
    pub fn try_apply<'a>(&self, x: &'a mut [f64]) -> SimResult<&'a mut [f64]> {
        check_len("filtered vector length", 2 * self.len(), x.len())?;
        Ok(self.apply(x))
    }

    /// Projector for particle `index`.
    pub fn projector(&self, index: usize) -> SimResult<DMat2> {
        self.check_index(index)?;
        Ok(self.projectors[index])
    }

    /// Prescribe a velocity change for particle `index` along its
    /// constrained directions. Only the component outside the free
    /// subspace is stored.
    ///
    /// Cleared by the next [`rebuild`](Self::rebuild).
    pub fn set_target(&mut self, index: usize, dv: DVec2) -> SimResult<()> {
        self.check_index(index)?;
        let constrained = (DMat2::IDENTITY - self.projectors[index]) * dv;
        self.target[2 * index] = constrained.x;
        self.target[2 * index + 1] = constrained.y;
        Ok(())
    }

    /// The target vector `z`, 2n long.
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    fn check_index(&self, index: usize) -> SimResult<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(SimError::ParticleOutOfBounds {
                index,
                count: self.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particles(n: usize) -> ParticleSet {
        let mut set = ParticleSet::new();
        for i in 0..n {
            set.push(DVec2::new(i as f64, 0.0), DVec2::ZERO, 1.0).unwrap();
        }
        set
    }

    #[test]
    fn test_default_is_identity() {
        let filter = ConstraintFilter::new(3);
        let mut x = [1.0, -2.0, 3.5, 4.0, -0.25, 9.0];
        let before = x;
        filter.apply(&mut x);
        assert_eq!(x, before);
    }

    #[test]
    fn test_rebuild_rejects_wrong_particle_count() {
        let mut filter = ConstraintFilter::new(2);
        assert!(filter.rebuild(&particles(3)).is_err());
    }

    #[test]
    fn test_contact_removes_normal_component_only() {
        let mut set = particles(1);
        set.contact[0] = Some(DVec2::Y);
        let mut filter = ConstraintFilter::new(1);
        filter.rebuild(&set).unwrap();

        let mut x = [2.0, -5.0];
        filter.apply(&mut x);
        assert_eq!(x, [2.0, 0.0]);
    }

    #[test]
    fn test_oblique_contact_projector_is_idempotent() {
        let mut set = particles(1);
        set.contact[0] = Some(DVec2::new(1.0, 1.0));
        let mut filter = ConstraintFilter::new(1);
        filter.rebuild(&set).unwrap();

        let s = filter.projector(0).unwrap();
        let diff = s * s - s;
        assert!(diff.x_axis.length() < 1e-15 && diff.y_axis.length() < 1e-15);
    }

    #[test]
    fn test_pin_overrides_contact() {
        let mut set = particles(1);
        set.contact[0] = Some(DVec2::X);
        set.pinned[0] = true;
        let mut filter = ConstraintFilter::new(1);
        filter.rebuild(&set).unwrap();
        assert_eq!(filter.projector(0).unwrap(), DMat2::ZERO);
    }

    #[test]
    fn test_set_target_keeps_constrained_part_and_rebuild_clears_it() {
        let mut set = particles(2);
        set.pinned[1] = true;
        let mut filter = ConstraintFilter::new(2);
        filter.rebuild(&set).unwrap();

        filter.set_target(0, DVec2::new(1.0, 1.0)).unwrap();
        filter.set_target(1, DVec2::new(0.5, -0.5)).unwrap();
        assert_eq!(filter.target(), &[0.0, 0.0, 0.5, -0.5]);

        filter.rebuild(&set).unwrap();
        assert!(filter.target().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_try_apply_rejects_wrong_length() {
        let filter = ConstraintFilter::new(2);
        let mut short = [1.0, 2.0, 3.0];
        assert_eq!(
            filter.try_apply(&mut short),
            Err(SimError::DimensionMismatch {
                what: "filtered vector length",
                expected: 4,
                actual: 3,
            })
        );
        assert_eq!(short, [1.0, 2.0, 3.0], "rejected vector is untouched");

        let mut x = [1.0, 2.0, 3.0, 4.0];
        assert!(filter.try_apply(&mut x).is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "filtered vector length")]
    fn test_apply_asserts_length_in_debug_builds() {
        let filter = ConstraintFilter::new(2);
        filter.apply(&mut [0.0; 6]);
    }

    #[test]
    fn test_out_of_range_index_is_an_error() {
        let mut filter = ConstraintFilter::new(2);
        let out_of_bounds = SimError::ParticleOutOfBounds { index: 2, count: 2 };

        assert_eq!(filter.projector(2), Err(out_of_bounds.clone()));
        assert_eq!(filter.set_target(2, DVec2::X), Err(out_of_bounds));
        assert!(filter.target().iter().all(|&v| v == 0.0));
    }
}
