use glam::{DMat2, DVec2};

use crate::error::{SimError, SimResult};
use crate::math::outer;

/// Damped Hookean spring between two particles.
///
/// Contributes a force to both endpoints and, for the implicit
/// integrator, the force derivatives `∂f/∂x` (stiffness) and
/// `∂f/∂v` (damping) as 2x2 blocks.
///
/// Reference: "Large Steps in Cloth Simulation", Baraff & Witkin, 1998
#[derive(Clone, Debug, PartialEq)]
pub struct Spring {
    /// Particle index A.
    pub a: usize,
    /// Particle index B.
    pub b: usize,
    pub rest_length: f64,
    pub stiffness: f64,
    pub damping: f64,
}

/// The four 2x2 blocks of a spring's contribution are `[J, -J; -J, J]`,
/// so only the A-A block is stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringJacobian {
    /// `∂f_a/∂x_a`
    pub dfdx: DMat2,
    /// `∂f_a/∂v_a`
    pub dfdv: DMat2,
}

impl Spring {
    pub fn new(a: usize, b: usize, rest_length: f64, stiffness: f64, damping: f64) -> SimResult<Self> {
        if a == b {
            return Err(SimError::InvalidSpring(format!(
                "spring connects particle {a} to itself"
            )));
        }
        for (name, value) in [
            ("rest length", rest_length),
            ("stiffness", stiffness),
            ("damping", damping),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::InvalidSpring(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(Self {
            a,
            b,
            rest_length,
            stiffness,
            damping,
        })
    }

    /// Unit direction from B to A and the current length, or `None` when
    /// the endpoints coincide.
    fn axis(&self, positions: &[DVec2]) -> Option<(DVec2, f64)> {
        let l = positions[self.a] - positions[self.b];
        let len = l.length();
        if len < 1e-12 {
            None
        } else {
            Some((l / len, len))
        }
    }

    /// Force on particle A (particle B receives the negation).
    pub fn force(&self, positions: &[DVec2], velocities: &[DVec2]) -> DVec2 {
        let Some((dir, len)) = self.axis(positions) else {
            return DVec2::ZERO;
        };
        let rel_vel = velocities[self.a] - velocities[self.b];
        -(self.stiffness * (len - self.rest_length) + self.damping * rel_vel.dot(dir)) * dir
    }

    /// Force derivatives for the A-A block.
    ///
    /// The transverse stiffness term is clamped at zero under compression,
    /// which keeps the assembled stiffness matrix negative semidefinite.
    pub fn jacobian(&self, positions: &[DVec2]) -> SpringJacobian {
        let Some((dir, len)) = self.axis(positions) else {
            return SpringJacobian {
                dfdx: DMat2::ZERO,
                dfdv: DMat2::ZERO,
            };
        };
        let ddt = outer(dir, dir);
        let transverse = (1.0 - self.rest_length / len).max(0.0);
        SpringJacobian {
            dfdx: (ddt + (DMat2::IDENTITY - ddt) * transverse) * -self.stiffness,
            dfdv: ddt * -self.damping,
        }
    }

    pub fn potential_energy(&self, positions: &[DVec2]) -> f64 {
        let len = (positions[self.a] - positions[self.b]).length();
        0.5 * self.stiffness * (len - self.rest_length).powi(2)
    }
}

/// Add every spring's force into `forces`.
pub fn accumulate_spring_forces(
    springs: &[Spring],
    positions: &[DVec2],
    velocities: &[DVec2],
    forces: &mut [DVec2],
) {
    for s in springs {
        let f = s.force(positions, velocities);
        forces[s.a] += f;
        forces[s.b] -= f;
    }
}

/// Append the 2x2 block `m` at particle block `(row, col)` as scalar triplets.
pub fn push_block(triplets: &mut Vec<(usize, usize, f64)>, row: usize, col: usize, m: DMat2) {
    for c in 0..2 {
        let column = m.col(c);
        for r in 0..2 {
            triplets.push((2 * row + r, 2 * col + c, column[r]));
        }
    }
}

/// Append the stiffness (`∂f/∂x`) and damping (`∂f/∂v`) contributions of
/// every spring as triplets over the 2n degrees of freedom.
pub fn assemble_spring_jacobians(
    springs: &[Spring],
    positions: &[DVec2],
    stiffness: &mut Vec<(usize, usize, f64)>,
    damping: &mut Vec<(usize, usize, f64)>,
) {
    for s in springs {
        let j = s.jacobian(positions);
        for (out, block) in [(&mut *stiffness, j.dfdx), (&mut *damping, j.dfdv)] {
            push_block(out, s.a, s.a, block);
            push_block(out, s.b, s.b, block);
            push_block(out, s.a, s.b, block * -1.0);
            push_block(out, s.b, s.a, block * -1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_self_loop_and_negative_stiffness() {
        assert!(Spring::new(0, 0, 1.0, 1.0, 0.0).is_err());
        assert!(Spring::new(0, 1, 1.0, -1.0, 0.0).is_err());
        assert!(Spring::new(0, 1, f64::INFINITY, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let s = Spring::new(0, 1, 1.0, 10.0, 0.0).unwrap();
        let pos = [DVec2::ZERO, DVec2::new(2.0, 0.0)];
        let vel = [DVec2::ZERO; 2];
        let f = s.force(&pos, &vel);
        assert!((f - DVec2::new(10.0, 0.0)).length() < 1e-12, "force on A: {f}");
    }

    #[test]
    fn test_jacobian_matches_finite_difference() {
        let s = Spring::new(0, 1, 1.0, 7.0, 0.0).unwrap();
        let pos = [DVec2::new(0.3, -0.2), DVec2::new(1.5, 0.9)];
        let vel = [DVec2::ZERO; 2];
        let j = s.jacobian(&pos);
        let h = 1e-6;

        for axis in 0..2 {
            let mut plus = pos;
            let mut minus = pos;
            plus[0][axis] += h;
            minus[0][axis] -= h;
            let numeric = (s.force(&plus, &vel) - s.force(&minus, &vel)) / (2.0 * h);
            let analytic = j.dfdx.col(axis);
            assert!(
                (numeric - analytic).length() < 1e-5,
                "column {axis}: numeric {numeric} vs analytic {analytic}"
            );
        }
    }

    #[test]
    fn test_damping_jacobian_matches_finite_difference() {
        let s = Spring::new(0, 1, 1.0, 0.0, 3.0).unwrap();
        let pos = [DVec2::ZERO, DVec2::new(0.6, 0.8)];
        let j = s.jacobian(&pos);
        let h = 1e-6;

        for axis in 0..2 {
            let mut plus = [DVec2::ZERO; 2];
            let mut minus = [DVec2::ZERO; 2];
            plus[0][axis] += h;
            minus[0][axis] -= h;
            let numeric = (s.force(&pos, &plus) - s.force(&pos, &minus)) / (2.0 * h);
            assert!((numeric - j.dfdv.col(axis)).length() < 1e-6);
        }
    }

    #[test]
    fn test_assembled_blocks_sum_to_zero_per_row() {
        let s = Spring::new(0, 1, 0.5, 4.0, 1.0).unwrap();
        let pos = [DVec2::ZERO, DVec2::new(1.0, 1.0)];
        let mut k = Vec::new();
        let mut b = Vec::new();
        assemble_spring_jacobians(&[s], &pos, &mut k, &mut b);
        assert_eq!(k.len(), 16);

        let mut row_sums = [0.0; 4];
        for &(r, _, v) in &k {
            row_sums[r] += v;
        }
        assert!(row_sums.iter().all(|v| v.abs() < 1e-12), "row sums: {row_sums:?}");
    }
}
