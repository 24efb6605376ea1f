//! Modified preconditioned Conjugate Gradient with constraint filtering.
//!
//! Solves `A Δv = b` restricted to the free subspace described by a
//! [`ConstraintFilter`], leaving the constrained components of `Δv` at the
//! filter's target `z`. After the iteration the residual `A Δv - b` is kept
//! as the constraint force: the force the pins and contacts had to apply.
//!
//! Reference: "Large Steps in Cloth Simulation", Baraff & Witkin, 1998
//!
//! The two diagonal operators are used as follows:
//! - `P = diag(1 / A_ii)` scales the reference magnitude `δ₀ = bfᵀ P bf`
//! - `Pinv = diag(A_ii)` scales the search direction (`c = Pinv r`, `s = Pinv r`)

use crate::error::{check_len, SimResult};
use crate::filter::ConstraintFilter;
use crate::math::{axpy, dot, dot_diag, mul_diag, sub_into, xpby};
use crate::matrix::SystemMatrix;
use crate::particle::ParticleSet;

/// Relative convergence tolerance: the loop stops once `δ_new < ε² δ₀`.
pub const EPSILON: f64 = 1e-12;

/// Preconditioner entry for a row whose diagonal is exactly zero.
pub const INFINITE_COMPLIANCE: f64 = 1e30;

/// Why the iteration loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// `δ_new` fell below the relative tolerance.
    Converged,
    /// The iteration cap was reached first.
    IterationLimit,
    /// A step denominator (`cᵀq` or `δ_old`) was zero, negative or not
    /// finite; the current estimate was kept.
    Degenerate,
}

/// Summary of one solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub iterations: usize,
    pub termination: Termination,
    /// Reference magnitude `bfᵀ P bf`.
    pub delta_0: f64,
    /// Final `rᵀ s`.
    pub delta_new: f64,
}

/// Hook for monitoring the solver, e.g. to record the residual history.
pub trait SolveObserver {
    /// Called after each completed iteration with the updated `δ_new`.
    fn on_iteration(&mut self, _iteration: usize, _delta_new: f64) {}
}

/// Observer that does nothing.
pub struct NoOpSolveObserver;

impl SolveObserver for NoOpSolveObserver {}

/// Records `δ_new` after every iteration.
impl SolveObserver for Vec<f64> {
    fn on_iteration(&mut self, _iteration: usize, delta_new: f64) {
        self.push(delta_new);
    }
}

/// Constrained PCG solver for a fixed particle count.
///
/// All working storage is allocated once in the constructor and reused by
/// every [`solve`](Self::solve). A different particle count needs a new
/// solver. One instance must not be shared between concurrent solves.
pub struct ConstrainedPcg {
    filter: ConstraintFilter,
    /// P
    precond: Vec<f64>,
    /// Pinv
    precond_inv: Vec<f64>,
    residual: Vec<f64>,
    direction: Vec<f64>,
    product: Vec<f64>,
    scaled: Vec<f64>,
    filtered_rhs: Vec<f64>,
    /// Holds `A Δv - b` after a solve.
    tmp: Vec<f64>,
}

impl ConstrainedPcg {
    /// Sizes the solver for `particles` with an unconstrained filter.
    pub fn new(particles: &ParticleSet) -> Self {
        Self::with_particle_count(particles.count)
    }

    pub fn with_particle_count(count: usize) -> Self {
        let dof = 2 * count;
        Self {
            filter: ConstraintFilter::new(count),
            precond: vec![0.0; dof],
            precond_inv: vec![0.0; dof],
            residual: vec![0.0; dof],
            direction: vec![0.0; dof],
            product: vec![0.0; dof],
            scaled: vec![0.0; dof],
            filtered_rhs: vec![0.0; dof],
            tmp: vec![0.0; dof],
        }
    }

    pub fn particle_count(&self) -> usize {
        self.filter.len()
    }

    /// Number of scalar unknowns (2n).
    pub fn dof(&self) -> usize {
        self.tmp.len()
    }

    /// Rebuild the constraint filter from the current pin/contact state.
    ///
    /// Call before every solve in which constraints may have changed.
    pub fn update_constraints(&mut self, particles: &ParticleSet) -> SimResult<()> {
        self.filter.rebuild(particles)
    }

    pub fn filter(&self) -> &ConstraintFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut ConstraintFilter {
        &mut self.filter
    }

    /// Constraint force `A Δv - b` from the most recent solve.
    pub fn constraint_force(&self) -> &[f64] {
        &self.tmp
    }

    /// Solve `A Δv = b` within the filtered subspace.
    ///
    /// `dv` is overwritten with the filter target before iterating and holds
    /// the answer on return. The constraint force is available from
    /// [`constraint_force`](Self::constraint_force) afterwards.
    pub fn solve<M>(
        &mut self,
        a: &M,
        b: &[f64],
        dv: &mut [f64],
        max_iterations: usize,
    ) -> SimResult<SolveStats>
    where
        M: SystemMatrix + ?Sized,
    {
        self.solve_observed(a, b, dv, max_iterations, &mut NoOpSolveObserver)
    }

    /// [`solve`](Self::solve), reporting every iteration to `observer`.
    pub fn solve_observed<M, O>(
        &mut self,
        a: &M,
        b: &[f64],
        dv: &mut [f64],
        max_iterations: usize,
        observer: &mut O,
    ) -> SimResult<SolveStats>
    where
        M: SystemMatrix + ?Sized,
        O: SolveObserver + ?Sized,
    {
        let dof = self.dof();
        check_len("system matrix dimension", dof, a.dim())?;
        check_len("right-hand side length", dof, b.len())?;
        check_len("velocity change length", dof, dv.len())?;

        for i in 0..dof {
            let d = a.diagonal(i);
            self.precond[i] = if d != 0.0 { 1.0 / d } else { INFINITE_COMPLIANCE };
            self.precond_inv[i] = d;
        }

        self.filtered_rhs.copy_from_slice(b);
        self.filter.apply(&mut self.filtered_rhs);
        dv.copy_from_slice(self.filter.target());

        let delta_0 = dot_diag(&self.filtered_rhs, &self.precond, &self.filtered_rhs);

        a.mul_vec(dv, &mut self.tmp);
        sub_into(b, &self.tmp, &mut self.residual);
        self.filter.apply(&mut self.residual);

        mul_diag(&self.precond_inv, &self.residual, &mut self.direction);
        self.filter.apply(&mut self.direction);

        let mut delta_new = dot(&self.residual, &self.direction);
        let threshold = EPSILON * EPSILON * delta_0;

        let mut iterations = 0;
        let mut termination = Termination::IterationLimit;

        while iterations < max_iterations {
            a.mul_vec(&self.direction, &mut self.product);
            self.filter.apply(&mut self.product);

            let curvature = dot(&self.direction, &self.product);
            if is_degenerate(curvature) {
                termination = degenerate_exit(delta_new, threshold);
                break;
            }
            let alpha = delta_new / curvature;

            axpy(alpha, &self.direction, dv);
            axpy(-alpha, &self.product, &mut self.residual);

            mul_diag(&self.precond_inv, &self.residual, &mut self.scaled);

            let delta_old = delta_new;
            delta_new = dot(&self.residual, &self.scaled);
            iterations += 1;
            observer.on_iteration(iterations, delta_new);
            log::trace!("pcg iteration {iterations}: delta_new = {delta_new:e}");

            if is_degenerate(delta_old) {
                termination = degenerate_exit(delta_old, threshold);
                break;
            }
            xpby(&self.scaled, delta_new / delta_old, &mut self.direction);
            self.filter.apply(&mut self.direction);

            if delta_new < threshold {
                termination = Termination::Converged;
                break;
            }
        }

        if termination == Termination::Degenerate {
            log::debug!(
                "pcg stopped on a degenerate denominator after {iterations} iterations \
                 (delta_new = {delta_new:e})"
            );
        }

        a.mul_vec(dv, &mut self.tmp);
        for (t, bi) in self.tmp.iter_mut().zip(b) {
            *t -= bi;
        }

        log::debug!(
            "pcg solve: {iterations}/{max_iterations} iterations, {termination:?}, \
             delta_0 = {delta_0:e}, delta_new = {delta_new:e}"
        );

        Ok(SolveStats {
            iterations,
            termination,
            delta_0,
            delta_new,
        })
    }
}

#[inline]
fn is_degenerate(denominator: f64) -> bool {
    !(denominator.is_finite() && denominator > 0.0)
}

/// A zero denominator with a zero residual measure is an exact solution,
/// not a breakdown.
fn degenerate_exit(delta: f64, threshold: f64) -> Termination {
    if (0.0..=threshold).contains(&delta) {
        Termination::Converged
    } else {
        Termination::Degenerate
    }
}
