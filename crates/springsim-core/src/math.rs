//! Flat 2n-vector helpers shared by the solver and the integrators.
//!
//! Per-particle quantities are stored as `[DVec2]`; the linear system sees
//! the same memory as an interleaved `[f64]` (even = x, odd = y).

use glam::DVec2;

/// View a slice of 2D vectors as its interleaved scalar components.
#[inline]
pub fn as_flat(v: &[DVec2]) -> &[f64] {
    bytemuck::cast_slice(v)
}

/// Mutable counterpart of [`as_flat`].
#[inline]
pub fn as_flat_mut(v: &mut [DVec2]) -> &mut [f64] {
    bytemuck::cast_slice_mut(v)
}

/// `aᵀ b`
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `aᵀ D b` for a diagonal `D` stored as its entries.
#[inline]
pub fn dot_diag(a: &[f64], d: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(d)
        .zip(b)
        .map(|((x, w), y)| x * w * y)
        .sum()
}

/// `out = D x`
#[inline]
pub fn mul_diag(d: &[f64], x: &[f64], out: &mut [f64]) {
    for ((o, w), v) in out.iter_mut().zip(d).zip(x) {
        *o = w * v;
    }
}

/// `y += alpha * x`
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// `y = x + beta * y`
#[inline]
pub fn xpby(x: &[f64], beta: f64, y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi = xi + beta * *yi;
    }
}

/// `out = a - b`
#[inline]
pub fn sub_into(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x - y;
    }
}

/// Outer product `a bᵀ`.
#[inline]
pub fn outer(a: DVec2, b: DVec2) -> glam::DMat2 {
    glam::DMat2::from_cols(a * b.x, a * b.y)
}
