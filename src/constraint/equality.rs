//! Residual and Jacobian math for equality constraints.
//!
//! Connect and weld residuals are differences of attachment-point positions
//! (and, for weld, a quaternion orientation error); joint equalities couple
//! two scalar joints through a quartic polynomial. The assembler in
//! [`super`] turns these into rows.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Orientation error between two body frames under a target relative
/// rotation: `imag(neg(q2) ⊗ q1 ⊗ relq)`.
///
/// Zero exactly when `q1 ⊗ relq == q2` (body1, rotated by the target
/// offset, coincides with body2). The caller resolves the quaternion
/// double cover; the antipode of either input negates the residual.
#[must_use]
pub fn rotation_residual(
    q1: &UnitQuaternion<f64>,
    q2: &UnitQuaternion<f64>,
    relq: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    let q = q2.conjugate() * q1 * relq;
    q.quaternion().imag()
}

/// Derivative of [`rotation_residual`] along one generalized velocity
/// direction.
///
/// `omega` is the corresponding column of the angular difference Jacobian
/// `jacr1 - jacr2` (world frame); `q1_eff` is `q1 ⊗ relq` precomputed by
/// the caller. Returns `0.5 · imag(neg(q2) ⊗ ω̃ ⊗ q1_eff)`, the exact
/// directional derivative of the residual.
#[must_use]
pub fn rotation_jacobian_column(
    q1_eff: &UnitQuaternion<f64>,
    q2: &UnitQuaternion<f64>,
    omega: &Vector3<f64>,
) -> Vector3<f64> {
    let w = Quaternion::from_imag(*omega);
    let q = q2.conjugate().into_inner() * w * q1_eff.into_inner();
    0.5 * q.imag()
}

/// Evaluate the quartic coupling polynomial `c0 + c1·x + ... + c4·x⁴`.
#[inline]
#[must_use]
pub fn eval_poly(c: &[f64; 5], x: f64) -> f64 {
    // Horner form.
    (((c[4] * x + c[3]) * x + c[2]) * x + c[1]) * x + c[0]
}

/// Evaluate the derivative of the quartic coupling polynomial.
#[inline]
#[must_use]
pub fn eval_poly_deriv(c: &[f64; 5], x: f64) -> f64 {
    ((4.0 * c[4] * x + 3.0 * c[3]) * x + 2.0 * c[2]) * x + c[1]
}
