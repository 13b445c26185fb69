//! Contact representation consumed from upstream detection.
//!
//! Contacts arrive as already-detected pairs with a normal/tangent frame;
//! the assembler only turns them into constraint rows. The struct keeps the
//! fields the assembly and the downstream solver need, indexed by body ids.

use nalgebra::Vector3;

/// A detected contact point, ready for constraint row generation.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Contact position in world frame.
    pub pos: Vector3<f64>,
    /// Contact normal (from body1 toward body2, unit vector).
    pub normal: Vector3<f64>,
    /// Tangent vectors orthogonal to the normal: `frame[0]` = t1,
    /// `frame[1]` = t2 (right-handed with the normal).
    pub frame: [Vector3<f64>; 2],
    /// Signed distance along the normal: negative when penetrating.
    pub dist: f64,
    /// First body id.
    pub body1: usize,
    /// Second body id.
    pub body2: usize,
    /// Row count: 1 (frictionless), 3 (+sliding), 4 (+torsional),
    /// 6 (+rolling).
    pub dim: usize,
    /// Friction coefficients `[sliding1, sliding2, torsional, roll1, roll2]`.
    pub mu: [f64; 5],
    /// Distance threshold for constraint force onset; the row is generated
    /// by upstream detection while `dist < includemargin`.
    pub includemargin: f64,
}

impl Contact {
    /// Create a contact with an automatically computed tangent frame.
    ///
    /// # Numerical safety
    /// Negative or non-finite friction is clamped to 0.0; non-finite
    /// distance becomes 0.0. Invalid `dim` values round up to the nearest
    /// valid row count.
    #[must_use]
    pub fn new(
        pos: Vector3<f64>,
        normal: Vector3<f64>,
        dist: f64,
        body1: usize,
        body2: usize,
        friction: f64,
        dim: usize,
    ) -> Self {
        let friction = if friction.is_finite() && friction > 0.0 {
            friction
        } else {
            0.0
        };
        let dist = if dist.is_finite() { dist } else { 0.0 };
        let (t1, t2) = compute_tangent_frame(&normal);
        let dim = match dim {
            0..=2 => {
                if friction > 0.0 {
                    3
                } else {
                    1
                }
            }
            3 => 3,
            4 => 4,
            _ => 6,
        };

        Self {
            pos,
            normal,
            frame: [t1, t2],
            dist,
            body1,
            body2,
            dim,
            mu: [
                friction,
                friction,
                friction * 0.005,
                friction * 0.001,
                friction * 0.001,
            ],
            includemargin: 0.0,
        }
    }
}

/// Compute an orthonormal tangent frame from a contact normal.
///
/// Returns (t1, t2) where t1, t2, normal form a right-handed orthonormal
/// basis. Degenerate normals (zero/NaN) fall back to the world XY frame.
#[inline]
#[must_use]
pub fn compute_tangent_frame(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let normal_len = normal.norm();
    if !normal_len.is_finite() || normal_len < 1e-10 {
        return (Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
    }
    let n = normal / normal_len;

    let reference = if n.x.abs() < 0.9 {
        Vector3::new(1.0, 0.0, 0.0)
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    };

    let t1 = reference - n * n.dot(&reference);
    let t1_norm = t1.norm();
    let t1 = if t1_norm > 1e-10 {
        t1 / t1_norm
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    };

    let t2 = n.cross(&t1);
    (t1, t2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tangent_frame_is_orthonormal() {
        for normal in [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.3, -0.4, 0.5),
        ] {
            let (t1, t2) = compute_tangent_frame(&normal);
            let n = normal.normalize();
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t2.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t1.cross(&t2).dot(&n), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn frictionless_contact_is_one_dimensional() {
        let c = Contact::new(
            Vector3::zeros(),
            Vector3::z(),
            -0.01,
            0,
            1,
            0.0,
            0,
        );
        assert_eq!(c.dim, 1);
        assert_eq!(c.mu[0], 0.0);
    }
}
