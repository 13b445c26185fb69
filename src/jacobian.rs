//! Body-point Jacobians on the kinematic tree.
//!
//! A body's Jacobian at a world point maps generalized velocity to the
//! world-frame linear and angular velocity of the material point: columns
//! are produced by walking the body's ancestor chain and contributing each
//! joint's instantaneous axis. The position pass records each joint's world
//! anchor and axis as it is applied (`xanchor`, `xaxis`, `jnt_xquat`), and
//! the walk reads those, so joints stacked on one body get the correct
//! per-joint frames. Quaternion joints contribute their body-frame basis
//! axes rotated into the world, matching the body-frame angular velocity
//! convention of `qvel`.

use nalgebra::{DMatrix, UnitQuaternion, Vector3};

use crate::types::{Data, MjJointType, Model};

/// Add `sign` times the Jacobian of `point` on `body` into `jacp`/`jacr`.
///
/// `xanchor`/`xaxis`/`jnt_xquat` are the per-joint world frames recorded by
/// [`crate::kinematics::mj_fwd_position`]. Walks from `body` to the root,
/// so cost is proportional to chain depth, not `nv`. Buffers must be
/// `3 × nv`; columns outside the chain are left untouched.
#[allow(clippy::too_many_arguments)]
pub fn accumulate_body_jacobian(
    model: &Model,
    xanchor: &[Vector3<f64>],
    xaxis: &[Vector3<f64>],
    jnt_xquat: &[UnitQuaternion<f64>],
    point: &Vector3<f64>,
    body: usize,
    sign: f64,
    jacp: &mut DMatrix<f64>,
    jacr: &mut DMatrix<f64>,
) {
    let mut add_col = |col: usize, p: Vector3<f64>, r: Vector3<f64>| {
        jacp[(0, col)] += sign * p.x;
        jacp[(1, col)] += sign * p.y;
        jacp[(2, col)] += sign * p.z;
        jacr[(0, col)] += sign * r.x;
        jacr[(1, col)] += sign * r.y;
        jacr[(2, col)] += sign * r.z;
    };

    let mut current = body;
    while current != 0 {
        let jnt_start = model.body_jnt_adr[current];
        let jnt_end = jnt_start + model.body_jnt_num[current];

        for jnt_id in jnt_start..jnt_end {
            let dof = model.jnt_dof_adr[jnt_id];

            match model.jnt_type[jnt_id] {
                MjJointType::Hinge => {
                    let axis = xaxis[jnt_id];
                    add_col(dof, axis.cross(&(point - xanchor[jnt_id])), axis);
                }
                MjJointType::Slide => {
                    add_col(dof, xaxis[jnt_id], Vector3::zeros());
                }
                MjJointType::Ball => {
                    let anchor = xanchor[jnt_id];
                    for i in 0..3 {
                        let mut e = Vector3::zeros();
                        e[i] = 1.0;
                        let axis = jnt_xquat[jnt_id] * e;
                        add_col(dof + i, axis.cross(&(point - anchor)), axis);
                    }
                }
                MjJointType::Free => {
                    // Translation: world-frame unit directions.
                    for i in 0..3 {
                        let mut e = Vector3::zeros();
                        e[i] = 1.0;
                        add_col(dof + i, e, Vector3::zeros());
                    }
                    // Rotation about the free frame origin, body-frame axes.
                    let anchor = xanchor[jnt_id];
                    for i in 0..3 {
                        let mut e = Vector3::zeros();
                        e[i] = 1.0;
                        let axis = jnt_xquat[jnt_id] * e;
                        add_col(dof + 3 + i, axis.cross(&(point - anchor)), axis);
                    }
                }
            }
        }

        current = model.body_parent[current];
    }
}

/// Compute the Jacobian of `point` on `body` into preallocated buffers.
///
/// Zeroes `jacp`/`jacr` first; after the call, column `i` of `jacp` (resp.
/// `jacr`) is the world-frame linear (resp. angular) velocity of the point
/// per unit `qvel[i]`.
pub fn mj_jac_into(
    model: &Model,
    data: &Data,
    point: &Vector3<f64>,
    body: usize,
    jacp: &mut DMatrix<f64>,
    jacr: &mut DMatrix<f64>,
) {
    jacp.fill(0.0);
    jacr.fill(0.0);
    accumulate_body_jacobian(
        model,
        &data.xanchor,
        &data.xaxis,
        &data.jnt_xquat,
        point,
        body,
        1.0,
        jacp,
        jacr,
    );
}

/// Difference Jacobian of a body pair: `jac(body2, point2) - jac(body1,
/// point1)`, written into preallocated buffers.
///
/// This is the row shape shared by two-body constraints: its product with
/// `qvel` is the relative velocity of the two attachment points. Takes the
/// recorded per-joint frames directly so it can run on split borrows of
/// [`Data`] inside the assembler.
#[allow(clippy::too_many_arguments)]
pub fn jac_dif_pair_into(
    model: &Model,
    xanchor: &[Vector3<f64>],
    xaxis: &[Vector3<f64>],
    jnt_xquat: &[UnitQuaternion<f64>],
    point1: &Vector3<f64>,
    point2: &Vector3<f64>,
    body1: usize,
    body2: usize,
    jacp: &mut DMatrix<f64>,
    jacr: &mut DMatrix<f64>,
) {
    jacp.fill(0.0);
    jacr.fill(0.0);
    accumulate_body_jacobian(
        model, xanchor, xaxis, jnt_xquat, point1, body1, -1.0, jacp, jacr,
    );
    accumulate_body_jacobian(
        model, xanchor, xaxis, jnt_xquat, point2, body2, 1.0, jacp, jacr,
    );
}

/// Allocating convenience wrapper around [`mj_jac_into`].
#[must_use]
pub fn mj_jac(
    model: &Model,
    data: &Data,
    point: &Vector3<f64>,
    body: usize,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let mut jacp = DMatrix::zeros(3, model.nv);
    let mut jacr = DMatrix::zeros(3, model.nv);
    mj_jac_into(model, data, point, body, &mut jacp, &mut jacr);
    (jacp, jacr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{mj_fwd_position, mj_integrate_pos};
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    /// Forward-difference check: perturbing one DOF moves the body origin by
    /// `jacp` column times the step, and rotates the body frame by the
    /// `jacr` column.
    fn check_jacobian_fd(model: &Model, qpos: &DVector<f64>, body: usize) {
        let eps = 1e-6;
        let mut data = model.make_data();
        data.qpos.copy_from(qpos);
        mj_fwd_position(model, &mut data);

        let point = data.xpos[body];
        let (jacp, jacr) = mj_jac(model, &data, &point, body);

        for dof in 0..model.nv {
            let mut qvel = DVector::zeros(model.nv);
            qvel[dof] = 1.0;
            let mut qpos_pert = qpos.clone();
            mj_integrate_pos(model, &mut qpos_pert, &qvel, eps);

            let mut data_pert = model.make_data();
            data_pert.qpos.copy_from(&qpos_pert);
            mj_fwd_position(model, &mut data_pert);

            let fd_lin = (data_pert.xpos[body] - point) / eps;
            // dq ⊗ q⁻¹ ≈ exp(ω·ε/2): the scaled axis is the angular step.
            let fd_ang =
                (data_pert.xquat[body] * data.xquat[body].inverse()).scaled_axis() / eps;
            for i in 0..3 {
                assert_relative_eq!(jacp[(i, dof)], fd_lin[i], epsilon = 1e-5);
                assert_relative_eq!(jacr[(i, dof)], fd_ang[i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn pendulum_tip_jacobian_matches_finite_difference() {
        let model = Model::n_link_pendulum(3, 0.7);
        let mut qpos = DVector::zeros(model.nq);
        qpos[0] = 0.3;
        qpos[1] = -0.5;
        qpos[2] = 1.1;
        check_jacobian_fd(&model, &qpos, 3);
    }

    #[test]
    fn stacked_joint_jacobians_match_finite_difference() {
        let model = Model::ball_hinge_pair();
        let mut qpos = model.qpos0.clone();
        qpos.copy_from_slice(&[0.5, 0.5, 0.5, 0.5, 0.7, 0.8, 0.9]);
        check_jacobian_fd(&model, &qpos, 1);
        check_jacobian_fd(&model, &qpos, 2);
    }

    /// The pair difference times a DOF step predicts the change in the
    /// separation of two material points on different bodies.
    #[test]
    fn pair_difference_predicts_relative_point_motion() {
        let eps = 1e-6;
        let model = Model::ball_hinge_pair();
        let mut data = model.make_data();
        data.qpos.copy_from_slice(&[0.5, 0.5, 0.5, 0.5, 0.7, 0.8, 0.9]);
        mj_fwd_position(&model, &mut data);

        // Material points: local offsets fixed in each body frame.
        let local1 = Vector3::new(0.1, -0.2, 0.3);
        let local2 = Vector3::new(-0.05, 0.0, 0.15);
        let point1 = data.xpos[1] + data.xquat[1] * local1;
        let point2 = data.xpos[2] + data.xquat[2] * local2;

        let mut jacp = DMatrix::zeros(3, model.nv);
        let mut jacr = DMatrix::zeros(3, model.nv);
        jac_dif_pair_into(
            &model,
            &data.xanchor,
            &data.xaxis,
            &data.jnt_xquat,
            &point1,
            &point2,
            1,
            2,
            &mut jacp,
            &mut jacr,
        );

        for dof in 0..model.nv {
            let mut qvel = DVector::zeros(model.nv);
            qvel[dof] = 1.0;
            let mut qpos_pert = data.qpos.clone();
            mj_integrate_pos(&model, &mut qpos_pert, &qvel, eps);

            let mut data_pert = model.make_data();
            data_pert.qpos.copy_from(&qpos_pert);
            mj_fwd_position(&model, &mut data_pert);

            let point1_pert = data_pert.xpos[1] + data_pert.xquat[1] * local1;
            let point2_pert = data_pert.xpos[2] + data_pert.xquat[2] * local2;
            let fd = ((point2_pert - point1_pert) - (point2 - point1)) / eps;
            for i in 0..3 {
                assert_relative_eq!(jacp[(i, dof)], fd[i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn free_body_translation_columns_are_identity() {
        let model = Model::free_body();
        let mut data = model.make_data();
        mj_fwd_position(&model, &mut data);

        let (jacp, jacr) = mj_jac(&model, &data, &Vector3::zeros(), 1);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(jacp[(i, j)], expected, epsilon = 1e-12);
                assert_relative_eq!(jacr[(i, j + 3)], expected, epsilon = 1e-12);
                assert_relative_eq!(jacr[(i, j)], 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn world_body_jacobian_is_zero() {
        let model = Model::n_link_pendulum(2, 1.0);
        let mut data = model.make_data();
        mj_fwd_position(&model, &mut data);
        let (jacp, jacr) = mj_jac(&model, &data, &Vector3::new(1.0, 2.0, 3.0), 0);
        assert_eq!(jacp.iter().map(|v| v.abs()).fold(0.0, f64::max), 0.0);
        assert_eq!(jacr.iter().map(|v| v.abs()).fold(0.0, f64::max), 0.0);
    }
}
