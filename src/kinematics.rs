//! Minimal kinematic passes feeding the assembler.
//!
//! Full forward dynamics lives upstream; the assembler only needs body
//! poses, tendon lengths/Jacobians, and an SO(3)-aware position integrator
//! (used by the finite-difference verification to perturb `qpos` along a
//! DOF). These are trimmed versions of the engine's position stage.

use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3};

use crate::types::{Data, MjJointType, Model};

/// Forward kinematics: compute world-frame body poses from `qpos`.
///
/// Traverses the kinematic tree root to leaves (bodies are stored in
/// topological order: parent before child). Each joint's world anchor and
/// axis are recorded as the joint is applied (`xanchor`, `xaxis`,
/// `jnt_xquat`): the instantaneous motion of a joint depends on the frame
/// state before later joints on the same body, so the Jacobian cannot
/// recover these from the final body pose alone.
pub fn mj_fwd_position(model: &Model, data: &mut Data) {
    // Body 0 (world) is always at the origin.
    data.xpos[0] = Vector3::zeros();
    data.xquat[0] = UnitQuaternion::identity();

    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];
        let mut pos = data.xpos[parent_id];
        let mut quat = data.xquat[parent_id];

        // Apply body offset in the parent frame.
        pos += quat * model.body_pos[body_id];
        quat *= model.body_quat[body_id];

        // Apply each joint carried by this body.
        let jnt_start = model.body_jnt_adr[body_id];
        let jnt_end = jnt_start + model.body_jnt_num[body_id];

        for jnt_id in jnt_start..jnt_end {
            let qpos_adr = model.jnt_qpos_adr[jnt_id];
            // Anchor and axis in the frame the joint acts on; a joint's own
            // rotation leaves both fixed.
            let mut anchor = pos + quat * model.jnt_pos[jnt_id];
            let mut axis = quat * model.jnt_axis[jnt_id];

            match model.jnt_type[jnt_id] {
                MjJointType::Hinge => {
                    let angle = data.qpos[qpos_adr];
                    let rot = if let Some(unit_axis) = nalgebra::Unit::try_new(axis, 1e-10) {
                        UnitQuaternion::from_axis_angle(&unit_axis, angle)
                    } else {
                        UnitQuaternion::identity()
                    };
                    quat = rot * quat;
                    // Rotate the body frame around the joint anchor.
                    pos = anchor + rot * (pos - anchor);
                }
                MjJointType::Slide => {
                    pos += axis * data.qpos[qpos_adr];
                }
                MjJointType::Ball => {
                    // qpos stores quaternion [w, x, y, z], a rotation in the
                    // joint-local frame about the anchor.
                    let q = UnitQuaternion::from_quaternion(Quaternion::new(
                        data.qpos[qpos_adr],
                        data.qpos[qpos_adr + 1],
                        data.qpos[qpos_adr + 2],
                        data.qpos[qpos_adr + 3],
                    ));
                    let quat_new = quat * q;
                    let rot = quat_new * quat.inverse();
                    pos = anchor + rot * (pos - anchor);
                    quat = quat_new;
                }
                MjJointType::Free => {
                    // qpos stores [x, y, z, qw, qx, qy, qz], the frame pose
                    // directly in world coordinates.
                    pos = Vector3::new(
                        data.qpos[qpos_adr],
                        data.qpos[qpos_adr + 1],
                        data.qpos[qpos_adr + 2],
                    );
                    quat = UnitQuaternion::from_quaternion(Quaternion::new(
                        data.qpos[qpos_adr + 3],
                        data.qpos[qpos_adr + 4],
                        data.qpos[qpos_adr + 5],
                        data.qpos[qpos_adr + 6],
                    ));
                    anchor = pos;
                    axis = quat * model.jnt_axis[jnt_id];
                }
            }

            data.xanchor[jnt_id] = anchor;
            data.xaxis[jnt_id] = axis;
            data.jnt_xquat[jnt_id] = quat;
        }

        data.xpos[body_id] = pos;
        data.xquat[body_id] = quat;
    }
}

/// Fixed-tendon pass: lengths, velocities, and constant Jacobian rows.
///
/// A fixed tendon is a linear combination of scalar joint positions:
/// `L_t = Σ_w coef_w · qpos[jnt_w]`, so its Jacobian is the coefficient
/// pattern and its velocity is `J · qvel`.
pub fn mj_fwd_tendon(model: &Model, data: &mut Data) {
    for t in 0..model.ntendon {
        let adr = model.tendon_adr[t];
        let num = model.tendon_num[t];

        data.ten_J[t].fill(0.0);

        let mut length = 0.0;
        let mut velocity = 0.0;
        for w in adr..(adr + num) {
            let jnt_id = model.wrap_objid[w];
            let coef = model.wrap_prm[w];
            debug_assert!(
                matches!(
                    model.jnt_type[jnt_id],
                    MjJointType::Hinge | MjJointType::Slide
                ),
                "fixed tendons couple scalar joints only"
            );

            length += coef * data.qpos[model.jnt_qpos_adr[jnt_id]];
            let dof = model.jnt_dof_adr[jnt_id];
            data.ten_J[t][dof] += coef;
            velocity += coef * data.qvel[dof];
        }

        data.ten_length[t] = length;
        data.ten_velocity[t] = velocity;
    }
}

/// Integrate a position by a velocity: `qpos ← qpos ⊕ qvel · dt`.
///
/// Quaternion coordinates (ball/free joints) integrate on SO(3) by
/// right-multiplying the axis-angle exponential of the body-frame angular
/// velocity, matching the convention of the Jacobian columns.
pub fn mj_integrate_pos(model: &Model, qpos: &mut DVector<f64>, qvel: &DVector<f64>, dt: f64) {
    for jnt_id in 0..model.njnt {
        let qpos_adr = model.jnt_qpos_adr[jnt_id];
        let dof_adr = model.jnt_dof_adr[jnt_id];

        match model.jnt_type[jnt_id] {
            MjJointType::Hinge | MjJointType::Slide => {
                qpos[qpos_adr] += qvel[dof_adr] * dt;
            }
            MjJointType::Ball => {
                integrate_quat(qpos, qpos_adr, qvel, dof_adr, dt);
            }
            MjJointType::Free => {
                qpos[qpos_adr] += qvel[dof_adr] * dt;
                qpos[qpos_adr + 1] += qvel[dof_adr + 1] * dt;
                qpos[qpos_adr + 2] += qvel[dof_adr + 2] * dt;
                integrate_quat(qpos, qpos_adr + 3, qvel, dof_adr + 3, dt);
            }
        }
    }
}

/// Right-multiply the quaternion at `qpos[adr..adr+4]` by the exponential
/// of the angular velocity at `qvel[dof..dof+3]`.
fn integrate_quat(
    qpos: &mut DVector<f64>,
    adr: usize,
    qvel: &DVector<f64>,
    dof: usize,
    dt: f64,
) {
    let omega = Vector3::new(qvel[dof], qvel[dof + 1], qvel[dof + 2]);
    let angle = omega.norm() * dt;

    let q_old = UnitQuaternion::from_quaternion(Quaternion::new(
        qpos[adr],
        qpos[adr + 1],
        qpos[adr + 2],
        qpos[adr + 3],
    ));

    let q_new = if angle > 1e-10 {
        let dq = UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(omega), angle);
        q_old * dq
    } else {
        q_old
    };

    qpos[adr] = q_new.w;
    qpos[adr + 1] = q_new.i;
    qpos[adr + 2] = q_new.j;
    qpos[adr + 3] = q_new.k;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn pendulum_fk_rotates_body_frame() {
        let model = Model::n_link_pendulum(1, 1.0);
        let mut data = model.make_data();

        // Hanging straight down.
        mj_fwd_position(&model, &mut data);
        assert_relative_eq!(data.xpos[1].z, -1.0, epsilon = 1e-12);

        // 90° about +Y swings the body frame to +X.
        data.qpos[0] = FRAC_PI_2;
        mj_fwd_position(&model, &mut data);
        assert_relative_eq!(data.xpos[1].x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(data.xpos[1].z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn fixed_tendon_length_and_jacobian() {
        let model = Model::two_hinge_tendon(1.0, -2.0, false, 0.0, 0.0);
        let mut data = model.make_data();
        data.qpos[0] = 0.3;
        data.qpos[1] = 0.1;
        data.qvel[0] = 1.0;
        data.qvel[1] = 0.5;

        mj_fwd_tendon(&model, &mut data);

        assert_relative_eq!(data.ten_length[0], 0.3 - 0.2, epsilon = 1e-12);
        assert_relative_eq!(data.ten_velocity[0], 1.0 - 1.0, epsilon = 1e-12);
        assert_eq!(data.ten_J[0][0], 1.0);
        assert_eq!(data.ten_J[0][1], -2.0);
        assert_eq!(model.tendon_chain[0], vec![0, 1]);
    }

    #[test]
    fn quaternion_integration_stays_unit() {
        let model = Model::ball_hinge_pair();
        let mut qpos = model.qpos0.clone();
        let mut qvel = DVector::zeros(model.nv);
        qvel[1] = 2.0;
        mj_integrate_pos(&model, &mut qpos, &qvel, 0.1);

        let norm =
            (qpos[0] * qpos[0] + qpos[1] * qpos[1] + qpos[2] * qpos[2] + qpos[3] * qpos[3]).sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
    }
}
