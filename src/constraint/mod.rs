//! Unified constraint row assembly.
//!
//! Gathers every active constraint into one row system: the Jacobian
//! `efc_J` plus parallel per-row metadata (`efc_type`, `efc_pos`, ...),
//! ready for a constraint solver. Row order is deterministic for a given
//! model and state:
//!
//! 1. equality constraints, ascending id (skipping inactive),
//! 2. DOF friction loss, ascending DOF,
//! 3. tendon friction loss, ascending tendon,
//! 4. joint limits, ascending joint, lower before upper,
//! 5. tendon limits, ascending tendon, lower before upper,
//! 6. contacts, detection order, rows normal / tangents / torsional /
//!    rolling.
//!
//! Assembly is two-phase: rows and non-zeros are counted first and checked
//! against the model's preallocated capacities, then populated into the
//! buffers on [`Data`]. The populate phase performs no allocation.
//!
//! [`crate::kinematics::mj_fwd_position`] and
//! [`crate::kinematics::mj_fwd_tendon`] must have run on the current
//! `qpos` before assembly.

pub mod equality;

use nalgebra::{DMatrix, DVector, Quaternion, UnitQuaternion, Vector3};

use crate::jacobian::jac_dif_pair_into;
use crate::sparse::{combine_sparse, combine_sparse_count};
use crate::types::{
    AssemblyError, ConstraintType, Data, EqualityType, JacobianMode, MjJointType, Model,
};

use equality::{eval_poly, eval_poly_deriv, rotation_jacobian_column, rotation_residual};

/// Per-row metadata handed to the row writer.
struct Row {
    ctype: ConstraintType,
    id: usize,
    dim: usize,
    pos: f64,
    margin: f64,
    frictionloss: f64,
    mu: [f64; 5],
}

impl Row {
    fn new(ctype: ConstraintType, id: usize) -> Self {
        Self {
            ctype,
            id,
            dim: 1,
            pos: 0.0,
            margin: 0.0,
            frictionloss: 0.0,
            mu: [0.0; 5],
        }
    }
}

/// Writes rows into the dense or sparse Jacobian storage plus the parallel
/// metadata vectors, tracking the running non-zero count.
struct RowWriter<'a> {
    mode: JacobianMode,
    qvel: &'a DVector<f64>,
    nnz: usize,
    efc_type: &'a mut Vec<ConstraintType>,
    efc_id: &'a mut Vec<usize>,
    efc_dim: &'a mut Vec<usize>,
    efc_pos: &'a mut Vec<f64>,
    efc_margin: &'a mut Vec<f64>,
    efc_vel: &'a mut Vec<f64>,
    efc_frictionloss: &'a mut Vec<f64>,
    efc_mu: &'a mut Vec<[f64; 5]>,
    efc_J: &'a mut DMatrix<f64>,
    efc_J_rownnz: &'a mut [usize],
    efc_J_rowadr: &'a mut [usize],
    efc_J_colind: &'a mut [usize],
    efc_J_data: &'a mut [f64],
}

impl RowWriter<'_> {
    /// Append one row. `values` is aligned with `chain` (the row's sparse
    /// support); both may be empty for rows with no movable DOFs.
    fn push(&mut self, chain: &[usize], values: &[f64], row: Row) {
        debug_assert_eq!(chain.len(), values.len());
        let r = self.efc_type.len();

        let mut vel = 0.0;
        for (k, &col) in chain.iter().enumerate() {
            vel += values[k] * self.qvel[col];
        }

        match self.mode {
            JacobianMode::Dense => {
                // The dense arena is reused across assemblies, so stale row
                // contents must be cleared before scattering.
                self.efc_J.row_mut(r).fill(0.0);
                for (k, &col) in chain.iter().enumerate() {
                    self.efc_J[(r, col)] = values[k];
                }
            }
            JacobianMode::Sparse => {
                self.efc_J_rowadr[r] = self.nnz;
                self.efc_J_rownnz[r] = chain.len();
                for (k, &col) in chain.iter().enumerate() {
                    self.efc_J_colind[self.nnz + k] = col;
                    self.efc_J_data[self.nnz + k] = values[k];
                }
                self.nnz += chain.len();
            }
        }

        self.efc_type.push(row.ctype);
        self.efc_id.push(row.id);
        self.efc_dim.push(row.dim);
        self.efc_pos.push(row.pos);
        self.efc_margin.push(row.margin);
        self.efc_vel.push(vel);
        self.efc_frictionloss.push(row.frictionloss);
        self.efc_mu.push(row.mu);
    }
}

/// Count phase: exact row and non-zero totals for the current state.
///
/// Evaluates the same activation conditions as the populate phase (limit
/// distances against margins, equality active flags) so the two phases
/// agree row for row.
fn count_rows(model: &Model, data: &Data) -> (usize, usize) {
    let mut nefc = 0usize;
    let mut nnz = 0usize;

    for eq_id in 0..model.neq {
        if !model.eq_active[eq_id] {
            continue;
        }
        match model.eq_type[eq_id] {
            EqualityType::Connect | EqualityType::Weld => {
                let width = combine_sparse_count(
                    &model.body_chain[model.eq_obj1id[eq_id]],
                    &model.body_chain[model.eq_obj2id[eq_id]],
                );
                let nrow = model.eq_type[eq_id].nrow();
                nefc += nrow;
                nnz += nrow * width;
            }
            EqualityType::Joint => {
                let j1 = model.eq_obj1id[eq_id];
                let j2 = model.eq_obj2id[eq_id];
                nefc += 1;
                nnz += if j2 < model.njnt && model.jnt_dof_adr[j2] != model.jnt_dof_adr[j1] {
                    2
                } else {
                    1
                };
            }
        }
    }

    for dof in 0..model.nv {
        if model.dof_frictionloss[dof] > 0.0 {
            nefc += 1;
            nnz += 1;
        }
    }
    for t in 0..model.ntendon {
        if model.tendon_frictionloss[t] > 0.0 {
            nefc += 1;
            nnz += model.tendon_chain[t].len();
        }
    }

    for jnt_id in 0..model.njnt {
        if !model.jnt_limited[jnt_id]
            || !matches!(
                model.jnt_type[jnt_id],
                MjJointType::Hinge | MjJointType::Slide
            )
        {
            continue;
        }
        let q = data.qpos[model.jnt_qpos_adr[jnt_id]];
        let (lower, upper) = model.jnt_range[jnt_id];
        let margin = model.jnt_margin[jnt_id];
        if q - lower < margin {
            nefc += 1;
            nnz += 1;
        }
        if upper - q < margin {
            nefc += 1;
            nnz += 1;
        }
    }
    for t in 0..model.ntendon {
        if !model.tendon_limited[t] {
            continue;
        }
        let length = data.ten_length[t];
        let (lower, upper) = model.tendon_range[t];
        let margin = model.tendon_margin[t];
        if length - lower < margin {
            nefc += 1;
            nnz += model.tendon_chain[t].len();
        }
        if upper - length < margin {
            nefc += 1;
            nnz += model.tendon_chain[t].len();
        }
    }

    for contact in &data.contacts {
        let width = combine_sparse_count(
            &model.body_chain[contact.body1],
            &model.body_chain[contact.body2],
        );
        nefc += contact.dim;
        nnz += contact.dim * width;
    }

    (nefc, nnz)
}

/// Assemble all active constraints into the `efc_*` buffers on `data`.
///
/// Requires current kinematics: run [`crate::kinematics::mj_fwd_position`]
/// and [`crate::kinematics::mj_fwd_tendon`] first, and push detected
/// contacts into `data.contacts`. On success, rows `0..data.nefc` of the
/// constraint system are valid; on error the constraint outputs are left
/// empty and the step must be aborted.
///
/// # Errors
/// Returns an [`AssemblyError`] when the active constraints exceed the
/// model's preallocated capacities or a contact violates the declared
/// `condim_max`.
#[allow(clippy::too_many_lines)]
pub fn assemble_constraints(model: &Model, data: &mut Data) -> Result<(), AssemblyError> {
    if data.contacts.len() > model.nconmax {
        return Err(AssemblyError::ContactCapacityExceeded {
            ncon: data.contacts.len(),
            nconmax: model.nconmax,
        });
    }
    for contact in &data.contacts {
        if contact.dim > model.condim_max {
            return Err(AssemblyError::ContactDimExceeded {
                dim: contact.dim,
                condim_max: model.condim_max,
            });
        }
    }

    data.reset_constraints();

    let (expected_rows, expected_nnz) = count_rows(model, data);
    if expected_rows > model.njmax {
        return Err(AssemblyError::RowCapacityExceeded {
            nefc: expected_rows,
            njmax: model.njmax,
        });
    }
    if model.jacobian == JacobianMode::Sparse && expected_nnz > model.nnzmax {
        return Err(AssemblyError::NnzCapacityExceeded {
            nnz: expected_nnz,
            nnzmax: model.nnzmax,
        });
    }

    let Data {
        qpos,
        qvel,
        xpos,
        xquat,
        xanchor,
        xaxis,
        jnt_xquat,
        ten_length,
        ten_J,
        contacts,
        nefc: nefc_out,
        efc_type,
        efc_id,
        efc_dim,
        efc_pos,
        efc_margin,
        efc_vel,
        efc_frictionloss,
        efc_mu,
        efc_J,
        nnz: nnz_out,
        efc_J_rownnz,
        efc_J_rowadr,
        efc_J_colind,
        efc_J_data,
        row_scratch,
        jacp_scratch,
        jacr_scratch,
        chain_scratch,
        chain_pos1,
        chain_pos2,
        ..
    } = data;

    let mut writer = RowWriter {
        mode: model.jacobian,
        qvel,
        nnz: 0,
        efc_type,
        efc_id,
        efc_dim,
        efc_pos,
        efc_margin,
        efc_vel,
        efc_frictionloss,
        efc_mu,
        efc_J,
        efc_J_rownnz,
        efc_J_rowadr,
        efc_J_colind,
        efc_J_data,
    };

    // ── 1. Equality constraints ──
    for eq_id in 0..model.neq {
        if !model.eq_active[eq_id] {
            continue;
        }
        let params = &model.eq_data[eq_id];

        match model.eq_type[eq_id] {
            EqualityType::Connect | EqualityType::Weld => {
                let body1 = model.eq_obj1id[eq_id];
                let body2 = model.eq_obj2id[eq_id];
                let anchor = Vector3::new(params[0], params[1], params[2]);
                let pos1 = xpos[body1] + xquat[body1] * anchor;
                let pos2 = xpos[body2];

                // Residual is pos1 - pos2, so the row is jac1 - jac2: the
                // pair difference with body2 as the subtracted side.
                jac_dif_pair_into(
                    model,
                    xanchor,
                    xaxis,
                    jnt_xquat,
                    &pos2,
                    &pos1,
                    body2,
                    body1,
                    jacp_scratch,
                    jacr_scratch,
                );

                let width = combine_sparse(
                    &model.body_chain[body1],
                    &model.body_chain[body2],
                    chain_scratch,
                    chain_pos1,
                    chain_pos2,
                );
                let chain = &chain_scratch[..width];
                let res = pos1 - pos2;

                for axis in 0..3 {
                    for (k, &col) in chain.iter().enumerate() {
                        row_scratch[k] = jacp_scratch[(axis, col)];
                    }
                    writer.push(
                        chain,
                        &row_scratch.as_slice()[..width],
                        Row {
                            pos: res[axis],
                            ..Row::new(ConstraintType::Equality, eq_id)
                        },
                    );
                }

                if model.eq_type[eq_id] == EqualityType::Weld {
                    let relq = UnitQuaternion::from_quaternion(Quaternion::new(
                        params[3], params[4], params[5], params[6],
                    ));
                    let q1_eff = xquat[body1] * relq;
                    let rot_res = rotation_residual(&xquat[body1], &xquat[body2], &relq);

                    // Rewrite the angular difference columns as residual
                    // derivatives; jacp_scratch is free now and holds them.
                    for &col in chain {
                        let omega = Vector3::new(
                            jacr_scratch[(0, col)],
                            jacr_scratch[(1, col)],
                            jacr_scratch[(2, col)],
                        );
                        let deriv = rotation_jacobian_column(&q1_eff, &xquat[body2], &omega);
                        jacp_scratch[(0, col)] = deriv.x;
                        jacp_scratch[(1, col)] = deriv.y;
                        jacp_scratch[(2, col)] = deriv.z;
                    }

                    for axis in 0..3 {
                        for (k, &col) in chain.iter().enumerate() {
                            row_scratch[k] = jacp_scratch[(axis, col)];
                        }
                        writer.push(
                            chain,
                            &row_scratch.as_slice()[..width],
                            Row {
                                pos: rot_res[axis],
                                ..Row::new(ConstraintType::Equality, eq_id)
                            },
                        );
                    }
                }
            }
            EqualityType::Joint => {
                let j1 = model.eq_obj1id[eq_id];
                let j2 = model.eq_obj2id[eq_id];
                let coef = [params[0], params[1], params[2], params[3], params[4]];
                let adr1 = model.jnt_qpos_adr[j1];
                let dof1 = model.jnt_dof_adr[j1];
                let dev1 = qpos[adr1] - model.qpos0[adr1];

                if j2 < model.njnt {
                    let adr2 = model.jnt_qpos_adr[j2];
                    let dof2 = model.jnt_dof_adr[j2];
                    let dev2 = qpos[adr2] - model.qpos0[adr2];
                    let pos = dev1 - eval_poly(&coef, dev2);
                    let slope = eval_poly_deriv(&coef, dev2);
                    let row = Row {
                        pos,
                        ..Row::new(ConstraintType::Equality, eq_id)
                    };
                    if dof1 < dof2 {
                        writer.push(&[dof1, dof2], &[1.0, -slope], row);
                    } else if dof2 < dof1 {
                        writer.push(&[dof2, dof1], &[-slope, 1.0], row);
                    } else {
                        writer.push(&[dof1], &[1.0 - slope], row);
                    }
                } else {
                    // No driving joint: hold j1 at the constant offset c0.
                    writer.push(
                        &[dof1],
                        &[1.0],
                        Row {
                            pos: dev1 - coef[0],
                            ..Row::new(ConstraintType::Equality, eq_id)
                        },
                    );
                }
            }
        }
    }

    // ── 2. DOF friction loss ──
    for dof in 0..model.nv {
        let frictionloss = model.dof_frictionloss[dof];
        if frictionloss > 0.0 {
            writer.push(
                &[dof],
                &[1.0],
                Row {
                    frictionloss,
                    ..Row::new(ConstraintType::FrictionLoss, dof)
                },
            );
        }
    }

    // ── 3. Tendon friction loss ──
    for t in 0..model.ntendon {
        let frictionloss = model.tendon_frictionloss[t];
        if frictionloss > 0.0 {
            let chain = &model.tendon_chain[t];
            for (k, &col) in chain.iter().enumerate() {
                row_scratch[k] = ten_J[t][col];
            }
            writer.push(
                chain,
                &row_scratch.as_slice()[..chain.len()],
                Row {
                    frictionloss,
                    ..Row::new(ConstraintType::FrictionLoss, t)
                },
            );
        }
    }

    // ── 4. Joint limits ──
    for jnt_id in 0..model.njnt {
        if !model.jnt_limited[jnt_id]
            || !matches!(
                model.jnt_type[jnt_id],
                MjJointType::Hinge | MjJointType::Slide
            )
        {
            continue;
        }
        let q = qpos[model.jnt_qpos_adr[jnt_id]];
        let dof = model.jnt_dof_adr[jnt_id];
        let (lower, upper) = model.jnt_range[jnt_id];
        let margin = model.jnt_margin[jnt_id];

        // Distance to each limit; the row activates while dist < margin and
        // points away from the limit. Both sides can be active at once when
        // the margin spans the range.
        let dist_lower = q - lower;
        if dist_lower < margin {
            writer.push(
                &[dof],
                &[1.0],
                Row {
                    pos: dist_lower,
                    margin,
                    ..Row::new(ConstraintType::LimitJoint, jnt_id)
                },
            );
        }
        let dist_upper = upper - q;
        if dist_upper < margin {
            writer.push(
                &[dof],
                &[-1.0],
                Row {
                    pos: dist_upper,
                    margin,
                    ..Row::new(ConstraintType::LimitJoint, jnt_id)
                },
            );
        }
    }

    // ── 5. Tendon limits ──
    for t in 0..model.ntendon {
        if !model.tendon_limited[t] {
            continue;
        }
        let length = ten_length[t];
        let (lower, upper) = model.tendon_range[t];
        let margin = model.tendon_margin[t];
        let chain = &model.tendon_chain[t];

        let dist_lower = length - lower;
        if dist_lower < margin {
            for (k, &col) in chain.iter().enumerate() {
                row_scratch[k] = ten_J[t][col];
            }
            writer.push(
                chain,
                &row_scratch.as_slice()[..chain.len()],
                Row {
                    pos: dist_lower,
                    margin,
                    ..Row::new(ConstraintType::LimitTendon, t)
                },
            );
        }
        let dist_upper = upper - length;
        if dist_upper < margin {
            for (k, &col) in chain.iter().enumerate() {
                row_scratch[k] = -ten_J[t][col];
            }
            writer.push(
                chain,
                &row_scratch.as_slice()[..chain.len()],
                Row {
                    pos: dist_upper,
                    margin,
                    ..Row::new(ConstraintType::LimitTendon, t)
                },
            );
        }
    }

    // ── 6. Contacts ──
    for (con_id, contact) in contacts.iter().enumerate() {
        // Relative velocity of body2 w.r.t. body1 at the contact point,
        // projected into the contact frame.
        jac_dif_pair_into(
            model,
            xanchor,
            xaxis,
            jnt_xquat,
            &contact.pos,
            &contact.pos,
            contact.body1,
            contact.body2,
            jacp_scratch,
            jacr_scratch,
        );

        let width = combine_sparse(
            &model.body_chain[contact.body1],
            &model.body_chain[contact.body2],
            chain_scratch,
            chain_pos1,
            chain_pos2,
        );
        let chain = &chain_scratch[..width];

        for row_idx in 0..contact.dim {
            let (direction, angular) = match row_idx {
                0 => (contact.normal, false),
                1 => (contact.frame[0], false),
                2 => (contact.frame[1], false),
                3 => (contact.normal, true),
                4 => (contact.frame[0], true),
                _ => (contact.frame[1], true),
            };
            let jac = if angular { &jacr_scratch } else { &jacp_scratch };
            for (k, &col) in chain.iter().enumerate() {
                row_scratch[k] = direction.x * jac[(0, col)]
                    + direction.y * jac[(1, col)]
                    + direction.z * jac[(2, col)];
            }
            // Only the normal row carries the signed distance and margin;
            // friction rows have no positional residual.
            let (pos, margin) = if row_idx == 0 {
                (contact.dist, contact.includemargin)
            } else {
                (0.0, 0.0)
            };
            writer.push(
                chain,
                &row_scratch.as_slice()[..width],
                Row {
                    dim: contact.dim,
                    pos,
                    margin,
                    mu: contact.mu,
                    ..Row::new(ConstraintType::Contact, con_id)
                },
            );
        }
    }

    let total_rows = writer.efc_type.len();
    let total_nnz = writer.nnz;
    debug_assert_eq!(total_rows, expected_rows, "count/populate row mismatch");
    if model.jacobian == JacobianMode::Sparse {
        debug_assert_eq!(total_nnz, expected_nnz, "count/populate nnz mismatch");
    }

    *nefc_out = total_rows;
    *nnz_out = total_nnz;

    tracing::debug!(
        nefc = total_rows,
        nnz = total_nnz,
        ncon = contacts.len(),
        "assembled constraint rows"
    );

    Ok(())
}
