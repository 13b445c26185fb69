//! Per-instance simulation state and preallocated constraint buffers.
//!
//! [`Data`] owns everything that changes per step: the generalized state,
//! the body poses produced by the kinematics pass, the active contact list
//! pushed by upstream detection, and the `efc_*` constraint outputs. Every
//! buffer is allocated once in [`Model::make_data`] to the model's
//! worst-case capacity and overwritten in place each step, so the hot
//! assembly path never allocates.

use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};

use super::contact::Contact;
use super::enums::ConstraintType;
use super::model::Model;

/// Dynamic state + constraint output buffers for one simulated trajectory.
///
/// A `Data` is tied to the `Model` that created it; sharing one `Model`
/// between several `Data` instances on different threads is safe because
/// the model is never mutated after construction.
#[derive(Debug, Clone)]
pub struct Data {
    // ── Generalized state ──
    /// Generalized position (length `nq`).
    pub qpos: DVector<f64>,
    /// Generalized velocity (length `nv`).
    pub qvel: DVector<f64>,

    // ── Kinematic state (produced by the position pass) ──
    /// World-frame body positions.
    pub xpos: Vec<Vector3<f64>>,
    /// World-frame body orientations.
    pub xquat: Vec<UnitQuaternion<f64>>,
    /// Per-joint world anchor, recorded as the joint is applied during the
    /// position pass. Later joints on the same body do not move it.
    pub xanchor: Vec<Vector3<f64>>,
    /// Per-joint world axis (hinge/slide), recorded as the joint is applied.
    pub xaxis: Vec<Vector3<f64>>,
    /// Frame orientation immediately after applying each joint; supplies the
    /// world-frame rotation axes of ball and free joints.
    pub jnt_xquat: Vec<UnitQuaternion<f64>>,

    // ── Tendon state (produced by the tendon pass) ──
    /// Tendon lengths.
    pub ten_length: Vec<f64>,
    /// Tendon velocities (`J · qvel`).
    pub ten_velocity: Vec<f64>,
    /// Dense tendon Jacobian rows (one length-`nv` vector per tendon).
    pub ten_J: Vec<DVector<f64>>,

    // ── Active contacts (pushed by upstream detection) ──
    /// Current contact list; capacity `nconmax`, cleared by the caller
    /// between detection passes.
    pub contacts: Vec<Contact>,

    // ── Constraint outputs ──
    /// Number of active constraint rows after assembly.
    pub nefc: usize,
    /// Per-row constraint kind.
    pub efc_type: Vec<ConstraintType>,
    /// Per-row source object id (equality/joint/tendon/contact index).
    pub efc_id: Vec<usize>,
    /// Per-row dimension of the owning constraint (contacts: `dim`,
    /// everything else: 1).
    pub efc_dim: Vec<usize>,
    /// Per-row residual (signed constraint violation).
    pub efc_pos: Vec<f64>,
    /// Per-row activation margin.
    pub efc_margin: Vec<f64>,
    /// Per-row constraint velocity (`J_row · qvel`).
    pub efc_vel: Vec<f64>,
    /// Per-row friction-loss bound (friction rows only, else 0).
    pub efc_frictionloss: Vec<f64>,
    /// Per-row friction coefficients (contact rows only).
    pub efc_mu: Vec<[f64; 5]>,

    /// Dense constraint Jacobian (`njmax × nv`); rows `0..nefc` are valid.
    /// Used when the model's mode is [`JacobianMode::Dense`].
    ///
    /// [`JacobianMode::Dense`]: super::enums::JacobianMode::Dense
    pub efc_J: DMatrix<f64>,

    // ── Sparse CSR arena (JacobianMode::Sparse) ──
    /// Total non-zeros across rows `0..nefc`.
    pub nnz: usize,
    /// Non-zero count per row.
    pub efc_J_rownnz: Vec<usize>,
    /// Arena offset of each row's first non-zero.
    pub efc_J_rowadr: Vec<usize>,
    /// Column indices, ascending within each row.
    pub efc_J_colind: Vec<usize>,
    /// Values parallel to `efc_J_colind`.
    pub efc_J_data: Vec<f64>,

    // ── Hot-path scratch (preallocated, contents meaningless between calls) ──
    pub(crate) row_scratch: DVector<f64>,
    pub(crate) jacp_scratch: DMatrix<f64>,
    pub(crate) jacr_scratch: DMatrix<f64>,
    pub(crate) chain_scratch: Vec<usize>,
    pub(crate) chain_pos1: Vec<usize>,
    pub(crate) chain_pos2: Vec<usize>,
}

impl Model {
    /// Allocate a [`Data`] sized to this model's worst-case capacities.
    ///
    /// [`Model::finalize`] must have run first so `njmax`/`nnzmax` and the
    /// chain index sets are populated.
    #[must_use]
    pub fn make_data(&self) -> Data {
        let nv = self.nv;
        Data {
            qpos: self.qpos0.clone(),
            qvel: DVector::zeros(nv),
            xpos: vec![Vector3::zeros(); self.nbody],
            xquat: vec![UnitQuaternion::identity(); self.nbody],
            xanchor: vec![Vector3::zeros(); self.njnt],
            xaxis: vec![Vector3::zeros(); self.njnt],
            jnt_xquat: vec![UnitQuaternion::identity(); self.njnt],
            ten_length: vec![0.0; self.ntendon],
            ten_velocity: vec![0.0; self.ntendon],
            ten_J: vec![DVector::zeros(nv); self.ntendon],
            contacts: Vec::with_capacity(self.nconmax),
            nefc: 0,
            efc_type: Vec::with_capacity(self.njmax),
            efc_id: Vec::with_capacity(self.njmax),
            efc_dim: Vec::with_capacity(self.njmax),
            efc_pos: Vec::with_capacity(self.njmax),
            efc_margin: Vec::with_capacity(self.njmax),
            efc_vel: Vec::with_capacity(self.njmax),
            efc_frictionloss: Vec::with_capacity(self.njmax),
            efc_mu: Vec::with_capacity(self.njmax),
            efc_J: DMatrix::zeros(self.njmax, nv),
            nnz: 0,
            efc_J_rownnz: vec![0; self.njmax],
            efc_J_rowadr: vec![0; self.njmax],
            efc_J_colind: vec![0; self.nnzmax],
            efc_J_data: vec![0.0; self.nnzmax],
            row_scratch: DVector::zeros(nv),
            jacp_scratch: DMatrix::zeros(3, nv),
            jacr_scratch: DMatrix::zeros(3, nv),
            chain_scratch: vec![0; nv],
            chain_pos1: vec![0; nv],
            chain_pos2: vec![0; nv],
        }
    }
}

impl Data {
    /// Reset the constraint outputs before a fresh assembly pass.
    ///
    /// Clears the metadata vectors (capacity is retained, so no
    /// reallocation) and the row/non-zero counters. Jacobian storage is
    /// overwritten row by row and needs no clearing.
    pub(crate) fn reset_constraints(&mut self) {
        self.nefc = 0;
        self.nnz = 0;
        self.efc_type.clear();
        self.efc_id.clear();
        self.efc_dim.clear();
        self.efc_pos.clear();
        self.efc_margin.clear();
        self.efc_vel.clear();
        self.efc_frictionloss.clear();
        self.efc_mu.clear();
    }

    /// Expand one constraint row to a dense length-`nv` vector, regardless
    /// of the model's representation mode.
    ///
    /// Intended for inspection and tests; the hot path never materializes
    /// sparse rows densely.
    ///
    /// # Panics
    /// Panics if `row >= self.nefc`.
    #[must_use]
    pub fn efc_row_dense(&self, model: &Model, row: usize) -> DVector<f64> {
        assert!(row < self.nefc, "row {row} out of range ({})", self.nefc);
        match model.jacobian {
            super::enums::JacobianMode::Dense => self.efc_J.row(row).transpose(),
            super::enums::JacobianMode::Sparse => {
                let mut dense = DVector::zeros(model.nv);
                let adr = self.efc_J_rowadr[row];
                for k in 0..self.efc_J_rownnz[row] {
                    dense[self.efc_J_colind[adr + k]] = self.efc_J_data[adr + k];
                }
                dense
            }
        }
    }
}
