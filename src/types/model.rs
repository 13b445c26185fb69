//! The immutable model: kinematic tree, constraint declarations, capacities.
//!
//! [`Model`] is constructed once per simulated system and never mutated
//! afterwards, so it can be shared read-only between simulation instances
//! stepping in parallel threads. All per-step buffers live on
//! [`Data`](super::data::Data), allocated once in [`Model::make_data`].

use nalgebra::{DVector, UnitQuaternion, Vector3};

use super::enums::{EqualityType, JacobianMode, MjJointType};

/// Static model description for constraint assembly.
///
/// Follows the `MuJoCo` Model/Data split: flat per-element arrays indexed by
/// body/joint/tendon/equality id, with body 0 reserved for the world.
#[derive(Debug, Clone)]
pub struct Model {
    /// Generalized position dimension (quaternions use 4 coordinates).
    pub nq: usize,
    /// Generalized velocity dimension (DOF count).
    pub nv: usize,
    /// Number of bodies, including the world body 0.
    pub nbody: usize,
    /// Number of joints.
    pub njnt: usize,
    /// Number of (fixed) tendons.
    pub ntendon: usize,
    /// Number of equality constraints.
    pub neq: usize,

    // ── Body tree ──
    /// Parent body id per body (body 0 is its own parent).
    pub body_parent: Vec<usize>,
    /// First joint id per body.
    pub body_jnt_adr: Vec<usize>,
    /// Joint count per body.
    pub body_jnt_num: Vec<usize>,
    /// Body frame offset in the parent frame.
    pub body_pos: Vec<Vector3<f64>>,
    /// Body frame orientation offset in the parent frame.
    pub body_quat: Vec<UnitQuaternion<f64>>,

    // ── Joints ──
    /// Joint type per joint.
    pub jnt_type: Vec<MjJointType>,
    /// Body carrying each joint.
    pub jnt_body: Vec<usize>,
    /// First qpos coordinate per joint.
    pub jnt_qpos_adr: Vec<usize>,
    /// First DOF index per joint.
    pub jnt_dof_adr: Vec<usize>,
    /// Joint anchor in the body frame.
    pub jnt_pos: Vec<Vector3<f64>>,
    /// Joint axis in the body frame (hinge/slide).
    pub jnt_axis: Vec<Vector3<f64>>,
    /// Whether the joint has position limits.
    pub jnt_limited: Vec<bool>,
    /// (lower, upper) position limits.
    pub jnt_range: Vec<(f64, f64)>,
    /// Limit activation margin: a limit row is emitted while
    /// `dist < margin`, not only once the limit is violated.
    pub jnt_margin: Vec<f64>,

    // ── DOFs ──
    /// Dry-friction bound per DOF; > 0 emits a friction-loss row.
    pub dof_frictionloss: Vec<f64>,

    // ── Fixed tendons (linear joint couplings) ──
    /// First wrap entry per tendon.
    pub tendon_adr: Vec<usize>,
    /// Wrap entry count per tendon.
    pub tendon_num: Vec<usize>,
    /// Whether the tendon has length limits.
    pub tendon_limited: Vec<bool>,
    /// (lower, upper) tendon length limits.
    pub tendon_range: Vec<(f64, f64)>,
    /// Limit activation margin per tendon.
    pub tendon_margin: Vec<f64>,
    /// Dry-friction bound per tendon; > 0 emits a friction-loss row.
    pub tendon_frictionloss: Vec<f64>,
    /// Coupled joint id per wrap entry (scalar joints only).
    pub wrap_objid: Vec<usize>,
    /// Coupling coefficient per wrap entry.
    pub wrap_prm: Vec<f64>,

    // ── Equality constraints ──
    /// Equality kind per constraint.
    pub eq_type: Vec<EqualityType>,
    /// First object id (body id for connect/weld, joint id for joint).
    pub eq_obj1id: Vec<usize>,
    /// Second object id (0 / out-of-range meaning "world" or "none").
    pub eq_obj2id: Vec<usize>,
    /// Kind-specific parameters.
    /// Connect: `[0..3]` anchor in body1 frame.
    /// Weld: `[0..3]` anchor, `[3..7]` target relative quaternion (w,x,y,z).
    /// Joint: `[0..5]` polynomial coefficients c0..c4.
    pub eq_data: Vec<[f64; 7]>,
    /// Whether the constraint is currently enabled.
    pub eq_active: Vec<bool>,

    // ── Representation & capacity ──
    /// Constraint Jacobian representation mode.
    pub jacobian: JacobianMode,
    /// Declared maximum number of simultaneous contacts.
    pub nconmax: usize,
    /// Maximum per-contact row count the capacity is sized for (1, 3, 4, 6).
    pub condim_max: usize,
    /// Maximum constraint row count, derived by [`Model::compute_capacity`].
    pub njmax: usize,
    /// Maximum sparse non-zero count, derived by [`Model::compute_capacity`].
    pub nnzmax: usize,

    // ── Derived (precomputed once) ──
    /// Per-body ascending, duplicate-free DOF indices of every joint between
    /// the body and the root. Empty for dofless bodies and the world.
    pub body_chain: Vec<Vec<usize>>,
    /// Per-tendon ascending DOF indices the tendon couples.
    pub tendon_chain: Vec<Vec<usize>>,

    /// Reference configuration (length `nq`).
    pub qpos0: DVector<f64>,
}

impl Model {
    /// Create an empty model (world body only, no joints or constraints).
    ///
    /// Factories and tests fill in the arrays and then call
    /// [`Model::finalize`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            nq: 0,
            nv: 0,
            nbody: 1,
            njnt: 0,
            ntendon: 0,
            neq: 0,
            body_parent: vec![0],
            body_jnt_adr: vec![0],
            body_jnt_num: vec![0],
            body_pos: vec![Vector3::zeros()],
            body_quat: vec![UnitQuaternion::identity()],
            jnt_type: vec![],
            jnt_body: vec![],
            jnt_qpos_adr: vec![],
            jnt_dof_adr: vec![],
            jnt_pos: vec![],
            jnt_axis: vec![],
            jnt_limited: vec![],
            jnt_range: vec![],
            jnt_margin: vec![],
            dof_frictionloss: vec![],
            tendon_adr: vec![],
            tendon_num: vec![],
            tendon_limited: vec![],
            tendon_range: vec![],
            tendon_margin: vec![],
            tendon_frictionloss: vec![],
            wrap_objid: vec![],
            wrap_prm: vec![],
            eq_type: vec![],
            eq_obj1id: vec![],
            eq_obj2id: vec![],
            eq_data: vec![],
            eq_active: vec![],
            jacobian: JacobianMode::Dense,
            nconmax: 0,
            condim_max: 6,
            njmax: 0,
            nnzmax: 0,
            body_chain: vec![vec![]],
            tendon_chain: vec![],
            qpos0: DVector::zeros(0),
        }
    }

    /// Precompute derived arrays and capacities.
    ///
    /// Must be called once after all model arrays are populated and before
    /// [`Model::make_data`]. Computes the per-body ancestor DOF chains, the
    /// per-tendon DOF sets, and the worst-case row / non-zero capacities.
    pub fn finalize(&mut self) {
        self.compute_chains();
        self.compute_capacity();
    }

    /// Compute `body_chain` and `tendon_chain`.
    fn compute_chains(&mut self) {
        self.body_chain = Vec::with_capacity(self.nbody);
        for body_id in 0..self.nbody {
            let mut chain: Vec<usize> = Vec::new();
            let mut current = body_id;
            while current != 0 {
                let jnt_start = self.body_jnt_adr[current];
                let jnt_end = jnt_start + self.body_jnt_num[current];
                for jnt_id in jnt_start..jnt_end {
                    let dof = self.jnt_dof_adr[jnt_id];
                    for i in 0..self.jnt_type[jnt_id].nv() {
                        chain.push(dof + i);
                    }
                }
                current = self.body_parent[current];
            }
            // Joints are collected leaf-to-root; the merge algebra requires
            // ascending, duplicate-free indices.
            chain.sort_unstable();
            chain.dedup();
            self.body_chain.push(chain);
        }

        self.tendon_chain = Vec::with_capacity(self.ntendon);
        for t in 0..self.ntendon {
            let adr = self.tendon_adr[t];
            let num = self.tendon_num[t];
            let mut chain: Vec<usize> = (adr..adr + num)
                .map(|w| self.jnt_dof_adr[self.wrap_objid[w]])
                .collect();
            chain.sort_unstable();
            chain.dedup();
            self.tendon_chain.push(chain);
        }
    }

    /// Compute the worst-case row count `njmax` and non-zero count `nnzmax`.
    ///
    /// Every buffer on [`Data`](super::data::Data) is sized from these, so
    /// the hot assembly path never allocates. The counts assume every
    /// equality active, every limit bilateral, and `nconmax` contacts of
    /// `condim_max` rows each.
    fn compute_capacity(&mut self) {
        let mut njmax = 0usize;

        for eq_id in 0..self.neq {
            njmax += self.eq_type[eq_id].nrow();
        }
        njmax += self
            .dof_frictionloss
            .iter()
            .filter(|&&fl| fl > 0.0)
            .count();
        njmax += self
            .tendon_frictionloss
            .iter()
            .filter(|&&fl| fl > 0.0)
            .count();
        for jnt_id in 0..self.njnt {
            if self.jnt_limited[jnt_id]
                && matches!(
                    self.jnt_type[jnt_id],
                    MjJointType::Hinge | MjJointType::Slide
                )
            {
                njmax += 2;
            }
        }
        njmax += 2 * self.tendon_limited.iter().filter(|&&l| l).count();
        njmax += self.nconmax * self.condim_max;

        self.njmax = njmax;
        // Safe structural bound: no row can carry more than nv non-zeros.
        self.nnzmax = njmax * self.nv;
    }
}
