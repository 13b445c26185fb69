//! Hand-built model fixtures for tests and examples.
//!
//! Each factory assembles the flat model arrays directly and finalizes the
//! result, mirroring what a model loader would produce. Tests that need a
//! variation (margins, friction, sparse mode) mutate the returned model and
//! call [`Model::finalize`] again.

use nalgebra::{DVector, UnitQuaternion, Vector3};

use super::enums::{EqualityType, MjJointType};
use super::model::Model;

impl Model {
    /// Append a body to the tree and return its id.
    ///
    /// Joints for the body must be added immediately after, via
    /// [`Model::add_joint`], before the next body.
    pub fn add_body(
        &mut self,
        parent: usize,
        pos: Vector3<f64>,
        quat: UnitQuaternion<f64>,
    ) -> usize {
        let body_id = self.nbody;
        self.nbody += 1;
        self.body_parent.push(parent);
        self.body_jnt_adr.push(self.njnt);
        self.body_jnt_num.push(0);
        self.body_pos.push(pos);
        self.body_quat.push(quat);
        self.body_chain.push(vec![]);
        body_id
    }

    /// Append a joint to the most recently added body and return its id.
    pub fn add_joint(
        &mut self,
        body_id: usize,
        jnt_type: MjJointType,
        pos: Vector3<f64>,
        axis: Vector3<f64>,
    ) -> usize {
        debug_assert_eq!(body_id, self.nbody - 1, "joints follow their body");
        let jnt_id = self.njnt;
        self.njnt += 1;
        self.body_jnt_num[body_id] += 1;
        self.jnt_type.push(jnt_type);
        self.jnt_body.push(body_id);
        self.jnt_qpos_adr.push(self.nq);
        self.jnt_dof_adr.push(self.nv);
        self.jnt_pos.push(pos);
        self.jnt_axis.push(axis);
        self.jnt_limited.push(false);
        self.jnt_range.push((0.0, 0.0));
        self.jnt_margin.push(0.0);
        for _ in 0..jnt_type.nv() {
            self.dof_frictionloss.push(0.0);
        }

        self.nq += jnt_type.nq();
        self.nv += jnt_type.nv();

        // Quaternion coordinates initialize to identity, everything else to 0.
        let mut qpos0 = DVector::zeros(self.nq);
        qpos0.rows_mut(0, self.qpos0.len()).copy_from(&self.qpos0);
        match jnt_type {
            MjJointType::Ball => qpos0[self.jnt_qpos_adr[jnt_id]] = 1.0,
            MjJointType::Free => qpos0[self.jnt_qpos_adr[jnt_id] + 3] = 1.0,
            MjJointType::Hinge | MjJointType::Slide => {}
        }
        self.qpos0 = qpos0;

        jnt_id
    }

    /// Append a fixed tendon coupling the given scalar joints and return its
    /// id.
    pub fn add_fixed_tendon(&mut self, couplings: &[(usize, f64)]) -> usize {
        let tendon_id = self.ntendon;
        self.ntendon += 1;
        self.tendon_adr.push(self.wrap_objid.len());
        self.tendon_num.push(couplings.len());
        self.tendon_limited.push(false);
        self.tendon_range.push((0.0, 0.0));
        self.tendon_margin.push(0.0);
        self.tendon_frictionloss.push(0.0);
        for &(jnt_id, coef) in couplings {
            self.wrap_objid.push(jnt_id);
            self.wrap_prm.push(coef);
        }
        tendon_id
    }

    /// Append an equality constraint and return its id.
    pub fn add_equality(
        &mut self,
        eq_type: EqualityType,
        obj1id: usize,
        obj2id: usize,
        data: [f64; 7],
    ) -> usize {
        let eq_id = self.neq;
        self.neq += 1;
        self.eq_type.push(eq_type);
        self.eq_obj1id.push(obj1id);
        self.eq_obj2id.push(obj2id);
        self.eq_data.push(data);
        self.eq_active.push(true);
        eq_id
    }

    /// Serial chain of `n` hinge links rotating about +Y, each link hanging
    /// `link_length` below its joint.
    #[must_use]
    pub fn n_link_pendulum(n: usize, link_length: f64) -> Self {
        let mut model = Self::empty();
        let mut parent = 0;
        for _ in 0..n {
            let body = model.add_body(
                parent,
                Vector3::new(0.0, 0.0, -link_length),
                UnitQuaternion::identity(),
            );
            model.add_joint(
                body,
                MjJointType::Hinge,
                Vector3::new(0.0, 0.0, link_length),
                Vector3::y(),
            );
            parent = body;
        }
        model.finalize();
        model
    }

    /// Two-link hinge pendulum with one fixed tendon
    /// `L = coef1·q0 + coef2·q1`, optionally length-limited.
    #[must_use]
    pub fn two_hinge_tendon(
        coef1: f64,
        coef2: f64,
        limited: bool,
        lower: f64,
        upper: f64,
    ) -> Self {
        let mut model = Self::n_link_pendulum(2, 1.0);
        let t = model.add_fixed_tendon(&[(0, coef1), (1, coef2)]);
        model.tendon_limited[t] = limited;
        model.tendon_range[t] = (lower, upper);
        model.finalize();
        model
    }

    /// Two independent bodies on the world: body 1 on a ball joint at the
    /// origin, body 2 at (0.5, 0, 0) on three hinges with skewed anchors,
    /// welded together.
    ///
    /// The mixed quaternion/hinge parameterization exercises every branch of
    /// the rotational Jacobian correction.
    #[must_use]
    pub fn ball_hinge_pair() -> Self {
        let mut model = Self::empty();

        let body1 = model.add_body(0, Vector3::zeros(), UnitQuaternion::identity());
        model.add_joint(body1, MjJointType::Ball, Vector3::zeros(), Vector3::z());

        let body2 = model.add_body(
            0,
            Vector3::new(0.5, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        model.add_joint(
            body2,
            MjJointType::Hinge,
            Vector3::new(0.0, 0.0, 0.01),
            Vector3::x(),
        );
        model.add_joint(
            body2,
            MjJointType::Hinge,
            Vector3::new(0.02, 0.0, 0.0),
            Vector3::y(),
        );
        model.add_joint(
            body2,
            MjJointType::Hinge,
            Vector3::new(0.0, 0.03, 0.0),
            Vector3::z(),
        );

        model.add_equality(
            EqualityType::Weld,
            body1,
            body2,
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        );

        model.finalize();
        model
    }

    /// Single floating body with contact capacity, for contact-row tests.
    #[must_use]
    pub fn free_body() -> Self {
        let mut model = Self::empty();
        let body = model.add_body(0, Vector3::zeros(), UnitQuaternion::identity());
        model.add_joint(body, MjJointType::Free, Vector3::zeros(), Vector3::z());
        model.nconmax = 8;
        model.finalize();
        model
    }
}
