//! Constraint Jacobian assembly for rigid-body simulation.
//!
//! Takes a kinematic tree ([`Model`]) with equality constraints, joint and
//! tendon limits, dry friction, and externally detected contacts, and
//! assembles them into a unified constraint row system on [`Data`]: the
//! constraint Jacobian `efc_J` (dense or compressed sparse rows) plus
//! parallel per-row metadata, in a deterministic order a constraint solver
//! can consume.
//!
//! The model/data split follows the usual simulator pattern: `Model` is
//! immutable after [`Model::finalize`] and shareable across threads;
//! every per-step buffer lives on `Data`, preallocated once by
//! [`Model::make_data`] so the per-step path never allocates.
//!
//! ```
//! use sim_constraint::{assemble_constraints, mj_fwd_position, mj_fwd_tendon, Model};
//!
//! let model = Model::n_link_pendulum(2, 1.0);
//! let mut data = model.make_data();
//! mj_fwd_position(&model, &mut data);
//! mj_fwd_tendon(&model, &mut data);
//! assemble_constraints(&model, &mut data)?;
//! assert_eq!(data.nefc, 0); // no active constraints in free space
//! # Ok::<(), sim_constraint::AssemblyError>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
// Simulation state uses MuJoCo-style field names (efc_J, ten_J).
#![allow(non_snake_case)]

pub mod constraint;
pub mod jacobian;
pub mod kinematics;
pub mod sparse;
pub mod types;

pub use constraint::assemble_constraints;
pub use constraint::equality::{rotation_jacobian_column, rotation_residual};
pub use jacobian::{jac_dif_pair_into, mj_jac, mj_jac_into};
pub use kinematics::{mj_fwd_position, mj_fwd_tendon, mj_integrate_pos};
pub use sparse::{combine_sparse, combine_sparse_count};
pub use types::{
    compute_tangent_frame, AssemblyError, Contact, ConstraintType, Data, EqualityType,
    JacobianMode, MjJointType, Model,
};
