//! Enums and error types for the constraint assembly pipeline.
//!
//! Defines the type-level vocabulary shared across the assembly stages:
//! joint types, equality constraint types, per-row constraint type tags,
//! Jacobian representation mode, and the fatal assembly error.

use thiserror::Error;

/// Joint type following `MuJoCo` conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MjJointType {
    /// Hinge joint (1 DOF): rotation about a single axis.
    /// qpos: 1 scalar (angle in radians)
    /// qvel: 1 scalar (angular velocity)
    #[default]
    Hinge,
    /// Slide joint (1 DOF): translation along a single axis.
    /// qpos: 1 scalar (displacement)
    /// qvel: 1 scalar (linear velocity)
    Slide,
    /// Ball joint (3 DOF): free rotation (spherical).
    /// qpos: 4 scalars (unit quaternion w, x, y, z)
    /// qvel: 3 scalars (angular velocity)
    Ball,
    /// Free joint (6 DOF): floating body with no constraints.
    /// qpos: 7 scalars (position x,y,z + quaternion w,x,y,z)
    /// qvel: 6 scalars (linear velocity + angular velocity)
    Free,
}

impl MjJointType {
    /// Number of position coordinates (nq contribution).
    #[must_use]
    pub const fn nq(self) -> usize {
        match self {
            Self::Hinge | Self::Slide => 1,
            Self::Ball => 4, // quaternion
            Self::Free => 7, // pos + quat
        }
    }

    /// Number of velocity coordinates / DOFs (nv contribution).
    #[must_use]
    pub const fn nv(self) -> usize {
        match self {
            Self::Hinge | Self::Slide => 1,
            Self::Ball => 3, // angular velocity
            Self::Free => 6, // linear + angular velocity
        }
    }

    /// Whether this joint type uses quaternion representation.
    #[must_use]
    pub const fn uses_quaternion(self) -> bool {
        matches!(self, Self::Ball | Self::Free)
    }
}

/// Equality constraint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EqualityType {
    /// Connect: constrains a body1-fixed anchor to coincide with body2's
    /// origin. Removes 3 DOF (translation only).
    #[default]
    Connect,
    /// Weld: constrains two body frames to a fixed relative pose.
    /// Removes 6 DOF (translation + rotation).
    Weld,
    /// Joint: polynomial coupling between two scalar joints,
    /// q2 = c0 + c1*q1 + c2*q1² + c3*q1³ + c4*q1⁴.
    Joint,
}

impl EqualityType {
    /// Number of scalar constraint rows this kind contributes when active.
    ///
    /// Declared per kind so the assembler can size rows without inspecting
    /// the constraint instance.
    #[must_use]
    pub const fn nrow(self) -> usize {
        match self {
            Self::Connect => 3,
            Self::Weld => 6,
            Self::Joint => 1,
        }
    }
}

/// Constraint type annotation per row in the unified constraint system.
///
/// Each scalar row of the constraint Jacobian (`efc_J`) is tagged with one
/// of these so the downstream solver can apply per-kind treatment
/// (bilateral equality, Huber friction, one-sided limits, friction cones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    /// Equality constraint (connect, weld, joint).
    Equality,
    /// DOF or tendon friction loss (Huber cost).
    FrictionLoss,
    /// Joint limit constraint.
    LimitJoint,
    /// Tendon limit constraint.
    LimitTendon,
    /// Contact row (normal or friction direction).
    Contact,
}

/// Constraint Jacobian representation, selected on the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JacobianMode {
    /// Dense nrows × nv matrix.
    #[default]
    Dense,
    /// Compressed sparse rows: per-row ascending column indices with
    /// parallel values, backed by a preallocated arena.
    Sparse,
}

/// Fatal assembly errors.
///
/// All variants indicate a malformed model or a broken upstream contract,
/// never a transient condition: continuing with a structurally invalid
/// constraint system risks solver divergence or out-of-bounds writes into
/// fixed-capacity buffers, so the step must be aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AssemblyError {
    /// The enumerated constraints produced more rows than the model's
    /// declared maximum.
    #[error("constraint rows exceed preallocated capacity ({nefc} > {njmax})")]
    RowCapacityExceeded {
        /// Rows the active constraints require.
        nefc: usize,
        /// The model's precomputed row capacity.
        njmax: usize,
    },
    /// The sparse Jacobian needs more non-zeros than the preallocated arena.
    #[error("sparse non-zeros exceed preallocated capacity ({nnz} > {nnzmax})")]
    NnzCapacityExceeded {
        /// Non-zeros the active constraints require.
        nnz: usize,
        /// The model's precomputed non-zero capacity.
        nnzmax: usize,
    },
    /// Upstream detection pushed more contacts than the model declared.
    #[error("active contacts exceed declared maximum ({ncon} > {nconmax})")]
    ContactCapacityExceeded {
        /// Contacts currently in `data.contacts`.
        ncon: usize,
        /// The model's declared contact capacity.
        nconmax: usize,
    },
    /// A contact carries a dimension the model's capacity was not sized for.
    #[error("contact dim {dim} exceeds model condim_max {condim_max}")]
    ContactDimExceeded {
        /// The offending contact's dimension.
        dim: usize,
        /// The model's declared per-contact row maximum.
        condim_max: usize,
    },
}
