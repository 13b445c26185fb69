//! Core type definitions: enums, errors, Model, Data, contacts.

pub mod contact;
pub mod data;
pub mod enums;
pub mod model;
pub mod model_factories;

pub use contact::{compute_tangent_frame, Contact};
pub use data::Data;
pub use enums::{AssemblyError, ConstraintType, EqualityType, JacobianMode, MjJointType};
pub use model::Model;
