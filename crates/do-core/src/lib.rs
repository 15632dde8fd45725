#![deny(missing_docs)]
#![doc = "Core data types for the do-sampler: typed frames, causal roles, identification contracts, structured errors and deterministic RNG."]

/// Structured error types and codes.
pub mod errors;
/// Typed columns, frames and the observational dataset.
pub mod frame;
/// Identification contract and the graph-less back-door identifier.
pub mod identify;
/// Deterministic RNG handle and substream seeding.
pub mod rng;
/// Causal role assignment.
pub mod roles;

pub use errors::{DoError, ErrorInfo, ErrorKind};
pub use frame::{Column, Frame, ObservationalDataset, Schema, VariableType};
pub use identify::{BackdoorIdentifier, IdentificationProvider, IdentifiedEstimand};
pub use rng::{derive_substream_seed, RngHandle};
pub use roles::{RoleAssignment, RoleKey, VariableRole};
