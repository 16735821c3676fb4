//! Variable catalog and per-run value storage.
pub mod registry;
pub mod types;

pub use registry::VariableRegistry;
pub use types::{ClampEvent, Unit, Variable, VariableId, VariableKind};
