//! Static analysis over equation graphs.
pub mod repair;
pub mod telemetry;
pub mod topology;

pub use repair::{AppliedRepair, SubstitutionRule};
pub use telemetry::ModelReport;
