//! Simulation execution: requests, the day loop, results and batches.
pub mod batch;
pub mod engine;
pub mod ledger;
pub mod run;
pub mod schedule;

pub use batch::{replicate, run_batch, summarize_bands, Band};
pub use engine::{SimulationModel, Simulator};
pub use ledger::{DailyResult, DayDiagnostics, ResultSimulation, RunDiagnostics, RunStatus};
pub use run::{CancellationToken, SimulationRun, MIN_HISTORY};
pub use schedule::{DayProfile, Perturbation, PerturbationMode};
