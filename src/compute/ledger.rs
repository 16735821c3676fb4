//! Run output: one `DailyResult` per simulated day plus aggregated diagnostics.

use crate::analysis::repair::AppliedRepair;
use crate::store::ClampEvent;
use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Recoverable per-day numerical events. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayDiagnostics {
    pub guarded_divisions: u32,
    pub clamps: Vec<ClampEvent>,
    /// Equations whose result was NaN or infinite and stored as 0.
    pub non_finite: Vec<String>,
    /// Equations that read a name missing from their input list.
    #[serde(default)]
    pub undeclared_reads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyResult {
    pub day_index: usize,
    pub date: NaiveDate,
    /// Every variable, keyed by initials.
    pub values: BTreeMap<String, f64>,
    pub diagnostics: DayDiagnostics,
}

impl DailyResult {
    pub fn get(&self, initials: &str) -> Option<f64> {
        self.values.get(initials).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Stopped between days; `days` holds the rows produced so far.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub guarded_divisions: u64,
    pub clamps: u64,
    pub non_finite: u64,
    #[serde(default)]
    pub undeclared_reads: u64,
    /// Initial-state values that were clamped when seeding day 0.
    pub initial_clamps: Vec<ClampEvent>,
}

impl RunDiagnostics {
    pub(crate) fn absorb(&mut self, day: &DayDiagnostics) {
        self.guarded_divisions += u64::from(day.guarded_divisions);
        self.clamps += day.clamps.len() as u64;
        self.non_finite += day.non_finite.len() as u64;
        self.undeclared_reads += day.undeclared_reads.len() as u64;
    }
}

/// The ordered `DailyResult` series of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSimulation {
    pub random_seed: u64,
    pub status: RunStatus,
    pub days: Vec<DailyResult>,
    pub diagnostics: RunDiagnostics,
    /// Substitution rules the resolver applied to build the model.
    pub repairs: Vec<AppliedRepair>,
}

impl ResultSimulation {
    pub fn len(&self) -> usize { self.days.len() }
    pub fn is_empty(&self) -> bool { self.days.is_empty() }

    /// One variable across all days. `None` if the variable is not part of the model.
    pub fn series(&self, initials: &str) -> Option<Vec<f64>> {
        self.days.iter().map(|d| d.get(initials)).collect()
    }

    pub fn total(&self, initials: &str) -> Option<f64> {
        self.series(initials).map(|s| s.iter().sum())
    }

    pub fn last(&self) -> Option<&DailyResult> {
        self.days.last()
    }
}
