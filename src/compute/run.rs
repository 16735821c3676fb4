//! A single simulation request.

use super::schedule::Perturbation;
use crate::error::{SimResult, SimulationError};
use crate::sampling::PdfSpec;
use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Minimum number of historical demand samples a run accepts.
pub const MIN_HISTORY: usize = 30;

/// Immutable once built. Everything that makes a run reproducible lives here:
/// horizon, seed, distribution, initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    horizon_days: usize,
    random_seed: u64,
    pdf: PdfSpec,
    historical_demand: Vec<f64>,
    initial_state: BTreeMap<String, f64>,
    start_date: NaiveDate,
    perturbation: Perturbation,
}

impl SimulationRun {
    /// Validates the distribution and the history length up front, so a bad
    /// request fails before any sampling.
    pub fn new(horizon_days: usize, random_seed: u64, pdf: PdfSpec, historical_demand: Vec<f64>) -> SimResult<Self> {
        pdf.validate()?;
        if historical_demand.len() < MIN_HISTORY {
            return Err(SimulationError::InsufficientHistory {
                required: MIN_HISTORY,
                actual: historical_demand.len(),
            });
        }
        if historical_demand.iter().any(|v| !v.is_finite()) {
            return Err(SimulationError::Config("historical demand contains non-finite values".into()));
        }
        Ok(Self {
            horizon_days,
            random_seed,
            pdf,
            historical_demand,
            initial_state: BTreeMap::new(),
            start_date: NaiveDate::default(),
            perturbation: Perturbation::default(),
        })
    }

    /// Overrides registry defaults at day 0 (prices, costs, opening stock).
    pub fn with_initial_state<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.initial_state.extend(values.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = date;
        self
    }

    pub fn with_perturbation(mut self, perturbation: Perturbation) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Same request under another seed (Monte-Carlo replicas).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn horizon_days(&self) -> usize { self.horizon_days }
    pub fn random_seed(&self) -> u64 { self.random_seed }
    pub fn pdf(&self) -> &PdfSpec { &self.pdf }
    pub fn historical_demand(&self) -> &[f64] { &self.historical_demand }
    pub fn initial_state(&self) -> &BTreeMap<String, f64> { &self.initial_state }
    pub fn start_date(&self) -> NaiveDate { self.start_date }
    pub fn perturbation(&self) -> &Perturbation { &self.perturbation }
}

/// Cooperative stop flag, checked between days.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn history() -> Vec<f64> {
        (0..30).map(|i| 2500.0 + (i % 5) as f64).collect()
    }

    #[test]
    fn test_rejects_short_history() {
        let err = SimulationRun::new(30, 1, PdfSpec::Normal { mean: 1.0, std: 1.0 }, vec![1.0; 29]).unwrap_err();
        assert_eq!(err, SimulationError::InsufficientHistory { required: 30, actual: 29 });
    }

    #[rstest]
    #[case(PdfSpec::Gamma { shape: 2.0, scale: -1.0 })]
    #[case(PdfSpec::Uniform { min: -1e308, max: 1e308 })]
    fn test_rejects_invalid_distribution_before_sampling(#[case] pdf: PdfSpec) {
        let err = SimulationRun::new(30, 1, pdf, history()).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_builder_defaults_and_overrides() {
        let run = SimulationRun::new(10, 7, PdfSpec::Normal { mean: 1.0, std: 1.0 }, history())
            .unwrap()
            .with_initial_state([("PVP", 15.0), ("II", 100.0)])
            .with_seed(8);
        assert_eq!(run.random_seed(), 8);
        assert_eq!(run.start_date(), NaiveDate::default());
        assert_eq!(run.perturbation().target, "DE");
        assert_eq!(run.initial_state().get("II"), Some(&100.0));
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
