//! Independent runs in parallel. Runs share only the immutable model; each
//! owns its registry clone and its generator, so no locking is needed and
//! results come back in input order.

use super::engine::Simulator;
use super::ledger::ResultSimulation;
use super::run::SimulationRun;
use crate::error::{SimResult, SimulationError};
use crate::validation::descriptive::{mean, percentile};
use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use tracing::info;

pub fn run_batch(simulator: &Simulator, runs: &[SimulationRun]) -> Vec<SimResult<ResultSimulation>> {
    info!(runs = runs.len(), "batch started");
    runs.par_iter().map(|run| simulator.run(run)).collect()
}

/// `count` copies of `run` with seeds `seed, seed + 1, ...`.
pub fn replicate(run: &SimulationRun, count: usize) -> Vec<SimulationRun> {
    (0..count as u64)
        .map(|i| run.clone().with_seed(run.random_seed().wrapping_add(i)))
        .collect()
}

/// Per-day spread of one variable across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub day_index: usize,
    pub mean: f64,
    pub p5: f64,
    pub p95: f64,
}

/// Bands over the days every result covers (cancelled runs may be shorter).
pub fn summarize_bands(results: &[ResultSimulation], initials: &str) -> SimResult<Vec<Band>> {
    let series = results.iter()
        .map(|r| r.series(initials).ok_or_else(|| SimulationError::UnknownVariable(initials.to_string())))
        .collect::<SimResult<Vec<_>>>()?;
    let days = series.iter().map(Vec::len).min().unwrap_or(0);

    Ok((0..days).map(|day| {
        let column: Vec<f64> = series.iter().map(|s| s[day]).collect();
        Band {
            day_index: day,
            mean: mean(&column),
            p5: percentile(&column, 0.05),
            p95: percentile(&column, 0.95),
        }
    }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dairy;
    use crate::sampling::PdfSpec;

    fn base_run() -> SimulationRun {
        SimulationRun::new(15, 100, PdfSpec::Normal { mean: 2500.0, std: 250.0 }, vec![2500.0; 30]).unwrap()
    }

    #[test]
    fn test_replicate_seeds() {
        let seeds: Vec<u64> = replicate(&base_run(), 3).iter().map(|r| r.random_seed()).collect();
        assert_eq!(seeds, vec![100, 101, 102]);
    }

    #[test]
    fn test_batch_matches_sequential_runs() {
        let sim = Simulator::new(dairy::model().unwrap());
        let runs = replicate(&base_run(), 4);
        let parallel: Vec<_> = run_batch(&sim, &runs).into_iter().map(|r| r.unwrap()).collect();
        for (run, result) in runs.iter().zip(&parallel) {
            assert_eq!(&sim.run(run).unwrap(), result);
        }
    }

    #[test]
    fn test_bands_bracket_the_mean() {
        let sim = Simulator::new(dairy::model().unwrap());
        let results: Vec<_> = run_batch(&sim, &replicate(&base_run(), 20))
            .into_iter()
            .collect::<SimResult<_>>()
            .unwrap();
        let bands = summarize_bands(&results, "DE").unwrap();
        assert_eq!(bands.len(), 15);
        for b in &bands {
            assert!(b.p5 <= b.mean && b.mean <= b.p95);
        }
        assert_eq!(
            summarize_bands(&results, "NOPE").unwrap_err(),
            SimulationError::UnknownVariable("NOPE".into())
        );
    }
}
