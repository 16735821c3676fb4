//! Parameter estimation from a historical series.

use super::distribution::{DistributionType, PdfSpec, Sampler};
use crate::error::{SimResult, SimulationError};
use crate::validation::descriptive::{mean, sample_std};
use crate::validation::normality::kolmogorov_smirnov;
use serde::{Serialize, Deserialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedDistribution {
    pub spec: PdfSpec,
    pub ks_statistic: f64,
    pub p_value: f64,
}

/// Method-of-moments fit (log-moments for LogNormal, range for Uniform).
pub fn fit(kind: DistributionType, data: &[f64]) -> SimResult<PdfSpec> {
    let fail = |reason: &str| Err(SimulationError::invalid_parameter(kind.to_string(), reason));

    if data.len() < 2 {
        return fail("need at least two observations to fit");
    }
    if data.iter().any(|v| !v.is_finite()) {
        return fail("data contains non-finite values");
    }
    let positive = data.iter().all(|&v| v > 0.0);

    let spec = match kind {
        DistributionType::Normal => PdfSpec::Normal { mean: mean(data), std: sample_std(data) },
        DistributionType::Exponential => {
            if !positive {
                return fail("exponential fit requires positive data");
            }
            PdfSpec::Exponential { lambda: 1.0 / mean(data) }
        }
        DistributionType::LogNormal => {
            if !positive {
                return fail("log-normal fit requires positive data");
            }
            let logs: Vec<f64> = data.iter().map(|v| v.ln()).collect();
            PdfSpec::LogNormal { mean_log: mean(&logs), std_log: sample_std(&logs) }
        }
        DistributionType::Gamma => {
            if !positive {
                return fail("gamma fit requires positive data");
            }
            let m = mean(data);
            let v = sample_std(data).powi(2);
            PdfSpec::Gamma { shape: m * m / v, scale: v / m }
        }
        DistributionType::Uniform => {
            let lo = data.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            PdfSpec::Uniform { min: lo, max: hi }
        }
    };

    // Constant data lands here (std = 0, min == max).
    spec.validate()?;
    Ok(spec)
}

/// Fits every family the data admits and ranks them by KS distance, best first.
pub fn fit_best(data: &[f64]) -> SimResult<Vec<FittedDistribution>> {
    let mut ranked = Vec::new();
    for kind in DistributionType::ALL {
        let spec = match fit(kind, data) {
            Ok(spec) => spec,
            Err(e) => {
                debug!(%kind, error = %e, "Skipping family");
                continue;
            }
        };
        let sampler = Sampler::new(spec)?;
        let test = kolmogorov_smirnov(data, |x| sampler.cdf(x));
        ranked.push(FittedDistribution { spec, ks_statistic: test.statistic, p_value: test.p_value });
    }

    if ranked.is_empty() {
        return Err(SimulationError::invalid_parameter("any", "no distribution family fits the data"));
    }
    ranked.sort_by(|a, b| a.ks_statistic.total_cmp(&b.ks_statistic));
    Ok(ranked)
}
