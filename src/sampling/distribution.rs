//! Probability distribution specifications and the seeded sampler.
//!
//! Variates come from `rand_distr`; CDF/PDF values from `statrs`. The sampler
//! never owns a generator: callers pass one in, so a run is reproducible from
//! its seed alone.

use crate::error::{SimResult, SimulationError};
use rand::Rng;
use rand_distr::{
    Distribution, Exp as ExpVariate, Gamma as GammaVariate, LogNormal as LogNormalVariate,
    Normal as NormalVariate, Uniform as UniformVariate,
};
use serde::{Serialize, Deserialize};
use statrs::distribution::{
    Continuous, ContinuousCDF, Exp as ExpLaw, Gamma as GammaLaw, LogNormal as LogNormalLaw,
    Normal as NormalLaw, Uniform as UniformLaw,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionType {
    Normal,
    Exponential,
    LogNormal,
    Gamma,
    Uniform,
}

impl DistributionType {
    pub const ALL: [DistributionType; 5] = [
        DistributionType::Normal,
        DistributionType::Exponential,
        DistributionType::LogNormal,
        DistributionType::Gamma,
        DistributionType::Uniform,
    ];

    /// Parameter keys expected by `PdfSpec::from_params`.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            DistributionType::Normal => &["mean", "std"],
            DistributionType::Exponential => &["lambda"],
            DistributionType::LogNormal => &["mean_log", "std_log"],
            DistributionType::Gamma => &["shape", "scale"],
            DistributionType::Uniform => &["min", "max"],
        }
    }
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DistributionType::Normal => "Normal",
            DistributionType::Exponential => "Exponential",
            DistributionType::LogNormal => "LogNormal",
            DistributionType::Gamma => "Gamma",
            DistributionType::Uniform => "Uniform",
        };
        f.write_str(s)
    }
}

impl FromStr for DistributionType {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "normal" => Ok(DistributionType::Normal),
            "exponential" | "exponencial" => Ok(DistributionType::Exponential),
            "lognormal" => Ok(DistributionType::LogNormal),
            "gamma" => Ok(DistributionType::Gamma),
            "uniform" | "uniforme" => Ok(DistributionType::Uniform),
            _ => Err(SimulationError::invalid_parameter(s, "unknown distribution type")),
        }
    }
}

/// A distribution type with its fitted parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PdfSpec {
    Normal { mean: f64, std: f64 },
    Exponential { lambda: f64 },
    LogNormal { mean_log: f64, std_log: f64 },
    Gamma { shape: f64, scale: f64 },
    Uniform { min: f64, max: f64 },
}

impl PdfSpec {
    pub fn distribution_type(&self) -> DistributionType {
        match self {
            PdfSpec::Normal { .. } => DistributionType::Normal,
            PdfSpec::Exponential { .. } => DistributionType::Exponential,
            PdfSpec::LogNormal { .. } => DistributionType::LogNormal,
            PdfSpec::Gamma { .. } => DistributionType::Gamma,
            PdfSpec::Uniform { .. } => DistributionType::Uniform,
        }
    }

    /// Builds a spec from the key/value form used by simulation requests.
    pub fn from_params(kind: DistributionType, params: &HashMap<String, f64>) -> SimResult<Self> {
        let get = |key: &str| {
            params.get(key).copied().ok_or_else(|| {
                SimulationError::invalid_parameter(kind.to_string(), format!("missing parameter '{}'", key))
            })
        };
        let spec = match kind {
            DistributionType::Normal => PdfSpec::Normal { mean: get("mean")?, std: get("std")? },
            DistributionType::Exponential => PdfSpec::Exponential { lambda: get("lambda")? },
            DistributionType::LogNormal => PdfSpec::LogNormal { mean_log: get("mean_log")?, std_log: get("std_log")? },
            DistributionType::Gamma => PdfSpec::Gamma { shape: get("shape")?, scale: get("scale")? },
            DistributionType::Uniform => PdfSpec::Uniform { min: get("min")?, max: get("max")? },
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn params(&self) -> BTreeMap<String, f64> {
        let pairs: Vec<(&str, f64)> = match *self {
            PdfSpec::Normal { mean, std } => vec![("mean", mean), ("std", std)],
            PdfSpec::Exponential { lambda } => vec![("lambda", lambda)],
            PdfSpec::LogNormal { mean_log, std_log } => vec![("mean_log", mean_log), ("std_log", std_log)],
            PdfSpec::Gamma { shape, scale } => vec![("shape", shape), ("scale", scale)],
            PdfSpec::Uniform { min, max } => vec![("min", min), ("max", max)],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    /// Checks every parameter against its domain.
    pub fn validate(&self) -> SimResult<()> {
        let fail = |reason: &str| Err(SimulationError::invalid_parameter(self.distribution_type().to_string(), reason));
        let finite = self.params().values().all(|v| v.is_finite());
        if !finite {
            return fail("parameters must be finite");
        }
        match *self {
            PdfSpec::Normal { std, .. } if std <= 0.0 => fail("std must be > 0"),
            PdfSpec::Exponential { lambda } if lambda <= 0.0 => fail("lambda must be > 0"),
            PdfSpec::LogNormal { std_log, .. } if std_log <= 0.0 => fail("std_log must be > 0"),
            PdfSpec::Gamma { shape, scale } if shape <= 0.0 || scale <= 0.0 => fail("shape and scale must be > 0"),
            PdfSpec::Uniform { min, max } if min >= max => fail("min must be < max"),
            PdfSpec::Uniform { min, max } if !(max - min).is_finite() => fail("range must be finite"),
            _ => Ok(()),
        }
    }

    /// Theoretical mean.
    pub fn mean(&self) -> f64 {
        match *self {
            PdfSpec::Normal { mean, .. } => mean,
            PdfSpec::Exponential { lambda } => 1.0 / lambda,
            PdfSpec::LogNormal { mean_log, std_log } => (mean_log + std_log * std_log / 2.0).exp(),
            PdfSpec::Gamma { shape, scale } => shape * scale,
            PdfSpec::Uniform { min, max } => (min + max) / 2.0,
        }
    }
}

#[derive(Debug, Clone)]
enum Variate {
    Normal(NormalVariate<f64>),
    Exponential(ExpVariate<f64>),
    LogNormal(LogNormalVariate<f64>),
    Gamma(GammaVariate<f64>),
    Uniform(UniformVariate<f64>),
}

#[derive(Debug, Clone)]
enum Law {
    Normal(NormalLaw),
    Exponential(ExpLaw),
    LogNormal(LogNormalLaw),
    Gamma(GammaLaw),
    Uniform(UniformLaw),
}

/// A validated distribution, ready to draw from and to evaluate.
#[derive(Debug, Clone)]
pub struct Sampler {
    spec: PdfSpec,
    variate: Variate,
    law: Law,
}

impl Sampler {
    /// Fails with `InvalidParameter` before any sampling can happen.
    pub fn new(spec: PdfSpec) -> SimResult<Self> {
        spec.validate()?;
        let name = spec.distribution_type().to_string();
        let bad = |e: String| SimulationError::invalid_parameter(name.clone(), e);

        let (variate, law) = match spec {
            PdfSpec::Normal { mean, std } => (
                Variate::Normal(NormalVariate::new(mean, std).map_err(|e| bad(e.to_string()))?),
                Law::Normal(NormalLaw::new(mean, std).map_err(|e| bad(e.to_string()))?),
            ),
            PdfSpec::Exponential { lambda } => (
                Variate::Exponential(ExpVariate::new(lambda).map_err(|e| bad(e.to_string()))?),
                Law::Exponential(ExpLaw::new(lambda).map_err(|e| bad(e.to_string()))?),
            ),
            PdfSpec::LogNormal { mean_log, std_log } => (
                Variate::LogNormal(LogNormalVariate::new(mean_log, std_log).map_err(|e| bad(e.to_string()))?),
                Law::LogNormal(LogNormalLaw::new(mean_log, std_log).map_err(|e| bad(e.to_string()))?),
            ),
            PdfSpec::Gamma { shape, scale } => (
                Variate::Gamma(GammaVariate::new(shape, scale).map_err(|e| bad(e.to_string()))?),
                // statrs parameterises Gamma by rate.
                Law::Gamma(GammaLaw::new(shape, 1.0 / scale).map_err(|e| bad(e.to_string()))?),
            ),
            PdfSpec::Uniform { min, max } => (
                Variate::Uniform(UniformVariate::new(min, max)),
                Law::Uniform(UniformLaw::new(min, max).map_err(|e| bad(e.to_string()))?),
            ),
        };
        Ok(Self { spec, variate, law })
    }

    pub fn spec(&self) -> &PdfSpec { &self.spec }

    pub fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.variate {
            Variate::Normal(d) => d.sample(rng),
            Variate::Exponential(d) => d.sample(rng),
            Variate::LogNormal(d) => d.sample(rng),
            Variate::Gamma(d) => d.sample(rng),
            Variate::Uniform(d) => d.sample(rng),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.sample_one(rng)).collect()
    }

    /// Cumulative probability, in [0, 1].
    pub fn cdf(&self, x: f64) -> f64 {
        let p = match &self.law {
            Law::Normal(d) => d.cdf(x),
            Law::Exponential(d) => d.cdf(x),
            Law::LogNormal(d) => d.cdf(x),
            Law::Gamma(d) => d.cdf(x),
            Law::Uniform(d) => d.cdf(x),
        };
        p.clamp(0.0, 1.0)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        match &self.law {
            Law::Normal(d) => d.pdf(x),
            Law::Exponential(d) => d.pdf(x),
            Law::LogNormal(d) => d.pdf(x),
            Law::Gamma(d) => d.pdf(x),
            Law::Uniform(d) => d.pdf(x),
        }
    }
}

/// Draws `count` variates from `spec` using the caller's generator.
pub fn sample<R: Rng + ?Sized>(spec: PdfSpec, count: usize, rng: &mut R) -> SimResult<Vec<f64>> {
    Ok(Sampler::new(spec)?.sample(rng, count))
}

pub fn cdf(spec: PdfSpec, x: f64) -> SimResult<f64> {
    Ok(Sampler::new(spec)?.cdf(x))
}

pub fn pdf(spec: PdfSpec, x: f64) -> SimResult<f64> {
    Ok(Sampler::new(spec)?.pdf(x))
}
