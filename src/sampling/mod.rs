//! Distribution sampling and fitting.
pub mod distribution;
pub mod fit;

pub use distribution::{cdf, pdf, sample, DistributionType, PdfSpec, Sampler};
pub use fit::{fit, fit_best, FittedDistribution};
