//! Statistical validation of simulated series.
pub mod descriptive;
pub mod normality;
pub mod rules;
pub mod trend;
pub mod validator;

pub use descriptive::Descriptive;
pub use normality::{FitTest, TestMethod};
pub use rules::{KpiMetrics, Priority, Recommendation, RecommendationKind};
pub use trend::{Trend, TrendDirection};
pub use validator::{MetricBindings, ValidationReport, Validator, ValidatorConfig};
