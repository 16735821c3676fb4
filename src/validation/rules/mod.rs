//! Recommendation rule table.
//!
//! Each rule is a pure function of the computed `KpiMetrics` and yields at most
//! one recommendation. Rules never look at raw series.

mod kpi;
mod statistics;

use crate::validation::trend::TrendDirection;
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Warning,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    /// Metric that triggered the rule.
    pub metric: String,
    pub message: String,
}

impl Recommendation {
    pub(crate) fn warning(priority: Priority, metric: &str, message: String) -> Self {
        Self { kind: RecommendationKind::Warning, priority, metric: metric.to_string(), message }
    }

    pub(crate) fn success(metric: &str, message: String) -> Self {
        Self { kind: RecommendationKind::Success, priority: Priority::Low, metric: metric.to_string(), message }
    }
}

/// Inputs of the rule table. Ratios are fractions (0.10 = 10%). A `None`
/// metric was not computed and its rules stay silent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KpiMetrics {
    /// Total profit over total income.
    pub profitability: Option<f64>,
    /// Units sold over units demanded.
    pub service_level: Option<f64>,
    /// Units produced over production capacity.
    pub capacity_utilisation: Option<f64>,
    /// |mean(simulated) - mean(historical)| / |mean(historical)|.
    pub mean_deviation: Option<f64>,
    pub distribution_plausible: Option<bool>,
    pub historical_trend: Option<TrendDirection>,
    pub simulated_trend: Option<TrendDirection>,
}

type Rule = fn(&KpiMetrics) -> Option<Recommendation>;

const RULES: &[Rule] = &[
    kpi::profitability,
    kpi::service_level,
    kpi::capacity_utilisation,
    statistics::mean_deviation,
    statistics::plausibility,
    statistics::trend_agreement,
];

/// Runs every rule in table order.
pub fn recommend(metrics: &KpiMetrics) -> Vec<Recommendation> {
    RULES.iter().filter_map(|rule| rule(metrics)).collect()
}
