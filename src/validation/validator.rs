//! The validator: compares a simulated series with history and turns the
//! computed metrics into recommendations.
use super::descriptive::Descriptive;
use super::normality::{ks_normal, shapiro_wilk, two_sample_ks, FitTest};
use super::rules::{recommend, KpiMetrics, Recommendation};
use super::trend::Trend;
use crate::compute::{ResultSimulation, RunDiagnostics};
use crate::error::{SimResult, SimulationError};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

/// Shortest simulated series the normality tests accept.
pub const MIN_SIMULATED_DAYS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// p-values at or above this mark a plausible distribution.
    pub significance: f64,
    /// Shapiro-Wilk below this sample size, Kolmogorov-Smirnov from it on.
    pub shapiro_wilk_max_n: usize,
    /// Slopes under this fraction of the series mean per day count as stable.
    pub trend_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { significance: 0.05, shapiro_wilk_max_n: 50, trend_threshold: 0.001 }
    }
}

/// Which variables feed the KPI ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricBindings {
    pub profit: String,
    pub income: String,
    pub sold: String,
    pub demand: String,
    pub produced: String,
    pub capacity: String,
}

impl Default for MetricBindings {
    fn default() -> Self {
        Self {
            profit: "GO".into(),
            income: "IT".into(),
            sold: "TPV".into(),
            demand: "DE".into(),
            produced: "TPP".into(),
            capacity: "CPROD".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub significance: f64,
    /// Normality test on the simulated series.
    pub fit: FitTest,
    pub distribution_plausible: bool,
    /// Two-sample KS, history against simulation.
    pub comparison: FitTest,
    pub historical: Descriptive,
    pub simulated: Descriptive,
    pub historical_trend: Trend,
    pub simulated_trend: Trend,
    pub mean_deviation: f64,
    pub kpis: KpiMetrics,
    pub recommendations: Vec<Recommendation>,
    pub diagnostics: Option<RunDiagnostics>,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig { &self.config }

    /// Series-only validation. KPI ratios stay empty.
    pub fn validate(&self, historical: &[f64], simulated: &[f64]) -> SimResult<ValidationReport> {
        if simulated.len() < MIN_SIMULATED_DAYS {
            return Err(SimulationError::SimulationTooShort { required: MIN_SIMULATED_DAYS, actual: simulated.len() });
        }
        let fit = if simulated.len() < self.config.shapiro_wilk_max_n {
            shapiro_wilk(simulated)?
        } else {
            ks_normal(simulated)
        };
        let plausible = fit.is_plausible(self.config.significance);

        let historical_stats = Descriptive::of(historical);
        let simulated_stats = Descriptive::of(simulated);
        let historical_trend = Trend::fit(historical, self.config.trend_threshold);
        let simulated_trend = Trend::fit(simulated, self.config.trend_threshold);

        let mean_deviation = if historical_stats.mean != 0.0 {
            (simulated_stats.mean - historical_stats.mean).abs() / historical_stats.mean.abs()
        } else {
            warn!("historical mean is 0, mean deviation reported as 0");
            0.0
        };

        let kpis = KpiMetrics {
            mean_deviation: Some(mean_deviation),
            distribution_plausible: Some(plausible),
            historical_trend: Some(historical_trend.direction),
            simulated_trend: Some(simulated_trend.direction),
            ..Default::default()
        };
        debug!(method = ?fit.method, statistic = fit.statistic, p_value = fit.p_value, "fit test done");

        Ok(ValidationReport {
            significance: self.config.significance,
            fit,
            distribution_plausible: plausible,
            comparison: two_sample_ks(historical, simulated),
            historical: historical_stats,
            simulated: simulated_stats,
            historical_trend,
            simulated_trend,
            mean_deviation,
            recommendations: recommend(&kpis),
            kpis,
            diagnostics: None,
        })
    }

    /// Validates the demand series of a run and adds the business KPIs and
    /// the run's numerical diagnostics.
    pub fn validate_run(
        &self,
        historical: &[f64],
        result: &ResultSimulation,
        bindings: &MetricBindings,
    ) -> SimResult<ValidationReport> {
        let total = |initials: &str| {
            result.total(initials).ok_or_else(|| SimulationError::UnknownVariable(initials.to_string()))
        };
        let simulated = result.series(&bindings.demand)
            .ok_or_else(|| SimulationError::UnknownVariable(bindings.demand.clone()))?;

        let mut report = self.validate(historical, &simulated)?;
        report.kpis.profitability = ratio(total(&bindings.profit)?, total(&bindings.income)?);
        report.kpis.service_level = ratio(total(&bindings.sold)?, total(&bindings.demand)?);
        report.kpis.capacity_utilisation = ratio(total(&bindings.produced)?, total(&bindings.capacity)?);
        report.recommendations = recommend(&report.kpis);
        report.diagnostics = Some(result.diagnostics.clone());
        Ok(report)
    }
}

/// `None` when the denominator is zero; the matching rules then stay silent.
fn ratio(num: f64, den: f64) -> Option<f64> {
    (den != 0.0).then(|| num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{DailyResult, RunStatus};
    use crate::validation::normality::TestMethod;
    use crate::validation::rules::{Priority, RecommendationKind};
    use crate::validation::trend::TrendDirection;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};
    use std::collections::BTreeMap;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let law = Normal::new(2500.0, 250.0).unwrap();
        (0..n).map(|_| law.sample(&mut rng)).collect()
    }

    fn result(rows: &[(f64, f64, f64, f64, f64, f64)]) -> ResultSimulation {
        let days = rows.iter().enumerate().map(|(i, &(de, tpv, go, it, tpp, cprod))| DailyResult {
            day_index: i,
            date: NaiveDate::default(),
            values: BTreeMap::from([
                ("DE".to_string(), de),
                ("TPV".to_string(), tpv),
                ("GO".to_string(), go),
                ("IT".to_string(), it),
                ("TPP".to_string(), tpp),
                ("CPROD".to_string(), cprod),
            ]),
            diagnostics: Default::default(),
        }).collect();
        ResultSimulation {
            random_seed: 0,
            status: RunStatus::Completed,
            days,
            diagnostics: Default::default(),
            repairs: vec![],
        }
    }

    #[test]
    fn test_small_sample_uses_shapiro_wilk() {
        let report = Validator::default().validate(&noise(30, 1), &noise(30, 2)).unwrap();
        assert_eq!(report.fit.method, TestMethod::ShapiroWilk);
        assert!((0.0..=1.0).contains(&report.fit.p_value));
        assert_eq!(report.distribution_plausible, report.fit.p_value >= 0.05);
        assert_eq!(report.kpis.profitability, None);
        assert!(report.mean_deviation < 0.1);
    }

    #[test]
    fn test_large_sample_uses_ks() {
        let report = Validator::default().validate(&noise(30, 1), &noise(120, 2)).unwrap();
        assert_eq!(report.fit.method, TestMethod::KolmogorovSmirnov);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let v = Validator::new(ValidatorConfig { shapiro_wilk_max_n: 10, ..Default::default() });
        let report = v.validate(&noise(30, 1), &noise(30, 2)).unwrap();
        assert_eq!(report.fit.method, TestMethod::KolmogorovSmirnov);
    }

    #[test]
    fn test_trend_disagreement_is_reported() {
        let historical = vec![100.0; 30];
        let simulated: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
        let report = Validator::default().validate(&historical, &simulated).unwrap();
        assert_eq!(report.historical_trend.direction, TrendDirection::Stable);
        assert_eq!(report.simulated_trend.direction, TrendDirection::Increasing);
        assert!(report.recommendations.iter().any(|r| r.metric == "trend" && r.priority == Priority::Low));
        // Mean moved from 100 to 129.
        assert!(report.recommendations.iter().any(|r| r.metric == "mean_deviation"));
    }

    #[test]
    fn test_too_short_simulation_fails() {
        assert_eq!(
            Validator::default().validate(&noise(30, 1), &[1.0, 2.0]).unwrap_err(),
            SimulationError::SimulationTooShort { required: 3, actual: 2 }
        );
    }

    #[test]
    fn test_cancelled_two_day_run_names_the_simulation() {
        let mut r = result(&[(10.0, 9.0, 1.0, 10.0, 9.0, 20.0), (11.0, 10.0, 1.0, 11.0, 10.0, 20.0)]);
        r.status = RunStatus::Cancelled;
        let err = Validator::default()
            .validate_run(&noise(30, 1), &r, &MetricBindings::default())
            .unwrap_err();
        assert_eq!(err, SimulationError::SimulationTooShort { required: 3, actual: 2 });
        assert!(err.to_string().starts_with("Simulated series"));
    }

    #[test]
    fn test_validate_run_computes_kpis() {
        // Profitability 5/100, service 90/100, utilisation 90/200.
        let rows: Vec<_> = (0..10).map(|i| {
            let jitter = i as f64;
            (10.0 + jitter, 9.0 + jitter * 0.9, 0.5, 10.0, 9.0, 20.0)
        }).collect();
        let r = result(&rows);
        let report = Validator::default()
            .validate_run(&noise(30, 3), &r, &MetricBindings::default())
            .unwrap();

        assert!((report.kpis.profitability.unwrap() - 0.05).abs() < 1e-12);
        assert!((report.kpis.service_level.unwrap() - 0.9).abs() < 1e-12);
        assert!((report.kpis.capacity_utilisation.unwrap() - 0.45).abs() < 1e-12);

        let high: Vec<_> = report.recommendations.iter()
            .filter(|r| r.kind == RecommendationKind::Warning && r.priority == Priority::High)
            .map(|r| r.metric.as_str())
            .collect();
        assert_eq!(high, vec!["profitability"]);
        assert!(report.recommendations.iter().any(|r| r.metric == "capacity_utilisation"));
        assert!(report.diagnostics.is_some());
    }

    #[test]
    fn test_validate_run_unknown_binding() {
        let r = result(&[(1.0, 1.0, 1.0, 1.0, 1.0, 1.0); 5]);
        let bindings = MetricBindings { profit: "GAC".into(), ..Default::default() };
        assert_eq!(
            Validator::default().validate_run(&noise(30, 1), &r, &bindings).unwrap_err(),
            SimulationError::UnknownVariable("GAC".into())
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = Validator::default().validate(&noise(30, 1), &noise(30, 2)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fit"]["method"], "shapiro_wilk");
        assert!(json["simulated"]["kurtosis"].is_number());
    }
}
