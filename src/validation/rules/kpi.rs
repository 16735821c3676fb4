//! Business KPI thresholds.

use super::{KpiMetrics, Priority, Recommendation};

const PROFITABILITY_LOW: f64 = 0.10;
const PROFITABILITY_GOOD: f64 = 0.20;
const SERVICE_LOW: f64 = 0.80;
const SERVICE_GOOD: f64 = 0.95;
const UTILISATION_LOW: f64 = 0.50;
const UTILISATION_HIGH: f64 = 0.95;

fn pct(x: f64) -> String {
    format!("{:.1}%", x * 100.0)
}

pub(super) fn profitability(m: &KpiMetrics) -> Option<Recommendation> {
    let p = m.profitability?;
    if p < PROFITABILITY_LOW {
        Some(Recommendation::warning(
            Priority::High,
            "profitability",
            format!("Average profitability is {}, below {}. Review prices and operating costs.", pct(p), pct(PROFITABILITY_LOW)),
        ))
    } else if p >= PROFITABILITY_GOOD {
        Some(Recommendation::success("profitability", format!("Healthy profitability of {}.", pct(p))))
    } else {
        None
    }
}

pub(super) fn service_level(m: &KpiMetrics) -> Option<Recommendation> {
    let s = m.service_level?;
    if s < SERVICE_LOW {
        Some(Recommendation::warning(
            Priority::High,
            "service_level",
            format!("Only {} of demand is served. Increase production or safety stock.", pct(s)),
        ))
    } else if s >= SERVICE_GOOD {
        Some(Recommendation::success("service_level", format!("Demand is met at a {} service level.", pct(s))))
    } else {
        None
    }
}

pub(super) fn capacity_utilisation(m: &KpiMetrics) -> Option<Recommendation> {
    let u = m.capacity_utilisation?;
    if u < UTILISATION_LOW {
        Some(Recommendation::warning(
            Priority::Medium,
            "capacity_utilisation",
            format!("Production capacity is {} utilised. Consider downsizing capacity.", pct(u)),
        ))
    } else if u > UTILISATION_HIGH {
        Some(Recommendation::warning(
            Priority::Medium,
            "capacity_utilisation",
            format!("Production runs at {} of capacity. Little slack for demand peaks.", pct(u)),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::RecommendationKind;
    use rstest::rstest;

    #[rstest]
    #[case(0.05, Some((RecommendationKind::Warning, Priority::High)))]
    #[case(0.10, None)]
    #[case(0.15, None)]
    #[case(0.20, Some((RecommendationKind::Success, Priority::Low)))]
    fn test_profitability_thresholds(#[case] p: f64, #[case] expected: Option<(RecommendationKind, Priority)>) {
        let m = KpiMetrics { profitability: Some(p), ..Default::default() };
        assert_eq!(profitability(&m).map(|r| (r.kind, r.priority)), expected);
    }

    #[rstest]
    #[case(0.79, Some((RecommendationKind::Warning, Priority::High)))]
    #[case(0.90, None)]
    #[case(0.95, Some((RecommendationKind::Success, Priority::Low)))]
    fn test_service_level_thresholds(#[case] s: f64, #[case] expected: Option<(RecommendationKind, Priority)>) {
        let m = KpiMetrics { service_level: Some(s), ..Default::default() };
        assert_eq!(service_level(&m).map(|r| (r.kind, r.priority)), expected);
    }

    #[rstest]
    #[case(0.30, true)]
    #[case(0.70, false)]
    #[case(0.99, true)]
    fn test_utilisation_band(#[case] u: f64, #[case] warns: bool) {
        let m = KpiMetrics { capacity_utilisation: Some(u), ..Default::default() };
        let r = capacity_utilisation(&m);
        assert_eq!(r.is_some(), warns);
        if let Some(r) = r {
            assert_eq!(r.priority, Priority::Medium);
        }
    }
}
