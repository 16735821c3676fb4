//! Rules on how well the simulation reproduces history.

use super::{KpiMetrics, Priority, Recommendation};

const MEAN_DEVIATION_LIMIT: f64 = 0.15;

pub(super) fn mean_deviation(m: &KpiMetrics) -> Option<Recommendation> {
    let d = m.mean_deviation?;
    (d > MEAN_DEVIATION_LIMIT).then(|| {
        Recommendation::warning(
            Priority::Medium,
            "mean_deviation",
            format!("Simulated mean deviates {:.1}% from history. Recalibrate the demand distribution.", d * 100.0),
        )
    })
}

pub(super) fn plausibility(m: &KpiMetrics) -> Option<Recommendation> {
    match m.distribution_plausible? {
        true => None,
        false => Some(Recommendation::warning(
            Priority::Medium,
            "distribution",
            "Simulated series fails the goodness-of-fit test. Try another distribution family.".to_string(),
        )),
    }
}

pub(super) fn trend_agreement(m: &KpiMetrics) -> Option<Recommendation> {
    let (hist, sim) = (m.historical_trend?, m.simulated_trend?);
    (hist != sim).then(|| {
        Recommendation::warning(
            Priority::Low,
            "trend",
            format!("Historical trend is {:?} but the simulation is {:?}.", hist, sim).to_lowercase(),
        )
    })
}
