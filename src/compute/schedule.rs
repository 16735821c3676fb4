//! Day-indexed rules for exogenous variables.

use crate::error::{SimResult, SimulationError};
use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

/// Multiplier applied to an exogenous variable's base value on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayProfile {
    #[default]
    Constant,
    /// One factor per weekday, Monday first.
    Weekly { factors: [f64; 7] },
    /// `1 + amplitude * sin(2π (day + phase_days) / period_days)`.
    Seasonal { amplitude: f64, period_days: f64, phase_days: f64 },
}

impl DayProfile {
    pub fn validate(&self) -> SimResult<()> {
        match self {
            DayProfile::Constant => Ok(()),
            DayProfile::Weekly { factors } => {
                if factors.iter().all(|f| f.is_finite() && *f >= 0.0) {
                    Ok(())
                } else {
                    Err(SimulationError::Config("weekly factors must be finite and >= 0".into()))
                }
            }
            DayProfile::Seasonal { amplitude, period_days, phase_days } => {
                if !(amplitude.is_finite() && phase_days.is_finite()) {
                    Err(SimulationError::Config("seasonal amplitude and phase must be finite".into()))
                } else if !(*period_days > 0.0) {
                    Err(SimulationError::Config("seasonal period must be > 0".into()))
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn factor(&self, day_index: usize, date: NaiveDate) -> f64 {
        match self {
            DayProfile::Constant => 1.0,
            DayProfile::Weekly { factors } => factors[date.weekday().num_days_from_monday() as usize],
            DayProfile::Seasonal { amplitude, period_days, phase_days } => {
                1.0 + amplitude * (2.0 * PI * (day_index as f64 + phase_days) / period_days).sin()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationMode {
    /// base × draw
    Multiplicative,
    /// base + draw
    Additive,
    /// The draw is the day's value.
    #[default]
    Replace,
}

/// Where the daily random draw lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    pub target: String,
    #[serde(default)]
    pub mode: PerturbationMode,
}

impl Default for Perturbation {
    fn default() -> Self {
        Self { target: "DE".to_string(), mode: PerturbationMode::Replace }
    }
}

impl Perturbation {
    pub fn new(target: &str, mode: PerturbationMode) -> Self {
        Self { target: target.to_string(), mode }
    }

    pub fn apply(&self, base: f64, draw: f64) -> f64 {
        match self.mode {
            PerturbationMode::Multiplicative => base * draw,
            PerturbationMode::Additive => base + draw,
            PerturbationMode::Replace => draw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekly_profile_keys_on_weekday() {
        let profile = DayProfile::Weekly { factors: [1.0, 1.0, 1.0, 1.0, 1.2, 1.5, 0.5] };
        // 2024-01-06 is a Saturday, 2024-01-07 a Sunday.
        assert_eq!(profile.factor(0, date(2024, 1, 6)), 1.5);
        assert_eq!(profile.factor(1, date(2024, 1, 7)), 0.5);
        assert_eq!(profile.factor(2, date(2024, 1, 8)), 1.0);
    }

    #[test]
    fn test_seasonal_profile() {
        let profile = DayProfile::Seasonal { amplitude: 0.2, period_days: 28.0, phase_days: 0.0 };
        let d = NaiveDate::default();
        assert!((profile.factor(0, d) - 1.0).abs() < 1e-12);
        assert!((profile.factor(7, d) - 1.2).abs() < 1e-12);
        assert!((profile.factor(21, d) - 0.8).abs() < 1e-12);
    }

    #[rstest]
    #[case(DayProfile::Seasonal { amplitude: 0.1, period_days: 0.0, phase_days: 0.0 })]
    #[case(DayProfile::Seasonal { amplitude: f64::NAN, period_days: 7.0, phase_days: 0.0 })]
    #[case(DayProfile::Weekly { factors: [1.0, 1.0, -1.0, 1.0, 1.0, 1.0, 1.0] })]
    fn test_invalid_profiles(#[case] profile: DayProfile) {
        assert!(matches!(profile.validate(), Err(SimulationError::Config(_))));
    }

    #[rstest]
    #[case(PerturbationMode::Multiplicative, 200.0)]
    #[case(PerturbationMode::Additive, 102.0)]
    #[case(PerturbationMode::Replace, 2.0)]
    fn test_perturbation_modes(#[case] mode: PerturbationMode, #[case] expected: f64) {
        assert_eq!(Perturbation::new("DE", mode).apply(100.0, 2.0), expected);
    }

    #[test]
    fn test_default_perturbation_replaces_demand() {
        let p = Perturbation::default();
        assert_eq!((p.target.as_str(), p.mode), ("DE", PerturbationMode::Replace));
    }
}
