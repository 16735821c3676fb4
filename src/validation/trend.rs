//! Ordinary least squares of a series against its time index.

use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Units per day.
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation with the day index.
    pub correlation: f64,
    pub r_squared: f64,
    pub direction: TrendDirection,
}

impl Trend {
    /// `relative_threshold` is a fraction of the series mean per day; slopes
    /// smaller in magnitude are `Stable`.
    pub fn fit(ys: &[f64], relative_threshold: f64) -> Self {
        let n = ys.len();
        if n < 2 {
            return Self::flat(ys.first().copied().unwrap_or(0.0));
        }

        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = ys.iter().sum::<f64>() / nf;

        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for (i, &y) in ys.iter().enumerate() {
            let dx = i as f64 - mean_x;
            let dy = y - mean_y;
            sxy += dx * dy;
            sxx += dx * dx;
            syy += dy * dy;
        }

        let slope = sxy / sxx;
        let correlation = if syy > 0.0 { sxy / (sxx * syy).sqrt() } else { 0.0 };
        let threshold = relative_threshold * mean_y.abs();

        let direction = if slope.abs() <= threshold {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        Self {
            slope,
            intercept: mean_y - slope * mean_x,
            correlation,
            r_squared: correlation * correlation,
            direction,
        }
    }

    fn flat(level: f64) -> Self {
        Self { slope: 0.0, intercept: level, correlation: 0.0, r_squared: 0.0, direction: TrendDirection::Stable }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_exact_line() {
        let ys: Vec<f64> = (0..10).map(|i| 100.0 + 5.0 * i as f64).collect();
        let t = Trend::fit(&ys, 0.001);
        assert!((t.slope - 5.0).abs() < 1e-12);
        assert!((t.intercept - 100.0).abs() < 1e-9);
        assert!((t.correlation - 1.0).abs() < 1e-12);
        assert_eq!(t.direction, TrendDirection::Increasing);
    }

    #[rstest]
    #[case(&[10.0, 8.0, 6.0, 4.0], TrendDirection::Decreasing)]
    #[case(&[1000.0, 1000.5, 999.8, 1000.2], TrendDirection::Stable)]
    #[case(&[5.0, 5.0, 5.0], TrendDirection::Stable)]
    #[case(&[7.0], TrendDirection::Stable)]
    fn test_direction(#[case] ys: &[f64], #[case] expected: TrendDirection) {
        assert_eq!(Trend::fit(ys, 0.001).direction, expected);
    }

    #[test]
    fn test_constant_series_has_zero_correlation() {
        let t = Trend::fit(&[3.0; 5], 0.001);
        assert_eq!((t.slope, t.correlation), (0.0, 0.0));
    }
}
