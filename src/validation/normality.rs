//! Goodness-of-fit tests: Shapiro-Wilk (Royston's approximation) for small
//! samples and Kolmogorov-Smirnov for large ones or arbitrary reference laws.

use crate::error::{SimResult, SimulationError};
use serde::{Serialize, Deserialize};
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::{PI, SQRT_2};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    ShapiroWilk,
    KolmogorovSmirnov,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitTest {
    pub method: TestMethod,
    pub statistic: f64,
    pub p_value: f64,
}

impl FitTest {
    pub fn is_plausible(&self, significance: f64) -> bool {
        self.p_value >= significance
    }
}

fn normal_upper_tail(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

fn normal_quantile(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Shapiro-Wilk W and its p-value. Needs at least 3 observations.
pub fn shapiro_wilk(data: &[f64]) -> SimResult<FitTest> {
    let n = data.len();
    if n < 3 {
        return Err(SimulationError::InsufficientSamples { required: 3, actual: n });
    }

    let mut x = data.to_vec();
    x.sort_by(f64::total_cmp);
    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    if ss <= 0.0 {
        warn!(n, "Shapiro-Wilk on a constant series, reporting W = 1");
        return Ok(FitTest { method: TestMethod::ShapiroWilk, statistic: 1.0, p_value: 1.0 });
    }

    let coefficients = sw_coefficients(n);
    let num: f64 = coefficients.iter().zip(&x).map(|(a, v)| a * v).sum();
    let w = (num * num / ss).min(1.0);

    Ok(FitTest { method: TestMethod::ShapiroWilk, statistic: w, p_value: sw_p_value(w, n) })
}

/// Antisymmetric weights a_1..a_n for sorted data.
fn sw_coefficients(n: usize) -> Vec<f64> {
    if n == 3 {
        let r = 0.5_f64.sqrt();
        return vec![-r, 0.0, r];
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n).map(|i| normal_quantile((i as f64 - 0.375) / (nf + 0.25))).collect();
    let summ2: f64 = m.iter().map(|v| v * v).sum();
    let ssumm2 = summ2.sqrt();
    let u = 1.0 / nf.sqrt();

    let mn = m[n - 1];
    let an = mn / ssumm2 + poly(&[0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056], u);

    let mut a = vec![0.0; n];
    if n > 5 {
        let mn1 = m[n - 2];
        let an1 = mn1 / ssumm2 + poly(&[0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633], u);
        let phi = (summ2 - 2.0 * mn * mn - 2.0 * mn1 * mn1) / (1.0 - 2.0 * an * an - 2.0 * an1 * an1);
        let scale = phi.sqrt();
        for i in 2..n - 2 {
            a[i] = m[i] / scale;
        }
        a[1] = -an1;
        a[n - 2] = an1;
    } else {
        let phi = (summ2 - 2.0 * mn * mn) / (1.0 - 2.0 * an * an);
        let scale = phi.sqrt();
        for i in 1..n - 1 {
            a[i] = m[i] / scale;
        }
    }
    a[0] = -an;
    a[n - 1] = an;
    a
}

fn sw_p_value(w: f64, n: usize) -> f64 {
    if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - 0.75_f64.sqrt().asin());
        return p.clamp(0.0, 1.0);
    }
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }

    let nf = n as f64;
    let z = if n <= 11 {
        let gamma = poly(&[-2.273, 0.459], nf);
        let y = w1.ln();
        if y >= gamma {
            return 1e-99;
        }
        let mu = poly(&[0.5440, -0.39978, 0.025054, -6.714e-4], nf);
        let sigma = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], nf).exp();
        (-(gamma - y).ln() - mu) / sigma
    } else {
        let ln_n = nf.ln();
        let mu = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], ln_n);
        let sigma = poly(&[-0.4803, -0.082676, 0.0030302], ln_n).exp();
        (w1.ln() - mu) / sigma
    };
    normal_upper_tail(z).clamp(0.0, 1.0)
}

/// One-sample KS statistic D against a reference CDF.
pub fn ks_statistic(data: &[f64], cdf: impl Fn(f64) -> f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut x = data.to_vec();
    x.sort_by(f64::total_cmp);
    let n = x.len() as f64;
    x.iter().enumerate().fold(0.0_f64, |d, (i, &v)| {
        let f = cdf(v);
        let lower = f - i as f64 / n;
        let upper = (i + 1) as f64 / n - f;
        d.max(lower).max(upper)
    })
}

/// Asymptotic Kolmogorov p-value with Stephens' small-sample correction.
pub fn kolmogorov_p_value(d: f64, effective_n: f64) -> f64 {
    if effective_n <= 0.0 {
        return 1.0;
    }
    let sqrt_n = effective_n.sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = (-2.0 * kf * kf * lambda * lambda).exp();
        sum += if k % 2 == 1 { term } else { -term };
        if term < 1e-12 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

pub fn kolmogorov_smirnov(data: &[f64], cdf: impl Fn(f64) -> f64) -> FitTest {
    let d = ks_statistic(data, cdf);
    FitTest {
        method: TestMethod::KolmogorovSmirnov,
        statistic: d,
        p_value: kolmogorov_p_value(d, data.len() as f64),
    }
}

/// KS against a normal law with the sample's own mean and std.
pub fn ks_normal(data: &[f64]) -> FitTest {
    let n = data.len();
    let mean = data.iter().sum::<f64>() / n.max(1) as f64;
    let var = if n > 1 { data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64 } else { 0.0 };
    if var <= 0.0 {
        warn!(n, "KS normality on a degenerate series");
        return FitTest { method: TestMethod::KolmogorovSmirnov, statistic: 0.0, p_value: 1.0 };
    }
    let std = var.sqrt();
    kolmogorov_smirnov(data, |x| 1.0 - normal_upper_tail((x - mean) / std))
}

/// Two-sample KS: largest gap between the empirical CDFs.
pub fn two_sample_ks(a: &[f64], b: &[f64]) -> FitTest {
    if a.is_empty() || b.is_empty() {
        return FitTest { method: TestMethod::KolmogorovSmirnov, statistic: 0.0, p_value: 1.0 };
    }
    let mut xa = a.to_vec();
    let mut xb = b.to_vec();
    xa.sort_by(f64::total_cmp);
    xb.sort_by(f64::total_cmp);
    let (na, nb) = (xa.len() as f64, xb.len() as f64);

    let (mut i, mut j, mut d) = (0, 0, 0.0_f64);
    while i < xa.len() && j < xb.len() {
        let v = xa[i].min(xb[j]);
        while i < xa.len() && xa[i] <= v {
            i += 1;
        }
        while j < xb.len() && xb[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / na - j as f64 / nb).abs());
    }

    FitTest {
        method: TestMethod::KolmogorovSmirnov,
        statistic: d,
        p_value: kolmogorov_p_value(d, na * nb / (na + nb)),
    }
}
