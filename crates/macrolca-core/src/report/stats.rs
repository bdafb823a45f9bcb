//! Descriptive statistics and log-log regression.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Linear-interpolated quantile of sorted data; `q` in `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(f64::total_cmp);
    v
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBase {
    Log10,
    Ln,
}

impl LogBase {
    pub fn name(&self) -> &'static str {
        match self {
            LogBase::Log10 => "log10",
            LogBase::Ln => "ln",
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        match self {
            LogBase::Log10 => x.log10(),
            LogBase::Ln => x.ln(),
        }
    }

    pub fn base(&self) -> f64 {
        match self {
            LogBase::Log10 => 10.0,
            LogBase::Ln => std::f64::consts::E,
        }
    }
}

/// Least-squares fit of `log(y) = a + b * log(x)`, i.e. `y = k * x^b`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub n: usize,
    pub r: f64,
    /// Two-sided p-value of `r` against no correlation.
    pub p: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    pub b: f64,
    pub a: f64,
    pub k_backtransform: f64,
}

impl Regression {
    /// Fitted `y` in the original (untransformed) space.
    pub fn predict(&self, x: f64) -> f64 {
        self.k_backtransform * x.powf(self.b)
    }
}

/// Fit on the pairs where both values are strictly positive.
///
/// `None` when fewer than two such pairs remain or all `x` are equal.
pub fn log_regression(pairs: &[(f64, f64)], base: LogBase) -> Option<Regression> {
    let pts: Vec<(f64, f64)> = pairs
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite() && *x > 0.0 && *y > 0.0)
        .map(|(x, y)| (base.apply(*x), base.apply(*y)))
        .collect();
    let n = pts.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mx = pts.iter().map(|p| p.0).sum::<f64>() / nf;
    let my = pts.iter().map(|p| p.1).sum::<f64>() / nf;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in &pts {
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
        sxy += (x - mx) * (y - my);
    }
    if sxx == 0.0 {
        return None;
    }
    let b = sxy / sxx;
    let a = my - b * mx;
    let r = if syy > 0.0 { sxy / (sxx * syy).sqrt() } else { f64::NAN };
    let ss_res: f64 = pts.iter().map(|(x, y)| (y - (a + b * x)).powi(2)).sum();
    let r2 = if syy > 0.0 { 1.0 - ss_res / syy } else { f64::NAN };
    Some(Regression {
        n,
        r,
        p: correlation_p_value(r, n),
        r2,
        b,
        a,
        k_backtransform: base.base().powf(a),
    })
}

/// Two-sided p-value of a Pearson correlation `r` over `n` pairs, from a
/// Student t distribution with `n - 2` degrees of freedom.
///
/// Two pairs always correlate perfectly and give `1.0`.
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if r.is_nan() {
        return f64::NAN;
    }
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Median, sample standard deviation, min and max; `NaN` where undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

pub fn describe(values: &[f64]) -> Summary {
    let v = sorted_finite(values);
    let n = v.len();
    let median = quantile(&v, 0.5).unwrap_or(f64::NAN);
    let std = if n > 1 {
        let mean = v.iter().sum::<f64>() / n as f64;
        (v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };
    Summary {
        median,
        std,
        min: v.first().copied().unwrap_or(f64::NAN),
        max: v.last().copied().unwrap_or(f64::NAN),
    }
}

/// Scientific notation with two decimals and a two-digit signed exponent,
/// e.g. `1.23e-03`.
pub fn format_sci(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let s = format!("{x:.2e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.5), Some(2.5));
        assert_eq!(quantile(&v, 0.25), Some(1.75));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_exact_power_law() {
        // y = 3 * x^2
        let pairs: Vec<(f64, f64)> = [1.0, 10.0, 100.0, 1000.0].iter().map(|x| (*x, 3.0 * x * x)).collect();
        let r = log_regression(&pairs, LogBase::Log10).unwrap();
        assert_eq!(r.n, 4);
        assert!((r.b - 2.0).abs() < 1e-9);
        assert!((r.k_backtransform - 3.0).abs() < 1e-9);
        assert!((r.r - 1.0).abs() < 1e-9);
        assert!((r.r2 - 1.0).abs() < 1e-9);
        assert!(r.p < 1e-9);

        let ln = log_regression(&pairs, LogBase::Ln).unwrap();
        assert!((ln.b - 2.0).abs() < 1e-9);
        assert!((ln.k_backtransform - 3.0).abs() < 1e-9);
        assert!((ln.predict(10.0) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_correlation_p_value() {
        assert!((correlation_p_value(0.5, 10) - 0.141113).abs() < 1e-5);
        assert!((correlation_p_value(-0.9, 5) - 0.037386).abs() < 1e-5);
        assert_eq!(correlation_p_value(0.3, 2), 1.0);
        assert_eq!(correlation_p_value(1.0, 4), 0.0);
        assert!(correlation_p_value(f64::NAN, 4).is_nan());
    }

    #[test]
    fn test_regression_reports_p() {
        let pairs = [(1.0, 2.0), (10.0, 11.0), (100.0, 400.0), (1000.0, 900.0), (1e4, 2e5)];
        let r = log_regression(&pairs, LogBase::Log10).unwrap();
        assert!(r.p > 0.0 && r.p < 0.05);
        assert_eq!(r.p, correlation_p_value(r.r, 5));
    }

    #[test]
    fn test_regression_skips_non_positive() {
        let pairs = [(0.0, 1.0), (-1.0, 2.0), (1.0, 1.0), (2.0, 4.0)];
        let r = log_regression(&pairs, LogBase::Log10).unwrap();
        assert_eq!(r.n, 2);
        assert!(log_regression(&[(1.0, 1.0)], LogBase::Ln).is_none());
    }

    #[test]
    fn test_describe_sample_std() {
        let s = describe(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.median, 4.5);
        assert!((s.std - 2.138089935).abs() < 1e-6);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!(describe(&[]).median.is_nan());
        assert!(describe(&[1.0]).std.is_nan());
    }

    #[test]
    fn test_format_sci() {
        assert_eq!(format_sci(0.001234), "1.23e-03");
        assert_eq!(format_sci(12345.0), "1.23e+04");
        assert_eq!(format_sci(0.0), "0.00e+00");
        assert_eq!(format_sci(f64::NAN), "nan");
    }
}
