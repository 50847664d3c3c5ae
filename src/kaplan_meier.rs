//! kaplan-meier product-limit estimator w/ greenwood variance and
//! log-log pointwise confidence intervals

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::info;

use crate::error::{Result, SurvivalError};

/// one step of the survival curve, at a distinct event time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KaplanMeierStep {
    pub time: f64,
    /// number at risk just before `time`
    pub n_at_risk: usize,
    pub n_events: usize,
    pub n_censored: usize,
    /// S(t) just after `time`
    pub survival: f64,
    /// greenwood variance of S(t)
    pub variance: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// fitted kaplan-meier curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KaplanMeierEstimate {
    pub steps: Vec<KaplanMeierStep>,
    /// first time S(t) <= 0.5, `None` if the curve never gets there
    pub median: Option<f64>,
    pub conf_level: f64,
    pub n: usize,
    pub n_events: usize,
}

impl KaplanMeierEstimate {
    /// S(t) as a right-continuous step function
    pub fn survival_at(&self, t: f64) -> f64 {
        let idx = self.steps.partition_point(|s| s.time <= t);
        if idx == 0 { 1.0 } else { self.steps[idx - 1].survival }
    }

    /// (time, S(time)) pairs starting at (0, 1)
    pub fn timeline(&self) -> Vec<(f64, f64)> {
        std::iter::once((0.0, 1.0))
            .chain(self.steps.iter().map(|s| (s.time, s.survival)))
            .collect()
    }

    /// print the survival table
    pub fn print(&self) {
        println!("kaplan-meier estimate ({} subjects, {} events)", self.n, self.n_events);
        println!("=============================================");
        let pct = (self.conf_level * 100.0).round();
        println!("{:>8} {:>8} {:>8} {:>8} {:>10} {:>10} {:>10}",
                 "time", "at risk", "events", "censored", "survival",
                 format!("lower {}", pct), format!("upper {}", pct));
        for s in &self.steps {
            println!("{:>8.1} {:>8} {:>8} {:>8} {:>10.4} {:>10.4} {:>10.4}",
                     s.time, s.n_at_risk, s.n_events, s.n_censored, s.survival, s.ci_lower, s.ci_upper);
        }
        match self.median {
            Some(m) => println!("median survival: {}", m),
            None => println!("median survival: not reached"),
        }
    }
}

/// fitter config - just the CI level for now
#[derive(Debug, Clone)]
pub struct KaplanMeierFitter {
    conf_level: f64,
}

impl Default for KaplanMeierFitter {
    fn default() -> Self {
        Self { conf_level: 0.95 }
    }
}

impl KaplanMeierFitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conf_level(mut self, conf_level: f64) -> Self {
        self.conf_level = conf_level;
        self
    }

    /// fit the curve from durations & event flags (true = event, false = censored)
    pub fn fit(&self, times: &[f64], events: &[bool]) -> Result<KaplanMeierEstimate> {
        if times.is_empty() {
            return Err(SurvivalError::invalid_survival_data("need at least one duration"));
        }
        if times.len() != events.len() {
            return Err(SurvivalError::invalid_dimensions(
                format!("times len ({}) != events len ({})", times.len(), events.len())
            ));
        }
        // same rule as SurvivalData: the curve starts at (0, 1)
        if times.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(SurvivalError::invalid_survival_data("durations must be positive & finite"));
        }
        if !(self.conf_level > 0.0 && self.conf_level < 1.0) {
            return Err(SurvivalError::invalid_parameter("conf_level", self.conf_level));
        }

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?
            .inverse_cdf(1.0 - (1.0 - self.conf_level) / 2.0);

        let n = times.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut steps = Vec::new();
        let mut n_at_risk = n;
        let mut survival = 1.0_f64;
        let mut greenwood_sum = 0.0_f64;

        let mut i = 0;
        while i < n {
            let t = times[order[i]];
            let (mut d, mut c) = (0usize, 0usize);
            while i < n && times[order[i]] == t {
                if events[order[i]] { d += 1 } else { c += 1 }
                i += 1;
            }

            if d > 0 {
                let (nj, dj) = (n_at_risk as f64, d as f64);
                survival *= 1.0 - dj / nj;
                if nj > dj {
                    greenwood_sum += dj / (nj * (nj - dj));
                }
                let (ci_lower, ci_upper) = log_log_interval(survival, greenwood_sum, z);

                steps.push(KaplanMeierStep {
                    time: t,
                    n_at_risk,
                    n_events: d,
                    n_censored: c,
                    survival,
                    variance: survival * survival * greenwood_sum,
                    ci_lower,
                    ci_upper,
                });
            }
            n_at_risk -= d + c;
        }

        let median = steps.iter().find(|s| s.survival <= 0.5).map(|s| s.time);
        let n_events = events.iter().filter(|&&e| e).count();

        info!(n, n_events, median = ?median, "kaplan-meier fitted");

        Ok(KaplanMeierEstimate { steps, median, conf_level: self.conf_level, n, n_events })
    }
}

/// exp(-exp(log(-log S) -/+ z * se)) - stays inside [0, 1] by construction
fn log_log_interval(survival: f64, greenwood_sum: f64, z: f64) -> (f64, f64) {
    if survival <= 0.0 {
        return (0.0, 0.0);
    }
    if survival >= 1.0 {
        return (1.0, 1.0);
    }
    let log_h = (-survival.ln()).ln();
    let se = greenwood_sum.sqrt() / survival.ln().abs();
    let lower = (-(log_h + z * se).exp()).exp();
    let upper = (-(log_h - z * se).exp()).exp();
    (lower.clamp(0.0, 1.0), upper.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_textbook_example() {
        // durations 1..6, censored at 3 and 5
        let times = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let events = vec![true, true, false, true, false, true];
        let km = KaplanMeierFitter::new().fit(&times, &events).unwrap();

        assert_eq!(km.steps.len(), 4);
        assert_relative_eq!(km.steps[0].survival, 5.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(km.steps[1].survival, 4.0 / 6.0, epsilon = 1e-12);
        assert_eq!(km.steps[2].n_at_risk, 3);
        assert_relative_eq!(km.steps[2].survival, 4.0 / 6.0 * 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(km.steps[3].survival, 0.0, epsilon = 1e-12);
        assert_eq!(km.median, Some(4.0));
        assert_eq!(km.n_events, 4);
    }

    #[test]
    fn test_greenwood_variance() {
        let km = KaplanMeierFitter::new()
            .fit(&[1.0, 2.0, 3.0, 4.0], &[true, false, true, false])
            .unwrap();

        // S(1) = 3/4, var = S^2 * 1/(4*3)
        let s = 0.75;
        assert_relative_eq!(km.steps[0].variance, s * s / 12.0, epsilon = 1e-12);
        for step in &km.steps {
            assert!(step.ci_lower <= step.survival && step.survival <= step.ci_upper);
        }
    }

    #[test]
    fn test_ties_and_step_lookup() {
        let km = KaplanMeierFitter::new()
            .fit(&[2.0, 2.0, 2.0, 5.0], &[true, true, false, true])
            .unwrap();

        assert_eq!(km.steps[0].n_events, 2);
        assert_eq!(km.steps[0].n_censored, 1);
        assert_relative_eq!(km.survival_at(1.9), 1.0);
        assert_relative_eq!(km.survival_at(2.0), 0.5);
        assert_relative_eq!(km.survival_at(4.0), 0.5);
        assert_relative_eq!(km.survival_at(10.0), 0.0);
        assert_eq!(km.timeline()[0], (0.0, 1.0));
    }

    #[test]
    fn test_all_censored_never_drops() {
        let km = KaplanMeierFitter::new().fit(&[3.0, 4.0], &[false, false]).unwrap();
        assert!(km.steps.is_empty());
        assert_eq!(km.median, None);
        assert_eq!(km.survival_at(100.0), 1.0);
    }

    #[test]
    fn test_bad_input() {
        let fitter = KaplanMeierFitter::new();
        assert!(fitter.fit(&[], &[]).is_err());
        assert!(fitter.fit(&[1.0], &[true, false]).is_err());
        assert!(fitter.fit(&[-1.0], &[true]).is_err());
        assert!(fitter.fit(&[f64::NAN], &[true]).is_err());
    }

    #[test]
    fn test_zero_duration_rejected_like_regression_data() {
        let fitter = KaplanMeierFitter::new();
        assert!(fitter.fit(&[0.0, 2.0], &[true, false]).is_err());
        assert!(crate::data::SurvivalData::new(
            vec![0.0, 2.0], vec![true, false], ndarray::Array2::zeros((2, 1))
        ).is_err());
        assert!(fitter.fit(&[0.5, 2.0], &[true, false]).is_ok());
        assert!(KaplanMeierFitter::new().with_conf_level(1.2).fit(&[1.0], &[true]).is_err());
    }
}
