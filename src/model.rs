use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{info, warn};

use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
    metrics::{aic, harrell_c_index, likelihood_ratio_test, LikelihoodRatioTest},
    optimization::{invert_matrix, risk_weights, weighted_moments, CoxOptimizer, OptimizationConfig, TieMethod},
    predict::{SurvivalCurve, SurvivalPredictor},
};

/// everything we learn from a fit
#[derive(Debug, Clone)]
struct FittedState {
    coefficients: Array1<f64>,
    covariate_means: Array1<f64>,
    covariance: Array2<f64>,
    baseline_times: Vec<f64>,
    baseline_cumulative_hazard: Vec<f64>, // at centered covariates
    log_likelihood: f64,
    null_log_likelihood: f64,
    concordance: Option<f64>, // None when no pair is comparable
    n_samples: usize,
    n_events: usize,
    iterations: usize,
}

/// cox proportional hazards model w/ optional ridge penalty
#[derive(Debug, Clone)]
pub struct CoxModel {
    penalizer: f64,                     // ridge penalty
    ties: TieMethod,
    max_iterations: usize,
    tolerance: f64,
    conf_level: f64,                    // for the coefficient CIs
    feature_names: Option<Vec<String>>, // optional feature labels
    fitted: Option<FittedState>,
}

impl Default for CoxModel {
    fn default() -> Self {
        Self {
            penalizer: 0.0,
            ties: TieMethod::Efron,
            max_iterations: 100,
            tolerance: 1e-9,
            conf_level: 0.95,
            feature_names: None,
            fitted: None,
        }
    }
}

impl CoxModel {
    /// new cox model w/ defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge (L2) penalty on the coefficients
    pub fn with_penalizer(mut self, penalty: f64) -> Self {
        self.penalizer = penalty.max(0.0);
        self
    }

    pub fn with_ties(mut self, ties: TieMethod) -> Self {
        self.ties = ties;
        self
    }

    /// max newton iterations before giving up
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// convergence threshold on the change in log-likelihood
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// coverage of the coefficient intervals in `summary()`
    pub fn with_conf_level(mut self, conf_level: f64) -> Self {
        self.conf_level = conf_level;
        self
    }

    /// give names to your features for nicer output
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// fit the model to data - this does the actual work
    pub fn fit(&mut self, data: &SurvivalData) -> Result<&mut Self> {
        if let Some(names) = &self.feature_names {
            if names.len() != data.n_features() {
                return Err(SurvivalError::invalid_dimensions(format!(
                    "{} feature names for {} features", names.len(), data.n_features()
                )));
            }
        } else if let Some(names) = data.feature_names() {
            self.feature_names = Some(names.to_vec());
        }

        // partial likelihood doesn't care about location, exp() does
        let mut centered = data.clone();
        let covariate_means = centered.center_covariates()?;

        let optimizer = CoxOptimizer::new(OptimizationConfig {
            l2_penalty: self.penalizer,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ties: self.ties,
        });
        let result = optimizer.optimize(&centered)?;
        let covariance = invert_matrix(&result.information)?;

        let (baseline_times, baseline_cumulative_hazard) =
            baseline_cumulative_hazard(&centered, &result.coefficients, self.ties)?;

        let risk_scores = centered.covariates().dot(&result.coefficients);
        // the fit stands even when concordance is undefined
        let concordance = match harrell_c_index(risk_scores.view(), data.times(), data.events()) {
            Ok(c) => Some(c),
            Err(SurvivalError::NumericalError { message }) => {
                warn!(%message, "concordance not available");
                None
            }
            Err(e) => return Err(e),
        };

        info!(
            n = data.n_samples(),
            events = data.n_events(),
            iterations = result.iterations,
            log_likelihood = result.log_likelihood,
            concordance = ?concordance,
            "cox model fitted"
        );

        self.fitted = Some(FittedState {
            coefficients: result.coefficients,
            covariate_means,
            covariance,
            baseline_times,
            baseline_cumulative_hazard,
            log_likelihood: result.log_likelihood,
            null_log_likelihood: result.null_log_likelihood,
            concordance,
            n_samples: data.n_samples(),
            n_events: data.n_events(),
            iterations: result.iterations,
        });

        Ok(self)
    }

    fn state(&self) -> Result<&FittedState> {
        self.fitted.as_ref().ok_or(SurvivalError::ModelNotFitted)
    }

    /// get the fitted coefficients (betas)
    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        Ok(self.state()?.coefficients.view())
    }

    /// column means the model was centered on
    pub fn covariate_means(&self) -> Result<ArrayView1<'_, f64>> {
        Ok(self.state()?.covariate_means.view())
    }

    fn check_width(&self, n_cols: usize) -> Result<()> {
        let expected = self.state()?.coefficients.len();
        if n_cols != expected {
            return Err(SurvivalError::invalid_dimensions(
                format!("feature count mismatch: expected {}, got {}", expected, n_cols)
            ));
        }
        Ok(())
    }

    /// linear predictor x'beta for new subjects
    pub fn predict(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_width(covariates.ncols())?;
        Ok(covariates.dot(&self.state()?.coefficients))
    }

    /// exp((x - mean)'beta), the multiplier on the baseline hazard
    pub fn predict_partial_hazard(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let state = self.state()?;
        let offset = state.covariate_means.dot(&state.coefficients);
        Ok(self.predict(covariates)?.mapv(|lp| (lp - offset).exp()))
    }

    /// baseline cumulative hazard (at the covariate means), one value per unique training duration
    pub fn baseline_cumulative_hazard(&self) -> Result<(&[f64], &[f64])> {
        let state = self.state()?;
        Ok((&state.baseline_times, &state.baseline_cumulative_hazard))
    }

    /// has this model been fit to data yet?
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// coefficient table + goodness of fit
    pub fn summary(&self) -> Result<CoxModelSummary> {
        let state = self.state()?;
        let p = state.coefficients.len();
        let conf_level = self.conf_level;
        if !(conf_level > 0.0 && conf_level < 1.0) {
            return Err(SurvivalError::invalid_parameter("conf_level", conf_level));
        }

        let standard_normal = Normal::new(0.0, 1.0)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
        let z_crit = standard_normal.inverse_cdf(1.0 - (1.0 - conf_level) / 2.0);

        let names = (0..p)
            .map(|i| {
                self.feature_names
                    .as_ref()
                    .and_then(|names| names.get(i).cloned())
                    .unwrap_or_else(|| format!("x{}", i))
            })
            .collect();

        let coefficients: Vec<CoefficientRow> = (0..p)
            .map(|i| {
                let coef = state.coefficients[i];
                let se = state.covariance[[i, i]].max(0.0).sqrt();
                let z = coef / se;
                CoefficientRow {
                    coef,
                    hazard_ratio: coef.exp(),
                    se,
                    z,
                    p: 2.0 * (1.0 - standard_normal.cdf(z.abs())),
                    lower: coef - z_crit * se,
                    upper: coef + z_crit * se,
                }
            })
            .collect();

        Ok(CoxModelSummary {
            feature_names: names,
            coefficients,
            conf_level,
            ties: self.ties,
            penalizer: self.penalizer,
            n_samples: state.n_samples,
            n_events: state.n_events,
            iterations: state.iterations,
            log_likelihood: state.log_likelihood,
            concordance: state.concordance,
            partial_aic: aic(state.log_likelihood, p),
            likelihood_ratio_test: likelihood_ratio_test(
                state.log_likelihood,
                state.null_log_likelihood,
                p,
            )?,
        })
    }
}

impl SurvivalPredictor for CoxModel {
    /// S(t | x) = exp(-H0(t) * partial_hazard(x)) on the training timeline
    fn predict_survival_function(&self, covariates: ArrayView1<f64>) -> Result<SurvivalCurve> {
        let state = self.state()?;
        self.check_width(covariates.len())?;

        let centered = &covariates - &state.covariate_means;
        let partial_hazard = centered.dot(&state.coefficients).exp();
        if !partial_hazard.is_finite() {
            return Err(SurvivalError::numerical_error(
                format!("partial hazard overflowed for covariates {:?}", covariates.to_vec())
            ));
        }

        let survival = state.baseline_cumulative_hazard
            .iter()
            .map(|h0| (-h0 * partial_hazard).exp())
            .collect();

        SurvivalCurve::new(state.baseline_times.clone(), survival)
    }
}

/// Breslow/Efron baseline cumulative hazard over the unique durations of (already centered) data
pub fn baseline_cumulative_hazard(
    data: &SurvivalData,
    beta: &Array1<f64>,
    ties: TieMethod,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let covariates = data.covariates();
    let weights = risk_weights(covariates.dot(beta).view())?;

    let times = data.unique_times();
    let mut groups = data.event_groups().iter().peekable();
    let mut cumulative = 0.0;
    let mut hazard = Vec::with_capacity(times.len());

    for &t in &times {
        if let Some(group) = groups.next_if(|g| g.time == t) {
            let risk = weighted_moments(covariates, weights.view(), &group.risk_set);
            let tied = weighted_moments(covariates, weights.view(), &group.events);
            let m = group.events.len();

            for r in 0..m {
                let denom = risk.s0 - ties.removal_fraction(r, m) * tied.s0;
                if !(denom > 0.0) {
                    return Err(SurvivalError::numerical_error("Risk set sum is non-positive"));
                }
                cumulative += 1.0 / denom;
            }
        }
        hazard.push(cumulative);
    }

    Ok((times, hazard))
}

/// one line of the coefficient table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub coef: f64,
    pub hazard_ratio: f64, // exp(coef)
    pub se: f64,
    pub z: f64,
    pub p: f64,
    pub lower: f64,        // CI on coef
    pub upper: f64,
}

/// nice summary of what the model learned
#[derive(Debug, Clone, Serialize)]
pub struct CoxModelSummary {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<CoefficientRow>,
    pub conf_level: f64,
    pub ties: TieMethod,
    pub penalizer: f64,
    pub n_samples: usize,
    pub n_events: usize,
    pub iterations: usize,
    pub log_likelihood: f64,
    pub concordance: Option<f64>,
    pub partial_aic: f64,
    pub likelihood_ratio_test: LikelihoodRatioTest,
}

impl CoxModelSummary {
    /// look up a coefficient row by feature name
    pub fn coefficient(&self, name: &str) -> Option<&CoefficientRow> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.coefficients[i])
    }

    /// print out what we learned
    pub fn print(&self) {
        println!("cox proportional hazards model summary");
        println!("=====================================");
        println!("ties: {:?}   penalizer: {}", self.ties, self.penalizer);
        println!("observations: {}   events: {}   iterations: {}",
                 self.n_samples, self.n_events, self.iterations);
        println!("");

        let pct = (self.conf_level * 100.0).round();
        println!("{:<12} {:>10} {:>10} {:>10} {:>8} {:>10} {:>10} {:>10}",
                 "covariate", "coef", "exp(coef)", "se(coef)", "z", "p",
                 format!("lower {}", pct), format!("upper {}", pct));
        println!("{:-<96}", "");

        for (name, row) in self.feature_names.iter().zip(&self.coefficients) {
            println!("{:<12} {:>10.4} {:>10.4} {:>10.4} {:>8.2} {:>10} {:>10.4} {:>10.4}",
                     name, row.coef, row.hazard_ratio, row.se, row.z, format_p_value(row.p),
                     row.lower, row.upper);
        }

        println!("");
        println!("log-likelihood:        {:.4}", self.log_likelihood);
        match self.concordance {
            Some(c) => println!("concordance:           {:.4}", c),
            None => println!("concordance:           n/a"),
        }
        println!("partial AIC:           {:.4}", self.partial_aic);
        let lr = &self.likelihood_ratio_test;
        println!("log-likelihood ratio:  {:.4} on {} df, p = {}",
                 lr.statistic, lr.degrees_of_freedom, format_p_value(lr.p_value));
    }
}

/// p-value for display; anything under 0.005 is shown as "<0.005"
pub fn format_p_value(p: f64) -> String {
    if p.is_nan() {
        "n/a".to_string()
    } else if p < 0.005 {
        "<0.005".to_string()
    } else {
        format!("{:.3}", p)
    }
}
