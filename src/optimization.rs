use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
};

/// how tied event times enter the partial likelihood
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieMethod {
    /// Efron's approximation - what most stats packages default to
    #[default]
    Efron,
    /// Breslow's approximation - every tied event sees the full risk set
    Breslow,
}

impl TieMethod {
    /// fraction of the tied-event weight removed from the risk set for the r-th of m tied events
    pub(crate) fn removal_fraction(self, r: usize, m: usize) -> f64 {
        match self {
            TieMethod::Efron => r as f64 / m as f64,
            TieMethod::Breslow => 0.0,
        }
    }
}

impl std::str::FromStr for TieMethod {
    type Err = SurvivalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "efron" => Ok(TieMethod::Efron),
            "breslow" => Ok(TieMethod::Breslow),
            other => Err(SurvivalError::invalid_parameter("ties", other)),
        }
    }
}

/// Configuration for Cox model optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub l2_penalty: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub ties: TieMethod,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            l2_penalty: 0.0,
            max_iterations: 100,
            tolerance: 1e-9,
            ties: TieMethod::Efron,
        }
    }
}

/// what the solver hands back
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub coefficients: Array1<f64>,
    /// unpenalized log partial likelihood at the optimum
    pub log_likelihood: f64,
    /// log partial likelihood with every coefficient at zero
    pub null_log_likelihood: f64,
    /// negative hessian of the penalized log partial likelihood
    pub information: Array2<f64>,
    pub iterations: usize,
}

/// log partial likelihood plus first & second derivatives at one beta
#[derive(Debug, Clone)]
pub struct LikelihoodDerivatives {
    pub log_likelihood: f64,
    pub gradient: Array1<f64>,
    pub hessian: Array2<f64>,
}

/// Cox proportional hazards optimizer (Newton-Raphson w/ optional ridge penalty)
pub struct CoxOptimizer {
    config: OptimizationConfig,
}

const MAX_STEP_HALVINGS: usize = 30;

impl CoxOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    /// maximize the (penalized) log partial likelihood starting from beta = 0
    pub fn optimize(&self, data: &SurvivalData) -> Result<OptimizationResult> {
        if data.event_groups().is_empty() {
            return Err(SurvivalError::invalid_survival_data(
                "need at least one observed event to fit a cox model"
            ));
        }

        let mut beta = Array1::zeros(data.n_features());
        let null = self.compute_likelihood_derivatives(data, &beta)?;
        let null_log_likelihood = null.log_likelihood;

        let iterations = self.newton_raphson_optimize(data, &mut beta, null)?;

        let at_optimum = self.compute_likelihood_derivatives(data, &beta)?;
        let information = self.penalize(&beta, at_optimum.clone()).hessian.mapv(|h| -h);

        Ok(OptimizationResult {
            coefficients: beta,
            log_likelihood: at_optimum.log_likelihood,
            null_log_likelihood,
            information,
            iterations,
        })
    }

    /// Newton-Raphson w/ step halving whenever a full step lowers the objective
    fn newton_raphson_optimize(
        &self,
        data: &SurvivalData,
        beta: &mut Array1<f64>,
        start: LikelihoodDerivatives,
    ) -> Result<usize> {
        let mut current = self.penalize(beta, start);

        for iteration in 1..=self.config.max_iterations {
            // hessian is negative definite near the optimum, so -H is the system to solve
            let neg_hessian = current.hessian.mapv(|h| -h);
            let step = solve_linear_system(&neg_hessian, &current.gradient)?;

            let mut step_size = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_STEP_HALVINGS {
                let candidate = &*beta + &(step_size * &step);
                if let Ok(derivs) = self.compute_likelihood_derivatives(data, &candidate) {
                    let derivs = self.penalize(&candidate, derivs);
                    if derivs.log_likelihood.is_finite()
                        && derivs.log_likelihood >= current.log_likelihood - self.config.tolerance
                    {
                        accepted = Some((candidate, derivs));
                        break;
                    }
                }
                step_size *= 0.5;
            }

            let (candidate, next) = accepted.ok_or_else(|| {
                SurvivalError::numerical_error("step halving couldn't improve the partial likelihood")
            })?;

            let improvement = next.log_likelihood - current.log_likelihood;
            debug!(iteration, step_size, log_likelihood = next.log_likelihood, improvement, "newton step");

            *beta = candidate;
            current = next;

            if improvement.abs() < self.config.tolerance {
                return Ok(iteration);
            }
        }

        Err(SurvivalError::optimization_failed(format!(
            "Newton-Raphson failed to converge in {} iterations",
            self.config.max_iterations
        )))
    }

    /// fold the ridge penalty into likelihood, gradient & hessian
    fn penalize(&self, beta: &Array1<f64>, mut derivs: LikelihoodDerivatives) -> LikelihoodDerivatives {
        let lambda = self.config.l2_penalty;
        if lambda > 0.0 {
            derivs.log_likelihood -= 0.5 * lambda * beta.dot(beta);
            derivs.gradient = &derivs.gradient - &(lambda * beta);
            for i in 0..beta.len() {
                derivs.hessian[[i, i]] -= lambda;
            }
        }
        derivs
    }

    /// Compute log partial likelihood and its derivatives
    pub fn compute_likelihood_derivatives(
        &self,
        data: &SurvivalData,
        beta: &Array1<f64>,
    ) -> Result<LikelihoodDerivatives> {
        let n_features = data.n_features();
        if beta.len() != n_features {
            return Err(SurvivalError::invalid_dimensions(
                format!("beta has {} entries, data has {} features", beta.len(), n_features)
            ));
        }

        let covariates = data.covariates();
        let linear_predictors = covariates.dot(beta);
        let weights = risk_weights(linear_predictors.view())?;

        let mut loglik = 0.0;
        let mut gradient = Array1::zeros(n_features);
        let mut hessian = Array2::zeros((n_features, n_features));

        for group in data.event_groups() {
            let risk = weighted_moments(covariates, weights.view(), &group.risk_set);
            let tied = weighted_moments(covariates, weights.view(), &group.events);
            let m = group.events.len();

            for &i in &group.events {
                loglik += linear_predictors[i];
                gradient += &covariates.row(i);
            }

            for r in 0..m {
                let f = self.config.ties.removal_fraction(r, m);
                let phi0 = risk.s0 - f * tied.s0;
                if !(phi0 > 0.0) {
                    return Err(SurvivalError::numerical_error("Risk set sum is non-positive"));
                }

                let mean = (&risk.s1 - &(f * &tied.s1)) / phi0;
                let second = (&risk.s2 - &(f * &tied.s2)) / phi0;

                loglik -= phi0.ln();
                gradient -= &mean;
                for j in 0..n_features {
                    for k in 0..n_features {
                        hessian[[j, k]] -= second[[j, k]] - mean[j] * mean[k];
                    }
                }
            }
        }

        Ok(LikelihoodDerivatives { log_likelihood: loglik, gradient, hessian })
    }
}

/// exp(linear predictor), refusing to overflow
pub(crate) fn risk_weights(linear_predictors: ArrayView1<f64>) -> Result<Array1<f64>> {
    let weights = linear_predictors.mapv(f64::exp);
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
        return Err(SurvivalError::numerical_error(
            format!("Invalid exponential prediction: {}", w)
        ));
    }
    Ok(weights)
}

/// zeroth, first & second weighted covariate moments over a set of rows
pub(crate) struct WeightedMoments {
    pub s0: f64,
    pub s1: Array1<f64>,
    pub s2: Array2<f64>,
}

pub(crate) fn weighted_moments(
    covariates: ArrayView2<f64>,
    weights: ArrayView1<f64>,
    rows: &[usize],
) -> WeightedMoments {
    let p = covariates.ncols();
    let mut s0 = 0.0;
    let mut s1 = Array1::zeros(p);
    let mut s2 = Array2::zeros((p, p));

    for &i in rows {
        let w = weights[i];
        let x = covariates.row(i);
        s0 += w;
        s1.scaled_add(w, &x);
        for j in 0..p {
            for k in 0..p {
                s2[[j, k]] += w * x[j] * x[k];
            }
        }
    }

    WeightedMoments { s0, s1, s2 }
}

/// Solve linear system Ax = b (gaussian elimination, partial pivoting)
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(SurvivalError::invalid_dimensions("Matrix dimensions mismatch"));
    }

    let mut a_copy = a.clone();
    let mut b_copy = b.clone();

    // Forward elimination
    for i in 0..n {
        let mut max_row = i;
        for k in i + 1..n {
            if a_copy[[k, i]].abs() > a_copy[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if a_copy[[max_row, i]].abs() < 1e-12 {
            return Err(SurvivalError::numerical_error("Matrix is singular"));
        }

        if max_row != i {
            for j in 0..n {
                a_copy.swap([i, j], [max_row, j]);
            }
            b_copy.swap(i, max_row);
        }

        for k in i + 1..n {
            let factor = a_copy[[k, i]] / a_copy[[i, i]];
            for j in i..n {
                a_copy[[k, j]] -= factor * a_copy[[i, j]];
            }
            b_copy[k] -= factor * b_copy[i];
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = b_copy[i];
        for j in i + 1..n {
            x[i] -= a_copy[[i, j]] * x[j];
        }
        x[i] /= a_copy[[i, i]];
    }

    Ok(x)
}

/// invert a square matrix one unit column at a time
pub fn invert_matrix(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut inverse = Array2::zeros((n, n));
    for j in 0..n {
        let mut unit = Array1::zeros(n);
        unit[j] = 1.0;
        let column = solve_linear_system(a, &unit)?;
        inverse.column_mut(j).assign(&column);
    }
    Ok(inverse)
}
