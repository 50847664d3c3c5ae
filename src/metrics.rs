use ndarray::ArrayView1;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{Result, SurvivalError};

/// Harrell's C-index with tie handling - how often do higher risk scores = shorter survival?
pub fn harrell_c_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    let n = risk_scores.len();
    if n != times.len() || n != events.len() {
        return Err(SurvivalError::invalid_dimensions(
            "risk scores, times, and events must have same length"
        ));
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    let mut tied_risk = 0.0;

    for i in 0..n {
        if !events[i] {
            continue; // censored obs can't anchor a pair
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            // j is comparable to i if j outlived i (event or censored)
            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] < risk_scores[j] {
                    discordant += 1.0;
                } else {
                    tied_risk += 1.0;
                }
            }
        }
    }

    let total_pairs = concordant + discordant + tied_risk;
    if total_pairs == 0.0 {
        return Err(SurvivalError::numerical_error(
            "No valid pairs for C-index calculation"
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / total_pairs)
}

/// partial AIC - same formula as AIC, on the partial likelihood
pub fn aic(log_likelihood: f64, n_parameters: usize) -> f64 {
    2.0 * n_parameters as f64 - 2.0 * log_likelihood
}

/// likelihood ratio test of the fitted model against beta = 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LikelihoodRatioTest {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

pub fn likelihood_ratio_test(
    log_likelihood: f64,
    null_log_likelihood: f64,
    degrees_of_freedom: usize,
) -> Result<LikelihoodRatioTest> {
    if degrees_of_freedom == 0 {
        return Err(SurvivalError::invalid_parameter("degrees_of_freedom", 0));
    }

    let statistic = (2.0 * (log_likelihood - null_log_likelihood)).max(0.0);
    let chi2 = ChiSquared::new(degrees_of_freedom as f64)
        .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;

    Ok(LikelihoodRatioTest {
        statistic,
        degrees_of_freedom,
        p_value: 1.0 - chi2.cdf(statistic),
    })
}
