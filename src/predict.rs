//! prediction seam between the pipeline and whatever fitted the model.
//!
//! anything that can turn one covariate row into a survival curve implements
//! [`SurvivalPredictor`]; [`predict_profiles`] asks it once per labeled profile.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SurvivalError};

/// one named covariate row to predict for. `college` is a plain number so
/// population averages like 0.4 pass straight through to the linear predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateProfile {
    pub label: String,
    pub age: f64,
    pub college: f64,
}

impl CovariateProfile {
    pub fn new(label: impl Into<String>, age: f64, college: f64) -> Self {
        Self { label: label.into(), age, college }
    }

    /// design-matrix row, `[age, college]`
    pub fn covariates(&self) -> Array1<f64> {
        Array1::from(vec![self.age, self.college])
    }
}

/// survival probability S(t) on a grid of times
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalCurve {
    pub times: Vec<f64>,
    pub survival: Vec<f64>,
}

impl SurvivalCurve {
    pub fn new(times: Vec<f64>, survival: Vec<f64>) -> Result<Self> {
        if times.len() != survival.len() {
            return Err(SurvivalError::invalid_dimensions(
                format!("{} times vs {} survival values", times.len(), survival.len())
            ));
        }
        Ok(Self { times, survival })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// step-function lookup: S(t) at the last grid time <= t, 1.0 before the grid starts
    pub fn survival_at(&self, t: f64) -> f64 {
        let idx = self.times.partition_point(|&ti| ti <= t);
        if idx == 0 { 1.0 } else { self.survival[idx - 1] }
    }
}

/// a curve tagged with the profile label it was predicted for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledCurve {
    pub label: String,
    pub curve: SurvivalCurve,
}

/// "given a covariate row, give me S(t)"
pub trait SurvivalPredictor {
    fn predict_survival_function(&self, covariates: ArrayView1<f64>) -> Result<SurvivalCurve>;
}

/// one prediction request per profile, in the order given
pub fn predict_profiles<P: SurvivalPredictor + ?Sized>(
    predictor: &P,
    profiles: &[CovariateProfile],
) -> Result<Vec<LabeledCurve>> {
    profiles
        .iter()
        .map(|profile| {
            let curve = predictor.predict_survival_function(profile.covariates().view())?;
            Ok(LabeledCurve { label: profile.label.clone(), curve })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use crate::config::default_profiles;

    /// remembers every row it was asked about
    struct RecordingPredictor {
        requests: RefCell<Vec<Vec<f64>>>,
    }

    impl SurvivalPredictor for RecordingPredictor {
        fn predict_survival_function(&self, covariates: ArrayView1<f64>) -> Result<SurvivalCurve> {
            self.requests.borrow_mut().push(covariates.to_vec());
            SurvivalCurve::new(vec![1.0, 2.0], vec![0.9, 0.8])
        }
    }

    struct FailingPredictor;

    impl SurvivalPredictor for FailingPredictor {
        fn predict_survival_function(&self, _: ArrayView1<f64>) -> Result<SurvivalCurve> {
            Err(SurvivalError::ModelNotFitted)
        }
    }

    #[test]
    fn test_one_request_per_profile_in_order() {
        let predictor = RecordingPredictor { requests: RefCell::new(Vec::new()) };
        let curves = predict_profiles(&predictor, &default_profiles()).unwrap();

        assert_eq!(
            *predictor.requests.borrow(),
            vec![vec![24.0, 1.0], vec![65.0, 0.0], vec![42.0, 0.4]]
        );
        let labels: Vec<&str> = curves.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["24yr old College Grad", "65yr old HS Grad", "Average"]);
    }

    #[test]
    fn test_predictor_errors_propagate() {
        assert!(predict_profiles(&FailingPredictor, &default_profiles()).is_err());
        assert!(predict_profiles(&FailingPredictor, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_step_lookup() {
        let curve = SurvivalCurve::new(vec![2.0, 5.0], vec![0.7, 0.4]).unwrap();
        assert_eq!(curve.survival_at(0.5), 1.0);
        assert_eq!(curve.survival_at(2.0), 0.7);
        assert_eq!(curve.survival_at(4.9), 0.7);
        assert_eq!(curve.survival_at(100.0), 0.4);
        assert!(SurvivalCurve::new(vec![1.0], vec![]).is_err());
    }
}
