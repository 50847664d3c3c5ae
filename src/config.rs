//! run configuration - every knob the demo pipeline has, with the classic
//! defaults (1000 subjects, 40% college, weibull(1.5, 100), cutoff at 30)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurvivalError};
use crate::model::CoxModel;
use crate::optimization::TieMethod;
use crate::predict::CovariateProfile;

/// parameters of the synthetic cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub n: usize,
    pub college_probability: f64,
    pub age_mean: f64,
    pub age_sd: f64,
    pub noise_sd: f64,
    pub college_effect: f64,
    pub age_effect: f64,
    pub weibull_shape: f64,
    pub weibull_scale: f64,
    pub cutoff: f64,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            n: 1000,
            college_probability: 0.4,
            age_mean: 42.0,
            age_sd: 10.0,
            noise_sd: 0.5,
            college_effect: -1.4,
            age_effect: 0.05,
            weibull_shape: 1.5,
            weibull_scale: 100.0,
            cutoff: 30.0,
        }
    }
}

impl CohortConfig {
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(SurvivalError::invalid_parameter("n", self.n));
        }
        if !(0.0..=1.0).contains(&self.college_probability) {
            return Err(SurvivalError::invalid_parameter(
                "college_probability",
                self.college_probability,
            ));
        }
        let positive = [
            ("age_sd", self.age_sd),
            ("noise_sd", self.noise_sd),
            ("weibull_shape", self.weibull_shape),
            ("weibull_scale", self.weibull_scale),
            ("cutoff", self.cutoff),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SurvivalError::invalid_parameter(name, value));
            }
        }
        Ok(())
    }
}

/// cox fitter knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoxSettings {
    pub ties: TieMethod,
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for CoxSettings {
    fn default() -> Self {
        Self {
            ties: TieMethod::Efron,
            penalizer: 0.0,
            max_iterations: 100,
            tolerance: 1e-9,
        }
    }
}

impl CoxSettings {
    /// unfitted model carrying these settings
    pub fn build_model(&self) -> CoxModel {
        CoxModel::new()
            .with_ties(self.ties)
            .with_penalizer(self.penalizer)
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance)
    }
}

/// whole-run config, loadable from json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `None` = seed from os entropy (and log what we got)
    pub seed: Option<u64>,
    pub cohort: CohortConfig,
    pub cox: CoxSettings,
    pub conf_level: f64,
    pub profiles: Vec<CovariateProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            cohort: CohortConfig::default(),
            cox: CoxSettings::default(),
            conf_level: 0.95,
            profiles: default_profiles(),
        }
    }
}

/// the three example rows - note "Average" carries college = 0.4 on purpose
pub fn default_profiles() -> Vec<CovariateProfile> {
    vec![
        CovariateProfile::new("24yr old College Grad", 24.0, 1.0),
        CovariateProfile::new("65yr old HS Grad", 65.0, 0.0),
        CovariateProfile::new("Average", 42.0, 0.4),
    ]
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SurvivalError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SurvivalError::invalid_config(format!("can't read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.cohort.validate()?;
        if !(self.conf_level > 0.0 && self.conf_level < 1.0) {
            return Err(SurvivalError::invalid_parameter("conf_level", self.conf_level));
        }
        if self.cox.penalizer < 0.0 {
            return Err(SurvivalError::invalid_parameter("penalizer", self.cox.penalizer));
        }
        if self.cox.max_iterations == 0 {
            return Err(SurvivalError::invalid_parameter("max_iterations", 0));
        }
        Ok(())
    }

    /// cox model from `cox`, with intervals at the run's `conf_level`
    pub fn cox_model(&self) -> CoxModel {
        self.cox.build_model().with_conf_level(self.conf_level)
    }
}
