//! synthetic cohort generator
//!
//! each subject gets a college flag ~ bernoulli(p), an age ~ normal rounded up,
//! and a latent linear predictor `xb = college_effect*college + age_effect*age + noise`.
//! event times come from the inverse weibull transform
//! `ceil((-ln(U) * scale * exp(-xb))^(1/shape))`, then get right-censored at the cutoff.

use rand::distributions::{Bernoulli, Open01};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use ndarray::Array2;

use crate::config::CohortConfig;
use crate::data::SurvivalData;
use crate::error::{Result, SurvivalError};

/// one simulated subject
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subject {
    pub age: f64,
    pub college: bool,
    /// true event time before censoring
    pub event_time: f64,
    /// min(event_time, cutoff)
    pub duration: f64,
    pub event_observed: bool,
}

impl Subject {
    pub fn college_indicator(&self) -> f64 {
        if self.college { 1.0 } else { 0.0 }
    }
}

/// immutable table of simulated subjects
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    subjects: Vec<Subject>,
    cutoff: f64,
}

impl Cohort {
    /// column layout of the table handed to the fitters
    pub const COLUMNS: [&'static str; 4] = ["duration", "event", "age", "college"];

    /// covariate columns, in design-matrix order
    pub const COVARIATES: [&'static str; 2] = ["age", "college"];

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn n_events(&self) -> usize {
        self.subjects.iter().filter(|s| s.event_observed).count()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.subjects.iter().map(|s| s.duration).collect()
    }

    pub fn events(&self) -> Vec<bool> {
        self.subjects.iter().map(|s| s.event_observed).collect()
    }

    /// rows as `[duration, event, age, college]`, matching `COLUMNS`
    pub fn rows(&self) -> Vec<[f64; 4]> {
        self.subjects
            .iter()
            .map(|s| {
                let event = if s.event_observed { 1.0 } else { 0.0 };
                [s.duration, event, s.age, s.college_indicator()]
            })
            .collect()
    }

    /// regression input: durations, events, and `[age, college]` covariates
    pub fn to_survival_data(&self) -> Result<SurvivalData> {
        let covariates: Vec<f64> = self.subjects
            .iter()
            .flat_map(|s| [s.age, s.college_indicator()])
            .collect();
        let covariates = Array2::from_shape_vec((self.len(), Self::COVARIATES.len()), covariates)
            .map_err(|e| SurvivalError::invalid_dimensions(e.to_string()))?;

        SurvivalData::new(self.durations(), self.events(), covariates)?
            .with_feature_names(Self::COVARIATES.iter().map(|s| s.to_string()).collect())
    }
}

/// seeded rng when a seed is given, os entropy otherwise
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// draw a whole cohort. columns are drawn one after another
/// (all college flags, then ages, then noise, then uniforms)
pub fn generate_cohort<R: Rng + ?Sized>(config: &CohortConfig, rng: &mut R) -> Result<Cohort> {
    config.validate()?;
    let n = config.n;

    let college_dist = Bernoulli::new(config.college_probability)
        .map_err(|_| SurvivalError::invalid_parameter("college_probability", config.college_probability))?;
    let age_dist = Normal::new(config.age_mean, config.age_sd)
        .map_err(|_| SurvivalError::invalid_parameter("age_sd", config.age_sd))?;
    let noise_dist = Normal::new(0.0, config.noise_sd)
        .map_err(|_| SurvivalError::invalid_parameter("noise_sd", config.noise_sd))?;

    let college: Vec<bool> = (0..n).map(|_| college_dist.sample(rng)).collect();
    let age: Vec<f64> = (0..n).map(|_| age_dist.sample(rng).ceil()).collect();
    let noise: Vec<f64> = (0..n).map(|_| noise_dist.sample(rng)).collect();
    // open interval so ln(U) stays finite & nonzero
    let uniforms: Vec<f64> = (0..n).map(|_| rng.sample(Open01)).collect();

    let subjects = (0..n)
        .map(|i| {
            let college_x = if college[i] { 1.0 } else { 0.0 };
            let linear_predictor =
                config.college_effect * college_x + config.age_effect * age[i] + noise[i];
            let event_time = weibull_event_time(
                uniforms[i],
                linear_predictor,
                config.weibull_shape,
                config.weibull_scale,
            );
            let duration = event_time.min(config.cutoff);

            Subject {
                age: age[i],
                college: college[i],
                event_time,
                duration,
                event_observed: event_time <= duration,
            }
        })
        .collect();

    Ok(Cohort { subjects, cutoff: config.cutoff })
}

/// inverse-cdf weibull draw accelerated by exp(-xb), rounded up to whole time units
pub fn weibull_event_time(u: f64, linear_predictor: f64, shape: f64, scale: f64) -> f64 {
    (-u.ln() * scale * (-linear_predictor).exp())
        .powf(1.0 / shape)
        .ceil()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cohort(n: usize, seed: u64) -> Cohort {
        let config = CohortConfig::default().with_n(n);
        generate_cohort(&config, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_censoring_invariants() {
        let cohort = cohort(2000, 11);
        assert_eq!(cohort.len(), 2000);

        for s in cohort.subjects() {
            assert!(s.duration >= 0.0 && s.duration <= 30.0);
            assert_eq!(s.duration, s.event_time.min(30.0));
            assert_eq!(s.event_observed, s.event_time <= 30.0);
            assert_eq!(s.age, s.age.ceil());
        }
    }

    #[test]
    fn test_some_censored_some_observed() {
        let cohort = cohort(1000, 3);
        let events = cohort.n_events();
        assert!(events > 0);
        assert!(events < cohort.len());
    }

    #[test]
    fn test_marginals() {
        let cohort = cohort(20_000, 42);
        let n = cohort.len() as f64;

        let college_rate = cohort.subjects().iter().filter(|s| s.college).count() as f64 / n;
        assert_relative_eq!(college_rate, 0.4, epsilon = 0.02);

        // ceil shifts the mean up by roughly half a year
        let mean_age = cohort.subjects().iter().map(|s| s.age).sum::<f64>() / n;
        assert_relative_eq!(mean_age, 42.5, epsilon = 0.5);

        let var_age = cohort.subjects().iter().map(|s| (s.age - mean_age).powi(2)).sum::<f64>() / n;
        assert_relative_eq!(var_age.sqrt(), 10.0, epsilon = 0.5);
    }

    #[test]
    fn test_same_seed_same_cohort() {
        assert_eq!(cohort(500, 99), cohort(500, 99));
        assert_ne!(cohort(500, 99), cohort(500, 100));
    }

    #[test]
    fn test_rng_from_seed() {
        let config = CohortConfig::default().with_n(50);
        let a = generate_cohort(&config, &mut rng_from_seed(Some(12))).unwrap();
        let b = generate_cohort(&config, &mut rng_from_seed(Some(12))).unwrap();
        assert_eq!(a, b);

        // unseeded still produces a valid cohort
        let c = generate_cohort(&config, &mut rng_from_seed(None)).unwrap();
        assert_eq!(c.len(), 50);
    }

    #[test]
    fn test_zero_subjects_rejected() {
        let config = CohortConfig::default().with_n(0);
        assert!(generate_cohort(&config, &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn test_weibull_transform() {
        // -ln(e^-1) * 100 * e^0 = 100, 100^(1/1.5) = 21.54.. -> 22
        let t = weibull_event_time((-1.0f64).exp(), 0.0, 1.5, 100.0);
        assert_eq!(t, 22.0);

        // larger linear predictor = shorter time
        let slow = weibull_event_time(0.5, -1.0, 1.5, 100.0);
        let fast = weibull_event_time(0.5, 2.0, 1.5, 100.0);
        assert!(fast < slow);
    }

    #[test]
    fn test_lower_cutoff_censors_more() {
        let config = CohortConfig::default().with_n(1000);
        let wide = generate_cohort(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        let narrow = generate_cohort(&config.clone().with_cutoff(3.0), &mut StdRng::seed_from_u64(5)).unwrap();

        assert!(narrow.n_events() < wide.n_events());
        assert!(narrow.subjects().iter().all(|s| s.duration <= 3.0));
    }

    #[test]
    fn test_survival_data_layout() {
        let cohort = cohort(10, 8);
        let data = cohort.to_survival_data().unwrap();

        assert_eq!(data.n_samples(), 10);
        assert_eq!(data.feature_names().unwrap(), &["age".to_string(), "college".to_string()]);
        for (i, s) in cohort.subjects().iter().enumerate() {
            assert_eq!(data.covariates()[[i, 0]], s.age);
            assert_eq!(data.covariates()[[i, 1]], s.college_indicator());
            assert_eq!(data.times()[i], s.duration);
        }
    }
}
