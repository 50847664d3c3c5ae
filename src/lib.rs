//! # cox survival sim
//!
//! simulate right-censored survival data from a weibull process, then fit a
//! kaplan-meier curve and a cox proportional hazards regression to it and plot
//! predicted survival for a few example covariate profiles.
//!
//! ## what you get
//!
//! - a seeded cohort generator (age, college, censored weibull durations)
//! - kaplan-meier w/ greenwood CIs
//! - cox regression (efron or breslow ties, optional ridge penalty)
//! - survival curve prediction behind a small trait, plus svg plots
//!
//! ## quick start
//!
//! ```rust
//! use cox_survival_sim::{generate_cohort, rng_from_seed, CohortConfig, CoxModel, KaplanMeierFitter};
//! use cox_survival_sim::predict::{predict_profiles, CovariateProfile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rng = rng_from_seed(Some(42));
//! let cohort = generate_cohort(&CohortConfig::default().with_n(300), &mut rng)?;
//!
//! let km = KaplanMeierFitter::new().fit(&cohort.durations(), &cohort.events())?;
//! assert!(km.survival_at(30.0) <= 1.0);
//!
//! let mut model = CoxModel::new();
//! model.fit(&cohort.to_survival_data()?)?;
//!
//! let profiles = vec![CovariateProfile::new("24yr old College Grad", 24.0, 1.0)];
//! let curves = predict_profiles(&model, &profiles)?;
//! assert_eq!(curves[0].label, "24yr old College Grad");
//! # Ok(())
//! # }
//! ```

pub mod cohort;
pub mod config;
pub mod data;
pub mod error;
pub mod kaplan_meier;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod plot;
pub mod predict;

pub use cohort::{generate_cohort, rng_from_seed, Cohort, Subject};
pub use config::{CohortConfig, Config, CoxSettings};
pub use data::SurvivalData;
pub use error::{Result, SurvivalError};
pub use kaplan_meier::{KaplanMeierEstimate, KaplanMeierFitter};
pub use model::{CoxModel, CoxModelSummary};
pub use optimization::TieMethod;
pub use predict::{CovariateProfile, LabeledCurve, SurvivalCurve, SurvivalPredictor};
