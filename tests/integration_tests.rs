use cox_survival_sim::{
    generate_cohort, rng_from_seed, Cohort, CohortConfig, Config, CoxModel, KaplanMeierFitter,
    SurvivalPredictor, TieMethod,
};
use cox_survival_sim::config::default_profiles;
use cox_survival_sim::predict::predict_profiles;
use ndarray::Array1;

fn demo_cohort(n: usize, seed: u64) -> Cohort {
    let config = CohortConfig::default().with_n(n);
    generate_cohort(&config, &mut rng_from_seed(Some(seed))).unwrap()
}

#[test]
fn test_five_subject_table() {
    let cohort = demo_cohort(5, 2015);

    assert_eq!(cohort.len(), 5);
    assert_eq!(Cohort::COLUMNS, ["duration", "event", "age", "college"]);

    for (subject, row) in cohort.subjects().iter().zip(cohort.rows()) {
        let [duration, event, age, college] = row;
        assert!((0.0..=30.0).contains(&duration));
        assert!(event == 0.0 || event == 1.0);
        assert!(college == 0.0 || college == 1.0);
        assert_eq!(age, age.ceil());
        assert_eq!(event == 1.0, subject.event_time <= 30.0);
        assert_eq!(duration, subject.event_time.min(30.0));
    }
}

#[test]
fn test_same_seed_reproduces_table() {
    let a = demo_cohort(200, 7);
    let b = demo_cohort(200, 7);
    assert_eq!(a.rows(), b.rows());
}

#[test]
fn test_pipeline_recovers_effect_directions() {
    let cohort = demo_cohort(1000, 42);
    let data = cohort.to_survival_data().unwrap();

    let mut model = CoxModel::new();
    model.fit(&data).unwrap();
    let summary = model.summary().unwrap();

    // college shortens the hazard, age lengthens it
    let college = summary.coefficient("college").unwrap();
    let age = summary.coefficient("age").unwrap();
    assert!(college.coef < 0.0);
    assert!(age.coef > 0.0);
    assert!(college.hazard_ratio < 1.0);
    assert!(summary.likelihood_ratio_test.p_value < 0.01);
    assert!(summary.concordance.unwrap() > 0.5);
    assert_eq!(summary.n_events, cohort.n_events());
}

#[test]
fn test_breslow_and_efron_agree_in_sign() {
    let data = demo_cohort(600, 9).to_survival_data().unwrap();

    let mut efron = CoxModel::new();
    efron.fit(&data).unwrap();
    let mut breslow = CoxModel::new().with_ties(TieMethod::Breslow);
    breslow.fit(&data).unwrap();

    let e = efron.coefficients().unwrap();
    let b = breslow.coefficients().unwrap();
    for j in 0..2 {
        assert_eq!(e[j].signum(), b[j].signum());
    }
}

#[test]
fn test_example_profiles() {
    let cohort = demo_cohort(1000, 1);
    let mut model = CoxModel::new();
    model.fit(&cohort.to_survival_data().unwrap()).unwrap();

    let curves = predict_profiles(&model, &default_profiles()).unwrap();
    let labels: Vec<&str> = curves.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["24yr old College Grad", "65yr old HS Grad", "Average"]);

    for labeled in &curves {
        let s = &labeled.curve.survival;
        assert!(s.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(s.windows(2).all(|w| w[1] <= w[0]));
    }

    // young college grad outlives old high-school grad at every time
    let young = &curves[0].curve;
    let old = &curves[1].curve;
    assert!(young.survival.iter().zip(&old.survival).all(|(y, o)| y >= o));
    assert!(young.survival_at(10.0) > old.survival_at(10.0));

    // fractional college passes straight through: "Average" sits between the two
    let average = &curves[2].curve;
    let at_10 = average.survival_at(10.0);
    assert!(at_10 < young.survival_at(10.0) && at_10 > old.survival_at(10.0));
}

#[test]
fn test_kaplan_meier_on_cohort() {
    let cohort = demo_cohort(1000, 77);
    let km = KaplanMeierFitter::new().fit(&cohort.durations(), &cohort.events()).unwrap();

    assert_eq!(km.n, 1000);
    assert_eq!(km.n_events, cohort.n_events());
    assert!(km.steps.iter().all(|s| s.time <= 30.0));
    assert!(km.steps.windows(2).all(|w| w[1].survival <= w[0].survival));

    // with no censoring before the cutoff, S(t) is just the share still alive
    let alive_at_5 = cohort.durations().iter().filter(|&&d| d > 5.0).count() as f64 / 1000.0;
    assert!((km.survival_at(5.0) - alive_at_5).abs() < 1e-12);
}

#[test]
fn test_unfitted_predictor_fails() {
    let model = CoxModel::new();
    assert!(model.predict_survival_function(Array1::from(vec![24.0, 1.0]).view()).is_err());
    assert!(predict_profiles(&model, &default_profiles()).is_err());
}

#[test]
fn test_config_drives_pipeline() {
    let config = Config::from_json_str(r#"{ "seed": 3, "cohort": { "n": 250, "cutoff": 10 } }"#).unwrap();
    let cohort = generate_cohort(&config.cohort, &mut rng_from_seed(config.seed)).unwrap();
    assert_eq!(cohort.len(), 250);
    assert!(cohort.durations().iter().all(|&d| d <= 10.0));

    let mut model = config.cox_model();
    model.fit(&cohort.to_survival_data().unwrap()).unwrap();
    assert!(model.is_fitted());
}
