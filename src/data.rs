use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use crate::error::{Result, SurvivalError};

/// subjects that failed at one distinct event time, plus everyone still at risk
#[derive(Debug, Clone)]
pub struct EventGroup {
    pub time: f64,
    pub events: Vec<usize>,    // tied events at `time`
    pub risk_set: Vec<usize>,  // durations >= `time`
}

/// survival data - durations, event flags, and covariates
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,              // duration to event/censoring
    events: Vec<bool>,               // true = event, false = censored
    covariates: Array2<f64>,         // n_samples x n_features
    feature_names: Option<Vec<String>>,
    event_groups: Vec<EventGroup>,   // precomputed, ascending in time
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays
    pub fn new(
        times: Vec<f64>,
        events: Vec<bool>,
        covariates: Array2<f64>,
    ) -> Result<Self> {
        let n_samples = times.len();

        if n_samples == 0 {
            return Err(SurvivalError::invalid_survival_data("need at least one subject"));
        }

        if events.len() != n_samples {
            return Err(SurvivalError::invalid_dimensions(
                format!("times len ({}) != events len ({})", n_samples, events.len())
            ));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvivalError::invalid_dimensions(
                format!("covariates rows ({}) != n_samples ({})", covariates.nrows(), n_samples)
            ));
        }

        if times.iter().any(|&t| t <= 0.0 || !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "survival times must be positive & finite"
            ));
        }

        if covariates.iter().any(|v| !v.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "covariates must be finite"
            ));
        }

        let mut data = Self {
            times: Array1::from(times),
            events,
            covariates,
            feature_names: None,
            event_groups: Vec::new(),
        };

        data.compute_event_groups();
        Ok(data)
    }

    /// attach column labels, one per covariate
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.n_features() {
            return Err(SurvivalError::invalid_dimensions(
                format!("got {} feature names for {} features", names.len(), self.n_features())
            ));
        }
        self.feature_names = Some(names);
        Ok(self)
    }

    /// precompute risk sets & tied events for each distinct event time
    fn compute_event_groups(&mut self) {
        let event_times = self.event_times();

        self.event_groups = event_times
            .into_iter()
            .map(|time| {
                let events = (0..self.n_samples())
                    .filter(|&i| self.events[i] && self.times[i] == time)
                    .collect();
                // everyone who hasn't failed/been censored before this time
                let risk_set = (0..self.n_samples())
                    .filter(|&i| self.times[i] >= time)
                    .collect();
                EventGroup { time, events, risk_set }
            })
            .collect();
    }

    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> &[bool] {
        &self.events
    }

    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn event_groups(&self) -> &[EventGroup] {
        &self.event_groups
    }

    /// unique event times in order
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();

        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        times
    }

    /// unique durations (events & censorings) in order
    pub fn unique_times(&self) -> Vec<f64> {
        let mut times = self.times.to_vec();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        times
    }

    /// grab a subset of subjects by indices
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.n_samples()) {
            return Err(SurvivalError::invalid_dimensions("subset index out of bounds"));
        }

        let times: Vec<f64> = indices.iter().map(|&i| self.times[i]).collect();
        let events: Vec<bool> = indices.iter().map(|&i| self.events[i]).collect();
        let covariates = self.covariates.select(Axis(0), indices);

        let mut subset = Self::new(times, events, covariates)?;
        subset.feature_names = self.feature_names.clone();
        Ok(subset)
    }

    /// shift every covariate column to mean zero - modifies in place, returns the means
    pub fn center_covariates(&mut self) -> Result<Array1<f64>> {
        let means = self.covariates
            .mean_axis(Axis(0))
            .ok_or_else(|| SurvivalError::invalid_survival_data("no rows to center"))?;

        for mut row in self.covariates.rows_mut() {
            row -= &means;
        }

        Ok(means)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_data() -> SurvivalData {
        let times = vec![1.0, 2.0, 3.0, 3.0, 5.0];
        let events = vec![true, false, true, true, false];
        let covariates = Array2::from_shape_vec((5, 2), vec![
            1.0, 2.0,
            3.0, 4.0,
            5.0, 6.0,
            7.0, 8.0,
            9.0, 10.0,
        ]).unwrap();

        SurvivalData::new(times, events, covariates).unwrap()
    }

    #[test]
    fn test_survival_data_creation() {
        let data = create_test_data();
        assert_eq!(data.n_samples(), 5);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.n_events(), 3);
        assert_eq!(data.event_times(), vec![1.0, 3.0]);
        assert_eq!(data.unique_times(), vec![1.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_event_groups() {
        let data = create_test_data();
        let groups = data.event_groups();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].events, vec![0]);
        assert_eq!(groups[0].risk_set, vec![0, 1, 2, 3, 4]);
        assert_eq!(groups[1].time, 3.0);
        assert_eq!(groups[1].events, vec![2, 3]);
        assert_eq!(groups[1].risk_set, vec![2, 3, 4]);
    }

    #[test]
    fn test_invalid_dimensions() {
        let times = vec![1.0, 2.0];
        let events = vec![true];
        let covariates = Array2::zeros((2, 2));

        assert!(SurvivalData::new(times, events, covariates).is_err());
    }

    #[test]
    fn test_invalid_times() {
        let covariates = Array2::zeros((2, 2));
        assert!(SurvivalData::new(vec![-1.0, 2.0], vec![true, false], covariates.clone()).is_err());
        assert!(SurvivalData::new(vec![0.0, 2.0], vec![true, false], covariates).is_err());
    }

    #[test]
    fn test_feature_name_count_checked() {
        let data = create_test_data();
        assert!(data.clone().with_feature_names(vec!["age".into()]).is_err());

        let named = data.with_feature_names(vec!["age".into(), "college".into()]).unwrap();
        assert_eq!(named.feature_names().unwrap()[1], "college");
    }

    #[test]
    fn test_subset() {
        let data = create_test_data();
        let subset = data.subset(&[0, 2, 4]).unwrap();

        assert_eq!(subset.n_samples(), 3);
        assert_eq!(subset.times()[0], 1.0);
        assert_eq!(subset.times()[1], 3.0);
        assert_eq!(subset.times()[2], 5.0);
        assert!(data.subset(&[7]).is_err());
    }

    #[test]
    fn test_centering() {
        let mut data = create_test_data();
        let means = data.center_covariates().unwrap();

        for j in 0..data.n_features() {
            let col_mean = data.covariates().column(j).mean().unwrap();
            assert_relative_eq!(col_mean, 0.0, epsilon = 1e-10);
        }

        assert_relative_eq!(means[0], 5.0, epsilon = 1e-10);
        assert_relative_eq!(means[1], 6.0, epsilon = 1e-10);
    }
}
