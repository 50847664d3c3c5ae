//! svg rendering of survival curves

use std::path::Path;

use plotters::prelude::*;

use crate::error::{Result, SurvivalError};
use crate::kaplan_meier::KaplanMeierEstimate;
use crate::predict::LabeledCurve;

const SIZE: (u32, u32) = (900, 600);
const COLORS: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, BLACK];

pub const SURVIVAL_TITLE: &str = "Probability of Survival at Time t";
pub const X_LABEL: &str = "Time t";
pub const Y_LABEL: &str = "Probability of Survival";

fn plot_err<E: std::fmt::Display>(e: E) -> SurvivalError {
    SurvivalError::plot(e.to_string())
}

/// turn (t, S(t)) points into a right-continuous staircase from (0, 1) out to `x_max`
fn step_points(points: impl IntoIterator<Item = (f64, f64)>, x_max: f64) -> Vec<(f64, f64)> {
    let mut out = vec![(0.0, 1.0)];
    let mut last = 1.0;
    for (t, s) in points {
        out.push((t, last));
        out.push((t, s));
        last = s;
    }
    out.push((x_max, last));
    out
}

/// one line per labeled curve, legend keyed by label
pub fn plot_survival_curves(path: impl AsRef<Path>, curves: &[LabeledCurve]) -> Result<()> {
    let x_max = curves
        .iter()
        .flat_map(|c| c.curve.times.iter().copied())
        .fold(1.0, f64::max);

    let root = SVGBackend::new(path.as_ref(), SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(SURVIVAL_TITLE, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0..x_max, 0.0..1.05)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .draw()
        .map_err(plot_err)?;

    for (idx, labeled) in curves.iter().enumerate() {
        let color = COLORS[idx % COLORS.len()];
        let points = labeled.curve.times.iter().copied().zip(labeled.curve.survival.iter().copied());
        chart
            .draw_series(LineSeries::new(step_points(points, x_max), color.stroke_width(2)))
            .map_err(plot_err)?
            .label(labeled.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// kaplan-meier staircase w/ its pointwise confidence band
pub fn plot_kaplan_meier(path: impl AsRef<Path>, estimate: &KaplanMeierEstimate) -> Result<()> {
    let x_max = estimate.steps.last().map(|s| s.time).unwrap_or(0.0).max(1.0);

    let root = SVGBackend::new(path.as_ref(), SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Kaplan-Meier Estimate", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0..x_max, 0.0..1.05)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .draw()
        .map_err(plot_err)?;

    let band = BLUE.mix(0.35);
    let lower = estimate.steps.iter().map(|s| (s.time, s.ci_lower));
    let upper = estimate.steps.iter().map(|s| (s.time, s.ci_upper));
    chart.draw_series(LineSeries::new(step_points(lower, x_max), band)).map_err(plot_err)?;
    chart.draw_series(LineSeries::new(step_points(upper, x_max), band)).map_err(plot_err)?;

    let survival = estimate.steps.iter().map(|s| (s.time, s.survival));
    chart
        .draw_series(LineSeries::new(step_points(survival, x_max), BLUE.stroke_width(2)))
        .map_err(plot_err)?
        .label("KM estimate")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}
