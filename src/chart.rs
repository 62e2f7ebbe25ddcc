//! Rendering of the popularity charts

use crate::{
    config::PlotConfig,
    trends::{TermKind, Trends},
    MatchCount, Result, Year,
};
use anyhow::Context;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// Chart size in pixels, with a 3:2 aspect ratio
const CHART_SIZE: (u32, u32) = (960, 640);

/// Draw both charts in the output directory, file names being suffixed with
/// `date`, and tell where they were saved
pub fn render_all(config: &PlotConfig, trends: &Trends, date: &str) -> Result<[PathBuf; 2]> {
    anyhow::ensure!(!trends.years().is_empty(), "there is no year to plot");
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("creating output directory {}", config.output_dir.display())
    })?;

    // Compute everything before drawing anything
    let absolute = absolute_series(config, trends);
    let relative = relative_series(config, trends)?;

    let absolute_path = (config.output_dir)
        .join(format!("f-measure-google-scholar-change-abs-{date}.svg"));
    draw_absolute(&absolute_path, trends.years(), &absolute)
        .with_context(|| format!("drawing {}", absolute_path.display()))?;
    log::info!("Saved absolute counts to {}", absolute_path.display());

    let relative_path = (config.output_dir).join(format!("google-scholar-percentage-{date}.svg"));
    draw_relative(&relative_path, trends.years(), &relative)
        .with_context(|| format!("drawing {}", relative_path.display()))?;
    log::info!("Saved percentages to {}", relative_path.display());

    Ok([absolute_path, relative_path])
}

/// Line of a chart
#[derive(Clone, Debug, PartialEq)]
pub struct Series<T> {
    /// Legend
    pub label: String,

    /// Value for each year
    pub values: Vec<T>,
}

/// Lines of the absolute chart: the combined F-measure terms, then every
/// other measure that isn't excluded, sorted by label
pub fn absolute_series(config: &PlotConfig, trends: &Trends) -> Vec<Series<MatchCount>> {
    let mut others = trends
        .labels_of_kind(TermKind::Other)
        .filter(|label| !config.is_excluded(label))
        .collect::<Vec<_>>();
    others.sort_unstable();

    std::iter::once(Series {
        label: COMBINED_LABEL.to_owned(),
        values: trends.disjunction_max(),
    })
    .chain(others.into_iter().map(|label| Series {
        label: display_label(label),
        values: trends
            .counts(label)
            .expect("label comes from the same trends")
            .to_vec(),
    }))
    .collect()
}

/// Lines of the percentage chart: share of every bare F-measure term
pub fn relative_series(config: &PlotConfig, trends: &Trends) -> Result<Vec<Series<f64>>> {
    let totals = trends.totals(config);
    trends
        .labels_of_kind(TermKind::FMeasure)
        .map(|label| {
            let values = trends.percentages(label, &totals)?;
            log::debug!("Share of {label} per year: {values:?}");
            Ok(Series {
                label: capitalize(label),
                values,
            })
        })
        .collect()
}

/// Legend of the combined F-measure terms
const COMBINED_LABEL: &str = "All F-measure terms";

/// Human-readable legend of a measure
pub fn display_label(label: &str) -> String {
    let label = capitalize(&label.replace('+', " "))
        .replace("auc", "AUC")
        .replace("Auc", "AUC")
        .replace("roc", "ROC");
    // Error rate and misclassification rate are the same measure
    if label.contains("Error") {
        "Error/misclassification rate".to_owned()
    } else {
        label
    }
}

/// Upper-case the first character and lower-case the others
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Horizontal axis range
fn year_range(years: &[Year]) -> std::ops::Range<i32> {
    let first = years.iter().copied().min().unwrap_or_default();
    let last = years.iter().copied().max().unwrap_or_default();
    (i32::from(first) - 1)..(i32::from(last) + 1)
}

/// Split yearly counts into runs of consecutive non-zero counts
///
/// Zero counts have no place on a logarithmic scale, and lines should not run
/// across the years where they are missing.
fn nonzero_runs(years: &[Year], counts: &[MatchCount]) -> Vec<Vec<(i32, f64)>> {
    let mut runs = Vec::new();
    let mut run = Vec::new();
    for (&year, &count) in years.iter().zip(counts) {
        if count > 0 {
            run.push((i32::from(year), count as f64));
        } else if !run.is_empty() {
            runs.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }
    runs
}

/// Draw the absolute chart, with a logarithmic vertical axis
fn draw_absolute(path: &Path, years: &[Year], series: &[Series<MatchCount>]) -> Result<()> {
    let max = (series.iter())
        .flat_map(|series| series.values.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Number of matches per year", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(year_range(years), (1.0..max as f64 * 2.0).log_scale())?;
    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("Number of matches")
        .axis_desc_style(("sans-serif", 20))
        .draw()?;

    for (idx, series) in series.iter().enumerate() {
        // The combined F-measure line comes first and stands out
        let style = if idx == 0 {
            BLACK.stroke_width(3)
        } else {
            Palette99::pick(idx - 1).stroke_width(2)
        };
        // The legend goes with the first run, even if there is none to draw
        let mut runs = nonzero_runs(years, &series.values).into_iter();
        let first = runs.next().unwrap_or_default();
        chart
            .draw_series(LineSeries::new(first, style).point_size(2))?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        for run in runs {
            chart.draw_series(LineSeries::new(run, style).point_size(2))?;
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .draw()?;
    root.present()?;
    Ok(())
}

/// Draw the percentage chart
fn draw_relative(path: &Path, years: &[Year], series: &[Series<f64>]) -> Result<()> {
    let max = (series.iter())
        .flat_map(|series| series.values.iter().copied())
        .fold(1.0, f64::max);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("F-measure matches versus all measures", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(year_range(years), 0.0..max * 1.1)?;
    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("Percentage")
        .axis_desc_style(("sans-serif", 20))
        .draw()?;

    for (idx, series) in series.iter().enumerate() {
        let style = Palette99::pick(idx).stroke_width(2);
        let points = (years.iter().zip(&series.values))
            .map(|(&year, &percentage)| (i32::from(year), percentage));
        chart
            .draw_series(LineSeries::new(points, style))?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXCLUDED_LABELS;

    fn plot_config(output_dir: &Path) -> PlotConfig {
        PlotConfig {
            input: PathBuf::from("unused.csv"),
            output_dir: output_dir.to_owned(),
            excluded: DEFAULT_EXCLUDED_LABELS.iter().map(|&label| label.into()).collect(),
        }
    }

    async fn sample_trends() -> Trends {
        Trends::read(
            &b"year,error+rate,misclassification+rate,auc+AND+roc,area+under+the+curve,f-measure,f-score,f-measure+OR+f-score\n\
               2000,90,5,7,30,10,4,12\n\
               2001,80,6,8,0,20,6,24\n"[..],
        )
        .await
        .unwrap()
    }

    #[test]
    fn legends() {
        assert_eq!(display_label("error+rate"), "Error/misclassification rate");
        assert_eq!(display_label("auc+AND+roc"), "AUC and ROC");
        assert_eq!(
            display_label("receiver+operating+characteristic"),
            "Receiver operating characteristic"
        );
        assert_eq!(display_label("precision-recall"), "Precision-recall");
        assert_eq!(capitalize("f1-score"), "F1-score");
    }

    #[test]
    fn zero_counts_split_lines() {
        let years = [2000, 2001, 2002, 2003, 2004, 2005];
        assert_eq!(
            nonzero_runs(&years, &[0, 3, 4, 0, 0, 7]),
            [vec![(2001, 3.0), (2002, 4.0)], vec![(2005, 7.0)]]
        );
        assert_eq!(
            nonzero_runs(&years, &[1, 2, 3, 4, 5, 6]),
            [(2000..=2005).zip(1..).map(|(year, count)| (year, count as f64)).collect::<Vec<_>>()]
        );
        assert!(nonzero_runs(&years, &[0; 6]).is_empty());
    }

    #[tokio::test]
    async fn absolute_lines() {
        let dir = tempfile::tempdir().unwrap();
        let series = absolute_series(&plot_config(dir.path()), &sample_trends().await);
        let labels = series.iter().map(|s| s.label.as_str()).collect::<Vec<_>>();
        assert_eq!(
            labels,
            [
                "All F-measure terms",
                "Area under the curve",
                "Error/misclassification rate"
            ]
        );
        assert_eq!(series[0].values, [12, 24]);
        assert_eq!(series[1].values, [30, 0]);
    }

    #[tokio::test]
    async fn relative_lines() {
        let dir = tempfile::tempdir().unwrap();
        let series = relative_series(&plot_config(dir.path()), &sample_trends().await).unwrap();
        let labels = series.iter().map(|s| s.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, ["F-measure", "F-score"]);
        // Totals are 146 and 130 once excluded measures are left out
        assert!((series[0].values[0] - 1000.0 / 146.0).abs() < 1e-9);
        assert!((series[1].values[1] - 600.0 / 130.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn charts_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("charts");
        let paths = render_all(&plot_config(&output_dir), &sample_trends().await, "20230409").unwrap();
        assert_eq!(
            paths,
            [
                output_dir.join("f-measure-google-scholar-change-abs-20230409.svg"),
                output_dir.join("google-scholar-percentage-20230409.svg"),
            ]
        );
        for path in paths {
            let svg = std::fs::read_to_string(&path).unwrap();
            assert!(svg.contains("<svg"), "{} is not an SVG file", path.display());
            assert!(svg.contains("F-measure"));
        }
    }
}
