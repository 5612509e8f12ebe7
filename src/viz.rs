//! Chart rendering with Plotters and the console report

use crate::pipeline::{
    PipelineOutput, AGE, CHECKING_ACCOUNT, CLUSTER_COLUMN, CREDIT_AMOUNT, DURATION, HOUSING,
    PURPOSE, SAVING_ACCOUNTS,
};
use crate::summary::{histogram, GroupMean, GroupQuartiles, HistogramBin};
use crate::table::{Column, RecordTable};
use anyhow::Context;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, MAGENTA, CYAN];

const BAR_COLOR: RGBColor = RGBColor(25, 118, 194);
const MISSING_COLOR: RGBColor = RGBColor(200, 200, 200);

/// Display order of the savings levels, missing first
pub const SAVINGS_ORDER: [&str; 5] = ["unknown", "little", "moderate", "quite rich", "rich"];
/// Display order of the checking levels, missing first
pub const CHECKING_ORDER: [&str; 4] = ["unknown", "little", "moderate", "rich"];

fn cluster_color(cluster: usize) -> RGBColor {
    CLUSTER_COLORS[cluster % CLUSTER_COLORS.len()]
}

fn padded_range(values: &[f64], pad: f64) -> std::ops::Range<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let span = if max > min { max - min } else { 1.0 };
    (min - span * pad)..(max + span * pad)
}

// label of an integer axis position, blank elsewhere
fn category_label(labels: &[String], v: f64) -> String {
    let idx = v.round();
    if (v - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

/// Scatter plot of two numeric columns colored by cluster label
pub fn create_cluster_scatter(
    table: &RecordTable,
    x_column: &str,
    y_column: &str,
    output_path: &Path,
) -> anyhow::Result<()> {
    let xs = table.numeric(x_column)?;
    let ys = table.numeric(y_column)?;
    let labels = match table.require(CLUSTER_COLUMN)? {
        Column::Label(labels) => labels,
        other => anyhow::bail!("'{}' is a {} column, not a label", CLUSTER_COLUMN, other.kind()),
    };
    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);

    let root = SVGBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Customer Clusters Based on {} and {}", x_column, y_column),
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(padded_range(xs, 0.05), padded_range(ys, 0.05))?;

    chart
        .configure_mesh()
        .x_desc(x_column)
        .y_desc(y_column)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for cluster in 0..n_clusters {
        let color = cluster_color(cluster);
        let points = xs
            .iter()
            .zip(ys)
            .zip(labels)
            .filter(|(_, &label)| label == cluster)
            .map(|((&x, &y), _)| (x, y));

        chart
            .draw_series(points.map(|p| Circle::new(p, 4, color.filled())))?
            .label(format!("Cluster {}", cluster))
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Histogram of precomputed bins
pub fn create_histogram_chart(
    bins: &[HistogramBin],
    title: &str,
    x_desc: &str,
    output_path: &Path,
) -> anyhow::Result<()> {
    let lower = bins.first().map_or(0.0, |b| b.lower);
    let upper = bins.last().map_or(1.0, |b| b.upper);
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(1).max(1) as f64;

    let root = SVGBackend::new(output_path, (700, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lower..upper, 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Count")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(bins.iter().map(|bin| {
        Rectangle::new(
            [(bin.lower, 0.0), (bin.upper, bin.count as f64)],
            BAR_COLOR.mix(0.7).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Horizontal bars of group means, highest mean on top
pub fn create_group_mean_chart(
    means: &[GroupMean],
    title: &str,
    value_desc: &str,
    output_path: &Path,
) -> anyhow::Result<()> {
    let n = means.len();
    // bottom to top
    let labels: Vec<String> = means.iter().rev().map(|g| g.label.clone()).collect();
    let max_mean = means.iter().map(|g| g.mean).fold(0.0, f64::max).max(1.0);

    let root = SVGBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..(max_mean * 1.1), -0.5f64..(n as f64 - 0.5))?;

    let y_fmt = |v: &f64| category_label(&labels, *v);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n.max(1))
        .y_label_formatter(&y_fmt)
        .x_desc(value_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(means.iter().rev().enumerate().map(|(i, group)| {
        let y = i as f64;
        Rectangle::new([(0.0, y - 0.4), (group.mean, y + 0.4)], BAR_COLOR.filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Box-and-whisker chart of per-group quartiles
pub fn create_quartile_chart(
    groups: &[GroupQuartiles],
    title: &str,
    x_desc: &str,
    y_desc: &str,
    output_path: &Path,
) -> anyhow::Result<()> {
    let n = groups.len();
    let labels: Vec<String> = groups.iter().map(|g| g.label.clone()).collect();
    let extremes: Vec<f64> = groups.iter().flat_map(|g| [g.min, g.max]).collect();

    let root = SVGBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), padded_range(&extremes, 0.05))?;

    let x_fmt = |v: &f64| category_label(&labels, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.max(1))
        .x_label_formatter(&x_fmt)
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(groups.iter().enumerate().map(|(i, g)| {
        let x = i as f64;
        Rectangle::new([(x - 0.3, g.q25), (x + 0.3, g.q75)], BAR_COLOR.mix(0.4).filled())
    }))?;
    chart.draw_series(groups.iter().enumerate().flat_map(|(i, g)| {
        let x = i as f64;
        [
            PathElement::new(vec![(x - 0.3, g.median), (x + 0.3, g.median)], BLACK.stroke_width(2)),
            PathElement::new(vec![(x, g.min), (x, g.q25)], BLACK.stroke_width(1)),
            PathElement::new(vec![(x, g.q75), (x, g.max)], BLACK.stroke_width(1)),
        ]
    }))?;

    root.present()?;
    Ok(())
}

fn correlation_color(r: f64) -> RGBColor {
    if r.is_nan() {
        return MISSING_COLOR;
    }
    let t = r.abs().min(1.0);
    let fade = |full: u8| (255.0 - (255.0 - full as f64) * t).round() as u8;
    if r >= 0.0 {
        RGBColor(fade(8), fade(76), fade(141))
    } else {
        RGBColor(fade(178), fade(24), fade(43))
    }
}

/// Annotated heatmap of a correlation matrix
pub fn create_correlation_heatmap(
    columns: &[String],
    values: &ndarray::Array2<f64>,
    output_path: &Path,
) -> anyhow::Result<()> {
    let n = columns.len();

    let root = SVGBackend::new(output_path, (900, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation Heatmap of Financial Features", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(130)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), -0.5f64..(n as f64 - 0.5))?;

    let fmt = |v: &f64| category_label(columns, *v);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n.max(1))
        .y_labels(n.max(1))
        .x_label_formatter(&fmt)
        .y_label_formatter(&fmt)
        .draw()?;

    let cells: Vec<(usize, usize, f64)> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| (i, j, values[[i, j]]))
        .collect();

    chart.draw_series(cells.iter().map(|&(i, j, r)| {
        let (x, y) = (j as f64, i as f64);
        Rectangle::new(
            [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
            correlation_color(r).filled(),
        )
    }))?;
    chart.draw_series(cells.iter().map(|&(i, j, r)| {
        let text = if r.is_nan() {
            "n/a".to_string()
        } else {
            format!("{:.2}", r)
        };
        Text::new(text, (j as f64 - 0.2, i as f64), ("sans-serif", 12))
    }))?;

    root.present()?;
    Ok(())
}

/// Render every chart of the analysis into `output_dir`
///
/// # Returns
/// * Paths of the written SVG files
pub fn generate_visualization_report(
    output: &PipelineOutput,
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let mut written = Vec::new();
    let mut target = |name: &str| {
        let path = output_dir.join(name);
        written.push(path.clone());
        path
    };

    create_cluster_scatter(&output.table, AGE, CREDIT_AMOUNT, &target("customer_clusters.svg"))?;

    for (column, bins, title, file) in [
        (AGE, 20, "Age Distribution", "age_distribution.svg"),
        (CREDIT_AMOUNT, 30, "Credit Amount Distribution", "credit_amount_distribution.svg"),
        (DURATION, 15, "Distribution of Loan Duration", "loan_duration_distribution.svg"),
    ] {
        let values = output.table.numeric(column)?;
        create_histogram_chart(&histogram(values, bins), title, column, &target(file))?;
    }

    create_group_mean_chart(
        &output.group_mean(HOUSING, CREDIT_AMOUNT)?,
        "Average Credit Amount by Housing Type",
        "Average credit amount",
        &target("average_credit_amount_by_housing.svg"),
    )?;
    create_group_mean_chart(
        &output.group_mean(PURPOSE, CREDIT_AMOUNT)?,
        "Average Credit Amount by Loan Purpose",
        "Average credit amount",
        &target("average_credit_amount_by_loan_purpose.svg"),
    )?;

    create_quartile_chart(
        &output.group_quartiles(SAVING_ACCOUNTS, CREDIT_AMOUNT, &SAVINGS_ORDER)?,
        "Credit Amount by Savings Account Level",
        "Savings Account Level",
        "Credit Amount",
        &target("credit_amount_by_savings_account_level.svg"),
    )?;
    create_quartile_chart(
        &output.group_quartiles(CHECKING_ACCOUNT, CREDIT_AMOUNT, &CHECKING_ORDER)?,
        "Credit Amount by Checking Account Level",
        "Checking Account Level",
        "Credit Amount",
        &target("credit_amount_by_checking_account_level.svg"),
    )?;

    create_correlation_heatmap(
        &output.correlations.columns,
        &output.correlations.values,
        &target("correlation_heatmap.svg"),
    )?;

    info!(charts = written.len(), dir = %output_dir.display(), "charts rendered");
    Ok(written)
}

/// Print descriptive statistics and cluster statistics to console
pub fn print_report(output: &PipelineOutput) -> anyhow::Result<()> {
    let rows = output.table.height();

    println!("\n=== Missing Values ===");
    for (column, count) in &output.imputed {
        println!("  {:<18} {:>6}", column, count);
    }

    println!("\n=== Descriptive Statistics ===");
    println!(
        "  {:<18} {:>6} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in &output.summary {
        println!(
            "  {:<18} {:>6} {:>10.2} {:>10.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
            s.name, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
        );
    }

    for group in [HOUSING, PURPOSE] {
        println!("\n=== Average {} by {} ===", CREDIT_AMOUNT, group);
        for g in output.group_mean(group, CREDIT_AMOUNT)? {
            println!("  {:<22} {:>10.2}  (n={})", g.label, g.mean, g.count);
        }
    }

    for (group, order) in [
        (SAVING_ACCOUNTS, &SAVINGS_ORDER[..]),
        (CHECKING_ACCOUNT, &CHECKING_ORDER[..]),
    ] {
        println!("\n=== {} by {} ===", CREDIT_AMOUNT, group);
        println!(
            "  {:<12} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "Level", "n", "min", "25%", "50%", "75%", "max"
        );
        for g in output.group_quartiles(group, CREDIT_AMOUNT, order)? {
            println!(
                "  {:<12} {:>5} {:>9.0} {:>9.0} {:>9.0} {:>9.0} {:>9.0}",
                g.label, g.count, g.min, g.q25, g.median, g.q75, g.max
            );
        }
    }

    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", output.model.n_clusters);
    println!("Total applicants: {}", rows);
    println!("Within-cluster sum of squares (Inertia): {:.2}", output.model.inertia);
    match output.silhouette() {
        Some(score) => println!("Silhouette score: {:.3}", score),
        None => println!("Silhouette score: n/a"),
    }

    println!("\nCluster sizes:");
    for (i, &size) in output.model.cluster_sizes().iter().enumerate() {
        let percentage = (size as f64 / rows as f64) * 100.0;
        println!("  Cluster {}: {} applicants ({:.1}%)", i, size, percentage);
    }

    println!("\nCluster centroids (original units):");
    println!("  Cluster | {}", output.scaled.names.join(" | "));
    let centroids = output.raw_centroids()?;
    for (i, centroid) in centroids.outer_iter().enumerate() {
        let values: Vec<String> = centroid.iter().map(|v| format!("{:.1}", v)).collect();
        println!("  {:7} | {}", i, values.join(" | "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{run, PipelineConfig, SEX};
    use tempfile::tempdir;

    fn create_test_output() -> PipelineOutput {
        let table = RecordTable::new()
            .with_column(AGE, Column::Numeric(vec![25.0, 52.0, 23.0, 46.0, 31.0, 60.0]))
            .unwrap()
            .with_column(
                SEX,
                Column::text([Some("male"), Some("female"), Some("male"), Some("male"), Some("female"), Some("male")]),
            )
            .unwrap()
            .with_column(
                HOUSING,
                Column::text([Some("rent"), Some("own"), Some("rent"), Some("free"), Some("own"), Some("own")]),
            )
            .unwrap()
            .with_column(
                SAVING_ACCOUNTS,
                Column::text([None, Some("little"), None, Some("rich"), Some("little"), Some("moderate")]),
            )
            .unwrap()
            .with_column(
                CHECKING_ACCOUNT,
                Column::text([Some("little"), None, Some("moderate"), Some("little"), None, Some("rich")]),
            )
            .unwrap()
            .with_column(
                CREDIT_AMOUNT,
                Column::Numeric(vec![1000.0, 20000.0, 900.0, 18000.0, 2500.0, 15000.0]),
            )
            .unwrap()
            .with_column(DURATION, Column::Numeric(vec![6.0, 48.0, 4.0, 42.0, 12.0, 36.0]))
            .unwrap()
            .with_column(
                PURPOSE,
                Column::text([Some("radio/TV"), Some("car"), Some("education"), Some("car"), Some("radio/TV"), Some("business")]),
            )
            .unwrap();

        run(&table, &PipelineConfig::default().with_clusters(2)).unwrap()
    }

    #[test]
    fn test_create_cluster_scatter() {
        let output = create_test_output();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("clusters.svg");

        create_cluster_scatter(&output.table, AGE, CREDIT_AMOUNT, &path).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_cluster_scatter_requires_labels() {
        let output = create_test_output();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("clusters.svg");

        let unlabeled = output.decoded(HOUSING).unwrap().with_column(
            CLUSTER_COLUMN,
            Column::Numeric(vec![0.0; 6]),
        );
        let result = create_cluster_scatter(&unlabeled.unwrap(), AGE, CREDIT_AMOUNT, &path);
        assert!(result.is_err());
    }

    #[test]
    fn test_generate_visualization_report() {
        let output = create_test_output();
        let temp_dir = tempdir().unwrap();
        let charts_dir = temp_dir.path().join("images");

        let written = generate_visualization_report(&output, &charts_dir).unwrap();
        assert_eq!(written.len(), 9);
        for path in written {
            assert!(path.exists(), "{} was not written", path.display());
        }
    }

    #[test]
    fn test_correlation_color() {
        assert_eq!(correlation_color(0.0), RGBColor(255, 255, 255));
        assert_eq!(correlation_color(1.0), RGBColor(8, 76, 141));
        assert_eq!(correlation_color(-1.0), RGBColor(178, 24, 43));
        assert_eq!(correlation_color(f64::NAN), MISSING_COLOR);
    }

    #[test]
    fn test_print_report() {
        let output = create_test_output();
        assert!(print_report(&output).is_ok());
    }
}
