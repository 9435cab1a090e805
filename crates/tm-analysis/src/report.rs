//! Terminal tables and file export for benchmark results.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::analyzer::{BenchmarkResult, PerformanceAnalyzer};
use crate::error::{AnalysisError, Result};

pub const CSV_HEADER: &str =
    "Processes,Time(s),Speedup_Exp,Speedup_Amdahl,Efficiency,GFLOPS,Granularity";

const WIDTH: usize = 60;

/// One CSV line (no trailing newline) for a result.
pub fn csv_row(result: &BenchmarkResult) -> String {
    format!(
        "{},{:.6},{:.4},{:.4},{:.4},{:.3},{}",
        result.workers,
        result.time_seconds,
        result.speedup_exp,
        result.speedup_amdahl,
        result.efficiency,
        result.gflops,
        result.granularity,
    )
}

/// Header plus one line per result.
pub fn to_csv(results: &[BenchmarkResult]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for result in results {
        csv.push_str(&csv_row(result));
        csv.push('\n');
    }
    csv
}

/// Write the analyzer's results as CSV. Fails if there are none.
pub fn export_csv(analyzer: &PerformanceAnalyzer, path: impl AsRef<Path>) -> Result<()> {
    let results = analyzer.results();
    if results.is_empty() {
        return Err(AnalysisError::NoResults);
    }
    let path = path.as_ref();
    fs::write(path, to_csv(results))?;
    tracing::info!(path = %path.display(), rows = results.len(), "exported CSV");
    Ok(())
}

/// Everything the analyzer knows, in a serializable form.
#[derive(Debug, Serialize)]
pub struct BenchmarkReport<'a> {
    pub matrix_size: usize,
    pub tile_size: usize,
    pub sequential_time: Option<f64>,
    pub theoretical_fraction: f64,
    pub empirical_fraction: Option<f64>,
    pub max_theoretical_speedup: f64,
    pub results: &'a [BenchmarkResult],
}

impl<'a> BenchmarkReport<'a> {
    pub fn new(analyzer: &'a PerformanceAnalyzer, matrix_size: usize, tile_size: usize) -> Self {
        BenchmarkReport {
            matrix_size,
            tile_size,
            sequential_time: analyzer.sequential_time(),
            theoretical_fraction: analyzer.theoretical_fraction(),
            empirical_fraction: analyzer.empirical_fraction(),
            max_theoretical_speedup: analyzer.max_theoretical_speedup(),
            results: analyzer.results(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON. Fails if there are no results.
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.results.is_empty() {
            return Err(AnalysisError::NoResults);
        }
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "exported JSON report");
        Ok(())
    }
}

/// A title centered between two rules.
pub fn header(title: &str) -> String {
    let rule = "=".repeat(WIDTH);
    format!("{rule}\n{title:^width$}\n{rule}\n", width = WIDTH)
}

fn metric_row(out: &mut String, name: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "| {name:<20} | {value:<15} |");
}

fn metric_table_start(out: &mut String, title: &str) {
    out.push_str(&header(title));
    metric_row(out, "Metric", "Value");
    let _ = writeln!(out, "{}", "-".repeat(40));
}

/// Time and throughput of a single-worker run.
pub fn sequential_table(result: &BenchmarkResult) -> String {
    let mut out = String::new();
    metric_table_start(&mut out, "SEQUENTIAL RESULTS (P=1)");
    metric_row(&mut out, "Time (s)", format!("{:.6}", result.time_seconds));
    metric_row(&mut out, "GFLOPS", format!("{:.3}", result.gflops));
    out.push_str(&"=".repeat(WIDTH));
    out
}

/// Metrics of one parallel run against its sequential reference.
pub fn parallel_table(result: &BenchmarkResult, sequential_time: Option<f64>) -> String {
    let mut out = String::new();
    metric_table_start(&mut out, "PARALLEL RESULTS");
    metric_row(&mut out, "Processes", result.workers);
    metric_row(&mut out, "Time (s)", format!("{:.6}", result.time_seconds));
    metric_row(&mut out, "GFLOPS", format!("{:.3}", result.gflops));
    metric_row(&mut out, "Speedup", format!("{:.2}x", result.speedup_exp));
    metric_row(&mut out, "Efficiency", format!("{:.1}%", result.efficiency * 100.0));
    metric_row(&mut out, "Granularity", result.granularity);
    if let Some(seq) = sequential_time {
        metric_row(&mut out, "Sequential time (s)", format!("{seq:.6}"));
    }
    out.push_str(&"=".repeat(WIDTH));
    out
}

/// Assumed and measured parallel fraction.
pub fn fraction_table(analyzer: &PerformanceAnalyzer) -> String {
    let mut out = header("PARALLEL FRACTION (f)");
    let theoretical = analyzer.theoretical_fraction();
    let _ = writeln!(
        out,
        "{:<35}{theoretical:.3} ({:.1}% parallel)",
        "f (assumed):",
        theoretical * 100.0
    );
    match analyzer.empirical_fraction() {
        Some(f) => {
            let _ = writeln!(out, "{:<35}{f:.3} ({:.1}% parallel)", "f (measured):", f * 100.0);
            let _ = writeln!(out, "{:<35}from the two-process speedup", "Method:");
        }
        None => {
            let _ = writeln!(out, "{:<35}not measured (needs a P=2 run)", "f (measured):");
        }
    }
    out.push_str(&"=".repeat(WIDTH));
    out
}

/// Full sweep report: sequential table, comparison table, parallel
/// fraction and a closing summary.
pub fn benchmark_table(analyzer: &PerformanceAnalyzer) -> String {
    let results = analyzer.results();
    if results.is_empty() {
        return "No results to show.".to_string();
    }

    let mut out = String::new();
    if let Some(first) = results.first().filter(|r| r.workers == 1) {
        out.push_str(&sequential_table(first));
        out.push_str("\n\n");
    }

    out.push_str(&header("PARALLEL COMPARISON"));
    let _ = writeln!(
        out,
        "| {:<10} | {:<12} | {:<12} | {:<14} | {:<12} | {:<12} |",
        "Processes", "Time (s)", "Speedup Exp", "Speedup Amdahl", "Efficiency", "Granularity"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));
    for r in results {
        let _ = writeln!(
            out,
            "| {:<10} | {:<12.6} | {:<12} | {:<14} | {:<12} | {:<12} |",
            r.workers,
            r.time_seconds,
            format!("{:.2}x", r.speedup_exp),
            format!("{:.2}x", r.speedup_amdahl),
            format!("{:.1}%", r.efficiency * 100.0),
            r.granularity,
        );
    }
    out.push_str(&"=".repeat(WIDTH));
    out.push_str("\n\n");
    out.push_str(&fraction_table(analyzer));

    if let [_, .., best] = results {
        out.push_str("\n\n");
        out.push_str(&header("SUMMARY"));
        let _ = writeln!(
            out,
            "{:<35}{:.2}x with {} processes",
            "Best observed speedup:", best.speedup_exp, best.workers
        );
        let _ = writeln!(
            out,
            "{:<35}{:.2}x (P -> infinity)",
            "Amdahl maximum speedup:",
            analyzer.max_theoretical_speedup()
        );
        let _ = writeln!(
            out,
            "{:<35}{:.1}%",
            "Sequential fraction:",
            (1.0 - analyzer.parallel_fraction()) * 100.0
        );
        out.push_str(&"=".repeat(WIDTH));
    }
    out
}
