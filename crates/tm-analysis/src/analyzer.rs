use std::fmt;

use serde::Serialize;

use crate::config::{GIGA, THEORETICAL_F};

/// How much of a run's time went to useful work, judged by efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Granularity {
    /// Single worker; there is no parallel overhead to judge.
    #[serde(rename = "N/A")]
    NotApplicable,
    /// Efficiency above 0.8: little overhead per unit of work.
    Coarse,
    /// Efficiency above 0.5.
    Medium,
    /// Efficiency of 0.5 or less: overhead dominates.
    Fine,
}

impl Granularity {
    pub fn classify(workers: usize, efficiency: f64) -> Self {
        if workers <= 1 {
            Granularity::NotApplicable
        } else if efficiency > 0.8 {
            Granularity::Coarse
        } else if efficiency > 0.5 {
            Granularity::Medium
        } else {
            Granularity::Fine
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::NotApplicable => "N/A",
            Granularity::Coarse => "Coarse",
            Granularity::Medium => "Medium",
            Granularity::Fine => "Fine",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Metrics for one timed multiply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub workers: usize,
    pub time_seconds: f64,
    /// Sequential time divided by this run's time.
    pub speedup_exp: f64,
    /// Amdahl's Law prediction for this worker count.
    pub speedup_amdahl: f64,
    /// `speedup_exp / workers`.
    pub efficiency: f64,
    pub gflops: f64,
    pub granularity: Granularity,
}

/// Amdahl's Law: `S(P) = 1 / ((1 - f) + f / P)`.
///
/// `f` is clamped to `[0, 1]`; zero workers give a speedup of 1.
pub fn amdahl_speedup(workers: usize, f: f64) -> f64 {
    if workers == 0 {
        return 1.0;
    }
    let f = f.clamp(0.0, 1.0);
    1.0 / ((1.0 - f) + f / workers as f64)
}

/// Parallel fraction implied by a measured two-worker speedup,
/// `f = 2 (1 - 1/S2)`, clamped to `[0, 1]`.
///
/// A speedup of 1 or less says nothing about `f` and yields `None`.
pub fn fraction_from_speedup(speedup_2: f64) -> Option<f64> {
    if speedup_2 > 1.0 {
        Some((2.0 * (1.0 - 1.0 / speedup_2)).clamp(0.0, 1.0))
    } else {
        None
    }
}

/// Throughput of an `n x n` multiply: `2 n^3` floating-point operations.
pub fn gflops(n: usize, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * n * n * n / (seconds * GIGA)
}

/// Worker counts for a benchmark sweep: 1, then powers of two up to `max`,
/// then `max` itself if it is not a power of two.
pub fn process_counts(max: usize) -> Vec<usize> {
    let max = max.max(1);
    let mut counts: Vec<usize> = std::iter::successors(Some(1usize), |p| p.checked_mul(2))
        .take_while(|&p| p <= max)
        .collect();
    if counts.last() != Some(&max) {
        counts.push(max);
    }
    counts
}

/// Turns measured run times into speedup, efficiency and Amdahl projections.
///
/// Results are judged against the time given to
/// [`set_sequential_time`](Self::set_sequential_time). The first two-worker
/// result with a speedup above 1 fixes an empirical parallel fraction, which
/// replaces the theoretical one for every later projection.
#[derive(Debug, Clone)]
pub struct PerformanceAnalyzer {
    sequential_time: f64,
    theoretical_f: f64,
    empirical_f: Option<f64>,
    results: Vec<BenchmarkResult>,
}

impl PerformanceAnalyzer {
    pub fn new() -> Self {
        Self::with_theoretical_fraction(THEORETICAL_F)
    }

    pub fn with_theoretical_fraction(f: f64) -> Self {
        PerformanceAnalyzer {
            sequential_time: 0.0,
            theoretical_f: f.clamp(0.0, 1.0),
            empirical_f: None,
            results: Vec::new(),
        }
    }

    pub fn set_sequential_time(&mut self, seconds: f64) {
        self.sequential_time = seconds;
    }

    /// Reference time, if one has been set.
    pub fn sequential_time(&self) -> Option<f64> {
        (self.sequential_time > 0.0).then_some(self.sequential_time)
    }

    /// Record a run of `workers` processes that took `seconds` on an
    /// `n x n` multiply.
    pub fn analyze_result(&mut self, workers: usize, seconds: f64, n: usize) -> &BenchmarkResult {
        let speedup_exp = match self.sequential_time() {
            Some(sequential) if seconds > 0.0 => sequential / seconds,
            _ => 1.0,
        };

        if workers == 2 && self.empirical_f.is_none() {
            self.empirical_f = fraction_from_speedup(speedup_exp);
            if let Some(f) = self.empirical_f {
                tracing::debug!(speedup = speedup_exp, f, "measured parallel fraction");
            }
        }

        let efficiency = speedup_exp / workers.max(1) as f64;
        self.results.push(BenchmarkResult {
            workers,
            time_seconds: seconds,
            speedup_exp,
            speedup_amdahl: amdahl_speedup(workers, self.parallel_fraction()),
            efficiency,
            gflops: gflops(n, seconds),
            granularity: Granularity::classify(workers, efficiency),
        });
        &self.results[self.results.len() - 1]
    }

    /// The fraction used for projections: empirical once measured,
    /// theoretical before.
    pub fn parallel_fraction(&self) -> f64 {
        self.empirical_f.unwrap_or(self.theoretical_f)
    }

    pub fn theoretical_fraction(&self) -> f64 {
        self.theoretical_f
    }

    pub fn empirical_fraction(&self) -> Option<f64> {
        self.empirical_f
    }

    /// Speedup limit as workers go to infinity, `1 / (1 - f)`.
    /// Infinite when `f` is 1.
    pub fn max_theoretical_speedup(&self) -> f64 {
        1.0 / (1.0 - self.parallel_fraction())
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    /// Forget all results, the sequential time and the empirical fraction.
    pub fn clear_results(&mut self) {
        self.results.clear();
        self.empirical_f = None;
        self.sequential_time = 0.0;
    }
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_amdahl() {
        assert_relative_eq!(amdahl_speedup(1, 0.98), 1.0);
        assert_relative_eq!(amdahl_speedup(4, 1.0), 4.0);
        assert_relative_eq!(amdahl_speedup(4, 0.0), 1.0);
        assert_relative_eq!(amdahl_speedup(2, 0.5), 1.0 / 0.75);
        assert_relative_eq!(amdahl_speedup(8, 0.98), 1.0 / ((1.0 - 0.98) + 0.98 / 8.0));
        assert_relative_eq!(amdahl_speedup(0, 0.9), 1.0);
        // Out-of-range fractions are clamped.
        assert_relative_eq!(amdahl_speedup(4, 1.5), 4.0);
        assert_relative_eq!(amdahl_speedup(4, -0.5), 1.0);
    }

    #[test]
    fn test_fraction_from_speedup() {
        assert_relative_eq!(fraction_from_speedup(2.0).unwrap(), 1.0);
        assert_relative_eq!(fraction_from_speedup(1.6).unwrap(), 0.75, epsilon = 1e-12);
        assert_eq!(fraction_from_speedup(1.0), None);
        assert_eq!(fraction_from_speedup(0.7), None);
        // Superlinear speedup still caps at 1.
        assert_relative_eq!(fraction_from_speedup(3.0).unwrap(), 1.0);
    }

    #[test]
    fn test_gflops() {
        assert_relative_eq!(gflops(1000, 2.0), 1.0);
        assert_relative_eq!(gflops(500, 0.25), 1.0);
        assert_eq!(gflops(500, 0.0), 0.0);
        assert_eq!(gflops(500, -1.0), 0.0);
    }

    #[test]
    fn test_granularity() {
        assert_eq!(Granularity::classify(1, 0.1), Granularity::NotApplicable);
        assert_eq!(Granularity::classify(2, 0.95), Granularity::Coarse);
        assert_eq!(Granularity::classify(2, 0.8), Granularity::Medium);
        assert_eq!(Granularity::classify(4, 0.51), Granularity::Medium);
        assert_eq!(Granularity::classify(4, 0.5), Granularity::Fine);
        assert_eq!(format!("{:>6}", Granularity::Fine), "  Fine");
    }

    #[test]
    fn test_process_counts() {
        assert_eq!(process_counts(1), vec![1]);
        assert_eq!(process_counts(0), vec![1]);
        assert_eq!(process_counts(2), vec![1, 2]);
        assert_eq!(process_counts(8), vec![1, 2, 4, 8]);
        assert_eq!(process_counts(6), vec![1, 2, 4, 6]);
        assert_eq!(process_counts(12), vec![1, 2, 4, 8, 12]);
    }

    #[test]
    fn test_analyze_sweep() {
        let mut analyzer = PerformanceAnalyzer::new();
        analyzer.set_sequential_time(8.0);

        let seq = analyzer.analyze_result(1, 8.0, 1000).clone();
        assert_relative_eq!(seq.speedup_exp, 1.0);
        assert_relative_eq!(seq.efficiency, 1.0);
        assert_eq!(seq.granularity, Granularity::NotApplicable);
        assert_relative_eq!(seq.gflops, 0.25);

        let two = analyzer.analyze_result(2, 5.0, 1000).clone();
        assert_relative_eq!(two.speedup_exp, 1.6);
        assert_relative_eq!(two.efficiency, 0.8);
        assert_eq!(two.granularity, Granularity::Medium);
        assert_relative_eq!(analyzer.empirical_fraction().unwrap(), 0.75, epsilon = 1e-12);
        assert_relative_eq!(two.speedup_amdahl, 1.6, epsilon = 1e-12);

        let four = analyzer.analyze_result(4, 4.0, 1000).clone();
        assert_relative_eq!(four.speedup_amdahl, 1.0 / (0.25 + 0.75 / 4.0), epsilon = 1e-12);
        assert_relative_eq!(four.efficiency, 0.5);
        assert_eq!(four.granularity, Granularity::Fine);
        assert_relative_eq!(analyzer.max_theoretical_speedup(), 4.0, epsilon = 1e-12);
        assert_eq!(analyzer.results().len(), 3);
    }

    #[test]
    fn test_empirical_fraction_is_measured_once() {
        let mut analyzer = PerformanceAnalyzer::new();
        analyzer.set_sequential_time(10.0);
        analyzer.analyze_result(2, 5.0, 100);
        analyzer.analyze_result(2, 8.0, 100);
        assert_relative_eq!(analyzer.empirical_fraction().unwrap(), 1.0);
    }

    #[test]
    fn test_slow_two_worker_run_keeps_theoretical_fraction() {
        let mut analyzer = PerformanceAnalyzer::new();
        analyzer.set_sequential_time(1.0);
        let r = analyzer.analyze_result(2, 2.0, 100).clone();
        assert_eq!(analyzer.empirical_fraction(), None);
        assert_relative_eq!(analyzer.parallel_fraction(), THEORETICAL_F);
        assert_relative_eq!(r.speedup_amdahl, amdahl_speedup(2, THEORETICAL_F));
        assert_relative_eq!(analyzer.max_theoretical_speedup(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_without_sequential_reference() {
        let mut analyzer = PerformanceAnalyzer::new();
        assert_eq!(analyzer.sequential_time(), None);
        let r = analyzer.analyze_result(4, 1.0, 10).clone();
        assert_relative_eq!(r.speedup_exp, 1.0);
        assert_relative_eq!(r.efficiency, 0.25);
    }

    #[test]
    fn test_clear_results() {
        let mut analyzer = PerformanceAnalyzer::new();
        analyzer.set_sequential_time(4.0);
        analyzer.analyze_result(2, 2.5, 10);
        analyzer.clear_results();
        assert!(analyzer.results().is_empty());
        assert_eq!(analyzer.empirical_fraction(), None);
        assert_eq!(analyzer.sequential_time(), None);
    }
}
