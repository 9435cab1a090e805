//! `tm-analysis` - Hardware detection and performance analysis for tilemul.
//!
//! This crate provides:
//! - `HardwareInfo`: core counts, cache sizes and the cache-derived tile size
//! - `PerformanceAnalyzer`: speedup, efficiency, granularity, GFLOPS and
//!   Amdahl's Law projections from measured run times
//! - Benchmark sweep planning (`process_counts`)
//! - Terminal tables plus CSV and JSON export of results
//!
//! Nothing here runs a multiply; it only consumes elapsed times.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod hardware;
pub mod report;

// Re-export primary types at the crate root for convenience.
pub use analyzer::{
    amdahl_speedup, fraction_from_speedup, gflops, process_counts, BenchmarkResult, Granularity,
    PerformanceAnalyzer,
};
pub use error::{AnalysisError, Result};
pub use hardware::{format_bytes, optimal_tile_size, HardwareInfo};
pub use report::BenchmarkReport;
