use std::collections::BTreeSet;
use std::fmt;
use std::fs;

use serde::Serialize;

use crate::config::{MAX_TILE_SIZE, MIN_TILE_SIZE};
use crate::error::Result;

const CPUINFO_PATH: &str = "/proc/cpuinfo";
const CACHE_DIR: &str = "/sys/devices/system/cpu/cpu0/cache";

const DEFAULT_L1_CACHE: usize = 32 * 1024;
const DEFAULT_L2_CACHE: usize = 256 * 1024;
const DEFAULT_L3_CACHE: usize = 8 * 1024 * 1024;

/// What the host looks like to the tile-size heuristic and the reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    pub logical_cores: usize,
    /// Estimated: logical cores divided by the number of CPU packages.
    pub physical_cores: usize,
    pub l1_cache: usize,
    pub l2_cache: usize,
    pub l3_cache: usize,
    pub os_name: String,
    pub cpu_model: String,
}

impl HardwareInfo {
    /// Inspect the running machine.
    ///
    /// Core counts come from the standard library and `/proc/cpuinfo`, cache
    /// sizes from sysfs. Anything that cannot be read falls back to a typical
    /// value (32 KiB L1, 256 KiB L2, 8 MiB L3), so detection never fails.
    pub fn detect() -> Self {
        let logical = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let cpuinfo = fs::read_to_string(CPUINFO_PATH).ok();
        let cache = |index: u32| fs::read_to_string(format!("{CACHE_DIR}/index{index}/size")).ok();
        let info = Self::from_sources(
            logical,
            cpuinfo.as_deref(),
            [cache(0), cache(2), cache(3)],
        );
        tracing::debug!(?info, "detected hardware");
        info
    }

    /// Build from already-read sources: the logical core count, the contents
    /// of `/proc/cpuinfo`, and the sysfs `size` files for L1d, L2 and L3.
    pub fn from_sources(
        logical_cores: usize,
        cpuinfo: Option<&str>,
        cache_sizes: [Option<String>; 3],
    ) -> Self {
        let logical_cores = logical_cores.max(1);
        let physical_cores = match cpuinfo.map(count_packages) {
            Some(packages) if packages > 0 => (logical_cores / packages).max(1),
            _ => logical_cores,
        };
        let [l1, l2, l3] = cache_sizes;
        let size_or = |raw: Option<String>, default| {
            raw.as_deref().and_then(parse_cache_size).unwrap_or(default)
        };
        HardwareInfo {
            logical_cores,
            physical_cores,
            l1_cache: size_or(l1, DEFAULT_L1_CACHE),
            l2_cache: size_or(l2, DEFAULT_L2_CACHE),
            l3_cache: size_or(l3, DEFAULT_L3_CACHE),
            os_name: os_name().to_string(),
            cpu_model: cpuinfo
                .and_then(cpu_model)
                .unwrap_or_else(|| "Unknown CPU".to_string()),
        }
    }

    /// Tile edge for this machine's L1 cache; see [`optimal_tile_size`].
    pub fn optimal_tile_size(&self) -> usize {
        optimal_tile_size(self.l1_cache)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for HardwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tile = self.optimal_tile_size();
        writeln!(f, "{:<30}{}", "Operating system:", self.os_name)?;
        writeln!(f, "{:<30}{}", "CPU model:", self.cpu_model)?;
        writeln!(f, "{:<30}{}", "Logical cores:", self.logical_cores)?;
        writeln!(f, "{:<30}{}", "Physical cores (est.):", self.physical_cores)?;
        writeln!(f, "{:<30}{}", "L1 cache:", format_bytes(self.l1_cache as u64))?;
        writeln!(f, "{:<30}{}", "L2 cache:", format_bytes(self.l2_cache as u64))?;
        writeln!(f, "{:<30}{}", "L3 cache:", format_bytes(self.l3_cache as u64))?;
        write!(f, "{:<30}{tile}x{tile}", "Optimal tile size:")
    }
}

/// Largest power-of-two tile edge such that one tile each of A, B and C
/// (f64) fit in `l1_bytes`, rounded up and clamped to
/// `[MIN_TILE_SIZE, MAX_TILE_SIZE]`.
pub fn optimal_tile_size(l1_bytes: usize) -> usize {
    let elements = l1_bytes as f64 / (3.0 * std::mem::size_of::<f64>() as f64);
    let edge = elements.sqrt() as usize;
    edge.next_power_of_two().clamp(MIN_TILE_SIZE, MAX_TILE_SIZE)
}

/// Parse a sysfs cache size such as `32K`, `1280K` or `8M`.
pub fn parse_cache_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.as_bytes().last()? {
        b'K' | b'k' => (&raw[..raw.len() - 1], 1024),
        b'M' | b'm' => (&raw[..raw.len() - 1], 1024 * 1024),
        b'G' | b'g' => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    let value: usize = digits.parse().ok()?;
    value.checked_mul(multiplier).filter(|&bytes| bytes > 0)
}

/// Number of distinct `physical id` entries in `/proc/cpuinfo` contents.
pub fn count_packages(cpuinfo: &str) -> usize {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("physical id"))
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(_, id)| id.trim().parse::<u32>().ok())
        .collect::<BTreeSet<_>>()
        .len()
}

/// First `model name` in `/proc/cpuinfo` contents.
pub fn cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("model name"))
        .find_map(|line| line.split_once(':'))
        .map(|(_, model)| model.trim().to_string())
        .filter(|model| !model.is_empty())
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "Unknown",
    }
}

/// Human-readable byte count with two decimals (`32.00 KB`, `8.00 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}
