//! Memory usage via `/proc/meminfo`.

use super::{read_small_file, NOT_AVAILABLE};
use std::path::PathBuf;

const MEMINFO_PATH: &str = "/proc/meminfo";

/// kB per GiB
const KB_PER_GIB: u64 = 1024 * 1024;

/// Totals parsed from a meminfo file, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemoryInfo {
    /// Parses `/proc/meminfo` content. Lines that do not parse are skipped.
    pub fn parse(content: &str) -> Self {
        let mut info = MemoryInfo::default();
        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            match key {
                "MemTotal:" => info.total_kb = value,
                "MemAvailable:" => info.available_kb = value,
                _ => {}
            }
        }
        info
    }

    /// `"used/total"` in whole GiB, or `N/A` without a total
    pub fn display(&self) -> String {
        if self.total_kb == 0 {
            return NOT_AVAILABLE.to_string();
        }
        let used = self.total_kb.saturating_sub(self.available_kb) / KB_PER_GIB;
        let total = self.total_kb / KB_PER_GIB;
        format!("{:2}Gi/{:2}Gi", used, total)
    }
}

#[derive(Debug, Clone)]
pub struct MemorySampler {
    path: PathBuf,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self::with_path(MEMINFO_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn sample(&self) -> String {
        MemoryInfo::parse(&read_small_file(&self.path, 4096)).display()
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}
