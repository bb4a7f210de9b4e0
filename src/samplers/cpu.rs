//! CPU utilisation from `/proc/stat` deltas.

use super::read_small_file;
use std::path::PathBuf;

const STAT_PATH: &str = "/proc/stat";

/// Aggregate jiffy counters from the `cpu` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

impl CpuTimes {
    /// Parses the first line of `/proc/stat`:
    /// `cpu user nice system idle iowait irq softirq steal ...`
    pub fn parse(content: &str) -> Option<Self> {
        let line = content.lines().next()?;
        let mut fields = line.split_whitespace();
        if !fields.next()?.starts_with("cpu") {
            return None;
        }

        let mut values = [0u64; 8];
        for value in values.iter_mut() {
            *value = fields.next()?.parse().ok()?;
        }

        Some(Self {
            total: values.iter().sum(),
            idle: values[3],
        })
    }

    /// Busy percentage between an earlier sample and this one
    pub fn busy_percent_since(&self, earlier: &CpuTimes) -> u64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0;
        }
        let busy = total.saturating_sub(self.idle.saturating_sub(earlier.idle));
        (100 * busy / total).min(100)
    }
}

/// Keeps the previous sample between calls; the first call reports 0%
#[derive(Debug, Clone)]
pub struct CpuSampler {
    path: PathBuf,
    previous: Option<CpuTimes>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::with_path(STAT_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            previous: None,
        }
    }

    pub fn sample(&mut self) -> String {
        let Some(current) = CpuTimes::parse(&read_small_file(&self.path, 512)) else {
            return format!("{:3}%", 0);
        };
        let percent = match self.previous.replace(current) {
            Some(previous) => current.busy_percent_since(&previous),
            None => 0,
        };
        format!("{:3}%", percent)
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_T0: &str = "cpu  1000 0 500 8000 100 0 0 0 0 0\ncpu0 500 0 250 4000 50 0 0 0 0 0\n";
    const STAT_T1: &str = "cpu  1300 0 600 8500 100 0 0 0 0 0\ncpu0 650 0 300 4250 50 0 0 0 0 0\n";

    #[test]
    fn test_parse_first_line() {
        let times = CpuTimes::parse(STAT_T0).unwrap();
        assert_eq!(times.total, 9600);
        assert_eq!(times.idle, 8000);
    }

    #[test]
    fn test_parse_rejects_short_line() {
        assert_eq!(CpuTimes::parse("cpu 1 2 3\n"), None);
        assert_eq!(CpuTimes::parse("intr 1 2 3 4 5 6 7 8\n"), None);
        assert_eq!(CpuTimes::parse(""), None);
    }

    #[test]
    fn test_busy_percent() {
        let t0 = CpuTimes::parse(STAT_T0).unwrap();
        let t1 = CpuTimes::parse(STAT_T1).unwrap();
        // 900 jiffies elapsed, 500 of them idle
        assert_eq!(t1.busy_percent_since(&t0), 44);
        assert_eq!(t0.busy_percent_since(&t0), 0);
        // Counter went backwards
        assert_eq!(t0.busy_percent_since(&t1), 0);
    }

    #[test]
    fn test_sampler_first_reading_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stat");
        std::fs::write(&path, STAT_T0).unwrap();

        let mut sampler = CpuSampler::with_path(&path);
        assert_eq!(sampler.sample(), "  0%");

        std::fs::write(&path, STAT_T1).unwrap();
        assert_eq!(sampler.sample(), " 44%");
    }

    #[test]
    fn test_sampler_unreadable_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = CpuSampler::with_path(dir.path().join("missing"));
        assert_eq!(sampler.sample(), "  0%");
    }
}
