//! Network throughput from `/proc/net/dev` counters.

use super::read_small_file;
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

const NET_DEV_PATH: &str = "/proc/net/dev";

/// Cumulative byte counters of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Counters for `iface`: receive bytes are the first column after the colon,
/// transmit bytes the ninth
pub fn parse_counters(content: &str, iface: &str) -> Option<NetCounters> {
    content.lines().find_map(|line| {
        let (name, stats) = line.split_once(':')?;
        if name.trim() != iface {
            return None;
        }
        let columns: Vec<u64> = stats
            .split_whitespace()
            .map(|c| c.parse().unwrap_or(0))
            .collect();
        if columns.len() < 9 {
            return None;
        }
        Some(NetCounters {
            rx_bytes: columns[0],
            tx_bytes: columns[8],
        })
    })
}

/// First interface listed that is not loopback
pub fn first_interface(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.trim())
        .find(|name| !name.is_empty() && *name != "lo" && !name.contains('|'))
        .map(str::to_string)
}

/// KiB/s between two readings `interval` apart; counter resets count as 0
fn rate(now: u64, before: u64, interval: Duration) -> u64 {
    let secs = interval.as_secs().max(1);
    now.saturating_sub(before) / (1024 * secs)
}

pub fn format_rates(rx: u64, tx: u64) -> String {
    format!("↓{:5} KiB/s ↑{:4} KiB/s", rx, tx)
}

/// Reports the rates since the previous call; the first call reports zero
#[derive(Debug, Clone)]
pub struct NetSampler {
    path: PathBuf,
    iface: Option<String>,
    interval: Duration,
    previous: Option<NetCounters>,
}

impl NetSampler {
    /// `iface` of `None` picks the first non-loopback interface
    pub fn new(iface: Option<String>, interval: Duration) -> Self {
        Self::with_path(NET_DEV_PATH, iface, interval)
    }

    pub fn with_path(path: impl Into<PathBuf>, iface: Option<String>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            iface,
            interval,
            previous: None,
        }
    }

    pub fn interface(&self) -> Option<&str> {
        self.iface.as_deref()
    }

    pub fn sample(&mut self) -> String {
        let content = read_small_file(&self.path, 16 * 1024);
        if self.iface.is_none() {
            self.iface = first_interface(&content);
            if let Some(iface) = &self.iface {
                debug!("Reporting throughput of {}", iface);
            }
        }

        let current = self
            .iface
            .as_deref()
            .and_then(|iface| parse_counters(&content, iface))
            .unwrap_or(NetCounters {
                rx_bytes: 0,
                tx_bytes: 0,
            });

        match self.previous.replace(current) {
            Some(previous) => format_rates(
                rate(current.rx_bytes, previous.rx_bytes, self.interval),
                rate(current.tx_bytes, previous.tx_bytes, self.interval),
            ),
            None => format_rates(0, 0),
        }
    }
}
