//! Battery state from `/sys/class/power_supply`.

use super::read_small_file;
use std::path::PathBuf;

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Shown when the battery is absent or reports no capacity
pub const NO_BATTERY: &str = "N/A N/A";

/// Four-letter state for a `status` file's content
pub fn state_token(status: &str) -> &'static str {
    if status.contains("Charging") {
        "CHRG"
    } else if status.contains("Full") {
        "FULL"
    } else {
        "BATT"
    }
}

pub fn format_battery(status: &str, capacity: &str) -> String {
    let capacity = capacity.trim_end_matches(['\n', '\r']);
    if capacity.is_empty() {
        return NO_BATTERY.to_string();
    }
    format!("{} {}%", state_token(status), capacity)
}

#[derive(Debug, Clone)]
pub struct BatterySampler {
    dir: PathBuf,
}

impl BatterySampler {
    /// `name` is the supply directory, for example `BAT0`
    pub fn new(name: &str) -> Self {
        Self::with_dir(PathBuf::from(POWER_SUPPLY_ROOT).join(name))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn sample(&self) -> String {
        if !self.dir.exists() {
            return NO_BATTERY.to_string();
        }
        let status = read_small_file(&self.dir.join("status"), 64);
        let capacity = read_small_file(&self.dir.join("capacity"), 64);
        format_battery(&status, &capacity)
    }
}
