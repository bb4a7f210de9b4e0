//! Hottest sensor across `/sys/class/hwmon`.

use super::{read_small_file, NOT_AVAILABLE};
use std::path::PathBuf;

const HWMON_ROOT: &str = "/sys/class/hwmon";
const MAX_HWMON: usize = 15;
const MAX_TEMP_INPUT: usize = 10;

/// Converts a raw `tempN_input` reading to whole °C.
///
/// Most drivers report millidegrees; a few report microdegrees. Readings
/// outside `(0, 150)` °C are treated as bogus.
pub fn normalize_celsius(raw: &str) -> Option<i64> {
    let value: i64 = raw.trim().parse().ok()?;
    let celsius = if value > 1_000_000 {
        value / 1_000_000
    } else if value > 1000 {
        value / 1000
    } else {
        value
    };
    (celsius > 0 && celsius < 150).then_some(celsius)
}

pub fn format_celsius(celsius: Option<i64>) -> String {
    match celsius {
        Some(t) => format!("{:3}°C", t),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ThermalSampler {
    root: PathBuf,
}

impl ThermalSampler {
    pub fn new() -> Self {
        Self::with_root(HWMON_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Highest plausible reading over `hwmon0..14/temp1..10_input`
    pub fn max_celsius(&self) -> Option<i64> {
        (0..MAX_HWMON)
            .flat_map(|hwmon| (1..=MAX_TEMP_INPUT).map(move |input| (hwmon, input)))
            .filter_map(|(hwmon, input)| {
                let path = self
                    .root
                    .join(format!("hwmon{}", hwmon))
                    .join(format!("temp{}_input", input));
                normalize_celsius(&read_small_file(&path, 32))
            })
            .max()
    }

    pub fn sample(&self) -> String {
        format_celsius(self.max_celsius())
    }
}

impl Default for ThermalSampler {
    fn default() -> Self {
        Self::new()
    }
}
