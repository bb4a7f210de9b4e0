//! Periodic system readings for the status line.
//!
//! Every sampler renders a fixed-width display string and never fails: a
//! missing or unreadable source turns into a placeholder such as `N/A`.
//! Source paths are fields so tests can point them at fixture trees.

use log::debug;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

pub mod battery;
pub mod cpu;
pub mod disk;
pub mod memory;
pub mod net;
pub mod thermal;

pub use battery::BatterySampler;
pub use cpu::CpuSampler;
pub use disk::DiskSampler;
pub use memory::MemorySampler;
pub use net::NetSampler;
pub use thermal::ThermalSampler;

/// Placeholder for a reading that is not available
pub const NOT_AVAILABLE: &str = "N/A";

/// Read at most `limit` bytes of a small kernel file.
///
/// Missing or unreadable files read as an empty string.
pub fn read_small_file(path: &Path, limit: u64) -> String {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                debug!("Cannot open {}: {}", path.display(), e);
            }
            return String::new();
        }
    };

    let mut buf = Vec::new();
    if let Err(e) = file.take(limit).read_to_end(&mut buf) {
        debug!("Read of {} stopped early: {}", path.display(), e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
