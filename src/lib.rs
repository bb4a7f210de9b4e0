pub mod aggregator;
pub mod audio;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod samplers;
pub mod timing;

pub use error::{BarError, Result};
