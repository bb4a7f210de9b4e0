use thiserror::Error;

pub type Result<T> = std::result::Result<T, BarError>;

/// Failures that stop the status loops. Per-module errors are turned into
/// fallback tokens before they reach this level.
#[derive(Error, Debug)]
pub enum BarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signal handler error: {0}")]
    Signal(String),
}
