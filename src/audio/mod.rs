//! Output volume through a long-lived audio service session.
//!
//! [`AudioSession`] owns the connection policy: lazy connect, a short
//! single-slot cache, per-step timeouts and the `"0%"` fallback. The
//! service binding itself sits behind [`AudioBackend`], so the policy can be
//! exercised without a running sound server.

use crossbeam_channel::Sender;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "pulse")]
mod pulse;
mod session;

#[cfg(feature = "pulse")]
pub use pulse::PulseBackend;
pub use session::{AudioSession, SessionConfig};

/// Shown whenever no volume could be determined
pub const FALLBACK_VOLUME: &str = "0%";

/// Software boost can push a sink past 100%; anything beyond this is noise
pub const MAX_VOLUME_PERCENT: i64 = 150;

/// Lifecycle of the service connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Connection to audio service failed: {0}")]
    ConnectFailed(String),

    #[error("Audio service not ready after {0:?}")]
    InitTimeout(Duration),

    #[error("Audio service did not answer within {0:?}")]
    OperationTimeout(Duration),

    #[error("Connection to audio service lost: {0}")]
    ConnectionLost(String),

    #[error("Audio service unavailable: {0}")]
    Unavailable(String),
}

/// Which sink a volume query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkTarget<'a> {
    Named(&'a str),
    /// First sink the service lists
    First,
}

/// Answer to a sink volume query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeReading {
    /// Average over all channels, in service units where `normal` is 100%
    Level { average: u32, normal: u32 },
    /// The list ended without a single sink record
    NoSink,
}

impl VolumeReading {
    pub fn to_display(self) -> String {
        match self {
            VolumeReading::Level { average, normal } => {
                format!("{}%", volume_percent(average as i64, normal as i64))
            }
            VolumeReading::NoSink => FALLBACK_VOLUME.to_string(),
        }
    }
}

/// Binding to a concrete audio service.
///
/// Every call is bounded by the timeout it is given. Implementations release
/// whatever they allocated when `connect` fails, and `disconnect` is safe to
/// call at any time, including when nothing was ever connected.
pub trait AudioBackend {
    /// Open a connection and wait for the handshake
    fn connect(&mut self, timeout: Duration) -> Result<(), AudioError>;

    /// Name of the service's default sink; `Ok(None)` if it did not say in time
    fn default_sink(&mut self, timeout: Duration) -> Result<Option<String>, AudioError>;

    /// Volume of one sink, cancelling the request if it runs past `timeout`
    fn sink_volume(
        &mut self,
        target: SinkTarget<'_>,
        timeout: Duration,
    ) -> Result<VolumeReading, AudioError>;

    fn disconnect(&mut self);
}

/// Stand-in used when the crate is built without an audio service binding
#[derive(Debug, Default)]
pub struct UnavailableBackend;

impl AudioBackend for UnavailableBackend {
    fn connect(&mut self, _timeout: Duration) -> Result<(), AudioError> {
        Err(AudioError::Unavailable(
            "built without PulseAudio support".to_string(),
        ))
    }

    fn default_sink(&mut self, _timeout: Duration) -> Result<Option<String>, AudioError> {
        Ok(None)
    }

    fn sink_volume(
        &mut self,
        _target: SinkTarget<'_>,
        _timeout: Duration,
    ) -> Result<VolumeReading, AudioError> {
        Err(AudioError::ConnectionLost("not connected".to_string()))
    }

    fn disconnect(&mut self) {}
}

#[cfg(feature = "pulse")]
pub type DefaultBackend = PulseBackend;

#[cfg(not(feature = "pulse"))]
pub type DefaultBackend = UnavailableBackend;

/// `round(100 * average / normal)`, clamped to `[0, 150]`
pub fn volume_percent(average: i64, normal: i64) -> u32 {
    if normal <= 0 || average <= 0 {
        return 0;
    }
    let scaled = (100 * average as i128 + normal as i128 / 2) / normal as i128;
    scaled.clamp(0, MAX_VOLUME_PERCENT as i128) as u32
}

/// Single-shot reply slot handed to a service callback.
///
/// A list query may call back once per record and again at the end of the
/// list; only the first value is forwarded.
#[cfg_attr(not(feature = "pulse"), allow(dead_code))]
pub(crate) struct FirstReply<T> {
    done: bool,
    tx: Sender<T>,
}

#[cfg_attr(not(feature = "pulse"), allow(dead_code))]
impl<T> FirstReply<T> {
    pub(crate) fn new(tx: Sender<T>) -> Self {
        Self { done: false, tx }
    }

    pub(crate) fn offer(&mut self, value: T) {
        if self.done {
            return;
        }
        self.done = true;
        // The waiter may have given up already
        let _ = self.tx.try_send(value);
    }
}
