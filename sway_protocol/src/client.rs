use crate::protocol::{
    read_header, read_payload, write_request, MessageType, ProtocolError, ReadPolicy,
};
use log::{debug, warn};
use std::env;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable sway exports with its control socket path
pub const SWAYSOCK_ENV: &str = "SWAYSOCK";

/// Read/write timeout applied to every call
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors from a single IPC call
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Socket path not configured (${0} unset or empty)")]
    ConfigMissing(String),

    #[error("Failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to configure socket: {0}")]
    Socket(io::Error),

    #[error("Failed to send request: {0}")]
    Write(io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Reply carried no payload")]
    Empty,

    #[error("Reply truncated: kept {received} of {declared} bytes")]
    Truncated { declared: u32, received: usize },
}

/// One-shot client for the sway/i3 control socket.
///
/// Holds no connection: every call opens the socket, exchanges one frame
/// and closes it again, so a client is cheap to keep around and safe to use
/// from any thread.
#[derive(Debug, Clone)]
pub struct SwayClient {
    socket_path: PathBuf,
    policy: ReadPolicy,
    io_timeout: Option<Duration>,
}

impl SwayClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            policy: ReadPolicy::default(),
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }

    /// Resolve the socket path from `$SWAYSOCK`
    pub fn from_env() -> Result<Self, IpcError> {
        Self::from_env_var(SWAYSOCK_ENV)
    }

    /// Resolve the socket path from the given environment variable
    pub fn from_env_var(var: &str) -> Result<Self, IpcError> {
        match env::var_os(var) {
            Some(path) if !path.is_empty() => Ok(Self::new(path)),
            _ => Err(IpcError::ConfigMissing(var.to_string())),
        }
    }

    pub fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `None` blocks indefinitely on a silent peer
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Raw JSON describing the connected input devices
    pub fn query_inputs(&self) -> Result<String, IpcError> {
        self.request(MessageType::GetInputs)
    }

    /// Send a payload-less request and return the reply payload as text.
    ///
    /// In lenient mode (the default) an oversized or short payload is returned
    /// as-is; only a reply without any payload bytes is an error.
    pub fn request(&self, message_type: MessageType) -> Result<String, IpcError> {
        // Dropping the stream closes the socket on every path out of here
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|source| IpcError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        stream
            .set_read_timeout(self.io_timeout)
            .and_then(|_| stream.set_write_timeout(self.io_timeout))
            .map_err(IpcError::Socket)?;

        debug!("📤 Sending {:?} to {}", message_type, self.socket_path.display());
        write_request(&mut stream, message_type).map_err(IpcError::Write)?;

        let header = read_header(&mut stream)?;
        if header.message_type != message_type as u32 {
            warn!(
                "⚠️ Reply type {} does not match request {:?}",
                header.message_type, message_type
            );
        }

        let payload = read_payload(&mut stream, &header, &self.policy);
        debug!(
            "📥 Reply: {} of {} declared bytes",
            payload.bytes.len(),
            payload.declared
        );

        if payload.bytes.is_empty() {
            return Err(IpcError::Empty);
        }
        if self.policy.strict && payload.is_truncated() {
            return Err(IpcError::Truncated {
                declared: payload.declared,
                received: payload.bytes.len(),
            });
        }

        Ok(payload.into_string())
    }
}

/// Query input devices over the socket named by `$SWAYSOCK`
pub fn query_inputs() -> Result<String, IpcError> {
    SwayClient::from_env()?.query_inputs()
}
