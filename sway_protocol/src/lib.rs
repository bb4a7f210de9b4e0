//! # Sway Protocol
//!
//! Minimal client for the i3/sway IPC control socket.
//!
//! This crate provides:
//! - Frame definitions (14-byte header, message types) and bounded payload reads
//! - A one-shot client that asks the window manager for its input devices
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sway_protocol::{parse_inputs, SwayClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Socket path comes from $SWAYSOCK
//! let client = SwayClient::from_env()?;
//!
//! let json = client.query_inputs()?;
//! for device in parse_inputs(&json)? {
//!     if let Some(layout) = device.xkb_active_layout_name {
//!         println!("{}: {}", device.name, layout);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod protocol;

// Re-export commonly used types
pub use client::{query_inputs, IpcError, SwayClient, SWAYSOCK_ENV};
pub use protocol::{
    parse_inputs, Header, InputDevice, MessageType, ProtocolError, ReadPolicy, HEADER_LEN, MAGIC,
};
