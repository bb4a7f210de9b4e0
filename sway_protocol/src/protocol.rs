use serde::Deserialize;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Magic string opening every frame in both directions
pub const MAGIC: &[u8; 6] = b"i3-ipc";

/// Magic + payload length (u32 LE) + message type (u32 LE)
pub const HEADER_LEN: usize = 14;

/// Default reply buffer size. One byte is reserved, so at most
/// `DEFAULT_PAYLOAD_CAPACITY - 1` payload bytes are kept.
pub const DEFAULT_PAYLOAD_CAPACITY: usize = 256 * 1024;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Reply header too short: got {0} of 14 bytes")]
    ShortHeader(usize),

    #[error("Invalid magic in reply header: {0:?}")]
    BadMagic([u8; 6]),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u32),
}

/// Message types understood by this client.
///
/// Only the read-only input query is needed for a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    GetInputs = 100,
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            100 => Ok(MessageType::GetInputs),
            _ => Err(ProtocolError::UnknownMessageType(value)),
        }
    }
}

/// Fixed 14-byte frame header: [magic: 6][payload_len: u32 LE][type: u32 LE]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_len: u32,
    pub message_type: u32,
}

impl Header {
    /// Header for a request without payload
    pub fn request(message_type: MessageType) -> Self {
        Self {
            payload_len: 0,
            message_type: message_type as u32,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..6].copy_from_slice(MAGIC);
        bytes[6..10].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.message_type.to_le_bytes());
        bytes
    }

    /// Decode a reply header, rejecting frames whose magic does not match
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        let mut magic = [0u8; 6];
        magic.copy_from_slice(&bytes[..6]);
        if &magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }

        let payload_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let message_type = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        Ok(Self {
            payload_len,
            message_type,
        })
    }
}

/// How much of a reply payload to keep and whether shortfalls are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Buffer size; at most `capacity - 1` payload bytes are read
    pub capacity: usize,
    /// Reject truncated or short payloads instead of returning what arrived
    pub strict: bool,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PAYLOAD_CAPACITY,
            strict: false,
        }
    }
}

impl ReadPolicy {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Number of payload bytes to read for a declared length
    pub fn read_limit(&self, declared: u32) -> usize {
        (declared as usize).min(self.capacity.saturating_sub(1))
    }
}

/// Payload read under a [`ReadPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    /// Length announced in the header
    pub declared: u32,
}

impl Payload {
    /// True when fewer bytes were kept than the header announced
    pub fn is_truncated(&self) -> bool {
        self.bytes.len() < self.declared as usize
    }

    pub fn into_string(self) -> String {
        match String::from_utf8(self.bytes) {
            Ok(text) => text,
            // A cut can land inside a multi-byte sequence
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Write a request header. `write_all` retries on `Interrupted` and
/// keeps going after partial writes.
pub fn write_request<W: Write>(writer: &mut W, message_type: MessageType) -> io::Result<()> {
    writer.write_all(&Header::request(message_type).encode())?;
    writer.flush()
}

/// Read and validate a reply header
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header, ProtocolError> {
    let mut bytes = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => return Err(ProtocolError::ShortHeader(filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }

    Header::decode(&bytes)
}

/// Read at most `policy.read_limit(header.payload_len)` bytes.
///
/// Never reads past the declared length. Stops early at end of stream or on
/// a read error and returns whatever arrived; the caller decides whether a
/// short payload is acceptable.
pub fn read_payload<R: Read>(reader: &mut R, header: &Header, policy: &ReadPolicy) -> Payload {
    let limit = policy.read_limit(header.payload_len);
    let mut bytes = Vec::with_capacity(limit);

    if let Err(e) = reader.take(limit as u64).read_to_end(&mut bytes) {
        log::debug!(
            "Payload read stopped after {} of {} bytes: {}",
            bytes.len(),
            limit,
            e
        );
    }

    Payload {
        bytes,
        declared: header.payload_len,
    }
}

/// One input device as reported by `GET_INPUTS`.
///
/// Only the fields a status line cares about; everything else is ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InputDevice {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub xkb_active_layout_name: Option<String>,
}

/// Parse a complete `GET_INPUTS` payload
pub fn parse_inputs(payload: &str) -> Result<Vec<InputDevice>, serde_json::Error> {
    serde_json::from_str(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out one byte per call and interrupts every other call
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        interrupt_next: bool,
    }

    impl Trickle {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                pos: 0,
                interrupt_next: true,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            self.interrupt_next = true;
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    /// Writer that accepts at most three bytes per call
    struct Choppy(Vec<u8>);

    impl Write for Choppy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reply(payload: &[u8], declared: u32) -> Vec<u8> {
        let mut bytes = Header {
            payload_len: declared,
            message_type: MessageType::GetInputs as u32,
        }
        .encode()
        .to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_request_header_layout() {
        let bytes = Header::request(MessageType::GetInputs).encode();
        assert_eq!(&bytes[..6], b"i3-ipc");
        assert_eq!(&bytes[6..10], &[0, 0, 0, 0]);
        assert_eq!(&bytes[10..14], &[100, 0, 0, 0]);
    }

    #[test]
    fn test_partial_writes_send_whole_header() {
        let mut out = Choppy(Vec::new());
        write_request(&mut out, MessageType::GetInputs).unwrap();
        assert_eq!(out.0.len(), HEADER_LEN);
        assert_eq!(out.0, Header::request(MessageType::GetInputs).encode());
    }

    #[test]
    fn test_header_survives_interrupts_and_single_byte_reads() {
        let mut reader = Trickle::new(reply(b"{}", 2));
        let header = read_header(&mut reader).unwrap();
        assert_eq!(header.payload_len, 2);
        assert_eq!(header.message_type, 100);
    }

    #[test]
    fn test_short_header() {
        let mut reader = Cursor::new(b"i3-ipc\x05".to_vec());
        match read_header(&mut reader) {
            Err(ProtocolError::ShortHeader(7)) => {}
            other => panic!("expected short header, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = reply(b"", 0);
        bytes[..6].copy_from_slice(b"i4-ipc");
        match read_header(&mut Cursor::new(bytes)) {
            Err(ProtocolError::BadMagic(magic)) => assert_eq!(&magic, b"i4-ipc"),
            other => panic!("expected bad magic, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_never_reads_past_declared_length() {
        // Trailing bytes belong to a following frame and must stay unread
        let mut reader = Cursor::new(reply(b"[1,2]TRAILER", 5));
        let header = read_header(&mut reader).unwrap();
        let payload = read_payload(&mut reader, &header, &ReadPolicy::default());

        assert_eq!(payload.bytes, b"[1,2]");
        assert!(!payload.is_truncated());
        assert_eq!(reader.position() as usize, HEADER_LEN + 5);
    }

    #[test]
    fn test_oversized_payload_is_truncated_to_capacity() {
        let body = vec![b'x'; 64];
        let mut reader = Cursor::new(reply(&body, 64));
        let header = read_header(&mut reader).unwrap();
        let policy = ReadPolicy {
            capacity: 16,
            strict: false,
        };
        let payload = read_payload(&mut reader, &header, &policy);

        assert_eq!(payload.bytes.len(), 15);
        assert!(payload.is_truncated());
    }

    #[test]
    fn test_short_payload_is_accepted() {
        let mut reader = Trickle::new(reply(b"[{\"a\"", 100));
        let header = read_header(&mut reader).unwrap();
        let payload = read_payload(&mut reader, &header, &ReadPolicy::default());

        assert_eq!(payload.into_string(), "[{\"a\"");
    }

    #[test]
    fn test_truncation_inside_utf8_sequence() {
        let payload = Payload {
            bytes: vec![b'R', b'o', 0xC3],
            declared: 4,
        };
        assert_eq!(payload.into_string(), "Ro\u{FFFD}");
    }

    #[test]
    fn test_parse_inputs() {
        let json = r#"[
            {"identifier": "1:1:AT_Translated_Set_2_keyboard", "name": "AT Translated Set 2 keyboard",
             "type": "keyboard", "xkb_active_layout_name": "English (UK)", "libinput": {}},
            {"identifier": "2:7:SynPS/2_Synaptics_TouchPad", "name": "SynPS/2 Synaptics TouchPad",
             "type": "touchpad"}
        ]"#;
        let devices = parse_inputs(json).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_type, "keyboard");
        assert_eq!(
            devices[0].xkb_active_layout_name.as_deref(),
            Some("English (UK)")
        );
        assert_eq!(devices[1].xkb_active_layout_name, None);
    }

    #[test]
    fn test_message_type_from_u32() {
        assert_eq!(MessageType::try_from(100).unwrap(), MessageType::GetInputs);
        assert!(matches!(
            MessageType::try_from(4),
            Err(ProtocolError::UnknownMessageType(4))
        ));
    }
}
