//! Relay wire format
//!
//! A message is a sequence of length-prefixed UTF-8 strings, each framed as
//! `[length:u16 big-endian][bytes]`, the host transport's native string
//! encoding:
//!
//! ```text
//! subChannel   "ExecuteCommand"
//! destination  target server id
//! executorKind "player" | "console"
//! command      fully resolved command text
//! ```
//!
//! Only `ExecuteCommand` is defined. Other sub-channels are decoded far
//! enough to be identified and ignored.

use crate::error::{BridgeError, Result};
use crate::types::ExecutorKind;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Sub-channel asking a backend to run a command
pub const EXECUTE_COMMAND: &str = "ExecuteCommand";

/// Longest string a single field can carry
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Request for one backend to run one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    /// Server id that should execute the command
    pub destination: String,

    /// Who the command runs as on the destination
    pub executor: ExecutorKind,

    /// Command text with placeholders already substituted
    pub command: String,
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// `ExecuteCommand` request
    Execute(RelayMessage),
    /// Sub-channel this version does not understand
    Unknown { sub_channel: String },
}

impl RelayMessage {
    /// Create an execution request
    pub fn new(
        destination: impl Into<String>,
        executor: ExecutorKind,
        command: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            executor,
            command: command.into(),
        }
    }

    /// Encode this message for the wire
    pub fn encode(&self) -> Result<Bytes> {
        let fields = [
            EXECUTE_COMMAND,
            self.destination.as_str(),
            self.executor.as_wire(),
            self.command.as_str(),
        ];
        let mut buf = BytesMut::with_capacity(fields.iter().map(|f| 2 + f.len()).sum());
        for field in fields {
            put_string(&mut buf, field)?;
        }
        Ok(buf.freeze())
    }
}

impl RelayFrame {
    /// Decode a message; never panics on malformed input
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        let sub_channel = get_string(&mut buf, "subChannel")?;
        if sub_channel != EXECUTE_COMMAND {
            return Ok(Self::Unknown { sub_channel });
        }

        let destination = get_string(&mut buf, "destination")?;
        let tag = get_string(&mut buf, "executorKind")?;
        let executor = ExecutorKind::from_wire(&tag)
            .ok_or_else(|| BridgeError::Decode(format!("Unknown executor kind: {:?}", tag)))?;
        let command = get_string(&mut buf, "command")?;

        Ok(Self::Execute(RelayMessage {
            destination,
            executor,
            command,
        }))
    }
}

fn put_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    if value.len() > MAX_FIELD_LEN {
        return Err(BridgeError::Encode(format!(
            "Field too long: {} bytes (max {})",
            value.len(),
            MAX_FIELD_LEN
        )));
    }
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn get_string(buf: &mut &[u8], field: &str) -> Result<String> {
    if buf.remaining() < 2 {
        return Err(BridgeError::Decode(format!(
            "Truncated message: missing length of {}",
            field
        )));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(BridgeError::Decode(format!(
            "Truncated message: {} needs {} bytes, {} left",
            field,
            len,
            buf.remaining()
        )));
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| BridgeError::Decode(format!("Invalid UTF-8 in {}: {}", field, e)))
}
