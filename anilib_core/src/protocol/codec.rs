//! Conversion between request lines and datagrams

use crate::protocol::MAX_PACKET_SIZE;
use crate::protocol::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use log::{trace, warn};

/// Encode a request line into a datagram
pub fn encode(line: &str) -> Result<Bytes> {
    if line.is_empty() {
        return Err(ProtocolError::invalid_packet("Empty command"));
    }
    if line.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::packet_too_large(line.len(), MAX_PACKET_SIZE));
    }

    let mut buffer = BytesMut::with_capacity(line.len());
    buffer.put(line.as_bytes());
    Ok(buffer.freeze())
}

/// Whether a reply carries no information at all.
///
/// The registry answers banned clients with empty or zero-filled datagrams.
pub fn is_ban_marker(data: &[u8]) -> bool {
    data.iter().all(|b| *b == 0)
}

/// Decode a datagram into response text
pub fn decode(data: &[u8]) -> Result<String> {
    trace!("Decoding {} bytes", data.len());
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    match std::str::from_utf8(data) {
        Ok(text) => Ok(text.trim_end_matches(['\0', '\n', '\r']).to_string()),
        Err(e) => {
            warn!("Invalid UTF-8 in response: {e}");
            Err(ProtocolError::decoding(format!("Invalid UTF-8: {e}")))
        }
    }
}
