//! Length-prefixed framing for handshake messages.
//!
//! A frame is a 4-byte little-endian length followed by that many bytes of
//! JSON. The reader consumes exactly one frame: whatever follows stays in
//! the descriptor for the next process image after a re-exec.

use std::io::{self, Read, Write};

use crate::error::{ChildError, Result};
use crate::types::HandshakeMessage;

/// Upper bound on a frame body.
pub const MAX_FRAME_LEN: u32 = 4 * 1024 * 1024;

/// Reads exactly one framed message from `reader`.
///
/// # Errors
///
/// Returns [`ChildError::Protocol`] if the header or body is truncated,
/// the announced length exceeds [`MAX_FRAME_LEN`], or the body is not a
/// valid message.
pub fn read_message<R: Read>(reader: &mut R) -> Result<HandshakeMessage> {
    let mut header = [0u8; 4];
    reader
        .read_exact(&mut header)
        .map_err(|e| protocol_io("reading message header", e))?;
    let len = u32::from_le_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(ChildError::protocol(format!(
            "message length {len} exceeds {MAX_FRAME_LEN}"
        )));
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .map_err(|e| protocol_io("reading message body", e))?;
    serde_json::from_slice(&body).map_err(|e| ChildError::Protocol {
        message: "decoding message body".into(),
        source: Some(Box::new(e)),
    })
}

/// Writes `msg` as a single frame.
///
/// # Errors
///
/// Returns an error if encoding fails or the writer rejects the bytes.
pub fn write_message<W: Write>(writer: &mut W, msg: &HandshakeMessage) -> io::Result<()> {
    let body = serde_json::to_vec(msg).map_err(io::Error::other)?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| io::Error::other("message too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

fn protocol_io(what: &str, err: io::Error) -> ChildError {
    ChildError::Protocol {
        message: what.into(),
        source: Some(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::types::Stage;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut buf = u32::try_from(body.len()).unwrap().to_le_bytes().to_vec();
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn reads_one_frame_and_leaves_the_next() {
        let mut buf = Vec::new();
        write_message(&mut buf, &HandshakeMessage::default()).unwrap();
        let configured = HandshakeMessage {
            stage: 1,
            state_dir: "/run/nestling".into(),
            ..HandshakeMessage::default()
        };
        write_message(&mut buf, &configured).unwrap();

        let mut cursor = Cursor::new(buf);
        let first = read_message(&mut cursor).unwrap();
        assert_eq!(first.stage().unwrap(), Stage::Bootstrap);
        let second = read_message(&mut cursor).unwrap();
        assert_eq!(second, configured);
        assert_eq!(cursor.position(), cursor.get_ref().len() as u64);
    }

    #[test]
    fn empty_input_is_protocol_error() {
        let err = read_message(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ChildError::Protocol { .. }));
    }

    #[test]
    fn truncated_body_is_protocol_error() {
        let mut buf = frame(br#"{"Stage":1}"#);
        buf.truncate(buf.len() - 3);
        let err = read_message(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ChildError::Protocol { .. }));
    }

    #[test]
    fn malformed_json_is_protocol_error() {
        let err = read_message(&mut Cursor::new(frame(b"{stage"))).unwrap_err();
        assert!(matches!(err, ChildError::Protocol { .. }));
    }

    #[test]
    fn oversized_header_is_rejected_before_allocating() {
        let buf = (MAX_FRAME_LEN + 1).to_le_bytes().to_vec();
        let err = read_message(&mut Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
