//! Framing: 2-byte LE body length, then magic key, version, packet id and payload.
//!
//! `[u16 body_len][u32 magic][u16 version][u16 packet_id][payload..]`, where
//! `body_len` counts every byte after the length field itself.

use crate::protocol::{PacketId, ProtocolError, ProtocolVersion, MAGIC_KEY, SUCCESS_REPLY};

/// Size of the length prefix.
pub const LEN_SIZE: usize = 2;
/// Magic key, version and packet id following the length prefix.
pub const HEADER_SIZE: usize = 8;
/// Largest body a u16 length field can describe.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// One validated request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: ProtocolVersion,
    pub packet_id: PacketId,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(version: ProtocolVersion, packet_id: PacketId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            packet_id,
            payload: payload.into(),
        }
    }
}

/// Error building a frame whose body does not fit the u16 length field.
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("frame body of {0} bytes exceeds {MAX_BODY_LEN}")]
    TooLarge(usize),
}

/// Encode a request frame (the stand side of the protocol).
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameEncodeError> {
    let body_len = HEADER_SIZE + frame.payload.len();
    if body_len > MAX_BODY_LEN {
        return Err(FrameEncodeError::TooLarge(body_len));
    }
    let mut out = Vec::with_capacity(LEN_SIZE + body_len);
    out.extend_from_slice(&(body_len as u16).to_le_bytes());
    out.extend_from_slice(&MAGIC_KEY.to_le_bytes());
    out.extend_from_slice(&frame.version.to_wire().to_le_bytes());
    out.extend_from_slice(&frame.packet_id.to_wire().to_le_bytes());
    out.extend_from_slice(&frame.payload);
    Ok(out)
}

/// Body length announced by a length prefix.
pub fn body_len(prefix: [u8; LEN_SIZE]) -> usize {
    u16::from_le_bytes(prefix) as usize
}

/// Validate and decode one complete frame (length prefix included).
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < LEN_SIZE {
        return Err(ProtocolError::Truncated(bytes.len()));
    }
    let declared = body_len([bytes[0], bytes[1]]);
    if bytes.len() != declared + LEN_SIZE {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    if bytes.len() < LEN_SIZE + HEADER_SIZE {
        return Err(ProtocolError::Truncated(bytes.len()));
    }
    let magic = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    if magic != MAGIC_KEY {
        return Err(ProtocolError::BadMagic(magic));
    }
    let raw_version = u16::from_le_bytes([bytes[6], bytes[7]]);
    let version =
        ProtocolVersion::from_wire(raw_version).ok_or(ProtocolError::UnsupportedVersion(raw_version))?;
    let raw_id = u16::from_le_bytes([bytes[8], bytes[9]]);
    let packet_id = PacketId::from_wire(raw_id).ok_or(ProtocolError::UnknownPacket(raw_id))?;
    Ok(Frame {
        version,
        packet_id,
        payload: bytes[LEN_SIZE + HEADER_SIZE..].to_vec(),
    })
}

/// The success reply: length prefix followed by `0xFFFF`.
pub fn encode_reply() -> [u8; LEN_SIZE + 2] {
    let len = (SUCCESS_REPLY.len() as u16).to_le_bytes();
    [len[0], len[1], SUCCESS_REPLY[0], SUCCESS_REPLY[1]]
}
