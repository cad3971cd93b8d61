//! Stand wire protocol: packet ids, versions, fixed keys and protocol errors.

/// Fixed key carried by every frame right after the length prefix.
pub const MAGIC_KEY: u32 = 0x0123_0123;

/// Length of the key that must open every BEGIN payload.
pub const BEGIN_KEY_LEN: usize = 10;

/// "WELDING" padded with spaces to [`BEGIN_KEY_LEN`].
pub const BEGIN_KEY: [u8; BEGIN_KEY_LEN] = *b"WELDING   ";

/// Width of the pipe number and pipe thickness fields of a 1.10 BEGIN.
pub const PIPE_FIELD_LEN: usize = 20;

/// Body of the only reply the server ever sends.
pub const SUCCESS_REPLY: [u8; 2] = [0xFF, 0xFF];

/// Default TCP port stands connect to.
pub const DEFAULT_PORT: u16 = 10000;

/// Protocol revisions understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// 0x0100: legacy stands, report named by timestamp.
    V1_00,
    /// 0x0110: BEGIN carries pipe number and thickness.
    V1_10,
}

impl ProtocolVersion {
    pub fn from_wire(raw: u16) -> Option<Self> {
        match raw {
            0x0100 => Some(Self::V1_00),
            0x0110 => Some(Self::V1_10),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u16 {
        match self {
            Self::V1_00 => 0x0100,
            Self::V1_10 => 0x0110,
        }
    }
}

/// Packet types, by wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketId {
    Begin = 1,
    End = 2,
    WriteData = 3,
    WriteMsg = 4,
    WriteParam = 5,
}

impl PacketId {
    pub fn from_wire(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::Begin),
            2 => Some(Self::End),
            3 => Some(Self::WriteData),
            4 => Some(Self::WriteMsg),
            5 => Some(Self::WriteParam),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u16 {
        self as u16
    }
}

/// Any violation of the framing or packet rules. Aborts the connection; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame too short: {0} bytes")]
    Truncated(usize),
    #[error("declared body length {declared} does not match frame size {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("wrong magic key {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported protocol version {0:#06x}")]
    UnsupportedVersion(u16),
    #[error("unknown packet id {0}")]
    UnknownPacket(u16),
    #[error("wrong BEGIN key")]
    BadBeginKey,
    #[error("BEGIN payload of {0} bytes ends inside a pipe field")]
    ShortBegin(usize),
    #[error("END payload must be empty, got {0} bytes")]
    NonEmptyEnd(usize),
    #[error("WRITE_PARAM payload of {0} bytes has no field header")]
    ShortParam(usize),
    #[error("connection idle timeout")]
    Timeout,
}
