//! Session: everything one stand sends between accept and END.
//!
//! A session is owned by exactly one connection handler while the socket is
//! open and is moved, never shared, into the handoff queue once terminal.

use std::collections::BTreeMap;
use std::fmt;

use crate::codepage::decode_cp1251;
use crate::protocol::{
    PacketId, ProtocolError, ProtocolVersion, BEGIN_KEY, BEGIN_KEY_LEN, PIPE_FIELD_LEN,
};
use crate::wire::Frame;

/// Default decimation from raw samples to exported rows.
pub const DEFAULT_SAMPLE_STEP: usize = 3;

/// Bytes per encoded sample.
pub const SAMPLE_SIZE: usize = 3;

/// Telemetry channel identifier, rendered as `"<group>_<sub>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    pub group: u8,
    pub sub: u8,
}

impl FieldId {
    pub const fn new(group: u8, sub: u8) -> Self {
        Self { group, sub }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.group, self.sub)
    }
}

/// One decoded 3-byte reading: u16 LE magnitude and a flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub arg0: u16,
    pub arg1: u8,
}

impl Sample {
    /// Decode the sample starting at `offset`; `None` unless all three bytes are present.
    pub fn read(buf: &[u8], offset: usize) -> Option<Self> {
        let bytes = buf.get(offset..offset.checked_add(SAMPLE_SIZE)?)?;
        Some(Self {
            arg0: u16::from_le_bytes([bytes[0], bytes[1]]),
            arg1: bytes[2],
        })
    }
}

/// Accumulated state of one stand connection.
#[derive(Debug, Clone)]
pub struct Session {
    source_ip: String,
    version: Option<ProtocolVersion>,
    terminal: bool,
    metadata: Option<String>,
    lines: Vec<String>,
    params: BTreeMap<FieldId, Vec<u8>>,
    message: Option<Vec<u8>>,
    pipe_number: Option<String>,
    pipe_thickness: Option<String>,
    sample_step: usize,
}

impl Session {
    pub fn new(source_ip: impl Into<String>) -> Self {
        Self {
            source_ip: source_ip.into(),
            version: None,
            terminal: false,
            metadata: None,
            lines: Vec::new(),
            params: BTreeMap::new(),
            message: None,
            pipe_number: None,
            pipe_thickness: None,
            sample_step: DEFAULT_SAMPLE_STEP,
        }
    }

    /// Override the sample step. Zero is clamped to one.
    pub fn with_sample_step(mut self, step: usize) -> Self {
        self.sample_step = step.max(1);
        self
    }

    /// Apply one validated frame. The frame's version becomes the session version.
    pub fn apply(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        self.version = Some(frame.version);
        let payload = frame.payload.as_slice();
        match frame.packet_id {
            PacketId::Begin => self.begin(payload),
            PacketId::End => {
                if !payload.is_empty() {
                    return Err(ProtocolError::NonEmptyEnd(payload.len()));
                }
                self.terminal = true;
                Ok(())
            }
            PacketId::WriteData => {
                self.set_metadata(decode_cp1251(payload));
                Ok(())
            }
            PacketId::WriteMsg => {
                self.message = Some(payload.to_vec());
                Ok(())
            }
            PacketId::WriteParam => {
                if payload.len() < 2 {
                    return Err(ProtocolError::ShortParam(payload.len()));
                }
                self.set_param(FieldId::new(payload[0], payload[1]), payload[2..].to_vec());
                Ok(())
            }
        }
    }

    fn begin(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if payload.len() < BEGIN_KEY_LEN || payload[..BEGIN_KEY_LEN] != BEGIN_KEY {
            return Err(ProtocolError::BadBeginKey);
        }
        if self.version == Some(ProtocolVersion::V1_10) {
            let number = pipe_field(payload, BEGIN_KEY_LEN)?;
            let thickness = pipe_field(payload, BEGIN_KEY_LEN + PIPE_FIELD_LEN)?;
            self.pipe_number = Some(number);
            self.pipe_thickness = Some(thickness);
        }
        Ok(())
    }

    /// Store the metadata blob and split it into logical `key=value` lines.
    pub fn set_metadata(&mut self, text: String) {
        self.lines = text
            .replace('\r', "\n")
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        self.metadata = Some(text);
    }

    /// Store a parameter buffer, replacing any earlier one for the same field.
    pub fn set_param(&mut self, field: FieldId, buf: Vec<u8>) {
        self.params.insert(field, buf);
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = Some(version);
    }

    pub fn set_pipe(&mut self, number: impl Into<String>, thickness: impl Into<String>) {
        self.pipe_number = Some(number.into());
        self.pipe_thickness = Some(thickness.into());
    }

    pub fn source_ip(&self) -> &str {
        &self.source_ip
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// True once END has been handled; only terminal sessions are handed off.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }

    pub fn pipe_number(&self) -> Option<&str> {
        self.pipe_number.as_deref()
    }

    pub fn pipe_thickness(&self) -> Option<&str> {
        self.pipe_thickness.as_deref()
    }

    pub fn sample_step(&self) -> usize {
        self.sample_step
    }

    pub fn param(&self, field: FieldId) -> Option<&[u8]> {
        self.params.get(&field).map(Vec::as_slice)
    }

    pub fn params(&self) -> impl Iterator<Item = (FieldId, &[u8])> {
        self.params.iter().map(|(id, buf)| (*id, buf.as_slice()))
    }

    /// Value of the first metadata line starting with `key` (key includes the `=`).
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| line.strip_prefix(key))
    }

    /// Exported rows a field contributes: whole samples divided by the step.
    pub fn field_rows(&self, field: FieldId) -> usize {
        self.param(field)
            .map(|buf| buf.len() / SAMPLE_SIZE / self.sample_step)
            .unwrap_or(0)
    }

    /// Number of data rows in the report: the longest field wins.
    pub fn row_count(&self) -> usize {
        self.params
            .keys()
            .map(|field| self.field_rows(*field))
            .max()
            .unwrap_or(0)
    }

    /// Sample behind exported row `row` of `field`, i.e. sample index `row * step`.
    pub fn sample(&self, field: FieldId, row: usize) -> Option<Sample> {
        if row >= self.field_rows(field) {
            return None;
        }
        let buf = self.param(field)?;
        Sample::read(buf, SAMPLE_SIZE * row * self.sample_step)
    }

    /// Every exported row of `field` that is backed by data.
    pub fn samples(&self, field: FieldId) -> impl Iterator<Item = Sample> + '_ {
        (0..self.field_rows(field)).filter_map(move |row| self.sample(field, row))
    }
}

/// ASCII field at `offset`, cut at the first NUL or after [`PIPE_FIELD_LEN`] bytes.
/// The payload must reach the NUL or the full width.
fn pipe_field(payload: &[u8], offset: usize) -> Result<String, ProtocolError> {
    let field = payload.get(offset..).unwrap_or_default();
    let field = &field[..field.len().min(PIPE_FIELD_LEN)];
    let end = match field.iter().position(|&b| b == 0) {
        Some(nul) => nul,
        None if field.len() == PIPE_FIELD_LEN => PIPE_FIELD_LEN,
        None => return Err(ProtocolError::ShortBegin(payload.len())),
    };
    Ok(field[..end].iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(version: ProtocolVersion, id: PacketId, payload: &[u8]) -> Frame {
        Frame::new(version, id, payload.to_vec())
    }

    fn begin_payload(number: &str, thickness: &str) -> Vec<u8> {
        let mut p = BEGIN_KEY.to_vec();
        let mut field = [0u8; PIPE_FIELD_LEN];
        field[..number.len()].copy_from_slice(number.as_bytes());
        p.extend_from_slice(&field);
        let mut field = [0u8; PIPE_FIELD_LEN];
        field[..thickness.len()].copy_from_slice(thickness.as_bytes());
        p.extend_from_slice(&field);
        p
    }

    #[test]
    fn begin_accepts_exact_key() {
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(ProtocolVersion::V1_00, PacketId::Begin, &BEGIN_KEY))
            .unwrap();
        assert_eq!(s.version(), Some(ProtocolVersion::V1_00));
        assert_eq!(s.pipe_number(), None);
    }

    #[test]
    fn begin_rejects_any_single_byte_change() {
        for i in 0..BEGIN_KEY_LEN {
            let mut key = BEGIN_KEY;
            key[i] ^= 0x01;
            let mut s = Session::new("10.0.0.1");
            assert_eq!(
                s.apply(&frame(ProtocolVersion::V1_00, PacketId::Begin, &key)),
                Err(ProtocolError::BadBeginKey),
                "byte {i}"
            );
        }
        let mut s = Session::new("10.0.0.1");
        assert_eq!(
            s.apply(&frame(ProtocolVersion::V1_00, PacketId::Begin, b"WELDING")),
            Err(ProtocolError::BadBeginKey)
        );
    }

    #[test]
    fn begin_v110_reads_pipe_fields() {
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(
            ProtocolVersion::V1_10,
            PacketId::Begin,
            &begin_payload("4711", "15.6"),
        ))
        .unwrap();
        assert_eq!(s.pipe_number(), Some("4711"));
        assert_eq!(s.pipe_thickness(), Some("15.6"));
    }

    #[test]
    fn begin_v110_full_width_field_has_no_terminator() {
        let mut payload = BEGIN_KEY.to_vec();
        payload.extend_from_slice(&[b'7'; PIPE_FIELD_LEN]);
        payload.extend_from_slice(b"12\0garbage");
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(ProtocolVersion::V1_10, PacketId::Begin, &payload))
            .unwrap();
        assert_eq!(s.pipe_number(), Some("77777777777777777777"));
        assert_eq!(s.pipe_thickness(), Some("12"));
    }

    #[test]
    fn begin_v110_without_pipe_fields_rejected() {
        let mut s = Session::new("10.0.0.1");
        assert_eq!(
            s.apply(&frame(ProtocolVersion::V1_10, PacketId::Begin, &BEGIN_KEY)),
            Err(ProtocolError::ShortBegin(BEGIN_KEY_LEN))
        );
        assert_eq!(s.pipe_number(), None);

        let mut payload = BEGIN_KEY.to_vec();
        payload.extend_from_slice(b"4711\0");
        let mut s = Session::new("10.0.0.1");
        assert_eq!(
            s.apply(&frame(ProtocolVersion::V1_10, PacketId::Begin, &payload)),
            Err(ProtocolError::ShortBegin(payload.len()))
        );

        let mut payload = BEGIN_KEY.to_vec();
        payload.extend_from_slice(b"4711");
        let mut s = Session::new("10.0.0.1");
        assert!(s
            .apply(&frame(ProtocolVersion::V1_10, PacketId::Begin, &payload))
            .is_err());
    }

    #[test]
    fn begin_v110_thickness_may_end_at_nul() {
        let mut payload = BEGIN_KEY.to_vec();
        payload.extend_from_slice(&[b'9'; PIPE_FIELD_LEN]);
        payload.extend_from_slice(b"8.5\0");
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(ProtocolVersion::V1_10, PacketId::Begin, &payload))
            .unwrap();
        assert_eq!(s.pipe_thickness(), Some("8.5"));
    }

    #[test]
    fn end_sets_terminal_only_when_empty() {
        let mut s = Session::new("10.0.0.1");
        assert_eq!(
            s.apply(&frame(ProtocolVersion::V1_00, PacketId::End, &[0])),
            Err(ProtocolError::NonEmptyEnd(1))
        );
        assert!(!s.is_terminal());
        s.apply(&frame(ProtocolVersion::V1_00, PacketId::End, &[]))
            .unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn write_data_splits_lines() {
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(
            ProtocolVersion::V1_00,
            PacketId::WriteData,
            b"PipeNumber=12345\r\n\r\nWireIdMax=1,5\r\nReg-1-a=x=y\n",
        ))
        .unwrap();
        assert_eq!(
            s.lines(),
            &["PipeNumber=12345", "WireIdMax=1,5", "Reg-1-a=x=y"]
        );
        assert_eq!(s.metadata_value("PipeNumber="), Some("12345"));
        assert_eq!(s.metadata_value("Reg-1-a="), Some("x=y"));
        assert_eq!(s.metadata_value("Missing="), None);
        assert!(s.metadata().unwrap().contains("\r\n"));
    }

    #[test]
    fn metadata_lookup_first_match_wins() {
        let mut s = Session::new("10.0.0.1");
        s.set_metadata("Ix1=5\nIx1=6\n".to_string());
        assert_eq!(s.metadata_value("Ix1="), Some("5"));
    }

    #[test]
    fn write_msg_stored_verbatim() {
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(ProtocolVersion::V1_00, PacketId::WriteMsg, &[0, 1, 0xFE]))
            .unwrap();
        assert_eq!(s.message(), Some(&[0u8, 1, 0xFE][..]));
    }

    #[test]
    fn write_param_overwrites() {
        let mut s = Session::new("10.0.0.1");
        s.apply(&frame(ProtocolVersion::V1_00, PacketId::WriteParam, &[17, 0, 1, 2, 3]))
            .unwrap();
        s.apply(&frame(ProtocolVersion::V1_00, PacketId::WriteParam, &[17, 0, 9, 9, 9]))
            .unwrap();
        assert_eq!(s.param(FieldId::new(17, 0)), Some(&[9u8, 9, 9][..]));
        assert_eq!(s.params().count(), 1);
        assert_eq!(FieldId::new(17, 0).to_string(), "17_0");
        assert_eq!(
            s.apply(&frame(ProtocolVersion::V1_00, PacketId::WriteParam, &[17])),
            Err(ProtocolError::ShortParam(1))
        );
    }

    #[test]
    fn row_contribution_is_samples_over_step() {
        let mut s = Session::new("10.0.0.1");
        s.set_param(FieldId::new(1, 1), vec![0; 3 * 10]);
        s.set_param(FieldId::new(2, 1), vec![0; 3 * 7]);
        assert_eq!(s.field_rows(FieldId::new(1, 1)), 3);
        assert_eq!(s.field_rows(FieldId::new(2, 1)), 2);
        assert_eq!(s.field_rows(FieldId::new(9, 9)), 0);
        assert_eq!(s.row_count(), 3);
        assert_eq!(Session::new("x").row_count(), 0);
    }

    #[test]
    fn trailing_partial_sample_ignored() {
        let k = 6;
        let mut buf: Vec<u8> = (0..k as u8).flat_map(|i| [i, 0, i]).collect();
        buf.push(0xAA);
        let mut s = Session::new("10.0.0.1").with_sample_step(1);
        s.set_param(FieldId::new(3, 1), buf);
        assert_eq!(s.field_rows(FieldId::new(3, 1)), k);
        let samples: Vec<Sample> = s.samples(FieldId::new(3, 1)).collect();
        assert_eq!(samples.len(), k);
        assert_eq!(samples[5], Sample { arg0: 5, arg1: 5 });
        assert_eq!(s.sample(FieldId::new(3, 1), k), None);
    }

    #[test]
    fn sample_honours_step() {
        let buf: Vec<u8> = (0..9u16).flat_map(|i| {
            let v = (i * 300).to_le_bytes();
            [v[0], v[1], i as u8]
        }).collect();
        let mut s = Session::new("10.0.0.1");
        s.set_param(FieldId::new(4, 1), buf);
        assert_eq!(s.sample(FieldId::new(4, 1), 1), Some(Sample { arg0: 900, arg1: 3 }));
        assert_eq!(s.sample(FieldId::new(4, 1), 2), Some(Sample { arg0: 1800, arg1: 6 }));
    }
}
