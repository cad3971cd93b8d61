//! Weld telemetry core: wire protocol, session accumulation and report building.
//! No sockets, no threads; the server crate drives these types.

pub mod codepage;
pub mod convert;
pub mod grid;
pub mod layout;
pub mod naming;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod sink;
pub mod transform;
pub mod wire;

pub use grid::{CellAddr, CellValue, OutputGrid, Sheet};
pub use protocol::{PacketId, ProtocolError, ProtocolVersion};
pub use registry::{Direction, PipeSize, StandDescriptor, StandRegistry};
pub use session::{FieldId, Session};
pub use sink::{MemorySink, RecordSink, SinkError};
pub use transform::{persist, plan, PersistError, RecordPlan};
pub use wire::{decode_frame, encode_frame, encode_reply, Frame, FrameEncodeError};
