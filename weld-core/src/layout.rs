//! Report layout: static column and cell tables for the report templates.
//!
//! Input (ID) and Output (OD) stands have their own `Data` sheet tables; the
//! other sheets share one layout.

use crate::convert::Converter::{self, *};
use crate::grid::{column_number, Sheet};
use crate::registry::Direction;
use crate::session::FieldId;

/// First data row of every time-series column; row 1 holds the headers.
pub const FIRST_DATA_ROW: u32 = 2;

/// Row where every change log starts.
pub const CHANGE_LOG_FIRST_ROW: u32 = 6;

/// Minimum step between two logged values of a change log.
pub const CHANGE_EPSILON: f64 = 0.001;

/// Where a `Data` sheet column gets its values from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnSource {
    /// Distance proxy `row * step * 2`.
    Meter,
    /// One stored field.
    Field(FieldId, Converter),
    /// `base_1 ..` one column per arc, in consecutive columns.
    Arcs(u8, Converter),
    /// `WireIdMax=` broadcast to every row.
    WireIdMax(Converter),
    /// Head position 17_0 minus head position 27_0.
    ResultGeometry,
    /// `HorzHeadPositionRange=` and its negation, in this and the next column.
    HorzHeadRange,
}

/// One entry of a `Data` sheet table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataColumn {
    pub col: u32,
    pub source: ColumnSource,
}

const fn meter(col: u32) -> DataColumn {
    DataColumn {
        col,
        source: ColumnSource::Meter,
    }
}

const fn field(col: u32, group: u8, converter: Converter) -> DataColumn {
    DataColumn {
        col,
        source: ColumnSource::Field(FieldId::new(group, 0), converter),
    }
}

const fn arcs(col: u32, base: u8, converter: Converter) -> DataColumn {
    DataColumn {
        col,
        source: ColumnSource::Arcs(base, converter),
    }
}

const fn special(col: u32, source: ColumnSource) -> DataColumn {
    DataColumn { col, source }
}

/// `Data` sheet of Output (OD) stands.
pub static OUTPUT_DATA_LAYOUT: &[DataColumn] = &[
    meter(1),
    arcs(2, 2, Identity),
    arcs(6, 1, Identity),
    arcs(10, 10, Identity),
    arcs(14, 4, WireId),
    special(18, ColumnSource::WireIdMax(Identity)),
    field(19, 5, Identity),
    field(20, 6, CaretId),
    field(21, 24, AutoVertical),
    field(22, 25, AutoHorizontal),
    field(23, 26, PipeDetection),
    field(24, 11, EdgeSize),
    field(25, 12, EdgeSize),
    field(26, 13, EdgeSize),
    field(27, 17, HeadPosition),
    field(28, 27, HeadPosition),
    special(29, ColumnSource::ResultGeometry),
    field(30, 19, HeadPosition),
    field(31, 41, Identity),
    field(32, 37, Identity),
    field(33, 38, Identity),
    special(34, ColumnSource::HorzHeadRange),
    arcs(36, 3, Identity),
    arcs(40, 18, Identity),
    arcs(44, 22, Identity),
    arcs(48, 30, Identity),
    field(52, 20, Identity),
    field(53, 33, Identity),
    field(54, 34, Identity),
    field(55, 35, Identity),
    field(56, 36, Identity),
    field(57, 28, TicksCombined),
    field(58, 49, Identity),
    field(59, 50, Identity),
    arcs(60, 21, Identity),
];

/// `Data` sheet of Input (ID) stands.
pub static INPUT_DATA_LAYOUT: &[DataColumn] = &[
    meter(1),
    arcs(2, 2, Identity),
    arcs(5, 1, Identity),
    arcs(8, 10, Identity),
    arcs(11, 4, WireId),
    special(14, ColumnSource::WireIdMax(Identity)),
    field(15, 5, Identity),
    field(16, 6, CaretId),
    field(17, 24, AutoVertical),
    field(18, 19, HeadPosition),
    field(19, 14, Identity),
    field(20, 15, Identity),
    field(21, 16, Identity),
    arcs(22, 3, Identity),
    arcs(25, 18, Identity),
    arcs(28, 22, Identity),
    field(31, 7, Identity),
    arcs(32, 30, Identity),
    field(35, 20, Identity),
    field(36, 28, TicksCombined),
    field(37, 49, Identity),
    field(38, 50, Identity),
    arcs(39, 21, Identity),
];

/// The two head position fields whose difference is the result geometry.
pub const RESULT_GEOMETRY_FIELDS: (FieldId, FieldId) = (FieldId::new(17, 0), FieldId::new(27, 0));

pub fn data_layout(direction: Direction) -> &'static [DataColumn] {
    match direction {
        Direction::Input => INPUT_DATA_LAYOUT,
        Direction::Output => OUTPUT_DATA_LAYOUT,
    }
}

/// Arcs (welding heads) per stand: four on Output stands, three on Input stands.
pub fn arc_count(direction: Direction) -> u8 {
    match direction {
        Direction::Input => 3,
        Direction::Output => 4,
    }
}

/// `base_1 .. base_n` for the stand's arcs.
pub fn arc_fields(base: u8, direction: Direction) -> impl Iterator<Item = FieldId> {
    (1..=arc_count(direction)).map(move |arc| FieldId::new(base, arc))
}

/// Spreadsheet position written by name, e.g. `("O", 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPos {
    pub col: &'static str,
    pub row: u32,
}

impl CellPos {
    pub const fn new(col: &'static str, row: u32) -> Self {
        Self { col, row }
    }

    pub fn col_number(&self) -> u32 {
        column_number(self.col)
    }
}

/// A single metadata value copied to one cell (empty when the key is absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaCell {
    pub sheet: Sheet,
    pub at: CellPos,
    pub key: &'static str,
}

const fn meta(sheet: Sheet, col: &'static str, row: u32, key: &'static str) -> MetaCell {
    MetaCell {
        sheet,
        at: CellPos::new(col, row),
        key,
    }
}

pub static META_CELLS: &[MetaCell] = &[
    meta(Sheet::Setup, "B", 29, "WeldingSpeedFv="),
    meta(Sheet::Setup, "O", 3, "PersonnelNo="),
    meta(Sheet::Setup, "C", 3, "PipeNumber="),
    meta(Sheet::Setup, "O", 21, "PipeThickness="),
    meta(Sheet::Setup, "O", 20, "PipeDiameter="),
    meta(Sheet::Reg, "B", 28, "PipeMeterFK="),
    meta(Sheet::Params, "B", 20, "StProvarActive="),
    meta(Sheet::Params, "B", 31, "ProvarActive="),
];

/// Setup sheet cells filled from the session itself.
pub const MANUAL_CONTROL_CELL: CellPos = CellPos::new("O", 4);
pub const DATE_CELL: CellPos = CellPos::new("I", 2);
pub const TIME_CELL: CellPos = CellPos::new("L", 2);
pub const STAND_NAME_CELL: CellPos = CellPos::new("F", 2);

/// Per-arc Setup columns for `Ix<n>=` / `Ux<n>=`.
pub const ARC_SETUP_COLS: [&str; 4] = ["C", "F", "I", "L"];
pub const ARC_ENABLED_ROW: u32 = 7;
pub const CURRENT_ROW: u32 = 13;
pub const VOLTAGE_ROW: u32 = 14;

/// `WelderState<n>=` cells for arcs 1..4.
pub const WELDER_STATE_CELLS: [CellPos; 4] = [
    CellPos::new("O", 7),
    CellPos::new("O", 8),
    CellPos::new("O", 9),
    CellPos::new("O", 10),
];

/// Arc 1 power source wiring by state code.
pub const FIRST_ARC_STATES: [&str; 8] = [
    "Source:x1;Master:Off;Slave:Off",
    "Source:x2;Master:Off;Slave:Off",
    "Source:x1;Master:On;Slave:Off",
    "Source:x2;Master:On;Slave:Off",
    "Source:x1;Master:Off;Slave:On",
    "Source:x2;Master:Off;Slave:On",
    "Source:x1;Master:On;Slave:On",
    "Source:x2;Master:On;Slave:On",
];

/// Arcs 2..4 by state code.
pub const OTHER_ARC_STATES: [&str; 2] = ["MED", "MAX"];

/// `WireDiameter<n>=` cells for arcs 1..3.
pub const WIRE_DIAMETER_CELLS: [CellPos; 3] = [
    CellPos::new("C", 9),
    CellPos::new("F", 9),
    CellPos::new("I", 9),
];

/// A `G-<arc>-…` metadata group written down one column per arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaGroup {
    pub sheet: Sheet,
    pub name: &'static str,
    pub first_row: u32,
    pub arc_cols: [&'static str; 4],
}

const REG_COLS: [&str; 4] = ["B", "C", "D", "E"];
const PARAM_COLS: [&str; 4] = ["C", "D", "E", "F"];

const fn reg(name: &'static str, first_row: u32) -> MetaGroup {
    MetaGroup {
        sheet: Sheet::Reg,
        name,
        first_row,
        arc_cols: REG_COLS,
    }
}

const fn params(name: &'static str, first_row: u32) -> MetaGroup {
    MetaGroup {
        sheet: Sheet::Params,
        name,
        first_row,
        arc_cols: PARAM_COLS,
    }
}

pub static META_GROUPS: &[MetaGroup] = &[
    reg("Reg", 3),
    reg("BefStartWireFeed", 30),
    reg("WeldingUp", 37),
    reg("WeldingDown", 51),
    params("WeldPar", 6),
    params("StartPar", 13),
    params("StProvarPar", 22),
    params("DnProvarPar", 33),
    params("AutoPar", 44),
    params("DownPar", 51),
    params("CaretPar", 66),
];

/// One change log on the `Changes` sheet: sample index and value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeLog {
    pub field: FieldId,
    pub converter: Converter,
    pub index_col: &'static str,
    pub value_col: &'static str,
}

/// Wire velocity change logs: field base and (index, value) columns per arc.
pub static WIRE_VELOCITY_CHANGES: [(u8, [(&str, &str); 4]); 2] = [
    (31, [("B", "C"), ("D", "E"), ("F", "G"), ("H", "I")]),
    (32, [("K", "L"), ("M", "N"), ("O", "P"), ("Q", "R")]),
];

/// Pipe velocity change log.
pub const PIPE_VELOCITY_CHANGE: ChangeLog = ChangeLog {
    field: FieldId::new(48, 0),
    converter: Identity,
    index_col: "T",
    value_col: "U",
};

/// Every change log the stand's report carries, in write order.
pub fn change_logs(direction: Direction) -> Vec<ChangeLog> {
    let mut logs: Vec<ChangeLog> = WIRE_VELOCITY_CHANGES
        .iter()
        .flat_map(|(base, cols)| {
            arc_fields(*base, direction)
                .zip(cols.iter())
                .map(|(field, &(index_col, value_col))| ChangeLog {
                    field,
                    converter: Identity,
                    index_col,
                    value_col,
                })
        })
        .collect();
    logs.push(PIPE_VELOCITY_CHANGE);
    logs
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Columns a table entry occupies on the given stand.
    fn width(source: &ColumnSource, direction: Direction) -> u32 {
        match source {
            ColumnSource::Arcs(..) => u32::from(arc_count(direction)),
            ColumnSource::HorzHeadRange => 2,
            _ => 1,
        }
    }

    #[test]
    fn columns_ascend_without_overlap() {
        for direction in [Direction::Input, Direction::Output] {
            let mut next = 1;
            for entry in data_layout(direction) {
                assert!(entry.col >= next, "{direction:?} column {}", entry.col);
                next = entry.col + width(&entry.source, direction);
            }
        }
    }

    #[test]
    fn output_layout_is_wider() {
        assert_eq!(OUTPUT_DATA_LAYOUT.last().map(|c| c.col), Some(60));
        assert_eq!(INPUT_DATA_LAYOUT.last().map(|c| c.col), Some(39));
    }

    #[test]
    fn arc_fields_per_direction() {
        let out: Vec<String> = arc_fields(3, Direction::Output).map(|f| f.to_string()).collect();
        assert_eq!(out, ["3_1", "3_2", "3_3", "3_4"]);
        let inp: Vec<String> = arc_fields(3, Direction::Input).map(|f| f.to_string()).collect();
        assert_eq!(inp, ["3_1", "3_2", "3_3"]);
    }

    #[test]
    fn change_logs_follow_arcs() {
        let out = change_logs(Direction::Output);
        assert_eq!(out.len(), 4 + 4 + 1);
        assert_eq!(out[5].field, FieldId::new(32, 2));
        assert_eq!((out[5].index_col, out[5].value_col), ("M", "N"));
        let inp = change_logs(Direction::Input);
        assert_eq!(inp.len(), 3 + 3 + 1);
        assert_eq!(inp.last(), Some(&PIPE_VELOCITY_CHANGE));
    }

    #[test]
    fn cell_positions_resolve() {
        assert_eq!(MANUAL_CONTROL_CELL.col_number(), 15);
        assert_eq!(STAND_NAME_CELL.col_number(), 6);
    }
}
