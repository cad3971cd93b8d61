//! Transformer: session + stand → report destination and OutputGrid.
//!
//! Building the grid is pure. Only [`plan`] looks at the archive (to avoid
//! overwriting an earlier report) and only [`write_record`] writes to it.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::convert::{parse_decimal, Converter};
use crate::grid::{column_number, CellValue, OutputGrid, Sheet};
use crate::layout::{
    self, ChangeLog, ColumnSource, MetaGroup, ARC_ENABLED_ROW, ARC_SETUP_COLS,
    CHANGE_EPSILON, CHANGE_LOG_FIRST_ROW, CURRENT_ROW, DATE_CELL, FIRST_ARC_STATES,
    FIRST_DATA_ROW, MANUAL_CONTROL_CELL, META_CELLS, META_GROUPS, OTHER_ARC_STATES,
    RESULT_GEOMETRY_FIELDS, STAND_NAME_CELL, TIME_CELL, VOLTAGE_ROW, WELDER_STATE_CELLS,
    WIRE_DIAMETER_CELLS,
};
use crate::naming::{self, Destination};
use crate::registry::StandDescriptor;
use crate::session::{FieldId, Session};
use crate::sink::{RecordSink, SinkError};

/// Everything needed to write one report.
#[derive(Debug, Clone)]
pub struct RecordPlan {
    pub template: &'static str,
    pub destination: Destination,
    pub stand_name: String,
    pub row_count: usize,
    pub grid: OutputGrid,
}

/// Failure turning a session into a saved report.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("cannot create {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Decide template and destination and build the grid.
pub fn plan(
    session: &Session,
    stand: &StandDescriptor,
    at: NaiveDateTime,
    archive_root: &Path,
    ext: &str,
) -> RecordPlan {
    RecordPlan {
        template: naming::template_name(stand.direction, stand.size),
        destination: naming::destination(archive_root, session, stand, at, ext),
        stand_name: stand.name(),
        row_count: session.row_count(),
        grid: build_grid(session, stand, at),
    }
}

/// Create the destination directory, fill the template and save it.
pub fn write_record<S: RecordSink>(sink: &S, plan: &RecordPlan) -> Result<PathBuf, PersistError> {
    let dir = &plan.destination.dir;
    std::fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
        dir: dir.clone(),
        source,
    })?;
    let mut record = sink.open(plan.template)?;
    for (addr, value) in plan.grid.iter() {
        sink.set_cell(&mut record, *addr, value.clone());
    }
    let path = plan.destination.path();
    sink.save(record, &path)?;
    Ok(path)
}

/// [`plan`] then [`write_record`].
pub fn persist<S: RecordSink>(
    sink: &S,
    session: &Session,
    stand: &StandDescriptor,
    at: NaiveDateTime,
    archive_root: &Path,
) -> Result<PathBuf, PersistError> {
    let plan = plan(session, stand, at, archive_root, sink.extension());
    write_record(sink, &plan)
}

/// Every cell of the report.
pub fn build_grid(session: &Session, stand: &StandDescriptor, at: NaiveDateTime) -> OutputGrid {
    let mut grid = OutputGrid::new();
    let rows = session.row_count();
    for column in layout::data_layout(stand.direction) {
        write_data_column(&mut grid, session, stand, rows, column.col, column.source);
    }
    write_setup(&mut grid, session, stand, at);
    for group in META_GROUPS {
        write_group(&mut grid, session, group);
    }
    for cell in META_CELLS {
        let value = session.metadata_value(cell.key).unwrap_or_default();
        grid.set(cell.sheet, cell.at.row, cell.at.col_number(), value);
    }
    for log in layout::change_logs(stand.direction) {
        write_change_log(&mut grid, session, &log);
    }
    write_welder_states(&mut grid, session);
    for (arc, cell) in (1..).zip(WIRE_DIAMETER_CELLS) {
        let value = session
            .metadata_value(&format!("WireDiameter{arc}="))
            .unwrap_or_default();
        grid.set(Sheet::Setup, cell.row, cell.col_number(), value);
    }
    grid
}

/// Converted values of `field` for every report row, padded with the converter default.
pub fn field_series(session: &Session, field: FieldId, converter: Converter, rows: usize) -> Vec<f64> {
    (0..rows)
        .map(|row| converter.sample(session.sample(field, row)))
        .collect()
}

fn write_data_column(
    grid: &mut OutputGrid,
    session: &Session,
    stand: &StandDescriptor,
    rows: usize,
    col: u32,
    source: ColumnSource,
) {
    let step = session.sample_step();
    match source {
        ColumnSource::Meter => {
            let meters = (0..rows).map(|row| (row * step * 2) as f64);
            grid.set_column(Sheet::Data, col, FIRST_DATA_ROW, meters);
        }
        ColumnSource::Field(field, converter) => {
            let values = field_series(session, field, converter, rows);
            grid.set_column(Sheet::Data, col, FIRST_DATA_ROW, values);
        }
        ColumnSource::Arcs(base, converter) => {
            for (col, field) in (col..).zip(layout::arc_fields(base, stand.direction)) {
                let values = field_series(session, field, converter, rows);
                grid.set_column(Sheet::Data, col, FIRST_DATA_ROW, values);
            }
        }
        ColumnSource::WireIdMax(converter) => {
            let raw = session
                .metadata_value("WireIdMax=")
                .and_then(parse_decimal)
                .unwrap_or(0.0);
            let value = converter.apply(Some(raw), Some(0.0));
            grid.set_column(Sheet::Data, col, FIRST_DATA_ROW, vec![value; rows]);
        }
        ColumnSource::ResultGeometry => {
            let (a, b) = RESULT_GEOMETRY_FIELDS;
            let head = |field: FieldId, row: usize| Converter::HeadPosition.sample(session.sample(field, row));
            let values = (0..rows).map(|row| {
                Converter::Identity.apply(Some(head(a, row) - head(b, row)), Some(0.0))
            });
            grid.set_column(Sheet::Data, col, FIRST_DATA_ROW, values);
        }
        ColumnSource::HorzHeadRange => {
            // Nothing is written when the range is missing or unparseable.
            if let Some(range) = session
                .metadata_value("HorzHeadPositionRange=")
                .and_then(parse_decimal)
            {
                grid.set_column(Sheet::Data, col, FIRST_DATA_ROW, vec![range; rows]);
                grid.set_column(Sheet::Data, col + 1, FIRST_DATA_ROW, vec![-range; rows]);
            }
        }
    }
}

fn write_setup(grid: &mut OutputGrid, session: &Session, stand: &StandDescriptor, at: NaiveDateTime) {
    let manual = session.metadata_value("ManualControl=").unwrap_or_default();
    let manual = match manual.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('F') => "Auto",
        Some('T') => "Hand",
        _ => manual,
    };
    set_at(grid, Sheet::Setup, MANUAL_CONTROL_CELL, manual);
    set_at(grid, Sheet::Setup, DATE_CELL, at.format("%-d.%m.%Y").to_string());
    set_at(grid, Sheet::Setup, TIME_CELL, at.format("%-I:%M %p").to_string());
    set_at(grid, Sheet::Setup, STAND_NAME_CELL, stand.name());

    for (arc, col) in (1..).zip(ARC_SETUP_COLS) {
        let col = column_number(col);
        if let Some(current) = session.metadata_value(&format!("Ix{arc}=")) {
            grid.set(Sheet::Setup, ARC_ENABLED_ROW, col, "1");
            grid.set(Sheet::Setup, CURRENT_ROW, col, current);
        }
        if let Some(voltage) = session.metadata_value(&format!("Ux{arc}=")) {
            grid.set(Sheet::Setup, VOLTAGE_ROW, col, format!("{voltage} B"));
        }
    }
}

fn write_welder_states(grid: &mut OutputGrid, session: &Session) {
    for (arc, cell) in (1..).zip(WELDER_STATE_CELLS) {
        let Some(code) = session.metadata_value(&format!("WelderState{arc}=")) else {
            continue;
        };
        let table: &[&str] = if arc == 1 {
            &FIRST_ARC_STATES
        } else {
            &OTHER_ARC_STATES
        };
        let state = single_digit(code)
            .and_then(|i| table.get(i).copied())
            .unwrap_or_default();
        set_at(grid, Sheet::Setup, cell, state);
    }
}

fn single_digit(code: &str) -> Option<usize> {
    match code.as_bytes() {
        [d @ b'0'..=b'9'] => Some(usize::from(d - b'0')),
        _ => None,
    }
}

/// Lines `G-<arc>-…=value` go down the arc's column, one row per line present.
fn write_group(grid: &mut OutputGrid, session: &Session, group: &MetaGroup) {
    for (arc, col) in (1..).zip(group.arc_cols) {
        let prefix = format!("{}-{arc}-", group.name);
        let col = column_number(col);
        let values = session
            .lines()
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .map(|line| line.split_once('=').map_or("", |(_, value)| value));
        grid.set_column(group.sheet, col, group.first_row, values);
    }
}

/// Change-run compression. The first value is always kept with index 0; after
/// that a value is kept whenever it moves more than [`CHANGE_EPSILON`] away
/// from the last kept one. Indices count raw samples at `step * 2` per row.
pub fn change_runs(values: &[f64], step: usize) -> Vec<(i64, f64)> {
    let stride = (step * 2).max(1);
    let mut last = values.first().copied().unwrap_or(0.0);
    let mut runs = vec![(0, last)];
    for (index, &value) in (0i64..).step_by(stride).zip(values) {
        if (value - last).abs() > CHANGE_EPSILON {
            runs.push((index, value));
            last = value;
        }
    }
    runs
}

fn write_change_log(grid: &mut OutputGrid, session: &Session, log: &ChangeLog) {
    let values: Vec<f64> = session
        .samples(log.field)
        .map(|s| log.converter.sample(Some(s)))
        .collect();
    let index_col = column_number(log.index_col);
    let value_col = column_number(log.value_col);
    let runs = change_runs(&values, session.sample_step());
    for (row, (index, value)) in (CHANGE_LOG_FIRST_ROW..).zip(runs) {
        if row != CHANGE_LOG_FIRST_ROW {
            grid.set(Sheet::Changes, row, index_col, index);
        }
        grid.set(Sheet::Changes, row, value_col, value);
    }
}

fn set_at(grid: &mut OutputGrid, sheet: Sheet, at: layout::CellPos, value: impl Into<CellValue>) {
    grid.set(sheet, at.row, at.col_number(), value);
}
