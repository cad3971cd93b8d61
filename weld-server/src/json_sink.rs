//! Record sink writing each report as a JSON cell list next to the archive layout.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use weld_core::grid::{CellAddr, CellValue, OutputGrid};
use weld_core::sink::{RecordSink, SinkError};

/// Serializes the filled template as `{template, cells: [{sheet, cell, value}]}`.
#[derive(Debug, Clone)]
pub struct JsonSink {
    template_root: PathBuf,
}

impl JsonSink {
    /// Templates are resolved relative to `template_root` (the application root).
    pub fn new(template_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
        }
    }
}

#[derive(Debug)]
pub struct JsonRecord {
    template: String,
    grid: OutputGrid,
}

#[derive(Serialize)]
struct Document<'a> {
    template: &'a str,
    cells: Vec<Cell<'a>>,
}

#[derive(Serialize)]
struct Cell<'a> {
    sheet: &'static str,
    cell: String,
    value: &'a CellValue,
}

impl RecordSink for JsonSink {
    type Record = JsonRecord;

    fn extension(&self) -> &str {
        "json"
    }

    fn open(&self, template: &str) -> Result<JsonRecord, SinkError> {
        let path = self.template_root.join(template);
        if !path.is_file() {
            return Err(SinkError::TemplateMissing(path));
        }
        Ok(JsonRecord {
            template: template.to_owned(),
            grid: OutputGrid::new(),
        })
    }

    fn set_cell(&self, record: &mut JsonRecord, addr: CellAddr, value: CellValue) {
        record
            .grid
            .set(addr.sheet, addr.row, addr.col, value.normalized());
    }

    fn save(&self, record: JsonRecord, path: &Path) -> Result<(), SinkError> {
        let doc = Document {
            template: &record.template,
            cells: record
                .grid
                .iter()
                .map(|(addr, value)| Cell {
                    sheet: addr.sheet.name(),
                    cell: addr.a1(),
                    value,
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&doc).map_err(|e| SinkError::Encode(e.to_string()))?;
        // An existing report is never replaced.
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weld_core::grid::Sheet;

    #[test]
    fn missing_template_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = JsonSink::new(tmp.path());
        assert!(matches!(
            sink.open("template-o.xls"),
            Err(SinkError::TemplateMissing(_))
        ));
    }

    #[test]
    fn existing_report_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("template-o.xls"), b"").unwrap();
        let sink = JsonSink::new(tmp.path());
        let out = tmp.path().join("2024-03-07__09-05-02.json");

        let mut first = sink.open("template-o.xls").unwrap();
        sink.set_cell(&mut first, CellAddr::new(Sheet::Setup, 3, 3), "first".into());
        sink.save(first, &out).unwrap();
        let mut second = sink.open("template-o.xls").unwrap();
        sink.set_cell(&mut second, CellAddr::new(Sheet::Setup, 3, 3), "second".into());
        let err = sink.save(second, &out).unwrap_err();
        assert!(matches!(err, SinkError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists));

        let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(doc["cells"][0]["value"], "first");
    }

    #[test]
    fn saves_normalized_cells() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("template-i.xls"), b"").unwrap();
        let sink = JsonSink::new(tmp.path());
        let mut record = sink.open("template-i.xls").unwrap();
        sink.set_cell(&mut record, CellAddr::new(Sheet::Setup, 3, 3), "12345".into());
        sink.set_cell(&mut record, CellAddr::new(Sheet::Data, 2, 1), 0.5.into());
        sink.set_cell(&mut record, CellAddr::new(Sheet::Setup, 14, 3), "32 B".into());
        let out = tmp.path().join("r.json");
        sink.save(record, &out).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(doc["template"], "template-i.xls");
        let cells = doc["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0], serde_json::json!({"sheet": "Data", "cell": "A2", "value": 0.5}));
        assert_eq!(cells[1], serde_json::json!({"sheet": "Setup", "cell": "C3", "value": 12345}));
        assert_eq!(cells[2]["value"], "32 B");
    }
}
