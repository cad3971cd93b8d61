//! Report template selection and archive destination naming.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};

use crate::protocol::ProtocolVersion;
use crate::registry::{Direction, PipeSize, StandDescriptor};
use crate::session::Session;

/// Template file for a stand, relative to the application root.
pub fn template_name(direction: Direction, size: PipeSize) -> &'static str {
    match (direction, size) {
        (Direction::Input, PipeSize::Large) => "template-i.xls",
        (Direction::Input, PipeSize::Small) => "template-i-800.xls",
        (Direction::Output, PipeSize::Large) => "template-o.xls",
        (Direction::Output, PipeSize::Small) => "template-o-800.xls",
    }
}

/// Where a report is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Destination {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// `archive/<size>/<ID|OD><index>/<year>/<month>`.
pub fn stand_dir(archive_root: &Path, stand: &StandDescriptor, at: NaiveDateTime) -> PathBuf {
    archive_root
        .join(stand.size.to_string())
        .join(stand.name())
        .join(at.year().to_string())
        .join(at.month().to_string())
}

/// Legacy report name: `YYYY-MM-DD__HH-MM-SS.<ext>`.
pub fn timestamp_file_name(at: NaiveDateTime, ext: &str) -> String {
    format!("{}.{ext}", at.format("%Y-%m-%d__%H-%M-%S"))
}

/// Pipe report name without extension: `<size>_<dir>-<index>____<yy>00<pipe>_<thickness>_data`.
pub fn pipe_file_base(
    stand: &StandDescriptor,
    at: NaiveDateTime,
    pipe_number: &str,
    pipe_thickness: &str,
) -> String {
    format!(
        "{}_{}-{}____{}00{}_{}_data",
        stand.size,
        stand.direction.code(),
        stand.index,
        at.year() % 100,
        pipe_number,
        pipe_thickness
    )
}

/// First free name among `base.ext`, `base_1.ext`, `base_2.ext`, … in `dir`.
pub fn free_file_name(dir: &Path, base: &str, ext: &str) -> String {
    let plain = format!("{base}.{ext}");
    if !dir.join(&plain).is_file() {
        return plain;
    }
    (1u32..)
        .map(|n| format!("{base}_{n}.{ext}"))
        .find(|name| !dir.join(name).is_file())
        .unwrap_or(plain)
}

/// Destination for a session's report. Probes the archive for name collisions
/// on protocol 1.10; the directory itself is not created here.
pub fn destination(
    archive_root: &Path,
    session: &Session,
    stand: &StandDescriptor,
    at: NaiveDateTime,
    ext: &str,
) -> Destination {
    let dir = stand_dir(archive_root, stand, at);
    let file_name = match session.version() {
        Some(ProtocolVersion::V1_10) => {
            let base = pipe_file_base(
                stand,
                at,
                session.pipe_number().unwrap_or_default(),
                session.pipe_thickness().unwrap_or_default(),
            );
            free_file_name(&dir, &base, ext)
        }
        _ => timestamp_file_name(at, ext),
    };
    Destination { dir, file_name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 2)
            .unwrap()
    }

    fn stand() -> StandDescriptor {
        StandDescriptor::new("10.0.0.5", PipeSize::Large, 2, Direction::Output)
    }

    #[test]
    fn templates_by_direction_and_size() {
        assert_eq!(template_name(Direction::Input, PipeSize::Large), "template-i.xls");
        assert_eq!(template_name(Direction::Input, PipeSize::Small), "template-i-800.xls");
        assert_eq!(template_name(Direction::Output, PipeSize::Large), "template-o.xls");
        assert_eq!(template_name(Direction::Output, PipeSize::Small), "template-o-800.xls");
    }

    #[test]
    fn dir_layout() {
        let dir = stand_dir(Path::new("/archive"), &stand(), at());
        assert_eq!(dir, PathBuf::from("/archive/1000/OD2/2024/3"));
    }

    #[test]
    fn legacy_name_from_timestamp() {
        assert_eq!(timestamp_file_name(at(), "xls"), "2024-03-07__09-05-02.xls");
    }

    #[test]
    fn pipe_name_layout() {
        assert_eq!(
            pipe_file_base(&stand(), at(), "12345", "15"),
            "1000_OD-2____240012345_15_data"
        );
    }

    #[test]
    fn collisions_get_numeric_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        assert_eq!(free_file_name(dir, "r", "xls"), "r.xls");
        std::fs::write(dir.join("r.xls"), b"").unwrap();
        assert_eq!(free_file_name(dir, "r", "xls"), "r_1.xls");
        std::fs::write(dir.join("r_1.xls"), b"").unwrap();
        assert_eq!(free_file_name(dir, "r", "xls"), "r_2.xls");
        std::fs::write(dir.join("r_3.xls"), b"").unwrap();
        assert_eq!(free_file_name(dir, "r", "xls"), "r_2.xls");
    }

    #[test]
    fn destination_by_version() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::new("10.0.0.5");
        session.set_version(ProtocolVersion::V1_00);
        let legacy = destination(tmp.path(), &session, &stand(), at(), "json");
        assert_eq!(legacy.file_name, "2024-03-07__09-05-02.json");
        assert_eq!(legacy.path(), tmp.path().join("1000/OD2/2024/3/2024-03-07__09-05-02.json"));

        session.set_version(ProtocolVersion::V1_10);
        session.set_pipe("777", "12.5");
        let first = destination(tmp.path(), &session, &stand(), at(), "json");
        assert_eq!(first.file_name, "1000_OD-2____2400777_12.5_data.json");
        std::fs::create_dir_all(&first.dir).unwrap();
        std::fs::write(first.path(), b"{}").unwrap();
        let second = destination(tmp.path(), &session, &stand(), at(), "json");
        assert_eq!(second.file_name, "1000_OD-2____2400777_12.5_data_1.json");
    }
}
