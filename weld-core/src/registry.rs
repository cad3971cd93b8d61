//! Stand registry: which welding stand sits behind which source address.
//!
//! Built once at boot and shared read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Built-in test addresses, one per (size, direction) combination.
pub const TEST_800_INPUT: &str = "TEST_800_I";
pub const TEST_800_OUTPUT: &str = "TEST_800_O";
pub const TEST_1000_INPUT: &str = "TEST_1000_I";
pub const TEST_1000_OUTPUT: &str = "TEST_1000_O";

/// Pipe diameter class a stand welds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeSize {
    Small,
    Large,
}

impl PipeSize {
    pub fn from_class(class: u32) -> Option<Self> {
        match class {
            800 => Some(Self::Small),
            1000 => Some(Self::Large),
            _ => None,
        }
    }

    pub fn class(self) -> u32 {
        match self {
            Self::Small => 800,
            Self::Large => 1000,
        }
    }
}

impl fmt::Display for PipeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class())
    }
}

/// Which side of the seam the stand welds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Parse the registry code, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "ID" => Some(Self::Input),
            "OD" => Some(Self::Output),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Input => "ID",
            Self::Output => "OD",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One configured stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandDescriptor {
    pub ip: String,
    pub size: PipeSize,
    pub index: u32,
    pub direction: Direction,
}

impl StandDescriptor {
    pub fn new(ip: impl Into<String>, size: PipeSize, index: u32, direction: Direction) -> Self {
        Self {
            ip: ip.into(),
            size,
            index,
            direction,
        }
    }

    /// Display name, e.g. `OD2`.
    pub fn name(&self) -> String {
        format!("{}{}", self.direction.code(), self.index)
    }

    /// Parse one `ip,pipeSize,index,direction` line. `None` for anything malformed.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [ip, size, index, direction] = fields.as_slice() else {
            return None;
        };
        let size = PipeSize::from_class(size.parse().ok()?)?;
        let index: u32 = index.parse().ok().filter(|&n| n >= 1)?;
        let direction = Direction::from_code(direction)?;
        Some(Self::new(*ip, size, index, direction))
    }
}

/// Immutable IP → stand table.
#[derive(Debug, Clone)]
pub struct StandRegistry {
    stands: HashMap<String, StandDescriptor>,
}

impl StandRegistry {
    /// Registry holding only the built-in entries.
    pub fn builtin() -> Self {
        Self::from_text("")
    }

    /// Parse registry file contents; malformed lines are skipped. Built-ins always win.
    pub fn from_text(text: &str) -> Self {
        let mut stands: HashMap<String, StandDescriptor> = text
            .lines()
            .filter_map(StandDescriptor::parse_line)
            .map(|stand| (stand.ip.clone(), stand))
            .collect();
        for stand in builtin_stands() {
            stands.insert(stand.ip.clone(), stand);
        }
        Self { stands }
    }

    /// Load the registry file. An unreadable file leaves only the built-ins.
    pub fn load(path: &Path) -> Self {
        let text = std::fs::read_to_string(path).unwrap_or_default();
        Self::from_text(&text)
    }

    pub fn lookup(&self, ip: &str) -> Option<&StandDescriptor> {
        self.stands.get(ip)
    }

    pub fn len(&self) -> usize {
        self.stands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stands.is_empty()
    }
}

fn builtin_stands() -> [StandDescriptor; 5] {
    [
        StandDescriptor::new("127.0.0.1", PipeSize::Small, 1, Direction::Input),
        StandDescriptor::new(TEST_800_INPUT, PipeSize::Small, 1, Direction::Input),
        StandDescriptor::new(TEST_800_OUTPUT, PipeSize::Small, 1, Direction::Output),
        StandDescriptor::new(TEST_1000_INPUT, PipeSize::Large, 1, Direction::Input),
        StandDescriptor::new(TEST_1000_OUTPUT, PipeSize::Large, 1, Direction::Output),
    ]
}
