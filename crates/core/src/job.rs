use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque unit of work. Identity is the `id`; the payload is carried
/// through scheduling untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: None,
        }
    }

    pub fn with_payload(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Some(payload.into()),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for Job {
    fn from(id: &str) -> Self {
        Job::new(id)
    }
}

impl From<String> for Job {
    fn from(id: String) -> Self {
        Job::new(id)
    }
}

/// Integer grid coordinate. Signed so that negative input can be
/// represented and rejected by bounds checks instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Position {
    pub const ORIGIN: Position = Position::new(0, 0, 0);

    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

impl From<(i64, i64, i64)> for Position {
    fn from((x, y, z): (i64, i64, i64)) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Dimensions of a 3-D grid. Written as `[x, y, z]` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct GridShape {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GridShape {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Number of cells, or `None` if the product overflows.
    pub fn cell_count(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    pub fn is_degenerate(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }

    pub fn contains(&self, pos: Position) -> bool {
        in_axis(pos.x, self.x) && in_axis(pos.y, self.y) && in_axis(pos.z, self.z)
    }
}

fn in_axis(coord: i64, dim: usize) -> bool {
    coord >= 0 && (coord as u64) < dim as u64
}

impl Default for GridShape {
    fn default() -> Self {
        Self::new(10, 10, 10)
    }
}

impl From<[usize; 3]> for GridShape {
    fn from([x, y, z]: [usize; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<GridShape> for [usize; 3] {
    fn from(shape: GridShape) -> Self {
        [shape.x, shape.y, shape.z]
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// A delta applied additively at one grid position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub position: Position,
    pub delta: f64,
}

impl Contribution {
    pub fn new(position: impl Into<Position>, delta: f64) -> Self {
        Self {
            position: position.into(),
            delta,
        }
    }
}
