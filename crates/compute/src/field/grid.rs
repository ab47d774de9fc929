use batchfield_core::config::validate_shape;
use batchfield_core::{BatchfieldError, GridShape, Position, Result};

/// Dense 3-D array of scalars with bounds-checked access.
///
/// Backed by a flat row-major `Vec<f64>`:
/// `index(x, y, z) = x * Y * Z + y * Z + z`. The shape is fixed at
/// construction. No internal locking; see [`super::SharedField`] for a
/// thread-safe handle.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGrid {
    shape: GridShape,
    cells: Vec<f64>,
}

impl SpatialGrid {
    /// Create a zero-filled grid. Fails on a zero dimension.
    pub fn new(shape: GridShape) -> Result<Self> {
        validate_shape(shape)?;
        let len = shape.x * shape.y * shape.z;
        Ok(Self {
            shape,
            cells: vec![0.0; len],
        })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, pos: Position) -> Result<f64> {
        let idx = self.index(pos)?;
        Ok(self.cells[idx])
    }

    /// Overwrite the value at `pos`.
    pub fn set(&mut self, pos: Position, value: f64) -> Result<()> {
        let idx = self.index(pos)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// Add `delta` to the value at `pos`.
    pub fn accumulate(&mut self, pos: Position, delta: f64) -> Result<()> {
        let idx = self.index(pos)?;
        self.cells[idx] += delta;
        Ok(())
    }

    /// Element-wise sum of `other` into `self`. Shapes must match.
    pub fn merge_from(&mut self, other: &SpatialGrid) -> Result<()> {
        if other.shape != self.shape {
            return Err(BatchfieldError::InvalidConfig(format!(
                "cannot merge grid {} into grid {}",
                other.shape, self.shape
            )));
        }
        for (dst, src) in self.cells.iter_mut().zip(&other.cells) {
            *dst += *src;
        }
        Ok(())
    }

    /// Sum over every cell.
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Reset every cell to zero.
    pub fn clear(&mut self) {
        self.cells.fill(0.0);
    }

    /// Cells holding a non-zero value, in flat-index order.
    pub fn non_zero(&self) -> impl Iterator<Item = (Position, f64)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(idx, v)| (self.position_of(idx), *v))
    }

    /// Validate `pos` and map it to a flat index.
    pub fn index(&self, pos: Position) -> Result<usize> {
        if !self.shape.contains(pos) {
            return Err(BatchfieldError::OutOfBounds {
                position: pos,
                shape: self.shape,
            });
        }
        let (x, y, z) = (pos.x as usize, pos.y as usize, pos.z as usize);
        Ok(x * self.shape.y * self.shape.z + y * self.shape.z + z)
    }

    fn position_of(&self, idx: usize) -> Position {
        let yz = self.shape.y * self.shape.z;
        let x = idx / yz;
        let y = (idx % yz) / self.shape.z;
        let z = idx % self.shape.z;
        Position::new(x as i64, y as i64, z as i64)
    }
}
