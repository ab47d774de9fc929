use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use batchfield_core::{BatchfieldError, Contribution, GridShape, Position, Result};

use super::accumulator::FieldAccumulator;
use super::grid::SpatialGrid;

/// Thread-safe handle to a [`FieldAccumulator`].
///
/// Cloning shares the same field. Writers take a whole-grid lock, so
/// concurrent `accumulate` calls never lose updates.
#[derive(Debug, Clone)]
pub struct SharedField {
    inner: Arc<RwLock<FieldAccumulator>>,
}

impl SharedField {
    pub fn new(shape: GridShape) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(RwLock::new(FieldAccumulator::new(shape)?)),
        })
    }

    pub fn apply<I>(&self, contributions: I) -> Result<()>
    where
        I: IntoIterator<Item = (Position, f64)>,
    {
        self.write()?.apply(contributions)
    }

    pub fn accumulate(&self, contribution: Contribution) -> Result<()> {
        self.write()?.accumulate(contribution)
    }

    pub fn query(&self, pos: Position) -> Result<f64> {
        self.read()?.query(pos)
    }

    pub fn merge_partial(&self, partial: &SpatialGrid) -> Result<()> {
        self.write()?.merge_partial(partial)
    }

    pub fn shape(&self) -> Result<GridShape> {
        Ok(self.read()?.shape())
    }

    /// Sum over every cell of the field.
    pub fn snapshot_total(&self) -> Result<f64> {
        Ok(self.read()?.grid().total())
    }

    /// Copy of the current grid contents.
    pub fn snapshot(&self) -> Result<SpatialGrid> {
        Ok(self.read()?.grid().clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FieldAccumulator>> {
        self.inner
            .read()
            .map_err(|e| BatchfieldError::LockPoisoned(format!("field read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FieldAccumulator>> {
        self.inner
            .write()
            .map_err(|e| BatchfieldError::LockPoisoned(format!("field write lock: {}", e)))
    }
}
