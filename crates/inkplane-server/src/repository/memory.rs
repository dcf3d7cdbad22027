//! In-memory stroke repository.

use super::{StrokeRepository, apply_update, remove_matching};
use inkplane_core::storage::{StorageError, StorageResult};
use inkplane_core::{Stroke, StrokeId, StrokePatch};
use std::sync::RwLock;

/// Strokes held in memory for tests and ephemeral servers.
#[derive(Default)]
pub struct MemoryStrokeRepository {
    strokes: RwLock<Vec<Stroke>>,
}

impl MemoryStrokeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing strokes (e.g. legacy rows).
    pub fn with_strokes(strokes: Vec<Stroke>) -> Self {
        Self {
            strokes: RwLock::new(strokes),
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl StrokeRepository for MemoryStrokeRepository {
    fn list(&self) -> StorageResult<Vec<Stroke>> {
        Ok(self.strokes.read().map_err(lock_error)?.clone())
    }

    fn get(&self, id: StrokeId) -> StorageResult<Option<Stroke>> {
        let strokes = self.strokes.read().map_err(lock_error)?;
        Ok(strokes.iter().find(|s| s.id == id).cloned())
    }

    fn insert_many(&self, new_strokes: Vec<Stroke>) -> StorageResult<()> {
        self.strokes.write().map_err(lock_error)?.extend(new_strokes);
        Ok(())
    }

    fn update(&self, id: StrokeId, patch: &StrokePatch) -> StorageResult<Option<Stroke>> {
        let mut strokes = self.strokes.write().map_err(lock_error)?;
        Ok(apply_update(&mut strokes, id, patch))
    }

    fn delete_where(&self, predicate: &dyn Fn(&Stroke) -> bool) -> StorageResult<usize> {
        let mut strokes = self.strokes.write().map_err(lock_error)?;
        Ok(remove_matching(&mut strokes, predicate))
    }
}
