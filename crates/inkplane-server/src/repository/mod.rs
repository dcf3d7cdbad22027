//! Stroke persistence backends.

mod file;
mod memory;

pub use file::FileStrokeRepository;
pub use memory::MemoryStrokeRepository;

use inkplane_core::storage::StorageResult;
use inkplane_core::{Stroke, StrokeId, StrokePatch};

/// Append-only stroke collection with in-place style edits and bulk deletes.
///
/// `list` returns strokes in insertion order, which clients use for
/// "topmost" semantics.
pub trait StrokeRepository: Send + Sync {
    fn list(&self) -> StorageResult<Vec<Stroke>>;

    fn get(&self, id: StrokeId) -> StorageResult<Option<Stroke>>;

    /// Append strokes in order.
    fn insert_many(&self, strokes: Vec<Stroke>) -> StorageResult<()>;

    /// Apply a colour/width patch. Returns the updated stroke, or `None` if
    /// the id does not exist.
    fn update(&self, id: StrokeId, patch: &StrokePatch) -> StorageResult<Option<Stroke>>;

    /// Delete every stroke matching `predicate`; returns how many went.
    fn delete_where(&self, predicate: &dyn Fn(&Stroke) -> bool) -> StorageResult<usize>;
}

fn apply_update(strokes: &mut [Stroke], id: StrokeId, patch: &StrokePatch) -> Option<Stroke> {
    let stroke = strokes.iter_mut().find(|s| s.id == id)?;
    stroke.apply(patch);
    Some(stroke.clone())
}

fn remove_matching(strokes: &mut Vec<Stroke>, predicate: &dyn Fn(&Stroke) -> bool) -> usize {
    let before = strokes.len();
    strokes.retain(|s| !predicate(s));
    before - strokes.len()
}
