//! JSON-file backed stroke repository.

use super::{StrokeRepository, apply_update, remove_matching};
use inkplane_core::storage::{StorageError, StorageResult};
use inkplane_core::{Stroke, StrokeId, StrokePatch};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;

/// Keeps strokes in memory and rewrites the JSON file after every mutation.
///
/// The write happens while the lock is held, so the file always matches the
/// order of accepted mutations.
pub struct FileStrokeRepository {
    path: PathBuf,
    strokes: RwLock<Vec<Stroke>>,
}

impl FileStrokeRepository {
    /// Open the repository at `path`, loading any strokes already stored.
    pub fn open(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }

        let strokes: Vec<Stroke> = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&json).map_err(|e| {
                StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            Vec::new()
        };
        info!("Loaded {} stroke(s) from {}", strokes.len(), path.display());

        Ok(Self {
            path,
            strokes: RwLock::new(strokes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, strokes: &[Stroke]) -> StorageResult<()> {
        let json = serde_json::to_string(strokes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        // Sibling temp file, then rename over the original.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            StorageError::Io(format!("Failed to replace {}: {}", self.path.display(), e))
        })
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl StrokeRepository for FileStrokeRepository {
    fn list(&self) -> StorageResult<Vec<Stroke>> {
        Ok(self.strokes.read().map_err(lock_error)?.clone())
    }

    fn get(&self, id: StrokeId) -> StorageResult<Option<Stroke>> {
        let strokes = self.strokes.read().map_err(lock_error)?;
        Ok(strokes.iter().find(|s| s.id == id).cloned())
    }

    fn insert_many(&self, new_strokes: Vec<Stroke>) -> StorageResult<()> {
        let mut strokes = self.strokes.write().map_err(lock_error)?;
        let before = strokes.len();
        strokes.extend(new_strokes);
        if let Err(e) = self.persist(&strokes) {
            strokes.truncate(before);
            return Err(e);
        }
        Ok(())
    }

    fn update(&self, id: StrokeId, patch: &StrokePatch) -> StorageResult<Option<Stroke>> {
        let mut strokes = self.strokes.write().map_err(lock_error)?;
        let Some(previous) = strokes.iter().find(|s| s.id == id).cloned() else {
            return Ok(None);
        };
        let updated = apply_update(&mut strokes, id, patch);
        if let Err(e) = self.persist(&strokes) {
            if let Some(slot) = strokes.iter_mut().find(|s| s.id == id) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(updated)
    }

    fn delete_where(&self, predicate: &dyn Fn(&Stroke) -> bool) -> StorageResult<usize> {
        let mut strokes = self.strokes.write().map_err(lock_error)?;
        let snapshot = strokes.clone();
        let deleted = remove_matching(&mut strokes, predicate);
        if deleted > 0 {
            if let Err(e) = self.persist(&strokes) {
                *strokes = snapshot;
                return Err(e);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkplane_core::{HexColor, NewStroke};
    use kurbo::Point;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn stroke(author: &str) -> Stroke {
        NewStroke::new(vec![Point::ZERO, Point::new(4.0, 2.0)], HexColor::default(), 3.0)
            .into_stroke(Uuid::new_v4(), 42, author, author)
    }

    #[test]
    fn test_strokes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strokes.json");

        let repo = FileStrokeRepository::open(path.clone()).unwrap();
        let (a, b) = (stroke("u1"), stroke("u2"));
        repo.insert_many(vec![a.clone(), b.clone()]).unwrap();
        repo.update(a.id, &StrokePatch { color: Some(HexColor::parse("#00ff00").unwrap()), width: None })
            .unwrap();
        drop(repo);

        let reopened = FileStrokeRepository::open(path).unwrap();
        let strokes = reopened.list().unwrap();
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0].id, a.id);
        assert_eq!(strokes[0].color.as_str(), "#00ff00");
        assert_eq!(strokes[1], b);
    }

    #[test]
    fn test_delete_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("strokes.json");
        let repo = FileStrokeRepository::open(path.clone()).unwrap();
        repo.insert_many(vec![stroke("u1"), stroke("u2")]).unwrap();
        assert_eq!(repo.delete_where(&|_: &Stroke| true).unwrap(), 2);
        drop(repo);

        assert!(FileStrokeRepository::open(path).unwrap().list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strokes.json");
        fs::write(&path, "[{").unwrap();
        assert!(matches!(
            FileStrokeRepository::open(path),
            Err(StorageError::Serialization(_))
        ));
    }
}
