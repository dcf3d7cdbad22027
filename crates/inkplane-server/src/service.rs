//! Stroke persistence service: authorization, admission and storage.
//!
//! Check order for writes: signed in, display name set, batch ceiling,
//! payload validity, stroke exists and caller authored it (edits only),
//! admission charge, then the write itself. A rejected call never charges
//! budget for a later step and never partially writes.

use crate::admission::{AdmissionController, AdmissionLimits};
use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::repository::StrokeRepository;
use inkplane_core::protocol::{AdmissionStatus, BatchCreated, DeletedCount, UpdateResult};
use inkplane_core::{NewStroke, ServiceError, Stroke, StrokeId, StrokePatch, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// Caller identity supplied by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<UserId>, display_name: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name,
        }
    }
}

/// Resolve the author identity for a write, or explain why there is none.
fn require_author(principal: Option<&Principal>) -> Result<(&str, &str), ServiceError> {
    let principal = principal.ok_or(ServiceError::Unauthenticated)?;
    match principal.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok((principal.user_id.as_str(), name)),
        _ => Err(ServiceError::MissingProfile),
    }
}

/// Tunables the service needs from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceLimits {
    pub admission: AdmissionLimits,
    pub max_paths_per_batch: usize,
    pub update_cost: f64,
}

impl From<&ServerConfig> for ServiceLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            admission: AdmissionLimits {
                window_ms: config.rate_limit_window_ms,
                capacity: config.max_requests_per_window,
            },
            max_paths_per_batch: config.max_paths_per_batch,
            update_cost: config.update_cost,
        }
    }
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// The shared canvas service.
pub struct CanvasService {
    limits: ServiceLimits,
    admission: AdmissionController,
    repository: Arc<dyn StrokeRepository>,
    clock: Arc<dyn Clock>,
    revision: AtomicU64,
    changes: broadcast::Sender<u64>,
}

impl CanvasService {
    pub fn new(
        limits: ServiceLimits,
        repository: Arc<dyn StrokeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            limits,
            admission: AdmissionController::new(limits.admission, clock.clone()),
            repository,
            clock,
            revision: AtomicU64::new(0),
            changes,
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Current revision; bumped after every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Receive the new revision after each successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify_changed(&self) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine.
        let _ = self.changes.send(revision);
    }

    /// All strokes in insertion order.
    pub fn list_strokes(&self) -> Result<Vec<Stroke>, ServiceError> {
        Ok(self.repository.list()?)
    }

    /// Create one stroke; costs one admission unit.
    pub fn create_stroke(
        &self,
        principal: Option<&Principal>,
        new_stroke: NewStroke,
    ) -> Result<StrokeId, ServiceError> {
        let (user_id, user_name) = require_author(principal)?;
        new_stroke.validate()?;
        let charge = self.admission.charge(user_id, user_name, 1.0)?;

        let id = Uuid::new_v4();
        let stroke = new_stroke.into_stroke(id, self.clock.now_ms(), user_id, user_name);
        if let Err(e) = self.repository.insert_many(vec![stroke]) {
            self.admission.refund(user_id, charge);
            return Err(e.into());
        }
        debug!("Created stroke {} for {}", id, user_id);
        self.notify_changed();
        Ok(id)
    }

    /// Create several strokes at once; costs one unit per stroke.
    ///
    /// Batches over the ceiling are rejected before any accounting.
    pub fn create_strokes_batch(
        &self,
        principal: Option<&Principal>,
        new_strokes: Vec<NewStroke>,
    ) -> Result<BatchCreated, ServiceError> {
        let (user_id, user_name) = require_author(principal)?;
        let max = self.limits.max_paths_per_batch;
        if new_strokes.len() > max {
            warn!("Rejected batch of {} strokes from {}", new_strokes.len(), user_id);
            return Err(ServiceError::BatchTooLarge { max });
        }
        for new_stroke in &new_strokes {
            new_stroke.validate()?;
        }
        if new_strokes.is_empty() {
            return Ok(BatchCreated { ids: Vec::new(), count: 0 });
        }
        let charge = self.admission.charge(user_id, user_name, new_strokes.len() as f64)?;

        let created_at = self.clock.now_ms();
        let strokes: Vec<Stroke> = new_strokes
            .into_iter()
            .map(|s| s.into_stroke(Uuid::new_v4(), created_at, user_id, user_name))
            .collect();
        let ids: Vec<StrokeId> = strokes.iter().map(|s| s.id).collect();
        if let Err(e) = self.repository.insert_many(strokes) {
            self.admission.refund(user_id, charge);
            return Err(e.into());
        }
        debug!("Created {} stroke(s) for {}", ids.len(), user_id);
        self.notify_changed();
        Ok(BatchCreated { count: ids.len(), ids })
    }

    /// Change colour and/or width of a stroke the caller authored.
    pub fn update_stroke(
        &self,
        principal: Option<&Principal>,
        id: StrokeId,
        patch: StrokePatch,
    ) -> Result<UpdateResult, ServiceError> {
        let (user_id, user_name) = require_author(principal)?;
        if patch.is_empty() {
            return Err(ServiceError::InvalidInput("nothing to update".to_string()));
        }
        let stroke = self.repository.get(id)?.ok_or(ServiceError::NotFound)?;
        if !stroke.is_authored_by(user_id) {
            warn!("{} tried to edit stroke {} owned by {:?}", user_id, id, stroke.author_id);
            return Err(ServiceError::Unauthorized);
        }
        let charge = self.admission.charge(user_id, user_name, self.limits.update_cost)?;

        match self.repository.update(id, &patch) {
            Ok(Some(_)) => {}
            // Deleted between the lookup and the write.
            Ok(None) => {
                self.admission.refund(user_id, charge);
                return Err(ServiceError::NotFound);
            }
            Err(e) => {
                self.admission.refund(user_id, charge);
                return Err(e.into());
            }
        }
        debug!("Updated stroke {} for {}", id, user_id);
        self.notify_changed();
        Ok(UpdateResult { success: true })
    }

    /// Delete every stroke.
    pub fn delete_all_strokes(&self) -> Result<DeletedCount, ServiceError> {
        let deleted_count = self.repository.delete_where(&|_| true)?;
        info!("Deleted all {} stroke(s)", deleted_count);
        if deleted_count > 0 {
            self.notify_changed();
        }
        Ok(DeletedCount { deleted_count })
    }

    /// Delete strokes missing author fields.
    pub fn delete_orphan_strokes(&self) -> Result<DeletedCount, ServiceError> {
        let deleted_count = self.repository.delete_where(&Stroke::is_orphan)?;
        info!("Deleted {} orphan stroke(s)", deleted_count);
        if deleted_count > 0 {
            self.notify_changed();
        }
        Ok(DeletedCount { deleted_count })
    }

    /// The caller's admission usage, or `None` when signed out.
    pub fn admission_status(&self, principal: Option<&Principal>) -> Option<AdmissionStatus> {
        principal.map(|p| self.admission.status(&p.user_id))
    }
}
