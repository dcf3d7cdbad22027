//! Client-side canvas state: stroke store, session, tools and viewport.

use crate::error::{Feedback, ServiceError};
use crate::hit_test;
use crate::input::{MouseButton, PointerEvent, ViewportController};
use crate::storage::KeyValueStore;
use crate::stroke::{HexColor, NewStroke, Stroke, StrokeId, StrokePatch, UserId, clamp_width};
use crate::tools::{ToolKind, ToolManager};
use crate::viewport::Viewport;
use kurbo::{Point, Size};
use std::sync::Arc;

/// Persisted strokes as last received from the service, in creation order.
#[derive(Debug, Clone, Default)]
pub struct StrokeStore {
    strokes: Vec<Stroke>,
}

impl StrokeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a fresh snapshot.
    ///
    /// Snapshots arrive in insertion order; sorting by `created_at` is stable
    /// so equal timestamps (batches) keep their relative order.
    pub fn apply_snapshot(&mut self, mut strokes: Vec<Stroke>) {
        strokes.sort_by_key(|s| s.created_at);
        self.strokes = strokes;
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn get(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: StrokeId) -> Option<&mut Stroke> {
        self.strokes.iter_mut().find(|s| s.id == id)
    }

    /// Topmost stroke within pick tolerance of `point` (world space).
    pub fn find_at(&self, point: Point, zoom: f64) -> Option<&Stroke> {
        hit_test::find_stroke_at_point(point, &self.strokes, zoom)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

/// The signed-in principal as known to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<UserId>,
    pub display_name: Option<String>,
}

impl Session {
    pub fn signed_in(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            display_name: Some(display_name.into()),
        }
    }

    /// Check the preconditions for any write.
    pub fn require_writer(&self) -> Result<&str, ServiceError> {
        let user_id = self.user_id.as_deref().ok_or(ServiceError::Unauthenticated)?;
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(user_id),
            _ => Err(ServiceError::MissingProfile),
        }
    }
}

/// What the host should do after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasAction {
    /// Nothing changed.
    None,
    /// Redraw the frame.
    Redraw,
    /// Send this stroke to the persistence service.
    Submit(NewStroke),
    /// Show feedback to the user.
    Notify(Feedback),
}

/// An edit ready to be sent to the persistence service.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeEdit {
    pub id: StrokeId,
    pub patch: StrokePatch,
    /// Values the patch replaced, for [`Canvas::revert_edit`].
    pub previous: StrokePatch,
}

/// The whole client canvas.
pub struct Canvas {
    pub controller: ViewportController,
    pub strokes: StrokeStore,
    pub tools: ToolManager,
    pub session: Session,
    selected: Option<StrokeId>,
    storage: Option<Arc<dyn KeyValueStore>>,
}

impl Canvas {
    /// Canvas with a default viewport and no persistence.
    pub fn new(canvas_size: Size) -> Self {
        Self {
            controller: ViewportController::new(Viewport::default(), canvas_size),
            strokes: StrokeStore::new(),
            tools: ToolManager::new(),
            session: Session::default(),
            selected: None,
            storage: None,
        }
    }

    /// Canvas whose viewport is restored from, and saved to, `storage`.
    pub fn with_storage(canvas_size: Size, storage: Arc<dyn KeyValueStore>) -> Self {
        let viewport = Viewport::load(storage.as_ref());
        log::debug!("Restored viewport center={:?} zoom={}", viewport.center, viewport.zoom);
        Self {
            controller: ViewportController::new(viewport, canvas_size),
            storage: Some(storage),
            ..Self::new(canvas_size)
        }
    }

    pub fn viewport(&self) -> &Viewport {
        self.controller.viewport()
    }

    pub fn selected(&self) -> Option<&Stroke> {
        self.selected.and_then(|id| self.strokes.get(id))
    }

    pub fn selected_id(&self) -> Option<StrokeId> {
        self.selected
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool);
        self.controller.pan_end();
        if tool != ToolKind::Select {
            self.selected = None;
        }
    }

    /// Replace the stroke list with a snapshot from the service.
    pub fn apply_snapshot(&mut self, strokes: Vec<Stroke>) {
        self.strokes.apply_snapshot(strokes);
        if let Some(id) = self.selected {
            if self.strokes.get(id).is_none() {
                self.selected = None;
            }
        }
    }

    /// Topmost stroke under a screen point.
    pub fn stroke_at_screen(&self, screen_point: Point) -> Option<&Stroke> {
        let world = self.controller.screen_to_world(screen_point);
        self.strokes.find_at(world, self.viewport().zoom)
    }

    /// Set zoom from the settings panel.
    pub fn set_zoom(&mut self, zoom: f64) -> CanvasAction {
        let changed = self.controller.viewport_mut().set_zoom(zoom);
        self.viewport_changed(changed)
    }

    /// Set center from the settings panel.
    pub fn set_center(&mut self, center: Point) -> CanvasAction {
        let changed = self.controller.viewport_mut().set_center(center);
        self.viewport_changed(changed)
    }

    pub fn resize(&mut self, canvas_size: Size) {
        self.controller.set_canvas_size(canvas_size);
    }

    /// Route one pointer or wheel event.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> CanvasAction {
        match event {
            PointerEvent::Wheel { position, delta, modifiers } => {
                let changed = self.controller.wheel(position, delta, modifiers);
                self.viewport_changed(changed)
            }
            PointerEvent::Down { position, button: MouseButton::Left } => self.pointer_down(position),
            PointerEvent::Down { .. } => CanvasAction::None,
            PointerEvent::Move { position } => self.pointer_move(position),
            PointerEvent::Up { button: MouseButton::Left, .. } | PointerEvent::Leave => self.pointer_up(),
            PointerEvent::Up { .. } => CanvasAction::None,
        }
    }

    fn pointer_down(&mut self, position: Point) -> CanvasAction {
        match self.tools.current_tool {
            ToolKind::Drag => {
                self.controller.pan_start(position);
                CanvasAction::None
            }
            ToolKind::Draw => {
                let world = self.controller.screen_to_world(position);
                self.tools.begin(world);
                CanvasAction::Redraw
            }
            ToolKind::Select => {
                let hit = self.stroke_at_screen(position).map(|s| s.id);
                if hit == self.selected {
                    return CanvasAction::None;
                }
                self.selected = hit;
                CanvasAction::Redraw
            }
        }
    }

    fn pointer_move(&mut self, position: Point) -> CanvasAction {
        if self.controller.is_panning() {
            let changed = self.controller.pan_move(position);
            return self.viewport_changed(changed);
        }
        if self.tools.is_active() {
            let world = self.controller.screen_to_world(position);
            self.tools.update(world);
            return CanvasAction::Redraw;
        }
        CanvasAction::None
    }

    fn pointer_up(&mut self) -> CanvasAction {
        if self.controller.is_panning() {
            self.controller.pan_end();
            return CanvasAction::None;
        }
        if !self.tools.is_active() {
            return CanvasAction::None;
        }
        let Some(stroke) = self.tools.end() else {
            return CanvasAction::Redraw;
        };
        // Strokes drawn while signed out are discarded, not queued.
        match self.session.require_writer() {
            Ok(_) => CanvasAction::Submit(stroke),
            Err(e) => {
                log::debug!("Discarding stroke with {} points: {}", stroke.points.len(), e);
                CanvasAction::Notify(Feedback::from(&e))
            }
        }
    }

    /// Prepare an edit of the selected stroke.
    ///
    /// Only the author may edit. The local copy is updated immediately; if
    /// the service rejects the edit, hand it to [`Canvas::revert_edit`].
    pub fn edit_selected(
        &mut self,
        color: Option<HexColor>,
        width: Option<f64>,
    ) -> Result<StrokeEdit, ServiceError> {
        let user_id = self.session.require_writer()?.to_string();
        let id = self.selected.ok_or(ServiceError::NotFound)?;
        let stroke = self.strokes.get_mut(id).ok_or(ServiceError::NotFound)?;
        if !stroke.is_authored_by(&user_id) {
            return Err(ServiceError::Unauthorized);
        }
        let patch = StrokePatch {
            color,
            width: width.map(clamp_width),
        };
        let previous = StrokePatch {
            color: patch.color.as_ref().map(|_| stroke.color.clone()),
            width: patch.width.map(|_| stroke.width),
        };
        stroke.apply(&patch);
        Ok(StrokeEdit { id, patch, previous })
    }

    /// Undo a local edit the service did not accept.
    ///
    /// Returns false when the stroke is gone or a snapshot has already
    /// replaced the edited values.
    pub fn revert_edit(&mut self, edit: &StrokeEdit) -> bool {
        let Some(stroke) = self.strokes.get_mut(edit.id) else {
            return false;
        };
        let color_kept = edit.patch.color.as_ref().is_none_or(|c| *c == stroke.color);
        let width_kept = edit.patch.width.is_none_or(|w| w == stroke.width);
        if !(color_kept && width_kept) {
            return false;
        }
        stroke.apply(&edit.previous);
        true
    }

    fn viewport_changed(&self, changed: bool) -> CanvasAction {
        if !changed {
            return CanvasAction::None;
        }
        self.persist_viewport();
        CanvasAction::Redraw
    }

    fn persist_viewport(&self) {
        if let Some(storage) = &self.storage {
            if let Err(e) = self.viewport().save(storage.as_ref()) {
                log::warn!("Failed to persist viewport: {}", e);
            }
        }
    }
}
