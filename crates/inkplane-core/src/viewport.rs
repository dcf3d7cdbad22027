//! Viewport value object: pan center and zoom.

use crate::geometry;
use crate::storage::{KeyValueStore, StorageResult};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest zoom the UI allows.
pub const MIN_ZOOM: f64 = 0.1;
/// Largest zoom the UI allows.
pub const MAX_ZOOM: f64 = 5.0;
/// Zoom applied when no persisted value exists.
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Storage key for the persisted center x coordinate.
pub const CENTER_X_KEY: &str = "canvas.center.x";
/// Storage key for the persisted center y coordinate.
pub const CENTER_Y_KEY: &str = "canvas.center.y";
/// Storage key for the persisted zoom.
pub const ZOOM_KEY: &str = "canvas.zoom";

/// The part of the world plane shown on screen.
///
/// `center` is the world point drawn at the middle of the surface and `zoom`
/// is the number of screen pixels per world unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// World point at the middle of the surface.
    pub center: Point,
    /// Screen pixels per world unit, always within `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: Point::ZERO,
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl Viewport {
    /// Create a viewport; zoom is clamped into the allowed range.
    pub fn new(center: Point, zoom: f64) -> Self {
        let mut viewport = Self::default();
        viewport.set_center(center);
        viewport.set_zoom(zoom);
        viewport
    }

    /// World-to-screen transform for a surface of `canvas_size`.
    pub fn transform(&self, canvas_size: Size) -> Affine {
        geometry::view_transform(self, canvas_size)
    }

    pub fn screen_to_world(&self, screen_point: Point, canvas_size: Size) -> Point {
        geometry::screen_to_world(screen_point, self, canvas_size)
    }

    pub fn world_to_screen(&self, world_point: Point, canvas_size: Size) -> Point {
        geometry::world_to_screen(world_point, self, canvas_size)
    }

    /// Move the view by a delta measured in screen pixels.
    ///
    /// Dragging right moves the world right under the cursor, so the
    /// center moves left.
    pub fn pan_screen(&mut self, screen_delta: Vec2) {
        self.center -= screen_delta / self.zoom;
    }

    /// Multiply the zoom by `factor`, keeping the world point under
    /// `screen_point` at the same pixel.
    ///
    /// Returns `false` if the clamped zoom did not change.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64, canvas_size: Size) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }

        let anchor = self.screen_to_world(screen_point, canvas_size);
        let local = screen_point - geometry::canvas_center(canvas_size);
        self.zoom = new_zoom;
        self.center = anchor - local.to_vec2() / new_zoom;
        true
    }

    /// Set the zoom directly (settings panel). Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let changed = zoom != self.zoom;
        self.zoom = zoom;
        changed
    }

    /// Set the center directly (settings panel). Non-finite values are ignored.
    pub fn set_center(&mut self, center: Point) -> bool {
        if !center.is_finite() {
            return false;
        }
        let changed = center != self.center;
        self.center = center;
        changed
    }

    /// World-space rectangle currently visible.
    pub fn visible_world_rect(&self, canvas_size: Size) -> Rect {
        let top_left = self.screen_to_world(Point::ZERO, canvas_size);
        let bottom_right =
            self.screen_to_world(Point::new(canvas_size.width, canvas_size.height), canvas_size);
        Rect::from_points(top_left, bottom_right)
    }

    /// Restore a viewport from key/value storage.
    ///
    /// Missing or unparsable entries fall back to the defaults, so the result
    /// never carries NaN.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        let x = read_scalar(store, CENTER_X_KEY).unwrap_or(defaults.center.x);
        let y = read_scalar(store, CENTER_Y_KEY).unwrap_or(defaults.center.y);
        let zoom = read_scalar(store, ZOOM_KEY)
            .filter(|z| *z > 0.0)
            .unwrap_or(defaults.zoom);
        Self::new(Point::new(x, y), zoom)
    }

    /// Write the three scalar entries to key/value storage.
    pub fn save(&self, store: &dyn KeyValueStore) -> StorageResult<()> {
        store.set(CENTER_X_KEY, &self.center.x.to_string())?;
        store.set(CENTER_Y_KEY, &self.center.y.to_string())?;
        store.set(ZOOM_KEY, &self.zoom.to_string())
    }
}

fn read_scalar(store: &dyn KeyValueStore, key: &str) -> Option<f64> {
    match store.get(key) {
        Ok(Some(raw)) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                log::warn!("Ignoring unparsable viewport entry {key}={raw:?}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("Failed to read viewport entry {key}: {e}");
            None
        }
    }
}
