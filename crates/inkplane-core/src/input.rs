//! Pointer/wheel input and the viewport controller state machine.

use crate::viewport::Viewport;
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom multiplier for a wheel notch towards the user (zoom in).
pub const ZOOM_IN_FACTOR: f64 = 1.1;
/// Zoom multiplier for a wheel notch away from the user (zoom out).
pub const ZOOM_OUT_FACTOR: f64 = 0.9;
/// Screen pixels panned per wheel notch.
pub const WHEEL_PAN_STEP: f64 = 50.0;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn zoom_modifier(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in screen coordinates (pixels relative to the surface).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, button: MouseButton },
    Up { position: Point, button: MouseButton },
    Move { position: Point },
    /// Pointer left the surface; treated like a release.
    Leave,
    Wheel {
        position: Point,
        delta: Vec2,
        modifiers: Modifiers,
    },
}

/// Pan state. Zooming happens per wheel event and is never held.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanState {
    #[default]
    Idle,
    Panning {
        /// Last sampled pointer position.
        last: Point,
    },
}

/// Screen axis for wheel panning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Outcome of a wheel event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelAction {
    Zoom { factor: f64 },
    Pan { axis: Axis, direction: f64 },
    None,
}

impl WheelAction {
    /// Decide what a wheel event does.
    ///
    /// Zoom modifier: zoom in when scrolling up, out when scrolling down.
    /// Shift: horizontal pan. Otherwise vertical pan, or horizontal pan for a
    /// purely horizontal scroll.
    pub fn classify(delta: Vec2, modifiers: Modifiers) -> Self {
        if modifiers.zoom_modifier() {
            return match direction(delta.y) {
                Some(d) if d > 0.0 => WheelAction::Zoom { factor: ZOOM_OUT_FACTOR },
                Some(_) => WheelAction::Zoom { factor: ZOOM_IN_FACTOR },
                None => WheelAction::None,
            };
        }
        if modifiers.shift {
            return match direction(delta.y).or_else(|| direction(delta.x)) {
                Some(d) => WheelAction::Pan { axis: Axis::Horizontal, direction: d },
                None => WheelAction::None,
            };
        }
        match (direction(delta.y), direction(delta.x)) {
            (Some(d), _) => WheelAction::Pan { axis: Axis::Vertical, direction: d },
            (None, Some(d)) => WheelAction::Pan { axis: Axis::Horizontal, direction: d },
            (None, None) => WheelAction::None,
        }
    }
}

fn direction(value: f64) -> Option<f64> {
    if value > 0.0 {
        Some(1.0)
    } else if value < 0.0 {
        Some(-1.0)
    } else {
        None
    }
}

/// Owns the viewport and applies pan/zoom input to it.
///
/// Every handler is synchronous and returns whether the viewport changed, so
/// the caller knows when to persist and redraw.
#[derive(Debug, Clone)]
pub struct ViewportController {
    viewport: Viewport,
    canvas_size: Size,
    state: PanState,
}

impl ViewportController {
    pub fn new(viewport: Viewport, canvas_size: Size) -> Self {
        Self {
            viewport,
            canvas_size,
            state: PanState::Idle,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Mutable access for direct numeric edits.
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn set_canvas_size(&mut self, canvas_size: Size) {
        self.canvas_size = canvas_size;
    }

    pub fn state(&self) -> PanState {
        self.state
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.state, PanState::Panning { .. })
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.viewport.screen_to_world(screen_point, self.canvas_size)
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.viewport.world_to_screen(world_point, self.canvas_size)
    }

    /// `Idle -> Panning`.
    pub fn pan_start(&mut self, position: Point) {
        self.state = PanState::Panning { last: position };
    }

    /// Apply the pointer delta since the last sample while panning.
    pub fn pan_move(&mut self, position: Point) -> bool {
        let PanState::Panning { last } = self.state else {
            return false;
        };
        self.state = PanState::Panning { last: position };
        let delta = position - last;
        if delta == Vec2::ZERO {
            return false;
        }
        self.viewport.pan_screen(delta);
        true
    }

    /// `Panning -> Idle`.
    pub fn pan_end(&mut self) {
        self.state = PanState::Idle;
    }

    /// Anchor-preserving zoom around `screen_point`.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) -> bool {
        self.viewport.zoom_at(screen_point, factor, self.canvas_size)
    }

    /// Pan one wheel notch along `axis`.
    ///
    /// The step is fixed in screen pixels, so the world delta shrinks as the
    /// zoom grows.
    pub fn axis_pan(&mut self, axis: Axis, direction: f64) -> bool {
        let step = WHEEL_PAN_STEP * direction;
        let delta = match axis {
            Axis::Horizontal => Vec2::new(step, 0.0),
            Axis::Vertical => Vec2::new(0.0, step),
        };
        // Content moves with the wheel, so the center moves against it.
        self.viewport.pan_screen(delta);
        true
    }

    pub fn wheel(&mut self, position: Point, delta: Vec2, modifiers: Modifiers) -> bool {
        match WheelAction::classify(delta, modifiers) {
            WheelAction::Zoom { factor } => self.zoom_at(position, factor),
            WheelAction::Pan { axis, direction } => self.axis_pan(axis, direction),
            WheelAction::None => false,
        }
    }
}
