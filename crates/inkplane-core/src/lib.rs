//! Inkplane Core Library
//!
//! Platform-agnostic pieces of the Inkplane shared canvas: viewport geometry
//! and input handling, the stroke model, hit-testing and the error taxonomy
//! shared with the server.

pub mod canvas;
pub mod error;
pub mod geometry;
pub mod input;
pub mod protocol;
pub mod render;
pub mod storage;
pub mod stroke;
pub mod tools;
pub mod viewport;

pub use canvas::{Canvas, CanvasAction, Session, StrokeEdit, StrokeStore};
pub use error::{Feedback, ServiceError};
pub use geometry::{distance_to_segment, screen_to_world, world_to_screen};
pub use hit_test::find_stroke_at_point;
pub use input::{Modifiers, MouseButton, PanState, PointerEvent, ViewportController};
pub use render::{GRID_SIZE, RenderFrame};
pub use stroke::{HexColor, NewStroke, Stroke, StrokeId, StrokePatch, UserId, clamp_width};
pub use tools::{ToolKind, ToolManager};
pub use viewport::Viewport;
