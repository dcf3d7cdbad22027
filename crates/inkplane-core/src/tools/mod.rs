//! Tool selection and the in-progress stroke.

use crate::stroke::{HexColor, NewStroke, clamp_width};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Default brush width in world units.
pub const DEFAULT_BRUSH_WIDTH: f64 = 2.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    /// Pan the view by dragging.
    #[default]
    Drag,
    /// Freehand drawing.
    Draw,
    /// Pick a stroke to edit.
    Select,
}

/// State of a tool interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// A stroke is being drawn; points are in world space.
    Drawing { points: Vec<Point> },
}

/// Manages the current tool, brush settings and the stroke being drawn.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current state of the tool.
    pub state: ToolState,
    /// Colour applied to new strokes.
    pub brush_color: HexColor,
    /// Width applied to new strokes (always within the stored range).
    brush_width: f64,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::default(),
            brush_color: HexColor::default(),
            brush_width: DEFAULT_BRUSH_WIDTH,
        }
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch tools, discarding any stroke in progress.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.current_tool != tool {
            self.cancel();
            self.current_tool = tool;
        }
    }

    pub fn brush_width(&self) -> f64 {
        self.brush_width
    }

    pub fn set_brush_width(&mut self, width: f64) {
        self.brush_width = clamp_width(width);
    }

    /// Start a stroke at `point` (world space).
    pub fn begin(&mut self, point: Point) {
        self.state = ToolState::Drawing { points: vec![point] };
    }

    /// Append a point to the stroke in progress. Consecutive duplicates are
    /// skipped.
    pub fn update(&mut self, point: Point) {
        if let ToolState::Drawing { points } = &mut self.state {
            if points.last() != Some(&point) {
                points.push(point);
            }
        }
    }

    /// Finish the stroke in progress.
    ///
    /// Returns the creation payload when at least two points were captured;
    /// shorter strokes are dropped.
    pub fn end(&mut self) -> Option<NewStroke> {
        match std::mem::take(&mut self.state) {
            ToolState::Drawing { points } if points.len() >= 2 => Some(NewStroke::new(
                points,
                self.brush_color.clone(),
                self.brush_width,
            )),
            _ => None,
        }
    }

    /// Drop the stroke in progress.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Drawing { .. })
    }

    /// Points of the stroke in progress.
    pub fn preview_points(&self) -> &[Point] {
        match &self.state {
            ToolState::Drawing { points } => points,
            ToolState::Idle => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_accumulates_points() {
        let mut tools = ToolManager::new();
        tools.set_tool(ToolKind::Draw);
        tools.begin(Point::new(0.0, 0.0));
        tools.update(Point::new(1.0, 1.0));
        tools.update(Point::new(1.0, 1.0));
        tools.update(Point::new(2.0, 0.0));
        assert_eq!(tools.preview_points().len(), 3);

        let stroke = tools.end().unwrap();
        assert_eq!(stroke.points.len(), 3);
        assert!(!tools.is_active());
    }

    #[test]
    fn test_single_point_stroke_is_dropped() {
        let mut tools = ToolManager::new();
        tools.begin(Point::new(3.0, 3.0));
        assert!(tools.end().is_none());
        assert!(tools.preview_points().is_empty());
    }

    #[test]
    fn test_switching_tool_cancels_stroke() {
        let mut tools = ToolManager::new();
        tools.set_tool(ToolKind::Draw);
        tools.begin(Point::ZERO);
        tools.update(Point::new(5.0, 5.0));
        tools.set_tool(ToolKind::Select);
        assert!(!tools.is_active());
        assert!(tools.end().is_none());
    }

    #[test]
    fn test_brush_width_is_clamped() {
        let mut tools = ToolManager::new();
        tools.set_brush_width(80.0);
        assert!((tools.brush_width() - 50.0).abs() < f64::EPSILON);
    }
}
