//! Per-frame draw lists for a renderer.
//!
//! Strokes stay in world coordinates; the renderer applies
//! [`RenderFrame::transform`] so every frame re-projects them with the current
//! viewport. Widths are in world units and scale with zoom.

use crate::canvas::Canvas;
use crate::stroke::{Stroke, StrokeId, polyline_path};
use crate::viewport::Viewport;
use kurbo::{Affine, BezPath, Line, Point, Size};
use peniko::Color;

/// World units between grid lines.
pub const GRID_SIZE: f64 = 50.0;

/// Grid line colour (`#e5e7eb`).
pub const GRID_COLOR: Color = Color::from_rgba8(0xe5, 0xe7, 0xeb, 0xff);

/// Hard cap on grid lines per axis so extreme zoom-out stays cheap.
const MAX_GRID_LINES: usize = 2_000;

/// One polyline to stroke.
#[derive(Debug, Clone)]
pub struct RenderStroke {
    pub id: Option<StrokeId>,
    pub path: BezPath,
    pub color: Color,
    pub width: f64,
}

impl RenderStroke {
    fn from_stroke(stroke: &Stroke) -> Self {
        Self {
            id: Some(stroke.id),
            path: stroke.to_path(),
            color: stroke.color.to_color(),
            width: stroke.width,
        }
    }
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// World-to-screen transform.
    pub transform: Affine,
    /// Grid lines in world space.
    pub grid: Vec<Line>,
    /// Grid line width in world units (one screen pixel).
    pub grid_line_width: f64,
    /// Persisted strokes, bottom to top.
    pub strokes: Vec<RenderStroke>,
    /// Stroke being drawn, on top of everything.
    pub preview: Option<RenderStroke>,
    /// Selected stroke, for highlighting.
    pub selection: Option<StrokeId>,
}

impl RenderFrame {
    /// Build the draw list for the canvas's current state.
    pub fn build(canvas: &Canvas) -> Self {
        let viewport = canvas.viewport();
        let canvas_size = canvas.controller.canvas_size();

        let strokes = canvas
            .strokes
            .strokes()
            .iter()
            .filter(|s| s.is_drawable())
            .map(RenderStroke::from_stroke)
            .collect();

        let preview_points = canvas.tools.preview_points();
        let preview = (preview_points.len() >= 2).then(|| RenderStroke {
            id: None,
            path: polyline_path(preview_points),
            color: canvas.tools.brush_color.to_color(),
            width: canvas.tools.brush_width(),
        });

        Self {
            transform: viewport.transform(canvas_size),
            grid: grid_lines(viewport, canvas_size),
            grid_line_width: 1.0 / viewport.zoom,
            strokes,
            preview,
            selection: canvas.selected_id(),
        }
    }
}

/// Vertical then horizontal grid lines covering the visible region.
///
/// Lines start at the visible edge rounded down to the grid and extend one
/// cell past the far edge.
pub fn grid_lines(viewport: &Viewport, canvas_size: Size) -> Vec<Line> {
    let visible = viewport.visible_world_rect(canvas_size);
    let start_x = (visible.x0 / GRID_SIZE).floor() * GRID_SIZE;
    let start_y = (visible.y0 / GRID_SIZE).floor() * GRID_SIZE;
    let end_x = visible.x1 + GRID_SIZE;
    let end_y = visible.y1 + GRID_SIZE;

    let columns = (((end_x - start_x) / GRID_SIZE) as usize + 1).min(MAX_GRID_LINES);
    let rows = (((end_y - start_y) / GRID_SIZE) as usize + 1).min(MAX_GRID_LINES);

    let mut lines = Vec::with_capacity(columns + rows);
    for i in 0..columns {
        let x = start_x + i as f64 * GRID_SIZE;
        if x > end_x {
            break;
        }
        lines.push(Line::new(Point::new(x, start_y), Point::new(x, end_y)));
    }
    for i in 0..rows {
        let y = start_y + i as f64 * GRID_SIZE;
        if y > end_y {
            break;
        }
        lines.push(Line::new(Point::new(start_x, y), Point::new(end_x, y)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Session;
    use crate::input::{MouseButton, PointerEvent};
    use crate::stroke::{HexColor, NewStroke};
    use crate::tools::ToolKind;
    use uuid::Uuid;

    #[test]
    fn test_grid_covers_visible_region() {
        let viewport = Viewport::new(Point::new(10.0, 10.0), 1.0);
        let size = Size::new(200.0, 100.0);
        let lines = grid_lines(&viewport, size);
        let visible = viewport.visible_world_rect(size);

        let verticals: Vec<_> = lines.iter().filter(|l| l.p0.x == l.p1.x).collect();
        let horizontals: Vec<_> = lines.iter().filter(|l| l.p0.y == l.p1.y).collect();
        assert!(verticals.first().unwrap().p0.x <= visible.x0);
        assert!(verticals.last().unwrap().p0.x >= visible.x1);
        assert!(horizontals.first().unwrap().p0.y <= visible.y0);
        assert!(horizontals.last().unwrap().p0.y >= visible.y1);
        assert!(verticals.iter().all(|l| (l.p0.x / GRID_SIZE).fract() == 0.0));
    }

    #[test]
    fn test_grid_is_capped_when_zoomed_out() {
        let viewport = Viewport::new(Point::ZERO, 0.1);
        let lines = grid_lines(&viewport, Size::new(1e6, 1e6));
        assert!(lines.len() <= 2 * MAX_GRID_LINES);
    }

    #[test]
    fn test_frame_skips_short_strokes_and_includes_preview() {
        let size = Size::new(400.0, 400.0);
        let mut canvas = Canvas::new(size);
        canvas.session = Session::signed_in("u1", "ada");
        let dot = NewStroke::new(vec![Point::ZERO], HexColor::default(), 1.0)
            .into_stroke(Uuid::new_v4(), 1, "u1", "ada");
        let line = NewStroke::new(vec![Point::ZERO, Point::new(5.0, 5.0)], HexColor::default(), 1.0)
            .into_stroke(Uuid::new_v4(), 2, "u1", "ada");
        canvas.apply_snapshot(vec![dot, line.clone()]);

        canvas.set_tool(ToolKind::Draw);
        canvas.handle_pointer(PointerEvent::Down { position: Point::ZERO, button: MouseButton::Left });
        canvas.handle_pointer(PointerEvent::Move { position: Point::new(3.0, 4.0) });

        let frame = RenderFrame::build(&canvas);
        assert_eq!(frame.strokes.len(), 1);
        assert_eq!(frame.strokes[0].id, Some(line.id));
        assert!(frame.preview.is_some());
        assert!((frame.grid_line_width - 1.0).abs() < f64::EPSILON);
    }
}
