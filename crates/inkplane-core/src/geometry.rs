//! Screen/world coordinate mapping and point-to-segment distance.
//!
//! The renderer draws world geometry through [`view_transform`]: translate by
//! `-center`, scale by `zoom`, then translate to the middle of the surface.
//! [`screen_to_world`] is the exact inverse of that mapping.

use crate::viewport::Viewport;
use kurbo::{Affine, Point, Size, Vec2};

/// Vector from the surface origin to its middle pixel.
pub fn canvas_center(canvas_size: Size) -> Vec2 {
    Vec2::new(canvas_size.width / 2.0, canvas_size.height / 2.0)
}

/// World-to-screen transform for rendering.
pub fn view_transform(viewport: &Viewport, canvas_size: Size) -> Affine {
    Affine::translate(canvas_center(canvas_size))
        * Affine::scale(viewport.zoom)
        * Affine::translate(-viewport.center.to_vec2())
}

/// Convert a screen point to world coordinates.
pub fn screen_to_world(screen_point: Point, viewport: &Viewport, canvas_size: Size) -> Point {
    let local = screen_point - canvas_center(canvas_size);
    viewport.center + local.to_vec2() / viewport.zoom
}

/// Convert a world point to screen coordinates.
pub fn world_to_screen(world_point: Point, viewport: &Viewport, canvas_size: Size) -> Point {
    let local = (world_point - viewport.center) * viewport.zoom;
    Point::new(local.x, local.y) + canvas_center(canvas_size)
}

/// Distance from `point` to the segment `a`-`b`.
///
/// A zero-length segment degrades to the distance between `point` and `a`.
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let projection = a + seg * t;
    (point - projection).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn distance_to_polyline(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| distance_to_segment(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: Size = Size::new(800.0, 600.0);

    fn assert_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_center_of_surface_maps_to_viewport_center() {
        let viewport = Viewport::new(Point::new(120.0, -40.0), 2.5);
        let world = screen_to_world(Point::new(400.0, 300.0), &viewport, SIZE);
        assert_close(world, viewport.center);
    }

    #[test]
    fn test_screen_to_world_scales_by_zoom() {
        let viewport = Viewport::new(Point::ZERO, 2.0);
        let world = screen_to_world(Point::new(500.0, 400.0), &viewport, SIZE);
        assert_close(world, Point::new(50.0, 50.0));
    }

    #[test]
    fn test_inverse_law() {
        let zooms = [0.1, 0.37, 1.0, 1.68, 4.99, 250.0];
        let centers = [Point::ZERO, Point::new(-1e4, 3.5), Point::new(77.7, 1e5)];
        let screens = [Point::ZERO, Point::new(123.0, 456.0), Point::new(799.0, 1.0)];
        for &zoom in &zooms {
            for &center in &centers {
                let viewport = Viewport::new(center, zoom);
                for &screen in &screens {
                    let world = screen_to_world(screen, &viewport, SIZE);
                    let back = world_to_screen(world, &viewport, SIZE);
                    assert!((back.x - screen.x).abs() < 1e-6);
                    assert!((back.y - screen.y).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_transform_matches_world_to_screen() {
        let viewport = Viewport::new(Point::new(30.0, -20.0), 1.5);
        let world = Point::new(12.0, 99.0);
        assert_close(view_transform(&viewport, SIZE) * world, world_to_screen(world, &viewport, SIZE));
    }

    #[test]
    fn test_distance_to_segment_perpendicular() {
        let d = distance_to_segment(Point::new(5.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_to_segment_past_endpoint() {
        let d = distance_to_segment(Point::new(13.0, 4.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_segment_is_point_distance() {
        let a = Point::new(1.0, 1.0);
        let d = distance_to_segment(Point::new(4.0, 5.0), a, a);
        assert!((d - 5.0).abs() < 1e-12);
        assert!(d.is_finite());
    }

    #[test]
    fn test_polyline_distance_takes_minimum() {
        let points = [Point::ZERO, Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let d = distance_to_polyline(Point::new(12.0, 5.0), &points);
        assert!((d - 2.0).abs() < 1e-12);
        assert!(distance_to_polyline(Point::ZERO, &points[..1]).is_infinite());
    }
}
