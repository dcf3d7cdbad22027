//! Persisted freehand strokes.

use crate::error::ServiceError;
use kurbo::{BezPath, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for strokes.
pub type StrokeId = Uuid;

/// Identifier of an authenticated principal.
pub type UserId = String;

/// Lower bound applied to every stored width.
pub const MIN_STROKE_WIDTH: f64 = 0.000_000_1;
/// Upper bound applied to every stored width.
pub const MAX_STROKE_WIDTH: f64 = 50.0;

/// Clamp a requested width into `[MIN_STROKE_WIDTH, MAX_STROKE_WIDTH]`.
///
/// NaN maps to the minimum so the stored value is always in range.
pub fn clamp_width(width: f64) -> f64 {
    if width.is_nan() {
        return MIN_STROKE_WIDTH;
    }
    width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH)
}

/// A `#rrggbb` colour, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let hex = raw
            .strip_prefix('#')
            .ok_or_else(|| ServiceError::InvalidInput(format!("colour {raw:?} must start with '#'")))?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ServiceError::InvalidInput(format!(
                "colour {raw:?} is not of the form #rrggbb"
            )));
        }
        Ok(Self(format!("#{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// RGB components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0);
        (channel(1), channel(3), channel(5))
    }

    /// Opaque render colour.
    pub fn to_color(&self) -> Color {
        let (r, g, b) = self.rgb();
        Color::from_rgba8(r, g, b, 255)
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self("#000000".to_string())
    }
}

impl TryFrom<String> for HexColor {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stroke as stored by the persistence service.
///
/// `points` never change after creation. Author fields are optional only so
/// that legacy rows without them can be loaded and cleaned up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: HexColor,
    pub width: f64,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl Stroke {
    /// Whether the stroke can be drawn as a line (and hit-tested).
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }

    /// Whether `user_id` authored this stroke.
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id.as_deref() == Some(user_id)
    }

    /// Strokes missing either author field.
    pub fn is_orphan(&self) -> bool {
        let missing = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
        missing(&self.author_id) || missing(&self.author_name)
    }

    /// Bounding box of the points, ignoring width.
    pub fn bounds(&self) -> Rect {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };
        points.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
    }

    /// Polyline path in world coordinates.
    pub fn to_path(&self) -> BezPath {
        polyline_path(&self.points)
    }

    /// Apply a patch, clamping the width.
    pub fn apply(&mut self, patch: &StrokePatch) {
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(width) = patch.width {
            self.width = clamp_width(width);
        }
    }
}

pub(crate) fn polyline_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for point in iter {
            path.line_to(*point);
        }
    }
    path
}

/// Payload for creating a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStroke {
    pub points: Vec<Point>,
    pub color: HexColor,
    pub width: f64,
}

impl NewStroke {
    pub fn new(points: Vec<Point>, color: HexColor, width: f64) -> Self {
        Self { points, color, width }
    }

    /// Reject coordinates that cannot be stored or rendered.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(bad) = self.points.iter().find(|p| !p.is_finite()) {
            return Err(ServiceError::InvalidInput(format!(
                "point ({}, {}) is not finite",
                bad.x, bad.y
            )));
        }
        Ok(())
    }

    /// Build the stored stroke, clamping the width.
    pub fn into_stroke(self, id: StrokeId, created_at: u64, author_id: &str, author_name: &str) -> Stroke {
        Stroke {
            id,
            points: self.points,
            color: self.color,
            width: clamp_width(self.width),
            created_at,
            author_id: Some(author_id.to_string()),
            author_name: Some(author_name.to_string()),
        }
    }
}

/// Author-only edit of colour and/or width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl StrokePatch {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.width.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(points: Vec<Point>) -> Stroke {
        NewStroke::new(points, HexColor::default(), 2.0).into_stroke(Uuid::new_v4(), 0, "u1", "ada")
    }

    #[test]
    fn test_clamp_width() {
        assert!((clamp_width(1000.0) - 50.0).abs() < f64::EPSILON);
        assert!((clamp_width(-5.0) - 1e-7).abs() < f64::EPSILON);
        assert!((clamp_width(f64::NAN) - 1e-7).abs() < f64::EPSILON);
        assert!((clamp_width(3.25) - 3.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hex_color_parse() {
        let color = HexColor::parse("#A1b2C3").unwrap();
        assert_eq!(color.as_str(), "#a1b2c3");
        assert_eq!(color.rgb(), (0xa1, 0xb2, 0xc3));
        assert!(HexColor::parse("a1b2c3").is_err());
        assert!(HexColor::parse("#abc").is_err());
        assert!(HexColor::parse("#gg0000").is_err());
    }

    #[test]
    fn test_hex_color_serde() {
        let color: HexColor = serde_json::from_str("\"#FF0000\"").unwrap();
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#ff0000\"");
        assert!(serde_json::from_str::<HexColor>("\"red\"").is_err());
    }

    #[test]
    fn test_into_stroke_clamps_width() {
        let s = NewStroke::new(vec![Point::ZERO, Point::new(1.0, 1.0)], HexColor::default(), 1000.0)
            .into_stroke(Uuid::new_v4(), 5, "u1", "ada");
        assert!((s.width - MAX_STROKE_WIDTH).abs() < f64::EPSILON);
        assert!(s.is_authored_by("u1"));
        assert!(!s.is_orphan());
    }

    #[test]
    fn test_patch_clamps_width() {
        let mut s = stroke(vec![Point::ZERO, Point::new(1.0, 0.0)]);
        s.apply(&StrokePatch { color: None, width: Some(-5.0) });
        assert!((s.width - MIN_STROKE_WIDTH).abs() < f64::EPSILON);
        assert_eq!(s.color, HexColor::default());
    }

    #[test]
    fn test_drawable_and_bounds() {
        assert!(!stroke(vec![Point::ZERO]).is_drawable());
        let s = stroke(vec![Point::new(0.0, 5.0), Point::new(10.0, -5.0), Point::new(4.0, 20.0)]);
        assert!(s.is_drawable());
        assert_eq!(s.bounds(), Rect::new(0.0, -5.0, 10.0, 20.0));
        assert_eq!(stroke(vec![]).bounds(), Rect::ZERO);
    }

    #[test]
    fn test_orphan_detection() {
        let mut s = stroke(vec![Point::ZERO, Point::new(1.0, 0.0)]);
        s.author_name = Some(String::new());
        assert!(s.is_orphan());
        s.author_name = None;
        assert!(s.is_orphan());
    }

    #[test]
    fn test_legacy_row_without_author_deserializes() {
        let json = r##"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","points":[{"x":1.0,"y":2.0}],"color":"#123456","width":3.0,"createdAt":7}"##;
        let s: Stroke = serde_json::from_str(json).unwrap();
        assert!(s.is_orphan());
        assert_eq!(s.points, vec![Point::new(1.0, 2.0)]);
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let bad = NewStroke::new(vec![Point::new(f64::NAN, 0.0)], HexColor::default(), 1.0);
        assert!(matches!(bad.validate(), Err(ServiceError::InvalidInput(_))));
    }
}
