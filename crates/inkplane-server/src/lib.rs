//! Inkplane stroke server.
//!
//! Persists strokes for a shared canvas, enforces authorship on edits and
//! meters writes per user with a fixed-window admission controller.

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod repository;
pub mod routes;
pub mod service;

pub use admission::{AdmissionCharge, AdmissionController, AdmissionLimits, RateLimitWindow};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServerConfig;
pub use error::ApiError;
pub use repository::{FileStrokeRepository, MemoryStrokeRepository, StrokeRepository};
pub use routes::router;
pub use service::{CanvasService, Principal, ServiceLimits};
