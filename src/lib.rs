//! Pick the four corners of a region on an image and hand them, in the
//! image's native pixel space, to an external processing service.

pub mod app;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod mask;
pub mod overlay;
pub mod points;
pub mod session;
pub mod submit;
pub mod surface;
pub mod transform;

pub use app::CornerCropApp;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
