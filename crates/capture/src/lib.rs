//! Live region-capture pipeline for MirrorPane
//!
//! Owns the capture-session state machine, the geometry translation between
//! UI space (bottom-left origin, logical points) and capture space (top-left
//! origin), and the latest-wins frame hand-off to the display surface. The
//! platform capture facility sits behind [`backend::CaptureBackend`]; on
//! Windows that is Windows.Graphics.Capture, elsewhere a stub.

pub mod backend;
pub mod config;
pub mod display;
pub mod frame;
pub mod geometry;
pub mod session;
pub mod sink;

#[cfg(target_os = "windows")]
pub mod wgc;
#[cfg(target_os = "windows")]
pub use wgc::WgcBackend as PlatformBackend;

#[cfg(not(target_os = "windows"))]
pub mod stub;
#[cfg(not(target_os = "windows"))]
pub use stub::StubBackend as PlatformBackend;

pub use config::{CaptureConfig, PixelFormat};
pub use display::{Display, DisplayId, Region, SurfaceId};
pub use frame::Frame;
pub use geometry::Rect;
pub use session::{CaptureSession, SessionState, StreamFault};
pub use sink::{frame_channel, FrameOutput, FrameSink};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("could not resolve the target display")]
    DisplayNotFound,

    #[error("screen recording permission denied")]
    PermissionDenied,

    #[error("a capture stream is already running")]
    AlreadyRunning,

    #[error("capture is not running")]
    NotRunning,

    #[error("capture stream failed: {0}")]
    Stream(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
