//! Platform capture facility boundary.
//!
//! The session talks to the platform exclusively through these traits:
//! display enumeration, the permission check/request pair, and the
//! open/update/close lifecycle of one pixel stream. Production code uses the
//! WGC backend on Windows and a stub elsewhere; tests script a mock.

use crate::config::CaptureConfig;
use crate::display::Display;
use crate::session::FaultSender;
use crate::sink::FrameSink;
use crate::CaptureResult;

pub trait CaptureBackend {
    /// Enumerates displays fresh on every call; results are never cached
    /// beyond a single operation since displays can be (dis)connected.
    fn displays(&self) -> Vec<Display>;

    /// Whether capture permission is currently granted.
    fn has_permission(&self) -> bool;

    /// Requests capture permission. Idempotent: a prior grant is remembered
    /// by the platform, not by the caller. Returns the resulting grant.
    fn request_permission(&self) -> bool;

    /// Opens a live stream with `sink` registered as the frame consumer.
    /// Asynchronous faults after a successful open are raised through
    /// `faults`, tagged with the owning stream's generation.
    fn open_stream(
        &mut self,
        display: &Display,
        config: &CaptureConfig,
        sink: FrameSink,
        faults: FaultSender,
    ) -> CaptureResult<Box<dyn CaptureStream>>;
}

pub trait CaptureStream: Send {
    /// Atomically replaces the stream configuration; no delivered frame is
    /// ever a mix of old and new geometry.
    fn update(&mut self, config: &CaptureConfig) -> CaptureResult<()>;

    /// Tears down the stream and releases the target-display handle.
    fn close(&mut self);
}
