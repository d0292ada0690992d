//! Non-Windows stub backend so the workspace compiles and the pure core
//! tests run on any host.

use tracing::warn;

use crate::backend::{CaptureBackend, CaptureStream};
use crate::config::CaptureConfig;
use crate::display::Display;
use crate::session::FaultSender;
use crate::sink::FrameSink;
use crate::{CaptureError, CaptureResult};

pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        warn!("screen capture is not supported on this platform");
        Self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for StubBackend {
    fn displays(&self) -> Vec<Display> {
        Vec::new()
    }

    fn has_permission(&self) -> bool {
        true
    }

    fn request_permission(&self) -> bool {
        true
    }

    fn open_stream(
        &mut self,
        _display: &Display,
        _config: &CaptureConfig,
        _sink: FrameSink,
        _faults: FaultSender,
    ) -> CaptureResult<Box<dyn CaptureStream>> {
        Err(CaptureError::Stream("screen capture is not supported on this platform".into()))
    }
}
