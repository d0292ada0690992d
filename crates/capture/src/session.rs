//! Capture-session state machine.
//!
//! Owns the lifecycle of the single active stream: start, live reconfigure,
//! stop. All mutating calls happen on the UI-affine thread; serialization is
//! enforced by rejecting calls from a non-matching state, never by queuing.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::backend::{CaptureBackend, CaptureStream};
use crate::config::CaptureConfig;
use crate::display::{Display, DisplayId, Region, SurfaceId};
use crate::geometry::Rect;
use crate::sink::FrameSink;
use crate::{CaptureError, CaptureResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// An asynchronous stream fault, tagged with the generation of the stream
/// that raised it so completions of superseded streams can be discarded.
#[derive(Debug, Clone)]
pub struct StreamFault {
    pub generation: u64,
    pub reason: String,
}

/// Handed to a stream at open time; the producer context raises faults
/// through it without blocking.
#[derive(Clone)]
pub struct FaultSender {
    generation: u64,
    tx: Sender<StreamFault>,
}

impl FaultSender {
    pub fn raise(&self, reason: impl Into<String>) {
        let fault = StreamFault { generation: self.generation, reason: reason.into() };
        warn!(generation = fault.generation, reason = %fault.reason, "capture stream fault");
        let _ = self.tx.send(fault);
    }
}

struct ActiveStream {
    region_rect: Rect,
    display: Display,
    fps: u32,
    excluded: Vec<SurfaceId>,
}

/// The capture session. Its stream handle exists only while a stream is
/// running and is the sole source of truth for "is capture running".
pub struct CaptureSession<B: CaptureBackend> {
    backend: B,
    sink: FrameSink,
    state: SessionState,
    stream: Option<Box<dyn CaptureStream>>,
    active: Option<ActiveStream>,
    generation: u64,
    fault_tx: Sender<StreamFault>,
    fault_rx: Receiver<StreamFault>,
}

impl<B: CaptureBackend> CaptureSession<B> {
    pub fn new(backend: B, sink: FrameSink) -> Self {
        let (fault_tx, fault_rx) = unbounded();
        Self {
            backend,
            sink,
            state: SessionState::Idle,
            stream: None,
            active: None,
            generation: 0,
            fault_tx,
            fault_rx,
        }
    }

    /// Fault events raised by the running stream. The orchestrator drains
    /// this receiver in its event loop and feeds each fault back into
    /// [`acknowledge_fault`](Self::acknowledge_fault).
    pub fn faults(&self) -> Receiver<StreamFault> {
        self.fault_rx.clone()
    }

    /// Fresh display enumeration, for choosing a selection target.
    pub fn displays(&self) -> Vec<Display> {
        self.backend.displays()
    }

    /// Starts capturing `rect` (display-relative UI space) off the display
    /// identified by `display_id`. Valid only from `Idle`; partial failures
    /// unwind fully back to `Idle` before returning.
    pub fn start(
        &mut self,
        rect: Rect,
        display_id: DisplayId,
        fps: u32,
        excluded: &[SurfaceId],
    ) -> CaptureResult<()> {
        if self.state != SessionState::Idle {
            return Err(CaptureError::AlreadyRunning);
        }
        debug_assert!(rect.width > 0.0 && rect.height > 0.0);
        self.state = SessionState::Starting;

        // Resolve the requested display against a fresh enumeration; a stale
        // identifier (display unplugged) must not open anything.
        let display = match self.backend.displays().into_iter().find(|d| d.id == display_id) {
            Some(display) => display,
            None => {
                self.state = SessionState::Idle;
                return Err(CaptureError::DisplayNotFound);
            }
        };

        if !self.backend.has_permission() && !self.backend.request_permission() {
            self.state = SessionState::Idle;
            return Err(CaptureError::PermissionDenied);
        }

        let config = CaptureConfig::build(rect, &display, fps, excluded);
        self.generation += 1;
        let faults = FaultSender { generation: self.generation, tx: self.fault_tx.clone() };

        match self.backend.open_stream(&display, &config, self.sink.clone(), faults) {
            Ok(stream) => {
                info!(
                    generation = self.generation,
                    width = config.width,
                    height = config.height,
                    fps,
                    "capture started"
                );
                self.stream = Some(stream);
                self.active = Some(ActiveStream {
                    region_rect: rect,
                    display,
                    fps,
                    excluded: excluded.to_vec(),
                });
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Rebuilds the full configuration for a new region and/or frame rate
    /// and submits it atomically. Valid only from `Running`. The excluded
    /// surface set is fixed at start and carried unchanged.
    pub fn reconfigure(&mut self, rect: Option<Rect>, fps: Option<u32>) -> CaptureResult<()> {
        if self.state != SessionState::Running {
            return Err(CaptureError::NotRunning);
        }
        let active = self.active.as_mut().expect("running session has an active stream");

        // Re-resolve for a current scale factor. If the display vanished the
        // old stream keeps running on its last geometry; the caller decides
        // whether to stop.
        let display = self
            .backend
            .displays()
            .into_iter()
            .find(|d| d.id == active.display.id)
            .ok_or(CaptureError::DisplayNotFound)?;

        let rect = rect.unwrap_or(active.region_rect);
        let fps = fps.unwrap_or(active.fps);
        let config = CaptureConfig::build(rect, &display, fps, &active.excluded);

        let stream = self.stream.as_mut().expect("running session has a stream");
        stream.update(&config)?;

        debug!(width = config.width, height = config.height, fps, "capture reconfigured");
        active.region_rect = rect;
        active.display = display;
        active.fps = fps;
        Ok(())
    }

    /// Tears down the stream. A no-op when already `Idle`.
    pub fn stop(&mut self) -> CaptureResult<()> {
        if self.state != SessionState::Running {
            return Ok(());
        }
        self.state = SessionState::Stopping;
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.active = None;
        self.state = SessionState::Idle;
        info!("capture stopped");
        Ok(())
    }

    /// Applies an asynchronous fault. Returns the error to surface exactly
    /// once, when the fault belongs to the live stream, and transitions
    /// involuntarily to `Idle`. Stale and duplicate faults return `None`.
    /// No automatic retry; retry is a user-initiated `start`.
    pub fn acknowledge_fault(&mut self, fault: &StreamFault) -> Option<CaptureError> {
        if fault.generation != self.generation || self.state != SessionState::Running {
            debug!(
                generation = fault.generation,
                current = self.generation,
                "ignoring fault from superseded stream"
            );
            return None;
        }
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.active = None;
        self.state = SessionState::Idle;
        Some(CaptureError::Stream(fault.reason.clone()))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// The region bound to the running stream, if any.
    pub fn current_region(&self) -> Option<Region> {
        self.active
            .as_ref()
            .map(|a| Region::new(a.region_rect, a.display.clone()))
    }

    pub fn current_fps(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.fps)
    }
}
