//! Capture-session state machine tests against a scripted backend.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use capture::backend::{CaptureBackend, CaptureStream};
use capture::session::FaultSender;
use capture::{
    frame_channel, CaptureConfig, CaptureError, CaptureSession, Display, DisplayId, Rect,
    SessionState, SurfaceId,
};

#[derive(Default)]
struct MockState {
    opened: Vec<CaptureConfig>,
    updates: Vec<CaptureConfig>,
    closed: usize,
    fault_handles: Vec<FaultSender>,
}

struct MockBackend {
    displays: Arc<Mutex<Vec<Display>>>,
    has_permission: bool,
    grant_on_request: bool,
    fail_open: bool,
    state: Arc<Mutex<MockState>>,
}

struct MockStream {
    state: Arc<Mutex<MockState>>,
    fail_update: bool,
}

impl CaptureBackend for MockBackend {
    fn displays(&self) -> Vec<Display> {
        self.displays.lock().clone()
    }

    fn has_permission(&self) -> bool {
        self.has_permission
    }

    fn request_permission(&self) -> bool {
        self.grant_on_request
    }

    fn open_stream(
        &mut self,
        _display: &Display,
        config: &CaptureConfig,
        _sink: capture::FrameSink,
        faults: FaultSender,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if self.fail_open {
            return Err(CaptureError::Stream("scripted open failure".into()));
        }
        let mut state = self.state.lock();
        state.opened.push(config.clone());
        state.fault_handles.push(faults);
        Ok(Box::new(MockStream { state: Arc::clone(&self.state), fail_update: false }))
    }
}

impl CaptureStream for MockStream {
    fn update(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        if self.fail_update {
            return Err(CaptureError::Stream("scripted update failure".into()));
        }
        self.state.lock().updates.push(config.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().closed += 1;
    }
}

struct Fixture {
    session: CaptureSession<MockBackend>,
    displays: Arc<Mutex<Vec<Display>>>,
    state: Arc<Mutex<MockState>>,
}

fn display() -> Display {
    Display {
        id: DisplayId::from_raw(1),
        frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
        scale_factor: 2.0,
    }
}

fn fixture() -> Fixture {
    let displays = Arc::new(Mutex::new(vec![display()]));
    let state = Arc::new(Mutex::new(MockState::default()));
    let backend = MockBackend {
        displays: Arc::clone(&displays),
        has_permission: true,
        grant_on_request: true,
        fail_open: false,
        state: Arc::clone(&state),
    };
    let (sink, _output) = frame_channel();
    Fixture { session: CaptureSession::new(backend, sink), displays, state }
}

fn region() -> Rect {
    Rect::new(0.0, 0.0, 640.0, 480.0)
}

#[test]
fn start_opens_a_stream_with_the_built_configuration() {
    let mut fx = fixture();

    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();

    assert_eq!(fx.session.state(), SessionState::Running);
    assert!(fx.session.is_running());
    let state = fx.state.lock();
    assert_eq!(state.opened.len(), 1);
    let config = &state.opened[0];
    // 480-point-tall region at the bottom of a 1080-point display.
    assert_eq!(config.source_rect, Rect::new(0.0, 600.0, 640.0, 480.0));
    assert_eq!((config.width, config.height), (1280, 960));
    assert_eq!(config.frame_interval, Duration::from_secs_f64(1.0 / 30.0));
}

#[test]
fn start_with_a_stale_display_fails_and_stays_idle() {
    let mut fx = fixture();

    let err = fx.session.start(region(), DisplayId::from_raw(42), 30, &[]).unwrap_err();

    assert!(matches!(err, CaptureError::DisplayNotFound));
    assert_eq!(fx.session.state(), SessionState::Idle);
    assert!(fx.state.lock().opened.is_empty());
}

#[test]
fn permission_denied_unwinds_fully_to_idle() {
    let mut fx = fixture();
    fx.session = {
        let backend = MockBackend {
            displays: Arc::clone(&fx.displays),
            has_permission: false,
            grant_on_request: false,
            fail_open: false,
            state: Arc::clone(&fx.state),
        };
        let (sink, _output) = frame_channel();
        CaptureSession::new(backend, sink)
    };

    let err = fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap_err();

    assert!(matches!(err, CaptureError::PermissionDenied));
    assert_eq!(fx.session.state(), SessionState::Idle);
    assert!(fx.state.lock().opened.is_empty());
    assert!(fx.session.current_region().is_none());
}

#[test]
fn permission_request_grant_is_accepted() {
    let mut fx = fixture();
    fx.session = {
        let backend = MockBackend {
            displays: Arc::clone(&fx.displays),
            has_permission: false,
            grant_on_request: true,
            fail_open: false,
            state: Arc::clone(&fx.state),
        };
        let (sink, _output) = frame_channel();
        CaptureSession::new(backend, sink)
    };

    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();
    assert!(fx.session.is_running());
}

#[test]
fn failed_open_leaves_no_dangling_stream() {
    let mut fx = fixture();
    fx.session = {
        let backend = MockBackend {
            displays: Arc::clone(&fx.displays),
            has_permission: true,
            grant_on_request: true,
            fail_open: true,
            state: Arc::clone(&fx.state),
        };
        let (sink, _output) = frame_channel();
        CaptureSession::new(backend, sink)
    };

    let err = fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap_err();

    assert!(matches!(err, CaptureError::Stream(_)));
    assert_eq!(fx.session.state(), SessionState::Idle);
    // A retry from Idle works.
    fx.session = {
        let backend = MockBackend {
            displays: Arc::clone(&fx.displays),
            has_permission: true,
            grant_on_request: true,
            fail_open: false,
            state: Arc::clone(&fx.state),
        };
        let (sink, _output) = frame_channel();
        CaptureSession::new(backend, sink)
    };
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();
}

#[test]
fn second_start_is_rejected_without_side_effects() {
    let mut fx = fixture();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();
    let opened_before = fx.state.lock().opened.clone();

    let err = fx
        .session
        .start(Rect::new(5.0, 5.0, 100.0, 100.0), DisplayId::from_raw(1), 60, &[])
        .unwrap_err();

    assert!(matches!(err, CaptureError::AlreadyRunning));
    assert_eq!(fx.session.state(), SessionState::Running);
    let state = fx.state.lock();
    assert_eq!(state.opened, opened_before);
    assert!(state.updates.is_empty());
}

#[test]
fn stop_twice_is_a_noop_the_second_time() {
    let mut fx = fixture();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();

    fx.session.stop().unwrap();
    assert_eq!(fx.session.state(), SessionState::Idle);

    fx.session.stop().unwrap();
    assert_eq!(fx.session.state(), SessionState::Idle);
    assert_eq!(fx.state.lock().closed, 1);
}

#[test]
fn reconfigure_then_stop_then_reconfigure_fails() {
    let mut fx = fixture();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();

    // FPS-only change keeps the region.
    fx.session.reconfigure(None, Some(60)).unwrap();
    assert_eq!(fx.session.state(), SessionState::Running);
    assert_eq!(fx.session.current_region().unwrap().rect, region());
    assert_eq!(fx.session.current_fps(), Some(60));
    {
        let state = fx.state.lock();
        assert_eq!(state.updates.len(), 1);
        let update = &state.updates[0];
        assert_eq!(update.frame_interval, Duration::from_secs_f64(1.0 / 60.0));
        assert_eq!(update.source_rect, state.opened[0].source_rect);
    }

    fx.session.stop().unwrap();
    assert_eq!(fx.session.state(), SessionState::Idle);

    let err = fx.session.reconfigure(None, Some(30)).unwrap_err();
    assert!(matches!(err, CaptureError::NotRunning));
}

#[test]
fn reconfigure_carries_the_excluded_surfaces_from_start() {
    let mut fx = fixture();
    let excluded = [SurfaceId::from_raw(11), SurfaceId::from_raw(12)];
    fx.session.start(region(), DisplayId::from_raw(1), 30, &excluded).unwrap();

    fx.session
        .reconfigure(Some(Rect::new(10.0, 20.0, 320.0, 240.0)), None)
        .unwrap();

    let state = fx.state.lock();
    assert_eq!(state.updates[0].excluded_surfaces, excluded.to_vec());
}

#[test]
fn reconfigure_on_an_unplugged_display_keeps_the_stream_running() {
    let mut fx = fixture();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();

    fx.displays.lock().clear();
    let err = fx.session.reconfigure(None, Some(60)).unwrap_err();

    assert!(matches!(err, CaptureError::DisplayNotFound));
    assert_eq!(fx.session.state(), SessionState::Running);
    assert_eq!(fx.session.current_fps(), Some(30));
    assert!(fx.state.lock().updates.is_empty());
}

#[test]
fn fault_surfaces_exactly_once() {
    let mut fx = fixture();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();
    let faults = fx.session.faults();

    fx.state.lock().fault_handles[0].raise("device lost");
    let fault = faults.recv_timeout(Duration::from_secs(1)).unwrap();

    let surfaced = fx.session.acknowledge_fault(&fault);
    assert!(matches!(surfaced, Some(CaptureError::Stream(_))));
    assert_eq!(fx.session.state(), SessionState::Idle);
    assert!(fx.session.current_region().is_none());

    // The same fault delivered again is a duplicate: silently dropped.
    assert!(fx.session.acknowledge_fault(&fault).is_none());
    assert_eq!(fx.session.state(), SessionState::Idle);
}

#[test]
fn stale_generation_fault_cannot_knock_over_a_newer_stream() {
    let mut fx = fixture();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();
    let faults = fx.session.faults();
    let first_handle = fx.state.lock().fault_handles[0].clone();

    fx.session.stop().unwrap();
    fx.session.start(region(), DisplayId::from_raw(1), 30, &[]).unwrap();

    // Fault from the superseded stream arrives late.
    first_handle.raise("late completion");
    let fault = faults.recv_timeout(Duration::from_secs(1)).unwrap();

    assert!(fx.session.acknowledge_fault(&fault).is_none());
    assert_eq!(fx.session.state(), SessionState::Running);
}
