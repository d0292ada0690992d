//! Orchestrator: owns all component state on the UI thread and wires the
//! selector, tracker, and capture session together over channels.
//!
//! Producer-context events (frames, stream faults) are forwarded to the UI
//! thread as window messages by a notifier thread; everything else happens
//! on the UI thread. Commands from the window procedure are queued and
//! executed between messages, so a modal selection loop never re-enters
//! component state.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{error, info, warn};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PostMessageW, PostQuitMessage, TranslateMessage, MSG,
};

use capture::{frame_channel, CaptureSession, FrameOutput, PlatformBackend, Region, StreamFault};
use overlay::{select_region, SelectionEvent, TrackerEvent, TrackerSurface};

use crate::output::{OutputWindow, WM_APP_FAULT, WM_APP_FRAME};
use crate::settings::Settings;

const VK_ESCAPE: usize = 0x1B;
const VK_SPACE: usize = 0x20;
const VK_1: usize = 0x31;
const VK_2: usize = 0x32;
const VK_3: usize = 0x33;
const VK_S: usize = 0x53;

enum Command {
    SelectRegion,
    ToggleCapture,
    SetFps(u32),
    Quit,
}

struct App {
    session: CaptureSession<PlatformBackend>,
    output: FrameOutput,
    window: OutputWindow,
    settings: Settings,
    selection_tx: Sender<SelectionEvent>,
    selection_rx: Receiver<SelectionEvent>,
    tracker_tx: Sender<TrackerEvent>,
    tracker_rx: Receiver<TrackerEvent>,
    fault_rx: Receiver<StreamFault>,
    tracker_surface: Option<TrackerSurface>,
    region: Option<Region>,
}

thread_local! {
    static APP: RefCell<Option<App>> = RefCell::new(None);
    static COMMANDS: RefCell<VecDeque<Command>> = RefCell::new(VecDeque::new());
}

pub fn run(settings: Settings) -> Result<()> {
    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }

    let (sink, output) = frame_channel();
    let session = CaptureSession::new(PlatformBackend::new(), sink);
    let session_faults = session.faults();

    let window = OutputWindow::create()?;
    let hwnd_raw = window.hwnd();

    let (selection_tx, selection_rx) = unbounded();
    let (tracker_tx, tracker_rx) = unbounded();
    let (fault_tx, fault_rx) = unbounded();

    // Producer-context events reach the UI thread as posted messages.
    {
        let ready = output.ready().clone();
        thread::spawn(move || loop {
            crossbeam_channel::select! {
                recv(ready) -> signal => {
                    if signal.is_err() {
                        break;
                    }
                    post(hwnd_raw, WM_APP_FRAME);
                }
                recv(session_faults) -> fault => {
                    let Ok(fault) = fault else { break };
                    let _ = fault_tx.send(fault);
                    post(hwnd_raw, WM_APP_FAULT);
                }
            }
        });
    }

    APP.with(|a| {
        *a.borrow_mut() = Some(App {
            session,
            output,
            window,
            settings,
            selection_tx,
            selection_rx,
            tracker_tx,
            tracker_rx,
            fault_rx,
            tracker_surface: None,
            region: None,
        });
    });

    info!("S: select region | Space: start/stop | 1/2/3: 15/30/60 fps | Esc: quit");

    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
            process_pending();
        }
    }

    if let Some(mut app) = APP.with(|a| a.borrow_mut().take()) {
        let _ = app.session.stop();
        if let Some(tracker) = app.tracker_surface.take() {
            tracker.close();
        }
    }
    Ok(())
}

fn post(hwnd_raw: isize, msg: u32) {
    unsafe {
        let _ = PostMessageW(
            HWND(hwnd_raw as *mut std::ffi::c_void),
            msg,
            WPARAM(0),
            LPARAM(0),
        );
    }
}

/// Key handler, called from the window procedure. Commands are queued
/// rather than executed so the procedure returns immediately.
pub(crate) fn on_key(vk: usize) {
    let command = match vk {
        VK_S => Command::SelectRegion,
        VK_SPACE => Command::ToggleCapture,
        VK_1 => Command::SetFps(15),
        VK_2 => Command::SetFps(30),
        VK_3 => Command::SetFps(60),
        VK_ESCAPE => Command::Quit,
        _ => return,
    };
    COMMANDS.with(|c| c.borrow_mut().push_back(command));
}

/// A new frame is waiting in the sink; adopt it for the next paint.
pub(crate) fn on_frame_signal() {
    APP.with(|a| {
        let Ok(mut borrowed) = a.try_borrow_mut() else { return };
        let Some(app) = borrowed.as_mut() else { return };
        if let Some(frame) = app.output.try_latest() {
            app.window.present(frame);
        }
    });
}

/// The running stream raised a fault; surface it exactly once.
pub(crate) fn on_fault_signal() {
    APP.with(|a| {
        let Ok(mut borrowed) = a.try_borrow_mut() else { return };
        let Some(app) = borrowed.as_mut() else { return };
        while let Ok(fault) = app.fault_rx.try_recv() {
            if let Some(err) = app.session.acknowledge_fault(&fault) {
                error!(error = %err, "capture stream failed");
                if let Some(tracker) = app.tracker_surface.take() {
                    tracker.close();
                }
                app.window.set_title(&format!("MirrorPane - {err}"));
            }
        }
    });
}

fn process_pending() {
    while let Some(command) = COMMANDS.with(|c| c.borrow_mut().pop_front()) {
        match command {
            Command::SelectRegion => select_region_command(),
            Command::ToggleCapture => toggle_capture(),
            Command::SetFps(fps) => set_fps(fps),
            Command::Quit => unsafe { PostQuitMessage(0) },
        }
    }
    drain_tracker_events();
}

fn select_region_command() {
    // Pull what the modal overlay needs without holding the app borrow
    // across its nested message loop.
    let target = APP.with(|a| {
        let borrowed = a.borrow();
        let app = borrowed.as_ref()?;
        if app.session.is_running() {
            info!("stop capture before selecting a new region");
            return None;
        }
        let display = app.session.displays().into_iter().next();
        if display.is_none() {
            warn!("no display available for selection");
        }
        Some((display?, app.selection_tx.clone()))
    });
    let Some((display, selection_tx)) = target else { return };

    if let Err(e) = select_region(&display, &selection_tx) {
        error!(error = %e, "selection overlay failed");
        return;
    }

    // The gesture is over; exactly one terminal event is pending.
    APP.with(|a| {
        let mut borrowed = a.borrow_mut();
        let Some(app) = borrowed.as_mut() else { return };
        match app.selection_rx.try_recv() {
            Ok(SelectionEvent::Committed(region)) => {
                info!(
                    width = region.rect.width,
                    height = region.rect.height,
                    "region selected"
                );
                app.region = Some(region);
                app.window.set_title("MirrorPane - region selected, Space to start");
            }
            Ok(SelectionEvent::Cancelled) => info!("selection cancelled"),
            Err(_) => {}
        }
    });
}

fn toggle_capture() {
    APP.with(|a| {
        let mut borrowed = a.borrow_mut();
        let Some(app) = borrowed.as_mut() else { return };
        if app.session.is_running() {
            stop_capture(app);
        } else {
            start_capture(app);
        }
    });
}

fn start_capture(app: &mut App) {
    let Some(region) = app.region.clone() else {
        warn!("no region selected yet");
        return;
    };

    // Fresh surfaces, fresh excluded set: whatever exists right now.
    let tracker = match TrackerSurface::present(region.clone(), app.tracker_tx.clone()) {
        Ok(tracker) => tracker,
        Err(e) => {
            error!(error = %e, "could not present the region outline");
            return;
        }
    };
    let mut excluded = tracker.surface_ids();
    excluded.push(app.window.surface_id());

    match app.session.start(region.rect, region.display.id, app.settings.fps, &excluded) {
        Ok(()) => {
            app.tracker_surface = Some(tracker);
            app.window
                .set_title(&format!("MirrorPane - mirroring at {} fps", app.settings.fps));
        }
        Err(e) => {
            tracker.close();
            error!(error = %e, "could not start capture");
            app.window.set_title(&format!("MirrorPane - {e}"));
        }
    }
}

fn stop_capture(app: &mut App) {
    let _ = app.session.stop();
    if let Some(tracker) = app.tracker_surface.take() {
        tracker.close();
    }
    app.window.set_title("MirrorPane");
}

fn set_fps(fps: u32) {
    APP.with(|a| {
        let mut borrowed = a.borrow_mut();
        let Some(app) = borrowed.as_mut() else { return };

        app.settings.fps = fps;
        if let Err(e) = app.settings.save() {
            warn!(error = %e, "could not persist settings");
        }

        if app.session.is_running() {
            match app.session.reconfigure(None, Some(fps)) {
                Ok(()) => {
                    app.window.set_title(&format!("MirrorPane - mirroring at {fps} fps"));
                }
                Err(e) => error!(error = %e, "could not change frame rate"),
            }
        }
    });
}

fn drain_tracker_events() {
    APP.with(|a| {
        let mut borrowed = a.borrow_mut();
        let Some(app) = borrowed.as_mut() else { return };
        while let Ok(TrackerEvent::Moved(region)) = app.tracker_rx.try_recv() {
            app.region = Some(region.clone());
            if app.session.is_running() {
                if let Err(e) = app.session.reconfigure(Some(region.rect), None) {
                    // The outline stays where the drag left it; the failure
                    // is surfaced, not silently reverted.
                    error!(error = %e, "could not move the captured region");
                    app.window.set_title(&format!("MirrorPane - {e}"));
                }
            }
        }
    });
}
