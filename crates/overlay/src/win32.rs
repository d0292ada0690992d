//! Win32 overlay surfaces: the full-screen selection overlay, the
//! click-through region outline, and the drag handle.
//!
//! The surfaces own window plumbing only; all gesture logic lives in the
//! pure [`RegionSelector`] and [`RegionTracker`] state machines, which the
//! window procedures feed with UI-space input.

use std::cell::RefCell;
use std::sync::Once;

use crossbeam_channel::Sender;
use tracing::debug;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreatePen, CreateSolidBrush, DeleteObject, EndPaint, FillRect, GetStockObject,
    InvalidateRect, Rectangle, SelectObject, SetBkMode, SetTextColor, TextOutW, UpdateWindow,
    HOLLOW_BRUSH, PAINTSTRUCT, PS_SOLID, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect, GetCursorPos,
    GetMessageW, LoadCursorW, RegisterClassExW, SetLayeredWindowAttributes,
    SetWindowDisplayAffinity, SetWindowPos, ShowWindow, TranslateMessage, CS_HREDRAW, CS_VREDRAW,
    HTTRANSPARENT, IDC_CROSS, IDC_SIZEALL, LWA_ALPHA, MSG, SWP_NOACTIVATE, SWP_NOZORDER,
    SWP_SHOWWINDOW, SW_SHOW, SW_SHOWNOACTIVATE, WDA_EXCLUDEFROMCAPTURE, WM_CLOSE, WM_KEYDOWN,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_NCHITTEST, WM_PAINT, WNDCLASSEXW,
    WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

use capture::{Display, Region, SurfaceId};

use crate::mapping::{self, PxRect};
use crate::selection::{RegionSelector, SelectionEvent};
use crate::tracker::{RegionTracker, TrackerEvent};
use crate::{OverlayError, OverlayResult};

impl From<windows::core::Error> for OverlayError {
    fn from(e: windows::core::Error) -> Self {
        Self::Surface(e.to_string())
    }
}

const SELECTION_CLASS: PCWSTR = w!("MirrorPaneSelection");
const OUTLINE_CLASS: PCWSTR = w!("MirrorPaneOutline");
const HANDLE_CLASS: PCWSTR = w!("MirrorPaneHandle");

const VK_ESCAPE: usize = 0x1B;

/// Whole-window alpha for the selection overlay (~30% black dim).
const SELECTION_ALPHA: u8 = 77;
const OUTLINE_THICKNESS: i32 = 3;

fn hwnd_from_raw(raw: isize) -> HWND {
    HWND(raw as *mut std::ffi::c_void)
}

fn instance() -> OverlayResult<HINSTANCE> {
    let hmodule = unsafe { GetModuleHandleW(None)? };
    Ok(HINSTANCE(hmodule.0))
}

fn set_window_px(hwnd_raw: isize, px: PxRect) {
    unsafe {
        let _ = SetWindowPos(
            hwnd_from_raw(hwnd_raw),
            None,
            px.x,
            px.y,
            px.width,
            px.height,
            SWP_NOZORDER | SWP_NOACTIVATE | SWP_SHOWWINDOW,
        );
    }
}

// ── Selection overlay ─────────────────────────────────────────────────────────

struct SelectionState {
    selector: RegionSelector,
    display: Display,
    event: Option<SelectionEvent>,
}

thread_local! {
    static SELECTION: RefCell<Option<SelectionState>> = RefCell::new(None);
}

static REGISTER_SELECTION: Once = Once::new();

/// Presents the full-screen selection overlay over `display` and blocks for
/// the duration of the gesture. The terminal event (committed or cancelled)
/// is sent into `events`; the surface never outlives the gesture.
pub fn select_region(display: &Display, events: &Sender<SelectionEvent>) -> OverlayResult<()> {
    let hinstance = instance()?;

    REGISTER_SELECTION.call_once(|| unsafe {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(selection_wnd_proc),
            hInstance: hinstance,
            hCursor: LoadCursorW(None, IDC_CROSS).unwrap_or_default(),
            lpszClassName: SELECTION_CLASS,
            ..Default::default()
        };
        RegisterClassExW(&wc);
    });

    SELECTION.with(|s| {
        *s.borrow_mut() = Some(SelectionState {
            selector: RegionSelector::new(display.clone()),
            display: display.clone(),
            event: None,
        });
    });

    let px = mapping::rect_to_screen_px(
        display,
        capture::Rect::new(0.0, 0.0, display.frame.width, display.frame.height),
    );

    let created = unsafe {
        CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_LAYERED | WS_EX_TOOLWINDOW,
            SELECTION_CLASS,
            w!("MirrorPane Selection"),
            WS_POPUP,
            px.x,
            px.y,
            px.width,
            px.height,
            None,
            None,
            hinstance,
            None,
        )
        .and_then(|hwnd| {
            SetLayeredWindowAttributes(hwnd, COLORREF(0), SELECTION_ALPHA, LWA_ALPHA)?;
            Ok(hwnd)
        })
    };
    let hwnd = match created {
        Ok(hwnd) => hwnd,
        Err(e) => {
            SELECTION.with(|s| s.borrow_mut().take());
            return Err(e.into());
        }
    };

    let event = unsafe {
        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = UpdateWindow(hwnd);

        let mut msg = MSG::default();
        loop {
            if !GetMessageW(&mut msg, None, 0, 0).as_bool() {
                break;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);

            let done = SELECTION.with(|s| {
                s.borrow().as_ref().map(|state| state.event.is_some()).unwrap_or(true)
            });
            if done {
                break;
            }
        }

        let _ = DestroyWindow(hwnd);
        SELECTION.with(|s| s.borrow_mut().take()).and_then(|state| state.event)
    };

    debug!(committed = matches!(event, Some(SelectionEvent::Committed(_))), "selection ended");
    let _ = events.send(event.unwrap_or(SelectionEvent::Cancelled));
    Ok(())
}

unsafe extern "system" fn selection_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => {
            paint_selection(hwnd);
            LRESULT(0)
        }

        WM_LBUTTONDOWN => {
            let (x, y) = pointer_from_lparam(lparam);
            SetCapture(hwnd);
            SELECTION.with(|s| {
                if let Some(state) = s.borrow_mut().as_mut() {
                    let (ux, uy) = mapping::px_to_display_point(&state.display, x, y);
                    state.selector.pointer_down(ux, uy);
                }
            });
            LRESULT(0)
        }

        WM_MOUSEMOVE => {
            let (x, y) = pointer_from_lparam(lparam);
            let moved = SELECTION.with(|s| {
                s.borrow_mut().as_mut().and_then(|state| {
                    let (ux, uy) = mapping::px_to_display_point(&state.display, x, y);
                    state.selector.pointer_move(ux, uy)
                })
            });
            if moved.is_some() {
                let _ = InvalidateRect(hwnd, None, true);
            }
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            let (x, y) = pointer_from_lparam(lparam);
            let _ = ReleaseCapture();
            SELECTION.with(|s| {
                if let Some(state) = s.borrow_mut().as_mut() {
                    let (ux, uy) = mapping::px_to_display_point(&state.display, x, y);
                    state.event = Some(state.selector.pointer_up(ux, uy));
                }
            });
            LRESULT(0)
        }

        WM_KEYDOWN => {
            if wparam.0 == VK_ESCAPE {
                SELECTION.with(|s| {
                    if let Some(state) = s.borrow_mut().as_mut() {
                        state.event = Some(state.selector.cancel());
                    }
                });
            }
            LRESULT(0)
        }

        WM_CLOSE => {
            SELECTION.with(|s| {
                if let Some(state) = s.borrow_mut().as_mut() {
                    if state.event.is_none() {
                        state.event = Some(SelectionEvent::Cancelled);
                    }
                }
            });
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn pointer_from_lparam(lparam: LPARAM) -> (i32, i32) {
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
    (x, y)
}

unsafe fn paint_selection(hwnd: HWND) {
    let mut ps = PAINTSTRUCT::default();
    let hdc = BeginPaint(hwnd, &mut ps);

    let mut client = RECT::default();
    let _ = GetClientRect(hwnd, &mut client);

    // Dim backdrop; the window's layered alpha makes it translucent.
    let backdrop = CreateSolidBrush(COLORREF(0x00000000));
    FillRect(hdc, &client, backdrop);
    let _ = DeleteObject(backdrop);

    SELECTION.with(|s| {
        let borrowed = s.borrow();
        let Some(state) = borrowed.as_ref() else { return };
        let Some(rect) = state.selector.selection() else { return };

        let px = mapping::rect_to_display_px(&state.display, rect);

        let pen = CreatePen(PS_SOLID, 2, COLORREF(0x00FFFFFF));
        let old_pen = SelectObject(hdc, pen);
        let old_brush = SelectObject(hdc, GetStockObject(HOLLOW_BRUSH));
        let _ = Rectangle(hdc, px.x, px.y, px.x + px.width, px.y + px.height);
        SelectObject(hdc, old_brush);
        SelectObject(hdc, old_pen);
        let _ = DeleteObject(pen);

        if let Some(label) = state.selector.size_label() {
            let text: Vec<u16> = label.encode_utf16().collect();
            SetBkMode(hdc, TRANSPARENT);
            SetTextColor(hdc, COLORREF(0x00FFFFFF));
            let _ = TextOutW(hdc, px.x + px.width / 2 - 28, px.y - 24, &text);
        }
    });

    let _ = EndPaint(hwnd, &ps);
}

// ── Region outline + drag handle ──────────────────────────────────────────────

struct TrackerState {
    tracker: RegionTracker,
    display: Display,
    events: Sender<TrackerEvent>,
    outline: isize,
    handle: isize,
    dragging: bool,
}

thread_local! {
    static TRACKER: RefCell<Option<TrackerState>> = RefCell::new(None);
}

static REGISTER_TRACKER: Once = Once::new();

/// The persistent region outline and its drag handle. Both windows are
/// excluded from capture so the overlay never records itself.
pub struct TrackerSurface {
    outline: isize,
    handle: isize,
}

impl TrackerSurface {
    pub fn present(region: Region, events: Sender<TrackerEvent>) -> OverlayResult<Self> {
        let hinstance = instance()?;

        REGISTER_TRACKER.call_once(|| unsafe {
            let outline_wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(outline_wnd_proc),
                hInstance: hinstance,
                lpszClassName: OUTLINE_CLASS,
                ..Default::default()
            };
            RegisterClassExW(&outline_wc);

            let handle_wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(handle_wnd_proc),
                hInstance: hinstance,
                hCursor: LoadCursorW(None, IDC_SIZEALL).unwrap_or_default(),
                lpszClassName: HANDLE_CLASS,
                ..Default::default()
            };
            RegisterClassExW(&handle_wc);
        });

        let tracker = RegionTracker::present(region);
        let display = tracker.region().display.clone();
        let outline_px = mapping::rect_to_screen_px(&display, tracker.outline_frame());
        let handle_px = mapping::rect_to_screen_px(&display, tracker.handle_frame());

        let (outline, handle) = unsafe {
            let outline = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_TRANSPARENT | WS_EX_NOACTIVATE,
                OUTLINE_CLASS,
                w!("MirrorPane Region"),
                WS_POPUP,
                outline_px.x,
                outline_px.y,
                outline_px.width,
                outline_px.height,
                None,
                None,
                hinstance,
                None,
            )?;

            let handle = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                HANDLE_CLASS,
                w!("MirrorPane Handle"),
                WS_POPUP,
                handle_px.x,
                handle_px.y,
                handle_px.width,
                handle_px.height,
                None,
                None,
                hinstance,
                None,
            )?;

            for hwnd in [outline, handle] {
                let _ = SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE);
                let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
                let _ = UpdateWindow(hwnd);
            }

            (outline.0 as isize, handle.0 as isize)
        };

        TRACKER.with(|s| {
            *s.borrow_mut() = Some(TrackerState {
                tracker,
                display,
                events,
                outline,
                handle,
                dragging: false,
            });
        });

        Ok(Self { outline, handle })
    }

    /// Moves outline and handle to a new region as one unit.
    pub fn update_region(&self, region: Region) {
        TRACKER.with(|s| {
            if let Some(state) = s.borrow_mut().as_mut() {
                state.tracker.update_region(region);
                reposition(state);
            }
        });
    }

    /// The surface identifiers for the excluded-window set.
    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::from_raw(self.outline), SurfaceId::from_raw(self.handle)]
    }

    pub fn close(&self) {
        unsafe {
            let _ = DestroyWindow(hwnd_from_raw(self.handle));
            let _ = DestroyWindow(hwnd_from_raw(self.outline));
        }
        TRACKER.with(|s| {
            *s.borrow_mut() = None;
        });
    }
}

fn reposition(state: &TrackerState) {
    set_window_px(state.outline, mapping::rect_to_screen_px(&state.display, state.tracker.outline_frame()));
    set_window_px(state.handle, mapping::rect_to_screen_px(&state.display, state.tracker.handle_frame()));
}

unsafe extern "system" fn outline_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_NCHITTEST => LRESULT(HTTRANSPARENT as isize),
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);

            let mut rect = RECT::default();
            let _ = GetClientRect(hwnd, &mut rect);

            let pen = CreatePen(PS_SOLID, OUTLINE_THICKNESS, COLORREF(0x0000FF00));
            let old_pen = SelectObject(hdc, pen);
            let old_brush = SelectObject(hdc, GetStockObject(HOLLOW_BRUSH));
            let _ = Rectangle(hdc, rect.left, rect.top, rect.right, rect.bottom);
            SelectObject(hdc, old_brush);
            SelectObject(hdc, old_pen);
            let _ = DeleteObject(pen);

            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe extern "system" fn handle_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);

            let mut rect = RECT::default();
            let _ = GetClientRect(hwnd, &mut rect);

            let fill = CreateSolidBrush(COLORREF(0x0000C000));
            FillRect(hdc, &rect, fill);
            let _ = DeleteObject(fill);

            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }

        WM_LBUTTONDOWN => {
            if let Some((x, y)) = cursor_pos() {
                SetCapture(hwnd);
                TRACKER.with(|s| {
                    if let Some(state) = s.borrow_mut().as_mut() {
                        let (ux, uy) = mapping::screen_px_to_point(&state.display, x, y);
                        state.tracker.drag_start(ux, uy);
                        state.dragging = true;
                    }
                });
            }
            LRESULT(0)
        }

        WM_MOUSEMOVE => {
            if let Some((x, y)) = cursor_pos() {
                TRACKER.with(|s| {
                    if let Some(state) = s.borrow_mut().as_mut() {
                        if state.dragging {
                            let (ux, uy) = mapping::screen_px_to_point(&state.display, x, y);
                            if state.tracker.drag_move(ux, uy).is_some() {
                                reposition(state);
                            }
                        }
                    }
                });
            }
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            let _ = ReleaseCapture();
            TRACKER.with(|s| {
                if let Some(state) = s.borrow_mut().as_mut() {
                    if state.dragging {
                        state.dragging = false;
                        if let Some(event) = state.tracker.drag_end() {
                            let _ = state.events.send(event);
                        }
                    }
                }
            });
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn cursor_pos() -> Option<(i32, i32)> {
    let mut point = POINT::default();
    unsafe { GetCursorPos(&mut point).ok()? };
    Some((point.x, point.y))
}
