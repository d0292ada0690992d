//! Output window: the display surface. Paints the latest captured frame
//! scaled to fit its client area; excluded from capture so the mirror never
//! records itself.

use std::cell::RefCell;
use std::sync::Once;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateSolidBrush, DeleteObject, EndPaint, FillRect, InvalidateRect,
    SetStretchBltMode, StretchDIBits, UpdateWindow, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, HALFTONE, PAINTSTRUCT, SRCCOPY,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, GetClientRect, LoadCursorW, PostQuitMessage,
    RegisterClassExW, SetWindowDisplayAffinity, SetWindowTextW, ShowWindow, CS_HREDRAW,
    CS_VREDRAW, CW_USEDEFAULT, IDC_ARROW, SW_SHOW, WDA_EXCLUDEFROMCAPTURE, WINDOW_EX_STYLE,
    WM_APP, WM_DESTROY, WM_KEYDOWN, WM_PAINT, WM_SIZE, WNDCLASSEXW, WS_OVERLAPPEDWINDOW,
};

use capture::{Frame, SurfaceId};

/// Posted by the notifier thread when the frame sink has a new frame.
pub const WM_APP_FRAME: u32 = WM_APP + 1;
/// Posted by the notifier thread when the running stream raised a fault.
pub const WM_APP_FAULT: u32 = WM_APP + 2;

const OUTPUT_CLASS: PCWSTR = w!("MirrorPaneOutput");

thread_local! {
    static FRAME: RefCell<Option<Frame>> = RefCell::new(None);
}

static REGISTER: Once = Once::new();

pub struct OutputWindow {
    hwnd: isize,
}

impl OutputWindow {
    pub fn create() -> anyhow::Result<Self> {
        let hmodule = unsafe { GetModuleHandleW(None)? };
        let hinstance = HINSTANCE(hmodule.0);

        REGISTER.call_once(|| unsafe {
            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(output_wnd_proc),
                hInstance: hinstance,
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                lpszClassName: OUTPUT_CLASS,
                ..Default::default()
            };
            RegisterClassExW(&wc);
        });

        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(0),
                OUTPUT_CLASS,
                w!("MirrorPane"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                960,
                600,
                None,
                None,
                hinstance,
                None,
            )?
        };

        unsafe {
            let _ = SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE);
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = UpdateWindow(hwnd);
        }

        Ok(Self { hwnd: hwnd.0 as isize })
    }

    pub fn hwnd(&self) -> isize {
        self.hwnd
    }

    pub fn surface_id(&self) -> SurfaceId {
        SurfaceId::from_raw(self.hwnd)
    }

    pub fn set_title(&self, title: &str) {
        unsafe {
            let _ = SetWindowTextW(hwnd_from_raw(self.hwnd), &windows::core::HSTRING::from(title));
        }
    }

    /// Adopts a frame for the next paint and schedules a repaint. The
    /// previous pending frame, if any, is simply replaced.
    pub fn present(&self, frame: Frame) {
        FRAME.with(|f| {
            *f.borrow_mut() = Some(frame);
        });
        unsafe {
            let _ = InvalidateRect(hwnd_from_raw(self.hwnd), None, false);
        }
    }
}

fn hwnd_from_raw(raw: isize) -> HWND {
    HWND(raw as *mut std::ffi::c_void)
}

unsafe extern "system" fn output_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => {
            paint(hwnd);
            LRESULT(0)
        }

        WM_KEYDOWN => {
            crate::app::on_key(wparam.0);
            LRESULT(0)
        }

        WM_APP_FRAME => {
            crate::app::on_frame_signal();
            LRESULT(0)
        }

        WM_APP_FAULT => {
            crate::app::on_fault_signal();
            LRESULT(0)
        }

        WM_SIZE => {
            let _ = InvalidateRect(hwnd, None, true);
            LRESULT(0)
        }

        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe fn paint(hwnd: HWND) {
    let mut ps = PAINTSTRUCT::default();
    let hdc = BeginPaint(hwnd, &mut ps);

    let mut client = RECT::default();
    let _ = GetClientRect(hwnd, &mut client);

    let background = CreateSolidBrush(COLORREF(0x00000000));
    FillRect(hdc, &client, background);
    let _ = DeleteObject(background);

    FRAME.with(|f| {
        let borrowed = f.borrow();
        let Some(frame) = borrowed.as_ref() else { return };

        let (dst_x, dst_y, dst_w, dst_h) = fit_rect(&client, frame.width, frame.height);

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: frame.width as i32,
                biHeight: -(frame.height as i32), // Top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            },
            bmiColors: [Default::default()],
        };

        SetStretchBltMode(hdc, HALFTONE);
        StretchDIBits(
            hdc,
            dst_x,
            dst_y,
            dst_w,
            dst_h,
            0,
            0,
            frame.width as i32,
            frame.height as i32,
            Some(frame.data.as_ptr() as *const _),
            &bmi,
            DIB_RGB_COLORS,
            SRCCOPY,
        );
    });

    let _ = EndPaint(hwnd, &ps);
}

/// Aspect-preserving destination rectangle, centered in the client area.
fn fit_rect(client: &RECT, width: u32, height: u32) -> (i32, i32, i32, i32) {
    let cw = (client.right - client.left).max(1);
    let ch = (client.bottom - client.top).max(1);
    if width == 0 || height == 0 {
        return (0, 0, cw, ch);
    }

    let scale = (f64::from(cw) / f64::from(width)).min(f64::from(ch) / f64::from(height));
    let dw = ((f64::from(width) * scale) as i32).max(1);
    let dh = ((f64::from(height) * scale) as i32).max(1);
    ((cw - dw) / 2, (ch - dh) / 2, dw, dh)
}
