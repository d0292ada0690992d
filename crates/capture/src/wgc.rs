//! Windows Graphics Capture backend.
//!
//! The capture worker thread owns every WGC/D3D11 object: it initializes
//! WinRT, opens the frame pool and session, paces frame delivery at the
//! configured interval, crops through a staging texture, and publishes into
//! the frame sink. Live reconfiguration swaps the whole parameter block
//! under one lock, so a frame observes either the old or the new geometry,
//! never a mix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};
use windows::core::Interface;
use windows::Graphics::Capture::{
    Direct3D11CaptureFramePool, GraphicsCaptureItem, GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::{IDirect3DDevice, IDirect3DSurface};
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Graphics::SizeInt32;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Direct3D::{D3D_DRIVER_TYPE_HARDWARE, D3D_FEATURE_LEVEL_11_0};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D, D3D11_BOX,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAPPED_SUBRESOURCE,
    D3D11_MAP_READ, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::Graphics::Gdi::{EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::System::WinRT::{RoInitialize, RoUninitialize, RO_INIT_MULTITHREADED};
use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};
use windows::Win32::UI::WindowsAndMessaging::{SetWindowDisplayAffinity, WDA_EXCLUDEFROMCAPTURE};

use crate::backend::{CaptureBackend, CaptureStream};
use crate::config::CaptureConfig;
use crate::display::{Display, DisplayId, SurfaceId};
use crate::frame::Frame;
use crate::geometry::Rect;
use crate::session::FaultSender;
use crate::sink::FrameSink;
use crate::{CaptureError, CaptureResult};

fn stream_err(e: windows::core::Error) -> CaptureError {
    CaptureError::Stream(e.to_string())
}

/// Windows Graphics Capture implementation of [`CaptureBackend`].
pub struct WgcBackend;

impl WgcBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WgcBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for WgcBackend {
    fn displays(&self) -> Vec<Display> {
        enumerate_monitors()
    }

    // WGC has no consent prompt; capture permission is implicit on Windows.
    // The pair keeps the prompt-capable shape for platforms that deny.
    fn has_permission(&self) -> bool {
        true
    }

    fn request_permission(&self) -> bool {
        true
    }

    fn open_stream(
        &mut self,
        display: &Display,
        config: &CaptureConfig,
        sink: FrameSink,
        faults: FaultSender,
    ) -> CaptureResult<Box<dyn CaptureStream>> {
        for surface in &config.excluded_surfaces {
            exclude_from_capture(*surface);
        }

        let shared = Arc::new(StreamShared {
            running: AtomicBool::new(true),
            params: Mutex::new(StreamParams::from_config(config)),
        });

        let monitor = display.id.as_raw();
        let queue_depth = config.queue_depth;
        let (ready_tx, ready_rx) = bounded(1);

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("wgc-capture".into())
                .spawn(move || capture_worker(monitor, queue_depth, shared, sink, faults, ready_tx))
                .map_err(|e| CaptureError::Stream(e.to_string()))?
        };

        // The worker reports the outcome of opening the stream so failures
        // surface synchronously from `start`.
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(WgcStream { shared, worker: Some(worker) })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CaptureError::Stream("capture worker exited during startup".into()))
            }
        }
    }
}

/// Handle to a running WGC stream; closing stops and joins the worker.
struct WgcStream {
    shared: Arc<StreamShared>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureStream for WgcStream {
    fn update(&mut self, config: &CaptureConfig) -> CaptureResult<()> {
        *self.shared.params.lock() = StreamParams::from_config(config);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for WgcStream {
    fn drop(&mut self) {
        self.close();
    }
}

struct StreamShared {
    running: AtomicBool,
    params: Mutex<StreamParams>,
}

/// Everything the worker needs per frame, swapped wholesale on update.
#[derive(Debug, Clone, Copy)]
struct StreamParams {
    crop_x: i32,
    crop_y: i32,
    width: u32,
    height: u32,
    interval: Duration,
}

impl StreamParams {
    fn from_config(config: &CaptureConfig) -> Self {
        // The configuration carries the source rect in points and the output
        // size in pixels; the ratio recovers the scale factor for the crop
        // origin without threading it through separately.
        let scale = if config.source_rect.width > 0.0 {
            f64::from(config.width) / config.source_rect.width
        } else {
            1.0
        };

        Self {
            crop_x: (config.source_rect.x * scale).round() as i32,
            crop_y: (config.source_rect.y * scale).round() as i32,
            width: config.width,
            height: config.height,
            interval: config.frame_interval,
        }
    }
}

fn capture_worker(
    monitor: isize,
    queue_depth: u32,
    shared: Arc<StreamShared>,
    sink: FrameSink,
    faults: FaultSender,
    ready: Sender<CaptureResult<()>>,
) {
    unsafe {
        if let Err(e) = RoInitialize(RO_INIT_MULTITHREADED) {
            let _ = ready.send(Err(stream_err(e)));
            return;
        }
    }

    let (device, frame_pool, session) = match open_wgc(monitor, queue_depth) {
        Ok(opened) => {
            let _ = ready.send(Ok(()));
            opened
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            unsafe { RoUninitialize() };
            return;
        }
    };

    let mut last_frame: Option<Instant> = None;
    while shared.running.load(Ordering::SeqCst) {
        let params = *shared.params.lock();
        if last_frame.map_or(true, |t| t.elapsed() >= params.interval) {
            match next_frame(&device, &frame_pool, &params) {
                Ok(Some(frame)) => {
                    sink.publish(frame);
                    last_frame = Some(Instant::now());
                }
                Ok(None) => {}
                Err(e) => {
                    faults.raise(e.to_string());
                    break;
                }
            }
        }
        thread::sleep(Duration::from_millis(1));
    }

    let _ = session.Close();
    let _ = frame_pool.Close();
    unsafe {
        RoUninitialize();
    }
    debug!("capture worker exited");
}

fn open_wgc(
    monitor: isize,
    queue_depth: u32,
) -> CaptureResult<(DeviceBundle, Direct3D11CaptureFramePool, GraphicsCaptureSession)> {
    let item = unsafe {
        let interop = windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
            .map_err(stream_err)?;
        let item: Result<GraphicsCaptureItem, _> =
            interop.CreateForMonitor(HMONITOR(monitor as _));
        item.map_err(|_| CaptureError::DisplayNotFound)?
    };

    let device = DeviceBundle::new()?;

    let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
        &device.winrt,
        DirectXPixelFormat::B8G8R8A8UIntNormalized,
        queue_depth as i32,
        item.Size().map_err(stream_err)?,
    )
    .map_err(stream_err)?;

    let session = frame_pool.CreateCaptureSession(&item).map_err(stream_err)?;
    session.StartCapture().map_err(stream_err)?;

    Ok((device, frame_pool, session))
}

/// Polls the pool; `None` when no frame is ready yet.
fn next_frame(
    device: &DeviceBundle,
    frame_pool: &Direct3D11CaptureFramePool,
    params: &StreamParams,
) -> windows::core::Result<Option<Frame>> {
    let captured = match frame_pool.TryGetNextFrame() {
        Ok(captured) => captured,
        Err(_) => return Ok(None),
    };
    let size = captured.ContentSize()?;
    let surface = captured.Surface()?;
    copy_region(device, &surface, size, params)
}

fn copy_region(
    device: &DeviceBundle,
    surface: &IDirect3DSurface,
    size: SizeInt32,
    params: &StreamParams,
) -> windows::core::Result<Option<Frame>> {
    let surface_width = size.Width.max(0) as u32;
    let surface_height = size.Height.max(0) as u32;

    let src_x = params.crop_x.max(0) as u32;
    let src_y = params.crop_y.max(0) as u32;
    if src_x >= surface_width || src_y >= surface_height {
        return Ok(None);
    }
    let width = params.width.min(surface_width - src_x);
    let height = params.height.min(surface_height - src_y);
    if width == 0 || height == 0 {
        return Ok(None);
    }

    unsafe {
        let texture: ID3D11Texture2D = winrt_interface(surface)?;

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        let mut staging: Option<ID3D11Texture2D> = None;
        device.device.CreateTexture2D(&desc, None, Some(&mut staging))?;
        let staging = staging.expect("CreateTexture2D succeeded");

        let src_box = D3D11_BOX {
            left: src_x,
            top: src_y,
            front: 0,
            right: src_x + width,
            bottom: src_y + height,
            back: 1,
        };
        device
            .context
            .CopySubresourceRegion(&staging, 0, 0, 0, 0, &texture, 0, Some(&src_box));

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        device.context.Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;

        let row_pitch = mapped.RowPitch as usize;
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let row = std::slice::from_raw_parts(
                (mapped.pData as *const u8).add(y as usize * row_pitch),
                width as usize * 4,
            );
            data.extend_from_slice(row);
        }

        device.context.Unmap(&staging, 0);

        Ok(Some(Frame::new(data, width, height)))
    }
}

/// D3D11 device triple shared by the pool and the staging copies.
struct DeviceBundle {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    winrt: IDirect3DDevice,
}

impl DeviceBundle {
    fn new() -> CaptureResult<Self> {
        unsafe {
            let mut device: Option<ID3D11Device> = None;
            let mut context: Option<ID3D11DeviceContext> = None;

            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                Some(&[D3D_FEATURE_LEVEL_11_0]),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(stream_err)?;

            let device = device.expect("D3D11CreateDevice succeeded");
            let context = context.expect("D3D11CreateDevice succeeded");

            let dxgi_device: IDXGIDevice = device.cast().map_err(stream_err)?;
            let inspectable =
                CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device).map_err(stream_err)?;
            let winrt: IDirect3DDevice = inspectable.cast().map_err(stream_err)?;

            Ok(Self { device, context, winrt })
        }
    }
}

/// Recovers the D3D11 interface backing a WinRT surface.
fn winrt_interface<T: Interface>(wrapper: &impl Interface) -> windows::core::Result<T> {
    unsafe {
        let access: IDirect3DDxgiInterfaceAccess = wrapper.cast()?;
        access.GetInterface()
    }
}

fn exclude_from_capture(surface: SurfaceId) {
    unsafe {
        let hwnd = HWND(surface.as_raw() as *mut std::ffi::c_void);
        if let Err(e) = SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE) {
            warn!(surface = surface.as_raw(), error = %e, "could not exclude surface from capture");
        }
    }
}

fn enumerate_monitors() -> Vec<Display> {
    let mut monitors: Vec<(isize, RECT)> = Vec::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitor_callback),
            LPARAM(&mut monitors as *mut Vec<(isize, RECT)> as isize),
        );
    }

    monitors
        .into_iter()
        .map(|(raw, rect)| {
            let scale = monitor_scale(raw);
            Display {
                id: DisplayId::from_raw(raw),
                // Origin is the monitor's virtual-desktop position in points;
                // the pipeline consumes only the height and scale factor.
                frame: Rect::new(
                    f64::from(rect.left) / scale,
                    f64::from(rect.top) / scale,
                    f64::from(rect.right - rect.left) / scale,
                    f64::from(rect.bottom - rect.top) / scale,
                ),
                scale_factor: scale,
            }
        })
        .collect()
}

unsafe extern "system" fn enum_monitor_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<(isize, RECT)>);

    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if GetMonitorInfoW(hmonitor, &mut info).as_bool() {
        monitors.push((hmonitor.0 as isize, info.rcMonitor));
    }

    BOOL(1)
}

fn monitor_scale(raw: isize) -> f64 {
    let mut dpi_x = 0u32;
    let mut dpi_y = 0u32;
    unsafe {
        if GetDpiForMonitor(HMONITOR(raw as _), MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y).is_ok()
            && dpi_x > 0
        {
            return f64::from(dpi_x) / 96.0;
        }
    }
    1.0
}
