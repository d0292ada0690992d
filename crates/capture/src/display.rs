//! Display identity and the user-chosen capture region.

use crate::geometry::Rect;

/// Opaque platform display handle (HMONITOR on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayId(isize);

impl DisplayId {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> isize {
        self.0
    }
}

/// Opaque identifier of one of this application's own on-screen surfaces
/// (HWND on Windows). Surfaces in the excluded set are never captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(isize);

impl SurfaceId {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> isize {
        self.0
    }
}

/// A physical display as enumerated by the platform. Enumerated at query
/// time and never cached across operations; displays come and go.
#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: DisplayId,
    /// The display's frame in global UI space, in logical points.
    pub frame: Rect,
    /// Physical pixels per logical point (e.g. 2.0 on high-density panels).
    pub scale_factor: f64,
}

impl Display {
    /// Display height in points, the pivot for UI ⇄ capture space flips.
    pub fn height_points(&self) -> f64 {
        self.frame.height
    }
}

/// The rectangle being mirrored, bound to the display it was drawn on.
/// The rect is display-relative UI space. Dimensions are positive; regions
/// are produced only by a committed selection drag or a tracker move.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub rect: Rect,
    pub display: Display,
}

impl Region {
    pub fn new(rect: Rect, display: Display) -> Self {
        debug_assert!(rect.width > 0.0 && rect.height > 0.0);
        Self { rect, display }
    }
}
