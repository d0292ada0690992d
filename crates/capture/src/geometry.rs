//! Coordinate-space translation between UI space and capture space.
//!
//! UI space has its origin at the bottom-left of a display and is measured in
//! logical points; capture space has its origin at the top-left. Pixel sizes
//! are logical points multiplied by the display's scale factor.
//!
//! Everything here is pure. The functions are total; callers validate that
//! `display_height` and `scale_factor` are positive before invoking them.

/// Rectangle in logical points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size { width: self.width, height: self.height }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    /// Grows the rectangle outward by `d` on every edge (negative `d` shrinks).
    pub fn outset(&self, d: f64) -> Self {
        Self {
            x: self.x - d,
            y: self.y - d,
            width: self.width + 2.0 * d,
            height: self.height + 2.0 * d,
        }
    }

    pub fn inset(&self, d: f64) -> Self {
        self.outset(-d)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..*self }
    }
}

/// Size in logical points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Flips a UI-space rectangle (bottom-left origin) into capture space
/// (top-left origin) on a display of the given height. Applying it twice with
/// the same `display_height` yields the original rectangle.
pub fn to_capture_space(rect: Rect, display_height: f64) -> Rect {
    Rect {
        x: rect.x,
        y: display_height - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}

/// Inverse of [`to_capture_space`]. The flip is an involution, so this is the
/// same arithmetic under a name that reads correctly at call sites.
pub fn to_ui_space(rect: Rect, display_height: f64) -> Rect {
    to_capture_space(rect, display_height)
}

/// Pixel dimensions for a size in points, truncating toward zero. Output is
/// non-negative for non-negative input.
pub fn pixel_size(size: Size, scale_factor: f64) -> (u32, u32) {
    ((size.width * scale_factor) as u32, (size.height * scale_factor) as u32)
}
