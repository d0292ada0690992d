//! Mapping between display-relative UI-space points and the platform's
//! pixel coordinates (top-left origin, physical pixels).
//!
//! Surfaces run in pixels; the state machines run in points. These helpers
//! are the only place the two meet.

use capture::{Display, Rect};

/// Rectangle in physical pixels, top-left origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PxRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Display-local pixel rectangle for a display-relative UI rect.
pub fn rect_to_display_px(display: &Display, rect: Rect) -> PxRect {
    let scale = display.scale_factor;
    PxRect {
        x: (rect.x * scale).round() as i32,
        y: ((display.frame.height - rect.max_y()) * scale).round() as i32,
        width: (rect.width * scale).round() as i32,
        height: (rect.height * scale).round() as i32,
    }
}

/// Screen (virtual-desktop) pixel rectangle for a display-relative UI rect,
/// for positioning top-level windows.
pub fn rect_to_screen_px(display: &Display, rect: Rect) -> PxRect {
    let scale = display.scale_factor;
    let local = rect_to_display_px(display, rect);
    PxRect {
        x: local.x + (display.frame.x * scale).round() as i32,
        y: local.y + (display.frame.y * scale).round() as i32,
        ..local
    }
}

/// Display-relative UI point for a display-local pixel position.
pub fn px_to_display_point(display: &Display, x: i32, y: i32) -> (f64, f64) {
    let scale = display.scale_factor;
    (
        f64::from(x) / scale,
        display.frame.height - f64::from(y) / scale,
    )
}

/// Display-relative UI point for a screen (virtual-desktop) pixel position,
/// e.g. the global cursor during a handle drag.
pub fn screen_px_to_point(display: &Display, x: i32, y: i32) -> (f64, f64) {
    let scale = display.scale_factor;
    px_to_display_point(
        display,
        x - (display.frame.x * scale).round() as i32,
        y - (display.frame.y * scale).round() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::DisplayId;

    fn display() -> Display {
        Display {
            id: DisplayId::from_raw(1),
            frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            scale_factor: 2.0,
        }
    }

    fn offset_display() -> Display {
        Display {
            id: DisplayId::from_raw(2),
            frame: Rect::new(1920.0, 0.0, 1280.0, 720.0),
            scale_factor: 1.0,
        }
    }

    #[test]
    fn ui_rect_maps_to_flipped_scaled_pixels() {
        // 480-point-tall rect at the bottom-left of a 1080-point display.
        let px = rect_to_display_px(&display(), Rect::new(0.0, 0.0, 640.0, 480.0));
        assert_eq!(px, PxRect { x: 0, y: 1200, width: 1280, height: 960 });
    }

    #[test]
    fn pixel_point_round_trips_through_ui_space() {
        let d = display();
        let (ux, uy) = px_to_display_point(&d, 700, 300);
        let px = rect_to_display_px(&d, Rect::new(ux, uy - 1.0, 1.0, 1.0));
        assert_eq!((px.x, px.y), (700, 300));
    }

    #[test]
    fn screen_rect_adds_the_display_origin() {
        let d = offset_display();
        let px = rect_to_screen_px(&d, Rect::new(10.0, 10.0, 100.0, 100.0));
        assert_eq!(px, PxRect { x: 1930, y: 610, width: 100, height: 100 });
    }

    #[test]
    fn screen_point_subtracts_the_display_origin() {
        let d = offset_display();
        let (ux, uy) = screen_px_to_point(&d, 1930, 610);
        assert_eq!((ux, uy), (10.0, 110.0));
    }
}
