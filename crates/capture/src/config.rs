//! Capture configuration, rebuilt wholesale on every start and reconfigure.

use std::time::Duration;

use crate::display::{Display, SurfaceId};
use crate::geometry::{self, Rect};

/// Depth of the platform frame queue. Bounded so a slow consumer sheds
/// frames instead of growing memory; drops are not errors.
pub const QUEUE_DEPTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
}

/// The full parameter set submitted to the platform capture facility.
///
/// Never mutated in place: every start and every reconfigure builds a fresh
/// value from the current region, display, and frame rate, and the facility
/// applies it atomically as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Source rectangle in capture space (top-left origin), logical points.
    pub source_rect: Rect,
    /// Output size in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Delivery pacing as an interval (1/fps), so the facility paces frames
    /// instead of the consumer discarding excess ones.
    pub frame_interval: Duration,
    pub pixel_format: PixelFormat,
    pub shows_cursor: bool,
    pub excluded_surfaces: Vec<SurfaceId>,
    pub queue_depth: u32,
}

impl CaptureConfig {
    /// Builds a configuration for mirroring `rect` (display-relative UI
    /// space) off `display` at `fps` Hz.
    pub fn build(rect: Rect, display: &Display, fps: u32, excluded: &[SurfaceId]) -> Self {
        debug_assert!(fps > 0);
        debug_assert!(display.scale_factor > 0.0 && display.height_points() > 0.0);

        let source_rect = geometry::to_capture_space(rect, display.height_points());
        let (width, height) = geometry::pixel_size(rect.size(), display.scale_factor);

        Self {
            source_rect,
            width,
            height,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(fps)),
            pixel_format: PixelFormat::Bgra8,
            shows_cursor: true,
            excluded_surfaces: excluded.to_vec(),
            queue_depth: QUEUE_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayId;

    fn display() -> Display {
        Display {
            id: DisplayId::from_raw(1),
            frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            scale_factor: 2.0,
        }
    }

    #[test]
    fn build_flips_source_rect_and_scales_output() {
        let config = CaptureConfig::build(Rect::new(100.0, 200.0, 640.0, 480.0), &display(), 30, &[]);

        assert_eq!(config.source_rect, Rect::new(100.0, 400.0, 640.0, 480.0));
        assert_eq!((config.width, config.height), (1280, 960));
        assert_eq!(config.frame_interval, Duration::from_secs_f64(1.0 / 30.0));
        assert_eq!(config.pixel_format, PixelFormat::Bgra8);
        assert_eq!(config.queue_depth, QUEUE_DEPTH);
        assert!(config.shows_cursor);
    }

    #[test]
    fn build_is_a_pure_function_of_its_inputs() {
        let excluded = [SurfaceId::from_raw(7), SurfaceId::from_raw(9)];
        let rect = Rect::new(10.0, 10.0, 320.0, 240.0);

        let a = CaptureConfig::build(rect, &display(), 60, &excluded);
        let b = CaptureConfig::build(rect, &display(), 60, &excluded);
        assert_eq!(a, b);
        assert_eq!(a.excluded_surfaces, excluded.to_vec());
    }

    #[test]
    fn interval_tracks_fps() {
        let config = CaptureConfig::build(Rect::new(0.0, 0.0, 100.0, 100.0), &display(), 60, &[]);
        assert_eq!(config.frame_interval, Duration::from_secs_f64(1.0 / 60.0));
    }
}
