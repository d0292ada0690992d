//! Region tracker: a persistent outline plus a drag handle, moved as a unit.
//!
//! The outline sits outset from the tracked region by a fixed border; the
//! handle is centered along the outline's top edge. Dragging translates the
//! outline by the delta against the drag-start snapshot, never by
//! accumulating increments, which would drift.

use capture::{Display, Rect, Region};

/// Outline border thickness in points; the outline frame is the region
/// outset by this amount.
pub const BORDER_WIDTH: f64 = 3.0;

pub const HANDLE_WIDTH: f64 = 48.0;
pub const HANDLE_HEIGHT: f64 = 16.0;

/// Emitted when a handle drag ends; the orchestrator feeds the region into
/// `reconfigure`. On reconfigure failure the outline stays where the drag
/// left it and the error is surfaced, never silently reverted.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Moved(Region),
}

struct DragOrigin {
    pointer: (f64, f64),
    frame_origin: (f64, f64),
}

pub struct RegionTracker {
    display: Display,
    outline_frame: Rect,
    drag: Option<DragOrigin>,
}

impl RegionTracker {
    /// Presents the tracker around a committed region.
    pub fn present(region: Region) -> Self {
        Self {
            outline_frame: region.rect.outset(BORDER_WIDTH),
            display: region.display,
            drag: None,
        }
    }

    pub fn outline_frame(&self) -> Rect {
        self.outline_frame
    }

    /// Handle frame, centered along the outline's top edge. Derived from the
    /// outline, so outline and handle always move atomically.
    pub fn handle_frame(&self) -> Rect {
        let outline = self.outline_frame;
        Rect::new(
            outline.x + (outline.width - HANDLE_WIDTH) / 2.0,
            outline.max_y() - HANDLE_HEIGHT / 2.0,
            HANDLE_WIDTH,
            HANDLE_HEIGHT,
        )
    }

    /// The tracked region: the outline frame minus the border inset.
    pub fn region(&self) -> Region {
        Region::new(self.outline_frame.inset(BORDER_WIDTH), self.display.clone())
    }

    /// Moves outline and handle to match a new region, both for external
    /// region replacement and for drag feedback.
    pub fn update_region(&mut self, region: Region) {
        self.outline_frame = region.rect.outset(BORDER_WIDTH);
        self.display = region.display;
    }

    /// Snapshots the pointer's global position and the outline's origin.
    pub fn drag_start(&mut self, x: f64, y: f64) {
        self.drag = Some(DragOrigin {
            pointer: (x, y),
            frame_origin: (self.outline_frame.x, self.outline_frame.y),
        });
    }

    /// Translates the outline by the delta against the drag-start snapshot;
    /// returns the new outline frame for the surface to apply.
    pub fn drag_move(&mut self, x: f64, y: f64) -> Option<Rect> {
        let drag = self.drag.as_ref()?;
        self.outline_frame.x = drag.frame_origin.0 + (x - drag.pointer.0);
        self.outline_frame.y = drag.frame_origin.1 + (y - drag.pointer.1);
        Some(self.outline_frame)
    }

    /// Ends the drag and emits the final region.
    pub fn drag_end(&mut self) -> Option<TrackerEvent> {
        self.drag.take()?;
        Some(TrackerEvent::Moved(self.region()))
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::DisplayId;

    fn region(x: f64, y: f64, w: f64, h: f64) -> Region {
        Region::new(
            Rect::new(x, y, w, h),
            Display {
                id: DisplayId::from_raw(1),
                frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
                scale_factor: 2.0,
            },
        )
    }

    #[test]
    fn outline_is_the_region_outset_by_the_border() {
        let tracker = RegionTracker::present(region(100.0, 100.0, 200.0, 150.0));
        assert_eq!(tracker.outline_frame(), Rect::new(97.0, 97.0, 206.0, 156.0));
        assert_eq!(tracker.region().rect, Rect::new(100.0, 100.0, 200.0, 150.0));
    }

    #[test]
    fn handle_is_centered_on_the_outline_top_edge() {
        let tracker = RegionTracker::present(region(100.0, 100.0, 200.0, 150.0));
        let outline = tracker.outline_frame();
        let handle = tracker.handle_frame();

        assert_eq!(handle.x + handle.width / 2.0, outline.x + outline.width / 2.0);
        assert_eq!(handle.y + handle.height / 2.0, outline.max_y());
        assert_eq!((handle.width, handle.height), (HANDLE_WIDTH, HANDLE_HEIGHT));
    }

    #[test]
    fn drag_translates_against_the_start_snapshot() {
        let mut tracker = RegionTracker::present(region(100.0, 100.0, 200.0, 150.0));
        tracker.drag_start(500.0, 500.0);

        tracker.drag_move(510.0, 520.0);
        assert_eq!(tracker.outline_frame().x, 107.0);
        assert_eq!(tracker.outline_frame().y, 117.0);

        // Absolute deltas: many intermediate moves land exactly where a
        // single move to the same pointer position would.
        tracker.drag_move(505.0, 505.0);
        tracker.drag_move(530.0, 540.0);
        assert_eq!(tracker.outline_frame().x, 127.0);
        assert_eq!(tracker.outline_frame().y, 137.0);

        match tracker.drag_end().unwrap() {
            TrackerEvent::Moved(moved) => {
                assert_eq!(moved.rect, Rect::new(130.0, 140.0, 200.0, 150.0));
            }
        }
        assert!(!tracker.is_dragging());
    }

    #[test]
    fn drag_end_without_drag_emits_nothing() {
        let mut tracker = RegionTracker::present(region(0.0, 0.0, 50.0, 50.0));
        assert!(tracker.drag_end().is_none());
        assert!(tracker.drag_move(10.0, 10.0).is_none());
    }

    #[test]
    fn update_region_moves_outline_and_handle_together() {
        let mut tracker = RegionTracker::present(region(100.0, 100.0, 200.0, 150.0));
        tracker.update_region(region(400.0, 300.0, 200.0, 150.0));

        assert_eq!(tracker.outline_frame(), Rect::new(397.0, 297.0, 206.0, 156.0));
        let handle = tracker.handle_frame();
        assert_eq!(handle.x + handle.width / 2.0, 397.0 + 206.0 / 2.0);
    }
}
