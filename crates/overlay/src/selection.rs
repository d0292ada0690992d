//! Drag-to-draw region selection state machine.
//!
//! Driven by a full-screen input surface: pointer-down anchors the drag,
//! pointer-move recomputes the selection as the bounding box of anchor and
//! pointer, pointer-up commits or cancels. Coordinates are display-relative
//! UI-space points; the surface translates before calling in.

use capture::{Display, Rect, Region};

/// Selections with either dimension at or below this are cancelled on
/// pointer-up instead of committed.
pub const MIN_SELECTION_SIZE: f64 = 10.0;

/// Terminal outcome of a selection gesture, delivered to the orchestrator.
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    Committed(Region),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Inactive,
    Dragging,
}

pub struct RegionSelector {
    display: Display,
    phase: Phase,
    anchor: (f64, f64),
    current: Option<Rect>,
}

impl RegionSelector {
    /// A selector for a gesture on the given display.
    pub fn new(display: Display) -> Self {
        Self { display, phase: Phase::Inactive, anchor: (0.0, 0.0), current: None }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.anchor = (x, y);
        self.current = None;
        self.phase = Phase::Dragging;
    }

    /// Returns the live selection rectangle for redraw while dragging.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<Rect> {
        if self.phase != Phase::Dragging {
            return None;
        }
        let rect = drag_rect(self.anchor, (x, y));
        self.current = Some(rect);
        Some(rect)
    }

    /// Ends the gesture: commits when both dimensions exceed the minimum,
    /// cancels otherwise.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> SelectionEvent {
        if self.phase != Phase::Dragging {
            return SelectionEvent::Cancelled;
        }
        self.phase = Phase::Inactive;
        let rect = drag_rect(self.anchor, (x, y));
        self.current = None;

        if is_valid_selection(&rect) {
            SelectionEvent::Committed(Region::new(rect, self.display.clone()))
        } else {
            SelectionEvent::Cancelled
        }
    }

    /// Explicit cancel (Escape), valid in any phase.
    pub fn cancel(&mut self) -> SelectionEvent {
        self.phase = Phase::Inactive;
        self.current = None;
        SelectionEvent::Cancelled
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == Phase::Dragging
    }

    pub fn selection(&self) -> Option<Rect> {
        self.current
    }

    /// Live "W × H" label drawn above the selection rectangle.
    pub fn size_label(&self) -> Option<String> {
        self.current
            .map(|r| format!("{} × {}", r.width as i64, r.height as i64))
    }
}

/// Axis-aligned bounding box of the anchor and the current pointer, so a
/// drag in any of the four directions behaves the same.
pub fn drag_rect(anchor: (f64, f64), current: (f64, f64)) -> Rect {
    Rect::new(
        anchor.0.min(current.0),
        anchor.1.min(current.1),
        (anchor.0 - current.0).abs(),
        (anchor.1 - current.1).abs(),
    )
}

pub fn is_valid_selection(rect: &Rect) -> bool {
    rect.width > MIN_SELECTION_SIZE && rect.height > MIN_SELECTION_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::DisplayId;

    fn display() -> Display {
        Display {
            id: DisplayId::from_raw(1),
            frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            scale_factor: 1.0,
        }
    }

    #[test]
    fn drag_commits_its_bounding_box() {
        let mut selector = RegionSelector::new(display());
        selector.pointer_down(50.0, 50.0);
        selector.pointer_move(120.0, 90.0);

        match selector.pointer_up(200.0, 150.0) {
            SelectionEvent::Committed(region) => {
                assert_eq!(region.rect, Rect::new(50.0, 50.0, 150.0, 100.0));
                assert_eq!(region.display.id, DisplayId::from_raw(1));
            }
            SelectionEvent::Cancelled => panic!("expected a committed region"),
        }
        assert!(!selector.is_dragging());
    }

    #[test]
    fn tiny_drag_cancels_without_a_rectangle() {
        let mut selector = RegionSelector::new(display());
        selector.pointer_down(50.0, 50.0);

        assert!(matches!(selector.pointer_up(55.0, 53.0), SelectionEvent::Cancelled));
        assert!(selector.selection().is_none());
    }

    #[test]
    fn dragging_in_any_direction_is_symmetric() {
        for (end_x, end_y) in [(200.0, 150.0), (-100.0, 150.0), (200.0, -50.0), (-100.0, -50.0)] {
            let rect = drag_rect((50.0, 50.0), (end_x, end_y));
            assert_eq!(rect.width, (50.0 - end_x).abs());
            assert_eq!(rect.height, (50.0 - end_y).abs());
            assert!(rect.x <= 50.0 && rect.y <= 50.0);
        }
    }

    #[test]
    fn pointer_move_tracks_the_live_rectangle_and_label() {
        let mut selector = RegionSelector::new(display());
        selector.pointer_down(10.0, 10.0);

        let live = selector.pointer_move(110.0, 60.0).unwrap();
        assert_eq!(live, Rect::new(10.0, 10.0, 100.0, 50.0));
        assert_eq!(selector.size_label().as_deref(), Some("100 × 50"));
    }

    #[test]
    fn escape_cancels_mid_drag() {
        let mut selector = RegionSelector::new(display());
        selector.pointer_down(10.0, 10.0);
        selector.pointer_move(300.0, 300.0);

        assert!(matches!(selector.cancel(), SelectionEvent::Cancelled));
        assert!(!selector.is_dragging());
        assert!(selector.selection().is_none());
    }

    #[test]
    fn exactly_minimum_size_is_still_too_small() {
        let mut selector = RegionSelector::new(display());
        selector.pointer_down(0.0, 0.0);
        assert!(matches!(
            selector.pointer_up(MIN_SELECTION_SIZE, MIN_SELECTION_SIZE),
            SelectionEvent::Cancelled
        ));
    }
}
