//! Region selection and region tracking for MirrorPane
//!
//! The drag-to-draw selector and the outline/handle tracker are pure state
//! machines over UI-space geometry; the platform surfaces feed them pointer
//! input and forward their events to the orchestrator over channels.

pub mod mapping;
pub mod selection;
pub mod tracker;

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "windows")]
pub use win32::{select_region, TrackerSurface};

#[cfg(not(target_os = "windows"))]
mod stub;
#[cfg(not(target_os = "windows"))]
pub use stub::{select_region, TrackerSurface};

pub use selection::{RegionSelector, SelectionEvent, MIN_SELECTION_SIZE};
pub use tracker::{RegionTracker, TrackerEvent, BORDER_WIDTH};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("overlay surface failure: {0}")]
    Surface(String),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
