//! Non-Windows surface stubs so the orchestrator links on any host.

use crossbeam_channel::Sender;
use tracing::warn;

use capture::{Display, Region, SurfaceId};

use crate::selection::SelectionEvent;
use crate::tracker::TrackerEvent;
use crate::OverlayResult;

pub fn select_region(_display: &Display, events: &Sender<SelectionEvent>) -> OverlayResult<()> {
    warn!("region selection is not supported on this platform");
    let _ = events.send(SelectionEvent::Cancelled);
    Ok(())
}

pub struct TrackerSurface;

impl TrackerSurface {
    pub fn present(_region: Region, _events: Sender<TrackerEvent>) -> OverlayResult<Self> {
        warn!("region tracking is not supported on this platform");
        Ok(Self)
    }

    pub fn update_region(&self, _region: Region) {}

    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        Vec::new()
    }

    pub fn close(&self) {}
}
