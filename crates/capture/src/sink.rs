//! Latest-wins frame hand-off between the capture worker and the display
//! surface.
//!
//! The producer publishes into a single slot and never blocks beyond the
//! slot swap; if the presentation side has not consumed the previous frame,
//! the newest frame replaces it and the stale one is dropped silently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::frame::Frame;

struct Slot {
    latest: Mutex<Option<Frame>>,
    dropped: AtomicU64,
}

/// Producer-side handle, called from the capture worker at up to fps Hz.
#[derive(Clone)]
pub struct FrameSink {
    slot: Arc<Slot>,
    ready: Sender<()>,
}

/// Presentation-side handle. Drains the ready signal and takes the latest
/// frame; there is no queue of pending paints.
pub struct FrameOutput {
    slot: Arc<Slot>,
    ready: Receiver<()>,
}

/// Creates a connected sink/output pair.
pub fn frame_channel() -> (FrameSink, FrameOutput) {
    let slot = Arc::new(Slot { latest: Mutex::new(None), dropped: AtomicU64::new(0) });
    // bounded(1): the signal coalesces, the producer's try_send never blocks.
    let (ready_tx, ready_rx) = bounded(1);

    (
        FrameSink { slot: Arc::clone(&slot), ready: ready_tx },
        FrameOutput { slot, ready: ready_rx },
    )
}

impl FrameSink {
    /// Hands a frame to the presentation side. Non-blocking: replaces any
    /// frame still waiting to be painted.
    pub fn publish(&self, frame: Frame) {
        let replaced = self.slot.latest.lock().replace(frame);
        if replaced.is_some() {
            self.slot.dropped.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.ready.try_send(());
    }

    /// Frames that were replaced before being painted.
    pub fn dropped_frames(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }
}

impl FrameOutput {
    /// Takes the latest frame if one is pending.
    pub fn try_latest(&self) -> Option<Frame> {
        self.slot.latest.lock().take()
    }

    /// Blocks until a frame is available or every sink is gone.
    pub fn recv_latest(&self) -> Option<Frame> {
        loop {
            self.ready.recv().ok()?;
            if let Some(frame) = self.try_latest() {
                return Some(frame);
            }
        }
    }

    /// Like [`recv_latest`](Self::recv_latest) with an upper bound on the wait.
    pub fn recv_latest_timeout(&self, timeout: Duration) -> Option<Frame> {
        self.ready.recv_timeout(timeout).ok()?;
        self.try_latest()
    }

    /// The ready signal, for use in a `select!` loop or a notifier thread.
    pub fn ready(&self) -> &Receiver<()> {
        &self.ready
    }

    pub fn dropped_frames(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Frame {
        Frame::new(vec![tag; 4], 1, 1)
    }

    #[test]
    fn newest_frame_wins_under_backpressure() {
        let (sink, output) = frame_channel();

        sink.publish(frame(1));
        sink.publish(frame(2));
        sink.publish(frame(3));

        let painted = output.try_latest().expect("a frame is pending");
        assert_eq!(painted.data[0], 3);
        assert_eq!(output.dropped_frames(), 2);
        assert!(output.try_latest().is_none());
    }

    #[test]
    fn publish_never_blocks_the_producer() {
        let (sink, output) = frame_channel();

        // No consumer draining: many publishes must still return promptly and
        // hold at most one pending frame.
        for i in 0..100 {
            sink.publish(frame(i));
        }
        assert_eq!(output.try_latest().expect("latest pending").data[0], 99);
        assert_eq!(sink.dropped_frames(), 99);
    }

    #[test]
    fn recv_latest_sees_frames_from_another_thread() {
        let (sink, output) = frame_channel();

        let producer = std::thread::spawn(move || {
            sink.publish(frame(7));
        });

        let got = output.recv_latest_timeout(Duration::from_secs(5)).expect("frame arrives");
        assert_eq!(got.data[0], 7);
        producer.join().unwrap();
    }

    #[test]
    fn recv_latest_ends_when_producers_are_gone() {
        let (sink, output) = frame_channel();
        drop(sink);
        assert!(output.recv_latest().is_none());
    }
}
