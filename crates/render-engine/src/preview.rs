//! Trim preview playback.
//!
//! The controller plays the selected `[start, end]` range on a
//! [`PlaybackSurface`] and stops at the end. An export suspends it so the
//! preview and the exporter never use the video at the same time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use storykit_story_model::TrimRange;
use tokio_util::sync::CancellationToken;

/// Poll period of the preview loop (~60 Hz).
pub const PREVIEW_TICK: Duration = Duration::from_millis(16);

/// A seekable player the preview drives.
pub trait PlaybackSurface: Send {
    fn seek(&mut self, time_secs: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn current_time(&self) -> f64;
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still inside the range.
    Playing,
    /// Reached the end; paused and rewound.
    Finished,
    /// Not playing.
    Idle,
    /// An export holds the media.
    Suspended,
}

pub struct TrimController {
    range: TrimRange,
    surface: Box<dyn PlaybackSurface>,
    playing: bool,
    suspended: bool,
}

/// Controller shared between the host and the preview loop.
pub type SharedTrimController = Arc<Mutex<TrimController>>;

impl TrimController {
    pub fn new(range: TrimRange, surface: Box<dyn PlaybackSurface>) -> Self {
        Self {
            range,
            surface,
            playing: false,
            suspended: false,
        }
    }

    pub fn shared(self) -> SharedTrimController {
        Arc::new(Mutex::new(self))
    }

    pub fn range(&self) -> TrimRange {
        self.range
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Clamp and apply a new range, seeking the surface to its start.
    pub fn set_range(&mut self, start: f64, end: f64) -> TrimRange {
        self.range.set(start, end);
        if !self.suspended {
            self.surface.seek(self.range.start());
        }
        self.range
    }

    /// Replace the whole range, e.g. after the session edited it.
    pub fn sync_range(&mut self, range: TrimRange) {
        self.range = range;
        if !self.suspended {
            self.surface.seek(range.start());
        }
    }

    pub fn start_preview(&mut self) {
        self.playing = true;
        if self.suspended {
            return;
        }
        self.surface.seek(self.range.start());
        self.surface.play();
    }

    pub fn stop_preview(&mut self) {
        self.playing = false;
        self.surface.pause();
    }

    /// Poll playback; once past the end, pause and rewind.
    pub fn tick(&mut self) -> TickOutcome {
        if self.suspended {
            return TickOutcome::Suspended;
        }
        if !self.playing {
            return TickOutcome::Idle;
        }
        if self.range.is_past_end(self.surface.current_time()) {
            self.surface.pause();
            self.surface.seek(self.range.start());
            self.playing = false;
            return TickOutcome::Finished;
        }
        TickOutcome::Playing
    }

    /// Hand the media to an exporter.
    pub fn suspend(&mut self) {
        if !self.suspended {
            self.suspended = true;
            self.surface.pause();
        }
    }

    /// Take the media back after an export.
    pub fn resume(&mut self) {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        self.surface.seek(self.range.start());
        if self.playing {
            self.surface.play();
        }
    }
}

/// Drive `tick` at `period` until playback finishes, stops, or `cancel`
/// fires. Suspended ticks keep the loop alive.
pub async fn run_preview(
    controller: SharedTrimController,
    cancel: CancellationToken,
    period: Duration,
) -> TickOutcome {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                controller.lock().stop_preview();
                return TickOutcome::Idle;
            }
            _ = interval.tick() => {
                let outcome = controller.lock().tick();
                match outcome {
                    TickOutcome::Playing | TickOutcome::Suspended => {}
                    TickOutcome::Finished | TickOutcome::Idle => return outcome,
                }
            }
        }
    }
}
