//! The `[start, end]` sub-range of a background video.

use serde::{Deserialize, Serialize};

/// Default upper bound for a fresh trim range, in seconds.
pub const DEFAULT_TRIM_SECS: f64 = 60.0;

/// Smallest span an edit may leave, in seconds.
pub const MIN_TRIM_SPAN: f64 = 0.1;

/// Selected portion of a video, in seconds.
///
/// Invariant: `0 ≤ start < end ≤ duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    start: f64,
    end: f64,
    duration: f64,
}

impl TrimRange {
    /// Default range for a video: `[0, min(duration, cap)]`.
    ///
    /// Returns `None` for a non-positive or non-finite duration, which no
    /// range can satisfy.
    pub fn for_duration(duration: f64, cap: f64) -> Option<Self> {
        if !(duration.is_finite() && duration > 0.0) {
            return None;
        }
        let cap = if cap.is_finite() && cap > 0.0 {
            cap
        } else {
            DEFAULT_TRIM_SECS
        };
        Some(Self {
            start: 0.0,
            end: duration.min(cap),
            duration,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Length of the selection.
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Apply a user edit, clamping into `[0, duration]` and keeping a
    /// minimum span. The start wins when both ends collide.
    pub fn set(&mut self, start: f64, end: f64) {
        let min_span = MIN_TRIM_SPAN.min(self.duration);
        let start = if start.is_finite() { start } else { self.start };
        let end = if end.is_finite() { end } else { self.end };

        let start = start.clamp(0.0, self.duration - min_span);
        let floor = (start + min_span).min(self.duration);
        let end = end.clamp(floor, self.duration);

        self.start = start;
        self.end = end;
    }

    /// Move only the start handle.
    pub fn set_start(&mut self, start: f64) {
        let end = self.end;
        self.set(start, end);
    }

    /// Move only the end handle.
    pub fn set_end(&mut self, end: f64) {
        let start = self.start;
        self.set(start, end);
    }

    /// Whether a playback position has reached the end of the selection.
    pub fn is_past_end(&self, time: f64) -> bool {
        time >= self.end
    }

    /// Number of output frames at `fps`: `ceil(span × fps)`.
    pub fn frame_count(&self, fps: u32) -> u64 {
        // Tolerance absorbs the float error of `end - start`.
        (self.span() * fps.max(1) as f64 - 1e-6).ceil().max(0.0) as u64
    }
}
