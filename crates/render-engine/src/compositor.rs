//! Frame compositor: re-draws every output frame of a video export.
//!
//! Each frame is the source frame cover-fit onto black plus the full story
//! overlay. Frames are produced strictly in order and handed to a
//! [`FrameSink`]; a cancellation token is checked before every frame.

use std::time::{Duration, Instant};

use storykit_common::error::{StoryError, StoryResult};
use storykit_story_model::{CanvasSpec, TrimRange};
use tiny_skia::{Color, Pixmap};
use tokio_util::sync::CancellationToken;

use crate::canvas::{render_story, RenderOptions, StoryScene};
use crate::cover::draw_cover;
use crate::export::{ExportProgress, ExportStage, ProgressCallback};

/// Why a source frame could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("no frame arrived within {0:?}")]
    Timeout(Duration),

    #[error("source ended before {time_secs:.3}s")]
    Ended { time_secs: f64 },

    #[error("frame source failed: {0}")]
    Source(String),

    /// The export was cancelled while the source was waiting.
    #[error("cancelled while waiting for a frame")]
    Cancelled,
}

impl From<FrameError> for StoryError {
    fn from(err: FrameError) -> Self {
        StoryError::export(err.to_string())
    }
}

/// Sequential supplier of decoded source frames.
pub trait FrameSource: Send {
    /// Frame shown at `time_secs` of the source. Requests arrive in
    /// increasing time order; waits at most `timeout` and gives up with
    /// [`FrameError::Cancelled`] soon after `cancel` fires.
    fn frame_at(
        &mut self,
        time_secs: f64,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Pixmap, FrameError>;

    /// Stop decoding and release the source.
    fn close(&mut self);
}

/// Consumer of composed output frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Pixmap) -> StoryResult<()>;

    /// Flush the encoder and return the encoded file.
    fn finish(&mut self) -> StoryResult<Vec<u8>>;

    /// Discard everything written so far.
    fn abort(&mut self);

    fn mime(&self) -> &str;

    fn extension(&self) -> &str;
}

/// Composition parameters for one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoCompositor {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub trim: TrimRange,
    pub frame_timeout: Duration,
}

impl VideoCompositor {
    pub fn new(canvas: &CanvasSpec, fps: u32, trim: TrimRange, frame_timeout: Duration) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            fps: fps.max(1),
            trim,
            frame_timeout,
        }
    }

    /// `ceil((end − start) × fps)`
    pub fn total_frames(&self) -> u64 {
        self.trim.frame_count(self.fps)
    }

    /// Source time of output frame `index`.
    pub fn frame_time(&self, index: u64) -> f64 {
        self.trim.start() + index as f64 / self.fps as f64
    }

    /// Compose every frame into `sink`.
    ///
    /// Returns `Ok(None)` when cancelled. On cancellation or failure the sink
    /// is aborted; the source is closed in every outcome.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        scene: &StoryScene<'_>,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> StoryResult<Option<Vec<u8>>> {
        let result = self.compose(source, sink, scene, cancel, progress);
        source.close();

        match &result {
            Ok(Some(_)) => {}
            Ok(None) => {
                sink.abort();
                tracing::info!("Video export cancelled");
                report(progress, self.stage_report(ExportStage::Cancelled, 0, 0.0));
            }
            Err(e) => {
                sink.abort();
                tracing::error!(error = %e, "Video export failed");
                report(progress, self.stage_report(ExportStage::Failed, 0, 0.0));
            }
        }
        result
    }

    fn compose(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        scene: &StoryScene<'_>,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> StoryResult<Option<Vec<u8>>> {
        let total = self.total_frames();
        let mut surface = Pixmap::new(self.width, self.height).ok_or_else(|| {
            StoryError::export(format!("cannot allocate {}x{} surface", self.width, self.height))
        })?;
        let overlay = RenderOptions {
            transparent_background: true,
            skip_clear: true,
        };

        tracing::info!(
            total_frames = total,
            fps = self.fps,
            start = self.trim.start(),
            end = self.trim.end(),
            "Composing video"
        );
        report(progress, self.stage_report(ExportStage::Preparing, 0, 0.0));

        let started = Instant::now();
        for index in 0..total {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let time = self.frame_time(index);
            let frame = match source.frame_at(time, self.frame_timeout, cancel) {
                Ok(frame) => frame,
                Err(FrameError::Cancelled) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            surface.fill(Color::BLACK);
            draw_cover(&mut surface, frame.as_ref());
            render_story(&mut surface, None, scene, overlay);
            sink.write_frame(&surface)?;

            let done = index + 1;
            let elapsed = started.elapsed().as_secs_f64();
            let eta = elapsed / done as f64 * (total - done) as f64;
            report(progress, self.stage_report(ExportStage::Rendering, done, eta));
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        report(progress, self.stage_report(ExportStage::Encoding, total, 0.0));
        let bytes = sink.finish()?;
        report(progress, self.stage_report(ExportStage::Finalizing, total, 0.0));
        tracing::info!(
            bytes = bytes.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Video composed"
        );
        report(progress, self.stage_report(ExportStage::Complete, total, 0.0));
        Ok(Some(bytes))
    }

    fn stage_report(&self, stage: ExportStage, frames_rendered: u64, eta_secs: f64) -> ExportProgress {
        let total_frames = self.total_frames();
        let progress = match stage {
            ExportStage::Complete => 1.0,
            _ if total_frames == 0 => 0.0,
            _ => frames_rendered as f64 / total_frames as f64,
        };
        ExportProgress {
            progress,
            frames_rendered,
            total_frames,
            eta_secs,
            stage,
        }
    }
}

fn report(progress: Option<&ProgressCallback>, update: ExportProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}
