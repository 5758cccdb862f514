//! Image and video export.
//!
//! An image export is one render pass encoded as JPEG or PNG. A video export
//! re-draws every frame of the trimmed source through the
//! [`VideoCompositor`] on a blocking worker and returns the encoded clip.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use storykit_common::config::ExportDefaults;
use storykit_common::error::{StoryError, StoryResult};
use storykit_layout::StoryLayout;
use storykit_story_model::TrimRange;
use tiny_skia::{Pixmap, PixmapRef};
use tokio_util::sync::CancellationToken;

use crate::canvas::{render_to_pixmap, RenderOptions, StoryScene};
use crate::compositor::{FrameSink, FrameSource, VideoCompositor};
use crate::cover::pixmap_to_rgba;
use crate::encoder_selection::select_codec;
use crate::ffmpeg::{EncoderSettings, FfmpegEncoder, FfmpegFrameSource, VideoProbe};
use crate::typeface::Typeface;

/// Prefix of every exported file name.
pub const FILENAME_PREFIX: &str = "irontracks-story";

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Encoding,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

/// Still image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(StoryError::config(format!("unknown image format '{other}'"))),
        }
    }
}

/// A finished export. Writing it anywhere is the caller's business.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    pub blob: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

impl ExportResult {
    fn new(blob: Vec<u8>, extension: &str, mime: &str) -> Self {
        Self {
            blob,
            filename: export_filename(extension, chrono::Utc::now().timestamp_millis()),
            mime: mime.to_string(),
        }
    }

    /// Write the blob under `dir` using its file name.
    pub fn write_to_dir(&self, dir: &Path) -> StoryResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.blob)?;
        tracing::info!(path = %path.display(), bytes = self.blob.len(), "Export written");
        Ok(path)
    }
}

/// `irontracks-story-<epoch-millis>.<ext>`
pub fn export_filename(extension: &str, epoch_millis: i64) -> String {
    format!("{FILENAME_PREFIX}-{epoch_millis}.{extension}")
}

/// JPEG quality in `1..=100` for a `(0, 1]` fraction.
pub fn jpeg_quality_percent(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 92;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode a rendered surface. JPEG drops the alpha channel.
pub fn encode_image(pixmap: &Pixmap, format: ImageFormat, quality: f32) -> StoryResult<Vec<u8>> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let rgba = image::RgbaImage::from_raw(width, height, pixmap_to_rgba(pixmap))
        .ok_or_else(|| StoryError::export("surface buffer has the wrong size"))?;

    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality_percent(quality));
            rgb.write_with_encoder(encoder)
                .map_err(|e| StoryError::export(format!("JPEG encoding failed: {e}")))?;
        }
        ImageFormat::Png => {
            rgba.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
                .map_err(|e| StoryError::export(format!("PNG encoding failed: {e}")))?;
        }
    }
    Ok(out)
}

/// Render the story once over `background` and encode it.
pub fn export_image(
    background: Option<PixmapRef<'_>>,
    scene: &StoryScene<'_>,
    format: ImageFormat,
    quality: f32,
) -> StoryResult<ExportResult> {
    let surface = render_to_pixmap(background, scene, RenderOptions::default())?;
    let blob = encode_image(&surface, format, quality)?;
    tracing::info!(
        format = ?format,
        bytes = blob.len(),
        has_background = background.is_some(),
        "Image exported"
    );
    Ok(ExportResult::new(blob, format.extension(), format.mime()))
}

/// Everything a video export needs, owned so it can move to a worker.
#[derive(Clone)]
pub struct VideoExportJob {
    /// Source video file.
    pub source: PathBuf,

    pub probe: VideoProbe,

    pub trim: TrimRange,

    /// Overlay drawn over every frame.
    pub layout: StoryLayout,

    pub typeface: Arc<dyn Typeface>,

    pub settings: ExportDefaults,
}

impl std::fmt::Debug for VideoExportJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoExportJob")
            .field("source", &self.source)
            .field("probe", &self.probe)
            .field("trim", &self.trim)
            .field("typeface", &self.typeface.name())
            .finish()
    }
}

impl VideoExportJob {
    pub fn compositor(&self) -> VideoCompositor {
        VideoCompositor::new(
            &self.layout.canvas,
            self.settings.fps,
            self.trim,
            Duration::from_millis(self.settings.frame_timeout_ms),
        )
    }
}

/// Decoder and encoder for one export.
pub struct VideoPipeline {
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
}

/// Start ffmpeg for decoding and encoding. The codec is chosen first, so a
/// rejected WebM output fails before any process is spawned for frames.
pub fn ffmpeg_pipeline(job: &VideoExportJob) -> StoryResult<VideoPipeline> {
    let settings = &job.settings;
    let codec = select_codec(&settings.ffmpeg, settings.reject_webm_output)?;
    let canvas = job.layout.canvas;
    let sink = FfmpegEncoder::spawn(&EncoderSettings {
        ffmpeg: settings.ffmpeg.clone(),
        width: canvas.width,
        height: canvas.height,
        fps: settings.fps,
        codec,
        bitrate_kbps: settings.video_bitrate_kbps,
    })?;
    let source = FfmpegFrameSource::spawn(
        &settings.ffmpeg,
        &job.source,
        &job.probe,
        job.trim.start(),
        job.trim.span(),
        settings.fps,
    )?;
    Ok(VideoPipeline {
        source: Box::new(source),
        sink: Box::new(sink),
    })
}

/// Compose `job` through `pipeline` on the current thread.
///
/// Returns `Ok(None)` when `cancel` fired.
pub fn compose_video(
    job: &VideoExportJob,
    pipeline: &mut VideoPipeline,
    cancel: &CancellationToken,
    progress: Option<&ProgressCallback>,
) -> StoryResult<Option<ExportResult>> {
    let scene = StoryScene::new(&job.layout, job.typeface.as_ref());
    let bytes = job.compositor().run(
        pipeline.source.as_mut(),
        pipeline.sink.as_mut(),
        &scene,
        cancel,
        progress,
    )?;
    let sink = &pipeline.sink;
    Ok(bytes.map(|blob| ExportResult::new(blob, sink.extension(), sink.mime())))
}

/// Export `job` with ffmpeg.
///
/// Dropping the returned future cancels the export.
pub async fn export_video(
    job: VideoExportJob,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> StoryResult<Option<ExportResult>> {
    run_export(job, cancel, progress, ffmpeg_pipeline, ()).await
}

/// Export `job` through a caller-supplied pipeline.
pub async fn export_video_with(
    job: VideoExportJob,
    pipeline: VideoPipeline,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> StoryResult<Option<ExportResult>> {
    run_export(job, cancel, progress, move |_| Ok(pipeline), ()).await
}

/// Turn a cancelled export into [`StoryError::Cancelled`], for hosts that
/// funnel every outcome through one error path.
pub fn require_completed(outcome: StoryResult<Option<ExportResult>>) -> StoryResult<ExportResult> {
    outcome?.ok_or(StoryError::Cancelled)
}

/// Run the export on a blocking worker.
///
/// `hold` is dropped on the worker once the pipeline is closed, so anything
/// it guards outlives the decoder and encoder even when this future is
/// dropped early. Dropping the future cancels `cancel`.
pub(crate) async fn run_export<F, H>(
    job: VideoExportJob,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    open: F,
    hold: H,
) -> StoryResult<Option<ExportResult>>
where
    F: FnOnce(&VideoExportJob) -> StoryResult<VideoPipeline> + Send + 'static,
    H: Send + 'static,
{
    tracing::info!(
        source = %job.source.display(),
        start = job.trim.start(),
        end = job.trim.end(),
        fps = job.settings.fps,
        "Starting video export"
    );

    let abandon = cancel.clone().drop_guard();
    let worker = tokio::task::spawn_blocking(move || {
        let _hold = hold;
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let mut pipeline = open(&job)?;
        compose_video(&job, &mut pipeline, &cancel, progress.as_ref())
    });
    let result = worker
        .await
        .map_err(|e| StoryError::export(format!("export task failed: {e}")));
    abandon.disarm();
    result?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::FrameError;
    use crate::typeface::BlockTypeface;
    use storykit_layout::{compute_layout, MonospaceMeasure, StoryStyle};
    use storykit_story_model::{CanvasSpec, Layout, Metrics};
    use tiny_skia::Color;

    fn story_layout() -> StoryLayout {
        let metrics = Metrics {
            title: "Costas e bíceps".into(),
            date: "05/03/2024".into(),
            volume: 12_340.0,
            total_time: 3_600.0,
            kcal: 363.0,
            team_count: 2,
        };
        compute_layout(
            &Layout::RightStack,
            &metrics,
            &CanvasSpec::STORY,
            &StoryStyle::default(),
            &MonospaceMeasure::default(),
        )
    }

    fn job() -> VideoExportJob {
        let mut trim = TrimRange::for_duration(5.0, 60.0).unwrap();
        trim.set(1.0, 1.1);
        VideoExportJob {
            source: PathBuf::from("clip.mp4"),
            probe: VideoProbe {
                width: 640,
                height: 360,
                duration: 5.0,
            },
            trim,
            layout: story_layout(),
            typeface: Arc::new(BlockTypeface::default()),
            settings: ExportDefaults::default(),
        }
    }

    struct GreySource;

    impl FrameSource for GreySource {
        fn frame_at(
            &mut self,
            _time_secs: f64,
            _timeout: Duration,
            _cancel: &CancellationToken,
        ) -> Result<Pixmap, FrameError> {
            let mut frame = Pixmap::new(64, 36).ok_or(FrameError::Source("alloc".into()))?;
            frame.fill(Color::from_rgba8(90, 90, 90, 255));
            Ok(frame)
        }

        fn close(&mut self) {}
    }

    struct MemorySink {
        frames: usize,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, _frame: &Pixmap) -> StoryResult<()> {
            self.frames += 1;
            Ok(())
        }

        fn finish(&mut self) -> StoryResult<Vec<u8>> {
            Ok(vec![0; self.frames])
        }

        fn abort(&mut self) {}

        fn mime(&self) -> &str {
            "video/webm"
        }

        fn extension(&self) -> &str {
            "webm"
        }
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(
            export_filename("jpg", 1_709_647_200_000),
            "irontracks-story-1709647200000.jpg"
        );
    }

    #[test]
    fn test_jpeg_quality_percent_clamps() {
        assert_eq!(jpeg_quality_percent(0.92), 92);
        assert_eq!(jpeg_quality_percent(0.0), 1);
        assert_eq!(jpeg_quality_percent(3.0), 100);
        assert_eq!(jpeg_quality_percent(f32::NAN), 92);
    }

    #[test]
    fn test_image_format_parsing() {
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert!("gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_image_export_round_trips_at_story_size() {
        let layout = story_layout();
        let face = BlockTypeface::default();
        let scene = StoryScene::new(&layout, &face);

        for format in [ImageFormat::Jpeg, ImageFormat::Png] {
            let result = export_image(None, &scene, format, 0.92).unwrap();
            assert_eq!(result.mime, format.mime());
            assert!(result.filename.starts_with("irontracks-story-"));
            assert!(result.filename.ends_with(format.extension()));

            let decoded = image::load_from_memory(&result.blob).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
        }
    }

    #[test]
    fn test_image_export_draws_background() {
        let layout = story_layout();
        let face = BlockTypeface::default();
        let scene = StoryScene::new(&layout, &face);
        let mut background = Pixmap::new(40, 30).unwrap();
        background.fill(Color::from_rgba8(200, 20, 20, 255));

        let result = export_image(Some(background.as_ref()), &scene, ImageFormat::Png, 1.0).unwrap();
        let decoded = image::load_from_memory(&result.blob).unwrap().to_rgba8();
        // The top of the canvas is above the legibility gradient.
        let px = decoded.get_pixel(540, 100);
        assert!(px[0] > 150 && px[1] < 60, "unexpected pixel {px:?}");
    }

    #[tokio::test]
    async fn test_video_export_with_custom_pipeline() {
        let pipeline = VideoPipeline {
            source: Box::new(GreySource),
            sink: Box::new(MemorySink { frames: 0 }),
        };
        let result = export_video_with(job(), pipeline, CancellationToken::new(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.blob.len(), 3);
        assert_eq!(result.mime, "video/webm");
        assert!(result.filename.ends_with(".webm"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_opens_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = run_export(
            job(),
            cancel,
            None,
            |_| Err(StoryError::export("pipeline must not open")),
            (),
        )
        .await
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_require_completed_maps_cancellation() {
        let err = require_completed(Ok(None)).unwrap_err();
        assert!(err.is_user_cancellation());

        let done = ExportResult::new(vec![7], "mp4", "video/mp4");
        assert_eq!(require_completed(Ok(Some(done.clone()))).unwrap(), done);

        let err = require_completed(Err(StoryError::export("boom"))).unwrap_err();
        assert!(!err.is_user_cancellation());
    }

    #[tokio::test]
    async fn test_dropped_export_future_cancels_worker() {
        struct SlowSource;

        impl FrameSource for SlowSource {
            fn frame_at(
                &mut self,
                _time_secs: f64,
                _timeout: Duration,
                _cancel: &CancellationToken,
            ) -> Result<Pixmap, FrameError> {
                std::thread::sleep(Duration::from_millis(10));
                Pixmap::new(8, 8).ok_or(FrameError::Source("alloc".into()))
            }

            fn close(&mut self) {}
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        struct Released(std::sync::mpsc::Sender<()>);
        impl Drop for Released {
            fn drop(&mut self) {
                let _ = self.0.send(());
            }
        }

        let pipeline = VideoPipeline {
            source: Box::new(SlowSource),
            sink: Box::new(MemorySink { frames: 0 }),
        };
        let mut long = job();
        long.trim.set(1.0, 3.0);
        let export = run_export(
            long,
            cancel.clone(),
            None,
            move |_| Ok(pipeline),
            Released(done_tx),
        );
        let timed_out = tokio::time::timeout(Duration::from_millis(40), export).await;
        assert!(timed_out.is_err());
        assert!(cancel.is_cancelled());

        // The worker stops at the next frame and only then releases `hold`.
        let released = tokio::task::spawn_blocking(move || done_rx.recv_timeout(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(released.is_ok());
    }
}
