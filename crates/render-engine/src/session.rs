//! One story composition: media slot, layout, positions, trim, preview
//! gating and the in-flight export.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use storykit_common::config::StoryConfig;
use storykit_common::error::{StoryError, StoryResult};
use storykit_layout::{
    compute_layout, piece_sizes, ContainerSize, DragController, NoCapture, PieceSizes,
    PointerCapture, ScreenPoint, StoryLayout, StoryStyle,
};
use storykit_story_model::{
    CanvasSpec, FracPoint, Layout, LayoutId, LivePositions, MediaFile, Metrics, PieceKey,
    SessionRecord, TrimRange,
};
use tiny_skia::Pixmap;
use tokio_util::sync::CancellationToken;

use crate::canvas::{render_to_pixmap, RenderOptions, StoryScene};
use crate::export::{
    export_image, ffmpeg_pipeline, run_export, ExportResult, ImageFormat, ProgressCallback,
    VideoExportJob, VideoPipeline,
};
use crate::media::{FfmpegMediaDecoder, LoadOutcome, MediaDecoder, MediaLoader, MediaSource};
use crate::preview::{PlaybackSurface, SharedTrimController, TrimController};
use crate::typeface::Typeface;

struct Composition {
    metrics: Metrics,
    layout_id: LayoutId,
    positions: LivePositions,
    drag: DragController,
    capture: Box<dyn PointerCapture + Send>,
    trim: Option<TrimRange>,
    /// Handle id of the media `trim` belongs to.
    trim_media: Option<u64>,
    preview: Option<SharedTrimController>,
}

/// The object a host drives for one composition.
pub struct StorySession {
    config: StoryConfig,
    canvas: CanvasSpec,
    style: StoryStyle,
    typeface: Arc<dyn Typeface>,
    loader: MediaLoader,
    state: Mutex<Composition>,
    exporting: Arc<AtomicUsize>,
    export_token: Mutex<Option<CancellationToken>>,
}

impl StorySession {
    /// Compose a story for `record` with the production decoder.
    pub fn new(config: StoryConfig, record: &SessionRecord, typeface: Arc<dyn Typeface>) -> Self {
        let decoder = Arc::new(FfmpegMediaDecoder::new(config.export.ffprobe.clone()));
        Self::with_decoder(config, Metrics::from_session(record), typeface, decoder)
    }

    pub fn with_decoder(
        config: StoryConfig,
        metrics: Metrics,
        typeface: Arc<dyn Typeface>,
        decoder: Arc<dyn MediaDecoder>,
    ) -> Self {
        tracing::debug!(title = %metrics.title, volume = metrics.volume, "Composition opened");
        Self {
            canvas: CanvasSpec::from(&config.canvas),
            style: StoryStyle::default(),
            typeface,
            loader: MediaLoader::new(decoder, config.media.webm_policy),
            state: Mutex::new(Composition {
                metrics,
                layout_id: LayoutId::default(),
                positions: LivePositions::default(),
                drag: DragController::new(),
                capture: Box::new(NoCapture),
                trim: None,
                trim_media: None,
                preview: None,
            }),
            exporting: Arc::new(AtomicUsize::new(0)),
            export_token: Mutex::new(None),
            config,
        }
    }

    /// Route pointer capture through the host's input system.
    pub fn set_pointer_capture(&self, capture: Box<dyn PointerCapture + Send>) {
        let mut state = self.state.lock();
        let state = &mut *state;
        state.drag.cancel(state.capture.as_mut());
        state.capture = capture;
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn canvas(&self) -> CanvasSpec {
        self.canvas
    }

    pub fn metrics(&self) -> Metrics {
        self.state.lock().metrics.clone()
    }

    /// Apply a calorie estimate that arrived after the session opened.
    pub fn apply_kcal_estimate(&self, estimate: Option<f64>) -> Metrics {
        let mut state = self.state.lock();
        state.metrics = state.metrics.with_kcal_estimate(estimate);
        tracing::debug!(kcal = state.metrics.kcal, "Calorie estimate applied");
        state.metrics.clone()
    }

    /// Load a background. A video gets a fresh default trim range.
    ///
    /// `Ok(None)` means a newer selection superseded this one.
    pub async fn select_media(&self, file: MediaFile) -> StoryResult<Option<LoadOutcome>> {
        let loaded = self.loader.load(file).await;
        self.settle_load(loaded)
    }

    /// Bring trim and preview in line with whatever background is current,
    /// then hand back `loaded` only if no newer load has started.
    fn settle_load(
        &self,
        loaded: StoryResult<Option<LoadOutcome>>,
    ) -> StoryResult<Option<LoadOutcome>> {
        let mut state = self.state.lock();
        self.follow_current_media(&mut state);
        match loaded? {
            Some(outcome) if self.loader.is_current(outcome.ticket) => Ok(Some(outcome)),
            Some(outcome) => {
                tracing::debug!(
                    file = %outcome.source.file.display_name(),
                    "Selection superseded before it settled"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn follow_current_media(&self, state: &mut Composition) {
        let current = self.loader.current();
        let media_id = current.as_ref().map(|m| m.handle.id());
        if state.trim_media == media_id {
            return;
        }
        state.trim_media = media_id;
        state.trim = current
            .as_ref()
            .and_then(|m| m.duration())
            .and_then(|d| TrimRange::for_duration(d, self.config.media.default_trim_secs));
        // The old surface plays the old file.
        if let Some(preview) = state.preview.take() {
            preview.lock().stop_preview();
        }
        if let Some(media) = &current {
            tracing::info!(
                kind = ?media.kind,
                file = %media.file.display_name(),
                trim_end = ?state.trim.map(|t| t.end()),
                "Background selected"
            );
        }
    }

    pub fn media(&self) -> Option<Arc<MediaSource>> {
        self.loader.current()
    }

    /// Live media handles, for leak checks.
    pub fn live_media_handles(&self) -> usize {
        self.loader.registry().live()
    }

    /// Switch layout; unknown ids fall back to `bottom-row`.
    pub fn set_layout(&self, raw: &str) -> LayoutId {
        let id = LayoutId::parse_lenient(raw);
        let mut state = self.state.lock();
        let state = &mut *state;
        if id != LayoutId::Live {
            state.drag.cancel(state.capture.as_mut());
        }
        state.layout_id = id;
        tracing::debug!(layout = %id, "Layout selected");
        id
    }

    pub fn layout_id(&self) -> LayoutId {
        self.state.lock().layout_id
    }

    pub fn layout(&self) -> Layout {
        let state = self.state.lock();
        Layout::from_layout_id(state.layout_id, &state.positions)
    }

    /// Pixel boxes for the current layout and metrics.
    pub fn story_layout(&self) -> StoryLayout {
        let (layout, metrics) = {
            let state = self.state.lock();
            (
                Layout::from_layout_id(state.layout_id, &state.positions),
                state.metrics.clone(),
            )
        };
        let measure: &dyn Typeface = self.typeface.as_ref();
        compute_layout(&layout, &metrics, &self.canvas, &self.style, &measure)
    }

    pub fn positions(&self) -> LivePositions {
        self.state.lock().positions.clone()
    }

    /// Replace positions, clamping each piece onto the canvas.
    pub fn set_positions(&self, positions: LivePositions) {
        let sizes = self.piece_sizes();
        let mut state = self.state.lock();
        for (key, point) in positions.iter() {
            state.positions.set(key, point.clamped(sizes.get(key)));
        }
    }

    pub fn reset_positions(&self) {
        let mut state = self.state.lock();
        let state = &mut *state;
        state.drag.reset(&mut state.positions, state.capture.as_mut());
    }

    pub fn piece_sizes(&self) -> PieceSizes {
        let metrics = self.state.lock().metrics.clone();
        let measure: &dyn Typeface = self.typeface.as_ref();
        piece_sizes(&metrics, &self.canvas, &self.style, &measure)
    }

    /// Start dragging `piece`. Only the live layout accepts drags.
    pub fn begin_drag(&self, piece: PieceKey, pointer_id: u64, at: ScreenPoint) -> bool {
        let mut state = self.state.lock();
        if state.layout_id != LayoutId::Live {
            return false;
        }
        let state = &mut *state;
        state
            .drag
            .begin(piece, pointer_id, at, &state.positions, state.capture.as_mut())
    }

    pub fn drag_to(
        &self,
        piece: PieceKey,
        pointer_id: u64,
        at: ScreenPoint,
        container: ContainerSize,
    ) -> Option<FracPoint> {
        let sizes = self.piece_sizes();
        let mut state = self.state.lock();
        let state = &mut *state;
        state
            .drag
            .update(piece, pointer_id, at, container, &sizes, &mut state.positions)
    }

    pub fn end_drag(&self, piece: PieceKey, pointer_id: u64) -> bool {
        let mut state = self.state.lock();
        let state = &mut *state;
        state.drag.end(piece, pointer_id, state.capture.as_mut())
    }

    /// Edit the trim range. `None` without a video background.
    pub fn set_trim(&self, start: f64, end: f64) -> Option<TrimRange> {
        let mut state = self.state.lock();
        let trim = state.trim.as_mut()?;
        trim.set(start, end);
        let trim = *trim;
        if let Some(preview) = &state.preview {
            preview.lock().sync_range(trim);
        }
        Some(trim)
    }

    pub fn trim(&self) -> Option<TrimRange> {
        self.state.lock().trim
    }

    /// Bind a player for trim preview. `None` without a video background.
    pub fn attach_preview(&self, surface: Box<dyn PlaybackSurface>) -> Option<SharedTrimController> {
        let mut state = self.state.lock();
        let trim = state.trim?;
        let controller = TrimController::new(trim, surface).shared();
        if self.is_exporting() {
            controller.lock().suspend();
        }
        if let Some(previous) = state.preview.replace(controller.clone()) {
            previous.lock().stop_preview();
        }
        Some(controller)
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire) > 0
    }

    /// Current story over the current image background. `None` while a
    /// video export is running.
    pub fn render_preview(&self) -> StoryResult<Option<Pixmap>> {
        if self.is_exporting() {
            return Ok(None);
        }
        let layout = self.story_layout();
        let media = self.loader.current();
        let background = media.as_ref().and_then(|m| m.image()).map(Pixmap::as_ref);
        let scene = StoryScene::new(&layout, self.typeface.as_ref());
        render_to_pixmap(background, &scene, RenderOptions::default()).map(Some)
    }

    pub fn export_image(&self, format: ImageFormat) -> StoryResult<ExportResult> {
        let layout = self.story_layout();
        let media = self.loader.current();
        let background = media.as_ref().and_then(|m| m.image()).map(Pixmap::as_ref);
        let scene = StoryScene::new(&layout, self.typeface.as_ref());
        export_image(background, &scene, format, self.config.export.jpeg_quality)
    }

    /// Re-encode the trimmed video with the overlay, using ffmpeg.
    ///
    /// Cancels any export still running. `Ok(None)` when cancelled. Dropping
    /// the future cancels too; the session reports exporting, and keeps the
    /// preview suspended, until the worker has shut the pipeline down.
    pub async fn export_video(
        &self,
        progress: Option<ProgressCallback>,
    ) -> StoryResult<Option<ExportResult>> {
        let (job, media, cancel) = self.prepare_video_export()?;
        let guard = ExportingGuard::enter(self.exporting.clone(), self.preview());
        run_export(job, cancel, progress, ffmpeg_pipeline, (guard, media)).await
    }

    /// Like [`export_video`](Self::export_video) with a caller-supplied
    /// decoder and encoder.
    pub async fn export_video_with(
        &self,
        pipeline: VideoPipeline,
        progress: Option<ProgressCallback>,
    ) -> StoryResult<Option<ExportResult>> {
        let (job, media, cancel) = self.prepare_video_export()?;
        let guard = ExportingGuard::enter(self.exporting.clone(), self.preview());
        run_export(job, cancel, progress, move |_| Ok(pipeline), (guard, media)).await
    }

    /// Cancel the running export, if any.
    pub fn cancel_export(&self) -> bool {
        match self.export_token.lock().take() {
            Some(token) => {
                token.cancel();
                tracing::info!("Export cancellation requested");
                true
            }
            None => false,
        }
    }

    /// End the composition: cancel export, release media, reset positions.
    pub fn close(&self) {
        self.cancel_export();
        {
            let mut state = self.state.lock();
            let state = &mut *state;
            if let Some(preview) = state.preview.take() {
                preview.lock().stop_preview();
            }
            state.trim = None;
            state.trim_media = None;
            state.drag.reset(&mut state.positions, state.capture.as_mut());
            state.layout_id = LayoutId::default();
        }
        self.loader.release();
        tracing::debug!("Composition closed");
    }

    fn preview(&self) -> Option<SharedTrimController> {
        self.state.lock().preview.clone()
    }

    fn prepare_video_export(
        &self,
    ) -> StoryResult<(VideoExportJob, Arc<MediaSource>, CancellationToken)> {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.export_token.lock().replace(cancel.clone()) {
            previous.cancel();
            tracing::debug!("Cancelled previous export");
        }

        let media = self
            .loader
            .current()
            .ok_or_else(|| StoryError::unsupported_media("Selecione um vídeo para exportar"))?;
        let probe = *media
            .video()
            .ok_or_else(|| StoryError::unsupported_media("O fundo atual não é um vídeo"))?;
        let trim = self
            .trim()
            .ok_or_else(|| StoryError::export("video has no trim range"))?;

        let job = VideoExportJob {
            source: media.file.path.clone(),
            probe,
            trim,
            layout: self.story_layout(),
            typeface: self.typeface.clone(),
            settings: self.config.export.clone(),
        };
        Ok((job, media, cancel))
    }
}

impl Drop for StorySession {
    fn drop(&mut self) {
        self.cancel_export();
    }
}

/// Marks an export in flight and holds the preview suspended.
struct ExportingGuard {
    count: Arc<AtomicUsize>,
    preview: Option<SharedTrimController>,
}

impl ExportingGuard {
    fn enter(count: Arc<AtomicUsize>, preview: Option<SharedTrimController>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        if let Some(preview) = &preview {
            preview.lock().suspend();
        }
        Self { count, preview }
    }
}

impl Drop for ExportingGuard {
    fn drop(&mut self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            if let Some(preview) = &self.preview {
                preview.lock().resume();
            }
        }
    }
}
