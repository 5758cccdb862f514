//! Background media loading.
//!
//! Loads are ordered by a monotonically increasing id. A load that finishes
//! after a newer one started is discarded, so a slow video probe can never
//! replace an image the user picked afterwards.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use storykit_common::config::WebmPolicy;
use storykit_common::error::{StoryError, StoryResult};
use storykit_story_model::{MediaAdvisory, MediaFile, MediaKind};
use tiny_skia::Pixmap;

use crate::cover::pixmap_from_rgba;
use crate::ffmpeg::{probe_video, VideoProbe};

/// Decodes images and probes videos.
pub trait MediaDecoder: Send + Sync {
    fn decode_image(&self, path: &Path) -> StoryResult<Pixmap>;

    fn probe_video(&self, path: &Path) -> StoryResult<VideoProbe>;
}

/// Images through the `image` crate, video metadata through `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegMediaDecoder {
    ffprobe: PathBuf,
}

impl FfmpegMediaDecoder {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

impl MediaDecoder for FfmpegMediaDecoder {
    fn decode_image(&self, path: &Path) -> StoryResult<Pixmap> {
        let image = image::ImageReader::open(path)
            .map_err(|e| StoryError::decode(format!("failed opening {}: {e}", path.display())))?
            .with_guessed_format()
            .map_err(|e| StoryError::decode(format!("failed reading {}: {e}", path.display())))?
            .decode()
            .map_err(|e| StoryError::decode(format!("failed decoding {}: {e}", path.display())))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        pixmap_from_rgba(width, height, image.into_raw())
    }

    fn probe_video(&self, path: &Path) -> StoryResult<VideoProbe> {
        probe_video(&self.ffprobe, path)
    }
}

/// Counts live [`MediaHandle`]s.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, path: &Path) -> MediaHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(handle = id, path = %path.display(), "Media handle claimed");
        MediaHandle {
            id,
            path: path.to_path_buf(),
            live: self.live.clone(),
        }
    }

    /// Handles not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Claim on a loaded file, released on drop.
#[derive(Debug)]
pub struct MediaHandle {
    id: u64,
    path: PathBuf,
    live: Arc<AtomicUsize>,
}

impl MediaHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(handle = self.id, "Media handle released");
    }
}

/// Decoded payload of a source.
#[derive(Debug, Clone)]
pub enum MediaContent {
    Image(Arc<Pixmap>),
    Video(VideoProbe),
}

/// The current background.
#[derive(Debug)]
pub struct MediaSource {
    pub kind: MediaKind,
    pub file: MediaFile,
    pub handle: MediaHandle,
    pub content: MediaContent,
}

impl MediaSource {
    pub fn duration(&self) -> Option<f64> {
        match &self.content {
            MediaContent::Video(probe) => Some(probe.duration),
            MediaContent::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&Pixmap> {
        match &self.content {
            MediaContent::Image(pixmap) => Some(pixmap),
            MediaContent::Video(_) => None,
        }
    }

    pub fn video(&self) -> Option<&VideoProbe> {
        match &self.content {
            MediaContent::Video(probe) => Some(probe),
            MediaContent::Image(_) => None,
        }
    }
}

/// Identity of one load; stale once a newer load begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// A committed load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub source: Arc<MediaSource>,
    pub advisory: Option<MediaAdvisory>,
}

/// Owns the current background and orders loads.
pub struct MediaLoader {
    decoder: Arc<dyn MediaDecoder>,
    registry: HandleRegistry,
    webm_policy: WebmPolicy,
    sequence: AtomicU64,
    current: Mutex<Option<Arc<MediaSource>>>,
}

impl MediaLoader {
    pub fn new(decoder: Arc<dyn MediaDecoder>, webm_policy: WebmPolicy) -> Self {
        Self {
            decoder,
            registry: HandleRegistry::new(),
            webm_policy,
            sequence: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn current(&self) -> Option<Arc<MediaSource>> {
        self.current.lock().clone()
    }

    /// Start a load, invalidating every earlier ticket.
    pub fn begin(&self) -> LoadTicket {
        LoadTicket(self.sequence.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.sequence.load(Ordering::Acquire) == ticket.0
    }

    /// Install `source` if `ticket` is still current. A stale source is
    /// dropped, releasing its handle.
    pub fn commit(&self, ticket: LoadTicket, source: MediaSource) -> Option<Arc<MediaSource>> {
        let mut current = self.current.lock();
        if !self.is_current(ticket) {
            tracing::debug!(
                ticket = ticket.0,
                file = %source.file.display_name(),
                "Discarding stale media load"
            );
            return None;
        }
        let source = Arc::new(source);
        // The previous source's handle is released once no export holds it.
        *current = Some(source.clone());
        Some(source)
    }

    /// Classify, decode and install `file`.
    ///
    /// Returns `Ok(None)` when a newer load superseded this one. Errors leave
    /// the current background untouched.
    pub async fn load(&self, file: MediaFile) -> StoryResult<Option<LoadOutcome>> {
        let kind = file.classify()?;
        let advisory = file.advisory();
        if let Some(advisory) = advisory {
            match self.webm_policy {
                WebmPolicy::Block => return Err(StoryError::risky_format(advisory.message())),
                WebmPolicy::Warn => {
                    tracing::warn!(file = %file.display_name(), "{}", advisory.message());
                }
            }
        }

        let ticket = self.begin();
        let handle = self.registry.claim(&file.path);
        tracing::debug!(ticket = ticket.0, kind = ?kind, file = %file.display_name(), "Loading media");

        let decoder = self.decoder.clone();
        let path = file.path.clone();
        let decoded = tokio::task::spawn_blocking(move || match kind {
            MediaKind::Image => decoder.decode_image(&path).map(|p| MediaContent::Image(Arc::new(p))),
            MediaKind::Video => decoder.probe_video(&path).map(MediaContent::Video),
        })
        .await
        .map_err(|e| StoryError::decode(format!("media task failed: {e}")));

        let content = match decoded.and_then(|r| r) {
            Ok(content) => content,
            Err(_) if !self.is_current(ticket) => return Ok(None),
            Err(e) => {
                tracing::warn!(file = %file.display_name(), error = %e, "Media load failed");
                return Err(e);
            }
        };

        let source = MediaSource {
            kind,
            file,
            handle,
            content,
        };
        Ok(self
            .commit(ticket, source)
            .map(|source| LoadOutcome {
                ticket,
                source,
                advisory,
            }))
    }

    /// Drop the current background and invalidate in-flight loads.
    pub fn release(&self) {
        self.begin();
        if self.current.lock().take().is_some() {
            tracing::debug!("Released background media");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FakeDecoder {
        video_delay: Duration,
    }

    impl MediaDecoder for FakeDecoder {
        fn decode_image(&self, path: &Path) -> StoryResult<Pixmap> {
            if path.to_string_lossy().contains("broken") {
                return Err(StoryError::decode("bad image"));
            }
            Pixmap::new(4, 4).ok_or_else(|| StoryError::decode("alloc"))
        }

        fn probe_video(&self, _path: &Path) -> StoryResult<VideoProbe> {
            std::thread::sleep(self.video_delay);
            Ok(VideoProbe {
                width: 1920,
                height: 1080,
                duration: 42.0,
            })
        }
    }

    fn loader(delay_ms: u64, policy: WebmPolicy) -> MediaLoader {
        MediaLoader::new(
            Arc::new(FakeDecoder {
                video_delay: Duration::from_millis(delay_ms),
            }),
            policy,
        )
    }

    #[tokio::test]
    async fn test_stale_video_load_is_discarded() {
        let loader = loader(200, WebmPolicy::Warn);
        let (slow, fast) = tokio::join!(loader.load(MediaFile::new("a.mp4")), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            loader.load(MediaFile::new("b.jpg")).await
        });

        assert!(slow.unwrap().is_none());
        assert!(fast.unwrap().is_some());
        let current = loader.current().unwrap();
        assert_eq!(current.kind, MediaKind::Image);
        assert!(current.image().is_some());
        drop(current);
        assert_eq!(loader.registry().live(), 1);
    }

    #[tokio::test]
    async fn test_failed_decode_keeps_previous_background() {
        let loader = loader(0, WebmPolicy::Warn);
        loader.load(MediaFile::new("ok.png")).await.unwrap();
        let err = loader.load(MediaFile::new("broken.png")).await.unwrap_err();
        assert!(matches!(err, StoryError::Decode { .. }));
        assert_eq!(
            loader.current().unwrap().file.path,
            PathBuf::from("ok.png")
        );
    }

    #[tokio::test]
    async fn test_replacing_releases_previous_handle() {
        let loader = loader(0, WebmPolicy::Warn);
        loader.load(MediaFile::new("one.png")).await.unwrap();
        loader.load(MediaFile::new("two.mov")).await.unwrap();
        assert_eq!(loader.registry().live(), 1);
        assert_eq!(loader.current().unwrap().duration(), Some(42.0));
        loader.release();
        assert_eq!(loader.registry().live(), 0);
        assert!(loader.current().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_and_blocked_files_are_rejected() {
        let loader = loader(0, WebmPolicy::Block);
        let err = loader.load(MediaFile::new("notes.txt")).await.unwrap_err();
        assert!(matches!(err, StoryError::UnsupportedMedia { .. }));
        let err = loader.load(MediaFile::new("clip.webm")).await.unwrap_err();
        assert!(matches!(err, StoryError::RiskyFormat { .. }));
        assert_eq!(loader.registry().live(), 0);
    }

    #[tokio::test]
    async fn test_webm_warns_but_loads_under_warn_policy() {
        let loader = loader(0, WebmPolicy::Warn);
        let outcome = loader.load(MediaFile::new("clip.webm")).await.unwrap().unwrap();
        assert_eq!(outcome.advisory, Some(MediaAdvisory::WebmPlayback));
    }
}
