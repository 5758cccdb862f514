//! ffmpeg/ffprobe process plumbing: metadata probe, frame decoder and
//! raw-RGBA encoder.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use storykit_common::error::{StoryError, StoryResult};
use tiny_skia::Pixmap;
use tokio_util::sync::CancellationToken;

use crate::compositor::{FrameError, FrameSink, FrameSource};
use crate::cover::{pixmap_from_rgba, pixmap_to_rgba};
use crate::encoder_selection::VideoCodec;

/// Longest side of decoded source frames; larger videos are scaled down.
const MAX_DECODE_EDGE: u32 = 1920;

/// Decoded frames buffered ahead of the compositor.
const FRAME_QUEUE_DEPTH: usize = 4;

/// Shortest wait between cancellation checks while a frame is pending.
const MIN_RECV_SLICE: Duration = Duration::from_millis(5);

/// Metadata read by `ffprobe` without decoding any frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
}

/// Whether `binary` runs.
pub fn command_exists(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Read dimensions and duration of the first video stream.
pub fn probe_video(ffprobe: &Path, path: &Path) -> StoryResult<VideoProbe> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,duration:stream_tags=rotate:stream_side_data=rotation:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| StoryError::decode(format!("failed to run {}: {e}", ffprobe.display())))?;

    if !output.status.success() {
        return Err(StoryError::decode(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `ffprobe -of json` output.
///
/// Dimensions are reported as displayed: ffmpeg applies the rotation
/// metadata before any filter runs, so a 90° stream has width and height
/// swapped. The video stream's own duration wins over the container's, which
/// may include trailing audio; the container value is the fallback for muxers
/// (WebM) that leave the stream duration empty.
pub fn parse_probe_output(json: &str) -> StoryResult<VideoProbe> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let stream = value
        .get("streams")
        .and_then(|s| s.get(0))
        .ok_or_else(|| StoryError::decode("no video stream"))?;

    let dimension = |key: &str| {
        stream
            .get(key)
            .and_then(serde_json::Value::as_u64)
            .filter(|v| *v > 0)
            .map(|v| v as u32)
    };
    let (Some(stored_width), Some(stored_height)) = (dimension("width"), dimension("height")) else {
        return Err(StoryError::decode("video stream has no dimensions"));
    };
    let (width, height) = if is_quarter_turn(stream_rotation(stream)) {
        (stored_height, stored_width)
    } else {
        (stored_width, stored_height)
    };

    let seconds = |v: Option<&serde_json::Value>| {
        v.and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    };
    let duration = seconds(stream.get("duration"))
        .or_else(|| seconds(value.get("format").and_then(|f| f.get("duration"))))
        .ok_or_else(|| StoryError::decode("video has no usable duration"))?;

    Ok(VideoProbe {
        width,
        height,
        duration,
    })
}

/// Rotation in degrees from the display matrix side data, or the legacy
/// `rotate` tag.
fn stream_rotation(stream: &serde_json::Value) -> i64 {
    let side_data = stream
        .get("side_data_list")
        .and_then(serde_json::Value::as_array)
        .and_then(|list| {
            list.iter()
                .filter_map(|entry| entry.get("rotation"))
                .find_map(|r| r.as_f64().or_else(|| r.as_str()?.trim().parse().ok()))
        });
    let tag = || {
        stream
            .get("tags")
            .and_then(|t| t.get("rotate"))
            .and_then(|r| r.as_str()?.trim().parse::<f64>().ok())
    };
    side_data.or_else(tag).map(|r| r.round() as i64).unwrap_or(0)
}

fn is_quarter_turn(degrees: i64) -> bool {
    degrees.rem_euclid(180) == 90
}

/// Size frames are decoded at: source size, capped at [`MAX_DECODE_EDGE`],
/// with even dimensions.
pub fn decode_size(probe: &VideoProbe) -> (u32, u32) {
    let longest = probe.width.max(probe.height).max(1);
    let scale = (MAX_DECODE_EDGE as f64 / longest as f64).min(1.0);
    let even = |v: u32| ((v as f64 * scale).round() as u32 / 2 * 2).max(2);
    (even(probe.width), even(probe.height))
}

/// Decodes `[start, start + span]` of a video into RGBA frames at a fixed rate.
pub struct FfmpegFrameSource {
    child: Option<Child>,
    frames: Option<Receiver<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    width: u32,
    height: u32,
    start: f64,
    fps: u32,
    next_index: u64,
    last: Option<Vec<u8>>,
}

impl FfmpegFrameSource {
    pub fn spawn(
        ffmpeg: &Path,
        path: &Path,
        probe: &VideoProbe,
        start: f64,
        span: f64,
        fps: u32,
    ) -> StoryResult<Self> {
        let fps = fps.max(1);
        let (width, height) = decode_size(probe);
        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-ss", &format!("{start:.3}"), "-i"])
            .arg(path)
            .args([
                "-t",
                &format!("{span:.3}"),
                "-vf",
                &format!("fps={fps},scale={width}:{height}"),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| StoryError::export(format!("failed to start ffmpeg decoder: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StoryError::export("failed to capture ffmpeg decoder stdout"))?;

        let frame_size = width as usize * height as usize * 4;
        let (tx, rx) = mpsc::sync_channel(FRAME_QUEUE_DEPTH);
        let reader = std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut buffer = vec![0u8; frame_size];
                if reader.read_exact(&mut buffer).is_err() || tx.send(buffer).is_err() {
                    break;
                }
            }
        });

        tracing::debug!(
            pid = child.id(),
            width,
            height,
            start,
            span,
            fps,
            "ffmpeg decoder started"
        );

        Ok(Self {
            child: Some(child),
            frames: Some(rx),
            reader: Some(reader),
            width,
            height,
            start,
            fps,
            next_index: 0,
            last: None,
        })
    }

    fn recv(
        &mut self,
        time_secs: f64,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FrameError> {
        let frames = self
            .frames
            .as_ref()
            .ok_or(FrameError::Ended { time_secs })?;
        let slice = Duration::from_secs_f64(1.0 / self.fps as f64);
        let buffer = recv_frame(frames, timeout, slice, cancel, time_secs)?;
        self.next_index += 1;
        Ok(buffer)
    }
}

/// Wait up to `timeout` for the next frame, checking `cancel` every `slice`.
fn recv_frame(
    frames: &Receiver<Vec<u8>>,
    timeout: Duration,
    slice: Duration,
    cancel: &CancellationToken,
    time_secs: f64,
) -> Result<Vec<u8>, FrameError> {
    let deadline = Instant::now() + timeout;
    let slice = slice.max(MIN_RECV_SLICE);
    loop {
        if cancel.is_cancelled() {
            return Err(FrameError::Cancelled);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(FrameError::Timeout(timeout));
        }
        match frames.recv_timeout(remaining.min(slice)) {
            Ok(buffer) => return Ok(buffer),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Err(FrameError::Ended { time_secs }),
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    /// Once the decoder stops after producing frames, the last one is held
    /// for the remaining requests; the stream often ends a frame short of
    /// `ceil(span × fps)`.
    fn frame_at(
        &mut self,
        time_secs: f64,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Pixmap, FrameError> {
        let wanted = ((time_secs - self.start) * self.fps as f64).round().max(0.0) as u64;
        while self.next_index <= wanted {
            match self.recv(time_secs, timeout, cancel) {
                Ok(buffer) => self.last = Some(buffer),
                Err(FrameError::Ended { .. }) if self.last.is_some() => {
                    if self.frames.take().is_some() {
                        tracing::debug!(
                            time_secs,
                            decoded = self.next_index,
                            "Decoder ended early, holding last frame"
                        );
                    }
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        let buffer = self.last.clone().ok_or(FrameError::Ended { time_secs })?;
        pixmap_from_rgba(self.width, self.height, buffer).map_err(|e| FrameError::Source(e.to_string()))
    }

    fn close(&mut self) {
        // Dropping the receiver unblocks the reader thread.
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Encoder parameters.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub ffmpeg: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: VideoCodec,
    pub bitrate_kbps: u32,
}

/// ffmpeg reading raw RGBA frames on stdin into a temporary file.
pub struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    output: PathBuf,
    codec: VideoCodec,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn spawn(settings: &EncoderSettings) -> StoryResult<Self> {
        let output = temp_output_path(settings.codec.extension());
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", settings.width, settings.height),
            "-r".to_string(),
            settings.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
        ];
        args.extend(settings.codec.codec_args(settings.fps, settings.bitrate_kbps));
        args.push(output.to_string_lossy().into_owned());

        tracing::debug!(args = ?args, "Starting ffmpeg encoder");
        let mut child = Command::new(&settings.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StoryError::export(format!("failed to start ffmpeg encoder: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoryError::export("failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StoryError::export("failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            output,
            codec: settings.codec,
            frames_written: 0,
        })
    }

    fn take_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }

    fn remove_output(&self) {
        if let Err(e) = std::fs::remove_file(&self.output) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.output.display(), error = %e, "Failed to delete encoder output");
            }
        }
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Pixmap) -> StoryResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StoryError::export("encoder already closed"))?;
        stdin
            .write_all(&pixmap_to_rgba(frame))
            .map_err(|e| StoryError::export(format!("failed writing frame to ffmpeg: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> StoryResult<Vec<u8>> {
        // Closing stdin signals end of input.
        drop(self.stdin.take());
        let child = self.child.take();
        let status = match child {
            Some(mut child) => child
                .wait()
                .map_err(|e| StoryError::export(format!("failed to wait on ffmpeg: {e}")))?,
            None => return Err(StoryError::export("encoder already closed")),
        };
        let stderr = self.take_stderr();

        if !status.success() {
            self.remove_output();
            return Err(StoryError::export(format!(
                "ffmpeg encode failed (status {status}): {}",
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(&self.output);
        self.remove_output();
        let bytes = bytes?;
        tracing::debug!(
            frames = self.frames_written,
            bytes = bytes.len(),
            "ffmpeg encoder finished"
        );
        Ok(bytes)
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.take_stderr();
        self.remove_output();
    }

    fn mime(&self) -> &str {
        self.codec.mime()
    }

    fn extension(&self) -> &str {
        self.codec.extension()
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn temp_output_path(extension: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "storykit-export-{}-{nanos}.{extension}",
        std::process::id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_prefers_stream_duration() {
        let json = r#"{
            "streams": [{"width": 1920, "height": 1080, "duration": "10.000000"}],
            "format": {"duration": "10.050000"}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!(
            probe,
            VideoProbe {
                width: 1920,
                height: 1080,
                duration: 10.0
            }
        );
    }

    #[test]
    fn test_parse_probe_falls_back_to_container_duration() {
        let json = r#"{"streams": [{"width": 720, "height": 1280}], "format": {"duration": "4.2"}}"#;
        assert_eq!(parse_probe_output(json).unwrap().duration, 4.2);
    }

    #[test]
    fn test_parse_probe_reports_displayed_size_of_rotated_stream() {
        let display_matrix = r#"{
            "streams": [{
                "width": 1920, "height": 1080, "duration": "12.0",
                "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
            }],
            "format": {"duration": "12.0"}
        }"#;
        let probe = parse_probe_output(display_matrix).unwrap();
        assert_eq!((probe.width, probe.height), (1080, 1920));
        assert_eq!(decode_size(&probe), (1080, 1920));

        let legacy_tag = r#"{"streams": [{"width": 1280, "height": 720, "duration": "3.0",
            "tags": {"rotate": "90"}}]}"#;
        let probe = parse_probe_output(legacy_tag).unwrap();
        assert_eq!((probe.width, probe.height), (720, 1280));

        let upside_down = r#"{"streams": [{"width": 1280, "height": 720, "duration": "3.0",
            "side_data_list": [{"rotation": 180}]}]}"#;
        let probe = parse_probe_output(upside_down).unwrap();
        assert_eq!((probe.width, probe.height), (1280, 720));
    }

    #[test]
    fn test_parse_probe_rejects_missing_data() {
        assert!(parse_probe_output(r#"{"streams": []}"#).is_err());
        assert!(parse_probe_output(r#"{"streams": [{"width": 10, "height": 10}]}"#).is_err());
        let err = parse_probe_output("not json").unwrap_err();
        assert!(matches!(err, StoryError::Json(_)));
    }

    #[test]
    fn test_decode_size_caps_and_evens() {
        let probe = |w, h| VideoProbe {
            width: w,
            height: h,
            duration: 1.0,
        };
        assert_eq!(decode_size(&probe(3840, 2160)), (1920, 1080));
        assert_eq!(decode_size(&probe(641, 361)), (640, 360));
    }

    #[test]
    fn test_missing_binary_is_not_available() {
        assert!(!command_exists(Path::new("/nonexistent/ffmpeg-binary")));
    }

    fn queued_source(frames: &[u8]) -> (FfmpegFrameSource, mpsc::SyncSender<Vec<u8>>) {
        let (tx, rx) = mpsc::sync_channel(8);
        for shade in frames {
            tx.send([*shade, 0, 0, 255].repeat(4)).unwrap();
        }
        let source = FfmpegFrameSource {
            child: None,
            frames: Some(rx),
            reader: None,
            width: 2,
            height: 2,
            start: 1.0,
            fps: 30,
            next_index: 0,
            last: None,
        };
        (source, tx)
    }

    #[test]
    fn test_short_stream_holds_last_frame() {
        let (mut source, tx) = queued_source(&[10, 20]);
        drop(tx);
        let cancel = CancellationToken::new();
        let timeout = Duration::from_millis(100);

        let first = source.frame_at(1.0, timeout, &cancel).unwrap();
        assert_eq!(first.data()[0], 10);
        let second = source.frame_at(1.0 + 1.0 / 30.0, timeout, &cancel).unwrap();
        assert_eq!(second.data()[0], 20);
        let third = source.frame_at(1.0 + 2.0 / 30.0, timeout, &cancel).unwrap();
        assert_eq!(third.data()[0], 20);
        let fourth = source.frame_at(1.0 + 3.0 / 30.0, timeout, &cancel).unwrap();
        assert_eq!(fourth.data()[0], 20);
    }

    #[test]
    fn test_empty_stream_is_an_error() {
        let (mut source, tx) = queued_source(&[]);
        drop(tx);
        let err = source
            .frame_at(1.0, Duration::from_millis(100), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, FrameError::Ended { .. }));
    }

    #[test]
    fn test_stalled_decoder_times_out() {
        let (mut source, _tx) = queued_source(&[]);
        let err = source
            .frame_at(1.0, Duration::from_millis(30), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, FrameError::Timeout(_)));
    }

    #[test]
    fn test_cancel_interrupts_pending_frame_wait() {
        let (mut source, _tx) = queued_source(&[]);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let started = Instant::now();
        let err = source
            .frame_at(1.0, Duration::from_secs(5), &cancel)
            .unwrap_err();
        trigger.join().unwrap();

        assert!(matches!(err, FrameError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
