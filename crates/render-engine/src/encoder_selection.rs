//! Output codec selection from the encoders ffmpeg reports.

use std::path::Path;
use std::process::{Command, Stdio};

use serde::Serialize;
use storykit_common::error::{StoryError, StoryResult};

/// Video codecs the exporter can produce, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoCodec {
    /// H.264 in MP4.
    H264,
    /// VP9 in WebM.
    Vp9,
}

impl VideoCodec {
    pub const PREFERENCE: [VideoCodec; 2] = [VideoCodec::H264, VideoCodec::Vp9];

    /// ffmpeg encoder name.
    pub fn encoder(self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Vp9 => "libvpx-vp9",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/mp4",
            VideoCodec::Vp9 => "video/webm",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            VideoCodec::H264 => "mp4",
            VideoCodec::Vp9 => "webm",
        }
    }

    /// Encoder arguments placed after the input.
    pub fn codec_args(self, fps: u32, bitrate_kbps: u32) -> Vec<String> {
        let bitrate = format!("{}k", bitrate_kbps.max(1000));
        match self {
            VideoCodec::H264 => vec![
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                "veryfast".to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-b:v".to_string(),
                bitrate,
                "-g".to_string(),
                fps.to_string(),
                "-movflags".to_string(),
                "+faststart".to_string(),
            ],
            VideoCodec::Vp9 => vec![
                "-c:v".to_string(),
                "libvpx-vp9".to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-b:v".to_string(),
                bitrate,
                "-deadline".to_string(),
                "realtime".to_string(),
            ],
        }
    }
}

/// Encoder names from `ffmpeg -encoders` output.
///
/// Entry lines look like ` V....D libx264   libx264 H.264 ...`; the header
/// legend ends at the `------` separator.
pub fn parse_encoder_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            (flags.len() == 6).then(|| name.to_string())
        })
        .collect()
}

/// Ask ffmpeg which encoders it was built with.
pub fn available_encoders(ffmpeg: &Path) -> StoryResult<Vec<String>> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| StoryError::export(format!("failed to run {}: {e}", ffmpeg.display())))?;
    if !output.status.success() {
        return Err(StoryError::export(format!(
            "{} -encoders exited with {}",
            ffmpeg.display(),
            output.status
        )));
    }
    Ok(parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Pick the preferred codec among `encoders`.
///
/// WebM output is refused with [`StoryError::RiskyFormat`] when
/// `reject_webm` is set.
pub fn resolve_codec(encoders: &[String], reject_webm: bool) -> StoryResult<VideoCodec> {
    let codec = VideoCodec::PREFERENCE
        .into_iter()
        .find(|codec| encoders.iter().any(|e| e == codec.encoder()))
        .ok_or_else(|| StoryError::export("ffmpeg has neither libx264 nor libvpx-vp9"))?;

    if codec == VideoCodec::Vp9 {
        if reject_webm {
            return Err(StoryError::risky_format(
                "only a WebM encoder is available and WebM output is disabled",
            ));
        }
        tracing::warn!("libx264 unavailable, exporting WebM");
    }
    Ok(codec)
}

/// Probe ffmpeg and pick the output codec.
pub fn select_codec(ffmpeg: &Path, reject_webm: bool) -> StoryResult<VideoCodec> {
    let encoders = available_encoders(ffmpeg)?;
    let codec = resolve_codec(&encoders, reject_webm)?;
    tracing::info!(encoder = codec.encoder(), "Selected video encoder");
    Ok(codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D aac                  AAC (Advanced Audio Coding)
";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_skips_legend() {
        assert_eq!(
            parse_encoder_list(SAMPLE),
            vec!["libx264", "libvpx-vp9", "aac"]
        );
        assert!(parse_encoder_list("garbage").is_empty());
    }

    #[test]
    fn test_prefers_h264() {
        let codec = resolve_codec(&names(&["libvpx-vp9", "libx264"]), true).unwrap();
        assert_eq!(codec, VideoCodec::H264);
        assert_eq!(codec.mime(), "video/mp4");
    }

    #[test]
    fn test_falls_back_to_webm_unless_rejected() {
        let only_vp9 = names(&["libvpx-vp9"]);
        assert_eq!(resolve_codec(&only_vp9, false).unwrap(), VideoCodec::Vp9);
        let err = resolve_codec(&only_vp9, true).unwrap_err();
        assert!(matches!(err, StoryError::RiskyFormat { .. }));
    }

    #[test]
    fn test_no_encoder_is_an_export_error() {
        let err = resolve_codec(&names(&["aac"]), false).unwrap_err();
        assert!(matches!(err, StoryError::Export { .. }));
    }

    #[test]
    fn test_bitrate_has_floor() {
        let args = VideoCodec::H264.codec_args(30, 200);
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "1000k"));
    }
}
