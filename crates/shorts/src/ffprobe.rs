use std::path::Path;
use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tokio::process::Command;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeFormat {
    pub format_name: String,
    /// Seconds as a decimal string, e.g. "90.023000"
    pub duration: Option<String>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<String>,
    /// Legacy rotation lives in `tags.rotate`
    pub tags: Option<HashMap<String, String>>,
    /// Newer ffmpeg reports rotation in a display matrix side data entry
    #[serde(default)]
    pub side_data_list: Vec<FFProbeSideData>,
}

/// Stream side data; only the display matrix rotation is read
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeSideData {
    pub side_data_type: Option<String>,
    pub rotation: Option<f64>,
}

impl FFProbeStream {
    /// Rotation applied on playback, normalized to 0..360 degrees
    pub fn rotation(&self) -> u32 {
        let from_side_data = self
            .side_data_list
            .iter()
            .filter(|sd| sd.side_data_type.as_deref().map_or(true, |t| t == "Display Matrix"))
            .find_map(|sd| sd.rotation);
        let from_tags = || {
            self.tags
                .as_ref()
                .and_then(|t| t.get("rotate"))
                .and_then(|r| r.trim().parse::<f64>().ok())
        };

        match from_side_data.or_else(from_tags) {
            Some(deg) if deg.is_finite() => (deg.round() as i64).rem_euclid(360) as u32,
            _ => 0,
        }
    }
}

impl FFProbeData {
    /// First video stream, if any
    pub fn video_stream(&self) -> Option<&FFProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
    }

    /// Total duration in seconds.
    ///
    /// Prefers the container duration, falls back to the video stream's own.
    pub fn duration_secs(&self) -> Result<f64> {
        let raw = self
            .format
            .duration
            .as_deref()
            .or_else(|| self.video_stream().and_then(|s| s.duration.as_deref()))
            .ok_or_else(|| anyhow!("Media reports no duration"))?;

        let secs: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid duration value: {}", raw))?;

        if !secs.is_finite() || secs <= 0.0 {
            return Err(anyhow!("Media duration is not positive: {}", raw));
        }
        Ok(secs)
    }

    /// Displayed frame size (width, height) of the first video stream.
    ///
    /// ffmpeg autorotates before filters run, so a stream stored as
    /// 1920x1080 with a 90 or 270 degree rotation is 1080x1920 here.
    pub fn frame_size(&self) -> Result<(u32, u32)> {
        let stream = self
            .video_stream()
            .ok_or_else(|| anyhow!("Media has no video stream"))?;

        match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => {
                let (w, h) = (w as u32, h as u32);
                if stream.rotation() % 180 == 90 {
                    Ok((h, w))
                } else {
                    Ok((w, h))
                }
            }
            _ => Err(anyhow!(
                "Video stream {} has no usable dimensions",
                stream.index
            )),
        }
    }
}

/// Parse ffprobe `-print_format json` output
pub fn parse_probe_json(json_str: &str) -> Result<FFProbeData> {
    serde_json::from_str(json_str).context("Failed to parse ffprobe JSON")
}

/// Run ffprobe on a local file and parse the JSON output
pub async fn probe_file(ffprobe_bin: &Path, file_path: &Path) -> Result<FFProbeData> {
    use log::debug;

    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", file_path.display());
    }

    debug!("Executing FFprobe for: {}", file_path.display());

    let output = Command::new(ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(file_path)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!(
            "Failed to execute FFprobe for: {}. Ensure FFprobe is installed and accessible at: {}",
            file_path.display(),
            ffprobe_bin.display()
        ))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "FFprobe failed (exit code {}) for {}: {}",
            exit_code,
            file_path.display(),
            stderr.trim()
        );
    }

    let json_str = String::from_utf8(output.stdout)
        .context("FFprobe output is not valid UTF-8")?;

    parse_probe_json(&json_str)
        .with_context(|| format!("Unreadable probe result for: {}", file_path.display()))
}
