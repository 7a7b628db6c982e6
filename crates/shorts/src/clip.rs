use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use crate::ffmpeg_native::{CommandBuilder, FFmpegManager};
use crate::ffprobe::{self, FFProbeData};

/// Longest clip we render, in seconds
pub const TARGET_DURATION_SECS: f64 = 60.0;

/// Output aspect ratio as width:height
pub const TARGET_ASPECT: (u32, u32) = (9, 16);

/// Pixel rectangle passed to ffmpeg's `crop` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    /// `crop=w:h:x:y` filter expression
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// What to cut out of a source: temporal window plus optional spatial crop
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlan {
    pub start_secs: f64,
    pub duration_secs: f64,
    /// `None` when the source is too narrow to crop to 9:16
    pub crop: Option<CropRect>,
    /// True when the window covers the whole source
    pub full_length: bool,
}

impl ClipPlan {
    /// Plan from source duration and frame size
    pub fn new(duration: f64, width: u32, height: u32) -> Self {
        let (start_secs, duration_secs) = select_window(duration);
        ClipPlan {
            start_secs,
            duration_secs,
            crop: vertical_crop(width, height),
            full_length: duration <= TARGET_DURATION_SECS,
        }
    }

    pub fn from_probe(meta: &FFProbeData) -> Result<Self> {
        let duration = meta.duration_secs()?;
        let (width, height) = meta.frame_size()?;
        Ok(Self::new(duration, width, height))
    }

    /// Output frame size given the (displayed) source frame size
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.crop {
            Some(rect) => (rect.width, rect.height),
            None => (width & !1, height & !1),
        }
    }
}

/// Centered window of at most TARGET_DURATION_SECS: returns (start, length)
pub fn select_window(duration: f64) -> (f64, f64) {
    if duration > TARGET_DURATION_SECS {
        ((duration - TARGET_DURATION_SECS) / 2.0, TARGET_DURATION_SECS)
    } else {
        (0.0, duration)
    }
}

/// Horizontally centered full-height 9:16 crop, or `None` if the frame is already too narrow.
///
/// The width is `h * 9/16` truncated to an even number of pixels, since
/// 4:2:0 chroma needs even dimensions. An odd height loses its bottom row.
pub fn vertical_crop(width: u32, height: u32) -> Option<CropRect> {
    let (num, den) = TARGET_ASPECT;
    let exact_w = height as f64 * num as f64 / den as f64;
    if exact_w > width as f64 {
        return None;
    }

    let crop_w = (exact_w.floor() as u32) & !1;
    if crop_w == 0 {
        return None;
    }

    Some(CropRect {
        width: crop_w,
        height: height & !1,
        x: (width - crop_w) / 2,
        y: 0,
    })
}

/// A rendered clip in the output directory
#[derive(Debug, Clone)]
pub struct RenderedClip {
    pub output_path: PathBuf,
    pub plan: ClipPlan,
}

/// Trims, crops and re-encodes downloaded media into vertical shorts
pub struct ClipTransformer {
    ffmpeg: FFmpegManager,
    output_dir: PathBuf,
}

impl ClipTransformer {
    pub fn new(ffmpeg: FFmpegManager, output_dir: PathBuf) -> Self {
        ClipTransformer { ffmpeg, output_dir }
    }

    pub fn ffmpeg(&self) -> &FFmpegManager {
        &self.ffmpeg
    }

    /// Output path for a request stem
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{}_short.mp4", stem))
    }

    /// Probe, plan, encode, then delete the source.
    ///
    /// The ffmpeg child is awaited on every path. The source is only deleted
    /// after the output exists.
    pub async fn transform(&self, source: &Path, stem: &str) -> Result<RenderedClip> {
        let meta = ffprobe::probe_file(&self.ffmpeg.ffprobe_bin, source)
            .await
            .context("Failed to read source media")?;
        let plan = ClipPlan::from_probe(&meta)
            .with_context(|| format!("Cannot plan clip for: {}", source.display()))?;

        let (w, h) = meta.frame_size()?;
        let (out_w, out_h) = plan.output_size(w, h);
        info!("✂️  Clip plan for {}: start {:.3}s, length {:.3}s, {}x{} -> {}x{}",
              stem, plan.start_secs, plan.duration_secs, w, h, out_w, out_h);
        debug!("Source container: {}", meta.format.format_name);
        if plan.crop.is_none() {
            debug!("Source {}x{} is narrower than 9:16, skipping crop", w, h);
        }

        let output_path = self.output_path(stem);
        let args = CommandBuilder::new().build_short_command(source, &output_path, &plan);

        if let Err(e) = self.ffmpeg.execute_ffmpeg(args).await {
            if output_path.exists() {
                if let Err(rm) = std::fs::remove_file(&output_path) {
                    debug!("Could not remove partial output {}: {}", output_path.display(), rm);
                }
            }
            return Err(e.context("Failed to encode short clip"));
        }

        if !output_path.is_file() {
            anyhow::bail!("Encoder reported success but produced no file: {}", output_path.display());
        }

        match std::fs::remove_file(source) {
            Ok(()) => debug!("Removed source download: {}", source.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove source download {}: {}", source.display(), e),
        }

        Ok(RenderedClip { output_path, plan })
    }
}
