use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use crate::clip::ClipPlan;

/// Video encoder used for shorts
pub const VIDEO_CODEC: &str = "libx264";

/// Audio encoder used for shorts
pub const AUDIO_CODEC: &str = "aac";

/// x264 preset: turnaround time over size and quality
pub const ENCODER_PRESET: &str = "ultrafast";

/// Rounds both sides down to even for uncropped sources; 4:2:0 output rejects odd sizes
pub const EVEN_SIZE_FILTER: &str = "crop=trunc(iw/2)*2:trunc(ih/2)*2";

/// Oldest FFmpeg major version we drive
const MIN_FFMPEG_MAJOR: u32 = 4;

/// FFmpeg version information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FFmpegVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FFmpegVersion {
    /// Check if this version meets the minimum requirement
    pub fn meets_requirement(&self) -> bool {
        self.major >= MIN_FFMPEG_MAJOR
    }

    /// Parse version from FFmpeg version string
    /// Example: "ffmpeg version 6.1.1" -> FFmpegVersion { major: 6, minor: 1, patch: 1 }
    pub fn parse(version_str: &str) -> Result<Self> {
        let version_part = version_str
            .split_whitespace()
            .find(|s| s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
            .ok_or_else(|| anyhow!("No version number found in: {}", version_str))?;

        // Distro builds append suffixes: "6.1.1-3ubuntu5"
        let numeric = version_part
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or(version_part);
        let mut parts = numeric.split('.').filter(|p| !p.is_empty());

        let major = parts
            .next()
            .ok_or_else(|| anyhow!("Invalid version format: {}", version_str))?
            .parse::<u32>()
            .with_context(|| format!("Failed to parse major version from: {}", version_part))?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u32>()
                .with_context(|| format!("Failed to parse minor version from: {}", p))?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse::<u32>()
                .with_context(|| format!("Failed to parse patch version from: {}", p))?,
            None => 0,
        };

        Ok(FFmpegVersion { major, minor, patch })
    }
}

/// Handle on the local ffmpeg/ffprobe binaries
#[derive(Debug, Clone)]
pub struct FFmpegManager {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
}

impl FFmpegManager {
    /// Construct without touching the binaries; see [`FFmpegManager::verify`]
    pub fn new(ffmpeg_bin: PathBuf, ffprobe_bin: PathBuf) -> Self {
        FFmpegManager { ffmpeg_bin, ffprobe_bin }
    }

    /// Check FFmpeg version and that the encoders we need are compiled in
    pub async fn verify(&self) -> Result<FFmpegVersion> {
        use log::info;

        let version = Self::detect_version(&self.ffmpeg_bin).await?;
        if !version.meets_requirement() {
            return Err(anyhow!(
                "FFmpeg version {}.{}.{} is too old (>= {}.0 required)",
                version.major, version.minor, version.patch, MIN_FFMPEG_MAJOR
            ));
        }

        let encoders = Self::list_encoders(&self.ffmpeg_bin).await?;
        let missing = missing_encoders(&encoders);
        if !missing.is_empty() {
            return Err(anyhow!(
                "FFmpeg at {} lacks required encoder(s): {}",
                self.ffmpeg_bin.display(),
                missing.join(", ")
            ));
        }

        let probe = Command::new(&self.ffprobe_bin)
            .arg("-version")
            .output()
            .await
            .with_context(|| format!("Failed to execute FFprobe at: {}", self.ffprobe_bin.display()))?;
        if !probe.status.success() {
            return Err(anyhow!("FFprobe version check failed"));
        }

        info!("🎬 FFmpeg {}.{}.{} with {}/{} ready",
              version.major, version.minor, version.patch, VIDEO_CODEC, AUDIO_CODEC);
        Ok(version)
    }

    async fn detect_version(ffmpeg_bin: &Path) -> Result<FFmpegVersion> {
        let output = Command::new(ffmpeg_bin)
            .arg("-version")
            .output()
            .await
            .with_context(|| format!("Failed to execute FFmpeg at: {}", ffmpeg_bin.display()))?;

        if !output.status.success() {
            return Err(anyhow!("FFmpeg version check failed"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next()
            .ok_or_else(|| anyhow!("Empty output from FFmpeg -version"))?;

        FFmpegVersion::parse(first_line)
    }

    async fn list_encoders(ffmpeg_bin: &Path) -> Result<String> {
        let output = Command::new(ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-encoders")
            .output()
            .await
            .with_context(|| format!("Failed to query FFmpeg encoders at: {}", ffmpeg_bin.display()))?;

        if !output.status.success() {
            return Err(anyhow!("FFmpeg encoder query failed"));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run FFmpeg to completion, capturing stderr.
    ///
    /// No timeout is applied. Callers that must not be cancelled run this
    /// on a spawned task; the child only dies with the runtime.
    pub async fn execute_ffmpeg(&self, args: Vec<String>) -> Result<()> {
        use log::{debug, info};
        use std::process::Stdio;

        let cmd_str = format!("{} {}", self.ffmpeg_bin.display(), args.join(" "));
        debug!("Executing FFmpeg: {}", cmd_str);

        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!(
                "Failed to spawn FFmpeg process at: {}. Ensure FFmpeg is installed and accessible.",
                self.ffmpeg_bin.display()
            ))?;

        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(anyhow!(
                "FFmpeg encoding failed (exit code: {}): {}",
                output.status.code().unwrap_or(-1),
                stderr_tail(&stderr, 5)
            ));
        }

        info!("FFmpeg execution completed successfully");
        debug!("FFmpeg stderr tail: {}", stderr_tail(&stderr, 2));

        Ok(())
    }
}

/// Required encoders absent from `ffmpeg -encoders` output
fn missing_encoders(encoder_list: &str) -> Vec<&'static str> {
    [VIDEO_CODEC, AUDIO_CODEC]
        .into_iter()
        .filter(|name| {
            !encoder_list
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(*name))
        })
        .collect()
}

/// Last `n` non-empty lines of ffmpeg's stderr, joined with " | "
fn stderr_tail(stderr: &str, n: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

/// Command builder for generating FFmpeg command lines
#[derive(Debug, Default)]
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn new() -> Self {
        CommandBuilder
    }

    /// Build the trim + crop + re-encode command for a short.
    ///
    /// Seeking happens before `-i` (fast input seek, frame-accurate because we
    /// re-encode); `-t` bounds the output. Full-length plans omit both.
    pub fn build_short_command(&self, input: &Path, output: &Path, plan: &ClipPlan) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
        ];

        if !plan.full_length {
            args.push("-ss".into());
            args.push(format!("{:.3}", plan.start_secs));
        }

        args.push("-i".into());
        args.push(input.to_string_lossy().to_string());

        if !plan.full_length {
            args.push("-t".into());
            args.push(format!("{:.3}", plan.duration_secs));
        }

        // First video stream, audio if present
        args.push("-map".into());
        args.push("0:v:0".into());
        args.push("-map".into());
        args.push("0:a:0?".into());

        args.push("-vf".into());
        match plan.crop {
            Some(rect) => args.push(rect.filter()),
            None => args.push(EVEN_SIZE_FILTER.into()),
        }

        args.push("-c:v".into());
        args.push(VIDEO_CODEC.into());
        args.push("-preset".into());
        args.push(ENCODER_PRESET.into());
        args.push("-c:a".into());
        args.push(AUDIO_CODEC.into());
        args.push("-movflags".into());
        args.push("+faststart".into());

        args.push(output.to_string_lossy().to_string());

        args
    }
}
