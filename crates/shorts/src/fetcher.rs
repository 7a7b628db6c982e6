use std::path::{Path, PathBuf};
use std::process::Stdio;
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use tokio::process::Command;

/// yt-dlp format selector: mp4 video + m4a audio, else best mp4, else anything
pub const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Marker yt-dlp prints in front of the final file path
const OUTPUT_MARKER: &str = "SHORTS_OUTPUT|";

/// Partial-download suffixes that never count as a finished file
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// A source video downloaded into the staging directory
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub local_path: PathBuf,
    /// Container extension chosen by yt-dlp (e.g. "mp4", "webm")
    pub extension: Option<String>,
}

/// Downloads source videos with yt-dlp
#[derive(Debug, Clone)]
pub struct Fetcher {
    ytdlp_bin: PathBuf,
    /// Passed as `--ffmpeg-location` so format merging uses our ffmpeg
    ffmpeg_location: Option<PathBuf>,
    staging_dir: PathBuf,
}

impl Fetcher {
    pub fn new(ytdlp_bin: PathBuf, ffmpeg_bin: &Path, staging_dir: PathBuf) -> Self {
        Fetcher {
            ytdlp_bin,
            ffmpeg_location: ffmpeg_location(ffmpeg_bin),
            staging_dir,
        }
    }

    /// Confirm yt-dlp runs; returns its version string
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.ytdlp_bin)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("Failed to execute yt-dlp at: {}", self.ytdlp_bin.display()))?;

        if !output.status.success() {
            return Err(anyhow!("yt-dlp version check failed"));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("📥 yt-dlp {} ready", version);
        Ok(version)
    }

    /// `-o` template for a request stem
    pub fn output_template(&self, stem: &str) -> PathBuf {
        self.staging_dir.join(format!("{}.%(ext)s", stem))
    }

    /// Download `url` into `<staging>/<stem>.<ext>`.
    ///
    /// Any failure (bad URL, nothing extractable, network, missing binary)
    /// comes back as one error carrying yt-dlp's last stderr line.
    pub async fn fetch(&self, url: &str, stem: &str) -> Result<DownloadedMedia> {
        let template = self.output_template(stem);
        debug!("yt-dlp: downloading {} to {}", url, template.display());

        let mut command = Command::new(&self.ytdlp_bin);
        command
            .env("PYTHONIOENCODING", "UTF-8")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-warnings")
            // Server timestamps would make fresh downloads look expired to the janitor
            .arg("--no-mtime")
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("-o")
            .arg(&template)
            .arg("--print")
            .arg(format!("after_move:{}%(filepath)s", OUTPUT_MARKER));

        if let Some(location) = &self.ffmpeg_location {
            command.arg("--ffmpeg-location").arg(location);
        }

        let output = command
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute yt-dlp at: {}", self.ytdlp_bin.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .last()
                .unwrap_or("yt-dlp failed");
            return Err(anyhow!("Download failed: {}", message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let local_path = self.resolve_output(&stdout, stem)?;

        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        info!("Downloaded {} -> {} ({})",
              url, local_path.display(), extension.as_deref().unwrap_or("no extension"));
        Ok(DownloadedMedia { local_path, extension })
    }

    /// Locate the finished download: the printed path first, then a staging-dir search
    fn resolve_output(&self, stdout: &str, stem: &str) -> Result<PathBuf> {
        let printed = stdout
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix(OUTPUT_MARKER))
            .map(PathBuf::from)
            .filter(|p| p.is_file());

        let path = match printed {
            Some(p) => p,
            None => find_staged_file(&self.staging_dir, stem)
                .ok_or_else(|| anyhow!("Download finished but no output file was found for {}", stem))?,
        };

        let staging = self.staging_dir.canonicalize()
            .with_context(|| format!("Staging directory unavailable: {}", self.staging_dir.display()))?;
        let resolved = path.canonicalize()
            .with_context(|| format!("Downloaded file unavailable: {}", path.display()))?;
        if !resolved.starts_with(&staging) {
            return Err(anyhow!("Downloaded file is outside the staging directory: {}", resolved.display()));
        }

        Ok(path)
    }
}

/// Explicit ffmpeg path for yt-dlp. A bare command name is left to PATH lookup,
/// since yt-dlp treats the location as a filesystem path.
fn ffmpeg_location(ffmpeg_bin: &Path) -> Option<PathBuf> {
    match ffmpeg_bin.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(ffmpeg_bin.to_path_buf()),
        _ => None,
    }
}

/// Finished file named `<stem>.<ext>` in `dir`, if any
pub fn find_staged_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", stem);
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| {
                    n.starts_with(&prefix)
                        && !PARTIAL_SUFFIXES.iter().any(|s| n.ends_with(s))
                        && !n[prefix.len()..].contains('.')
                })
                .unwrap_or(false)
        })
}
