use std::path::PathBuf;
use log::{debug, info, warn};
use crate::clip::{ClipPlan, ClipTransformer};
use crate::config::ShortsConfig;
use crate::error::PipelineError;
use crate::ffmpeg_native::FFmpegManager;
use crate::fetcher::Fetcher;
use crate::janitor::Janitor;

/// Client-facing message for a missing or blank URL
pub const MISSING_URL_MESSAGE: &str = "Please provide a video URL";

/// Request lifecycle. Every request walks these in order and never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Cleaning,
    Fetching,
    Transforming,
    Responding,
}

/// A finished short, ready to be served
#[derive(Debug, Clone)]
pub struct GeneratedShort {
    pub stem: String,
    pub output_path: PathBuf,
    pub public_url: String,
    pub plan: ClipPlan,
}

/// Janitor → Fetcher → Clip Transformer, one instance shared by all requests
pub struct Pipeline {
    janitor: Janitor,
    fetcher: Fetcher,
    transformer: ClipTransformer,
    cfg: ShortsConfig,
}

impl Pipeline {
    pub fn new(cfg: &ShortsConfig) -> Self {
        let ffmpeg = FFmpegManager::new(cfg.ffmpeg_bin.clone(), cfg.ffprobe_bin.clone());
        Pipeline {
            janitor: Janitor::from_config(cfg),
            fetcher: Fetcher::new(cfg.ytdlp_bin.clone(), &cfg.ffmpeg_bin, cfg.staging_dir.clone()),
            transformer: ClipTransformer::new(ffmpeg, cfg.output_dir.clone()),
            cfg: cfg.clone(),
        }
    }

    pub fn config(&self) -> &ShortsConfig {
        &self.cfg
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn ffmpeg(&self) -> &FFmpegManager {
        self.transformer.ffmpeg()
    }

    pub fn janitor(&self) -> &Janitor {
        &self.janitor
    }

    /// Run one request through the pipeline.
    ///
    /// The sweep is dispatched first and never awaited. A missing URL stops
    /// before anything touches the filesystem. Fetch and transform failures
    /// are returned as-is, without retry; a failed request leaves its
    /// download for the janitor.
    pub async fn generate(&self, url: Option<&str>) -> Result<GeneratedShort, PipelineError> {
        trace_stage(Stage::Received, "-");

        trace_stage(Stage::Cleaning, "-");
        self.janitor.spawn_sweep();

        let url = match validate_url(url) {
            Ok(url) => url,
            Err(e) => {
                trace_stage(Stage::Responding, "-");
                return Err(e);
            }
        };

        let stem = new_stem();
        info!("🎞️  [{}] Generating short from {}", stem, url);

        trace_stage(Stage::Fetching, &stem);
        let media = match self.fetcher.fetch(url, &stem).await {
            Ok(media) => media,
            Err(e) => {
                warn!("[{}] Fetch failed: {:#}", stem, e);
                trace_stage(Stage::Responding, &stem);
                return Err(PipelineError::Fetch(e));
            }
        };

        trace_stage(Stage::Transforming, &stem);
        let rendered = match self.transformer.transform(&media.local_path, &stem).await {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("[{}] Transform failed: {:#}", stem, e);
                trace_stage(Stage::Responding, &stem);
                return Err(PipelineError::Transform(e));
            }
        };

        trace_stage(Stage::Responding, &stem);
        let file_name = rendered
            .output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let public_url = self.cfg.public_url(&file_name);
        info!("✅ [{}] Short ready at {}", stem, public_url);

        Ok(GeneratedShort {
            stem,
            output_path: rendered.output_path,
            public_url,
            plan: rendered.plan,
        })
    }
}

fn trace_stage(stage: Stage, stem: &str) {
    debug!("[{}] stage -> {:?}", stem, stage);
}

/// Trimmed, non-empty URL or an input error
pub fn validate_url(url: Option<&str>) -> Result<&str, PipelineError> {
    match url.map(str::trim) {
        Some(u) if !u.is_empty() => Ok(u),
        _ => Err(PipelineError::InvalidInput(MISSING_URL_MESSAGE.to_string())),
    }
}

/// Per-request file stem: `video_<epoch seconds>_<8 hex>`.
///
/// The random suffix keeps two requests in the same second apart.
pub fn new_stem() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("video_{}_{}", chrono::Utc::now().timestamp(), &suffix[..8])
}
