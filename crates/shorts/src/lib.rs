pub mod config;
pub mod janitor;
pub mod ffprobe;
pub mod ffmpeg_native;
pub mod fetcher;
pub mod clip;
pub mod error;
pub mod pipeline;
pub mod http;

#[cfg(all(test, unix))]
mod fake_tools;

pub use config::ShortsConfig;
pub use janitor::{Janitor, SweepReport};
pub use ffprobe::{FFProbeData, FFProbeFormat, FFProbeSideData, FFProbeStream};
pub use clip::{ClipPlan, CropRect};
pub use error::PipelineError;
pub use pipeline::{GeneratedShort, Pipeline};
