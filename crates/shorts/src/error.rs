use thiserror::Error;

/// Failure of a generate request.
///
/// Only `InvalidInput` is the client's fault; the other two collapse into the
/// same server-error response and keep the underlying description as text.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0:#}")]
    Fetch(anyhow::Error),

    #[error("{0:#}")]
    Transform(anyhow::Error),
}

impl PipelineError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_display_keeps_context_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("exit code 1"));
        let err = PipelineError::Transform(inner.context("Failed to encode short clip").unwrap_err());
        assert_eq!(err.to_string(), "Failed to encode short clip: exit code 1");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_invalid_input_is_client_error() {
        let err = PipelineError::InvalidInput("missing url".into());
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "missing url");
    }
}
