//! Image resize through an external tool
//!
//! Remote avatars are squared off before upload: the image is scaled to
//! fill a `dimension x dimension` box and re-encoded as PNG. The work is
//! done by an ImageMagick-compatible program reading the source on stdin
//! and writing the result on stdout.

use crate::config::ResizeConfig;
use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Resize errors
#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("Failed to fetch image: {0}")]
    FetchError(String),

    #[error("Failed to start {program}: {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("Image tool timed out after {0}s")]
    Timeout(u64),
}

/// Resizer seam used by image intake
#[async_trait]
pub trait ImageResizer: Send + Sync {
    /// Fill a `dimension` square and return PNG bytes
    async fn resize(&self, source: Bytes, dimension: u32) -> Result<Bytes, ResizeError>;
}

/// Resizer backed by ImageMagick's `convert` (or a compatible program)
#[derive(Debug, Clone)]
pub struct ImageMagickResizer {
    program: String,
    timeout: Duration,
}

impl ImageMagickResizer {
    pub fn new(config: &ResizeConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Arguments for a fill-to-square PNG conversion from stdin to stdout
    pub fn args(dimension: u32) -> Vec<String> {
        vec![
            "-".to_string(),
            "-resize".to_string(),
            format!("{}x{}^", dimension, dimension),
            "png:-".to_string(),
        ]
    }
}

#[async_trait]
impl ImageResizer for ImageMagickResizer {
    #[tracing::instrument(
        name = "image.resize",
        skip(self, source),
        fields(program = %self.program, input.bytes = source.len()),
        err
    )]
    async fn resize(&self, source: Bytes, dimension: u32) -> Result<Bytes, ResizeError> {
        let mut child = Command::new(&self.program)
            .args(Self::args(dimension))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ResizeError::SpawnError {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin concurrently so a full stdout pipe cannot stall the tool
        let stdin = child.stdin.take();
        let writer = tokio::spawn(async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(&source).await,
                None => Ok(()),
            }
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ResizeError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(ResizeError::ToolFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // The tool may exit before draining stdin; only report other write errors
        if let Ok(Err(e)) = writer.await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(ResizeError::IoError(e));
            }
        }

        tracing::debug!(output.bytes = output.stdout.len(), "Resize completed");
        Ok(Bytes::from(output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resizer(program: &str) -> ImageMagickResizer {
        ImageMagickResizer::new(&ResizeConfig {
            program: program.to_string(),
            timeout_seconds: 5,
        })
    }

    #[test]
    fn test_fill_square_args() {
        assert_eq!(
            ImageMagickResizer::args(128),
            vec!["-", "-resize", "128x128^", "png:-"]
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = resizer("definitely-not-an-image-tool")
            .resize(Bytes::from_static(b"data"), 128)
            .await;
        assert!(matches!(result, Err(ResizeError::SpawnError { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_failure() {
        let result = resizer("false")
            .resize(Bytes::from_static(b"data"), 128)
            .await;
        assert!(matches!(result, Err(ResizeError::ToolFailed { .. })));
    }
}
