//! # Image Processing Module
//!
//! Questo modulo converte le immagini HEIC/HEIF in JPEG delegando al tool immagine
//! esterno (ImageMagick `magick`).
//!
//! ## Responsabilità:
//! - Invocazione singola `tool <sorgente> <destinazione>`
//! - Output stdout + stderr combinato; le ultime righe finiscono nel messaggio d'errore
//! - Annullamento: il processo viene terminato (kill-on-drop) appena il token scatta
//!
//! Il tool immagine non espone progresso incrementale: il task chiamante riporta
//! 0% all'avvio e 100% al completamento.

use crate::config::Config;
use crate::diagnostics::{DiagnosticTail, LineSplitter};
use crate::error::ConvertError;
use crate::platform::PlatformCommands;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handles image conversion
pub struct ImageProcessor {
    config: Arc<Config>,
}

impl ImageProcessor {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Run the image tool once and wait for it, or kill it when `token` fires
    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<(), ConvertError> {
        let tool = PlatformCommands::display_name(&self.config.image_tool);
        info!("🖼️ Converting {} -> {}", input.display(), output.display());

        let child = PlatformCommands::command(&self.config.image_tool)
            .arg(input)
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConvertError::ToolLaunch {
                tool: tool.clone(),
                source,
            })?;

        // Dropping the wait future drops the child, which kills it
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Cancelling running {} process", tool);
                return Err(ConvertError::Cancelled);
            }
            result = child.wait_with_output() => result?,
        };

        if !result.status.success() {
            let mut splitter = LineSplitter::new();
            let mut tail = DiagnosticTail::default();
            for stream in [&result.stdout, &result.stderr] {
                for line in splitter.push(stream) {
                    tail.push(line);
                }
                if let Some(line) = splitter.finish() {
                    tail.push(line);
                }
            }

            return Err(ConvertError::ToolExecution {
                tool,
                status: result.status.to_string(),
                tail: tail.joined(),
            });
        }

        info!("✅ Image conversion completed: {}", output.display());
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn processor(dir: &Path, body: &str) -> ImageProcessor {
        let path = dir.join("fake-magick");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ImageProcessor::new(Arc::new(Config {
            image_tool: path,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_passes_source_and_destination() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("IMG_0001.heic");
        let output = dir.path().join("IMG_0001.jpg");
        std::fs::write(&source, b"heic").unwrap();

        processor(dir.path(), r#"cp "$1" "$2""#)
            .convert(&source, &output, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"heic");
    }

    #[tokio::test]
    async fn test_failure_combines_output_streams() {
        let dir = TempDir::new().unwrap();
        let err = processor(dir.path(), "echo 'reading input'\necho 'no decode delegate' >&2\nexit 1")
            .convert(Path::new("a.heic"), &dir.path().join("a.jpg"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ConvertError::ToolExecution { tool, tail, .. } => {
                assert_eq!(tool, "fake-magick");
                assert_eq!(tail, "reading input\nno decode delegate");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let processor = ImageProcessor::new(Arc::new(Config {
            image_tool: PathBuf::from("/nonexistent/magick-xyz"),
            ..Default::default()
        }));
        let err = processor
            .convert(Path::new("a.heic"), Path::new("a.jpg"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ToolLaunch { .. }));
    }

    #[tokio::test]
    async fn test_cancel_stops_waiting() {
        let dir = TempDir::new().unwrap();
        let processor = processor(dir.path(), "exec sleep 30");
        let token = CancellationToken::new();
        token.cancel();

        let started = Instant::now();
        let err = processor
            .convert(Path::new("a.heic"), &dir.path().join("a.jpg"), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
