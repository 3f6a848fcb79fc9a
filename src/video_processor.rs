//! # Video Processing Module
//!
//! Questo modulo esegue la conversione video → MP4 con il tool video esterno (ffmpeg).
//!
//! ## Responsabilità:
//! - Costruzione degli argomenti in base ad acceleratore hardware e qualità
//! - Filtro uniforme "fit within N×N", aspect ratio preservato, mai upscaling
//! - Argomenti extra dell'utente aggiunti così come sono (split su whitespace)
//! - Lettura in streaming dello stderr e traduzione in callback di progresso
//! - Terminazione immediata del processo quando il job viene annullato
//!
//! ## Encoder per acceleratore:
//! | Acceleratore | Codec      | Filtro    | Controllo qualità              |
//! |--------------|------------|-----------|--------------------------------|
//! | none         | libx264    | `scale`   | default dell'encoder           |
//! | amd          | h264_amf   | `vpp_amf` | `-quality speed/balanced/quality` + vbr_peak |
//! | nvidia       | h264_nvenc | `scale`   | `-preset fast/medium/slow`     |
//!
//! ## Tier di qualità:
//! - `low`: 1M (max 2M)
//! - `medium`: 2.5M (max 5M)
//! - `high`: 5M (max 10M)
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = VideoProcessor::new(config);
//! processor.convert(&source, &dest, &token, |update| println!("{}%", update.percent)).await?;
//! ```

use crate::config::{Config, HardwareAccelerator, VideoQuality};
use crate::diagnostics::{DiagnosticTail, LineSplitter, ProgressParser, ProgressUpdate};
use crate::error::ConvertError;
use crate::platform::PlatformCommands;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($arg.to_string()),*]
    };
}

/// Rate control settings for one quality tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityProfile {
    pub bitrate: &'static str,
    pub max_bitrate: &'static str,
    pub buffer_size: &'static str,
    pub amd_quality: &'static str,
    pub nvidia_preset: &'static str,
}

impl From<VideoQuality> for QualityProfile {
    fn from(quality: VideoQuality) -> Self {
        match quality {
            VideoQuality::Low => Self {
                bitrate: "1M",
                max_bitrate: "2M",
                buffer_size: "2M",
                amd_quality: "speed",
                nvidia_preset: "fast",
            },
            VideoQuality::Medium => Self {
                bitrate: "2.5M",
                max_bitrate: "5M",
                buffer_size: "5M",
                amd_quality: "balanced",
                nvidia_preset: "medium",
            },
            VideoQuality::High => Self {
                bitrate: "5M",
                max_bitrate: "10M",
                buffer_size: "10M",
                amd_quality: "quality",
                nvidia_preset: "slow",
            },
        }
    }
}

/// Handles video conversion
pub struct VideoProcessor {
    config: Arc<Config>,
}

impl VideoProcessor {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Fit-within filter that never upscales
    fn fit_filter(&self, filter: &str) -> String {
        let n = self.config.max_size;
        let mut arg = format!(
            "{}=w='min(iw,{n})':h='min(ih,{n})':force_original_aspect_ratio=decrease",
            filter
        );
        if filter == "scale" {
            arg.push_str(":force_divisible_by=2");
        }
        arg
    }

    /// Build the complete argument vector for one conversion
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy().into_owned();
        let profile = QualityProfile::from(self.config.video_quality);

        let mut args = args!["-hide_banner", "-loglevel", "info", "-stats", "-y"];

        match self.config.hardware_accelerator {
            HardwareAccelerator::Amd => {
                args.extend(args![
                    "-i", input,
                    "-c:v", "h264_amf",
                    "-b:v", profile.bitrate,
                    "-quality", profile.amd_quality,
                    "-vf", self.fit_filter("vpp_amf"),
                ]);
                if self.config.video_quality != VideoQuality::Low {
                    args.extend(args![
                        "-rc", "vbr_peak",
                        "-maxrate", profile.max_bitrate,
                        "-bufsize", profile.buffer_size,
                        "-vbaq", "true",
                        "-preencode", "true",
                        "-high_motion_quality_boost_enable", "true",
                        "-bf", "3",
                    ]);
                }
            }
            HardwareAccelerator::Nvidia => {
                args.extend(args![
                    "-hwaccel", "cuda",
                    "-i", input,
                    "-c:v", "h264_nvenc",
                    "-preset", profile.nvidia_preset,
                    "-b:v", profile.bitrate,
                    "-maxrate", profile.max_bitrate,
                    "-bufsize", profile.buffer_size,
                    "-vf", self.fit_filter("scale"),
                ]);
            }
            HardwareAccelerator::None => {
                args.extend(args![
                    "-i", input,
                    "-c:v", "libx264",
                    "-vf", self.fit_filter("scale"),
                ]);
            }
        }

        args.extend(self.config.custom_video_args.split_whitespace().map(str::to_string));
        args.extend(args!["-c:a", "aac", output.to_string_lossy()]);
        args
    }

    /// Run the video tool, streaming progress until it exits or `token` fires
    pub async fn convert<F>(
        &self,
        input: &Path,
        output: &Path,
        token: &CancellationToken,
        mut on_progress: F,
    ) -> Result<(), ConvertError>
    where
        F: FnMut(ProgressUpdate),
    {
        let tool = PlatformCommands::display_name(&self.config.video_tool);
        let args = self.build_args(input, output);
        info!(
            "🎬 Converting {} -> {} ({:?}, {:?})",
            input.display(),
            output.display(),
            self.config.hardware_accelerator,
            self.config.video_quality
        );
        debug!("{} {}", tool, args.join(" "));

        let mut child = PlatformCommands::command(&self.config.video_tool)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConvertError::ToolLaunch {
                tool: tool.clone(),
                source,
            })?;

        let mut stderr = child.stderr.take().ok_or_else(|| {
            ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "video tool stderr was not captured",
            ))
        })?;

        let mut splitter = LineSplitter::new();
        let mut parser = ProgressParser::new();
        let mut tail = DiagnosticTail::default();
        let mut buf = [0u8; 4096];

        loop {
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    terminate(&mut child, &tool).await;
                    return Err(ConvertError::Cancelled);
                }
                read = stderr.read(&mut buf) => read,
            };

            match read {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        observe_line(&tool, line, &mut parser, &mut tail, &mut on_progress);
                    }
                }
                Err(e) => {
                    warn!("Failed reading {} diagnostics: {}", tool, e);
                    break;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            observe_line(&tool, line, &mut parser, &mut tail, &mut on_progress);
        }

        let status = tokio::select! {
            biased;
            _ = token.cancelled() => {
                terminate(&mut child, &tool).await;
                return Err(ConvertError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            return Err(ConvertError::ToolExecution {
                tool,
                status: status.to_string(),
                tail: tail.joined(),
            });
        }

        info!("✅ Video conversion completed: {}", output.display());
        Ok(())
    }
}

fn observe_line<F>(
    tool: &str,
    line: String,
    parser: &mut ProgressParser,
    tail: &mut DiagnosticTail,
    on_progress: &mut F,
) where
    F: FnMut(ProgressUpdate),
{
    if !ProgressParser::is_progress_line(&line) {
        debug!("{}: {}", tool, line);
    }

    let had_total = parser.total().is_some();
    let update = parser.feed(&line);
    if !had_total {
        if let Some(total) = parser.total() {
            debug!("Detected video duration: {:?}", total);
        }
    }

    tail.push(line);
    if let Some(update) = update {
        on_progress(update);
    }
}

async fn terminate(child: &mut Child, tool: &str) {
    warn!("Cancelling running {} process", tool);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill {}: {}", tool, e);
    }
}
