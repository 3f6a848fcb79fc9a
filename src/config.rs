//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione consumata dal motore di conversione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di conversione
//! - Fornisce valori di default sensati (ffmpeg/magick dal PATH, 1 worker video, 5 immagini)
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Normalizza i valori sconosciuti invece di rifiutarli (acceleratore, qualità, policy)
//!
//! ## Parametri di configurazione:
//! - `video_tool` / `image_tool`: eseguibili esterni (default: `ffmpeg`, `magick`)
//! - `video_workers` / `image_workers`: capacità per classe di tool (minimo 1)
//! - `max_size`: lato massimo dell'output video (default: 1920)
//! - `hardware_accelerator`: `none`, `amd`, `nvidia`
//! - `video_quality`: `low`, `medium`, `high`
//! - `custom_video_args`: argomenti extra passati a ffmpeg così come sono
//! - `exclude_patterns`: sottostringhe di directory sorgente da non usare come output
//! - `default_dest_dir`: directory di fallback per i path esclusi
//! - `collision_policy`: `overwrite`, `error`, `rename`
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     video_workers: 2,
//!     collision_policy: CollisionPolicy::Error,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::destination::CollisionPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Encoder family used for video jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum HardwareAccelerator {
    /// Software encoding with libx264
    #[default]
    None,
    /// AMD AMF (h264_amf)
    Amd,
    /// NVIDIA NVENC (h264_nvenc)
    Nvidia,
}

impl From<String> for HardwareAccelerator {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "amd" => Self::Amd,
            "nvidia" => Self::Nvidia,
            "none" | "" => Self::None,
            other => {
                warn!("Unknown hardware accelerator '{}', falling back to software encoder (libx264)", other);
                Self::None
            }
        }
    }
}

/// Quality tier for video jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum VideoQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl From<String> for VideoQuality {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            _ => Self::High,
        }
    }
}

/// Configuration for the conversion engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video transcoding executable
    pub video_tool: PathBuf,
    /// Image conversion executable
    pub image_tool: PathBuf,
    /// Parallel video tool invocations (values below 1 are treated as 1)
    pub video_workers: usize,
    /// Parallel image tool invocations (values below 1 are treated as 1)
    pub image_workers: usize,
    /// Output videos fit within max_size x max_size
    pub max_size: u32,
    pub hardware_accelerator: HardwareAccelerator,
    pub video_quality: VideoQuality,
    /// Extra video tool arguments, split on whitespace
    pub custom_video_args: String,
    /// Source directories containing any of these substrings write to `default_dest_dir`
    pub exclude_patterns: Vec<String>,
    /// Fallback output directory; `~` and `$VAR` references are expanded
    pub default_dest_dir: PathBuf,
    pub collision_policy: CollisionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let default_dest_dir = dirs::picture_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            video_tool: PathBuf::from("ffmpeg"),
            image_tool: PathBuf::from("magick"),
            video_workers: 1,
            image_workers: 5,
            max_size: 1920,
            hardware_accelerator: HardwareAccelerator::None,
            video_quality: VideoQuality::High,
            custom_video_args: String::new(),
            exclude_patterns: Vec::new(),
            default_dest_dir,
            collision_policy: CollisionPolicy::Rename,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(anyhow::anyhow!("Max size must be greater than 0"));
        }

        if self.video_tool.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Video tool path must not be empty"));
        }

        if self.image_tool.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Image tool path must not be empty"));
        }

        Ok(())
    }

    /// Effective video tool capacity
    pub fn video_capacity(&self) -> usize {
        self.video_workers.max(1)
    }

    /// Effective image tool capacity
    pub fn image_capacity(&self) -> usize {
        self.image_workers.max(1)
    }

    /// Fallback directory with `~` and environment references expanded
    pub fn fallback_dir(&self) -> PathBuf {
        expand_path(&self.default_dest_dir)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Expand `~` and `$VAR` / `${VAR}` references. An unset variable leaves the path
/// with only `~` expanded.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            warn!("Cannot expand {}: {}", raw, e);
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_size = 0;
        assert!(config.validate().is_err());

        config.max_size = 1280;
        config.video_tool = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.video_tool, PathBuf::from("ffmpeg"));
        assert_eq!(config.image_tool, PathBuf::from("magick"));
        assert_eq!(config.video_workers, 1);
        assert_eq!(config.image_workers, 5);
        assert_eq!(config.max_size, 1920);
        assert_eq!(config.hardware_accelerator, HardwareAccelerator::None);
        assert_eq!(config.video_quality, VideoQuality::High);
        assert_eq!(config.collision_policy, CollisionPolicy::Rename);
    }

    #[test]
    fn test_worker_counts_are_coerced_upward() {
        let config = Config {
            video_workers: 0,
            image_workers: 0,
            ..Default::default()
        };
        assert_eq!(config.video_capacity(), 1);
        assert_eq!(config.image_capacity(), 1);
    }

    #[test]
    fn test_unknown_values_fall_back() {
        let config: Config = serde_json::from_str(
            r#"{"hardware_accelerator": "intel", "video_quality": "ultra", "collision_policy": "skip"}"#,
        )
        .unwrap();
        assert_eq!(config.hardware_accelerator, HardwareAccelerator::None);
        assert_eq!(config.video_quality, VideoQuality::High);
        assert_eq!(config.collision_policy, CollisionPolicy::Rename);

        let config: Config = serde_json::from_str(
            r#"{"hardware_accelerator": "NVIDIA", "video_quality": "Low", "collision_policy": "overwrite"}"#,
        )
        .unwrap();
        assert_eq!(config.hardware_accelerator, HardwareAccelerator::Nvidia);
        assert_eq!(config.video_quality, VideoQuality::Low);
        assert_eq!(config.collision_policy, CollisionPolicy::Overwrite);
    }

    #[test]
    fn test_expand_path() {
        std::env::set_var("SHARE_CONVERTER_TEST_DIR", "/data/out");
        assert_eq!(
            expand_path(Path::new("$SHARE_CONVERTER_TEST_DIR/videos")),
            PathBuf::from("/data/out/videos")
        );
        assert_eq!(
            expand_path(Path::new("${SHARE_CONVERTER_TEST_DIR}/x")),
            PathBuf::from("/data/out/x")
        );
        assert_eq!(expand_path(Path::new("/plain/dir")), PathBuf::from("/plain/dir"));
        assert_eq!(
            expand_path(Path::new("/out/$SHARE_CONVERTER_UNSET_DIR")),
            PathBuf::from("/out/$SHARE_CONVERTER_UNSET_DIR")
        );

        if dirs::home_dir().is_some() {
            let expanded = expand_path(Path::new("~/Shared"));
            assert!(!expanded.starts_with("~"));
            assert!(expanded.ends_with("Shared"));
        }
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            video_workers: 3,
            max_size: 1280,
            hardware_accelerator: HardwareAccelerator::Amd,
            video_quality: VideoQuality::Medium,
            custom_video_args: "-movflags +faststart".to_string(),
            exclude_patterns: vec!["OneDrive".to_string()],
            collision_policy: CollisionPolicy::Error,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.video_workers, 3);
        assert_eq!(loaded_config.max_size, 1280);
        assert_eq!(loaded_config.hardware_accelerator, HardwareAccelerator::Amd);
        assert_eq!(loaded_config.video_quality, VideoQuality::Medium);
        assert_eq!(loaded_config.custom_video_args, "-movflags +faststart");
        assert_eq!(loaded_config.exclude_patterns, vec!["OneDrive".to_string()]);
        assert_eq!(loaded_config.collision_policy, CollisionPolicy::Error);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.max_size, 1920);
    }
}
