//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file sorgente prima della conversione.
//!
//! ## Responsabilità:
//! - Normalizzazione dei path ricevuti (virgolette, spazi, path assoluto)
//! - Validazione dell'input (esistenza, file regolare, dimensione > 0)
//! - Determinazione formato file (video vs immagine)
//! - Discovery ricorsiva di file convertibili in una directory
//!
//! ## Formati supportati:
//! - **Video** → MP4: MOV, MP4, M4V, MKV, AVI, WebM
//! - **Immagini** → JPEG: HEIC, HEIF
//!
//! ## Esempio:
//! ```rust,ignore
//! let source = FileManager::normalize_source("\"C:\\Users\\me\\IMG_0001.MOV\"");
//! FileManager::validate_source(&source)?;
//! ```

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manages source file inspection and discovery
pub struct FileManager;

impl FileManager {
    /// Trim surrounding whitespace and quotes and make the path absolute
    pub fn normalize_source(raw: &str) -> PathBuf {
        let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        let path = PathBuf::from(trimmed);
        std::path::absolute(&path).unwrap_or(path)
    }

    /// Check that `path` is a non-empty regular file
    pub fn validate_source(path: &Path) -> Result<(), ConvertError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            ConvertError::InvalidInput(format!("File is missing or unreadable: {}", e))
        })?;

        if metadata.is_dir() {
            return Err(ConvertError::InvalidInput("Path is a directory".to_string()));
        }
        if !metadata.is_file() {
            return Err(ConvertError::InvalidInput("Path is not a regular file".to_string()));
        }
        if metadata.len() == 0 {
            return Err(ConvertError::InvalidInput("File is empty".to_string()));
        }

        Ok(())
    }

    /// Find all convertible files below a directory
    pub fn find_media_files(media_dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(media_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| Self::is_supported_format(path))
            .collect()
    }

    /// Check if a file format is supported
    pub fn is_supported_format(path: &Path) -> bool {
        Self::is_video(path) || Self::is_image(path)
    }

    /// Check if a file is an image handled by the image tool
    pub fn is_image(path: &Path) -> bool {
        matches!(Self::extension(path).as_deref(), Some("heic" | "heif"))
    }

    /// Check if a file is a video handled by the video tool
    pub fn is_video(path: &Path) -> bool {
        matches!(
            Self::extension(path).as_deref(),
            Some("mov" | "mp4" | "m4v" | "mkv" | "avi" | "webm")
        )
    }

    fn extension(path: &Path) -> Option<String> {
        path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
    }
}
