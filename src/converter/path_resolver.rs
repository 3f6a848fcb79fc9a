//! # Path Resolution Module
//!
//! Centralizza il calcolo di directory, nome base ed estensione della destinazione.
//! La scelta del nome definitivo (collisioni, placeholder) spetta al `DestinationResolver`.
//! Il path sorgente non viene mai usato come destinazione: con `overwrite` un `.mp4`
//! convertito accanto a se stesso viene numerato come con `rename`.

use crate::{config::Config, destination::CollisionPolicy, error::ConvertError, job::FileKind};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Utility per calcolare le parti del path di output
pub struct PathResolver;

/// Directory, stem and extension handed to the destination resolver
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub stem: String,
    pub extension: &'static str,
}

impl OutputTarget {
    /// Un-numbered destination `dir/stem.ext`
    pub fn primary(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, self.extension))
    }
}

impl PathResolver {
    /// Compute where a converted `source` should be written
    pub fn target(source: &Path, kind: FileKind, config: &Config) -> Result<OutputTarget, ConvertError> {
        let extension = kind.output_extension().ok_or_else(|| {
            ConvertError::UnsupportedFormat(source.display().to_string())
        })?;
        let stem = source
            .file_stem()
            .ok_or_else(|| ConvertError::InvalidInput(format!("Invalid file name: {}", source.display())))?
            .to_string_lossy()
            .into_owned();

        Ok(OutputTarget {
            dir: Self::output_dir(source, config),
            stem,
            extension,
        })
    }

    /// Source directory, or the fallback directory if the source directory is excluded
    pub fn output_dir(source: &Path, config: &Config) -> PathBuf {
        let parent = clean(source.parent().unwrap_or(Path::new("")));
        if Self::is_excluded(&parent, &config.exclude_patterns) {
            let fallback = config.fallback_dir();
            debug!(
                "Source directory {} is excluded, writing to {}",
                parent.display(),
                fallback.display()
            );
            fallback
        } else {
            parent
        }
    }

    /// True if any non-empty pattern is a substring of `dir`
    pub fn is_excluded(dir: &Path, patterns: &[String]) -> bool {
        let dir = dir.to_string_lossy();
        patterns
            .iter()
            .map(|p| p.trim())
            .any(|p| !p.is_empty() && dir.contains(p))
    }

    /// Policy to apply for `target`; `overwrite` never targets the source itself
    pub fn collision_policy(source: &Path, target: &OutputTarget, policy: CollisionPolicy) -> CollisionPolicy {
        if policy == CollisionPolicy::Overwrite && Self::is_same_file(source, &target.primary()) {
            warn!(
                "{} would overwrite its own source, numbering the output instead",
                source.display()
            );
            return CollisionPolicy::Rename;
        }
        policy
    }

    /// True if both paths name the same existing file
    pub fn is_same_file(a: &Path, b: &Path) -> bool {
        match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
            (Ok(a), Ok(b)) if a == b => true,
            _ => same_inode(a, b),
        }
    }

    /// Crea la directory di output se necessario
    pub async fn ensure_dir(dir: &Path) -> Result<(), ConvertError> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_inode(_a: &Path, _b: &Path) -> bool {
    false
}

/// Lexically normalise `.` and `..` components
fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component);
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_next_to_source() {
        let config = Config::default();
        let target = PathResolver::target(Path::new("/v/./trip/IMG_0001.MOV"), FileKind::Video, &config).unwrap();
        assert_eq!(target.dir, PathBuf::from("/v/trip"));
        assert_eq!(target.stem, "IMG_0001");
        assert_eq!(target.extension, ".mp4");

        let target = PathResolver::target(Path::new("/p/IMG_0002.heic"), FileKind::Image, &config).unwrap();
        assert_eq!(target.extension, ".jpg");
    }

    #[test]
    fn test_unsupported_kind() {
        let err = PathResolver::target(Path::new("/a/notes.txt"), FileKind::Unsupported, &Config::default()).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_excluded_directory_uses_fallback() {
        let config = Config {
            exclude_patterns: vec!["".to_string(), "OneDrive".to_string()],
            default_dest_dir: PathBuf::from("/home/me/Pictures"),
            ..Default::default()
        };
        assert_eq!(
            PathResolver::output_dir(Path::new("/mnt/OneDrive/camera/a.mov"), &config),
            PathBuf::from("/home/me/Pictures")
        );
        assert_eq!(
            PathResolver::output_dir(Path::new("/mnt/local/a.mov"), &config),
            PathBuf::from("/mnt/local")
        );
    }

    #[test]
    fn test_clean_resolves_parent_components() {
        assert_eq!(clean(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }

    #[test]
    fn test_overwrite_never_targets_the_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("holiday.mp4");
        std::fs::write(&source, b"source data").unwrap();
        let target = PathResolver::target(&source, FileKind::Video, &Config::default()).unwrap();
        assert!(PathResolver::is_same_file(&source, &target.primary()));

        assert_eq!(
            PathResolver::collision_policy(&source, &target, CollisionPolicy::Overwrite),
            CollisionPolicy::Rename
        );
        assert_eq!(
            PathResolver::collision_policy(&source, &target, CollisionPolicy::Error),
            CollisionPolicy::Error
        );

        let other = dir.path().join("clip.mov");
        std::fs::write(&other, b"source data").unwrap();
        let target = PathResolver::target(&other, FileKind::Video, &Config::default()).unwrap();
        assert!(!PathResolver::is_same_file(&other, &target.primary()));
        assert_eq!(
            PathResolver::collision_policy(&other, &target, CollisionPolicy::Overwrite),
            CollisionPolicy::Overwrite
        );
    }

    #[tokio::test]
    async fn test_ensure_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out/nested");
        PathResolver::ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
