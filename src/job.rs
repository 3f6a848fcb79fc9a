//! # Job Model Module
//!
//! Questo modulo definisce il modello dati di una singola conversione.
//!
//! ## Strutture dati:
//! - `Job`: richiesta di conversione sorgente → destinazione, identificata dal path assoluto
//! - `JobStatus`: `queued`, `pending`, `processing`, `done`, `error`
//! - `FileKind`: video, immagine o formato non supportato
//! - `ToolClass`: classe di tool esterno (video o immagine) con il proprio limite
//!
//! ## Ciclo di vita:
//! Un `Job` nasce alla submission, viene modificato solo dal task che lo possiede
//! e viene distrutto quando il task termina: nessun job sopravvive al suo tentativo.
//! La percentuale di progresso non decresce mai una volta impostata.

use crate::file_manager::FileManager;
use crate::json_output::StatusRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Category of external converter a job needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    VideoTool,
    ImageTool,
}

impl ToolClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VideoTool => "video",
            Self::ImageTool => "image",
        }
    }
}

/// Source file classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Video,
    Image,
    Unsupported,
}

impl FileKind {
    pub fn of(path: &Path) -> Self {
        if FileManager::is_video(path) {
            Self::Video
        } else if FileManager::is_image(path) {
            Self::Image
        } else {
            Self::Unsupported
        }
    }

    pub fn tool_class(&self) -> Option<ToolClass> {
        match self {
            Self::Video => Some(ToolClass::VideoTool),
            Self::Image => Some(ToolClass::ImageTool),
            Self::Unsupported => None,
        }
    }

    /// Output extension, dot included
    pub fn output_extension(&self) -> Option<&'static str> {
        match self {
            Self::Video => Some(".mp4"),
            Self::Image => Some(".jpg"),
            Self::Unsupported => None,
        }
    }
}

/// Job lifecycle states as seen by status consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Pending,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One source-file-to-destination conversion attempt
#[derive(Debug, Clone)]
pub struct Job {
    /// Absolute source path, also the dedup key
    pub id: String,
    pub source: PathBuf,
    pub kind: FileKind,
    pub destination: Option<PathBuf>,
    pub status: JobStatus,
    pub progress: u8,
    pub speed: Option<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(source: PathBuf) -> Self {
        Self {
            id: source.to_string_lossy().into_owned(),
            kind: FileKind::of(&source),
            source,
            destination: None,
            status: JobStatus::Queued,
            progress: 0,
            speed: None,
            error: None,
        }
    }

    /// Raise progress, clamped to 100. Lower values are ignored.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    pub fn mark_done(&mut self) {
        self.status = JobStatus::Done;
        self.progress = 100;
        self.speed = None;
        self.error = None;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Error;
        self.speed = None;
        self.error = Some(message.into());
    }

    /// Snapshot for the status stream
    pub fn record(&self) -> StatusRecord {
        StatusRecord {
            id: self.id.clone(),
            file: self.source.clone(),
            dest_file: self.destination.clone(),
            status: self.status,
            progress: self.progress,
            speed: self.speed.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(FileKind::of(Path::new("/a/IMG_0001.MOV")), FileKind::Video);
        assert_eq!(FileKind::of(Path::new("/a/clip.mkv")), FileKind::Video);
        assert_eq!(FileKind::of(Path::new("/a/IMG_0002.heic")), FileKind::Image);
        assert_eq!(FileKind::of(Path::new("/a/notes.txt")), FileKind::Unsupported);
        assert_eq!(FileKind::of(Path::new("/a/noext")), FileKind::Unsupported);

        assert_eq!(FileKind::Video.tool_class(), Some(ToolClass::VideoTool));
        assert_eq!(FileKind::Image.output_extension(), Some(".jpg"));
        assert_eq!(FileKind::Unsupported.tool_class(), None);
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut job = Job::new(PathBuf::from("/a/clip.mov"));
        job.set_progress(40);
        job.set_progress(20);
        assert_eq!(job.progress, 40);
        job.set_progress(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_record_reflects_job() {
        let mut job = Job::new(PathBuf::from("/a/clip.mov"));
        job.destination = Some(PathBuf::from("/a/clip.mp4"));
        job.status = JobStatus::Processing;
        job.set_progress(50);
        job.speed = Some("2.0x".to_string());

        let record = job.record();
        assert_eq!(record.id, "/a/clip.mov");
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(record.progress, 50);
        assert_eq!(record.speed.as_deref(), Some("2.0x"));

        job.mark_failed("cancelled");
        assert!(job.status.is_terminal());
        assert_eq!(job.record().error.as_deref(), Some("cancelled"));
        assert_eq!(job.record().speed, None);
    }
}
