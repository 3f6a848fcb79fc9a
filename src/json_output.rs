//! # JSON Output Module
//!
//! Questo modulo definisce la forma "wire" degli eventi emessi dal motore di conversione,
//! pensata per la comunicazione con il front end desktop.
//!
//! ## Responsabilità:
//! - Record di stato per job, emesso ad ogni transizione
//! - Segnale di completamento batch (uno solo per batch)
//! - Eventi di pausa / ripresa della coda
//! - Serializzazione una-riga-per-messaggio su stdout
//!
//! ## Tipi di messaggi:
//! - `status`: `{id, file, destFile, status, progress, speed, error}`
//! - `batch_complete`: tutti i job del batch hanno raggiunto uno stato terminale
//! - `queue_paused` / `queue_resumed`

use crate::job::JobStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-job status snapshot; `id` is stable for the job's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub id: String,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dest_file: Option<PathBuf>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl StatusRecord {
    /// Record for a path rejected before a job task exists
    pub fn rejected(id: impl Into<String>, file: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file,
            dest_file: None,
            status: JobStatus::Error,
            progress: 0,
            speed: None,
            error: Some(reason.into()),
        }
    }
}

/// Messages on the outbound event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Status(StatusRecord),

    /// Every task spawned by one `submit` call has finished
    BatchComplete { batch: u64 },

    QueuePaused,

    QueueResumed,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to serialize event: {}", e),
        }
    }

    pub fn status(&self) -> Option<&StatusRecord> {
        match self {
            Self::Status(record) => Some(record),
            _ => None,
        }
    }
}
