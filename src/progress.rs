//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la visualizzazione del progresso da terminale e le statistiche
//! dei batch per la CLI.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` alimentata dagli eventi di stato
//! - La lunghezza cresce solo con i job che producono eventi (i duplicati saltati non contano)
//! - Conteggio dei job completati, falliti e annullati
//! - Report finale con statistiche aggregate
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================>---------------] 3/5 (60%) IMG_0004.MOV 42% 2.5x
//! ```

use crate::job::JobStatus;
use crate::json_output::{JsonMessage, StatusRecord};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Terminal progress bar over every job seen so far
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
    /// Ids with a non-terminal status on the bar
    active: Arc<Mutex<HashSet<String>>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("=>-")),
            Err(e) => tracing::debug!("Invalid progress template: {}", e),
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            active: Arc::default(),
        }
    }

    /// Hidden bar, used when events go to stdout as JSON
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            active: Arc::default(),
        }
    }

    /// Reflect one status record on the bar. The first record of a job extends the bar,
    /// its terminal record advances it.
    pub fn observe(&self, record: &StatusRecord) {
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            let first = !active.contains(&record.id);
            if record.status.is_terminal() {
                active.remove(&record.id);
            } else if first {
                active.insert(record.id.clone());
            }
            if first {
                self.bar.inc_length(1);
            }
        }

        let name = record
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.id.clone());

        if record.status.is_terminal() {
            self.bar.inc(1);
        }

        match record.status {
            JobStatus::Done => {
                self.bar.set_message(format!("✅ {}", name));
            }
            JobStatus::Error => {
                let reason = record.error.as_deref().unwrap_or("failed");
                self.bar.println(format!("❌ {}: {}", name, reason));
            }
            JobStatus::Processing => {
                let speed = record.speed.as_deref().unwrap_or("");
                self.bar.set_message(format!("{} {}% {}", name, record.progress, speed));
            }
            JobStatus::Queued | JobStatus::Pending => {}
        }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Outcome counts across all batches
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchStats {
    pub jobs_done: usize,
    pub jobs_failed: usize,
    pub jobs_cancelled: usize,
    pub batches_completed: usize,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, message: &JsonMessage) {
        match message {
            JsonMessage::Status(record) => match record.status {
                JobStatus::Done => self.jobs_done += 1,
                JobStatus::Error if record.error.as_deref() == Some("cancelled") => {
                    self.jobs_cancelled += 1
                }
                JobStatus::Error => self.jobs_failed += 1,
                _ => {}
            },
            JsonMessage::BatchComplete { .. } => self.batches_completed += 1,
            JsonMessage::QueuePaused | JsonMessage::QueueResumed => {}
        }
    }

    pub fn has_failures(&self) -> bool {
        self.jobs_failed > 0
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Converted: {} | Failed: {} | Cancelled: {}",
            self.jobs_done, self.jobs_failed, self.jobs_cancelled
        )
    }
}
