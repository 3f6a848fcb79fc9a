//! # Status Reporter
//!
//! Canale in uscita degli eventi verso il front end. Ogni transizione di un job produce
//! un `StatusRecord`; ogni batch produce un solo `BatchComplete`.
//! Se il ricevitore è stato chiuso gli eventi vengono scartati silenziosamente.

use crate::job::Job;
use crate::json_output::{JsonMessage, StatusRecord};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: UnboundedSender<JsonMessage>,
}

impl StatusReporter {
    pub fn new(tx: UnboundedSender<JsonMessage>) -> Self {
        Self { tx }
    }

    fn send(&self, message: JsonMessage) {
        if self.tx.send(message).is_err() {
            trace!("Status receiver closed, dropping event");
        }
    }

    /// Publish the current state of `job`
    pub fn job(&self, job: &Job) {
        self.send(JsonMessage::Status(job.record()));
    }

    pub fn record(&self, record: StatusRecord) {
        self.send(JsonMessage::Status(record));
    }

    pub fn batch_complete(&self, batch: u64) {
        self.send(JsonMessage::BatchComplete { batch });
    }

    pub fn queue_paused(&self) {
        self.send(JsonMessage::QueuePaused);
    }

    pub fn queue_resumed(&self) {
        self.send(JsonMessage::QueueResumed);
    }
}
