//! # Job Manager
//!
//! Facciata pubblica del motore di conversione e punto di ingresso della submission.
//!
//! ## Responsabilità:
//! - Normalizzazione e validazione dei path ricevuti (errore riportato subito, nessun task)
//! - Deduplica: un id già in volo viene saltato senza eventi
//! - Un task indipendente per ogni job ammesso, avviato subito
//! - Un solo segnale `BatchComplete` per ogni chiamata a `submit`
//! - Pausa, ripresa, cancellazione e riconfigurazione a runtime
//!
//! ## Esempio:
//! ```rust,ignore
//! let (manager, mut events) = JobManager::new(config, Handle::current());
//! let batch = manager.submit(["/videos/IMG_0001.MOV"]);
//! while let Some(event) = events.recv().await {
//!     event.emit();
//! }
//! ```

use crate::{
    config::Config,
    converter::{
        controller::JobController,
        limiter::ToolLimiter,
        reporter::StatusReporter,
        task::{ConversionTask, TaskContext},
    },
    destination::DestinationResolver,
    error::ConvertError,
    file_manager::FileManager,
    job::{FileKind, Job},
    json_output::{JsonMessage, StatusRecord},
};
use anyhow::Result;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

/// Entry point for collaborators: submit, pause, resume, cancel, reconfigure
pub struct JobManager {
    context: Arc<TaskContext>,
    config: RwLock<Arc<Config>>,
    runtime: Handle,
    next_batch: AtomicU64,
}

impl JobManager {
    /// Create a manager whose tasks run on `runtime`, plus the outbound event stream
    pub fn new(config: Config, runtime: Handle) -> (Self, UnboundedReceiver<JsonMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let context = Arc::new(TaskContext {
            controller: Arc::new(JobController::new()),
            limiter: ToolLimiter::from_config(&config),
            destinations: DestinationResolver::new(),
            reporter: StatusReporter::new(tx),
        });

        let manager = Self {
            context,
            config: RwLock::new(Arc::new(config)),
            runtime,
            next_batch: AtomicU64::new(0),
        };
        (manager, rx)
    }

    /// Configuration snapshot used by the next batch
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the configuration and resize the tool limits
    pub fn apply_config(&self, config: Config) -> Result<()> {
        config.validate()?;
        self.context.limiter.apply_config(&config);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        info!("🔧 Configuration updated");
        Ok(())
    }

    /// Admit a batch of paths and return its batch id. Returns immediately.
    pub fn submit<I, S>(&self, paths: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = self.next_batch.fetch_add(1, Ordering::Relaxed) + 1;
        let config = self.config();
        let mut tasks = Vec::new();

        for raw in paths {
            let source = FileManager::normalize_source(raw.as_ref());
            let id = source.to_string_lossy().into_owned();

            if let Err(e) = FileManager::validate_source(&source) {
                warn!("Rejected {}: {}", id, e);
                self.context.reporter.record(StatusRecord::rejected(id, source, e.to_string()));
                continue;
            }

            let job = Job::new(source);
            if job.kind == FileKind::Unsupported {
                let e = ConvertError::UnsupportedFormat(id.clone());
                warn!("Rejected {}: {}", id, e);
                self.context.reporter.record(StatusRecord::rejected(id, job.source, e.to_string()));
                continue;
            }

            let Some(registration) = self.context.controller.register(&job.id) else {
                continue;
            };

            debug!("Queued {} ({:?})", job.id, job.kind);
            self.context.reporter.job(&job);
            let task = ConversionTask::new(job, registration, Arc::clone(&config), Arc::clone(&self.context));
            tasks.push(self.runtime.spawn(task.run()));
        }

        info!("📦 Batch {}: {} jobs started", batch, tasks.len());
        let reporter = self.context.reporter.clone();
        self.runtime.spawn(async move {
            for result in join_all(tasks).await {
                if let Err(e) = result {
                    error!("Conversion task aborted: {}", e);
                }
            }
            debug!("Batch {} complete", batch);
            reporter.batch_complete(batch);
        });

        batch
    }

    pub fn pause(&self) {
        if self.context.controller.pause() {
            self.context.reporter.queue_paused();
        }
    }

    pub fn resume(&self) {
        if self.context.controller.resume() {
            self.context.reporter.queue_resumed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.context.controller.is_paused()
    }

    /// Cancel a job by id; the id is normalized like a submitted path
    pub fn cancel(&self, id: &str) -> bool {
        let id = FileManager::normalize_source(id);
        self.context.controller.cancel(&id.to_string_lossy())
    }

    pub fn cancel_all(&self) -> usize {
        self.context.controller.cancel_all()
    }

    /// Cancel everything in flight and every job submitted afterwards
    pub fn shutdown(&self) {
        self.context.controller.shutdown();
    }

    /// Number of jobs currently in flight
    pub fn in_flight(&self) -> usize {
        self.context.controller.in_flight()
    }
}
