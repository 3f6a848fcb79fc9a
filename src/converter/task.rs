//! # Conversion Task Module
//!
//! Task indipendente per un singolo job, avviato subito alla submission.
//!
//! ## Macchina a stati:
//! `queued → (bloccato in pausa)* → pending → processing → {done | error}`
//!
//! ## Punti di sospensione:
//! 1. Gate di pausa (esce senza risorse se il job viene annullato)
//! 2. Slot della classe di tool, in competizione con la cancellazione
//! 3. Processo esterno, terminato se il job viene annullato
//!
//! ## Pulizia garantita:
//! Slot, entry del registro e destinazione riservata sono rilasciati da guard con `Drop`,
//! quindi su ogni percorso di uscita. Una destinazione non completata viene cancellata
//! prima del report finale. Un job annullato non riporta mai `done`.

use crate::{
    config::Config,
    converter::{
        controller::{JobController, Registration},
        limiter::ToolLimiter,
        path_resolver::PathResolver,
        reporter::StatusReporter,
    },
    destination::DestinationResolver,
    error::ConvertError,
    image_processor::ImageProcessor,
    job::{Job, JobStatus, ToolClass},
    video_processor::VideoProcessor,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every task of a manager
#[derive(Debug)]
pub struct TaskContext {
    pub controller: Arc<JobController>,
    pub limiter: ToolLimiter,
    pub destinations: DestinationResolver,
    pub reporter: StatusReporter,
}

/// Reserved output path; deleted on drop unless the job completed
struct DestinationGuard {
    context: Arc<TaskContext>,
    path: PathBuf,
    keep: bool,
}

impl DestinationGuard {
    fn new(context: Arc<TaskContext>, path: PathBuf) -> Self {
        Self {
            context,
            path,
            keep: false,
        }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        if !self.keep {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed incomplete output {}", self.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove incomplete output {}: {}", self.path.display(), e),
            }
        }
        self.context.destinations.release(&self.path);
    }
}

/// Worker for one job
pub struct ConversionTask {
    job: Job,
    registration: Registration,
    config: Arc<Config>,
    context: Arc<TaskContext>,
}

impl ConversionTask {
    pub fn new(job: Job, registration: Registration, config: Arc<Config>, context: Arc<TaskContext>) -> Self {
        Self {
            job,
            registration,
            config,
            context,
        }
    }

    /// Drive the job to a terminal state and report it
    pub async fn run(mut self) -> JobStatus {
        let outcome = self.execute().await;

        let ConversionTask {
            mut job,
            registration,
            context,
            ..
        } = self;
        let token = registration.token().clone();
        // Leaving the registry fixes the token: no cancel(id) can reach this job afterwards
        drop(registration);

        match outcome {
            Ok(guard) if !token.is_cancelled() => {
                guard.keep();
                job.mark_done();
                info!("✅ Converted {}", job.source.display());
            }
            Ok(guard) => {
                drop(guard);
                job.mark_failed(ConvertError::Cancelled.to_string());
                info!("🛑 Cancelled {}", job.source.display());
            }
            Err(e) if e.is_cancelled() || token.is_cancelled() => {
                job.mark_failed(ConvertError::Cancelled.to_string());
                info!("🛑 Cancelled {}", job.source.display());
            }
            Err(e) => {
                error!("❌ Failed to convert {}: {}", job.source.display(), e);
                job.mark_failed(e.to_string());
            }
        }

        context.reporter.job(&job);
        job.status
    }

    async fn execute(&mut self) -> Result<DestinationGuard, ConvertError> {
        let token = self.registration.token().clone();
        let context = &*self.context;
        let job = &mut self.job;

        if !context.controller.wait_gate(&token).await {
            return Err(ConvertError::Cancelled);
        }

        job.status = JobStatus::Pending;
        context.reporter.job(job);

        let class = job
            .kind
            .tool_class()
            .ok_or_else(|| ConvertError::UnsupportedFormat(job.source.display().to_string()))?;
        let _permit = context
            .limiter
            .acquire(class, &token)
            .await
            .ok_or(ConvertError::Cancelled)?;
        debug!("Acquired {} slot for {}", class.name(), job.id);

        let target = PathResolver::target(&job.source, job.kind, &self.config)?;
        PathResolver::ensure_dir(&target.dir).await?;
        let policy = PathResolver::collision_policy(&job.source, &target, self.config.collision_policy);
        let resolver = Arc::clone(&self.context);
        let destination = tokio::task::spawn_blocking(move || {
            resolver
                .destinations
                .resolve(&target.dir, &target.stem, target.extension, policy)
        })
        .await
        .map_err(|e| ConvertError::Io(std::io::Error::other(e)))??;
        // The guard deletes its path on failure, so it must never own the source
        if PathResolver::is_same_file(&destination, &job.source) {
            context.destinations.release(&destination);
            return Err(ConvertError::AlreadyExists(destination));
        }
        let guard = DestinationGuard::new(Arc::clone(&self.context), destination.clone());
        job.destination = Some(destination.clone());

        if token.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }

        job.status = JobStatus::Processing;
        context.reporter.job(job);

        let source = job.source.clone();
        match class {
            ToolClass::VideoTool => {
                let processor = VideoProcessor::new(Arc::clone(&self.config));
                processor
                    .convert(&source, &destination, &token, |update| {
                        let before = (job.progress, job.speed.clone());
                        job.set_progress(update.percent);
                        if update.speed.is_some() {
                            job.speed = update.speed;
                        }
                        if (job.progress, job.speed.clone()) != before {
                            context.reporter.job(job);
                        }
                    })
                    .await?;
            }
            ToolClass::ImageTool => {
                let processor = ImageProcessor::new(Arc::clone(&self.config));
                processor.convert(&source, &destination, &token).await?;
            }
        }

        Ok(guard)
    }
}
