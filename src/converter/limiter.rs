//! # Concurrency Limiter
//!
//! Un semaforo per classe di tool (video / immagine), con capacità presa dalla config.
//!
//! ## Regole:
//! - L'acquisizione di uno slot compete con la cancellazione del job: vince chi arriva prima
//! - Resize a runtime: il semaforo viene sostituito quando la capacità desiderata cambia.
//!   Chi detiene permessi del vecchio semaforo non viene interrotto, quindi una riduzione
//!   di capacità è pienamente rispettata solo quando i job in corso terminano.

use crate::config::Config;
use crate::job::ToolClass;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
struct Slots {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl Slots {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }
}

/// Per-tool-class counting semaphores
#[derive(Debug)]
pub struct ToolLimiter {
    video: Mutex<Slots>,
    image: Mutex<Slots>,
}

impl ToolLimiter {
    pub fn new(video_capacity: usize, image_capacity: usize) -> Self {
        info!("🔧 Concurrency configuration:");
        info!("  • Video tool: {} concurrent jobs", video_capacity.max(1));
        info!("  • Image tool: {} concurrent jobs", image_capacity.max(1));

        Self {
            video: Mutex::new(Slots::new(video_capacity)),
            image: Mutex::new(Slots::new(image_capacity)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.video_capacity(), config.image_capacity())
    }

    fn slots(&self, class: ToolClass) -> &Mutex<Slots> {
        match class {
            ToolClass::VideoTool => &self.video,
            ToolClass::ImageTool => &self.image,
        }
    }

    /// Live capacity for a class
    pub fn capacity(&self, class: ToolClass) -> usize {
        self.slots(class)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    /// Free slots on the live semaphore
    pub fn available(&self, class: ToolClass) -> usize {
        self.current(class).available_permits()
    }

    fn current(&self, class: ToolClass) -> Arc<Semaphore> {
        self.slots(class)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .semaphore
            .clone()
    }

    /// Wait for a slot, or return `None` as soon as `token` is cancelled
    pub async fn acquire(
        &self,
        class: ToolClass,
        token: &CancellationToken,
    ) -> Option<OwnedSemaphorePermit> {
        let semaphore = self.current(class);
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Cancelled while waiting for a {} slot", class.name());
                None
            }
            permit = semaphore.acquire_owned() => permit.ok(),
        }
    }

    /// Replace the class semaphore when `capacity` differs from the live one.
    /// Returns true if a new semaphore was installed.
    pub fn resize(&self, class: ToolClass, capacity: usize) -> bool {
        let capacity = capacity.max(1);
        let mut slots = self.slots(class).lock().unwrap_or_else(PoisonError::into_inner);
        if slots.capacity == capacity {
            return false;
        }

        info!(
            "🔧 Resizing {} tool slots: {} -> {}",
            class.name(),
            slots.capacity,
            capacity
        );
        *slots = Slots::new(capacity);
        true
    }

    pub fn apply_config(&self, config: &Config) {
        self.resize(ToolClass::VideoTool, config.video_capacity());
        self.resize(ToolClass::ImageTool, config.image_capacity());
    }
}
