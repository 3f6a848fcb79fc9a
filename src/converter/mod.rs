//! # Converter Module
//!
//! Motore di conversione concorrente, separato in sottomoduli:
//! - `job_manager`: submission, deduplica e facciata pubblica
//! - `controller`: pausa/ripresa e registro di cancellazione
//! - `limiter`: semafori per classe di tool
//! - `task`: worker per il singolo job
//! - `path_resolver`: directory e nome base della destinazione
//! - `reporter`: canale degli eventi di stato

pub mod controller;
pub mod job_manager;
pub mod limiter;
pub mod path_resolver;
pub mod reporter;
pub mod task;

pub use controller::JobController;
pub use job_manager::JobManager;
pub use limiter::ToolLimiter;
pub use path_resolver::PathResolver;
pub use reporter::StatusReporter;
