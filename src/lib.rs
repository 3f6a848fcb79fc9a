//! # Share Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare del motore di conversione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per il front end desktop
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione, validazione, caricamento/salvataggio JSON
//! - `error`: Tassonomia degli errori di conversione
//! - `job`: Modello dati del job e dei suoi stati
//! - `file_manager`: Normalizzazione e validazione dei path, discovery
//! - `destination`: Allocazione collision-safe del path di destinazione
//! - `diagnostics`: Parser incrementale dello stderr del tool video
//! - `platform`: Creazione dei processi esterni
//! - `video_processor`: Conversione video → MP4
//! - `image_processor`: Conversione HEIC → JPEG
//! - `json_output`: Eventi di stato in formato JSON
//! - `converter`: Motore concorrente (submission, pausa, cancellazione, limiti)
//! - `progress`: Progress bar e statistiche per la CLI
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use share_converter::{Config, JobManager};
//!
//! let (manager, mut events) = JobManager::new(Config::default(), Handle::current());
//! manager.submit(["/videos/IMG_0001.MOV", "/photos/IMG_0002.HEIC"]);
//! ```

pub mod config;
pub mod converter;
pub mod destination;
pub mod diagnostics;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod job;
pub mod json_output;
pub mod platform;
pub mod progress;
pub mod video_processor;

pub use config::Config;
pub use converter::JobManager;
pub use destination::{CollisionPolicy, DestinationResolver};
pub use error::ConvertError;
pub use job::{Job, JobStatus};
pub use json_output::{JsonMessage, StatusRecord};
