//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore di una singola conversione.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` per categorizzare tutti i fallimenti di un job
//! - Distingue la cancellazione richiesta dall'utente da un fallimento generico
//! - Trasporta la coda dei messaggi diagnostici quando il tool esterno fallisce
//!
//! ## Categorie di errori:
//! - `InvalidInput`: path inesistente, directory o file vuoto
//! - `UnsupportedFormat`: estensione non gestita da nessun tool
//! - `AlreadyExists`: destinazione occupata con policy `error`
//! - `ToolLaunch`: eseguibile non trovato o non avviabile
//! - `ToolExecution`: exit code diverso da zero (con tail diagnostico)
//! - `Cancelled`: job annullato dall'utente, mai riportato come `done`
//! - `Io`: errori di I/O durante allocazione o cleanup
//!
//! ## Propagazione:
//! Tutti gli errori sono locali al job che li genera e vengono riportati
//! tramite lo Status Reporter: nessun errore interrompe gli altri job del batch.

use std::path::PathBuf;

/// Failure of a single conversion job
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("could not start {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} finished with error: {status}. Log: {tail}")]
    ToolExecution {
        tool: String,
        status: String,
        tail: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// True when the job ended because the user cancelled it
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
