//! # Destination Resolver Module
//!
//! Alloca path di output senza collisioni tramite placeholder creati atomicamente.
//!
//! ## Responsabilità:
//! - Applica la policy di collisione (`overwrite`, `error`, `rename`)
//! - Riserva il path con un file vuoto creato in modo esclusivo (`create_new`)
//! - Recupera i placeholder abbandonati (file a 0 byte) invece di numerare all'infinito
//! - Serializza tutte le risoluzioni del processo in un'unica sezione critica
//!
//! ## Policy:
//! - `overwrite`: `dir/stem.ext` sempre, nessun placeholder
//! - `error`: fallisce con `AlreadyExists` se `dir/stem.ext` esiste e non è vuoto
//! - `rename` (default): `dir/stem (1).ext`, `(2)`, ... finché una creazione esclusiva riesce
//!
//! Il resolver non cancella mai i placeholder: il runner li sovrascrive in caso
//! di successo o li rimuove in caso di fallimento. I path consegnati ai job ancora
//! in corso restano registrati finché il job non chiama `release`, così un
//! placeholder vuoto di un job vivo non viene mai riassegnato.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// What to do when the computed destination already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CollisionPolicy {
    Overwrite,
    Error,
    #[default]
    Rename,
}

impl From<String> for CollisionPolicy {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "overwrite" => Self::Overwrite,
            "error" => Self::Error,
            _ => Self::Rename,
        }
    }
}

/// Serializes destination allocation across every job of the process
#[derive(Debug, Default)]
pub struct DestinationResolver {
    /// Paths handed out to jobs that have not released them yet
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DestinationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an output path for `stem` + `extension` (extension includes the dot) in `dir`
    pub fn resolve(
        &self,
        dir: &Path,
        stem: &str,
        extension: &str,
        policy: CollisionPolicy,
    ) -> Result<PathBuf, ConvertError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);

        let dest = dir.join(format!("{}{}", stem, extension));
        if policy == CollisionPolicy::Overwrite {
            return Ok(dest);
        }

        // Stat, try to claim, and re-decide if another process won the race
        while !claimed.contains(&dest) {
            match fs::metadata(&dest) {
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if create_placeholder(&dest)? {
                        debug!("Claimed destination {}", dest.display());
                        claimed.insert(dest.clone());
                        return Ok(dest);
                    }
                }
                Err(e) => return Err(e.into()),
                Ok(meta) if meta.is_file() && meta.len() == 0 => {
                    debug!("Reclaiming empty placeholder {}", dest.display());
                    claimed.insert(dest.clone());
                    return Ok(dest);
                }
                Ok(_) => break,
            }
        }

        if policy == CollisionPolicy::Error {
            return Err(ConvertError::AlreadyExists(dest));
        }

        let mut index: u64 = 0;
        loop {
            index += 1;
            let candidate = dir.join(format!("{} ({}){}", stem, index, extension));
            if claimed.contains(&candidate) {
                continue;
            }
            if create_placeholder(&candidate)? {
                debug!("Claimed renamed destination {}", candidate.display());
                claimed.insert(candidate.clone());
                return Ok(candidate);
            }
        }
    }

    /// Forget a path handed out by `resolve` once its job has finished with it
    pub fn release(&self, path: &Path) {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        claimed.remove(path);
    }
}

/// Exclusively create an empty file. `Ok(false)` means the path is already taken.
fn create_placeholder(path: &Path) -> Result<bool, ConvertError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}
