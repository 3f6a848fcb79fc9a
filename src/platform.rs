//! # Platform-specific utilities
//!
//! Questo modulo centralizza la creazione dei processi esterni in modo
//! cross-platform. Su Windows il processo viene avviato senza finestra console
//! (il motore gira dentro un'applicazione desktop); ovunque il processo viene
//! terminato se il suo handle viene rilasciato, così un job annullato non lascia
//! tool orfani in esecuzione.

use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Process construction shared by the video and image runners
pub struct PlatformCommands;

impl PlatformCommands {
    /// Build a command with stdin closed, no console window, and kill-on-drop
    pub fn command<S: AsRef<OsStr>>(program: S) -> Command {
        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        #[cfg(windows)]
        {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }

    /// Short tool name for messages, e.g. `ffmpeg` for `/usr/bin/ffmpeg`
    pub fn display_name(program: &std::path::Path) -> String {
        program
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string_lossy().into_owned())
    }
}
