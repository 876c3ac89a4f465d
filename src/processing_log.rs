//! # Processing Log
//!
//! Log di sessione condiviso da tutti i job e letto dalla UI tramite polling.
//!
//! ## Responsabilità:
//! - Append serializzato tramite un singolo `Mutex`
//! - Snapshot della sequenza corrente
//! - Reset a una riga sentinella su richiesta dell'operatore
//!
//! Le righe `info` finiscono nel log e in `tracing`; le righe `debug`
//! (comandi, stderr completi, catene di errori) solo in `tracing`.

use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Line the log is reset to on clear
pub const SESSION_SENTINEL: &str = "--- New processing session ---";

/// Append-only, session-scoped log of human-readable lines
#[derive(Debug, Default)]
pub struct ProcessingLog {
    lines: Mutex<Vec<String>>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operator-visible line
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.lock().push(message);
    }

    /// Diagnostic line, never shown to the operator
    pub fn debug(&self, message: impl AsRef<str>) {
        debug!("{}", message.as_ref());
    }

    /// Copy of the current lines
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Reset to the session sentinel
    pub fn clear(&self) {
        let mut lines = self.lock();
        lines.clear();
        lines.push(SESSION_SENTINEL.to_string());
    }

    // A job that panicked while holding the lock must not silence the log.
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
