//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom della pressa.
//!
//! ## Responsabilità:
//! - Definisce `PressError` per categorizzare gli errori di configurazione,
//!   di invocazione dei tool esterni e di input
//! - Integra con `thiserror` per la conversione automatica da errori standard
//! - Permette all'HTTP layer di distinguere errori "400" da errori interni
//!
//! ## Categorie di errori:
//! - `Io`: errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: decode/encode falliti (immagini corrotte, formati non riconosciuti)
//! - `Tool`: tool esterno terminato con exit code non zero
//! - `ToolNotFound`: binario esterno non lanciabile
//! - `MissingDependency`: tool richiesto all'avvio mancante (ffmpeg, ffprobe, sips)
//! - `Validation`: input utente non valido (settings, nomi file)
//! - `NotConfigured`: directory di lavoro non ancora scelta
//! - `Settings`: file di settings illeggibile o non scrivibile
//!
//! ## Esempio:
//! ```ignore
//! if !tool_exists {
//!     return Err(PressError::MissingDependency("ffmpeg".to_string()));
//! }
//! ```

/// Custom error types for the media press
#[derive(thiserror::Error, Debug)]
pub enum PressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Not found `{0}`")]
    ToolNotFound(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Working folder not configured")]
    NotConfigured,

    #[error("Settings file error: {0}")]
    Settings(String),
}

impl PressError {
    /// Errors the caller can fix by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::Validation(_))
    }
}
