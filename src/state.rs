//! # State Management Module
//!
//! Questo modulo persiste la directory di lavoro scelta dall'utente.
//!
//! ## Responsabilità:
//! - Legge/scrive `~/.media_press_settings.json` (`{"base_directory": ...}`)
//! - Ricava la cartella di lavoro `<base>/Media Press Files` con `source/` e `output/`
//! - Crea le sottocartelle in modo idempotente al caricamento
//! - Elimina il file di settings se corrotto o se la cartella di lavoro non esiste più
//!
//! ## Stato "non configurato":
//! `load()` ritorna `None` finché l'utente non sceglie una directory; le
//! operazioni che richiedono le cartelle rispondono con `NotConfigured`.
//!
//! ## Esempio:
//! ```ignore
//! let store = SettingsStore::new(None)?;
//! let dirs = match store.load().await {
//!     Some(dirs) => dirs,
//!     None => store.save(&chosen_base).await?,
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::error::PressError;

/// Folder created inside the chosen base directory
pub const APP_DATA_FOLDER_NAME: &str = "Media Press Files";
const SETTINGS_FILE_NAME: &str = ".media_press_settings.json";

/// On-disk settings document
#[derive(Debug, Serialize, Deserialize)]
struct SettingsFile {
    base_directory: PathBuf,
}

/// Resolved working folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkDirs {
    pub work_dir: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl WorkDirs {
    pub fn for_base(base_directory: &Path) -> Self {
        let work_dir = base_directory.join(APP_DATA_FOLDER_NAME);
        Self {
            source_dir: work_dir.join("source"),
            output_dir: work_dir.join("output"),
            work_dir,
        }
    }

    async fn ensure(&self) -> Result<(), PressError> {
        fs::create_dir_all(&self.source_dir).await?;
        fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }
}

/// Persists the chosen base directory for the local user
pub struct SettingsStore {
    settings_file: PathBuf,
}

impl SettingsStore {
    /// `settings_file = None` uses the file in the home directory
    pub fn new(settings_file: Option<PathBuf>) -> Result<Self, PressError> {
        let settings_file = match settings_file {
            Some(path) => path,
            None => dirs::home_dir()
                .ok_or_else(|| PressError::Settings("could not find home directory".to_string()))?
                .join(SETTINGS_FILE_NAME),
        };
        Ok(Self { settings_file })
    }

    pub fn path(&self) -> &Path {
        &self.settings_file
    }

    /// Load the working folders, or `None` when not configured
    pub async fn load(&self) -> Option<WorkDirs> {
        let content = match fs::read_to_string(&self.settings_file).await {
            Ok(content) => content,
            Err(_) => {
                info!("Configuration file not found. Initial configuration required.");
                return None;
            }
        };

        let settings: SettingsFile = match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Error loading settings: {}. Deleting a corrupted file.", e);
                self.discard().await;
                return None;
            }
        };

        let dirs = WorkDirs::for_base(&settings.base_directory);
        if !dirs.work_dir.is_dir() {
            warn!(
                "Working folder '{}' not found. Reconfiguration required.",
                dirs.work_dir.display()
            );
            self.discard().await;
            return None;
        }

        if let Err(e) = dirs.ensure().await {
            warn!("Cannot prepare working folders in {}: {}", dirs.work_dir.display(), e);
            return None;
        }

        info!("✅ Settings successfully loaded. Working folder: {}", dirs.work_dir.display());
        Some(dirs)
    }

    /// Persist `base_directory` and create its working folders
    pub async fn save(&self, base_directory: &Path) -> Result<WorkDirs, PressError> {
        if !base_directory.is_dir() {
            return Err(PressError::Validation(format!(
                "base directory does not exist: {}",
                base_directory.display()
            )));
        }

        let dirs = WorkDirs::for_base(base_directory);
        dirs.ensure().await?;

        let document = SettingsFile {
            base_directory: base_directory.to_path_buf(),
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| PressError::Settings(e.to_string()))?;
        fs::write(&self.settings_file, content).await?;

        info!("Settings saved to file: {}", self.settings_file.display());
        Ok(dirs)
    }

    async fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.settings_file).await {
            warn!("Cannot remove settings file {}: {}", self.settings_file.display(), e);
        }
    }
}
