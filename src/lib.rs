//! # Media Press Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per il server HTTP
//!
//! ## Architettura dei moduli:
//! - `config`: configurazione di processo e profili di dimensioni/compressione
//! - `error`: tipi di errore custom
//! - `settings`: impostazioni per batch (formati, modalità, dimensioni)
//! - `processing_log`: log condiviso visibile all'operatore
//! - `tool_resolver` / `tool_runner`: ricerca ed esecuzione di ffmpeg, ffprobe, sips
//! - `file_manager`: classificazione dei file e pulizia cartelle
//! - `planner`: calcolo delle varianti e nomi degli artefatti
//! - `image_processor` / `video_processor`: producer delle varianti
//! - `optimizer`: corpo del job e scheduler a pool limitato
//! - `state`: persistenza della cartella di lavoro
//! - `results`: elenco dei risultati con anteprima
//! - `service`: facciata `MediaPress`
//! - `server`: superficie HTTP locale
//! - `progress`: barra di avanzamento per la CLI
//!
//! ## Utilizzo:
//! ```ignore
//! use media_press::{Config, MediaPress, ProcessingLog, ToolPaths};
//!
//! let config = Config::default();
//! let log = Arc::new(ProcessingLog::new());
//! let runner = ToolRunner::new(Arc::new(SystemExecutor), ToolPaths::resolve(None)?, log.clone());
//! let press = MediaPress::open(&config, runner, log).await?;
//! let job_ids = press.upload(files, UserSettings::default()).await?;
//! ```

pub mod config;
pub mod error;
pub mod settings;
pub mod processing_log;
pub mod tool_resolver;
pub mod tool_runner;
pub mod file_manager;
pub mod planner;
pub mod image_processor;
pub mod video_processor;
pub mod optimizer;
pub mod state;
pub mod results;
pub mod service;
pub mod server;
pub mod progress;

pub use config::{Config, Profiles};
pub use error::PressError;
pub use optimizer::{JobId, JobScheduler, TaskOptimizer};
pub use processing_log::ProcessingLog;
pub use service::MediaPress;
pub use settings::{CompressionMode, ImageFormat, UserSettings, VideoContainer};
pub use tool_resolver::ToolPaths;
