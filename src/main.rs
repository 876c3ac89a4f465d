//! # Media Press - Main Entry Point
//!
//! Punto di ingresso della CLI.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti con `clap` (sottocomandi serve/process/configure/results/clear)
//! - Inizializzazione del logging con `tracing`
//! - Caricamento della configurazione e verifica dei tool esterni
//! - Avvio del server HTTP o di un batch one-shot
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-press configure ~/Desktop
//! media-press serve --port 5000
//! media-press process photo.jpg clip.mov --sizes thumb --sizes 720p --retina
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use media_press::file_manager::FileManager;
use media_press::progress::ProgressManager;
use media_press::results::list_results;
use media_press::state::SettingsStore;
use media_press::tool_runner::{SystemExecutor, ToolRunner};
use media_press::{server, Config, MediaPress, ProcessingLog, ToolPaths, UserSettings};

#[derive(Parser)]
#[command(name = "media-press")]
#[command(about = "Render resized and compressed variants of images, videos and audio")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (JSON) with profiles and process settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the local HTTP surface
    Serve {
        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of parallel workers (0 = one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Process files once and wait for every job
    Process {
        /// Files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write variants here instead of the configured output folder
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Image output format (webp, jpg, jpeg, png)
        #[arg(long, default_value = "webp")]
        image_format: String,

        /// Video container (mp4, webm, ...)
        #[arg(long, default_value = "mp4")]
        video_format: String,

        /// Compression mode (standard, max_compression)
        #[arg(long, default_value = "standard")]
        compression_mode: String,

        /// Size labels to render (repeatable), e.g. thumb, 720p, full_size
        #[arg(long = "sizes")]
        sizes: Vec<String>,

        /// Comma-separated custom sizes in pixels
        #[arg(long, default_value = "")]
        custom_sizes: String,

        /// Also render @2x image variants
        #[arg(long)]
        retina: bool,
    },

    /// Persist the base directory that holds the working folder
    Configure {
        base_directory: PathBuf,
    },

    /// Print the results listing as JSON
    Results,

    /// Empty the source and output folders
    Clear,

    /// Write the effective configuration (defaults or --config) to a file
    InitConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    match args.command {
        Command::Serve { port, workers } => {
            let mut config = config;
            if let Some(port) = port {
                config.server_port = port;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.validate()?;

            let press = Arc::new(open_press(&config).await?);
            if press.work_directory().await.is_none() {
                info!(
                    "No working folder yet: POST /work_directory or run `media-press configure <DIR>`"
                );
            }
            server::serve(press, config.server_port, &config.static_dir).await?;
        }

        Command::Process {
            files,
            output,
            image_format,
            video_format,
            compression_mode,
            sizes,
            custom_sizes,
            retina,
        } => {
            for file in &files {
                if !file.is_file() {
                    return Err(anyhow::anyhow!("File does not exist: {}", file.display()));
                }
                if FileManager::is_supported_format(file) {
                    let size = std::fs::metadata(file)?.len();
                    info!("Queued {} ({})", file.display(), FileManager::format_size(size));
                } else {
                    warn!("Unsupported file, it will be skipped: {}", file.display());
                }
            }

            let settings = UserSettings {
                image_format: image_format.parse()?,
                video_format: video_format.parse()?,
                compression_mode: compression_mode.parse()?,
                sizes_to_process: sizes,
                custom_sizes,
                include_retina: retina,
            };

            let press = open_press(&config).await?;
            let job_ids = match output {
                Some(ref output_dir) => {
                    if !output_dir.exists() {
                        std::fs::create_dir_all(output_dir)?;
                        info!("Created output directory: {}", output_dir.display());
                    }
                    press.submit_in_place(&files, settings, output_dir)
                }
                None => press.import(&files, settings).await?,
            };

            let total = job_ids.len() as u64;
            let progress = if std::io::stderr().is_terminal() {
                ProgressManager::new(total)
            } else {
                ProgressManager::hidden(total)
            };
            loop {
                let active = press.processing_status();
                progress.set_active(active);
                if active == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            progress.finish(&format!("✅ {}/{} jobs finished", progress.position(), total));

            for line in press.log_snapshot() {
                println!("{}", line);
            }
        }

        Command::Configure { base_directory } => {
            let store = SettingsStore::new(config.settings_file.clone())?;
            let dirs = store.save(&base_directory).await?;
            println!("Working folder: {}", dirs.work_dir.display());
        }

        Command::Results => {
            let store = SettingsStore::new(config.settings_file.clone())?;
            let results = match store.load().await {
                Some(dirs) => list_results(&dirs.output_dir),
                None => Vec::new(),
            };
            let listing = serde_json::json!({ "results": results });
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }

        Command::Clear => {
            let store = SettingsStore::new(config.settings_file.clone())?;
            let dirs = store
                .load()
                .await
                .ok_or_else(|| anyhow::anyhow!("Working folder not configured"))?;
            let removed = FileManager::clear_contents(&dirs.source_dir)?
                + FileManager::clear_contents(&dirs.output_dir)?;
            println!("✅ Folders successfully cleaned ({} entries removed).", removed);
        }

        Command::InitConfig { path } => {
            config.save_to_file(&path).await?;
            println!("Configuration written to {}", path.display());
        }
    }

    Ok(())
}

/// Resolve the external tools (fatal when missing) and build the service
async fn open_press(config: &Config) -> Result<MediaPress> {
    let tools = ToolPaths::resolve(config.tools_dir.as_deref())?;
    let log = Arc::new(ProcessingLog::new());
    let runner = ToolRunner::new(Arc::new(SystemExecutor), tools, log.clone());
    Ok(MediaPress::open(config, runner, log).await?)
}
