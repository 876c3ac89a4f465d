//! # Media Press Service
//!
//! Facciata usata sia dal server HTTP sia dalla CLI.
//!
//! ## Responsabilità:
//! - Mantiene le cartelle di lavoro correnti (o lo stato "non configurato")
//! - Salva i file caricati in `source/` e sottomette un job per file
//! - Espone polling dei job, log di elaborazione, pulizia e risultati

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::PressError;
use crate::file_manager::FileManager;
use crate::optimizer::{JobId, JobScheduler, TaskOptimizer};
use crate::processing_log::ProcessingLog;
use crate::results::{list_results, ResultEntry};
use crate::settings::UserSettings;
use crate::state::{SettingsStore, WorkDirs};
use crate::tool_runner::ToolRunner;

/// A file received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub contents: Vec<u8>,
}

/// Names that would overwrite something already present
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingFiles {
    pub existing_in_source: Vec<String>,
    pub existing_in_output: Vec<String>,
}

pub struct MediaPress {
    log: Arc<ProcessingLog>,
    scheduler: JobScheduler,
    store: SettingsStore,
    dirs: RwLock<Option<WorkDirs>>,
}

impl MediaPress {
    /// Build the service and load the persisted working folders, if any
    pub async fn open(
        config: &Config,
        runner: ToolRunner,
        log: Arc<ProcessingLog>,
    ) -> Result<Self, PressError> {
        let store = SettingsStore::new(config.settings_file.clone())?;
        let dirs = store.load().await;

        let optimizer = TaskOptimizer::new(Arc::new(config.profiles.clone()), runner, log.clone());
        let scheduler = JobScheduler::new(config.worker_count(), Arc::new(optimizer), log.clone());
        info!("Media press ready with {} worker(s)", scheduler.workers());

        Ok(Self {
            log,
            scheduler,
            store,
            dirs: RwLock::new(dirs),
        })
    }

    pub async fn work_dirs(&self) -> Option<WorkDirs> {
        self.dirs.read().await.clone()
    }

    pub async fn work_directory(&self) -> Option<PathBuf> {
        self.dirs.read().await.as_ref().map(|d| d.work_dir.clone())
    }

    /// Persist a new base directory and switch to its working folders
    pub async fn set_work_directory(&self, base_directory: &Path) -> Result<WorkDirs, PressError> {
        let dirs = self.store.save(base_directory).await?;
        *self.dirs.write().await = Some(dirs.clone());
        Ok(dirs)
    }

    /// Report which of `names` already exist in source or have an output folder
    pub async fn check_files(&self, names: &[String]) -> Result<ExistingFiles, PressError> {
        let dirs = self.require_dirs().await?;
        let mut report = ExistingFiles::default();

        for name in names {
            let Some(clean) = sanitize_file_name(name) else { continue };
            if dirs.source_dir.join(&clean).exists() {
                report.existing_in_source.push(name.clone());
            }
            let stem = Path::new(&clean)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !stem.is_empty() && dirs.output_dir.join(&stem).exists() {
                report.existing_in_output.push(name.clone());
            }
        }

        Ok(report)
    }

    /// Store every file into `source/` and submit one job per file
    pub async fn upload(
        &self,
        files: Vec<UploadedFile>,
        settings: UserSettings,
    ) -> Result<Vec<JobId>, PressError> {
        let dirs = self.require_dirs().await?;
        let mut job_ids = Vec::with_capacity(files.len());

        for file in files {
            let Some(name) = sanitize_file_name(&file.name) else {
                debug!("Ignoring upload with unusable name {:?}", file.name);
                continue;
            };
            let target = dirs.source_dir.join(&name);
            fs::write(&target, &file.contents).await?;
            self.log.info(format!("📥 Uploaded: {}", name));

            job_ids.push(self.scheduler.submit(target, settings.clone(), dirs.output_dir.clone()));
        }

        Ok(job_ids)
    }

    /// Copy local files into `source/` and submit them
    pub async fn import(
        &self,
        paths: &[PathBuf],
        settings: UserSettings,
    ) -> Result<Vec<JobId>, PressError> {
        let dirs = self.require_dirs().await?;
        let mut job_ids = Vec::with_capacity(paths.len());

        for path in paths {
            let Some(name) = path.file_name() else {
                return Err(PressError::Validation(format!("not a file: {}", path.display())));
            };
            let target = dirs.source_dir.join(name);
            if target != *path {
                fs::copy(path, &target).await?;
            }
            self.log.info(format!("📥 Uploaded: {}", name.to_string_lossy()));
            job_ids.push(self.scheduler.submit(target, settings.clone(), dirs.output_dir.clone()));
        }

        Ok(job_ids)
    }

    /// Submit files where they are, writing into `output_root`
    pub fn submit_in_place(
        &self,
        paths: &[PathBuf],
        settings: UserSettings,
        output_root: &Path,
    ) -> Vec<JobId> {
        paths
            .iter()
            .map(|path| {
                self.scheduler
                    .submit(path.clone(), settings.clone(), output_root.to_path_buf())
            })
            .collect()
    }

    /// Reap finished jobs, returning how many are still active
    pub fn processing_status(&self) -> usize {
        self.scheduler.poll()
    }

    pub fn log_snapshot(&self) -> Vec<String> {
        self.log.snapshot()
    }

    pub fn clear_log(&self) {
        self.log.clear();
    }

    /// Empty `source/` and `output/`, keeping the folders themselves
    pub async fn clear_all(&self) -> Result<(), PressError> {
        let dirs = self.require_dirs().await?;
        self.log.info("🧹 Cleaning the source and output folders...");

        let outcome = tokio::task::spawn_blocking(move || -> std::io::Result<usize> {
            Ok(FileManager::clear_contents(&dirs.source_dir)?
                + FileManager::clear_contents(&dirs.output_dir)?)
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|r| r);

        match outcome {
            Ok(removed) => {
                debug!("Removed {} entries", removed);
                self.log.info("✅ Folders successfully cleaned.");
                Ok(())
            }
            Err(e) => {
                self.log.info(format!("🚨 Failed to clean the folders: {}", e));
                Err(e.into())
            }
        }
    }

    /// Listing of the output folder; empty when not configured
    pub async fn results(&self) -> Vec<ResultEntry> {
        let Some(dirs) = self.work_dirs().await else {
            return Vec::new();
        };
        tokio::task::spawn_blocking(move || list_results(&dirs.output_dir))
            .await
            .unwrap_or_default()
    }

    /// Wait for every in-flight job
    pub async fn shutdown(&self) {
        info!("Waiting for in-flight jobs...");
        self.scheduler.drain().await;
    }

    async fn require_dirs(&self) -> Result<WorkDirs, PressError> {
        self.work_dirs().await.ok_or(PressError::NotConfigured)
    }
}

/// Reduce a client-supplied name to its final path component
fn sanitize_file_name(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing_log::SESSION_SENTINEL;
    use crate::tool_runner::testing::{runner, FakeExecutor};
    use tempfile::TempDir;

    async fn press(dir: &TempDir) -> MediaPress {
        let config = Config {
            workers: 2,
            settings_file: Some(dir.path().join("settings.json")),
            ..Default::default()
        };
        let log = Arc::new(ProcessingLog::new());
        MediaPress::open(&config, runner(FakeExecutor::succeeding(), log.clone()), log)
            .await
            .unwrap()
    }

    async fn configured(dir: &TempDir) -> (MediaPress, WorkDirs) {
        let press = press(dir).await;
        let base = dir.path().join("base");
        std::fs::create_dir(&base).unwrap();
        let dirs = press.set_work_directory(&base).await.unwrap();
        (press, dirs)
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::RgbImage::from_pixel(40, 20, image::Rgb([200, 10, 10]))
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\Users\\me\\a.png").as_deref(), Some("a.png"));
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("dir/.."), None);
    }

    #[tokio::test]
    async fn test_unconfigured_operations() {
        let dir = TempDir::new().unwrap();
        let press = press(&dir).await;

        assert_eq!(press.work_directory().await, None);
        assert!(matches!(press.check_files(&["a.png".into()]).await, Err(PressError::NotConfigured)));
        assert!(matches!(press.upload(vec![], UserSettings::default()).await, Err(PressError::NotConfigured)));
        assert!(matches!(press.clear_all().await, Err(PressError::NotConfigured)));
        assert!(press.results().await.is_empty());
    }

    #[tokio::test]
    async fn test_check_files() {
        let dir = TempDir::new().unwrap();
        let (press, dirs) = configured(&dir).await;
        std::fs::write(dirs.source_dir.join("a.png"), b"x").unwrap();
        std::fs::create_dir(dirs.output_dir.join("b")).unwrap();

        let report = press
            .check_files(&["a.png".into(), "b.mov".into(), "c.jpg".into()])
            .await
            .unwrap();
        assert_eq!(report.existing_in_source, vec!["a.png"]);
        assert_eq!(report.existing_in_output, vec!["b.mov"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_upload_processes_and_lists_results() {
        let dir = TempDir::new().unwrap();
        let (press, dirs) = configured(&dir).await;

        let settings = UserSettings {
            sizes_to_process: vec!["thumb".into(), "full_size".into()],
            ..Default::default()
        };
        let files = vec![
            UploadedFile { name: "../red.png".into(), contents: png_bytes() },
            UploadedFile { name: "".into(), contents: vec![] },
        ];
        let ids = press.upload(files, settings).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(dirs.source_dir.join("red.png").is_file());

        press.shutdown().await;
        assert_eq!(press.processing_status(), 0);

        let results = press.results().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "red");
        let names: Vec<_> = results[0].files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["red_full_size.webp", "red_thumb@1x.webp"]);

        let log = press.log_snapshot();
        assert!(log.contains(&"📥 Uploaded: red.png".to_string()));
        assert!(log.contains(&"✅ Done: red.png".to_string()));
    }

    #[tokio::test]
    async fn test_clear_all_keeps_roots() {
        let dir = TempDir::new().unwrap();
        let (press, dirs) = configured(&dir).await;
        std::fs::write(dirs.source_dir.join("a.png"), b"x").unwrap();
        std::fs::create_dir(dirs.output_dir.join("a")).unwrap();
        std::fs::write(dirs.output_dir.join("a/a_thumb.webp"), b"x").unwrap();

        press.clear_all().await.unwrap();

        assert!(dirs.source_dir.is_dir());
        assert!(dirs.output_dir.is_dir());
        assert_eq!(std::fs::read_dir(&dirs.source_dir).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&dirs.output_dir).unwrap().count(), 0);
        assert_eq!(
            press.log_snapshot(),
            vec!["🧹 Cleaning the source and output folders...", "✅ Folders successfully cleaned."]
        );

        press.clear_log();
        assert_eq!(press.log_snapshot(), vec![SESSION_SENTINEL]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_work_directory() {
        let dir = TempDir::new().unwrap();
        let (_, dirs) = configured(&dir).await;

        let reopened = press(&dir).await;
        assert_eq!(reopened.work_directory().await, Some(dirs.work_dir));
    }
}
