//! # Task Optimizer Module
//!
//! Corpo di un singolo job: classifica il file e lo passa al producer giusto.
//! Gira dentro `spawn_blocking`, tutte le chiamate sono bloccanti.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::Profiles;
use crate::file_manager::{Asset, MediaKind};
use crate::image_processor::ImageProcessor;
use crate::processing_log::ProcessingLog;
use crate::settings::UserSettings;
use crate::tool_runner::ToolRunner;
use crate::video_processor::VideoProcessor;

/// Worker per l'elaborazione di un singolo asset
pub struct TaskOptimizer {
    image_processor: ImageProcessor,
    video_processor: VideoProcessor,
    runner: ToolRunner,
    log: Arc<ProcessingLog>,
}

impl TaskOptimizer {
    pub fn new(profiles: Arc<Profiles>, runner: ToolRunner, log: Arc<ProcessingLog>) -> Self {
        Self {
            image_processor: ImageProcessor::new(profiles.clone(), runner.clone(), log.clone()),
            video_processor: VideoProcessor::new(profiles, runner.clone(), log.clone()),
            runner,
            log,
        }
    }

    /// Processa un singolo file
    pub fn process(&self, path: &Path, settings: &UserSettings, output_root: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(anyhow::anyhow!("source file missing: {}", path.display()));
        }

        let asset = Asset::classify(path, &self.runner);
        debug!("Classified {} as {:?}", path.display(), asset.kind);

        match asset.kind {
            MediaKind::Image => self.image_processor.produce(&asset, settings, output_root),
            MediaKind::Video => self.video_processor.produce(&asset, settings, output_root),
            MediaKind::AudioOnly => self.video_processor.produce_audio(&asset, output_root),
            MediaKind::Unsupported => {
                self.log.info(format!("🤔 Skipping an unsupported file: {}", asset.file_name()))
            }
        }

        Ok(())
    }
}
