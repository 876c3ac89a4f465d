//! # Video Processing Module
//!
//! Questo modulo produce poster e rendition di un video, oppure l'unico mp3
//! di un container solo audio. Tutto l'encoding è delegato a ffmpeg.
//!
//! ## Pipeline video:
//! 1. Poster WebP 640px dal primo frame dopo 1s (best effort)
//! 2. Codec dal container: mp4 → H.264/AAC, webm → VP9/Opus, altri → H.264/AAC
//! 3. Una rendition per label: `scale=-2:<altezza>`, CRF e preset del tier, audio 128k
//! 4. Full size senza filtro di scala, audio 192k
//! 5. `max_compression`: ripete 3-4 con il tier compresso e il suffisso `_compressed`
//!
//! ## Gestione errori:
//! Ogni invocazione è indipendente: una rendition fallita viene loggata con
//! l'ultima riga di stderr e le successive proseguono.
//!
//! ## Solo audio:
//! `ffmpeg -i <in> -c:a libmp3lame -q:a 2 <base>/<base>.mp3`, ignorando
//! dimensioni e formato richiesti.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::args;
use crate::config::Profiles;
use crate::file_manager::Asset;
use crate::planner::{self, Artifact};
use crate::processing_log::ProcessingLog;
use crate::settings::{CompressionMode, UserSettings};
use crate::tool_resolver::Tool;
use crate::tool_runner::ToolRunner;

const POSTER_WIDTH: u32 = 640;
const SIZED_AUDIO_BITRATE: &str = "128k";
const FULL_SIZE_AUDIO_BITRATE: &str = "192k";

/// Produces video renditions and audio-only transcodes
pub struct VideoProcessor {
    profiles: Arc<Profiles>,
    runner: ToolRunner,
    log: Arc<ProcessingLog>,
}

impl VideoProcessor {
    pub fn new(profiles: Arc<Profiles>, runner: ToolRunner, log: Arc<ProcessingLog>) -> Self {
        Self { profiles, runner, log }
    }

    /// Render poster and renditions of a video asset
    pub fn produce(&self, asset: &Asset, settings: &UserSettings, output_root: &Path) {
        let name = asset.file_name();
        if let Err(e) = self.try_produce(asset, settings, output_root) {
            self.log.info(format!("🚨 Video processing error {}: {}", name, e));
            self.log.debug(format!("{:?}", e));
        }
    }

    /// Transcode an audio-only container to a single mp3
    pub fn produce_audio(&self, asset: &Asset, output_root: &Path) {
        let name = asset.file_name();
        if let Err(e) = self.try_produce_audio(asset, output_root) {
            self.log.info(format!("🚨 Audio processing error {}: {}", name, e));
            self.log.debug(format!("{:?}", e));
        }
    }

    fn try_produce(
        &self,
        asset: &Asset,
        settings: &UserSettings,
        output_root: &Path,
    ) -> Result<()> {
        let name = asset.file_name();
        let plan = planner::plan(asset.kind, self.profiles.video_heights(), settings, &self.log);

        self.log.info(format!(
            "  > Selected video sizes: {:?}",
            plan.sizes.keys().collect::<Vec<_>>()
        ));

        let output_dir = output_root.join(&asset.base_name);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;

        let container = &settings.video_format;
        let (video_codec, audio_codec, ext) =
            (container.video_codec(), container.audio_codec(), container.extension());
        self.log.info(format!("🎬 Video processing: {}", name));

        let poster = output_dir.join(Artifact::Poster.file_name(&asset.base_name, false, ext));
        let poster_args = args![
            "-i", asset.path.display(),
            "-ss", "00:00:01",
            "-vframes", 1,
            "-vf", format!("scale={}:-1", POSTER_WIDTH),
            "-q:v", 2,
            poster.display(),
            "-y",
        ];
        // best effort, failure is already logged by the runner
        let _ = self.runner.run(Tool::Ffmpeg, poster_args, "  ✓ Creating a poster:");

        if plan.is_empty() {
            self.log.info(format!("  ⚠️ No output requested for {}", name));
        }

        let mut failures = 0;
        for tier in &plan.tiers {
            let compressed = *tier == CompressionMode::MaxCompression;
            let video_tier = self.profiles.video_tier(*tier);
            let (crf, preset) = (video_tier.crf, video_tier.preset.as_str());

            if !plan.is_empty() {
                self.log.info(format!(
                    "  ↳ Creating {} versions (crf={}, preset={})",
                    if compressed { "compressed" } else { "standard" },
                    crf,
                    preset
                ));
            }
            let indent = if compressed { "      " } else { "    " };
            let done = if compressed { "Compressed version created" } else { "Version created" };

            for (label, height) in &plan.sizes {
                let file_name =
                    Artifact::Video { label }.file_name(&asset.base_name, compressed, ext);
                let cmd = args![
                    "-i", asset.path.display(),
                    "-vf", format!("scale=-2:{}", height),
                    "-c:v", video_codec,
                    "-preset", preset,
                    "-crf", crf,
                    "-c:a", audio_codec,
                    "-b:a", SIZED_AUDIO_BITRATE,
                    output_dir.join(&file_name).display(),
                    "-y",
                ];
                let prefix = format!("{}✓ {} {}p", indent, done, height);
                if self.runner.run(Tool::Ffmpeg, cmd, &prefix).is_err() {
                    failures += 1;
                }
            }

            if plan.full_size {
                let file_name = Artifact::FullSize.file_name(&asset.base_name, compressed, ext);
                let cmd = args![
                    "-i", asset.path.display(),
                    "-c:v", video_codec,
                    "-preset", preset,
                    "-crf", crf,
                    "-c:a", audio_codec,
                    "-b:a", FULL_SIZE_AUDIO_BITRATE,
                    output_dir.join(&file_name).display(),
                    "-y",
                ];
                let prefix = format!("{}✓ {} {}", indent, done, planner::FULL_SIZE);
                if self.runner.run(Tool::Ffmpeg, cmd, &prefix).is_err() {
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            self.log.info(format!(
                "⚠️ Video {} processed with {} failed rendition(s).",
                name, failures
            ));
        } else {
            self.log.info(format!("✅ Video {} processed.", name));
        }
        Ok(())
    }

    fn try_produce_audio(&self, asset: &Asset, output_root: &Path) -> Result<()> {
        let name = asset.file_name();
        self.log.info(format!("🎵 Audio processing: {}", name));

        let output_dir = output_root.join(&asset.base_name);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;

        let target = output_dir.join(Artifact::Audio.file_name(&asset.base_name, false, "mp3"));
        let cmd = args![
            "-i", asset.path.display(),
            "-c:a", "libmp3lame",
            "-q:a", 2,
            target.display(),
            "-y",
        ];
        self.runner.run(Tool::Ffmpeg, cmd, "  ✓ Conversion to mp3:")?;

        self.log.info(format!("✅ Audio {} completed.", name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_manager::MediaKind;
    use crate::settings::VideoContainer;
    use crate::tool_runner::testing::{runner, touch_output, FakeExecutor};
    use crate::tool_runner::ToolOutput;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn profiles() -> Arc<Profiles> {
        let mut profiles = Profiles::default();
        let heights = &mut profiles.video_profiles.get_mut(crate::config::DEFAULT_PROFILE).unwrap().heights_map;
        heights.clear();
        heights.insert("480p".to_string(), 480);
        heights.insert("720p".to_string(), 720);
        Arc::new(profiles)
    }

    fn asset(path: &Path, kind: MediaKind) -> Asset {
        Asset {
            path: path.to_path_buf(),
            base_name: path.file_stem().unwrap().to_string_lossy().into_owned(),
            kind,
        }
    }

    fn listing(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standard_renditions() {
        let dir = TempDir::new().unwrap();
        let executor = FakeExecutor::succeeding();
        let log = Arc::new(ProcessingLog::new());
        let processor = VideoProcessor::new(profiles(), runner(executor.clone(), log.clone()), log.clone());

        let settings = UserSettings {
            sizes_to_process: vec!["720p".into(), "full_size".into()],
            ..Default::default()
        };
        processor.produce(&asset(Path::new("/in/clip.mov"), MediaKind::Video), &settings, dir.path());

        assert_eq!(
            listing(&dir.path().join("clip")),
            names(&["clip_poster.webp", "clip_720p.mp4", "clip_full_size.mp4"])
        );

        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        let poster = &calls[0].1;
        assert!(poster.windows(2).any(|w| w == ["-vf", "scale=640:-1"]));
        assert!(poster.windows(2).any(|w| w == ["-ss", "00:00:01"]));

        let sized = &calls[1].1;
        assert!(sized.windows(2).any(|w| w == ["-vf", "scale=-2:720"]));
        assert!(sized.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(sized.windows(2).any(|w| w == ["-crf", "23"]));
        assert!(sized.windows(2).any(|w| w == ["-preset", "medium"]));
        assert!(sized.windows(2).any(|w| w == ["-b:a", "128k"]));

        let full = &calls[2].1;
        assert!(!full.iter().any(|a| a == "-vf"));
        assert!(full.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert_eq!(log.snapshot().last().unwrap(), "✅ Video clip.mov processed.");
    }

    #[test]
    fn test_webm_max_compression() {
        let dir = TempDir::new().unwrap();
        let executor = FakeExecutor::succeeding();
        let log = Arc::new(ProcessingLog::new());
        let processor = VideoProcessor::new(profiles(), runner(executor.clone(), log.clone()), log);

        let settings = UserSettings {
            video_format: VideoContainer::Webm,
            compression_mode: CompressionMode::MaxCompression,
            sizes_to_process: vec!["480p".into()],
            custom_sizes: "240".into(),
            ..Default::default()
        };
        processor.produce(&asset(Path::new("/in/talk.mp4"), MediaKind::Video), &settings, dir.path());

        assert_eq!(
            listing(&dir.path().join("talk")),
            names(&[
                "talk_poster.webp",
                "talk_480p.webm",
                "talk_custom_240px.webm",
                "talk_480p_compressed.webm",
                "talk_custom_240px_compressed.webm",
            ])
        );

        let calls = executor.calls();
        let compressed = calls.iter().find(|(_, a)| a.iter().any(|x| x.ends_with("talk_480p_compressed.webm"))).unwrap();
        assert!(compressed.1.windows(2).any(|w| w == ["-c:v", "libvpx-vp9"]));
        assert!(compressed.1.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(compressed.1.windows(2).any(|w| w == ["-crf", "28"]));
        assert!(compressed.1.windows(2).any(|w| w == ["-preset", "slow"]));

        let custom = calls.iter().find(|(_, a)| a.iter().any(|x| x.ends_with("talk_custom_240px.webm"))).unwrap();
        assert!(custom.1.windows(2).any(|w| w == ["-vf", "scale=-2:240"]));
    }

    #[test]
    fn test_failed_rendition_does_not_stop_the_rest() {
        let dir = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_, args| {
            let poster_or_480 = args.iter().any(|a| a.ends_with("_poster.webp") || a.ends_with("_480p.mp4"));
            if poster_or_480 {
                return Ok(ToolOutput {
                    success: false,
                    code: Some(1),
                    stderr: "Conversion failed!".into(),
                    ..Default::default()
                });
            }
            touch_output(args);
            Ok(ToolOutput { success: true, code: Some(0), ..Default::default() })
        });
        let log = Arc::new(ProcessingLog::new());
        let processor = VideoProcessor::new(profiles(), runner(executor, log.clone()), log.clone());

        let settings = UserSettings {
            sizes_to_process: vec!["480p".into(), "720p".into(), "full_size".into()],
            ..Default::default()
        };
        processor.produce(&asset(Path::new("/in/clip.mkv"), MediaKind::Video), &settings, dir.path());

        assert_eq!(listing(&dir.path().join("clip")), names(&["clip_720p.mp4", "clip_full_size.mp4"]));
        let lines = log.snapshot();
        assert!(lines.contains(&"  ✓ Creating a poster: 🚨 ERROR: Conversion failed!".to_string()));
        assert!(lines.contains(&"    ✓ Version created 480p 🚨 ERROR: Conversion failed!".to_string()));
        assert_eq!(lines.last().unwrap(), "⚠️ Video clip.mkv processed with 1 failed rendition(s).");
    }

    #[test]
    fn test_audio_only_emits_one_mp3() {
        let dir = TempDir::new().unwrap();
        let executor = FakeExecutor::succeeding();
        let log = Arc::new(ProcessingLog::new());
        let processor = VideoProcessor::new(profiles(), runner(executor.clone(), log.clone()), log.clone());

        processor.produce_audio(&asset(Path::new("/in/podcast.mp4"), MediaKind::AudioOnly), dir.path());

        assert_eq!(listing(&dir.path().join("podcast")), names(&["podcast.mp3"]));
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
        assert!(calls[0].1.windows(2).any(|w| w == ["-q:a", "2"]));
        assert_eq!(log.snapshot().last().unwrap(), "✅ Audio podcast.mp4 completed.");
    }

    #[test]
    fn test_audio_failure_is_logged_not_raised() {
        let dir = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_, _| Err(std::io::Error::from(std::io::ErrorKind::NotFound)));
        let log = Arc::new(ProcessingLog::new());
        let processor = VideoProcessor::new(profiles(), runner(executor, log.clone()), log.clone());

        processor.produce_audio(&asset(Path::new("/in/a.wav"), MediaKind::AudioOnly), dir.path());
        assert!(log.snapshot().last().unwrap().starts_with("🚨 Audio processing error a.wav"));
    }
}
