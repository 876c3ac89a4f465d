//! # File Management Module
//!
//! Questo modulo gestisce la classificazione dei file caricati e le
//! operazioni sulle cartelle di lavoro.
//!
//! ## Responsabilità:
//! - Determinazione del tipo di asset (immagine, video, solo audio)
//! - Probe dei container audio/video con ffprobe
//! - Svuotamento ricorsivo delle cartelle source/output (la root resta)
//!
//! ## Formati supportati:
//! - **Immagini**: WebP, JPG, JPEG, PNG, TIFF, HEIC
//! - **Audio/Video**: MP4, MOV, WebM, MKV, AVI, M4V, M4A, MP3, AAC, WAV, FLAC
//!
//! ## Regola di classificazione:
//! Le estensioni immagine sono decise senza `ffprobe`. Ogni container audio/video
//! viene sondato: stream video presente ⇒ `Video`, altrimenti `AudioOnly`.
//! Un controllo `ffprobe` fallito (tool mancante, exit code, JSON malformato) vale
//! `AudioOnly`.
//!
//! ## Esempio:
//! ```ignore
//! match FileManager::classify(&path, &runner) {
//!     MediaKind::Image => { /* image producer */ }
//!     MediaKind::Video => { /* video producer */ }
//!     MediaKind::AudioOnly => { /* mp3 transcode */ }
//!     MediaKind::Unsupported => { /* skip */ }
//! }
//! ```

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::tool_resolver::Tool;
use crate::tool_runner::ToolRunner;

pub const IMAGE_EXTENSIONS: &[&str] = &["webp", "jpg", "jpeg", "png", "tiff", "heic"];
pub const AV_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "webm", "mkv", "avi", "m4v", "m4a", "mp3", "aac", "wav", "flac",
];

/// Detected kind of an uploaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    AudioOnly,
    Unsupported,
}

/// One input file, classified once
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub path: PathBuf,
    /// File stem; names the per-asset output folder
    pub base_name: String,
    pub kind: MediaKind,
}

impl Asset {
    pub fn classify(path: &Path, runner: &ToolRunner) -> Self {
        Self {
            path: path.to_path_buf(),
            base_name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind: FileManager::classify(path, runner),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Classification and working-folder housekeeping
pub struct FileManager;

impl FileManager {
    fn extension(path: &Path) -> Option<String> {
        path.extension().map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Check if a file is an image
    pub fn is_image(path: &Path) -> bool {
        Self::extension(path)
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Check if a file is an audio/video container
    pub fn is_av_container(path: &Path) -> bool {
        Self::extension(path)
            .map(|ext| AV_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    pub fn is_supported_format(path: &Path) -> bool {
        Self::is_image(path) || Self::is_av_container(path)
    }

    pub fn is_heic(path: &Path) -> bool {
        Self::extension(path).as_deref() == Some("heic")
    }

    /// Decide which producer handles `path`
    pub fn classify(path: &Path, runner: &ToolRunner) -> MediaKind {
        if Self::is_image(path) {
            MediaKind::Image
        } else if Self::is_av_container(path) {
            if Self::has_video_stream(path, runner) {
                MediaKind::Video
            } else {
                MediaKind::AudioOnly
            }
        } else {
            MediaKind::Unsupported
        }
    }

    /// Ask ffprobe whether a container has a video stream. Any failure counts as "no video".
    pub fn has_video_stream(path: &Path, runner: &ToolRunner) -> bool {
        let args = crate::args![
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=codec_type",
            "-of", "json",
            path.display(),
        ];

        let output = match runner.run(Tool::Ffprobe, args, "  🕵️ Checking the video stream:") {
            Ok(output) => output,
            Err(e) => {
                debug!("ffprobe failed for {}: {}", path.display(), e);
                return false;
            }
        };

        match serde_json::from_str::<serde_json::Value>(&output) {
            Ok(info) => info["streams"]
                .as_array()
                .map(|streams| streams.iter().any(|s| s["codec_type"] == "video"))
                .unwrap_or(false),
            Err(e) => {
                debug!("Malformed ffprobe output for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Remove everything below `dir`, keeping `dir` itself. Returns the
    /// number of top-level entries removed.
    pub fn clear_contents(dir: &Path) -> std::io::Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::other)?;
            let path = entry.path();
            if entry.file_type().is_dir() {
                std::fs::remove_dir_all(path)?;
            } else {
                std::fs::remove_file(path)?;
            }
            removed += 1;
        }

        Ok(removed)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing_log::ProcessingLog;
    use crate::tool_runner::testing::{runner, FakeExecutor};
    use crate::tool_runner::ToolOutput;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ffprobe_answering(stdout: &'static str) -> Arc<FakeExecutor> {
        FakeExecutor::new(move |_, _| {
            Ok(ToolOutput { success: true, code: Some(0), stdout: stdout.to_string(), stderr: String::new() })
        })
    }

    const WITH_VIDEO: &str = r#"{"programs": [], "streams": [{"codec_type": "video"}]}"#;
    const WITHOUT_VIDEO: &str = r#"{"programs": [], "streams": []}"#;

    #[test]
    fn test_images_skip_the_stream_check() {
        let executor = ffprobe_answering(WITH_VIDEO);
        let runner = runner(executor.clone(), Arc::new(ProcessingLog::new()));

        for ext in IMAGE_EXTENSIONS {
            let path = PathBuf::from(format!("photo.{}", ext.to_uppercase()));
            assert_eq!(FileManager::classify(&path, &runner), MediaKind::Image);
        }
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_containers_follow_stream_check() {
        let video = runner(ffprobe_answering(WITH_VIDEO), Arc::new(ProcessingLog::new()));
        let audio = runner(ffprobe_answering(WITHOUT_VIDEO), Arc::new(ProcessingLog::new()));

        for ext in AV_EXTENSIONS {
            let path = PathBuf::from(format!("clip.{}", ext));
            assert_eq!(FileManager::classify(&path, &video), MediaKind::Video, "{}", ext);
            assert_eq!(FileManager::classify(&path, &audio), MediaKind::AudioOnly, "{}", ext);
        }
    }

    #[test]
    fn test_stream_check_failures_fall_back_to_audio() {
        let failing = FakeExecutor::new(|_, _| Ok(ToolOutput { success: false, code: Some(1), ..Default::default() }));
        let missing = FakeExecutor::new(|_, _| Err(std::io::Error::from(std::io::ErrorKind::NotFound)));
        let garbage = ffprobe_answering("not json at all");

        for executor in [failing, missing, garbage] {
            let runner = runner(executor, Arc::new(ProcessingLog::new()));
            assert_eq!(
                FileManager::classify(Path::new("song.m4a"), &runner),
                MediaKind::AudioOnly
            );
        }
    }

    #[test]
    fn test_ffprobe_arguments() {
        let executor = ffprobe_answering(WITH_VIDEO);
        let runner = runner(executor.clone(), Arc::new(ProcessingLog::new()));
        FileManager::has_video_stream(Path::new("/in/clip.mkv"), &runner);

        let (program, args) = &executor.calls()[0];
        assert_eq!(program, "ffprobe");
        assert_eq!(
            args,
            &vec![
                "-v", "error", "-select_streams", "v:0", "-show_entries",
                "stream=codec_type", "-of", "json", "/in/clip.mkv",
            ]
        );
    }

    #[test]
    fn test_asset_names() {
        let runner = runner(ffprobe_answering(WITHOUT_VIDEO), Arc::new(ProcessingLog::new()));
        let asset = Asset::classify(Path::new("/src/holiday.clip.m4a"), &runner);
        assert_eq!(asset.base_name, "holiday.clip");
        assert_eq!(asset.file_name(), "holiday.clip.m4a");
        assert_eq!(asset.kind, MediaKind::AudioOnly);
    }

    #[test]
    fn test_unsupported_extension() {
        let runner = runner(FakeExecutor::succeeding(), Arc::new(ProcessingLog::new()));
        assert_eq!(FileManager::classify(Path::new("notes.txt"), &runner), MediaKind::Unsupported);
        assert_eq!(FileManager::classify(Path::new("README"), &runner), MediaKind::Unsupported);
    }

    #[test]
    fn test_clear_contents_keeps_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("photo/nested")).unwrap();
        std::fs::write(dir.path().join("photo/nested/a.webp"), b"x").unwrap();
        std::fs::write(dir.path().join("loose.png"), b"x").unwrap();

        assert_eq!(FileManager::clear_contents(dir.path()).unwrap(), 2);
        assert!(dir.path().is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(FileManager::clear_contents(&dir.path().join("absent")).unwrap(), 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
    }
}
