//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione di processo e i profili statici.
//!
//! ## Responsabilità:
//! - Definisce `Config` con i parametri del processo (porta, worker, tool, settings)
//! - Definisce `Profiles`: preset di dimensioni e tier di compressione
//! - Fornisce validazione dei parametri e valori di default sensati
//! - Supporta caricamento/salvataggio da/verso file JSON
//!
//! ## Profili:
//! - `image_profiles.<nome>.sizes`: label → larghezza in pixel
//! - `video_profiles.<nome>.heights_map`: label → altezza in pixel
//! - `compression_modes.image.<tier>.quality` (standard 85, max_compression 75)
//! - `compression_modes.video.<tier>.{crf, preset}` (23/medium, 28/slow)
//!
//! I profili sono caricati una sola volta all'avvio e condivisi in sola
//! lettura (via `Arc`) da tutti i job.
//!
//! ## Esempio:
//! ```ignore
//! let config = Config::from_file(&path).await?;
//! let quality = config.profiles.image_quality(CompressionMode::Standard);
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::planner::MAX_DIMENSION;
use crate::settings::CompressionMode;

/// Name of the profile used when the caller does not pick one
pub const DEFAULT_PROFILE: &str = "default";

/// Process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port of the local HTTP surface
    pub server_port: u16,
    /// Number of parallel job slots (0 = one per CPU)
    pub workers: usize,
    /// Directory holding bundled ffmpeg/ffprobe binaries
    pub tools_dir: Option<PathBuf>,
    /// Settings file (None = `~/.media_press_settings.json`)
    pub settings_file: Option<PathBuf>,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Size presets and compression tiers
    pub profiles: Profiles,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 5000,
            workers: 0,
            tools_dir: None,
            settings_file: None,
            static_dir: PathBuf::from("static"),
            profiles: Profiles::default(),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("Server port must be greater than 0"));
        }

        if let Some(ref tools_dir) = self.tools_dir {
            if !tools_dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "Tools directory is not a directory: {}",
                    tools_dir.display()
                ));
            }
        }

        self.profiles.validate()
    }

    /// Effective size of the worker pool
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Image size presets: label → target width
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageProfile {
    pub sizes: BTreeMap<String, u32>,
}

/// Video size presets: label → target height
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoProfile {
    pub heights_map: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImageTier {
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoTier {
    pub crf: u8,
    pub preset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tiers<T> {
    pub standard: T,
    pub max_compression: T,
}

impl<T> Tiers<T> {
    pub fn get(&self, mode: CompressionMode) -> &T {
        match mode {
            CompressionMode::Standard => &self.standard,
            CompressionMode::MaxCompression => &self.max_compression,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionModes {
    pub image: Tiers<ImageTier>,
    pub video: Tiers<VideoTier>,
}

/// Static format and compression profiles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profiles {
    pub image_profiles: BTreeMap<String, ImageProfile>,
    pub video_profiles: BTreeMap<String, VideoProfile>,
    pub compression_modes: CompressionModes,
}

impl Default for Profiles {
    fn default() -> Self {
        let sizes = [("thumb", 300), ("small", 640), ("medium", 1280), ("large", 1920)]
            .into_iter()
            .map(|(label, width)| (label.to_string(), width))
            .collect();
        let heights_map = [("360p", 360), ("480p", 480), ("720p", 720), ("1080p", 1080)]
            .into_iter()
            .map(|(label, height)| (label.to_string(), height))
            .collect();

        Self {
            image_profiles: BTreeMap::from([(DEFAULT_PROFILE.to_string(), ImageProfile { sizes })]),
            video_profiles: BTreeMap::from([(
                DEFAULT_PROFILE.to_string(),
                VideoProfile { heights_map },
            )]),
            compression_modes: CompressionModes {
                image: Tiers {
                    standard: ImageTier { quality: 85 },
                    max_compression: ImageTier { quality: 75 },
                },
                video: Tiers {
                    standard: VideoTier { crf: 23, preset: "medium".to_string() },
                    max_compression: VideoTier { crf: 28, preset: "slow".to_string() },
                },
            },
        }
    }
}

impl Profiles {
    /// Validate profile values
    pub fn validate(&self) -> Result<()> {
        if !self.image_profiles.contains_key(DEFAULT_PROFILE) {
            return Err(anyhow::anyhow!("Missing image profile '{}'", DEFAULT_PROFILE));
        }
        if !self.video_profiles.contains_key(DEFAULT_PROFILE) {
            return Err(anyhow::anyhow!("Missing video profile '{}'", DEFAULT_PROFILE));
        }

        let out_of_range = |dim: &u32| *dim == 0 || *dim > MAX_DIMENSION;
        for (name, profile) in &self.image_profiles {
            if let Some((label, _)) = profile.sizes.iter().find(|(_, w)| out_of_range(w)) {
                return Err(anyhow::anyhow!(
                    "Image profile '{}': size '{}' must be between 1 and {}",
                    name,
                    label,
                    MAX_DIMENSION
                ));
            }
        }
        for (name, profile) in &self.video_profiles {
            if let Some((label, _)) = profile.heights_map.iter().find(|(_, h)| out_of_range(h)) {
                return Err(anyhow::anyhow!(
                    "Video profile '{}': height '{}' must be between 1 and {}",
                    name,
                    label,
                    MAX_DIMENSION
                ));
            }
        }

        let image = &self.compression_modes.image;
        for tier in [&image.standard, &image.max_compression] {
            if tier.quality == 0 || tier.quality > 100 {
                return Err(anyhow::anyhow!("Image quality must be between 1 and 100"));
            }
        }

        let video = &self.compression_modes.video;
        for tier in [&video.standard, &video.max_compression] {
            if tier.crf > 51 {
                return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
            }
            if tier.preset.trim().is_empty() {
                return Err(anyhow::anyhow!("Video preset must not be empty"));
            }
        }

        Ok(())
    }

    /// Image size presets of the default profile
    pub fn image_sizes(&self) -> &BTreeMap<String, u32> {
        static EMPTY: BTreeMap<String, u32> = BTreeMap::new();
        self.image_profiles
            .get(DEFAULT_PROFILE)
            .map(|p| &p.sizes)
            .unwrap_or(&EMPTY)
    }

    /// Video height presets of the default profile
    pub fn video_heights(&self) -> &BTreeMap<String, u32> {
        static EMPTY: BTreeMap<String, u32> = BTreeMap::new();
        self.video_profiles
            .get(DEFAULT_PROFILE)
            .map(|p| &p.heights_map)
            .unwrap_or(&EMPTY)
    }

    pub fn image_quality(&self, mode: CompressionMode) -> u8 {
        self.compression_modes.image.get(mode).quality
    }

    pub fn video_tier(&self, mode: CompressionMode) -> &VideoTier {
        self.compression_modes.video.get(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.profiles.compression_modes.image.standard.quality = 0;
        assert!(config.validate().is_err());

        config.profiles.compression_modes.image.standard.quality = 85;
        config.profiles.compression_modes.video.max_compression.crf = 52;
        assert!(config.validate().is_err());

        config.profiles.compression_modes.video.max_compression.crf = 28;
        config.profiles.image_profiles.get_mut(DEFAULT_PROFILE).unwrap().sizes.insert("huge".into(), 20000);
        assert!(config.validate().is_err());

        config.profiles.image_profiles.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profiles_default() {
        let profiles = Profiles::default();
        assert_eq!(profiles.image_sizes().get("thumb"), Some(&300));
        assert_eq!(profiles.video_heights().get("720p"), Some(&720));
        assert_eq!(profiles.image_quality(CompressionMode::Standard), 85);
        assert_eq!(profiles.image_quality(CompressionMode::MaxCompression), 75);
        assert_eq!(profiles.video_tier(CompressionMode::Standard).crf, 23);
        assert_eq!(profiles.video_tier(CompressionMode::MaxCompression).preset, "slow");
    }

    #[test]
    fn test_worker_count_never_zero() {
        let config = Config::default();
        assert!(config.worker_count() >= 1);

        let config = Config { workers: 3, ..Default::default() };
        assert_eq!(config.worker_count(), 3);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut original_config = Config {
            server_port: 5050,
            workers: 2,
            ..Default::default()
        };
        original_config
            .profiles
            .image_profiles
            .get_mut(DEFAULT_PROFILE)
            .unwrap()
            .sizes
            .insert("hero".to_string(), 2560);

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.server_port, 5050);
        assert_eq!(loaded_config.workers, 2);
        assert_eq!(loaded_config.profiles.image_sizes().get("hero"), Some(&2560));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.server_port, 5000);
        assert_eq!(config.profiles, Profiles::default());
    }

    #[tokio::test]
    async fn test_malformed_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(Config::from_file(&path).await.is_err());
    }
}
