//! # User Settings Module
//!
//! Settings bundle attached to one upload batch. Raw form fields are parsed
//! and validated once here; producers only ever see `UserSettings`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PressError;

/// Target encoding for image variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Webp,
    Jpg,
    Jpeg,
    Png,
}

impl ImageFormat {
    /// File extension used for produced artifacts
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// PNG keeps the alpha channel, everything else is flattened to RGB
    pub fn keeps_alpha(&self) -> bool {
        matches!(self, Self::Png)
    }
}

impl FromStr for ImageFormat {
    type Err = PressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "jpg" => Ok(Self::Jpg),
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(PressError::Validation(format!("unknown image format '{}'", other))),
        }
    }
}

/// Target container for video renditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    Mp4,
    Webm,
    /// Any other container; encoded with the H.264 defaults
    Other(String),
}

impl VideoContainer {
    pub fn extension(&self) -> &str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Other(ext) => ext,
        }
    }

    pub fn video_codec(&self) -> &'static str {
        match self {
            Self::Webm => "libvpx-vp9",
            Self::Mp4 | Self::Other(_) => "libx264",
        }
    }

    pub fn audio_codec(&self) -> &'static str {
        match self {
            Self::Webm => "libopus",
            Self::Mp4 | Self::Other(_) => "aac",
        }
    }
}

impl FromStr for VideoContainer {
    type Err = PressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = s.trim().to_lowercase();
        match ext.as_str() {
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            "" => Err(PressError::Validation("empty video format".to_string())),
            other if other.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(Self::Other(ext)),
            other => Err(PressError::Validation(format!("invalid video format '{}'", other))),
        }
    }
}

/// Compression tier requested by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    #[default]
    Standard,
    MaxCompression,
}

impl FromStr for CompressionMode {
    type Err = PressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "standard" => Ok(Self::Standard),
            "max_compression" => Ok(Self::MaxCompression),
            other => Err(PressError::Validation(format!("unknown compression mode '{}'", other))),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::MaxCompression => write!(f, "max_compression"),
        }
    }
}

/// Settings bundle for one upload batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub image_format: ImageFormat,
    pub video_format: VideoContainer,
    pub compression_mode: CompressionMode,
    /// Selected preset labels, may include `full_size`
    pub sizes_to_process: Vec<String>,
    /// Raw comma separated custom sizes, parsed by the planner
    pub custom_sizes: String,
    pub include_retina: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::Webp,
            video_format: VideoContainer::Mp4,
            compression_mode: CompressionMode::Standard,
            sizes_to_process: Vec::new(),
            custom_sizes: String::new(),
            include_retina: false,
        }
    }
}

impl UserSettings {
    /// Build settings from multipart form fields. Repeated `sizes_to_process`
    /// fields accumulate; missing fields keep their defaults.
    pub fn from_form<'a, I>(fields: I) -> Result<Self, PressError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();

        for (name, value) in fields {
            match name {
                "image_format" => settings.image_format = value.parse()?,
                "video_format" => settings.video_format = value.parse()?,
                "compression_mode" => settings.compression_mode = value.parse()?,
                "custom_sizes" => settings.custom_sizes = value.to_string(),
                "sizes_to_process" | "sizes_to_process[]" => {
                    settings.sizes_to_process.push(value.to_string())
                }
                "include_retina" => settings.include_retina = value == "true",
                _ => {}
            }
        }

        Ok(settings)
    }

    pub fn wants_full_size(&self) -> bool {
        self.sizes_to_process.iter().any(|s| s == crate::planner::FULL_SIZE)
    }
}
