//! # Variant Planner
//!
//! Decide quali artefatti produrre per un asset a partire dal profilo di
//! formato e dai settings dell'utente.
//!
//! ## Algoritmo:
//! 1. Filtra i preset del profilo alle label selezionate
//! 2. Aggiunge le dimensioni custom come `custom_<n>px` (sovrascrivono i preset)
//! 3. `full_size` tra le label selezionate ⇒ render a dimensione nativa
//! 4. Immagini: densità {1} oppure {1, 2} con retina; video: sempre una sola
//! 5. `max_compression` ⇒ ogni render viene ripetuto nel tier compresso
//!
//! Per le immagini il valore di una label è una larghezza, per i video
//! un'altezza; le dimensioni custom seguono la stessa regola.
//!
//! ## Nomi degli artefatti:
//! - immagine: `{base}_{label}@{densità}x[_compressed].{ext}`
//! - video: `{base}_{label}[_compressed].{ext}`
//! - full size: `{base}_full_size[_compressed].{ext}`
//! - poster: `{base}_poster.webp`
//! - solo audio: `{base}.mp3`

use std::collections::BTreeMap;

use crate::file_manager::MediaKind;
use crate::processing_log::ProcessingLog;
use crate::settings::{CompressionMode, UserSettings};

/// Selection label requesting a native-resolution render
pub const FULL_SIZE: &str = "full_size";

/// Filename infix of max-compression renders
pub const COMPRESSED_INFIX: &str = "_compressed";
/// Largest edge, in pixels, any rendition may have (WebP's limit)
pub const MAX_DIMENSION: u32 = 16383;

/// Everything to render for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct VariantPlan {
    /// label → width (images) or height (video)
    pub sizes: BTreeMap<String, u32>,
    /// Pixel densities applied to every image size
    pub densities: Vec<u32>,
    /// Also render at native dimensions
    pub full_size: bool,
    /// Tiers to render, standard always first
    pub tiers: Vec<CompressionMode>,
}

impl VariantPlan {
    /// Nothing requested at all
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty() && !self.full_size
    }

    /// `(label, dimension, density)` for every resized render of one tier
    pub fn targets(&self) -> impl Iterator<Item = (&str, u32, u32)> + '_ {
        self.sizes.iter().flat_map(move |(label, dim)| {
            self.densities.iter().map(move |d| (label.as_str(), *dim, *d))
        })
    }
}

/// Build the plan for `kind`. Kinds without size variants get an empty plan.
pub fn plan(
    kind: MediaKind,
    profile: &BTreeMap<String, u32>,
    settings: &UserSettings,
    log: &ProcessingLog,
) -> VariantPlan {
    let tiers = match settings.compression_mode {
        CompressionMode::Standard => vec![CompressionMode::Standard],
        CompressionMode::MaxCompression => {
            vec![CompressionMode::Standard, CompressionMode::MaxCompression]
        }
    };

    let densities = match kind {
        MediaKind::Image if settings.include_retina => vec![1, 2],
        _ => vec![1],
    };

    if !matches!(kind, MediaKind::Image | MediaKind::Video) {
        return VariantPlan {
            sizes: BTreeMap::new(),
            densities,
            full_size: false,
            tiers,
        };
    }

    let mut sizes: BTreeMap<String, u32> = profile
        .iter()
        .filter(|(label, _)| settings.sizes_to_process.iter().any(|s| s == *label))
        .map(|(label, dim)| (label.clone(), *dim))
        .collect();

    sizes.extend(custom_sizes(&settings.custom_sizes, log));

    VariantPlan {
        sizes,
        densities,
        full_size: settings.wants_full_size(),
        tiers,
    }
}

/// Parse a comma separated custom size list into `custom_<n>px` entries.
///
/// Non-numeric tokens are dropped silently. A numeric token above
/// `MAX_DIMENSION` invalidates the whole field.
pub fn custom_sizes(raw: &str, log: &ProcessingLog) -> BTreeMap<String, u32> {
    let mut sizes = BTreeMap::new();

    for token in raw.split(',').map(str::trim) {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        match token.parse::<u32>() {
            Ok(0) => log.debug(format!("Ignoring zero custom size '{}'", token)),
            Ok(value) if value <= MAX_DIMENSION => {
                sizes.insert(format!("custom_{}px", token), value);
            }
            _ => {
                log.info("🚨 Error: Invalid custom size format.");
                return BTreeMap::new();
            }
        }
    }

    sizes
}

/// One produced file, named independently of the others
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact<'a> {
    /// Resized image at a pixel density
    Image { label: &'a str, density: u32 },
    /// Height-constrained video rendition
    Video { label: &'a str },
    FullSize,
    Poster,
    Audio,
}

impl Artifact<'_> {
    /// Deterministic file name for this artifact
    pub fn file_name(&self, base_name: &str, compressed: bool, ext: &str) -> String {
        let infix = if compressed { COMPRESSED_INFIX } else { "" };
        match self {
            Self::Image { label, density } => {
                format!("{}_{}@{}x{}.{}", base_name, label, density, infix, ext)
            }
            Self::Video { label } => format!("{}_{}{}.{}", base_name, label, infix, ext),
            Self::FullSize => format!("{}_{}{}.{}", base_name, FULL_SIZE, infix, ext),
            Self::Poster => format!("{}_poster.webp", base_name),
            Self::Audio => format!("{}.mp3", base_name),
        }
    }
}
