//! # Image Processing Module
//!
//! Questo modulo produce le varianti ridimensionate e compresse di un'immagine.
//!
//! ## Responsabilità:
//! - Conversione HEIC → PNG temporaneo via `sips` (solo macOS), eliminato su
//!   ogni percorso di uscita
//! - Decode in memoria (RGBA per target PNG, RGB per tutti gli altri)
//! - Resize Lanczos3 mantenendo l'aspect ratio: `h = round(H * w / W)`
//! - Encode WebP (crate `webp`), JPEG e PNG (crate `image`)
//! - Tier `max_compression`: ogni render viene ripetuto dal bitmap originale
//!   con il suffisso `_compressed`
//!
//! ## Gestione errori:
//! Un decode fallito interrompe l'asset prima di creare la cartella di output.
//! Nessun errore esce da `produce`: tutto diventa righe di log.
//!
//! ## Esempio:
//! ```ignore
//! let processor = ImageProcessor::new(profiles, runner, log);
//! processor.produce(&asset, &settings, &output_dir);
//! ```

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::Profiles;
use crate::error::PressError;
use crate::file_manager::{Asset, FileManager};
use crate::planner::{self, Artifact, VariantPlan, MAX_DIMENSION};
use crate::processing_log::ProcessingLog;
use crate::settings::{CompressionMode, ImageFormat, UserSettings};
use crate::tool_resolver::Tool;
use crate::tool_runner::ToolRunner;

/// Decodable source for one image job. Holds the HEIC intermediate, if any,
/// which is deleted when the guard drops.
struct PreparedSource {
    path: PathBuf,
    _intermediate: Option<NamedTempFile>,
}

/// Produces image variants
pub struct ImageProcessor {
    profiles: Arc<Profiles>,
    runner: ToolRunner,
    log: Arc<ProcessingLog>,
}

impl ImageProcessor {
    pub fn new(profiles: Arc<Profiles>, runner: ToolRunner, log: Arc<ProcessingLog>) -> Self {
        Self { profiles, runner, log }
    }

    /// Render every planned variant of `asset` into `output_root/<base_name>/`
    pub fn produce(&self, asset: &Asset, settings: &UserSettings, output_root: &Path) {
        let name = asset.file_name();
        if let Err(e) = self.try_produce(asset, settings, output_root) {
            self.log.info(format!("🚨 Unknown processing error {}: {}", name, e));
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
        let plan = planner::plan(asset.kind, self.profiles.image_sizes(), settings, &self.log);

        self.log.info(format!(
            "  > Selected dimensions for processing: {:?}",
            plan.sizes.keys().collect::<Vec<_>>()
        ));
        if plan.is_empty() {
            self.log.info(format!("  ⚠️ No output requested for {}", name));
            return Ok(());
        }

        self.log.info(format!("🖼️ Image processing: {}", name));

        let source = match self.prepare_source(asset) {
            Ok(source) => source,
            Err(e) => {
                self.log.info(format!("🚨 Error: Failed to convert '{}'.", name));
                self.log.debug(format!("{:?}", e));
                return Ok(());
            }
        };

        let img = match decode(&source.path, settings.image_format) {
            Ok(img) => img,
            Err(e) => {
                self.log.info(format!("🚨 Error: Unable to recognize '{}'.", name));
                self.log.debug(format!("Decode failed for {}: {}", source.path.display(), e));
                return Ok(());
            }
        };

        let output_dir = output_root.join(&asset.base_name);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;

        for tier in &plan.tiers {
            self.render_tier(&img, asset, settings.image_format, &plan, *tier, &output_dir)?;
        }

        self.log.info(format!("✅ Done: {}", name));
        Ok(())
    }

    fn render_tier(
        &self,
        img: &DynamicImage,
        asset: &Asset,
        format: ImageFormat,
        plan: &VariantPlan,
        tier: CompressionMode,
        output_dir: &Path,
    ) -> Result<()> {
        let quality = self.profiles.image_quality(tier);
        let compressed = tier == CompressionMode::MaxCompression;
        let ext = format.extension();

        if compressed {
            self.log.info(format!("  ↳ Creating compressed versions (quality: {})", quality));
        }

        if !plan.sizes.is_empty() {
            for (label, width, density) in plan.targets() {
                let (w, h) = match target_dimensions(img.dimensions(), width, density) {
                    Ok(dims) => dims,
                    Err(e) => {
                        self.log.info(format!(
                            "🚨 Error: Skipping '{}' @{}x for '{}'.",
                            label,
                            density,
                            asset.file_name()
                        ));
                        self.log.debug(e.to_string());
                        continue;
                    }
                };
                let resized = img.resize_exact(w, h, FilterType::Lanczos3);
                let file_name = Artifact::Image { label, density }
                    .file_name(&asset.base_name, compressed, ext);
                encode(&resized, format, quality, &output_dir.join(&file_name))
                    .with_context(|| format!("encoding {}", file_name))?;
                debug!("Rendered {} ({}x{})", file_name, w, h);
            }
            if !compressed {
                self.log.info("  ✓ Resized versions created");
            }
        }

        if plan.full_size {
            let file_name = Artifact::FullSize.file_name(&asset.base_name, compressed, ext);
            encode(img, format, quality, &output_dir.join(&file_name))
                .with_context(|| format!("encoding {}", file_name))?;
            if !compressed {
                self.log.info(format!("  ✓ Created: {}", file_name));
            }
        }

        if compressed {
            self.log.info("    ✓ Compressed versions created");
        }
        Ok(())
    }

    /// Convert HEIC to a temporary PNG when the platform converter exists
    fn prepare_source(&self, asset: &Asset) -> Result<PreparedSource, PressError> {
        if !(FileManager::is_heic(&asset.path) && self.runner.tools().has_heic_converter()) {
            return Ok(PreparedSource {
                path: asset.path.clone(),
                _intermediate: None,
            });
        }

        self.log.info(format!("  > Conversion HEIC -> PNG (via sips): {}", asset.file_name()));
        let intermediate = tempfile::Builder::new()
            .prefix("media-press-")
            .suffix(".png")
            .tempfile()?;

        let args = crate::args![
            "-s", "format", "png",
            asset.path.display(),
            "--out", intermediate.path().display(),
        ];
        // On failure `intermediate` drops here and the file is removed.
        self.runner.run(Tool::Sips, args, "   ")?;

        Ok(PreparedSource {
            path: intermediate.path().to_path_buf(),
            _intermediate: Some(intermediate),
        })
    }
}

/// Output size for `target_width * density`, preserving the source aspect
/// ratio. Either edge above `MAX_DIMENSION` is rejected before any buffer
/// is allocated.
pub fn target_dimensions(
    (src_w, src_h): (u32, u32),
    target_width: u32,
    density: u32,
) -> Result<(u32, u32), PressError> {
    let too_large = || {
        PressError::Validation(format!(
            "{}px @{}x on a {}x{} source exceeds {}px",
            target_width, density, src_w, src_h, MAX_DIMENSION
        ))
    };

    let width = target_width
        .checked_mul(density)
        .filter(|w| *w <= MAX_DIMENSION)
        .ok_or_else(too_large)?;
    let height = (src_h as f64 * width as f64 / src_w.max(1) as f64).round();
    if height > MAX_DIMENSION as f64 {
        return Err(too_large());
    }

    Ok((width.max(1), (height as u32).max(1)))
}

/// Decode into RGBA for alpha-preserving targets, RGB otherwise
fn decode(path: &Path, format: ImageFormat) -> Result<DynamicImage, PressError> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(if format.keeps_alpha() {
        DynamicImage::ImageRgba8(decoded.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    })
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
    path: &Path,
) -> Result<(), PressError> {
    match format {
        ImageFormat::Webp => {
            let (w, h) = img.dimensions();
            let rgb;
            let encoder = match img {
                DynamicImage::ImageRgba8(buf) => webp::Encoder::from_rgba(buf.as_raw(), w, h),
                DynamicImage::ImageRgb8(buf) => webp::Encoder::from_rgb(buf.as_raw(), w, h),
                other => {
                    rgb = other.to_rgb8();
                    webp::Encoder::from_rgb(rgb.as_raw(), w, h)
                }
            };
            let data = encoder.encode(quality as f32);
            std::fs::write(path, &*data)?;
        }
        ImageFormat::Jpg | ImageFormat::Jpeg => {
            let writer = BufWriter::new(File::create(path)?);
            img.write_with_encoder(JpegEncoder::new_with_quality(writer, quality))?;
        }
        ImageFormat::Png => {
            // quality does not apply; ask for the smallest encoding instead
            let writer = BufWriter::new(File::create(path)?);
            img.write_with_encoder(PngEncoder::new_with_quality(
                writer,
                CompressionType::Best,
                PngFilter::Adaptive,
            ))?;
        }
    }
    Ok(())
}
