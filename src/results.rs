//! # Results Listing
//!
//! Elenca le sottocartelle di `output/` con i file prodotti e un'anteprima.
//!
//! ## Anteprima:
//! 1. icona audio se la cartella contiene `.mp3`/`.aac`
//! 2. altrimenti il primo file con `poster` nel nome
//! 3. altrimenti il primo file con estensione immagine supportata

use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

use crate::file_manager::FileManager;

pub const AUDIO_ICON_URL: &str = "/static/audio_icon.svg";
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultFile {
    pub name: String,
    pub url: String,
}

/// One output subfolder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEntry {
    pub name: String,
    pub poster: Option<String>,
    pub files: Vec<ResultFile>,
}

/// List every non-empty subfolder of `output_dir`, newest-looking names first
pub fn list_results(output_dir: &Path) -> Vec<ResultEntry> {
    if !output_dir.is_dir() {
        return Vec::new();
    }

    let mut results: Vec<ResultEntry> = WalkDir::new(output_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| entry_for(&e.file_name().to_string_lossy(), e.path()))
        .collect();

    results.sort_by(|a, b| b.name.cmp(&a.name));
    results
}

fn entry_for(dir_name: &str, dir: &Path) -> Option<ResultEntry> {
    let names: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();

    if names.is_empty() {
        return None;
    }

    let url = |name: &str| format!("/output/{}/{}", dir_name, name);

    let poster = if names.iter().any(|n| has_extension(n, AUDIO_EXTENSIONS)) {
        Some(AUDIO_ICON_URL.to_string())
    } else {
        names
            .iter()
            .find(|n| n.contains("poster"))
            .or_else(|| names.iter().find(|n| FileManager::is_image(Path::new(n.as_str()))))
            .map(|n| url(n))
    };

    let files = names
        .iter()
        .map(|n| ResultFile { name: n.clone(), url: url(n) })
        .collect();

    Some(ResultEntry {
        name: dir_name.to_string(),
        poster,
        files,
    })
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
