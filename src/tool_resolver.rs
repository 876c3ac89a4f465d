//! # Tool Path Resolver
//!
//! Finds the external binaries the press shells out to:
//! - `ffmpeg` / `ffprobe` bundled under a tools directory, else on `PATH`
//! - `sips` on macOS (HEIC → PNG conversion), system-provided only
//!
//! Resolution runs once at startup; a missing or non-executable binary is a
//! fatal configuration error.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::PressError;

/// Environment override for the bundled tools directory
pub const TOOLS_DIR_ENV: &str = "MEDIA_PRESS_TOOLS_DIR";

/// External binaries used by the press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    Sips,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::Sips => "sips",
        }
    }

    fn file_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.name())
        } else {
            self.name().to_string()
        }
    }
}

/// Resolved locations of every external binary
#[derive(Debug, Clone)]
pub struct ToolPaths {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    sips: Option<PathBuf>,
}

impl ToolPaths {
    /// Resolve and verify all tools required on this platform
    pub fn resolve(tools_dir: Option<&Path>) -> Result<Self, PressError> {
        let resolver = ToolPathResolver::new(tools_dir.map(Path::to_path_buf));

        let ffmpeg = resolver.require(Tool::Ffmpeg)?;
        let ffprobe = resolver.require(Tool::Ffprobe)?;
        let sips = if cfg!(target_os = "macos") {
            Some(resolver.require(Tool::Sips)?)
        } else {
            None
        };

        info!("🔧 Tools: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());
        Ok(Self { ffmpeg, ffprobe, sips })
    }

    /// Use explicit paths without verification
    pub fn from_paths(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        sips: Option<PathBuf>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            sips,
        }
    }

    pub fn path(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Ffmpeg => Some(&self.ffmpeg),
            Tool::Ffprobe => Some(&self.ffprobe),
            Tool::Sips => self.sips.as_deref(),
        }
    }

    /// Whether the native HEIC converter is available
    pub fn has_heic_converter(&self) -> bool {
        self.sips.is_some()
    }
}

/// Looks for binaries in the bundled tools directory first, then on `PATH`
pub struct ToolPathResolver {
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    pub fn new(explicit_dir: Option<PathBuf>) -> Self {
        let tools_dir = explicit_dir.or_else(Self::detect_bundled_tools_dir);
        debug!("Bundled tools directory: {:?}", tools_dir);
        Self { tools_dir }
    }

    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        if let Ok(dir) = env::var(TOOLS_DIR_ENV) {
            let path = PathBuf::from(dir);
            if path.is_dir() {
                return Some(path);
            }
            warn!("{} points to a missing directory: {}", TOOLS_DIR_ENV, path.display());
        }

        let mut candidates = Vec::new();
        if let Ok(exe_path) = env::current_exe() {
            if let Some(app_dir) = exe_path.parent() {
                candidates.push(app_dir.join("bin"));
                candidates.push(app_dir.join("resources").join("bin"));
            }
        }
        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("bin"));
        }

        candidates.into_iter().find(|p| p.is_dir())
    }

    /// Resolve a tool, bundled copy first
    pub fn resolve_tool(&self, tool: Tool) -> Option<PathBuf> {
        // sips ships with macOS and is never bundled
        if tool != Tool::Sips {
            if let Some(ref tools_dir) = self.tools_dir {
                let bundled = tools_dir.join(tool.file_name());
                if bundled.is_file() {
                    debug!("Using bundled tool: {} -> {:?}", tool.name(), bundled);
                    return Some(bundled);
                }
            }
        }

        match which::which(tool.name()) {
            Ok(path) => {
                debug!("Using system tool: {} -> {:?}", tool.name(), path);
                Some(path)
            }
            Err(_) => None,
        }
    }

    /// Resolve a tool and check it can be executed
    pub fn require(&self, tool: Tool) -> Result<PathBuf, PressError> {
        let path = self.resolve_tool(tool).ok_or_else(|| {
            PressError::MissingDependency(format!("{} not found (bundled or on PATH)", tool.name()))
        })?;

        if !is_executable(&path) {
            return Err(PressError::MissingDependency(format!(
                "{} is not executable: {}",
                tool.name(),
                path.display()
            )));
        }

        Ok(path)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
