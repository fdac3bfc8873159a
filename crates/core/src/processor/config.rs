//! Configuration for the processors' external tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External tool locations and limits shared by all processors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Path to poppler's pdftoppm binary.
    #[serde(default = "default_pdftoppm_path")]
    pub pdftoppm_path: PathBuf,

    /// Path to poppler's pdfunite binary.
    #[serde(default = "default_pdfunite_path")]
    pub pdfunite_path: PathBuf,

    /// Parent directory for per-job scratch directories.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Timeout for a single tool invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Resolution used when rendering PDF pages.
    #[serde(default = "default_pdf_render_dpi")]
    pub pdf_render_dpi: u32,

    /// Output frame rate of slideshows.
    #[serde(default = "default_slideshow_fps")]
    pub slideshow_fps: u32,

    /// Timestamp of the frame captured for thumbnails.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_pdftoppm_path() -> PathBuf {
    PathBuf::from("pdftoppm")
}

fn default_pdfunite_path() -> PathBuf {
    PathBuf::from("pdfunite")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("transmute")
}

fn default_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_pdf_render_dpi() -> u32 {
    150
}

fn default_slideshow_fps() -> u32 {
    24
}

fn default_thumbnail_offset() -> f64 {
    2.0
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            pdftoppm_path: default_pdftoppm_path(),
            pdfunite_path: default_pdfunite_path(),
            scratch_dir: default_scratch_dir(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            pdf_render_dpi: default_pdf_render_dpi(),
            slideshow_fps: default_slideshow_fps(),
            thumbnail_offset_secs: default_thumbnail_offset(),
        }
    }
}

impl ToolsConfig {
    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.scratch_dir = scratch_dir;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Creates a fresh scratch directory, removed when the guard drops.
    pub(crate) fn scratch(&self, prefix: &str) -> std::io::Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.scratch_dir)
    }
}
