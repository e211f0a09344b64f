use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One downloadable stream as reported by `yt-dlp -j`. Read-only and
/// ephemeral; a fresh list is fetched per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatRecord {
    pub format_id: String,
    pub ext: String,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub resolution: Option<String>,
    pub abr: Option<f64>,
    pub language: Option<String>,
    pub format_note: Option<String>,
}

impl FormatRecord {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().map(|v| v != "none").unwrap_or(false)
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().map(|a| a != "none").unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub formats: Vec<FormatRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub file_path: PathBuf,
    pub file_size_bytes: u64,
}
