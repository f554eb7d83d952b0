//! Media request, format and artifact structures

use crate::error::ReelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Source platform of a submitted link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Tiktok,
    Instagram,
    Facebook,
    Twitter,
    Snapchat,
    Unknown,
}

impl Platform {
    /// The six platforms tracked in the fixed statistics breakdown
    pub const KNOWN: [Platform; 6] = [
        Platform::Youtube,
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Twitter,
        Platform::Snapchat,
    ];

    /// Host names (and their subdomains) that belong to this platform
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            Platform::Youtube => &["youtube.com", "youtu.be"],
            Platform::Tiktok => &["tiktok.com"],
            Platform::Instagram => &["instagram.com"],
            Platform::Facebook => &["facebook.com", "fb.watch"],
            Platform::Twitter => &["twitter.com", "x.com"],
            Platform::Snapchat => &["snapchat.com"],
            Platform::Unknown => &[],
        }
    }

    /// Lowercase tag used in documents and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Snapchat => "snapchat",
            Platform::Unknown => "unknown",
        }
    }

    /// Name shown to users
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Tiktok => "TikTok",
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Twitter => "Twitter/X",
            Platform::Snapchat => "Snapchat",
            Platform::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "tiktok" => Ok(Platform::Tiktok),
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "twitter" | "x" => Ok(Platform::Twitter),
            "snapchat" => Ok(Platform::Snapchat),
            other => Err(ReelError::Config(format!("Unknown platform: {}", other))),
        }
    }
}

/// A classified link submitted by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    /// Source URL as submitted
    pub url: String,
    /// Detected platform
    pub platform: Platform,
    /// Playlist or channel rather than a single item
    pub is_collection: bool,
}

impl MediaRequest {
    /// Reject requests that must never reach the engine
    pub fn ensure_supported(&self, allowed: &[Platform]) -> Result<(), ReelError> {
        match self.platform {
            Platform::Snapchat => Err(ReelError::PlatformProtected(self.url.clone())),
            Platform::Unknown => Err(ReelError::UnsupportedPlatform(self.url.clone())),
            platform if !allowed.contains(&platform) => {
                Err(ReelError::UnsupportedPlatform(platform.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Kind of completed download, as counted by the usage ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Video,
    Audio,
    Playlist,
}

impl DownloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::Video => "video",
            DownloadKind::Audio => "audio",
            DownloadKind::Playlist => "playlist",
        }
    }
}

/// Normalized audio tier offered for every item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioTier {
    High,
    Medium,
}

impl AudioTier {
    pub const ALL: [AudioTier; 2] = [AudioTier::High, AudioTier::Medium];

    /// Target mp3 bitrate
    pub fn bitrate_kbps(&self) -> u32 {
        match self {
            AudioTier::High => 192,
            AudioTier::Medium => 128,
        }
    }

    /// Engine stream selector for this tier
    pub fn selector(&self) -> &'static str {
        match self {
            AudioTier::High => "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio/best",
            AudioTier::Medium => "worstaudio/worst",
        }
    }

    /// Stable key used in choice ids
    pub fn key(&self) -> &'static str {
        match self {
            AudioTier::High => "high",
            AudioTier::Medium => "medium",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "high" => Some(AudioTier::High),
            "medium" => Some(AudioTier::Medium),
            _ => None,
        }
    }
}

/// Whether an option yields video or normalized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Video,
    Audio(AudioTier),
}

/// Codec and geometry details of a video option
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoTraits {
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One selectable download variant
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOption {
    pub kind: FormatKind,
    /// Quality label, e.g. "720p" or "192kbps"
    pub quality: String,
    /// Engine format id, or the tier selector for audio
    pub format_id: String,
    /// Estimated size in bytes, if the engine reported one
    pub estimated_size: Option<u64>,
    /// Container extension reported by the engine
    pub ext: Option<String>,
    pub video: Option<VideoTraits>,
}

impl FormatOption {
    /// Synthetic audio option for a tier
    pub fn audio(tier: AudioTier) -> Self {
        Self {
            kind: FormatKind::Audio(tier),
            quality: format!("{}kbps", tier.bitrate_kbps()),
            format_id: tier.selector().to_string(),
            estimated_size: None,
            ext: Some("mp3".to_string()),
            video: None,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, FormatKind::Audio(_))
    }

    /// Ledger kind for a download of this option
    pub fn download_kind(&self) -> DownloadKind {
        if self.is_audio() {
            DownloadKind::Audio
        } else {
            DownloadKind::Video
        }
    }
}

/// Ranked options for one media item
#[derive(Debug, Clone, PartialEq)]
pub struct FormatCatalog {
    pub title: String,
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    /// Video options, descending by height
    pub video: Vec<FormatOption>,
    /// Always exactly the two normalized tiers
    pub audio: Vec<FormatOption>,
}

impl FormatCatalog {
    /// Find a video option by engine format id
    pub fn video_option(&self, format_id: &str) -> Option<&FormatOption> {
        self.video.iter().find(|f| f.format_id == format_id)
    }

    /// Find the audio option for a tier
    pub fn audio_option(&self, tier: AudioTier) -> Option<&FormatOption> {
        self.audio
            .iter()
            .find(|f| f.kind == FormatKind::Audio(tier))
    }

    /// Descriptive metadata carried into the artifact
    pub fn details_for(&self, option: &FormatOption) -> MediaDetails {
        let traits = option.video.as_ref();
        MediaDetails {
            title: self.title.clone(),
            duration: self.duration,
            width: traits.and_then(|t| t.width),
            height: traits.and_then(|t| t.height),
        }
    }
}

/// Descriptive metadata of a fetched item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaDetails {
    pub title: String,
    pub duration: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One member of a playlist or channel
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    /// 1-based position, unique within the snapshot
    pub index: usize,
    pub id: String,
    pub title: String,
    pub duration: Option<u64>,
    pub url: String,
}

/// Page size used when listing collection entries
pub const COLLECTION_PAGE_SIZE: usize = 10;

/// Bounded snapshot of a playlist or channel
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub source_url: String,
    pub title: String,
    pub uploader: Option<String>,
    pub entries: Vec<CollectionEntry>,
}

/// One page of a collection listing
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPage<'a> {
    /// 0-based page number
    pub number: usize,
    pub total_pages: usize,
    pub entries: &'a [CollectionEntry],
    pub has_prev: bool,
    pub has_next: bool,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of pages at the fixed page size; an empty collection has one empty page
    pub fn total_pages(&self) -> usize {
        self.entries.len().div_ceil(COLLECTION_PAGE_SIZE).max(1)
    }

    /// Page `number`, clamped to the valid range
    pub fn page(&self, number: usize) -> CollectionPage<'_> {
        let total_pages = self.total_pages();
        let number = number.min(total_pages - 1);
        let start = number * COLLECTION_PAGE_SIZE;
        let end = (start + COLLECTION_PAGE_SIZE).min(self.entries.len());
        CollectionPage {
            number,
            total_pages,
            entries: &self.entries[start.min(end)..end],
            has_prev: number > 0,
            has_next: number + 1 < total_pages,
        }
    }

    /// Entry by its 1-based index
    pub fn entry(&self, index: usize) -> Option<&CollectionEntry> {
        self.entries.iter().find(|e| e.index == index)
    }
}

/// A fetched file awaiting delivery.
///
/// The artifact owns its file: dropping it deletes the file, so every exit
/// path (delivered, rejected, cancelled) releases temp space.
#[derive(Debug)]
pub struct DownloadArtifact {
    path: PathBuf,
    pub size: u64,
    pub kind: DownloadKind,
    /// Quality label of the option that produced it
    pub quality: String,
    pub details: MediaDetails,
}

impl DownloadArtifact {
    pub fn new(
        path: PathBuf,
        size: u64,
        kind: DownloadKind,
        quality: String,
        details: MediaDetails,
    ) -> Self {
        Self {
            path,
            size,
            kind,
            quality,
            details,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DownloadArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed artifact {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {:?}: {}", self.path, e),
        }
    }
}
