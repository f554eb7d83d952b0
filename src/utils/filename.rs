//! Temporary file naming and cleanup utilities

use crate::core::media::DownloadKind;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions a video download may end up with
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi"];

/// Extensions a normalized audio download ends up with
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3"];

fn invalid_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"))
}

fn download_stem() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(video|audio|playlist)_\d+_[0-9a-f]{8}\.").expect("valid regex")
    })
}

/// Whether `path` names a file written under a [`unique_stem`]
pub fn is_download_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| download_stem().is_match(n))
}

/// Create a private work directory (`reelbot_*`) inside `base`.
///
/// Removed with everything in it when the returned guard is dropped or closed.
pub fn create_work_dir(base: &Path) -> std::io::Result<TempDir> {
    std::fs::create_dir_all(base)?;
    tempfile::Builder::new().prefix("reelbot_").tempdir_in(base)
}

/// Convert a media title to a safe delivery filename
pub fn to_safe_filename(title: &str, extension: &str) -> String {
    let mut safe_title = invalid_chars().replace_all(title, "_").to_string();
    safe_title = safe_title
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string();

    if safe_title.chars().count() > 100 {
        safe_title = safe_title.chars().take(100).collect::<String>().trim_end().to_string();
    }

    if safe_title.is_empty() {
        safe_title = "media".to_string();
    }

    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        safe_title
    } else {
        format!("{}.{}", safe_title, extension)
    }
}

/// Collision-free stem for one download: `{kind}_{unix_millis}_{random hex}`
pub fn unique_stem(kind: DownloadKind) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}_{}_{:08x}", kind.as_str(), millis, rand::random::<u32>())
}

fn has_stem(path: &Path, stem: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(&format!("{}.", stem)))
}

/// Find the file the engine produced for `stem` with one of `extensions`
pub fn find_produced_file(dir: &Path, stem: &str, extensions: &[&str]) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_stem(p, stem))
        .find(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        })
}

/// Remove files left behind for `stem` (partial downloads, intermediates),
/// sparing `keep` if given
pub fn remove_stem_files(dir: &Path, stem: &str, keep: Option<&Path>) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_stem(e.path(), stem))
        .filter(|e| keep.map_or(true, |k| e.path() != k))
    {
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {:?}: {}", entry.path(), e),
        }
    }
    if removed > 0 {
        debug!("Removed {} leftover files for {}", removed, stem);
    }
    removed
}

/// Remove download files in `dir` last modified more than `max_age` ago.
///
/// Only names produced by [`unique_stem`] are touched.
pub fn sweep_stale_files(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_download_file(e.path()))
    {
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        let stale = modified
            .and_then(|m| now.duration_since(m).ok())
            .map_or(false, |age| age > max_age);
        if stale {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }

    Ok(removed)
}
