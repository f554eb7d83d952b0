//! Format catalog construction from engine metadata

use crate::core::media::{AudioTier, FormatCatalog, FormatKind, FormatOption, VideoTraits};
use crate::engine::{RawFormat, RawMetadata};
use std::cmp::Ordering;
use tracing::debug;

/// Maximum number of video options offered for one item
pub const MAX_VIDEO_OPTIONS: usize = 6;

/// Build the option catalog for one item.
///
/// Returns `None` only when the engine produced no metadata at all. Metadata
/// without any usable video stream still yields a catalog with the two audio
/// tiers.
pub fn build_catalog(raw: Option<&RawMetadata>) -> Option<FormatCatalog> {
    let raw = raw?;

    let mut ranked: Vec<(u32, &RawFormat)> = raw
        .formats()
        .iter()
        .filter(|f| f.video_codec().is_some() && f.format_id.is_some())
        .filter_map(|f| f.height.as_ref().map(|h| (h.sort_key(), f)))
        .collect();

    ranked.sort_by(|(ha, a), (hb, b)| {
        hb.cmp(ha)
            .then_with(|| compare_fps(b.fps, a.fps))
            .then_with(|| b.size_estimate().is_some().cmp(&a.size_estimate().is_some()))
    });
    ranked.dedup_by_key(|(height, _)| *height);
    ranked.truncate(MAX_VIDEO_OPTIONS);

    let video: Vec<FormatOption> = ranked
        .into_iter()
        .filter_map(|(height, format)| video_option(height, format))
        .collect();

    debug!(
        "Catalog for {:?}: {} video options from {} formats",
        raw.title,
        video.len(),
        raw.formats().len()
    );

    Some(FormatCatalog {
        title: raw
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Unknown Title".to_string()),
        duration: raw.duration_secs(),
        uploader: raw.uploader.clone(),
        thumbnail: raw.thumbnail.clone(),
        video,
        audio: AudioTier::ALL.iter().map(|t| FormatOption::audio(*t)).collect(),
    })
}

fn compare_fps(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(0.0)
        .partial_cmp(&b.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}

fn video_option(height: u32, format: &RawFormat) -> Option<FormatOption> {
    let format_id = format.format_id.clone()?;
    let label = format.height.as_ref()?.label();
    let label = label.trim_end_matches('p');

    Some(FormatOption {
        kind: FormatKind::Video,
        quality: format!("{}p", label),
        format_id,
        estimated_size: format.size_estimate(),
        ext: format.ext.clone(),
        video: Some(VideoTraits {
            vcodec: format.video_codec().map(str::to_string),
            acodec: format.acodec.clone().filter(|a| a != "none"),
            fps: format.fps,
            width: format.width.filter(|w| *w > 0.0).map(|w| w as u32),
            height: (height > 0).then_some(height),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> RawMetadata {
        RawMetadata::from_value(Some(value)).unwrap().unwrap()
    }

    fn heights(catalog: &FormatCatalog) -> Vec<u32> {
        catalog
            .video
            .iter()
            .map(|o| o.video.as_ref().and_then(|v| v.height).unwrap_or(0))
            .collect()
    }

    #[test]
    fn test_seven_or_more_formats_yield_six_descending() {
        let raw = metadata(json!({
            "title": "Concert",
            "duration": 245.6,
            "formats": [
                {"format_id": "160", "vcodec": "avc1", "height": 144, "ext": "mp4"},
                {"format_id": "133", "vcodec": "avc1", "height": 240, "ext": "mp4"},
                {"format_id": "134", "vcodec": "avc1", "height": 360, "ext": "mp4"},
                {"format_id": "135", "vcodec": "avc1", "height": 480, "ext": "mp4"},
                {"format_id": "136", "vcodec": "avc1", "height": 720, "ext": "mp4", "filesize": 5000000},
                {"format_id": "137", "vcodec": "avc1", "height": 1080, "ext": "mp4"},
                {"format_id": "313", "vcodec": "vp9", "height": 2160, "ext": "webm"},
                {"format_id": "140", "vcodec": "none", "acodec": "mp4a", "ext": "m4a"}
            ]
        }));

        let catalog = build_catalog(Some(&raw)).unwrap();
        assert_eq!(catalog.video.len(), 6);
        assert_eq!(heights(&catalog), vec![2160, 1080, 720, 480, 360, 240]);
        assert!(heights(&catalog).windows(2).all(|w| w[0] > w[1]));
        assert_eq!(catalog.video[0].quality, "2160p");
        assert_eq!(catalog.video[2].estimated_size, Some(5_000_000));
        assert_eq!(catalog.audio.len(), 2);
        assert_eq!(catalog.duration, Some(245));
        assert_eq!(catalog.title, "Concert");
    }

    #[test]
    fn test_zero_video_formats_still_offers_audio() {
        let raw = metadata(json!({
            "title": "Podcast",
            "formats": [
                {"format_id": "140", "vcodec": "none", "acodec": "mp4a"},
                {"format_id": "251", "acodec": "opus"}
            ]
        }));

        let catalog = build_catalog(Some(&raw)).unwrap();
        assert!(catalog.video.is_empty());
        assert_eq!(catalog.audio.len(), 2);
        assert_eq!(catalog.audio[0].quality, "192kbps");
        assert_eq!(catalog.audio[1].quality, "128kbps");
    }

    #[test]
    fn test_missing_metadata_yields_none() {
        assert!(build_catalog(None).is_none());
    }

    #[test]
    fn test_formats_without_height_are_skipped() {
        let raw = metadata(json!({
            "formats": [
                {"format_id": "a", "vcodec": "avc1"},
                {"format_id": "b", "vcodec": "avc1", "height": 360}
            ]
        }));
        let catalog = build_catalog(Some(&raw)).unwrap();
        assert_eq!(catalog.video.len(), 1);
        assert_eq!(catalog.video[0].format_id, "b");
        assert_eq!(catalog.title, "Unknown Title");
    }

    #[test]
    fn test_equal_heights_keep_highest_fps() {
        let raw = metadata(json!({
            "formats": [
                {"format_id": "298", "vcodec": "avc1", "height": 720, "fps": 30},
                {"format_id": "302", "vcodec": "vp9", "height": 720, "fps": 60},
                {"format_id": "299", "vcodec": "avc1", "height": 1080, "fps": 60}
            ]
        }));
        let catalog = build_catalog(Some(&raw)).unwrap();
        assert_eq!(catalog.video.len(), 2);
        assert_eq!(catalog.video[1].format_id, "302");
    }

    #[test]
    fn test_unparsable_heights_sort_last() {
        let raw = metadata(json!({
            "formats": [
                {"format_id": "odd", "vcodec": "avc1", "height": "tall"},
                {"format_id": "text", "vcodec": "avc1", "height": "480p"},
                {"format_id": "num", "vcodec": "avc1", "height": 720}
            ]
        }));
        let catalog = build_catalog(Some(&raw)).unwrap();
        let ids: Vec<&str> = catalog.video.iter().map(|o| o.format_id.as_str()).collect();
        assert_eq!(ids, vec!["num", "text", "odd"]);
        assert_eq!(catalog.video[1].quality, "480p");
        assert_eq!(catalog.video[2].video.as_ref().unwrap().height, None);
    }
}
