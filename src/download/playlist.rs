//! Playlist and channel expansion

use crate::core::media::{Collection, CollectionEntry, FormatKind, FormatOption, VideoTraits};
use crate::download::credentials::CredentialPolicy;
use crate::engine::{Engine, EngineOptions, RawEntry, RawMetadata};
use crate::error::ReelError;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum entries kept in one collection snapshot
pub const MAX_COLLECTION_ENTRIES: usize = 50;

/// Selector used when downloading every entry of a collection as video
pub const BATCH_VIDEO_SELECTOR: &str = "best[height<=720][ext=mp4]/best[ext=mp4]/best";

/// Video option used for "download all"
pub fn batch_video_option() -> FormatOption {
    FormatOption {
        kind: FormatKind::Video,
        quality: "720p".to_string(),
        format_id: BATCH_VIDEO_SELECTOR.to_string(),
        estimated_size: None,
        ext: Some("mp4".to_string()),
        video: Some(VideoTraits {
            height: Some(720),
            ..Default::default()
        }),
    }
}

/// Lists the members of a playlist or channel
pub struct PlaylistExpander {
    engine: Arc<dyn Engine>,
    policy: Arc<CredentialPolicy>,
    base_options: EngineOptions,
}

impl PlaylistExpander {
    pub fn new(engine: Arc<dyn Engine>, policy: Arc<CredentialPolicy>) -> Self {
        Self {
            engine,
            policy,
            base_options: EngineOptions::default(),
        }
    }

    /// Set the engine options every listing starts from
    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.base_options = options;
        self
    }

    fn listing_options(&self) -> EngineOptions {
        EngineOptions {
            flat_extraction: true,
            ignore_errors: true,
            single_item: false,
            format: None,
            output_template: None,
            audio: None,
            ..self.base_options.clone()
        }
    }

    /// Fetch a bounded snapshot of the collection at `url`.
    ///
    /// `Ok(None)` means the engine returned no collection structure;
    /// a structure without usable entries yields an empty collection.
    pub async fn expand(&self, url: &str) -> Result<Option<Collection>, ReelError> {
        let options = self.listing_options();
        let engine = &self.engine;
        let value = self
            .policy
            .execute(|cookies| {
                let options = options.with_cookies(cookies);
                async move { engine.extract_metadata(url, &options).await }
            })
            .await?;

        let Some(raw) = RawMetadata::from_value(value)? else {
            debug!(url, "Engine returned no collection metadata");
            return Ok(None);
        };
        Ok(build_collection(url, raw))
    }
}

/// Convert a flat listing into a collection snapshot
pub fn build_collection(url: &str, raw: RawMetadata) -> Option<Collection> {
    let raw_entries = raw.entries?;
    let total = raw_entries.len();

    let entries: Vec<CollectionEntry> = raw_entries
        .into_iter()
        .flatten()
        .filter(|e| e.id.as_deref().map_or(false, |id| !id.is_empty()))
        .take(MAX_COLLECTION_ENTRIES)
        .enumerate()
        .filter_map(|(i, entry)| collection_entry(i + 1, entry))
        .collect();

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Playlist".to_string());
    info!(
        url,
        "Collection {:?}: kept {} of {} entries",
        title,
        entries.len(),
        total
    );

    Some(Collection {
        source_url: url.to_string(),
        title,
        uploader: raw.uploader,
        entries,
    })
}

fn collection_entry(index: usize, entry: RawEntry) -> Option<CollectionEntry> {
    let duration = entry.duration_secs();
    let id = entry.id?;
    let url = entry
        .url
        .filter(|u| u.starts_with("http"))
        .or(entry.webpage_url)
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));

    Some(CollectionEntry {
        index,
        title: entry
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Video {}", index)),
        duration,
        url,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use serde_json::json;

    fn expander(engine: Arc<FakeEngine>) -> PlaylistExpander {
        PlaylistExpander::new(engine, Arc::new(CredentialPolicy::disabled()))
    }

    #[tokio::test]
    async fn test_collection_is_capped_at_fifty() {
        let entries: Vec<_> = (0..73)
            .map(|i| json!({"id": format!("v{}", i), "title": format!("Track {}", i)}))
            .collect();
        let engine = Arc::new(FakeEngine::new());
        engine.push_metadata(Some(json!({"title": "Mix", "entries": entries})));

        let collection = expander(engine.clone())
            .expand("https://www.youtube.com/playlist?list=PL1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(collection.len(), 50);
        let indices: Vec<usize> = collection.entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, (1..=50).collect::<Vec<_>>());
        assert_eq!(collection.entries[0].id, "v0");
        assert_eq!(collection.entries[49].id, "v49");
        assert_eq!(collection.title, "Mix");

        let calls = engine.calls();
        let options = calls[0].options();
        assert!(options.flat_extraction);
        assert!(options.ignore_errors);
        assert!(!options.single_item);
    }

    #[tokio::test]
    async fn test_missing_structure_vs_empty_collection() {
        let engine = Arc::new(FakeEngine::new());
        engine
            .push_metadata(None)
            .push_metadata(Some(json!({"title": "Clip", "formats": []})))
            .push_metadata(Some(json!({"title": "Empty", "entries": []})));
        let expander = expander(engine);

        assert!(expander.expand("https://youtube.com/@a").await.unwrap().is_none());
        assert!(expander.expand("https://youtube.com/@a").await.unwrap().is_none());
        let empty = expander.expand("https://youtube.com/@a").await.unwrap().unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_propagates() {
        let engine = Arc::new(FakeEngine::new());
        engine.push_metadata_error("HTTP Error 404");
        let result = expander(engine).expand("https://youtube.com/@a").await;
        assert!(matches!(result, Err(ReelError::EngineFailure(_))));
    }

    #[test]
    fn test_broken_entries_are_dropped_and_renumbered() {
        let raw = RawMetadata::from_value(Some(json!({
            "entries": [
                {"id": "a", "url": "https://www.youtube.com/watch?v=a", "duration": 61.0},
                null,
                {"title": "no id"},
                {"id": "b", "webpage_url": "https://www.youtube.com/watch?v=b"},
                {"id": "c", "url": "c", "title": ""}
            ]
        })))
        .unwrap()
        .unwrap();

        let collection = build_collection("https://youtube.com/playlist?list=x", raw).unwrap();
        assert_eq!(collection.title, "Playlist");
        assert_eq!(collection.len(), 3);

        let a = collection.entry(1).unwrap();
        assert_eq!(a.id, "a");
        assert_eq!(a.duration, Some(61));

        let b = collection.entry(2).unwrap();
        assert_eq!(b.url, "https://www.youtube.com/watch?v=b");
        assert_eq!(b.title, "Video 2");

        let c = collection.entry(3).unwrap();
        assert_eq!(c.url, "https://www.youtube.com/watch?v=c");
    }
}
