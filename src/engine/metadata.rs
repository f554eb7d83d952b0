//! Typed boundary over the engine's loosely-typed metadata

use crate::error::ReelError;
use serde::Deserialize;

/// Height as reported by the engine: usually a number, sometimes text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawHeight {
    Number(f64),
    Text(String),
}

impl RawHeight {
    /// Label used in the quality string, e.g. "720"
    pub fn label(&self) -> String {
        match self {
            RawHeight::Number(n) => format!("{}", *n as u64),
            RawHeight::Text(s) => s.trim().to_string(),
        }
    }

    /// Numeric sort key; unparsable heights sort last as 0
    pub fn sort_key(&self) -> u32 {
        match self {
            RawHeight::Number(n) if *n > 0.0 => *n as u32,
            RawHeight::Number(_) => 0,
            RawHeight::Text(s) => s.trim().trim_end_matches('p').parse().unwrap_or(0),
        }
    }
}

/// One format entry from the engine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<RawHeight>,
    pub width: Option<f64>,
    pub fps: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl RawFormat {
    /// Video codec, unless absent or the engine's "none" marker
    pub fn video_codec(&self) -> Option<&str> {
        self.vcodec
            .as_deref()
            .filter(|v| !v.is_empty() && *v != "none")
    }

    /// Exact size when known, otherwise the engine's approximation
    pub fn size_estimate(&self) -> Option<u64> {
        self.filesize
            .or(self.filesize_approx)
            .filter(|s| *s > 0.0)
            .map(|s| s as u64)
    }
}

/// One member of a flat collection listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub url: Option<String>,
    pub webpage_url: Option<String>,
}

/// Metadata for an item or a collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub ext: Option<String>,
    pub formats: Option<Vec<RawFormat>>,
    /// Present only for collections; broken members arrive as `null`
    pub entries: Option<Vec<Option<RawEntry>>>,
}

impl RawMetadata {
    /// Parse engine output; `None` and JSON `null` both mean "no metadata"
    pub fn from_value(value: Option<serde_json::Value>) -> Result<Option<Self>, ReelError> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Format list; absent and `null` both read as empty
    pub fn formats(&self) -> &[RawFormat] {
        self.formats.as_deref().unwrap_or(&[])
    }

    /// Duration in whole seconds
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.filter(|d| *d >= 0.0).map(|d| d as u64)
    }
}

impl RawEntry {
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.filter(|d| *d >= 0.0).map(|d| d as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_metadata_is_none() {
        assert!(RawMetadata::from_value(None).unwrap().is_none());
        assert!(RawMetadata::from_value(Some(serde_json::Value::Null))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_parse_tolerates_missing_fields() {
        let raw = RawMetadata::from_value(Some(json!({
            "title": "Clip",
            "formats": [
                {"format_id": "18", "vcodec": "avc1", "height": 360},
                {"format_id": "140", "vcodec": "none", "acodec": "mp4a"},
                {}
            ]
        })))
        .unwrap()
        .unwrap();

        assert_eq!(raw.title.as_deref(), Some("Clip"));
        let formats = raw.formats();
        assert_eq!(formats.len(), 3);
        assert_eq!(formats[0].video_codec(), Some("avc1"));
        assert_eq!(formats[1].video_codec(), None);
        assert!(formats[2].height.is_none());
        assert!(raw.entries.is_none());
    }

    #[test]
    fn test_height_variants() {
        let raw: RawFormat = serde_json::from_value(json!({"height": 1080})).unwrap();
        assert_eq!(raw.height.as_ref().unwrap().sort_key(), 1080);
        assert_eq!(raw.height.as_ref().unwrap().label(), "1080");

        let raw: RawFormat = serde_json::from_value(json!({"height": "720"})).unwrap();
        assert_eq!(raw.height.unwrap().sort_key(), 720);

        let raw: RawFormat = serde_json::from_value(json!({"height": "tall"})).unwrap();
        assert_eq!(raw.height.unwrap().sort_key(), 0);
    }

    #[test]
    fn test_size_estimate_falls_back_to_approx() {
        let raw: RawFormat =
            serde_json::from_value(json!({"filesize": null, "filesize_approx": 2048.7})).unwrap();
        assert_eq!(raw.size_estimate(), Some(2048));

        let raw: RawFormat = serde_json::from_value(json!({"filesize": 0})).unwrap();
        assert_eq!(raw.size_estimate(), None);
    }

    #[test]
    fn test_collection_entries_keep_nulls() {
        let raw = RawMetadata::from_value(Some(json!({
            "title": "List",
            "entries": [{"id": "a"}, null, {"title": "no id"}]
        })))
        .unwrap()
        .unwrap();
        let entries = raw.entries.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[1].is_none());
    }
}
