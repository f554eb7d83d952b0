//! URL utilities for classifying submitted links

use crate::core::media::{MediaRequest, Platform};
use crate::error::ReelError;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Substrings marking a playlist, channel or profile link
const COLLECTION_INDICATORS: &[&str] = &[
    "playlist?list=",
    "/channel/",
    "/c/",
    "/@",
    "/user/",
];

fn watch_with_list() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"watch\?v=[^&]*.*&list=").expect("valid regex"))
}

/// A single post under a profile path, e.g. TikTok `/@user/video/123`
fn profile_item() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/@[^/?#]+/(video|photo)/").expect("valid regex"))
}

fn url_in_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid regex"))
}

/// Classify submitted text as a media request
pub fn classify(text: &str) -> Result<MediaRequest, ReelError> {
    let text = text.trim();
    let parsed = Url::parse(text).map_err(|_| ReelError::InvalidUrl(text.to_string()))?;

    if parsed.scheme().is_empty() || parsed.host_str().map_or(true, str::is_empty) {
        return Err(ReelError::InvalidUrl(text.to_string()));
    }

    let platform = detect_platform(&parsed);
    let is_collection = is_collection_url(text);

    Ok(MediaRequest {
        url: text.to_string(),
        platform,
        is_collection,
    })
}

/// Detect the platform a parsed URL belongs to
pub fn detect_platform(url: &Url) -> Platform {
    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .unwrap_or_default();

    for platform in Platform::KNOWN {
        let matched = platform
            .domains()
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)));
        if matched {
            return platform;
        }
    }

    if url.as_str().to_lowercase().contains("spotlight") {
        return Platform::Snapchat;
    }

    Platform::Unknown
}

/// Check if URL denotes a playlist or channel
pub fn is_collection_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    if profile_item().is_match(&lower) {
        return false;
    }
    COLLECTION_INDICATORS.iter().any(|i| lower.contains(i)) || watch_with_list().is_match(&lower)
}

/// Extract http(s) URLs from free text
pub fn extract_urls(text: &str) -> Vec<String> {
    url_in_text()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', '!']).to_string())
        .collect()
}

/// Check if free text looks like an attempt to send a link
pub fn looks_like_link(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["http", "www", ".com", ".ly", ".be"]
        .iter()
        .any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform_of(url: &str) -> Platform {
        classify(url).unwrap().platform
    }

    #[test]
    fn test_classify_rejects_non_urls() {
        for text in [
            "",
            "hello there",
            "youtube.com/watch?v=abc",
            "www.tiktok.com/@a/video/1",
            "mailto:someone@example.com",
            "://missing-scheme.com",
        ] {
            assert!(
                matches!(classify(text), Err(ReelError::InvalidUrl(_))),
                "expected InvalidUrl for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_detect_known_platforms() {
        assert_eq!(platform_of("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Platform::Youtube);
        assert_eq!(platform_of("https://m.youtube.com/watch?v=dQw4w9WgXcQ"), Platform::Youtube);
        assert_eq!(platform_of("https://youtu.be/dQw4w9WgXcQ"), Platform::Youtube);
        assert_eq!(platform_of("https://music.youtube.com/watch?v=x"), Platform::Youtube);
        assert_eq!(platform_of("https://www.tiktok.com/@user/video/7123"), Platform::Tiktok);
        assert_eq!(platform_of("https://vm.tiktok.com/ZMabc/"), Platform::Tiktok);
        assert_eq!(platform_of("https://www.instagram.com/reel/Cabc/"), Platform::Instagram);
        assert_eq!(platform_of("https://www.facebook.com/watch/?v=1"), Platform::Facebook);
        assert_eq!(platform_of("https://m.facebook.com/story.php?id=1"), Platform::Facebook);
        assert_eq!(platform_of("https://fb.watch/abc/"), Platform::Facebook);
        assert_eq!(platform_of("https://twitter.com/u/status/1"), Platform::Twitter);
        assert_eq!(platform_of("https://mobile.twitter.com/u/status/1"), Platform::Twitter);
        assert_eq!(platform_of("https://x.com/u/status/1"), Platform::Twitter);
        assert_eq!(platform_of("https://www.snapchat.com/spotlight/W7_abc"), Platform::Snapchat);
        assert_eq!(platform_of("https://story.snapchat.com/s/abc"), Platform::Snapchat);
    }

    #[test]
    fn test_spotlight_token_marks_snapchat() {
        assert_eq!(platform_of("https://t.snapchat.link/spotlight/abc"), Platform::Snapchat);
    }

    #[test]
    fn test_other_domains_are_unknown() {
        assert_eq!(platform_of("https://vimeo.com/123"), Platform::Unknown);
        assert_eq!(platform_of("https://www.dropbox.com/s/abc"), Platform::Unknown);
        assert_eq!(platform_of("https://notyoutube.com.evil.io/watch"), Platform::Unknown);
        assert_eq!(platform_of("HTTPS://WWW.YOUTUBE.COM/watch?v=x"), Platform::Youtube);
    }

    #[test]
    fn test_collection_detection() {
        assert!(classify("https://www.youtube.com/playlist?list=PLxxxx").unwrap().is_collection);
        assert!(classify("https://www.youtube.com/watch?v=abc&list=PLxxxx").unwrap().is_collection);
        assert!(classify("https://www.youtube.com/channel/UCxxxx").unwrap().is_collection);
        assert!(classify("https://www.youtube.com/c/SomeName").unwrap().is_collection);
        assert!(classify("https://www.youtube.com/@handle").unwrap().is_collection);
        assert!(classify("https://www.youtube.com/user/legacy").unwrap().is_collection);

        assert!(!classify("https://www.youtube.com/watch?v=abc").unwrap().is_collection);
        assert!(!classify("https://youtu.be/abc?t=10").unwrap().is_collection);
        // TikTok profile paths carry "/@" but a video link is a single item
        assert!(!classify("https://www.tiktok.com/@user/video/7123").unwrap().is_collection);
        assert!(!classify("https://www.tiktok.com/@user/photo/7123").unwrap().is_collection);
    }

    #[test]
    fn test_collection_indicators_apply_to_every_platform() {
        assert!(classify("https://www.tiktok.com/@user").unwrap().is_collection);
        assert!(classify("https://www.tiktok.com/@user?lang=en").unwrap().is_collection);
        assert!(classify("https://www.facebook.com/user/someone").unwrap().is_collection);
        assert!(classify("https://vimeo.com/channel/staffpicks").unwrap().is_collection);

        assert!(!classify("https://www.instagram.com/reel/Cabc/").unwrap().is_collection);
        assert!(!classify("https://x.com/u/status/1").unwrap().is_collection);
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls("check this https://youtu.be/abc, and http://x.com/u/status/1!");
        assert_eq!(urls, vec!["https://youtu.be/abc", "http://x.com/u/status/1"]);
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_looks_like_link() {
        assert!(looks_like_link("www.youtube.com/watch"));
        assert!(looks_like_link("bit.ly/abc"));
        assert!(!looks_like_link("hello bot"));
    }
}
