//! User-facing message rendering

use crate::chat::Button;
use crate::core::media::{
    Collection, FormatCatalog, FormatKind, FormatOption, MediaDetails, Platform,
};
use crate::core::pipeline::BatchReport;
use crate::core::progress::{format_bytes, format_clock, format_duration};
use crate::core::session::{Choice, ChoiceAction, SessionId};
use crate::stats::ledger::{GlobalSummary, LeaderboardEntry, RecordOutcome, UserSummary};
use std::time::Duration;

/// Longest title shown in headers and captions
const TITLE_LIMIT: usize = 50;

/// Longest title shown on an entry button
const BUTTON_TITLE_LIMIT: usize = 35;

pub const WELCOME: &str = "🎬 Welcome to reelbot!\n\n\
Send me a link from YouTube, TikTok, Instagram, Facebook or Twitter/X and pick a quality.\n\
Playlists and channels are supported too.\n\n\
Type /help for all commands.";

pub const HELP: &str = "📚 How to use reelbot\n\n\
1. Send a video, playlist or channel link\n\
2. Choose a video quality or MP3 audio\n\
3. Wait for the file to arrive\n\n\
Commands:\n\
/start - welcome message\n\
/help - this help\n\
/mystats - your downloads, points and achievements\n\
/stats - bot-wide statistics\n\
/top - most active users";

/// Cut `text` to at most `max` characters, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Quality badge shown next to a video option
pub fn quality_badge(option: &FormatOption) -> &'static str {
    match option.video.as_ref().and_then(|v| v.height).unwrap_or(0) {
        h if h >= 1080 => "🔥",
        h if h >= 720 => "⭐",
        h if h >= 480 => "✅",
        _ => "📱",
    }
}

fn choice(session: SessionId, action: ChoiceAction) -> String {
    Choice::new(session, action).encode()
}

/// Catalog text and one button row per option
pub fn render_catalog(
    session: SessionId,
    catalog: &FormatCatalog,
    has_back: bool,
) -> (String, Vec<Vec<Button>>) {
    let mut text = format!("📹 {}\n", truncate(&catalog.title, TITLE_LIMIT));
    if let Some(uploader) = &catalog.uploader {
        text.push_str(&format!("👤 {}\n", uploader));
    }
    if let Some(duration) = catalog.duration.filter(|d| *d > 0) {
        text.push_str(&format!("⏱ Duration: {}\n", format_clock(duration)));
    }
    text.push_str("\n🎯 Choose quality and format:\n");

    let mut rows = Vec::new();
    if !catalog.video.is_empty() {
        text.push_str("\n📹 Video options\n");
        for option in &catalog.video {
            let size = option
                .estimated_size
                .map(format_bytes)
                .unwrap_or_else(|| "size unknown".to_string());
            rows.push(vec![Button::new(
                format!("{} {} - {}", quality_badge(option), option.quality, size),
                choice(session, ChoiceAction::Video(option.format_id.clone())),
            )]);
        }
    }

    text.push_str("\n🎵 Audio options\n");
    for option in &catalog.audio {
        if let FormatKind::Audio(tier) = option.kind {
            rows.push(vec![Button::new(
                format!("🎵 MP3 {} quality ({})", tier.key(), option.quality),
                choice(session, ChoiceAction::Audio(tier)),
            )]);
        }
    }

    if has_back {
        rows.push(vec![Button::new("🔙 Back to list", choice(session, ChoiceAction::Back))]);
    }
    rows.push(vec![Button::new("❌ Cancel", choice(session, ChoiceAction::Cancel))]);
    (text, rows)
}

/// Collection page listing with entry, navigation and batch buttons
pub fn render_collection_page(
    session: SessionId,
    collection: &Collection,
    page: usize,
) -> (String, Vec<Vec<Button>>) {
    let view = collection.page(page);

    let mut text = format!("📋 {}\n", truncate(&collection.title, TITLE_LIMIT));
    if let Some(uploader) = &collection.uploader {
        text.push_str(&format!("👤 {}\n", uploader));
    }
    text.push_str(&format!(
        "🎬 {} videos · page {}/{}\n\n",
        collection.len(),
        view.number + 1,
        view.total_pages
    ));

    let mut rows = Vec::new();
    for entry in view.entries {
        let duration = entry
            .duration
            .map(|d| format!(" ({})", format_clock(d)))
            .unwrap_or_default();
        text.push_str(&format!("{}. {}{}\n", entry.index, truncate(&entry.title, TITLE_LIMIT), duration));
        rows.push(vec![Button::new(
            format!("{}. {}", entry.index, truncate(&entry.title, BUTTON_TITLE_LIMIT)),
            choice(session, ChoiceAction::Entry(entry.index)),
        )]);
    }

    let mut nav = Vec::new();
    if view.has_prev {
        nav.push(Button::new("⬅️ Previous", choice(session, ChoiceAction::Page(view.number - 1))));
    }
    if view.has_next {
        nav.push(Button::new("Next ➡️", choice(session, ChoiceAction::Page(view.number + 1))));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }

    rows.push(vec![Button::new("📥 Download all", choice(session, ChoiceAction::All))]);
    rows.push(vec![Button::new(
        "🎵 Download all as audio",
        choice(session, ChoiceAction::AllAudio),
    )]);
    rows.push(vec![Button::new("❌ Cancel", choice(session, ChoiceAction::Cancel))]);
    (text, rows)
}

/// Caption attached to a delivered file
pub fn render_caption(details: &MediaDetails, size: u64, elapsed: Duration) -> String {
    let mut caption = format!("🎥 {}\n\n", truncate(&details.title, TITLE_LIMIT));
    if let (Some(width), Some(height)) = (details.width, details.height) {
        caption.push_str(&format!("📺 Resolution: {}x{}\n", width, height));
    }
    if let Some(duration) = details.duration.filter(|d| *d > 0) {
        caption.push_str(&format!("⏱ Duration: {}\n", format_clock(duration)));
    }
    caption.push_str(&format!("📦 Size: {}\n", format_bytes(size)));
    caption.push_str(&format!("⚡ Download time: {}", format_duration(elapsed)));
    caption
}

/// Achievement and level-up notice, if anything changed
pub fn render_outcome(outcome: &RecordOutcome) -> Option<String> {
    if outcome.new_achievements.is_empty() && !outcome.leveled_up {
        return None;
    }

    let mut text = String::new();
    for achievement in &outcome.new_achievements {
        text.push_str(&format!(
            "🏅 Achievement unlocked: {}\n   {}\n",
            achievement.title(),
            achievement.description()
        ));
    }
    if outcome.leveled_up {
        text.push_str(&format!("🆙 Level up! You are now level {}\n", outcome.level));
    }
    text.push_str(&format!(
        "💎 +{} points · {} total",
        outcome.points_earned, outcome.total_points
    ));
    Some(text)
}

/// `/mystats` body
pub fn render_user_stats(summary: &UserSummary) -> String {
    let profile = &summary.profile;
    let mut text = format!(
        "📊 Your statistics\n\n\
📥 Downloads: {} ({} video, {} audio)\n\
📦 Data: {}\n\
⭐ Level {} · {} points\n\
🏆 Rank #{} of {} ({:.1}th percentile)\n\
📅 Today: {}\n",
        profile.total_downloads,
        profile.video_downloads,
        profile.audio_downloads,
        format_bytes(summary.total_bytes),
        profile.level,
        profile.points,
        summary.rank.rank,
        summary.rank.total_users,
        summary.rank.percentile,
        profile.daily_downloads,
    );

    if let Some((platform, count)) = profile.platforms.iter().max_by_key(|(_, count)| **count) {
        text.push_str(&format!("🌐 Favorite platform: {} ({})\n", platform, count));
    }

    if profile.achievements.is_empty() {
        text.push_str("\n🏅 No achievements yet");
    } else {
        text.push_str("\n🏅 Achievements:\n");
        for achievement in &profile.achievements {
            text.push_str(&format!("  {}\n", achievement.title()));
        }
    }
    text.trim_end().to_string()
}

/// `/stats` body
pub fn render_global_stats(stats: &GlobalSummary) -> String {
    let mut text = format!(
        "📈 Bot statistics\n\n\
📥 Total downloads: {}\n\
👥 Users: {}\n\
📅 Last 7 days: {}\n\
🚀 Best day: {}\n\
📋 Playlists: {}\n\
📦 Data served: {}\n",
        stats.total_downloads,
        stats.total_users,
        stats.last_week_downloads,
        stats.peak_daily_downloads,
        stats.playlists_downloaded,
        format_bytes(stats.total_bytes),
    );

    if let Some((platform, count)) = stats.most_popular_platform.filter(|(_, c)| *c > 0) {
        text.push_str(&format!("🔥 Most popular: {} ({})\n", platform.display_name(), count));
    }

    text.push_str("\n🌐 By platform:\n");
    for platform in Platform::KNOWN {
        let count = stats
            .platform_breakdown
            .get(platform.as_str())
            .copied()
            .unwrap_or(0);
        text.push_str(&format!("  {}: {}\n", platform.display_name(), count));
    }
    text.trim_end().to_string()
}

/// `/top` body
pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "🏆 No downloads yet. Be the first!".to_string();
    }
    let mut text = "🏆 Top users\n\n".to_string();
    for (i, entry) in entries.iter().enumerate() {
        let medal = match i {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "🏅",
        };
        text.push_str(&format!(
            "{} User {} · {} downloads · level {}\n",
            medal, entry.user_id, entry.downloads, entry.level
        ));
    }
    text.trim_end().to_string()
}

/// Summary after a whole-collection download
pub fn render_batch_report(report: &BatchReport) -> String {
    let mut text = if report.cancelled {
        "🚫 Playlist download cancelled\n".to_string()
    } else {
        "✅ Playlist download finished\n".to_string()
    };
    text.push_str(&format!("📥 Delivered: {}/{}\n", report.delivered, report.total));
    if report.failed > 0 {
        text.push_str(&format!("⚠️ Failed: {}", report.failed));
    }
    text.trim_end().to_string()
}
