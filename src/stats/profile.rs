//! Per-user gamification profile: points, levels and achievements

use crate::core::media::DownloadKind;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Points every download earns before bonuses
pub const BASE_POINTS: u64 = 10;

/// One-time bonus granted with each achievement
pub const ACHIEVEMENT_BONUS: u64 = 50;

/// Highest reachable level
pub const MAX_LEVEL: u32 = 50;

/// Download history entries kept per user
pub const HISTORY_LIMIT: usize = 50;

/// Permanent unlocks earned by reaching usage thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstDownload,
    DownloadVeteran,
    DownloadMaster,
    DownloadLegend,
    PlatformExplorer,
    PlatformMaster,
    QualityEnthusiast,
    AudioLover,
    DailyUser,
}

impl Achievement {
    /// All achievements in evaluation order
    pub const ALL: [Achievement; 9] = [
        Achievement::FirstDownload,
        Achievement::DownloadVeteran,
        Achievement::DownloadMaster,
        Achievement::DownloadLegend,
        Achievement::PlatformExplorer,
        Achievement::PlatformMaster,
        Achievement::QualityEnthusiast,
        Achievement::AudioLover,
        Achievement::DailyUser,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstDownload => "🌟 First Steps",
            Achievement::DownloadVeteran => "⚡ Veteran",
            Achievement::DownloadMaster => "🏆 Master",
            Achievement::DownloadLegend => "👑 Legend",
            Achievement::PlatformExplorer => "🌍 Explorer",
            Achievement::PlatformMaster => "🎯 Platform Master",
            Achievement::QualityEnthusiast => "💎 Quality Enthusiast",
            Achievement::AudioLover => "🎵 Audio Lover",
            Achievement::DailyUser => "📅 Daily User",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstDownload => "Your first download!",
            Achievement::DownloadVeteran => "10 downloads",
            Achievement::DownloadMaster => "50 downloads",
            Achievement::DownloadLegend => "100 downloads",
            Achievement::PlatformExplorer => "3 different platforms",
            Achievement::PlatformMaster => "5 different platforms",
            Achievement::QualityEnthusiast => "10 high quality downloads",
            Achievement::AudioLover => "20 audio files",
            Achievement::DailyUser => "5 downloads in one day",
        }
    }

    /// Whether the profile currently meets this achievement's threshold
    fn is_met(&self, profile: &UserProfile) -> bool {
        match self {
            Achievement::FirstDownload => profile.total_downloads >= 1,
            Achievement::DownloadVeteran => profile.total_downloads >= 10,
            Achievement::DownloadMaster => profile.total_downloads >= 50,
            Achievement::DownloadLegend => profile.total_downloads >= 100,
            Achievement::PlatformExplorer => profile.platforms.len() >= 3,
            Achievement::PlatformMaster => profile.platforms.len() >= 5,
            Achievement::QualityEnthusiast => profile.high_quality_downloads() >= 10,
            Achievement::AudioLover => profile.audio_downloads >= 20,
            Achievement::DailyUser => profile.daily_downloads >= 5,
        }
    }
}

/// 1080p and 4K count as high quality
pub fn is_high_quality(quality: &str) -> bool {
    quality.contains("1080") || quality.contains("2160") || quality.to_uppercase().contains("4K")
}

/// Points earned by one download
pub fn points_for(kind: DownloadKind, quality: &str) -> u64 {
    let mut points = BASE_POINTS;
    if is_high_quality(quality) {
        points += 5;
    } else if quality.contains("720") {
        points += 3;
    }
    if kind == DownloadKind::Audio {
        points += 2;
    }
    points
}

/// Level reached with `points`
pub fn level_for(points: u64) -> u32 {
    let level = points / 100 + 1;
    level.clamp(1, MAX_LEVEL as u64) as u32
}

/// One line of a user's download history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: DownloadKind,
    pub quality: String,
    pub date: NaiveDateTime,
    pub points: u64,
}

/// Gamification state of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub total_downloads: u64,
    pub video_downloads: u64,
    pub audio_downloads: u64,
    pub platforms: BTreeMap<String, u64>,
    pub quality_preferences: BTreeMap<String, u64>,
    pub first_use: NaiveDateTime,
    pub last_use: NaiveDateTime,
    pub achievements: Vec<Achievement>,
    pub points: u64,
    pub level: u32,
    /// Newest first
    pub download_history: Vec<HistoryEntry>,
    pub daily_downloads: u64,
    pub daily_reset: NaiveDate,
}

/// Result of applying one download to a profile
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub points_earned: u64,
    pub new_achievements: Vec<Achievement>,
    pub level: u32,
    pub previous_level: u32,
}

impl ProfileUpdate {
    pub fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }
}

impl UserProfile {
    /// Fresh profile first seen at `now`
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            total_downloads: 0,
            video_downloads: 0,
            audio_downloads: 0,
            platforms: BTreeMap::new(),
            quality_preferences: BTreeMap::new(),
            first_use: now,
            last_use: now,
            achievements: Vec::new(),
            points: 0,
            level: 1,
            download_history: Vec::new(),
            daily_downloads: 0,
            daily_reset: now.date(),
        }
    }

    /// Downloads in 1080p or 4K
    pub fn high_quality_downloads(&self) -> u64 {
        self.quality_preferences
            .iter()
            .filter(|(quality, _)| is_high_quality(quality))
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn has(&self, achievement: Achievement) -> bool {
        self.achievements.contains(&achievement)
    }

    /// Apply one completed download at `now`
    pub fn apply_download(
        &mut self,
        platform: &str,
        kind: DownloadKind,
        quality: &str,
        now: NaiveDateTime,
    ) -> ProfileUpdate {
        let previous_level = self.level;

        if self.daily_reset != now.date() {
            self.daily_downloads = 0;
            self.daily_reset = now.date();
        }

        self.total_downloads += 1;
        self.daily_downloads += 1;
        self.last_use = now;
        match kind {
            DownloadKind::Video => self.video_downloads += 1,
            DownloadKind::Audio => self.audio_downloads += 1,
            DownloadKind::Playlist => {}
        }
        *self.platforms.entry(platform.to_string()).or_insert(0) += 1;
        *self
            .quality_preferences
            .entry(quality.to_string())
            .or_insert(0) += 1;

        let points_earned = points_for(kind, quality);
        self.points += points_earned;

        let new_achievements: Vec<Achievement> = Achievement::ALL
            .iter()
            .copied()
            .filter(|a| !self.has(*a) && a.is_met(self))
            .collect();
        for achievement in &new_achievements {
            self.achievements.push(*achievement);
            self.points += ACHIEVEMENT_BONUS;
        }
        self.level = level_for(self.points);

        self.download_history.insert(
            0,
            HistoryEntry {
                platform: platform.to_string(),
                kind,
                quality: quality.to_string(),
                date: now,
                points: points_earned,
            },
        );
        self.download_history.truncate(HISTORY_LIMIT);

        ProfileUpdate {
            points_earned,
            new_achievements,
            level: self.level,
            previous_level,
        }
    }
}
