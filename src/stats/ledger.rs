//! Usage ledger: global counters, per-user profiles, leaderboard

use crate::core::media::{DownloadKind, Platform};
use crate::error::ReelError;
use crate::stats::profile::{Achievement, UserProfile};
use crate::stats::store::DocumentStore;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Clock reading the system's local time
pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

fn day_key(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Per-user row of the global document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub downloads: u64,
    pub first_use: NaiveDateTime,
    pub last_use: NaiveDateTime,
    #[serde(default)]
    pub total_bytes: u64,
}

/// Global usage document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_downloads: u64,
    pub total_users: u64,
    /// Fixed breakdown over the six known platforms
    pub downloads_by_platform: BTreeMap<String, u64>,
    pub downloads_by_type: BTreeMap<String, u64>,
    /// Downloads per calendar day, keyed `YYYY-MM-DD`
    pub daily_stats: BTreeMap<String, u64>,
    pub users: BTreeMap<String, UserRow>,
    pub playlists_downloaded: u64,
    pub total_files_size: u64,
    pub peak_daily_downloads: u64,
    pub created_date: NaiveDateTime,
}

impl GlobalStats {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            total_downloads: 0,
            total_users: 0,
            downloads_by_platform: Platform::KNOWN
                .iter()
                .map(|p| (p.as_str().to_string(), 0))
                .collect(),
            downloads_by_type: [DownloadKind::Video, DownloadKind::Audio, DownloadKind::Playlist]
                .iter()
                .map(|k| (k.as_str().to_string(), 0))
                .collect(),
            daily_stats: BTreeMap::new(),
            users: BTreeMap::new(),
            playlists_downloaded: 0,
            total_files_size: 0,
            peak_daily_downloads: 0,
            created_date: now,
        }
    }

    /// Count one download event
    fn track(&mut self, user_id: &str, platform: Platform, kind: DownloadKind, size: u64, now: NaiveDateTime) {
        self.total_downloads += 1;

        if let Some(count) = self.downloads_by_platform.get_mut(platform.as_str()) {
            *count += 1;
        }
        if let Some(count) = self.downloads_by_type.get_mut(kind.as_str()) {
            *count += 1;
        }

        let today = self.daily_stats.entry(day_key(now)).or_insert(0);
        *today += 1;
        if *today > self.peak_daily_downloads {
            self.peak_daily_downloads = *today;
        }

        if !self.users.contains_key(user_id) {
            self.total_users += 1;
        }
        let row = self.users.entry(user_id.to_string()).or_insert(UserRow {
            downloads: 0,
            first_use: now,
            last_use: now,
            total_bytes: 0,
        });
        row.downloads += 1;
        row.last_use = now;
        row.total_bytes += size;

        self.total_files_size += size;
    }
}

/// Gamification document: user id to profile
pub type ProfileBook = BTreeMap<String, UserProfile>;

/// One completed download
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub user_id: String,
    pub platform: Platform,
    pub kind: DownloadKind,
    /// Quality label of the delivered option
    pub quality: String,
    pub size_bytes: u64,
}

/// What recording a download changed for the user
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub points_earned: u64,
    pub new_achievements: Vec<Achievement>,
    pub level: u32,
    pub leveled_up: bool,
    pub total_points: u64,
}

/// Aggregate view returned by [`UsageLedger::get_global_stats`]
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSummary {
    pub total_downloads: u64,
    pub total_users: u64,
    pub last_week_downloads: u64,
    pub most_popular_platform: Option<(Platform, u64)>,
    pub total_bytes: u64,
    pub peak_daily_downloads: u64,
    pub playlists_downloaded: u64,
    pub platform_breakdown: BTreeMap<String, u64>,
    pub type_breakdown: BTreeMap<String, u64>,
}

/// Position of a user among all known users
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserRank {
    pub rank: usize,
    pub total_users: usize,
    pub percentile: f64,
}

/// Per-user view returned by [`UsageLedger::get_user_stats`]
#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub profile: UserProfile,
    pub rank: UserRank,
    pub total_bytes: u64,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub downloads: u64,
    pub level: u32,
    pub points: u64,
}

struct LedgerState {
    global: GlobalStats,
    profiles: ProfileBook,
}

/// Single-writer owner of all usage state.
///
/// Every mutating call holds the state lock through the read-modify-persist
/// cycle, so concurrent completions never lose an update.
pub struct UsageLedger {
    state: Mutex<LedgerState>,
    global_store: Arc<dyn DocumentStore<GlobalStats>>,
    profile_store: Arc<dyn DocumentStore<ProfileBook>>,
    clock: Clock,
}

impl UsageLedger {
    /// Open the ledger, loading both documents
    pub async fn open(
        global_store: Arc<dyn DocumentStore<GlobalStats>>,
        profile_store: Arc<dyn DocumentStore<ProfileBook>>,
    ) -> Self {
        Self::open_with_clock(global_store, profile_store, system_clock()).await
    }

    /// Open the ledger with an explicit clock
    pub async fn open_with_clock(
        global_store: Arc<dyn DocumentStore<GlobalStats>>,
        profile_store: Arc<dyn DocumentStore<ProfileBook>>,
        clock: Clock,
    ) -> Self {
        let now = clock();
        let global = match global_store.load().await {
            Ok(Some(global)) => global,
            Ok(None) => GlobalStats::new(now),
            Err(e) => {
                warn!("Global stats unreadable, starting fresh: {}", e);
                GlobalStats::new(now)
            }
        };
        let profiles = match profile_store.load().await {
            Ok(Some(profiles)) => profiles,
            Ok(None) => ProfileBook::new(),
            Err(e) => {
                warn!("User profiles unreadable, starting fresh: {}", e);
                ProfileBook::new()
            }
        };
        info!(
            "Ledger loaded: {} downloads, {} users",
            global.total_downloads,
            profiles.len()
        );

        Self {
            state: Mutex::new(LedgerState { global, profiles }),
            global_store,
            profile_store,
            clock,
        }
    }

    async fn persist(&self, state: &LedgerState) -> Result<(), ReelError> {
        self.global_store.save(&state.global).await?;
        self.profile_store.save(&state.profiles).await?;
        Ok(())
    }

    /// Record one completed download
    pub async fn record(&self, record: UsageRecord) -> Result<RecordOutcome, ReelError> {
        let now = (self.clock)();
        let mut state = self.state.lock().await;

        state
            .global
            .track(&record.user_id, record.platform, record.kind, record.size_bytes, now);

        let profile = state
            .profiles
            .entry(record.user_id.clone())
            .or_insert_with(|| UserProfile::new(now));
        let update = profile.apply_download(record.platform.as_str(), record.kind, &record.quality, now);
        let outcome = RecordOutcome {
            points_earned: update.points_earned,
            leveled_up: update.leveled_up(),
            new_achievements: update.new_achievements,
            level: update.level,
            total_points: profile.points,
        };

        debug!(
            user_id = %record.user_id,
            platform = %record.platform,
            kind = record.kind.as_str(),
            size = record.size_bytes,
            "Recorded download"
        );
        self.persist(&state).await?;
        Ok(outcome)
    }

    /// Record a completed collection download of `item_count` items
    pub async fn record_playlist(
        &self,
        user_id: &str,
        platform: Platform,
        item_count: usize,
    ) -> Result<(), ReelError> {
        let now = (self.clock)();
        let mut state = self.state.lock().await;
        state.global.playlists_downloaded += 1;
        state
            .global
            .track(user_id, platform, DownloadKind::Playlist, 0, now);
        debug!(user_id, item_count, "Recorded playlist download");
        self.persist(&state).await
    }

    /// Profile and rank of one user, if they have downloaded anything
    pub async fn get_user_stats(&self, user_id: &str) -> Option<UserSummary> {
        let state = self.state.lock().await;
        let profile = state.profiles.get(user_id)?.clone();
        let rank = rank_of(&state.profiles, profile.total_downloads);
        let total_bytes = state
            .global
            .users
            .get(user_id)
            .map_or(0, |row| row.total_bytes);
        Some(UserSummary {
            profile,
            rank,
            total_bytes,
        })
    }

    /// Rank of one user by total downloads
    pub async fn user_rank(&self, user_id: &str) -> Option<UserRank> {
        let state = self.state.lock().await;
        let total = state.profiles.get(user_id)?.total_downloads;
        Some(rank_of(&state.profiles, total))
    }

    /// Aggregate statistics; reads only
    pub async fn get_global_stats(&self) -> GlobalSummary {
        let now = (self.clock)();
        let state = self.state.lock().await;
        let global = &state.global;

        let last_week_downloads = (0..7)
            .map(|days| day_key(now - ChronoDuration::days(days)))
            .filter_map(|key| global.daily_stats.get(&key))
            .sum();

        let mut most_popular: Option<(Platform, u64)> = None;
        for platform in Platform::KNOWN {
            let count = global
                .downloads_by_platform
                .get(platform.as_str())
                .copied()
                .unwrap_or(0);
            if most_popular.map_or(true, |(_, best)| count > best) {
                most_popular = Some((platform, count));
            }
        }

        GlobalSummary {
            total_downloads: global.total_downloads,
            total_users: global.total_users,
            last_week_downloads,
            most_popular_platform: most_popular,
            total_bytes: global.total_files_size,
            peak_daily_downloads: global.peak_daily_downloads,
            playlists_downloaded: global.playlists_downloaded,
            platform_breakdown: global.downloads_by_platform.clone(),
            type_breakdown: global.downloads_by_type.clone(),
        }
    }

    /// Users with the most downloads, ties by user id
    pub async fn top_users(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<LeaderboardEntry> = state
            .profiles
            .iter()
            .map(|(user_id, profile)| LeaderboardEntry {
                user_id: user_id.clone(),
                downloads: profile.total_downloads,
                level: profile.level,
                points: profile.points,
            })
            .collect();
        entries.sort_by(|a, b| b.downloads.cmp(&a.downloads));
        entries.truncate(limit);
        entries
    }

    /// Drop daily buckets older than `days_to_keep` days; returns how many were removed
    pub async fn cleanup_old_daily_stats(&self, days_to_keep: i64) -> Result<usize, ReelError> {
        let cutoff = day_key((self.clock)() - ChronoDuration::days(days_to_keep));
        let mut state = self.state.lock().await;
        let before = state.global.daily_stats.len();
        state.global.daily_stats.retain(|day, _| *day >= cutoff);
        let removed = before - state.global.daily_stats.len();
        if removed > 0 {
            info!("Removed {} daily buckets older than {}", removed, cutoff);
        }
        self.persist(&state).await?;
        Ok(removed)
    }
}

/// Competition rank: position of the first user sharing `total`, plus one.
/// Depends only on the totals, so equal totals always share a rank.
fn rank_of(profiles: &ProfileBook, total: u64) -> UserRank {
    let mut totals: Vec<u64> = profiles.values().map(|p| p.total_downloads).collect();
    totals.sort_unstable_by(|a, b| b.cmp(a));

    let total_users = totals.len();
    let rank = totals
        .iter()
        .position(|t| *t == total)
        .map_or(total_users + 1, |i| i + 1);
    let percentile = if total_users == 0 {
        0.0
    } else {
        let raw = (total_users + 1).saturating_sub(rank) as f64 / total_users as f64 * 100.0;
        (raw * 10.0).round() / 10.0
    };

    UserRank {
        rank,
        total_users,
        percentile,
    }
}
