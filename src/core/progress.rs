//! Progress reporting for the download pipeline

use std::time::{Duration, Instant};

/// Pipeline stage shown to the user while a request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Classifying the link and fetching metadata
    Analyzing,
    /// Engine is fetching the media
    Downloading,
    /// Engine is fetching and transcoding audio
    ExtractingAudio,
    /// Artifact is being handed to the transport
    Uploading,
}

impl Stage {
    /// Status line for this stage
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Analyzing => "🔍 Analyzing the link...",
            Stage::Downloading => "📥 Downloading video...",
            Stage::ExtractingAudio => "🎵 Extracting audio...",
            Stage::Uploading => "📤 Uploading...",
        }
    }
}

/// Progress information for one running stage
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current stage
    pub stage: Stage,
    /// Time when the stage started
    pub start_time: Instant,
}

impl Progress {
    /// Start tracking a stage
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            start_time: Instant::now(),
        }
    }

    /// Move to the next stage, keeping the original start time
    pub fn advance(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Time spent since the first stage started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Status line with elapsed time
    pub fn status_line(&self) -> String {
        format!("{} ({})", self.stage.label(), format_duration(self.elapsed()))
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}

/// Format a media length in seconds as `m:ss`
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
