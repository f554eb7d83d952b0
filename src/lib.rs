//! # reelbot - media link downloader bot
//!
//! Turns links from YouTube, TikTok, Instagram, Facebook and Twitter/X into
//! delivered video or MP3 files through a chat conversation.
//!
//! ## Features
//!
//! - Link classification by platform, with playlist and channel detection
//! - Ranked format catalogs with normalized MP3 tiers
//! - Credential fallback for engine calls that need cookies
//! - Paged playlist browsing and whole-playlist downloads
//! - Usage statistics with points, levels and achievements
//! - Per-user hourly download quota
//!
//! ## Example
//!
//! ```rust,no_run
//! use reelbot::download::{CredentialPolicy, DownloadOrchestrator};
//! use reelbot::engine::YtDlpEngine;
//! use reelbot::stats::{MemoryStore, UsageLedger};
//! use reelbot::Pipeline;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(YtDlpEngine::new("yt-dlp", 2));
//!     let policy = Arc::new(CredentialPolicy::disabled());
//!     let orchestrator = DownloadOrchestrator::new(engine.clone(), policy.clone(), "/tmp/reelbot");
//!     let ledger = Arc::new(
//!         UsageLedger::open(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new())).await,
//!     );
//!     let pipeline = Pipeline::new(engine, policy, orchestrator, ledger);
//!
//!     let submission = pipeline.submit(1, 1, "https://youtu.be/dQw4w9WgXcQ").await?;
//!     println!("Session {}", submission.session_id());
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod core;
pub mod download;
pub mod engine;
pub mod error;
pub mod stats;
pub mod utils;

// Re-export main types
pub use chat::{Bot, ChatTransport, ConsoleTransport, Incoming};
pub use config::BotConfig;
pub use core::{FormatCatalog, MediaRequest, Pipeline, Platform, Submission};
pub use error::ReelError;
pub use stats::UsageLedger;

/// Result type alias for reelbot operations
pub type Result<T> = std::result::Result<T, ReelError>;
