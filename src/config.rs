//! Validated runtime configuration

use crate::cli::args::{parse_size, Args};
use crate::core::media::Platform;
use crate::download::credentials::CredentialPolicyConfig;
use crate::engine::{EngineOptions, EngineTuning};
use crate::error::ReelError;
use std::path::PathBuf;
use std::time::Duration;

/// Where credential material may come from, in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSources {
    pub cookies_file: Option<PathBuf>,
    pub cookies_b64: Option<String>,
    pub cookie_header: Option<String>,
}

/// Typed configuration consumed once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub engine_binary: PathBuf,
    pub workers: usize,
    pub socket_timeout: Duration,
    pub retries: u32,
    pub tuning: EngineTuning,
    pub max_file_size: u64,
    pub credentials: CredentialSources,
    pub credential_policy: CredentialPolicyConfig,
    pub allowed_platforms: Vec<Platform>,
    pub temp_dir: PathBuf,
    pub sweep_interval: Duration,
    pub sweep_age: Duration,
    pub stats_file: PathBuf,
    pub profiles_file: PathBuf,
    pub session_ttl: Duration,
    /// 0 disables the quota
    pub downloads_per_hour: u32,
    pub output_dir: PathBuf,
    pub progress_interval: Duration,
}

impl BotConfig {
    /// Validate parsed arguments
    pub fn from_args(args: &Args) -> Result<Self, ReelError> {
        if args.workers == 0 {
            return Err(ReelError::Config("--workers must be at least 1".to_string()));
        }
        if args.concurrent_fragments == 0 {
            return Err(ReelError::Config(
                "--concurrent-fragments must be at least 1".to_string(),
            ));
        }

        let size = |flag: &str, value: &str| {
            parse_size(value)
                .ok_or_else(|| ReelError::Config(format!("invalid size for {}: {:?}", flag, value)))
        };

        let tuning = EngineTuning {
            concurrent_fragments: args.concurrent_fragments,
            buffer_size: args
                .buffer_size
                .as_deref()
                .map(|v| size("--buffer-size", v))
                .transpose()?,
            http_chunk_size: Some(size("--http-chunk-size", &args.http_chunk_size)?),
        };

        let mut allowed_platforms = Vec::new();
        for name in args.platforms.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let platform: Platform = name.parse()?;
            if !allowed_platforms.contains(&platform) {
                allowed_platforms.push(platform);
            }
        }
        if allowed_platforms.is_empty() {
            return Err(ReelError::Config("--platforms must name at least one platform".to_string()));
        }

        Ok(Self {
            engine_binary: args.engine.clone(),
            workers: args.workers,
            socket_timeout: args.socket_timeout_duration(),
            retries: args.retries,
            tuning,
            max_file_size: size("--max-file-size", &args.max_file_size)?,
            credentials: CredentialSources {
                cookies_file: args.cookies_file.clone(),
                cookies_b64: args.cookies_b64.clone().filter(|v| !v.trim().is_empty()),
                cookie_header: args.cookie_header.clone().filter(|v| !v.trim().is_empty()),
            },
            credential_policy: CredentialPolicyConfig {
                enabled: args.use_cookies,
                apply_on_failure_only: !args.cookies_always,
            },
            allowed_platforms,
            temp_dir: args
                .temp_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("reelbot")),
            sweep_interval: args.sweep_interval.into(),
            sweep_age: args.sweep_age.into(),
            stats_file: args.stats_file.clone(),
            profiles_file: args.profiles_file.clone(),
            session_ttl: args.session_ttl.into(),
            downloads_per_hour: args.downloads_per_hour,
            output_dir: args.output.clone(),
            progress_interval: args.progress_interval.into(),
        })
    }

    /// Engine options every call starts from
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            socket_timeout: self.socket_timeout,
            retries: self.retries,
            tuning: self.tuning.clone(),
            ..Default::default()
        }
    }
}
