//! Command line argument parsing

use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// reelbot - chat front-end for downloading media links
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the yt-dlp executable
    #[arg(long, env = "REELBOT_ENGINE", value_name = "PATH", default_value = "yt-dlp")]
    pub engine: PathBuf,

    /// Engine calls allowed to run at the same time
    #[arg(long, env = "REELBOT_WORKERS", default_value = "4")]
    pub workers: usize,

    /// Engine socket timeout (e.g., 30s, 1m)
    #[arg(long, env = "REELBOT_SOCKET_TIMEOUT", value_name = "DURATION", default_value = "30s")]
    pub socket_timeout: humantime::Duration,

    /// Engine retries for network operations
    #[arg(long, env = "REELBOT_RETRIES", default_value = "3")]
    pub retries: u32,

    /// Fragments fetched in parallel for segmented streams
    #[arg(long, env = "REELBOT_CONCURRENT_FRAGMENTS", default_value = "4")]
    pub concurrent_fragments: u32,

    /// Engine download buffer size (e.g., 16KiB)
    #[arg(long, env = "REELBOT_BUFFER_SIZE", value_name = "SIZE")]
    pub buffer_size: Option<String>,

    /// Engine HTTP chunk size (e.g., 10MiB)
    #[arg(long, env = "REELBOT_HTTP_CHUNK_SIZE", value_name = "SIZE", default_value = "10MiB")]
    pub http_chunk_size: String,

    /// Largest file that will be delivered (e.g., 500MiB)
    #[arg(long, env = "REELBOT_MAX_FILE_SIZE", value_name = "SIZE", default_value = "500MiB")]
    pub max_file_size: String,

    /// Netscape cookie jar used for authenticated engine calls
    #[arg(long, env = "REELBOT_COOKIES_FILE", value_name = "PATH")]
    pub cookies_file: Option<PathBuf>,

    /// Base64-encoded cookie jar content
    #[arg(long, env = "REELBOT_COOKIES_B64", value_name = "BASE64", hide_env_values = true)]
    pub cookies_b64: Option<String>,

    /// Raw Cookie header value
    #[arg(long, env = "REELBOT_COOKIE_HEADER", value_name = "HEADER", hide_env_values = true)]
    pub cookie_header: Option<String>,

    /// Attach credentials to engine calls
    #[arg(long, env = "REELBOT_USE_COOKIES")]
    pub use_cookies: bool,

    /// Attach credentials to every call instead of only retrying failures with them
    #[arg(long, env = "REELBOT_COOKIES_ALWAYS")]
    pub cookies_always: bool,

    /// Platforms links may come from (comma separated)
    #[arg(
        long,
        env = "REELBOT_PLATFORMS",
        value_delimiter = ',',
        default_value = "youtube,tiktok,instagram,facebook,twitter,snapchat"
    )]
    pub platforms: Vec<String>,

    /// Base directory for the private download work dir (default: system temp dir)
    #[arg(long, env = "REELBOT_TEMP_DIR", value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// How often stale temp files are swept
    #[arg(long, env = "REELBOT_SWEEP_INTERVAL", value_name = "DURATION", default_value = "1h")]
    pub sweep_interval: humantime::Duration,

    /// Age after which a temp file counts as stale
    #[arg(long, env = "REELBOT_SWEEP_AGE", value_name = "DURATION", default_value = "1h")]
    pub sweep_age: humantime::Duration,

    /// Global usage statistics document
    #[arg(long, env = "REELBOT_STATS_FILE", value_name = "PATH", default_value = "bot_stats.json")]
    pub stats_file: PathBuf,

    /// Per-user gamification document
    #[arg(long, env = "REELBOT_PROFILES_FILE", value_name = "PATH", default_value = "user_stats.json")]
    pub profiles_file: PathBuf,

    /// Idle time after which an unanswered selection expires
    #[arg(long, env = "REELBOT_SESSION_TTL", value_name = "DURATION", default_value = "30m")]
    pub session_ttl: humantime::Duration,

    /// Downloads one user may start per hour (0 means unlimited)
    #[arg(long, env = "REELBOT_DOWNLOADS_PER_HOUR", default_value = "10")]
    pub downloads_per_hour: u32,

    /// Where the console transport saves delivered files
    #[arg(short, long, env = "REELBOT_OUTPUT_DIR", value_name = "DIR", default_value = "downloads")]
    pub output: PathBuf,

    /// Interval between progress updates
    #[arg(long, value_name = "DURATION", default_value = "3s")]
    pub progress_interval: humantime::Duration,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get socket timeout as Duration
    pub fn socket_timeout_duration(&self) -> Duration {
        self.socket_timeout.into()
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Placeholder printed instead of a secret value
const REDACTED: &str = "<redacted>";

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| REDACTED)
}

// Written by hand so cookie material never reaches the startup log.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("engine", &self.engine)
            .field("workers", &self.workers)
            .field("socket_timeout", &self.socket_timeout)
            .field("retries", &self.retries)
            .field("concurrent_fragments", &self.concurrent_fragments)
            .field("buffer_size", &self.buffer_size)
            .field("http_chunk_size", &self.http_chunk_size)
            .field("max_file_size", &self.max_file_size)
            .field("cookies_file", &self.cookies_file)
            .field("cookies_b64", &redact(&self.cookies_b64))
            .field("cookie_header", &redact(&self.cookie_header))
            .field("use_cookies", &self.use_cookies)
            .field("cookies_always", &self.cookies_always)
            .field("platforms", &self.platforms)
            .field("temp_dir", &self.temp_dir)
            .field("sweep_interval", &self.sweep_interval)
            .field("sweep_age", &self.sweep_age)
            .field("stats_file", &self.stats_file)
            .field("profiles_file", &self.profiles_file)
            .field("session_ttl", &self.session_ttl)
            .field("downloads_per_hour", &self.downloads_per_hour)
            .field("output", &self.output)
            .field("progress_interval", &self.progress_interval)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .finish()
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

/// Parse a size string such as `500MiB` or `1.5GB` to bytes
pub fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim().to_uppercase();
    if size.is_empty() {
        return None;
    }

    let mut number_end = 0;
    for (i, c) in size.char_indices() {
        if c.is_ascii_digit() || c == '.' {
            number_end = i + 1;
        } else {
            break;
        }
    }

    if number_end == 0 {
        return None;
    }

    let number: f64 = size[..number_end].parse().ok()?;
    if number <= 0.0 {
        return None;
    }

    let multiplier = match size[number_end..].trim() {
        "B" | "" => 1,
        "KB" => 1000,
        "KIB" => 1024,
        "MB" => 1000 * 1000,
        "MIB" => 1024 * 1024,
        "GB" => 1000 * 1000 * 1000,
        "GIB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    Some((number * multiplier as f64) as u64)
}

impl Default for Args {
    fn default() -> Self {
        Self {
            engine: PathBuf::from("yt-dlp"),
            workers: 4,
            socket_timeout: humantime::Duration::from(Duration::from_secs(30)),
            retries: 3,
            concurrent_fragments: 4,
            buffer_size: None,
            http_chunk_size: "10MiB".to_string(),
            max_file_size: "500MiB".to_string(),
            cookies_file: None,
            cookies_b64: None,
            cookie_header: None,
            use_cookies: false,
            cookies_always: false,
            platforms: ["youtube", "tiktok", "instagram", "facebook", "twitter", "snapchat"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            temp_dir: None,
            sweep_interval: humantime::Duration::from(Duration::from_secs(3600)),
            sweep_age: humantime::Duration::from(Duration::from_secs(3600)),
            stats_file: PathBuf::from("bot_stats.json"),
            profiles_file: PathBuf::from("user_stats.json"),
            session_ttl: humantime::Duration::from(Duration::from_secs(1800)),
            downloads_per_hour: 10,
            output: PathBuf::from("downloads"),
            progress_interval: humantime::Duration::from(Duration::from_secs(3)),
            verbose: false,
            quiet: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1B"), Some(1));
        assert_eq!(parse_size("1KB"), Some(1000));
        assert_eq!(parse_size("1KiB"), Some(1024));
        assert_eq!(parse_size("1MB"), Some(1000 * 1000));
        assert_eq!(parse_size("500MiB"), Some(500 * 1024 * 1024));
        assert_eq!(parse_size("2GB"), Some(2 * 1000 * 1000 * 1000));
        assert_eq!(parse_size("1GiB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("1.5MB"), Some(1500 * 1000));
        assert_eq!(parse_size(" 10 mib "), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("1024"), Some(1024));
    }

    #[test]
    fn test_parse_size_invalid() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("0"), None);
        assert_eq!(parse_size("-1MB"), None);
        assert_eq!(parse_size("big"), None);
        assert_eq!(parse_size("1TB"), None);
        assert_eq!(parse_size("1XB"), None);
    }

    #[test]
    fn test_args_verbosity_level() {
        let args = Args::default();
        assert_eq!(args.verbosity_level(), VerbosityLevel::Normal);

        let args = Args {
            quiet: true,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(args.verbosity_level(), VerbosityLevel::Quiet);

        let args = Args {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(args.verbosity_level(), VerbosityLevel::Verbose);
    }

    #[test]
    fn test_args_parse_from_command_line() {
        let args = Args::try_parse_from([
            "reelbot",
            "--workers",
            "2",
            "--max-file-size",
            "50MB",
            "--platforms",
            "youtube,tiktok",
            "--socket-timeout",
            "1m",
            "--use-cookies",
        ])
        .unwrap();

        assert_eq!(args.workers, 2);
        assert_eq!(args.max_file_size, "50MB");
        assert_eq!(args.platforms, vec!["youtube", "tiktok"]);
        assert_eq!(args.socket_timeout_duration(), Duration::from_secs(60));
        assert!(args.use_cookies);
        assert!(!args.cookies_always);
    }

    #[test]
    fn test_debug_output_hides_cookie_values() {
        let args = Args::try_parse_from([
            "reelbot",
            "--cookie-header",
            "SID=supersecret",
            "--cookies-b64",
            "c2VjcmV0amFy",
        ])
        .unwrap();

        let printed = format!("{:?}", args);
        assert!(!printed.contains("supersecret"));
        assert!(!printed.contains("c2VjcmV0amFy"));
        assert!(printed.contains("cookie_header: Some(\"<redacted>\")"));
        assert!(printed.contains("workers: 4"));

        let printed = format!("{:?}", Args::default());
        assert!(printed.contains("cookie_header: None"));
    }
}
