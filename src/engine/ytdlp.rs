//! Engine backed by the external `yt-dlp` executable

use super::{CookieMaterial, Engine, EngineOptions};
use crate::error::ReelError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Lines of stderr kept in an engine failure
const STDERR_TAIL_LINES: usize = 5;

/// What an invocation should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Metadata,
    Download,
}

/// `yt-dlp` driven as a subprocess on a bounded blocking pool
pub struct YtDlpEngine {
    binary: PathBuf,
    workers: Arc<Semaphore>,
}

impl YtDlpEngine {
    /// Create an engine allowing `workers` concurrent invocations
    pub fn new(binary: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            binary: binary.into(),
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Run the executable and return its stdout.
    ///
    /// The pool permit moves into the blocking task, so a caller that stops
    /// waiting does not free the slot before the process exits.
    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, ReelError> {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ReelError::EngineUnavailable(e.to_string()))?;
        let binary = self.binary.clone();
        debug!("Running {:?} {:?}", binary, loggable_args(&args));

        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            Command::new(&binary)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ReelError::EngineUnavailable(format!("{:?} not found", binary))
                    } else {
                        ReelError::IoError(e)
                    }
                })
        })
        .await
        .map_err(|e| ReelError::EngineFailure(format!("engine task panicked: {}", e)))??;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr_tail(&stderr);
            warn!("Engine exited with {}: {}", output.status, tail);
            Err(ReelError::EngineFailure(tail))
        }
    }
}

#[async_trait]
impl Engine for YtDlpEngine {
    async fn extract_metadata(
        &self,
        url: &str,
        options: &EngineOptions,
    ) -> Result<Option<serde_json::Value>, ReelError> {
        let stdout = self
            .run(build_args(Invocation::Metadata, url, options))
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<serde_json::Value>(text)? {
            serde_json::Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    async fn download(&self, url: &str, options: &EngineOptions) -> Result<(), ReelError> {
        self.run(build_args(Invocation::Download, url, options))
            .await
            .map(|_| ())
    }
}

/// Build the command line for one invocation
pub fn build_args(invocation: Invocation, url: &str, options: &EngineOptions) -> Vec<String> {
    let mut args: Vec<String> = vec!["--no-warnings".into(), "--newline".into()];

    args.push("--socket-timeout".into());
    args.push(options.socket_timeout.as_secs().max(1).to_string());
    args.push("--retries".into());
    args.push(options.retries.to_string());

    args.push(if options.single_item {
        "--no-playlist".into()
    } else {
        "--yes-playlist".into()
    });
    if options.flat_extraction {
        args.push("--flat-playlist".into());
    }
    if options.ignore_errors {
        args.push("--ignore-errors".into());
    }

    match &options.cookies {
        Some(CookieMaterial::File(path)) => {
            args.push("--cookies".into());
            args.push(path.to_string_lossy().into_owned());
        }
        Some(CookieMaterial::Header(value)) => {
            args.push("--add-header".into());
            args.push(format!("Cookie:{}", value));
        }
        None => {}
    }

    match invocation {
        Invocation::Metadata => {
            args.push("--dump-single-json".into());
            args.push("--skip-download".into());
        }
        Invocation::Download => {
            let tuning = &options.tuning;
            args.push("--concurrent-fragments".into());
            args.push(tuning.concurrent_fragments.max(1).to_string());
            if let Some(buffer) = tuning.buffer_size {
                args.push("--buffer-size".into());
                args.push(buffer.to_string());
            }
            if let Some(chunk) = tuning.http_chunk_size {
                args.push("--http-chunk-size".into());
                args.push(chunk.to_string());
            }
            if let Some(format) = &options.format {
                args.push("-f".into());
                args.push(format.clone());
            }
            if let Some(template) = &options.output_template {
                args.push("-o".into());
                args.push(template.to_string_lossy().into_owned());
            }
            if let Some(audio) = &options.audio {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push(audio.codec.clone());
                args.push("--audio-quality".into());
                args.push(format!("{}K", audio.bitrate_kbps));
                args.push("--postprocessor-args".into());
                args.push(format!("ExtractAudio:-ar {}", audio.sample_rate));
            }
        }
    }

    args.push("--".into());
    args.push(url.to_string());
    args
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join(" | ");
    if tail.is_empty() {
        "engine exited without output".to_string()
    } else {
        tail
    }
}

/// Arguments with any Cookie header value masked for logging
pub fn loggable_args(args: &[String]) -> Vec<String> {
    let mut masked = Vec::with_capacity(args.len());
    let mut after_header_flag = false;
    for arg in args {
        if after_header_flag && arg.to_ascii_lowercase().starts_with("cookie:") {
            masked.push("Cookie:<redacted>".to_string());
        } else {
            masked.push(arg.clone());
        }
        after_header_flag = arg == "--add-header";
    }
    masked
}
