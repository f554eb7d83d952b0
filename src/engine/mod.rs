//! Extraction/download engine boundary
//!
//! The engine is an external capability: given a URL and an option set it
//! returns loosely-typed metadata or writes a file. Everything past this
//! module works with the typed structures from [`metadata`].

pub mod metadata;
pub mod ytdlp;

pub use metadata::*;
pub use ytdlp::*;

use crate::error::ReelError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Authentication material attached to an engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieMaterial {
    /// Netscape cookie jar on disk
    File(PathBuf),
    /// Raw `Cookie` header value
    Header(String),
}

/// Engine concurrency tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTuning {
    /// Fragments fetched in parallel for segmented streams
    pub concurrent_fragments: u32,
    /// Download buffer size in bytes
    pub buffer_size: Option<u64>,
    /// HTTP chunk size in bytes
    pub http_chunk_size: Option<u64>,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            concurrent_fragments: 4,
            buffer_size: None,
            http_chunk_size: Some(10 * 1024 * 1024),
        }
    }
}

/// Post-download transcode to a normalized audio file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    pub codec: String,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
}

impl AudioTranscode {
    /// mp3 at the given bitrate, 44.1 kHz
    pub fn mp3(bitrate_kbps: u32) -> Self {
        Self {
            codec: "mp3".to_string(),
            bitrate_kbps,
            sample_rate: 44_100,
        }
    }
}

/// Options for one engine invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Format selector string or format id
    pub format: Option<String>,
    /// Output path template (`%(ext)s` is filled in by the engine)
    pub output_template: Option<PathBuf>,
    /// List collection members without resolving each one
    pub flat_extraction: bool,
    /// Skip broken entries instead of failing the whole call
    pub ignore_errors: bool,
    /// Treat watch+list URLs as the single item
    pub single_item: bool,
    /// Per-operation network timeout
    pub socket_timeout: Duration,
    /// Engine-internal retry count for network operations
    pub retries: u32,
    pub tuning: EngineTuning,
    pub audio: Option<AudioTranscode>,
    pub cookies: Option<CookieMaterial>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            format: None,
            output_template: None,
            flat_extraction: false,
            ignore_errors: false,
            single_item: true,
            socket_timeout: Duration::from_secs(30),
            retries: 3,
            tuning: EngineTuning::default(),
            audio: None,
            cookies: None,
        }
    }
}

impl EngineOptions {
    /// Same options with the given cookie material attached (or removed)
    pub fn with_cookies(&self, cookies: Option<CookieMaterial>) -> Self {
        Self {
            cookies,
            ..self.clone()
        }
    }
}

/// Metadata extraction and download capability
#[async_trait]
pub trait Engine: Send + Sync {
    /// Fetch metadata without downloading; `None` when the engine returned nothing
    async fn extract_metadata(
        &self,
        url: &str,
        options: &EngineOptions,
    ) -> Result<Option<serde_json::Value>, ReelError>;

    /// Download to the options' output template
    async fn download(&self, url: &str, options: &EngineOptions) -> Result<(), ReelError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engine used by unit tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Call recorded by [`FakeEngine`]
    #[derive(Debug, Clone)]
    pub enum EngineCall {
        Metadata { url: String, options: EngineOptions },
        Download { url: String, options: EngineOptions },
    }

    impl EngineCall {
        pub fn options(&self) -> &EngineOptions {
            match self {
                EngineCall::Metadata { options, .. } | EngineCall::Download { options, .. } => {
                    options
                }
            }
        }
    }

    /// Scripted outcome of a download call
    #[derive(Debug, Clone)]
    pub enum DownloadScript {
        /// Write a file of this many bytes with this extension
        Produce { ext: String, size: u64 },
        /// Wait, then write like `Produce`
        Slow {
            ext: String,
            size: u64,
            delay: std::time::Duration,
        },
        /// Succeed without writing anything
        Nothing,
        /// Fail with an engine error
        Fail(String),
    }

    /// Engine that replays scripted results and records every call
    #[derive(Default)]
    pub struct FakeEngine {
        calls: Mutex<Vec<EngineCall>>,
        metadata: Mutex<VecDeque<Result<Option<serde_json::Value>, String>>>,
        downloads: Mutex<VecDeque<DownloadScript>>,
    }

    impl FakeEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_metadata(&self, value: Option<serde_json::Value>) -> &Self {
            self.metadata.lock().unwrap().push_back(Ok(value));
            self
        }

        pub fn push_metadata_error(&self, message: &str) -> &Self {
            self.metadata
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
            self
        }

        pub fn push_download(&self, script: DownloadScript) -> &Self {
            self.downloads.lock().unwrap().push_back(script);
            self
        }

        pub fn calls(&self) -> Vec<EngineCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn extract_metadata(
            &self,
            url: &str,
            options: &EngineOptions,
        ) -> Result<Option<serde_json::Value>, ReelError> {
            self.calls.lock().unwrap().push(EngineCall::Metadata {
                url: url.to_string(),
                options: options.clone(),
            });
            match self.metadata.lock().unwrap().pop_front() {
                Some(Ok(value)) => Ok(value),
                Some(Err(message)) => Err(ReelError::EngineFailure(message)),
                None => Ok(None),
            }
        }

        async fn download(&self, url: &str, options: &EngineOptions) -> Result<(), ReelError> {
            self.calls.lock().unwrap().push(EngineCall::Download {
                url: url.to_string(),
                options: options.clone(),
            });
            let script = self
                .downloads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(DownloadScript::Nothing);
            let (ext, size) = match script {
                DownloadScript::Produce { ext, size } => (ext, size),
                DownloadScript::Slow { ext, size, delay } => {
                    tokio::time::sleep(delay).await;
                    (ext, size)
                }
                DownloadScript::Nothing => return Ok(()),
                DownloadScript::Fail(message) => return Err(ReelError::EngineFailure(message)),
            };
            let template = options
                .output_template
                .as_ref()
                .expect("download without output template")
                .to_string_lossy()
                .replace("%(ext)s", &ext);
            let file = std::fs::File::create(&template)?;
            file.set_len(size)?;
            Ok(())
        }
    }
}
