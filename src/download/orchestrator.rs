//! Download orchestration: engine call, output location, size ceiling

use crate::core::media::{DownloadArtifact, FormatKind, FormatOption, MediaDetails};
use crate::download::credentials::CredentialPolicy;
use crate::engine::{AudioTranscode, Engine, EngineOptions};
use crate::error::ReelError;
use crate::utils::filename::{
    find_produced_file, remove_stem_files, unique_stem, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default artifact size ceiling (500 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Fetches a chosen option into the temp area and validates the result
pub struct DownloadOrchestrator {
    engine: Arc<dyn Engine>,
    policy: Arc<CredentialPolicy>,
    temp_dir: PathBuf,
    max_file_size: u64,
    base_options: EngineOptions,
}

impl DownloadOrchestrator {
    /// Create an orchestrator writing into `temp_dir`
    pub fn new(
        engine: Arc<dyn Engine>,
        policy: Arc<CredentialPolicy>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            policy,
            temp_dir: temp_dir.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            base_options: EngineOptions::default(),
        }
    }

    /// Set the artifact size ceiling in bytes
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set the engine options every download starts from
    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.base_options = options;
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Engine options for one download of `option` into `template`
    fn download_options(&self, option: &FormatOption, template: PathBuf) -> EngineOptions {
        let mut options = self.base_options.clone();
        options.format = Some(option.format_id.clone());
        options.output_template = Some(template);
        options.single_item = true;
        options.flat_extraction = false;
        options.audio = match option.kind {
            FormatKind::Audio(tier) => Some(AudioTranscode::mp3(tier.bitrate_kbps())),
            FormatKind::Video => None,
        };
        options
    }

    /// Download `option` of `url` and return the validated artifact.
    ///
    /// The size ceiling is checked only after the file exists on disk; the
    /// engine's estimate is not trusted. Every failure path leaves no file
    /// with this call's stem behind.
    pub async fn fetch(
        &self,
        url: &str,
        option: &FormatOption,
        details: MediaDetails,
    ) -> Result<DownloadArtifact, ReelError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let kind = option.download_kind();
        let stem = unique_stem(kind);
        let template = self.temp_dir.join(format!("{}.%(ext)s", stem));
        let options = self.download_options(option, template);

        info!(url, format_id = %option.format_id, quality = %option.quality, "Starting download");

        let engine = &self.engine;
        let outcome = self
            .policy
            .execute(|cookies| {
                let options = options.with_cookies(cookies);
                async move { engine.download(url, &options).await }
            })
            .await;

        if let Err(e) = outcome {
            error!(url, format_id = %option.format_id, cause = %e, "Engine download failed");
            remove_stem_files(&self.temp_dir, &stem, None);
            return Err(ReelError::DownloadFailed {
                cause: e.to_string(),
            });
        }

        let extensions = if option.is_audio() {
            AUDIO_EXTENSIONS
        } else {
            VIDEO_EXTENSIONS
        };
        let Some(path) = find_produced_file(&self.temp_dir, &stem, extensions) else {
            error!(url, format_id = %option.format_id, stem = %stem, "No output file produced");
            remove_stem_files(&self.temp_dir, &stem, None);
            return Err(ReelError::DownloadFailed {
                cause: format!("no {:?} output for {}", extensions, stem),
            });
        };

        let size = tokio::fs::metadata(&path).await?.len();
        let artifact = DownloadArtifact::new(path, size, kind, option.quality.clone(), details);
        remove_stem_files(&self.temp_dir, &stem, Some(artifact.path()));

        if size > self.max_file_size {
            warn!(
                url,
                format_id = %option.format_id,
                size,
                max = self.max_file_size,
                "Artifact exceeds size limit, discarding"
            );
            drop(artifact);
            return Err(ReelError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        info!(url, size, path = ?artifact.path(), "Download complete");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media::{AudioTier, DownloadKind, VideoTraits};
    use crate::download::credentials::{CredentialPolicyConfig, Credentials};
    use crate::engine::testing::{DownloadScript, FakeEngine};
    use crate::engine::CookieMaterial;

    const MIB: u64 = 1024 * 1024;

    fn video_option(format_id: &str, height: u32) -> FormatOption {
        FormatOption {
            kind: FormatKind::Video,
            quality: format!("{}p", height),
            format_id: format_id.to_string(),
            estimated_size: Some(MIB),
            ext: Some("mp4".to_string()),
            video: Some(VideoTraits {
                height: Some(height),
                ..Default::default()
            }),
        }
    }

    fn orchestrator(engine: Arc<FakeEngine>, dir: &Path) -> DownloadOrchestrator {
        DownloadOrchestrator::new(engine, Arc::new(CredentialPolicy::disabled()), dir)
            .with_max_file_size(500 * MIB)
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_oversized_artifact_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        engine.push_download(DownloadScript::Produce {
            ext: "mp4".to_string(),
            size: 600 * MIB,
        });

        let result = orchestrator(engine.clone(), dir.path())
            .fetch(
                "https://youtu.be/abc",
                &video_option("137", 1080),
                MediaDetails::default(),
            )
            .await;

        match result {
            Err(ReelError::FileTooLarge { size, max }) => {
                assert_eq!(size, 600 * MIB);
                assert_eq!(max, 500 * MIB);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(file_count(dir.path()), 0);
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_video_download_produces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        engine.push_download(DownloadScript::Produce {
            ext: "webm".to_string(),
            size: 2048,
        });

        let details = MediaDetails {
            title: "Clip".to_string(),
            duration: Some(61),
            width: Some(1280),
            height: Some(720),
        };
        let artifact = orchestrator(engine.clone(), dir.path())
            .fetch("https://youtu.be/abc", &video_option("247", 720), details)
            .await
            .unwrap();

        assert_eq!(artifact.size, 2048);
        assert_eq!(artifact.kind, DownloadKind::Video);
        assert_eq!(artifact.quality, "720p");
        assert_eq!(artifact.details.title, "Clip");
        assert!(artifact.path().starts_with(dir.path()));
        assert_eq!(artifact.path().extension().unwrap(), "webm");

        let calls = engine.calls();
        let options = calls[0].options();
        assert_eq!(options.format.as_deref(), Some("247"));
        assert!(options.audio.is_none());
        assert!(options.cookies.is_none());

        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_output_is_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        engine.push_download(DownloadScript::Produce {
            ext: "part".to_string(),
            size: 10,
        });

        let result = orchestrator(engine, dir.path())
            .fetch(
                "https://youtu.be/abc",
                &video_option("18", 360),
                MediaDetails::default(),
            )
            .await;

        assert!(matches!(result, Err(ReelError::DownloadFailed { .. })));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_is_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        engine.push_download(DownloadScript::Fail("HTTP Error 404".to_string()));

        let result = orchestrator(engine, dir.path())
            .fetch(
                "https://youtu.be/abc",
                &video_option("18", 360),
                MediaDetails::default(),
            )
            .await;

        match result {
            Err(ReelError::DownloadFailed { cause }) => assert!(cause.contains("404")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_audio_download_transcodes_and_checks_size() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        engine.push_download(DownloadScript::Produce {
            ext: "mp3".to_string(),
            size: 4096,
        });

        let orchestrator = orchestrator(engine.clone(), dir.path());
        let artifact = orchestrator
            .fetch(
                "https://youtu.be/abc",
                &FormatOption::audio(AudioTier::High),
                MediaDetails::default(),
            )
            .await
            .unwrap();

        assert_eq!(artifact.kind, DownloadKind::Audio);
        assert_eq!(artifact.quality, "192kbps");
        let calls = engine.calls();
        let options = calls[0].options();
        assert_eq!(options.format.as_deref(), Some(AudioTier::High.selector()));
        assert_eq!(options.audio, Some(AudioTranscode::mp3(192)));
        drop(artifact);

        engine.push_download(DownloadScript::Produce {
            ext: "mp3".to_string(),
            size: 501 * MIB,
        });
        let result = orchestrator
            .fetch(
                "https://youtu.be/abc",
                &FormatOption::audio(AudioTier::Medium),
                MediaDetails::default(),
            )
            .await;
        assert!(matches!(result, Err(ReelError::FileTooLarge { .. })));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_falls_back_to_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        engine
            .push_download(DownloadScript::Fail("Sign in to confirm".to_string()))
            .push_download(DownloadScript::Produce {
                ext: "mp4".to_string(),
                size: 100,
            });
        let policy = CredentialPolicy::new(
            CredentialPolicyConfig {
                enabled: true,
                apply_on_failure_only: true,
            },
            Some(Credentials::from_material(CookieMaterial::Header(
                "SID=1".to_string(),
            ))),
        );

        let artifact = DownloadOrchestrator::new(engine.clone(), Arc::new(policy), dir.path())
            .fetch(
                "https://youtu.be/abc",
                &video_option("22", 720),
                MediaDetails::default(),
            )
            .await
            .unwrap();

        assert_eq!(artifact.size, 100);
        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].options().cookies.is_none());
        assert!(calls[1].options().cookies.is_some());
        assert_eq!(
            calls[0].options().output_template,
            calls[1].options().output_template
        );
    }
}
