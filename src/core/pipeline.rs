//! Request pipeline: link submission, format choice, download and bookkeeping
//!
//! The pipeline owns every stage between "user pasted a link" and "artifact
//! handed to delivery". Each stage maps its own failures to [`ReelError`], so
//! one failed request never affects another user's session.

use crate::core::catalog::build_catalog;
use crate::core::media::{
    AudioTier, Collection, DownloadArtifact, FormatCatalog, FormatOption, MediaDetails, Platform,
};
use crate::core::quota::DownloadQuota;
use crate::core::session::{
    ChatId, ChoiceAction, Session, SessionId, SessionState, SessionStore, UserId,
};
use crate::download::credentials::CredentialPolicy;
use crate::download::orchestrator::DownloadOrchestrator;
use crate::download::playlist::{batch_video_option, PlaylistExpander};
use crate::engine::{Engine, EngineOptions, RawMetadata};
use crate::error::ReelError;
use crate::stats::ledger::{RecordOutcome, UsageLedger, UsageRecord};
use crate::utils::url::{classify, extract_urls};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a submitted link resolved to
#[derive(Debug, Clone)]
pub enum Submission {
    /// Single item: pick a format
    Catalog {
        session: SessionId,
        catalog: Arc<FormatCatalog>,
    },
    /// Playlist or channel listing at `page`
    Collection {
        session: SessionId,
        collection: Arc<Collection>,
        page: usize,
    },
}

impl Submission {
    pub fn session_id(&self) -> SessionId {
        match self {
            Submission::Catalog { session, .. } | Submission::Collection { session, .. } => *session,
        }
    }
}

/// Result of one delivered download
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub size: u64,
    /// `None` when the ledger could not record the download
    pub outcome: Option<RecordOutcome>,
}

/// Position of one item within a batch download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchItem {
    /// 1-based
    pub position: usize,
    pub total: usize,
}

/// Summary of a whole-collection download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
}

/// Composes classifier, engine, orchestrator, expander, sessions and ledger
pub struct Pipeline {
    engine: Arc<dyn Engine>,
    policy: Arc<CredentialPolicy>,
    orchestrator: Arc<DownloadOrchestrator>,
    expander: PlaylistExpander,
    ledger: Arc<UsageLedger>,
    sessions: SessionStore,
    quota: DownloadQuota,
    allowed: Vec<Platform>,
    metadata_options: EngineOptions,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn Engine>,
        policy: Arc<CredentialPolicy>,
        orchestrator: DownloadOrchestrator,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            expander: PlaylistExpander::new(engine.clone(), policy.clone()),
            engine,
            policy,
            orchestrator: Arc::new(orchestrator),
            ledger,
            sessions: SessionStore::default(),
            quota: DownloadQuota::unlimited(),
            allowed: Platform::KNOWN.to_vec(),
            metadata_options: EngineOptions::default(),
        }
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_quota(mut self, quota: DownloadQuota) -> Self {
        self.quota = quota;
        self
    }

    /// Restrict the platforms links may come from
    pub fn with_allowed_platforms(mut self, allowed: Vec<Platform>) -> Self {
        self.allowed = allowed;
        self
    }

    /// Engine options metadata and listing calls start from
    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.expander = PlaylistExpander::new(self.engine.clone(), self.policy.clone())
            .with_engine_options(options.clone());
        self.metadata_options = options;
        self
    }

    pub fn quota(&self) -> &DownloadQuota {
        &self.quota
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    /// Classify `text` and open a session for the link it contains
    pub async fn submit(
        &self,
        user: UserId,
        chat: ChatId,
        text: &str,
    ) -> Result<Submission, ReelError> {
        let candidate = extract_urls(text)
            .into_iter()
            .next()
            .unwrap_or_else(|| text.trim().to_string());
        let request = classify(&candidate)?;
        request.ensure_supported(&self.allowed)?;

        info!(user_id = user, url = %request.url, platform = %request.platform, "Link submitted");

        if request.is_collection {
            let collection = self.load_collection(&request.url).await?;
            let session = self
                .sessions
                .create(
                    user,
                    chat,
                    request,
                    SessionState::Browsing {
                        collection: collection.clone(),
                        page: 0,
                    },
                )
                .await;
            return Ok(Submission::Collection {
                session: session.id,
                collection,
                page: 0,
            });
        }

        let catalog = self.load_catalog(&request.url).await?;
        let url = request.url.clone();
        let session = self
            .sessions
            .create(
                user,
                chat,
                request,
                SessionState::AwaitingFormat {
                    catalog: catalog.clone(),
                    url,
                    back: None,
                },
            )
            .await;
        Ok(Submission::Catalog {
            session: session.id,
            catalog,
        })
    }

    /// Open one collection entry as a single-item request
    pub async fn open_entry(
        &self,
        session_id: SessionId,
        index: usize,
    ) -> Result<Submission, ReelError> {
        let session = self.sessions.get(session_id).await?;
        let SessionState::Browsing { collection, page } = session.state else {
            return Err(ReelError::SessionExpired(session_id.to_string()));
        };
        let entry = collection
            .entry(index)
            .ok_or_else(|| ReelError::SessionExpired(format!("{}: no entry {}", session_id, index)))?;

        let catalog = self.load_catalog(&entry.url).await?;
        let state = SessionState::AwaitingFormat {
            catalog: catalog.clone(),
            url: entry.url.clone(),
            back: Some((collection.clone(), page)),
        };
        self.sessions.update(session_id, state).await?;
        Ok(Submission::Catalog {
            session: session_id,
            catalog,
        })
    }

    /// Move a collection listing to `page` (clamped)
    pub async fn show_page(
        &self,
        session_id: SessionId,
        page: usize,
    ) -> Result<Submission, ReelError> {
        let session = self.sessions.get(session_id).await?;
        let SessionState::Browsing { collection, .. } = session.state else {
            return Err(ReelError::SessionExpired(session_id.to_string()));
        };
        let page = collection.page(page).number;
        self.browse(session_id, collection, page).await
    }

    /// Return from an entry's catalog to the listing it was opened from
    pub async fn back(&self, session_id: SessionId) -> Result<Submission, ReelError> {
        let session = self.sessions.get(session_id).await?;
        match session.state {
            SessionState::AwaitingFormat {
                back: Some((collection, page)),
                ..
            }
            | SessionState::Browsing { collection, page } => {
                self.browse(session_id, collection, page).await
            }
            SessionState::AwaitingFormat { back: None, .. } => {
                Err(ReelError::SessionExpired(session_id.to_string()))
            }
        }
    }

    async fn browse(
        &self,
        session_id: SessionId,
        collection: Arc<Collection>,
        page: usize,
    ) -> Result<Submission, ReelError> {
        self.sessions
            .update(
                session_id,
                SessionState::Browsing {
                    collection: collection.clone(),
                    page,
                },
            )
            .await?;
        Ok(Submission::Collection {
            session: session_id,
            collection,
            page,
        })
    }

    /// Download the chosen format and hand the artifact to `deliver`.
    ///
    /// The session survives a failed download so the user can pick another
    /// option. The artifact's file is deleted once `deliver` returns.
    pub async fn fetch<F, Fut>(
        &self,
        session_id: SessionId,
        action: &ChoiceAction,
        deliver: F,
    ) -> Result<FetchReport, ReelError>
    where
        F: FnOnce(DownloadArtifact) -> Fut,
        Fut: Future<Output = Result<(), ReelError>>,
    {
        let session = self.sessions.get(session_id).await?;
        let SessionState::AwaitingFormat { catalog, url, back } = &session.state else {
            return Err(ReelError::SessionExpired(session_id.to_string()));
        };

        let option = match action {
            ChoiceAction::Video(format_id) => catalog.video_option(format_id),
            ChoiceAction::Audio(tier) => catalog.audio_option(*tier),
            _ => None,
        }
        .cloned()
        .ok_or_else(|| ReelError::SessionExpired(format!("{}: stale option", session_id)))?;

        self.quota.check(&session.user.to_string())?;

        let details = catalog.details_for(&option);
        let artifact = self
            .run_fetch(&session.cancel, url.clone(), option, details)
            .await?;

        let record = UsageRecord {
            user_id: session.user.to_string(),
            platform: session.request.platform,
            kind: artifact.kind,
            quality: artifact.quality.clone(),
            size_bytes: artifact.size,
        };
        let size = artifact.size;
        deliver(artifact).await?;

        let outcome = self.record(record).await;

        match back {
            Some((collection, page)) => {
                self.browse(session_id, collection.clone(), *page).await?;
            }
            None => {
                self.sessions.remove(session_id).await;
            }
        }

        Ok(FetchReport { size, outcome })
    }

    /// Download every entry of a collection one at a time.
    ///
    /// Per-item failures are logged and counted; the batch continues.
    pub async fn fetch_collection<F, Fut>(
        &self,
        session_id: SessionId,
        audio: bool,
        mut deliver: F,
    ) -> Result<BatchReport, ReelError>
    where
        F: FnMut(DownloadArtifact, BatchItem) -> Fut,
        Fut: Future<Output = Result<(), ReelError>>,
    {
        let session = self.sessions.get(session_id).await?;
        let SessionState::Browsing { collection, .. } = &session.state else {
            return Err(ReelError::SessionExpired(session_id.to_string()));
        };
        let user_id = session.user.to_string();
        self.quota.check(&user_id)?;

        let option = if audio {
            FormatOption::audio(AudioTier::High)
        } else {
            batch_video_option()
        };

        let mut report = BatchReport {
            total: collection.len(),
            ..Default::default()
        };
        info!(
            user_id = %user_id,
            url = %collection.source_url,
            items = report.total,
            audio,
            "Starting batch download"
        );

        for (i, entry) in collection.entries.iter().enumerate() {
            if session.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let details = MediaDetails {
                title: entry.title.clone(),
                duration: entry.duration,
                ..Default::default()
            };
            let artifact = match self
                .run_fetch(&session.cancel, entry.url.clone(), option.clone(), details)
                .await
            {
                Ok(artifact) => artifact,
                Err(ReelError::Cancelled(_)) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(url = %entry.url, index = entry.index, cause = %e, "Batch item failed");
                    report.failed += 1;
                    continue;
                }
            };

            let record = UsageRecord {
                user_id: user_id.clone(),
                platform: session.request.platform,
                kind: artifact.kind,
                quality: artifact.quality.clone(),
                size_bytes: artifact.size,
            };
            let item = BatchItem {
                position: i + 1,
                total: report.total,
            };
            match deliver(artifact, item).await {
                Ok(()) => {
                    report.delivered += 1;
                    self.record(record).await;
                }
                Err(e) => {
                    warn!(url = %entry.url, cause = %e, "Batch item delivery failed");
                    report.failed += 1;
                }
            }
        }

        if report.delivered > 0 {
            if let Err(e) = self
                .ledger
                .record_playlist(&user_id, session.request.platform, report.delivered)
                .await
            {
                error!(user_id = %user_id, cause = %e, "Failed to record playlist download");
            }
        }

        info!(
            user_id = %user_id,
            delivered = report.delivered,
            failed = report.failed,
            cancelled = report.cancelled,
            "Batch download finished"
        );
        Ok(report)
    }

    /// Stop waiting on the session's work and close it.
    ///
    /// An engine call already running finishes in the background; its
    /// artifact is discarded.
    pub async fn cancel(&self, session_id: SessionId) -> Result<(), ReelError> {
        let session = self
            .sessions
            .remove(session_id)
            .await
            .ok_or_else(|| ReelError::SessionExpired(session_id.to_string()))?;
        session.cancel.cancel();
        info!(session = session_id, user_id = session.user, "Session cancelled");
        Ok(())
    }

    /// Session lookup for front-ends that need its owner or request
    pub async fn session(&self, session_id: SessionId) -> Result<Session, ReelError> {
        self.sessions.get(session_id).await
    }

    async fn load_catalog(&self, url: &str) -> Result<Arc<FormatCatalog>, ReelError> {
        let options = EngineOptions {
            single_item: true,
            flat_extraction: false,
            format: None,
            output_template: None,
            audio: None,
            ..self.metadata_options.clone()
        };
        let engine = &self.engine;
        let value = self
            .policy
            .execute(|cookies| {
                let options = options.with_cookies(cookies);
                async move { engine.extract_metadata(url, &options).await }
            })
            .await
            .map_err(|e| {
                error!(url, cause = %e, "Metadata extraction failed");
                ReelError::MetadataUnavailable(url.to_string())
            })?;

        let raw = RawMetadata::from_value(value).map_err(|e| {
            error!(url, cause = %e, "Engine metadata did not parse");
            ReelError::MetadataUnavailable(url.to_string())
        })?;

        build_catalog(raw.as_ref())
            .map(Arc::new)
            .ok_or_else(|| ReelError::MetadataUnavailable(url.to_string()))
    }

    async fn load_collection(&self, url: &str) -> Result<Arc<Collection>, ReelError> {
        let collection = self
            .expander
            .expand(url)
            .await
            .map_err(|e| {
                error!(url, cause = %e, "Collection listing failed");
                ReelError::MetadataUnavailable(url.to_string())
            })?
            .ok_or_else(|| ReelError::MetadataUnavailable(url.to_string()))?;

        if collection.is_empty() {
            return Err(ReelError::EmptyCollection(url.to_string()));
        }
        Ok(Arc::new(collection))
    }

    /// Run one orchestrated download on its own task, racing user cancel.
    ///
    /// On cancel the task is detached; when it finishes its artifact is
    /// dropped, which deletes the file.
    async fn run_fetch(
        &self,
        cancel: &CancellationToken,
        url: String,
        option: FormatOption,
        details: MediaDetails,
    ) -> Result<DownloadArtifact, ReelError> {
        let orchestrator = self.orchestrator.clone();
        let task = tokio::spawn(async move { orchestrator.fetch(&url, &option, details).await });

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Download abandoned by user, engine call continues in background");
                Err(ReelError::Cancelled("download".to_string()))
            }
            joined = task => joined.map_err(|e| ReelError::DownloadFailed {
                cause: format!("download task failed: {}", e),
            })?,
        }
    }

    async fn record(&self, record: UsageRecord) -> Option<RecordOutcome> {
        let user_id = record.user_id.clone();
        match self.ledger.record(record).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(user_id = %user_id, cause = %e, "Failed to record download");
                None
            }
        }
    }
}
