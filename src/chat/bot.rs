//! Conversation handler driving the pipeline from chat events

use crate::chat::messages::{
    render_batch_report, render_caption, render_catalog, render_collection_page,
    render_global_stats, render_leaderboard, render_outcome, render_user_stats, HELP, WELCOME,
};
use crate::chat::{ChatId, ChatTransport, FileKind, Incoming, MessageHandle, OutgoingFile, UserId};
use crate::core::media::{DownloadArtifact, DownloadKind};
use crate::core::pipeline::{Pipeline, Submission};
use crate::core::progress::{Progress, Stage};
use crate::core::session::{Choice, ChoiceAction, SessionId};
use crate::error::ReelError;
use crate::utils::filename::to_safe_filename;
use crate::utils::url::looks_like_link;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default interval between progress edits
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Leaderboard length for `/top`
const LEADERBOARD_SIZE: usize = 10;

/// Routes chat events to the pipeline and renders the results
pub struct Bot<T: ChatTransport> {
    transport: Arc<T>,
    pipeline: Arc<Pipeline>,
    progress_interval: Duration,
}

impl<T: ChatTransport> Clone for Bot<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            pipeline: self.pipeline.clone(),
            progress_interval: self.progress_interval,
        }
    }
}

impl<T: ChatTransport + 'static> Bot<T> {
    pub fn new(transport: Arc<T>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            transport,
            pipeline,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(100));
        self
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Handle one event. Failures are reported to the chat, never returned.
    pub async fn handle(&self, event: Incoming) {
        let (chat, result) = match event {
            Incoming::Text { user, chat, text } => (chat, self.on_text(user, chat, &text).await),
            Incoming::Choice { user, chat, data } => {
                (chat, self.on_choice(user, chat, &data).await)
            }
        };

        if let Err(e) = result {
            if e.is_terminal() {
                info!(chat_id = chat, cause = %e, "Request rejected");
            } else {
                error!(chat_id = chat, cause = %e, "Request failed");
            }
            if let Err(send_err) = self.transport.send_text(chat, &e.user_message()).await {
                warn!(chat_id = chat, cause = %send_err, "Failed to report error to chat");
            }
        }
    }

    async fn on_text(&self, user: UserId, chat: ChatId, text: &str) -> Result<(), ReelError> {
        let text = text.trim();
        if text.starts_with('/') {
            return self.on_command(user, chat, text).await;
        }
        if !looks_like_link(text) {
            return Err(ReelError::InvalidUrl(text.to_string()));
        }

        let status = self.transport.send_text(chat, Stage::Analyzing.label()).await?;
        match self.pipeline.submit(user, chat, text).await {
            Ok(submission) => {
                self.transport.edit_text(status, "✅ Link analyzed").await?;
                self.present(chat, submission, false).await
            }
            Err(e) => {
                info!(user_id = user, cause = %e, "Submission rejected");
                self.transport.edit_text(status, &e.user_message()).await
            }
        }
    }

    async fn on_command(&self, user: UserId, chat: ChatId, text: &str) -> Result<(), ReelError> {
        // "/cmd@botname args"
        let command = text
            .split_whitespace()
            .next()
            .and_then(|c| c.split('@').next())
            .unwrap_or_default()
            .to_lowercase();
        debug!(user_id = user, command = %command, "Command received");

        let reply = match command.as_str() {
            "/start" => WELCOME.to_string(),
            "/help" => HELP.to_string(),
            "/stats" => render_global_stats(&self.pipeline.ledger().get_global_stats().await),
            "/mystats" => match self.pipeline.ledger().get_user_stats(&user.to_string()).await {
                Some(summary) => render_user_stats(&summary),
                None => "📊 You have no downloads yet. Send a link to get started!".to_string(),
            },
            "/top" => render_leaderboard(&self.pipeline.ledger().top_users(LEADERBOARD_SIZE).await),
            _ => "❓ Unknown command. Type /help to see what I can do.".to_string(),
        };
        self.transport.send_text(chat, &reply).await?;
        Ok(())
    }

    async fn on_choice(&self, user: UserId, chat: ChatId, data: &str) -> Result<(), ReelError> {
        let choice: Choice = data.parse()?;
        let session = self.pipeline.session(choice.session).await?;
        if session.user != user {
            warn!(user_id = user, owner = session.user, "Choice pressed by another user");
            return Err(ReelError::SessionExpired(choice.to_string()));
        }

        match choice.action {
            ChoiceAction::Video(_) | ChoiceAction::Audio(_) => {
                self.download(chat, choice.session, &choice.action).await
            }
            ChoiceAction::Page(page) => {
                let submission = self.pipeline.show_page(choice.session, page).await?;
                self.present(chat, submission, false).await
            }
            ChoiceAction::Entry(index) => {
                let status = self.transport.send_text(chat, Stage::Analyzing.label()).await?;
                match self.pipeline.open_entry(choice.session, index).await {
                    Ok(submission) => {
                        self.transport.edit_text(status, "✅ Link analyzed").await?;
                        self.present(chat, submission, true).await
                    }
                    Err(e) => self.transport.edit_text(status, &e.user_message()).await,
                }
            }
            ChoiceAction::Back => {
                let submission = self.pipeline.back(choice.session).await?;
                self.present(chat, submission, false).await
            }
            ChoiceAction::All => self.download_all(chat, choice.session, false).await,
            ChoiceAction::AllAudio => self.download_all(chat, choice.session, true).await,
            ChoiceAction::Cancel => {
                self.pipeline.cancel(choice.session).await?;
                self.transport.send_text(chat, "🚫 Cancelled.").await?;
                Ok(())
            }
        }
    }

    async fn present(
        &self,
        chat: ChatId,
        submission: Submission,
        has_back: bool,
    ) -> Result<(), ReelError> {
        let (text, buttons) = match &submission {
            Submission::Catalog { session, catalog } => render_catalog(*session, catalog, has_back),
            Submission::Collection {
                session,
                collection,
                page,
            } => render_collection_page(*session, collection, *page),
        };
        self.transport.present_choice(chat, &text, &buttons).await?;
        Ok(())
    }

    async fn download(
        &self,
        chat: ChatId,
        session: SessionId,
        action: &ChoiceAction,
    ) -> Result<(), ReelError> {
        let stage = match action {
            ChoiceAction::Audio(_) => Stage::ExtractingAudio,
            _ => Stage::Downloading,
        };
        let status = self.transport.send_text(chat, stage.label()).await?;
        let progress = Arc::new(Mutex::new(Progress::new(stage)));
        let stop = CancellationToken::new();
        let ticker = self.spawn_ticker(status, progress.clone(), stop.clone());

        let transport = self.transport.clone();
        let shared = progress.clone();
        let result = self
            .pipeline
            .fetch(session, action, move |artifact| async move {
                let elapsed = {
                    let mut progress = shared.lock().await;
                    let elapsed = progress.elapsed();
                    progress.advance(Stage::Uploading);
                    elapsed
                };
                if let Err(e) = transport.edit_text(status, Stage::Uploading.label()).await {
                    debug!(cause = %e, "Failed to update status");
                }
                transport.send_file(chat, outgoing_file(&artifact, elapsed)).await
            })
            .await;

        stop.cancel();
        if let Err(e) = ticker.await {
            debug!(cause = %e, "Progress ticker ended abnormally");
        }

        match result {
            Ok(report) => {
                self.transport.edit_text(status, "✅ Done!").await?;
                if let Some(notice) = report.outcome.as_ref().and_then(render_outcome) {
                    self.transport.send_text(chat, &notice).await?;
                }
                Ok(())
            }
            Err(e) => {
                info!(session, cause = %e, "Download did not complete");
                self.transport.edit_text(status, &e.user_message()).await
            }
        }
    }

    async fn download_all(
        &self,
        chat: ChatId,
        session: SessionId,
        audio: bool,
    ) -> Result<(), ReelError> {
        let status = self
            .transport
            .send_text(chat, "📥 Downloading the whole playlist...")
            .await?;
        let started = Instant::now();

        let transport = self.transport.clone();
        let report = self
            .pipeline
            .fetch_collection(session, audio, move |artifact, item| {
                let transport = transport.clone();
                async move {
                    let line = format!("📥 Sending {}/{}...", item.position, item.total);
                    if let Err(e) = transport.edit_text(status, &line).await {
                        debug!(cause = %e, "Failed to update status");
                    }
                    transport
                        .send_file(chat, outgoing_file(&artifact, started.elapsed()))
                        .await
                }
            })
            .await?;

        self.transport
            .edit_text(status, &render_batch_report(&report))
            .await
    }

    /// Periodically rewrite `status` with the elapsed time until `stop` fires
    fn spawn_ticker(
        &self,
        status: MessageHandle,
        progress: Arc<Mutex<Progress>>,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let period = self.progress_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {
                        let line = progress.lock().await.status_line();
                        if let Err(e) = transport.edit_text(status, &line).await {
                            debug!(cause = %e, "Failed to update progress");
                        }
                    }
                }
            }
        })
    }
}

/// Describe an artifact for delivery
fn outgoing_file(artifact: &DownloadArtifact, elapsed: Duration) -> OutgoingFile {
    let ext = artifact
        .path()
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let details = &artifact.details;
    OutgoingFile {
        path: artifact.path().to_path_buf(),
        kind: match artifact.kind {
            DownloadKind::Audio => FileKind::Audio,
            _ => FileKind::Video,
        },
        file_name: to_safe_filename(&details.title, ext),
        caption: render_caption(details, artifact.size, elapsed),
        duration: details.duration,
        width: details.width,
        height: details.height,
    }
}
