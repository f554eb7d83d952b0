//! Interaction sessions and the choice ids that address them

use crate::core::media::{AudioTier, Collection, FormatCatalog, MediaRequest};
use crate::error::ReelError;
use moka::future::Cache;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type SessionId = u64;
pub type UserId = i64;
pub type ChatId = i64;

/// Default idle lifetime of a session
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Default number of live sessions kept
pub const DEFAULT_SESSION_CAPACITY: u64 = 10_000;

/// Where an interaction currently stands
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Catalog shown, waiting for a format choice
    AwaitingFormat {
        catalog: Arc<FormatCatalog>,
        /// Item URL the catalog was built for
        url: String,
        /// Collection page to return to, when the item was opened from a listing
        back: Option<(Arc<Collection>, usize)>,
    },
    /// Collection listing shown at `page`
    Browsing {
        collection: Arc<Collection>,
        page: usize,
    },
}

/// One live interaction
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user: UserId,
    pub chat: ChatId,
    pub request: MediaRequest,
    pub state: SessionState,
    /// Fired when the user cancels; shared by every clone
    pub cancel: CancellationToken,
}

/// Live sessions with idle expiry
pub struct SessionStore {
    cache: Cache<SessionId, Session>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_idle(ttl)
                .max_capacity(capacity)
                .build(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start a session for `request`
    pub async fn create(
        &self,
        user: UserId,
        chat: ChatId,
        request: MediaRequest,
        state: SessionState,
    ) -> Session {
        let session = Session {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user,
            chat,
            request,
            state,
            cancel: CancellationToken::new(),
        };
        self.cache.insert(session.id, session.clone()).await;
        debug!(session = session.id, user, "Session created");
        session
    }

    pub async fn get(&self, id: SessionId) -> Result<Session, ReelError> {
        self.cache
            .get(&id)
            .await
            .ok_or_else(|| ReelError::SessionExpired(id.to_string()))
    }

    /// Replace the state of a live session
    pub async fn update(&self, id: SessionId, state: SessionState) -> Result<Session, ReelError> {
        let mut session = self.get(id).await?;
        session.state = state;
        self.cache.insert(id, session.clone()).await;
        Ok(session)
    }

    pub async fn remove(&self, id: SessionId) -> Option<Session> {
        let removed = self.cache.remove(&id).await;
        if removed.is_some() {
            debug!(session = id, "Session closed");
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_SESSION_CAPACITY)
    }
}

/// What a pressed button asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceAction {
    /// Video option by engine format id
    Video(String),
    Audio(AudioTier),
    /// Collection page (0-based)
    Page(usize),
    /// Collection entry by 1-based index
    Entry(usize),
    All,
    AllAudio,
    Back,
    Cancel,
}

/// Button payload addressed to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub session: SessionId,
    pub action: ChoiceAction,
}

impl Choice {
    pub fn new(session: SessionId, action: ChoiceAction) -> Self {
        Self { session, action }
    }

    /// Compact id round-tripped through the transport
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.session;
        match &self.action {
            ChoiceAction::Video(id) => write!(f, "{}:v:{}", s, id),
            ChoiceAction::Audio(tier) => write!(f, "{}:a:{}", s, tier.key()),
            ChoiceAction::Page(page) => write!(f, "{}:p:{}", s, page),
            ChoiceAction::Entry(index) => write!(f, "{}:e:{}", s, index),
            ChoiceAction::All => write!(f, "{}:all", s),
            ChoiceAction::AllAudio => write!(f, "{}:all-audio", s),
            ChoiceAction::Back => write!(f, "{}:back", s),
            ChoiceAction::Cancel => write!(f, "{}:cancel", s),
        }
    }
}

impl FromStr for Choice {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReelError::SessionExpired(format!("unrecognized choice {:?}", s));

        let (session, action) = s.split_once(':').ok_or_else(invalid)?;
        let session: SessionId = session.parse().map_err(|_| invalid())?;

        let action = match action {
            "all" => ChoiceAction::All,
            "all-audio" => ChoiceAction::AllAudio,
            "back" => ChoiceAction::Back,
            "cancel" => ChoiceAction::Cancel,
            other => match other.split_once(':').ok_or_else(invalid)? {
                ("v", id) if !id.is_empty() => ChoiceAction::Video(id.to_string()),
                ("a", tier) => ChoiceAction::Audio(AudioTier::from_key(tier).ok_or_else(invalid)?),
                ("p", page) => ChoiceAction::Page(page.parse().map_err(|_| invalid())?),
                ("e", index) => ChoiceAction::Entry(index.parse().map_err(|_| invalid())?),
                _ => return Err(invalid()),
            },
        };

        Ok(Choice { session, action })
    }
}
