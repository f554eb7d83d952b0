//! Chat front-end: transport boundary, message rendering and the bot loop
//!
//! The core only needs a notification sink that can send and edit text,
//! deliver files and present labeled choices whose ids come back verbatim.

pub mod bot;
pub mod console;
pub mod messages;

pub use bot::*;
pub use console::*;
pub use messages::*;

pub use crate::core::session::{ChatId, UserId};

use crate::error::ReelError;
use async_trait::async_trait;
use std::path::PathBuf;

/// A message the transport can later edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub chat: ChatId,
    pub id: u64,
}

/// One labeled choice; `choice` is echoed back when pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub choice: String,
}

impl Button {
    pub fn new(label: impl Into<String>, choice: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            choice: choice.into(),
        }
    }
}

/// How a delivered file should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Audio,
}

/// File handed to the transport for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFile {
    pub path: PathBuf,
    pub kind: FileKind,
    /// Suggested name shown to the recipient
    pub file_name: String,
    pub caption: String,
    pub duration: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Event received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text {
        user: UserId,
        chat: ChatId,
        text: String,
    },
    Choice {
        user: UserId,
        chat: ChatId,
        data: String,
    },
}

/// Message delivery capability the bot depends on
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageHandle, ReelError>;

    async fn edit_text(&self, message: MessageHandle, text: &str) -> Result<(), ReelError>;

    /// Deliver a file; the file is removed by the caller afterwards
    async fn send_file(&self, chat: ChatId, file: OutgoingFile) -> Result<(), ReelError>;

    /// Show `text` with rows of buttons
    async fn present_choice(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<MessageHandle, ReelError>;
}
