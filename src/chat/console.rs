//! Terminal transport: one local user talking to the bot over stdin/stdout

use crate::chat::{
    Button, ChatId, ChatTransport, Incoming, MessageHandle, OutgoingFile, UserId,
};
use crate::cli::output::OutputFormatter;
use crate::error::ReelError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info};

/// User id of the local console user
pub const CONSOLE_USER: UserId = 1;

/// Chat id of the local console conversation
pub const CONSOLE_CHAT: ChatId = 1;

/// Transport that prints to the terminal and saves delivered files locally.
///
/// Buttons of the latest choice are numbered; typing `#n` presses one.
pub struct ConsoleTransport {
    output: OutputFormatter,
    output_dir: PathBuf,
    choices: Mutex<HashMap<ChatId, Vec<String>>>,
    next_id: AtomicU64,
}

impl ConsoleTransport {
    pub fn new(output: OutputFormatter, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output,
            output_dir: output_dir.into(),
            choices: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn output(&self) -> &OutputFormatter {
        &self.output
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn handle(&self, chat: ChatId) -> MessageHandle {
        MessageHandle {
            chat,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Turn one typed line into an event
    pub fn parse_line(&self, line: &str) -> Option<Incoming> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(number) = line.strip_prefix('#').and_then(|n| n.trim().parse::<usize>().ok()) {
            let data = self
                .choices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&CONSOLE_CHAT)
                .and_then(|choices| choices.get(number.checked_sub(1)?).cloned());
            return match data {
                Some(data) => Some(Incoming::Choice {
                    user: CONSOLE_USER,
                    chat: CONSOLE_CHAT,
                    data,
                }),
                None => {
                    self.output.warning(&format!("There is no choice #{}", number));
                    None
                }
            };
        }

        Some(Incoming::Text {
            user: CONSOLE_USER,
            chat: CONSOLE_CHAT,
            text: line.to_string(),
        })
    }

    /// Read lines until one maps to an event; `None` at end of input
    pub async fn next_event<R>(&self, lines: &mut Lines<R>) -> Result<Option<Incoming>, ReelError>
    where
        R: AsyncBufRead + Unpin,
    {
        while let Some(line) = lines.next_line().await? {
            if let Some(event) = self.parse_line(&line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

/// First free path for `file_name` in `dir`, adding ` (n)` before the extension
fn free_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("media");
    let ext = path.extension().and_then(|e| e.to_str());
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageHandle, ReelError> {
        self.output.message(text);
        Ok(self.handle(chat))
    }

    async fn edit_text(&self, _message: MessageHandle, text: &str) -> Result<(), ReelError> {
        self.output.set_status(text);
        Ok(())
    }

    async fn send_file(&self, _chat: ChatId, file: OutgoingFile) -> Result<(), ReelError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let target = free_path(&self.output_dir, &file.file_name);
        let bytes = tokio::fs::copy(&file.path, &target).await?;
        info!(path = ?target, bytes, "Saved delivered file");

        self.output.success(&format!("Saved {}", target.display()));
        self.output.message(&file.caption);
        Ok(())
    }

    async fn present_choice(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<MessageHandle, ReelError> {
        let flat: Vec<&Button> = buttons.iter().flatten().collect();
        let labels: Vec<(usize, String)> = flat
            .iter()
            .enumerate()
            .map(|(i, b)| (i + 1, b.label.clone()))
            .collect();
        debug!(chat_id = chat, choices = flat.len(), "Presenting choices");

        self.choices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat, flat.iter().map(|b| b.choice.clone()).collect());
        self.output.choices(text, &labels);
        Ok(self.handle(chat))
    }
}
