//! Append-only conversation log, rewritten in full to the key-value store on every append.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use shared::domain::{ConversationMessage, MessageId};
use storage::KeyValueStore;
use tracing::{info, warn};

pub const HISTORY_STORAGE_KEY: &str = "plotter_studio.chat_history";

pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    messages: Vec<ConversationMessage>,
    last_id: Option<i64>,
}

impl HistoryStore {
    /// Loads the persisted log. Unreadable or corrupt data yields an empty log.
    pub async fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let messages = match store.get(HISTORY_STORAGE_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<ConversationMessage>>(&bytes) {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(
                        error = %err,
                        bytes = bytes.len(),
                        "history: persisted log is corrupt; starting empty"
                    );
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "history: failed to read persisted log; starting empty");
                Vec::new()
            }
        };

        let last_id = messages.iter().map(|m| m.id.0).max();
        info!(messages = messages.len(), "history: restored");
        Self {
            store,
            messages,
            last_id,
        }
    }

    /// Append-time id in milliseconds, bumped past the last issued id when the clock has not moved.
    pub fn next_id(&mut self, now: DateTime<Utc>) -> MessageId {
        let candidate = now.timestamp_millis();
        let id = match self.last_id {
            Some(last) if candidate <= last => last + 1,
            _ => candidate,
        };
        self.last_id = Some(id);
        MessageId(id)
    }

    /// Adds `message` to the log, then persists the whole log.
    ///
    /// A message whose id is already logged is rejected and not appended. Otherwise the in-memory
    /// append stands even when the write fails; the error is returned for logging.
    pub async fn append(&mut self, message: ConversationMessage) -> Result<()> {
        if self.get(message.id).is_some() {
            bail!("duplicate message id {}", message.id.0);
        }
        self.last_id = Some(self.last_id.map_or(message.id.0, |last| last.max(message.id.0)));
        self.messages.push(message);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let bytes =
            serde_json::to_vec(&self.messages).context("failed to serialize conversation log")?;
        self.store
            .set(HISTORY_STORAGE_KEY, &bytes)
            .await
            .context("failed to persist conversation log")
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
