//! State files: `{ "background", "narrow", "messages" }` as JSON.

use anyhow::{Context, Result};
use scrollback_core::error::ErrorCode;
use scrollback_core::model::{BackgroundData, Message, Narrow};
use scrollback_core::{Grouper, RenderState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub background: BackgroundData,
    #[serde(default)]
    pub narrow: Narrow,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl StateFile {
    /// Read and parse a state file.
    ///
    /// # Errors
    ///
    /// Returns an error carrying [`ErrorCode::StateFileUnreadable`] or
    /// [`ErrorCode::StateFileInvalid`] as its outermost context.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| path.display().to_string())
            .context(ErrorCode::StateFileUnreadable)?;
        let mut state: Self = serde_json::from_str(&content)
            .with_context(|| path.display().to_string())
            .context(ErrorCode::StateFileInvalid)?;
        state.normalize_order();
        debug!(path = %path.display(), messages = state.messages.len(), "state file loaded");
        Ok(state)
    }

    /// Grouping expects messages ordered by id with no repeats, and day
    /// sections only move forward.
    fn normalize_order(&mut self) {
        let sorted = self.messages.windows(2).all(|w| w[0].id < w[1].id);
        if !sorted {
            warn!("messages not in id order; sorting and dropping duplicate ids");
            self.messages.sort_by_key(|m| m.id);
            self.messages.dedup_by_key(|m| m.id);
        }

        let mut clock = i64::MIN;
        for message in &mut self.messages {
            if message.timestamp < clock {
                warn!(id = %message.id, "timestamp earlier than a lower id; clamping");
                message.timestamp = clock;
            }
            clock = message.timestamp;
        }
    }

    #[must_use]
    pub fn to_render_state(&self, grouper: &Grouper) -> RenderState {
        RenderState::new(
            self.background.clone(),
            self.narrow.clone(),
            grouper.group(&self.messages, &self.narrow),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrollback_core::model::MessageId;
    use tempfile::TempDir;

    const MESSAGES: &str = r#"{
        "messages": [
            {"id": 5, "timestamp": 1700000100, "sender_id": 2, "sender_full_name": "Bo",
             "content": "<p>later</p>",
             "recipient": {"type": "stream", "stream_id": 1, "stream": "general", "topic": "t"}},
            {"id": 3, "timestamp": 1700000000, "sender_id": 1, "sender_full_name": "Al",
             "content": "<p>first</p>",
             "recipient": {"type": "stream", "stream_id": 1, "stream": "general", "topic": "t"}},
            {"id": 5, "timestamp": 1700000100, "sender_id": 2, "sender_full_name": "Bo",
             "content": "<p>dup</p>",
             "recipient": {"type": "stream", "stream_id": 1, "stream": "general", "topic": "t"}}
        ]
    }"#;

    #[test]
    fn load_sorts_and_dedups_messages() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, MESSAGES).expect("write");

        let state = StateFile::load(&path).expect("load");
        let ids: Vec<MessageId> = state.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![MessageId(3), MessageId(5)]);
        assert_eq!(state.narrow, Narrow::All);
        assert_eq!(state.to_render_state(&Grouper::utc()).elements.message_count(), 2);
    }

    #[test]
    fn backwards_timestamps_are_clamped() {
        let mut state: StateFile = serde_json::from_str(MESSAGES).expect("parse");
        state.messages[1].timestamp = 1_700_200_000;
        state.normalize_order();
        let stamps: Vec<i64> = state.messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![1_700_200_000, 1_700_200_000]);
        assert_eq!(state.to_render_state(&Grouper::utc()).elements.days.len(), 1);
    }

    #[test]
    fn invalid_json_reports_code() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").expect("write");

        let err = StateFile::load(&path).expect_err("must fail");
        assert_eq!(err.downcast_ref::<ErrorCode>(), Some(&ErrorCode::StateFileInvalid));
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn missing_file_reports_code() {
        let dir = TempDir::new().expect("temp dir");
        let err = StateFile::load(&dir.path().join("absent.json")).expect_err("must fail");
        assert_eq!(err.to_string(), "E2001");
    }
}
