//! Retained state
//!
//! State that has to survive a restart of the whole program (the last
//! readings, a screen index, counters) is kept in an explicit
//! [`RetainedState`] value. It is restored once at startup and saved at
//! defined points, such as right before the device goes to sleep. Nothing is
//! persisted implicitly.
//!
//! The file is JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": "2026-10-17T06:30:00Z",
//!   "root": [
//!     { "name": "retained" },
//!     { "name": "screen", "value": { "type": "int", "value": 2 }, "depth": 1 }
//!   ]
//! }
//! ```

use crate::dataflow::message::Message;
use crate::dataflow::snapshot::MessageSnapshot;
use crate::error::{DataflowError, Result, ResultExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current file format version
pub const STATE_VERSION: u32 = 1;

/// Name of the root node of a fresh state tree
pub const STATE_ROOT: &str = "retained";

fn default_version() -> u32 {
    STATE_VERSION
}

/// Explicitly persisted context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedState {
    /// Version for future migration support
    #[serde(default = "default_version")]
    pub version: u32,

    /// When the state was last captured
    pub saved_at: DateTime<Utc>,

    /// The retained data as a message tree
    pub root: MessageSnapshot,
}

impl Default for RetainedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            root: MessageSnapshot::named(STATE_ROOT),
        }
    }
}

impl RetainedState {
    /// Capture `message` as the retained data
    pub fn capture(message: &Message) -> Result<Self> {
        Ok(Self {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            root: MessageSnapshot::capture(message).context("Failed to capture retained state")?,
        })
    }

    /// Rebuild the retained message tree
    pub fn message(&self) -> Result<Message> {
        self.root.restore().context("Failed to restore retained state")
    }

    /// Load retained state from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataflowError::Serialization(format!("Failed to read state file {:?}: {}", path, e))
        })?;

        let state: Self = serde_json::from_str(&content).map_err(|e| {
            DataflowError::Serialization(format!("Failed to parse state file {:?}: {}", path, e))
        })?;

        if state.version > STATE_VERSION {
            return Err(DataflowError::Serialization(format!(
                "State file {:?} has version {}, newest supported is {}",
                path, state.version, STATE_VERSION
            )));
        }
        state
            .message()
            .with_context(|| format!("State file {:?} is malformed", path))?;
        Ok(state)
    }

    /// Load retained state, starting fresh on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No retained state at {:?}, starting fresh", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load retained state, starting fresh: {}", e);
            Self::default()
        })
    }

    /// Save retained state to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DataflowError::Serialization(format!("Failed to serialize state: {}", e)))?;

        std::fs::write(path, content)
            .map_err(DataflowError::Io)
            .with_context(|| format!("Failed to write state file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::interface::{test_support::NullBus, DriverHandle, InterfaceKind};
    use tempfile::tempdir;

    fn sample() -> Message {
        let mut msg = Message::named(STATE_ROOT);
        msg.child_mut("screen").set(2);
        let mut last = msg.add("last");
        last.add_with("temperature", 19.25);
        last.add_with("pressure", 99870.0);
        msg
    }

    #[test]
    fn test_default_is_empty_tree() {
        let state = RetainedState::default();
        let message = state.message().unwrap();
        assert_eq!(message.name(), STATE_ROOT);
        assert_eq!(message.child_count(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("retained.json");

        let state = RetainedState::capture(&sample()).unwrap();
        state.save(&path).unwrap();

        let loaded = RetainedState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.message().unwrap(), sample());
    }

    #[test]
    fn test_load_or_default_on_missing_and_corrupt() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let fresh = RetainedState::load_or_default(&missing).message().unwrap();
        assert_eq!(fresh.child_count(), 0);

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert!(RetainedState::load(&corrupt).is_err());
        assert_eq!(
            RetainedState::load_or_default(&corrupt).root.root_name(),
            Some(STATE_ROOT)
        );
    }

    #[test]
    fn test_deep_tree_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep.json");

        let mut msg = Message::named(STATE_ROOT);
        let mut id = msg.root().id();
        for level in 0..100 {
            id = msg
                .node_mut(id)
                .unwrap()
                .add_with("n", level as i64)
                .id();
        }

        RetainedState::capture(&msg).unwrap().save(&path).unwrap();
        let loaded = RetainedState::load(&path).unwrap();
        assert_eq!(loaded.message().unwrap(), msg);
    }

    #[test]
    fn test_malformed_tree_is_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gap.json");
        std::fs::write(
            &path,
            r#"{"version":1,"saved_at":"2026-10-17T06:30:00Z","root":[{"name":"retained"},{"name":"lost","depth":3}]}"#,
        )
        .unwrap();

        let err = RetainedState::load(&path).unwrap_err();
        assert!(matches!(err.root(), DataflowError::Serialization(_)));
        assert_eq!(
            RetainedState::load_or_default(&path).message().unwrap().child_count(),
            0
        );
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.json");
        let mut state = RetainedState::default();
        state.version = STATE_VERSION + 1;
        state.save(&path).unwrap();

        assert!(matches!(
            RetainedState::load(&path),
            Err(DataflowError::Serialization(_))
        ));
    }

    #[test]
    fn test_handles_are_not_persistable() {
        let mut msg = sample();
        msg.child_mut("bus")
            .set(DriverHandle::new(NullBus::new(InterfaceKind::Spi)));
        let err = RetainedState::capture(&msg).unwrap_err();
        assert!(matches!(err.root(), DataflowError::Serialization(_)));
    }
}
