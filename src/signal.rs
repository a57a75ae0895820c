//! Single-slot signaling toward the external front-end.
//!
//! The flow machine posts one-shot instructions ("start the camera now")
//! that a front-end polls for. The slot holds at most one signal: a new
//! post overwrites whatever was pending, and the reader clears the slot
//! when it takes the signal. Backed by one small JSON file so a front-end
//! in another process can see it.

use crate::error::{ReceptionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Signal asking the front-end to start employee face capture.
pub const START_FACE_CAPTURE: &str = "start_face_capture";
/// Signal asking the front-end to collect visitor details.
pub const START_VISITOR_INFO: &str = "start_visitor_info";
/// Signal asking the front-end to photograph a visitor.
pub const START_VISITOR_PHOTO: &str = "start_visitor_photo";
/// Signal asking the front-end to capture a face for registration.
pub const START_FACE_REGISTRATION: &str = "start_face_registration";
/// Signal asking the front-end to stop the camera.
pub const STOP_FACE_CAPTURE: &str = "stop_face_capture";

/// A pending front-end instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Instruction name, one of the `START_*`/`STOP_*` constants.
    pub name: String,
    /// Free-form payload for the front-end (message text, next endpoint…).
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// The single-slot, last-write-wins signal mailbox.
#[derive(Debug, Clone)]
pub struct SignalChannel {
    path: PathBuf,
}

impl SignalChannel {
    /// Create a channel backed by `<data_dir>/flow_signal.json`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("flow_signal.json"),
        }
    }

    /// Post a signal, overwriting any pending one.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot file cannot be written.
    pub fn post(&self, name: &str, payload: serde_json::Value) -> Result<()> {
        let signal = Signal {
            name: name.to_owned(),
            payload,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(&signal)
            .map_err(|e| ReceptionError::Signal(format!("cannot encode signal: {e}")))?;
        std::fs::write(&self.path, data)?;
        debug!(name, "signal posted");
        Ok(())
    }

    /// Read the pending signal without clearing it.
    #[must_use]
    pub fn peek(&self) -> Option<Signal> {
        let data = std::fs::read(&self.path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    /// Take the pending signal, clearing the slot.
    #[must_use]
    pub fn take(&self) -> Option<Signal> {
        let signal = self.peek()?;
        self.clear();
        Some(signal)
    }

    /// Clear the slot without reading it.
    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "clara-signal-{name}-{}-{}",
            std::process::id(),
            crate::state::now_epoch_secs()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn empty_slot_yields_nothing() {
        let dir = temp_dir("empty");
        let channel = SignalChannel::new(&dir);
        assert!(channel.peek().is_none());
        assert!(channel.take().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn post_take_clears_the_slot() {
        let dir = temp_dir("post-take");
        let channel = SignalChannel::new(&dir);

        channel
            .post(START_FACE_CAPTURE, json!({"message": "look at the camera"}))
            .unwrap();

        let signal = channel.take().expect("pending signal");
        assert_eq!(signal.name, START_FACE_CAPTURE);
        assert_eq!(signal.payload["message"], "look at the camera");
        assert!(channel.take().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn later_post_overwrites_earlier() {
        let dir = temp_dir("overwrite");
        let channel = SignalChannel::new(&dir);

        channel.post(START_FACE_CAPTURE, json!({})).unwrap();
        channel.post(START_VISITOR_INFO, json!({})).unwrap();

        let signal = channel.take().expect("pending signal");
        assert_eq!(signal.name, START_VISITOR_INFO);
        assert!(channel.take().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn peek_does_not_clear() {
        let dir = temp_dir("peek");
        let channel = SignalChannel::new(&dir);
        channel.post(STOP_FACE_CAPTURE, json!({})).unwrap();

        assert!(channel.peek().is_some());
        assert!(channel.peek().is_some());
        assert!(channel.take().is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
