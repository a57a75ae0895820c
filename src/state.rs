//! Shared awake/verified state, visible across processes.
//!
//! A web-server process and a voice-worker process both need to answer
//! "is the receptionist awake?" and "who is verified right now?". The
//! snapshot is persisted as one small JSON document: writers overwrite the
//! whole file, readers reload the whole file. Readers must tolerate a
//! slightly stale snapshot and call [`StateStore::refresh`] before trusting
//! a verification decision.

use crate::config::GateConfig;
use crate::language::{message, Language, MessageKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Snapshot of the receptionist's global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Whether the receptionist responds to anything beyond wake phrases.
    pub is_awake: bool,
    /// Whether some identity has been verified this conversation.
    pub is_verified: bool,
    /// Display name of the verified identity, if any.
    pub verified_user_name: Option<String>,
    /// Employee ID of the verified identity, if any.
    pub verified_user_id: Option<String>,
    /// Epoch seconds of the last interaction.
    pub last_activity: u64,
    /// Current conversation language.
    pub preferred_language: Language,
    /// Epoch seconds at which this snapshot was written.
    pub updated_at: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        // Starts asleep and unverified: only a wake phrase gets a response.
        Self {
            is_awake: false,
            is_verified: false,
            verified_user_name: None,
            verified_user_id: None,
            last_activity: now_epoch_secs(),
            preferred_language: Language::default(),
            updated_at: now_epoch_secs(),
        }
    }
}

/// Repository for the shared [`SessionState`] snapshot.
///
/// Cheap to clone; clones share the in-memory state and the backing file.
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<RwLock<SessionState>>,
    path: PathBuf,
    auto_sleep_secs: u64,
}

impl StateStore {
    /// Open the store, loading an existing snapshot when present.
    ///
    /// A missing or unreadable snapshot falls back to the default state —
    /// a corrupt file must never keep the receptionist from starting.
    #[must_use]
    pub fn open(data_dir: &Path, config: &GateConfig) -> Self {
        let path = data_dir.join("agent_state.json");
        let state = load_snapshot(&path).unwrap_or_default();
        Self {
            inner: Arc::new(RwLock::new(state)),
            path,
            auto_sleep_secs: config.auto_sleep_secs,
        }
    }

    /// Current snapshot (cloned).
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.read(|s| s.clone())
    }

    /// Reload the snapshot from disk, replacing the in-memory copy.
    ///
    /// The explicit "reload before trust" step: call this before acting on
    /// `is_verified` when another process may have written more recently.
    pub fn refresh(&self) {
        if let Some(state) = load_snapshot(&self.path) {
            if let Ok(mut guard) = self.inner.write() {
                *guard = state;
            }
        }
    }

    /// Whether the receptionist is awake.
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.read(|s| s.is_awake)
    }

    /// Whether an identity is currently verified.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.read(|s| s.is_verified)
    }

    /// Current conversation language.
    #[must_use]
    pub fn preferred_language(&self) -> Language {
        self.read(|s| s.preferred_language)
    }

    /// Set the conversation language and persist.
    pub fn set_preferred_language(&self, lang: Language) {
        self.mutate(|s| s.preferred_language = lang);
    }

    /// Wake up, returning the localized acknowledgement.
    pub fn wake_up(&self) -> String {
        let lang = self.mutate(|s| {
            s.is_awake = true;
            s.last_activity = now_epoch_secs();
            s.preferred_language
        });
        info!("receptionist awake");
        message(MessageKey::WakeAck, lang).to_owned()
    }

    /// Go to sleep, returning the localized acknowledgement.
    pub fn go_to_sleep(&self) -> String {
        let lang = self.mutate(|s| {
            s.is_awake = false;
            s.preferred_language
        });
        info!("receptionist asleep");
        message(MessageKey::SleepAck, lang).to_owned()
    }

    /// Record activity now and persist.
    pub fn touch(&self) {
        self.mutate(|s| s.last_activity = now_epoch_secs());
    }

    /// Force sleep if awake and idle past the timeout.
    ///
    /// Returns the localized auto-sleep notice when the transition fired.
    pub fn check_auto_sleep(&self) -> Option<String> {
        let timeout = self.auto_sleep_secs;
        let notice = self.mutate(|s| {
            if s.is_awake && now_epoch_secs().saturating_sub(s.last_activity) > timeout {
                s.is_awake = false;
                Some(s.preferred_language)
            } else {
                None
            }
        });
        notice.map(|lang| {
            info!("auto-sleep after {timeout}s of inactivity");
            message(MessageKey::AutoSleepNotice, lang).to_owned()
        })
    }

    /// Mark an identity as verified and persist.
    pub fn set_user_verified(&self, name: &str, user_id: Option<&str>) {
        self.mutate(|s| {
            s.is_verified = true;
            s.verified_user_name = Some(name.to_owned());
            s.verified_user_id = user_id.map(str::to_owned);
            s.last_activity = now_epoch_secs();
        });
        info!(name, id = ?user_id, "user verified");
    }

    /// Clear any verified identity and persist.
    pub fn clear_verification(&self) {
        self.mutate(|s| {
            s.is_verified = false;
            s.verified_user_name = None;
            s.verified_user_id = None;
        });
        debug!("verification cleared");
    }

    fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        match self.inner.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    /// Apply a mutation and persist the full snapshot afterwards.
    fn mutate<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = f(&mut guard);
        guard.updated_at = now_epoch_secs();
        persist_snapshot(&self.path, &guard);
        result
    }
}

/// Write the whole snapshot document. Best-effort: a failed write is
/// logged, not propagated — persistence must not break the conversation.
fn persist_snapshot(path: &Path, state: &SessionState) {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, data)
    };
    if let Err(e) = write() {
        warn!("failed to persist session state to {}: {e}", path.display());
    }
}

fn load_snapshot(path: &Path) -> Option<SessionState> {
    if !path.exists() {
        return None;
    }
    let data = std::fs::read(path).ok()?;
    match serde_json::from_slice(&data) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("ignoring corrupt session state at {}: {e}", path.display());
            None
        }
    }
}

/// Current UTC seconds since epoch.
#[must_use]
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "clara-state-{name}-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn starts_asleep_and_unverified() {
        let dir = temp_dir("defaults");
        let store = StateStore::open(&dir, &GateConfig::default());
        let state = store.snapshot();
        assert!(!state.is_awake);
        assert!(!state.is_verified);
        assert!(state.verified_user_name.is_none());
        assert_eq!(state.preferred_language, Language::En);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wake_and_sleep_round_trip() {
        let dir = temp_dir("wake-sleep");
        let store = StateStore::open(&dir, &GateConfig::default());

        let ack = store.wake_up();
        assert!(store.is_awake());
        assert_eq!(ack, message(MessageKey::WakeAck, Language::En));

        let ack = store.go_to_sleep();
        assert!(!store.is_awake());
        assert_eq!(ack, message(MessageKey::SleepAck, Language::En));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn verification_is_mirrored_and_cleared() {
        let dir = temp_dir("verify");
        let store = StateStore::open(&dir, &GateConfig::default());

        store.set_user_verified("Asha", Some("E100"));
        let state = store.snapshot();
        assert!(state.is_verified);
        assert_eq!(state.verified_user_name.as_deref(), Some("Asha"));
        assert_eq!(state.verified_user_id.as_deref(), Some("E100"));

        store.clear_verification();
        assert!(!store.is_verified());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = temp_dir("reopen");
        {
            let store = StateStore::open(&dir, &GateConfig::default());
            store.wake_up();
            store.set_preferred_language(Language::Ta);
            store.set_user_verified("Asha", Some("E100"));
        }
        let store = StateStore::open(&dir, &GateConfig::default());
        let state = store.snapshot();
        assert!(state.is_awake);
        assert!(state.is_verified);
        assert_eq!(state.preferred_language, Language::Ta);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn refresh_picks_up_foreign_writes() {
        let dir = temp_dir("refresh");
        let writer = StateStore::open(&dir, &GateConfig::default());
        let reader = StateStore::open(&dir, &GateConfig::default());

        writer.set_user_verified("Ravi", Some("E200"));
        assert!(!reader.is_verified());

        reader.refresh();
        assert!(reader.is_verified());
        assert_eq!(reader.snapshot().verified_user_name.as_deref(), Some("Ravi"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_default() {
        let dir = temp_dir("corrupt");
        std::fs::write(dir.join("agent_state.json"), b"{not json").unwrap();
        let store = StateStore::open(&dir, &GateConfig::default());
        assert!(!store.is_awake());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn auto_sleep_fires_after_timeout() {
        let dir = temp_dir("auto-sleep");
        let store = StateStore::open(
            &dir,
            &GateConfig {
                auto_sleep_secs: 0,
            },
        );
        store.wake_up();
        // Zero timeout plus a backdated activity stamp forces the check.
        store.mutate(|s| s.last_activity = s.last_activity.saturating_sub(5));
        let notice = store.check_auto_sleep();
        assert!(notice.is_some());
        assert!(!store.is_awake());

        // Already asleep: nothing further to report.
        assert!(store.check_auto_sleep().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
